use std::collections::HashMap;

use chrono::{Duration as ChronoDuration, Utc};
use ferrepos_api::config::ApiConfig;
use ferrepos_auth::{JwtClaims, PrincipalId, Role};
use ferrepos_core::TenantId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};

const JWT_SECRET: &str = "test-secret";
const ADMIN_EMAIL: &str = "root@ferrepos.test";
const ADMIN_PASSWORD: &str = "root-pass";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("JWT_SECRET", JWT_SECRET),
            ("ADMIN_EMAIL", ADMIN_EMAIL),
            ("ADMIN_PASSWORD", ADMIN_PASSWORD),
        ]);
        let config = ApiConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = ferrepos_api::app::build_app(config).expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).bearer_auth(token).json(&body).send().await.unwrap()
    }

    async fn patch(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client.patch(self.url(path)).bearer_auth(token).json(&body).send().await.unwrap()
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    /// Registers a store and returns `(token, tenant_id)`.
    async fn register(&self, name: &str, email: &str, plan: &str) -> (String, String) {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": "clave-123", "plan": plan }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_string(),
            body["tenant_id"].as_str().unwrap().to_string(),
        )
    }

    async fn admin_token(&self) -> String {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["role"], "superadmin");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_product(&self, token: &str, body: Value) -> Value {
        let res = self.post("/products", token, body).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, roles: Vec<Role>) -> String {
    let claims = JwtClaims::new(PrincipalId::new(), tenant_id, "Test", roles, Utc::now(), ChronoDuration::minutes(10));

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn decimal(v: &Value) -> Decimal {
    match v {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

fn items(body: &Value) -> &Vec<Value> {
    body["items"].as_array().unwrap()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("/products", "not-a-jwt").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, vec![Role::owner()]);

    let res = srv.get("/whoami", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert_eq!(body["name"], "Test");
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "owner"));
}

#[tokio::test]
async fn register_then_login_with_any_email_case() {
    let srv = TestServer::spawn().await;
    let (_, tenant_id) = srv.register("Ferretería Central", "Dueno@Central.com.py", "FREE").await;

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": "dueno@central.com.py", "password": "clave-123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let session: Value = res.json().await.unwrap();
    assert_eq!(session["tenant_id"], tenant_id.as_str());
    assert_eq!(session["name"], "Ferretería Central");
    assert_eq!(session["role"], "owner");

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": "dueno@central.com.py", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/auth/register"))
        .json(&json!({ "name": "Copia", "email": "DUENO@central.com.py", "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "email_taken");
}

#[tokio::test]
async fn product_catalog_lifecycle() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("Ferretería Sur", "sur@ferre.py", "PRO").await;

    let res = srv.post("/categories", &token, json!({ "name": "Herramientas" })).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = srv.post("/categories", &token, json!({ "name": "herramientas" })).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let hammer = srv
        .create_product(
            &token,
            json!({ "sku": "MART-01", "name": "Martillo de uña", "category": "Herramientas",
                    "price": 45000, "cost": 30000, "stock": 10, "min_stock": 2 }),
        )
        .await;
    assert_eq!(hammer["vat_rate"], 10);
    assert_eq!(hammer["low_stock"], false);
    let hammer_id = hammer["product_id"].as_str().unwrap().to_string();

    srv.create_product(
        &token,
        json!({ "sku": "ARR-1KG", "name": "Arroz 1kg", "price": 25000, "stock": 1, "min_stock": 5, "vat_rate": 5 }),
    )
    .await;

    // Duplicate SKU, compared case-insensitively.
    let res = srv
        .post("/products", &token, json!({ "sku": "mart-01", "name": "Otro", "price": 1000 }))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_sku");

    let body: Value = srv.get("/products?q=martillo", &token).await.json().await.unwrap();
    assert_eq!(items(&body).len(), 1);
    assert_eq!(items(&body)[0]["sku"], "MART-01");

    let body: Value = srv.get("/products?low_stock=true", &token).await.json().await.unwrap();
    assert_eq!(items(&body).len(), 1);
    assert_eq!(items(&body)[0]["sku"], "ARR-1KG");

    let res = srv
        .patch(&format!("/products/{hammer_id}"), &token, json!({ "price": 47000 }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(decimal(&body["price"]), Decimal::from(47000));

    let res = srv
        .post(&format!("/products/{hammer_id}/stock"), &token, json!({ "delta": -9 }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["stock"], 1);
    assert_eq!(body["low_stock"], true);

    // Stock never goes negative.
    let res = srv
        .post(&format!("/products/{hammer_id}/stock"), &token, json!({ "delta": -5 }))
        .await;
    assert!(res.status().is_client_error());

    let res = srv
        .client
        .delete(srv.url(&format!("/products/{hammer_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = srv.get(&format!("/products/{hammer_id}"), &token).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn free_plan_caps_the_catalog() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("Kiosco", "kiosco@ferre.py", "FREE").await;

    for i in 0..50 {
        srv.create_product(&token, json!({ "sku": format!("SKU-{i}"), "name": format!("Item {i}"), "price": 1000 }))
            .await;
    }
    let res = srv
        .post("/products", &token, json!({ "sku": "SKU-50", "name": "Item 50", "price": 1000 }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "plan_limit_reached");
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let srv = TestServer::spawn().await;
    let (a, _) = srv.register("Tienda A", "a@ferre.py", "PRO").await;
    let (b, _) = srv.register("Tienda B", "b@ferre.py", "PRO").await;

    let product = srv
        .create_product(&a, json!({ "sku": "A-1", "name": "Pala", "price": 60000 }))
        .await;
    let id = product["product_id"].as_str().unwrap();

    let res = srv.get(&format!("/products/{id}"), &b).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = srv.get("/products", &b).await.json().await.unwrap();
    assert!(items(&body).is_empty());

    // Same SKU is fine in another store.
    srv.create_product(&b, json!({ "sku": "A-1", "name": "Pala", "price": 61000 }))
        .await;
}

#[tokio::test]
async fn customers_and_fiscal_helpers() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("Ferretería Norte", "norte@ferre.py", "PRO").await;

    let res = srv
        .post(
            "/customers",
            &token,
            json!({ "name": "Constructora Lambaré", "contact": { "email": "compras@lambare.com.py" },
                    "document": { "kind": "ruc", "number": "3799439" } }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let customer: Value = res.json().await.unwrap();
    assert_eq!(customer["document"]["number"], "3799439-5");
    assert_eq!(customer["email"], "compras@lambare.com.py");
    let id = customer["customer_id"].as_str().unwrap().to_string();

    let res = srv
        .patch(&format!("/customers/{id}"), &token, json!({ "name": "Constructora Lambaré SA" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = srv.get("/customers", &token).await.json().await.unwrap();
    assert_eq!(items(&body).len(), 1);
    assert_eq!(items(&body)[0]["name"], "Constructora Lambaré SA");

    let res = srv
        .post("/customers", &token, json!({ "name": "Sin RUC", "document": { "kind": "ruc", "number": "12-9" } }))
        .await;
    assert!(res.status().is_client_error());

    let res = srv.get("/fiscal/ruc/44444401", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["check_digit"], 7);
    assert_eq!(body["formatted"], "44444401-7");

    let res = srv.get("/fiscal/ruc/abc", &token).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .post(
            "/fiscal/totals",
            &token,
            json!({ "lines": [
                { "unit_price": 45000, "quantity": 1, "vat_rate": 10 },
                { "unit_price": 25000, "quantity": 1, "vat_rate": 5 },
            ] }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(decimal(&body["total"]), Decimal::from(70000));
    assert_eq!(decimal(&body["vat10"]), Decimal::new(409091, 2));
    assert_eq!(decimal(&body["vat5"]), Decimal::new(119048, 2));
}

#[tokio::test]
async fn checkout_records_sale_and_deducts_stock() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.register("Ferretería Este", "este@ferre.py", "PRO").await;

    let hammer = srv
        .create_product(&token, json!({ "sku": "MART-01", "name": "Martillo", "price": 45000, "stock": 5 }))
        .await;
    let seeds = srv
        .create_product(
            &token,
            json!({ "sku": "SEM-01", "name": "Semillas", "price": 25000, "stock": 3, "vat_rate": 5 }),
        )
        .await;
    let hammer_id = hammer["product_id"].as_str().unwrap().to_string();
    let seeds_id = seeds["product_id"].as_str().unwrap().to_string();

    let res = srv
        .post(
            "/sales/checkout",
            &token,
            json!({ "lines": [
                { "product_id": hammer_id, "quantity": 1 },
                { "product_id": seeds_id, "quantity": 1 },
            ] }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let sale: Value = res.json().await.unwrap();
    assert_eq!(decimal(&sale["total"]), Decimal::from(70000));
    assert_eq!(decimal(&sale["vat10"]), Decimal::new(409091, 2));
    assert_eq!(decimal(&sale["vat5"]), Decimal::new(119048, 2));
    assert_eq!(sale["items"].as_array().unwrap().len(), 2);

    let body: Value = srv.get(&format!("/products/{hammer_id}"), &token).await.json().await.unwrap();
    assert_eq!(body["stock"], 4);

    // Not enough seeds: nothing is sold and no stock moves.
    let res = srv
        .post(
            "/sales/checkout",
            &token,
            json!({ "lines": [
                { "product_id": hammer_id, "quantity": 1 },
                { "product_id": seeds_id, "quantity": 10 },
            ] }),
        )
        .await;
    assert!(res.status().is_client_error());
    let body: Value = srv.get(&format!("/products/{hammer_id}"), &token).await.json().await.unwrap();
    assert_eq!(body["stock"], 4);

    let res = srv.post("/sales/checkout", &token, json!({ "lines": [] })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = srv.get("/sales", &token).await.json().await.unwrap();
    assert_eq!(items(&body).len(), 1);
    let sale_id = sale["sale_id"].as_str().unwrap();
    let res = srv.get(&format!("/sales/{sale_id}"), &token).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.get("/dashboard", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let dash: Value = res.json().await.unwrap();
    assert_eq!(dash["sales_count"], 1);
    assert_eq!(decimal(&dash["total_revenue"]), Decimal::from(70000));
    assert_eq!(dash["last_7_days"].as_array().unwrap().len(), 7);
    assert_eq!(dash["top_products"].as_array().unwrap().len(), 2);

    // No generator configured: the insight falls back to canned text.
    let res = srv.post("/dashboard/insights", &token, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["fallback"], true);
    assert!(!body["text"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn roles_are_kept_apart() {
    let srv = TestServer::spawn().await;
    let (owner, _) = srv.register("Ferretería Oeste", "oeste@ferre.py", "FREE").await;
    let admin = srv.admin_token().await;

    let res = srv.get("/admin/tenants", &owner).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = srv.get("/products", &admin).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = srv.post("/sales/checkout", &admin, json!({ "lines": [] })).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_manages_tenants_and_invoices() {
    let srv = TestServer::spawn().await;
    let (owner, tenant_id) = srv.register("Ferretería Centro", "centro@ferre.py", "PRO").await;
    let admin = srv.admin_token().await;

    let body: Value = srv.get("/admin/plans", &admin).await.json().await.unwrap();
    assert_eq!(items(&body).len(), 3);

    let body: Value = srv.get("/admin/tenants?q=centro", &admin).await.json().await.unwrap();
    assert_eq!(items(&body).len(), 1);
    assert_eq!(items(&body)[0]["plan"], "PRO");
    assert!(items(&body)[0].get("password_hash").is_none());

    let res = srv
        .patch(&format!("/admin/tenants/{tenant_id}/plan"), &admin, json!({ "plan": "ENTERPRISE" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["plan"], "ENTERPRISE");

    let res = srv.post("/admin/invoices", &admin, json!({ "tenant_id": tenant_id })).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let invoice: Value = res.json().await.unwrap();
    assert_eq!(invoice["status"], "PENDING");
    assert_eq!(invoice["plan"], "ENTERPRISE");
    let invoice_id = invoice["invoice_id"].as_str().unwrap().to_string();

    let res = srv
        .patch(&format!("/admin/invoices/{invoice_id}"), &admin, json!({ "amount": 99000 }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(decimal(&body["amount"]), Decimal::from(99000));

    let res = srv.post(&format!("/admin/invoices/{invoice_id}/pay"), &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "PAID");
    assert!(!body["paid_at"].is_null());

    let body: Value = srv
        .get(&format!("/admin/invoices?tenant_id={tenant_id}"), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(items(&body).len(), 1);

    let res = srv.post("/admin/invoices", &admin, json!({ "tenant_id": tenant_id })).await;
    let second: Value = res.json().await.unwrap();
    let res = srv.get(&format!("/admin/invoices/summary?tenant_id={tenant_id}"), &admin).await;
    assert_eq!(res.status(), StatusCode::OK);
    let summary: Value = res.json().await.unwrap();
    assert_eq!(decimal(&summary["pending_total"]), decimal(&second["amount"]));
    assert_eq!(decimal(&summary["collected_total"]), Decimal::from(99000));
    assert_eq!(summary["overdue_count"], 0);
    let res = srv.get("/admin/invoices/summary", &owner).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Deactivation locks the store out, even with a live token.
    let res = srv.post(&format!("/admin/tenants/{tenant_id}/deactivate"), &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = srv.get("/products", &owner).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": "centro@ferre.py", "password": "clave-123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.post(&format!("/admin/tenants/{tenant_id}/activate"), &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = srv.get("/products", &owner).await;
    assert_eq!(res.status(), StatusCode::OK);
}
