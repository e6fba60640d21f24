use std::{
    convert::Infallible,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use ferrepos_ai::{LocalAiScheduler, TenantScope, TextGenerator};
use ferrepos_auth::{
    Hs256JwtIssuer, JwtClaims, JwtIssuer, PasswordError, PrincipalId, Role, TokenError, hash_password,
    verify_password,
};
use ferrepos_billing::{PlanId, RegisterTenant, TenantAccount, TenantAccountCommand};
use ferrepos_core::{Aggregate, AggregateId, DomainError, TenantId};
use ferrepos_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};
use ferrepos_infra::{
    backend::Backend,
    command_dispatcher::DispatchError,
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{ProjectionError, ReadModels},
    streams,
};

use crate::config::ApiConfig;

pub type InMemoryBackend = Backend<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

/// Display name carried in the platform operator's token.
pub const ADMIN_DISPLAY_NAME: &str = "Administrador";

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: JsonValue,
}

/// Issued token plus what the client shows about the session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub tenant_id: TenantId,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("store account is deactivated")]
    Inactive,

    #[error("email '{0}' is already registered")]
    EmailTaken(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to hash the operator password: {0}")]
    OperatorPassword(#[from] PasswordError),

    #[error("failed to rebuild read models: {0}")]
    Restore(#[from] ProjectionError),
}

pub struct AppServices {
    backend: InMemoryBackend,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    issuer: Arc<dyn JwtIssuer>,
    token_ttl: chrono::Duration,
    admin_email: String,
    /// Argon2 hash of the configured operator password; the plain value is not kept.
    admin_password_hash: String,
    /// Serializes check-then-write flows (unique email, SKU, category name).
    uniqueness: Mutex<()>,
    ai: LocalAiScheduler,
}

pub fn build_services(config: &ApiConfig, generator: Arc<dyn TextGenerator>) -> Result<AppServices, StartupError> {
    build_services_on(config, Arc::new(InMemoryEventStore::new()), generator)
}

/// Wire services over an existing store; read models start from its history.
pub fn build_services_on(
    config: &ApiConfig,
    store: Arc<InMemoryEventStore>,
    generator: Arc<dyn TextGenerator>,
) -> Result<AppServices, StartupError> {
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());

    // Realtime channel (SSE): lossy broadcast, tenant-filtered in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> realtime notifications. Read models are
    // updated synchronously by the backend, so this only fans out.
    {
        let sub = bus.subscribe();
        let realtime_tx = realtime_tx.clone();
        tokio::task::spawn_blocking(move || {
            while let Ok(env) = sub.recv() {
                let at = env.aggregate_type();
                // Lossy; no backpressure on the write path.
                let _ = realtime_tx.send(RealtimeMessage {
                    tenant_id: env.tenant_id(),
                    topic: format!("{at}.updated"),
                    payload: serde_json::json!({
                        "kind": "projection_update",
                        "aggregate_type": at,
                        "aggregate_id": env.aggregate_id().to_string(),
                        "sequence_number": env.sequence_number(),
                        "event": event_name(env.payload()),
                    }),
                });
            }
        });
    }

    let backend = Backend::restore(store, bus)?;
    let admin_password_hash = hash_password(&config.admin.password)?;

    Ok(AppServices {
        backend,
        realtime_tx,
        issuer: Arc::new(Hs256JwtIssuer::new(config.jwt_secret.as_bytes())),
        token_ttl: config.token_ttl,
        admin_email: config.admin.email.trim().to_lowercase(),
        admin_password_hash,
        uniqueness: Mutex::new(()),
        ai: LocalAiScheduler::new(TenantScope::Any, generator),
    })
}

/// Externally tagged enum payloads serialize as `{"VariantName": {...}}`.
fn event_name(payload: &JsonValue) -> Option<&str> {
    payload.as_object()?.keys().next().map(String::as_str)
}

impl AppServices {
    pub fn read_models(&self) -> &ReadModels {
        self.backend.read_models()
    }

    pub fn backend(&self) -> &InMemoryBackend {
        &self.backend
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn ai(&self) -> &LocalAiScheduler {
        &self.ai
    }

    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        self.backend
            .execute::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    /// Run `f` while holding the uniqueness lock.
    ///
    /// A poisoned lock only means another check panicked; the guarded data
    /// is `()`, so the lock is taken over.
    pub fn exclusive<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.uniqueness.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    fn issue(&self, tenant_id: TenantId, name: &str, role: Role) -> Result<Session, TokenError> {
        let sub = if tenant_id.is_platform() {
            PrincipalId::new()
        } else {
            PrincipalId::for_tenant(tenant_id)
        };
        let claims = JwtClaims::new(sub, tenant_id, name, vec![role.clone()], Utc::now(), self.token_ttl);
        Ok(Session {
            token: self.issuer.issue(&claims)?,
            tenant_id,
            name: name.to_string(),
            role,
        })
    }

    /// Create a store account and sign its owner in.
    pub fn register_tenant(
        &self,
        name: &str,
        email: &str,
        password: &str,
        plan: PlanId,
    ) -> Result<Session, AuthError> {
        if password.trim().is_empty() {
            return Err(AuthError::Validation("password is required".to_string()));
        }
        let email = email.trim().to_lowercase();

        let password_hash = hash_password(password)?;
        let tenant_id = TenantId::new();
        self.exclusive(|| {
            if email == self.admin_email || self.read_models().tenants.find_by_email(&email).is_some() {
                return Err(AuthError::EmailTaken(email.clone()));
            }
            self.dispatch::<TenantAccount>(
                tenant_id,
                AggregateId::from(tenant_id),
                streams::TENANT_ACCOUNT,
                TenantAccountCommand::RegisterTenant(RegisterTenant {
                    tenant_id,
                    name: name.to_string(),
                    email: email.clone(),
                    password_hash: password_hash.clone(),
                    plan,
                    occurred_at: Utc::now(),
                }),
                |_, _| TenantAccount::empty(tenant_id),
            )?;
            Ok(())
        })?;

        let account = self
            .read_models()
            .tenants
            .get(tenant_id)
            .ok_or(AuthError::Dispatch(DispatchError::NotFound))?;
        tracing::info!(tenant_id = %tenant_id, plan = %plan, "store registered");
        Ok(self.issue(tenant_id, &account.name, Role::owner())?)
    }

    /// Platform operator first, then store owners. Inactive stores are refused.
    pub fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_lowercase();

        if email == self.admin_email {
            if !verify_password(password, &self.admin_password_hash) {
                tracing::warn!("failed platform operator login");
                return Err(AuthError::InvalidCredentials);
            }
            tracing::info!("platform operator signed in");
            return Ok(self.issue(TenantId::platform(), ADMIN_DISPLAY_NAME, Role::superadmin())?);
        }

        let account = self
            .read_models()
            .tenants
            .find_by_email(&email)
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if !account.is_active {
            tracing::info!(tenant_id = %account.tenant_id, "login refused for inactive store");
            return Err(AuthError::Inactive);
        }

        tracing::info!(tenant_id = %account.tenant_id, "store owner signed in");
        Ok(self.issue(account.tenant_id, &account.name, Role::owner())?)
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use ferrepos_ai::UnavailableGenerator;
    use ferrepos_auth::{Hs256JwtValidator, JwtValidator};
    use ferrepos_billing::{DeactivateTenant, TenantAccountCommand};
    use ferrepos_observability::LogFormat;

    use super::*;
    use crate::config::AdminCredentials;

    fn config() -> ApiConfig {
        ApiConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: "unit-secret".to_string(),
            token_ttl: chrono::Duration::minutes(5),
            admin: AdminCredentials {
                email: "root@ferrepos.test".to_string(),
                password: "root-pass".to_string(),
            },
            log_format: LogFormat::Json,
            defaulted_secrets: vec![],
        }
    }

    fn services() -> AppServices {
        build_services(&config(), Arc::new(UnavailableGenerator)).unwrap()
    }

    #[tokio::test]
    async fn operator_password_is_held_only_as_a_hash() {
        let s = services();
        assert!(s.admin_password_hash.starts_with("$argon2id$"));
        assert!(!s.admin_password_hash.contains("root-pass"));
        assert!(s.login(" ROOT@ferrepos.test ", "root-pass").is_ok());
    }

    #[tokio::test]
    async fn services_over_an_existing_store_see_its_history() {
        let first = services();
        first.register_tenant("Ferretería Norte", "norte@ferre.py", "clave", PlanId::Pro).unwrap();

        let store = first.backend().dispatcher().store().clone();
        let second = build_services_on(&config(), store, Arc::new(UnavailableGenerator)).unwrap();
        assert!(second.read_models().tenants.find_by_email("norte@ferre.py").is_some());
        assert!(second.login("norte@ferre.py", "clave").is_ok());
    }

    #[tokio::test]
    async fn registered_owner_can_log_in() {
        let s = services();
        let session = s.register_tenant("Ferretería Central", "Dueno@Central.com.py", "clave", PlanId::Free).unwrap();
        assert_eq!(session.role, Role::owner());

        let login = s.login("dueno@central.com.py", "clave").unwrap();
        assert_eq!(login.tenant_id, session.tenant_id);

        let claims = Hs256JwtValidator::new("unit-secret").validate(&login.token, Utc::now()).unwrap();
        assert_eq!(claims.tenant_id, session.tenant_id);
        assert_eq!(claims.name, "Ferretería Central");

        assert!(matches!(s.login("dueno@central.com.py", "otra"), Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn duplicate_email_is_refused() {
        let s = services();
        s.register_tenant("A", "a@x.py", "pw", PlanId::Free).unwrap();
        assert!(matches!(s.register_tenant("B", " A@X.PY ", "pw", PlanId::Pro), Err(AuthError::EmailTaken(_))));
        assert!(matches!(
            s.register_tenant("C", "root@ferrepos.test", "pw", PlanId::Pro),
            Err(AuthError::EmailTaken(_))
        ));
    }

    #[tokio::test]
    async fn operator_logs_into_the_platform_partition() {
        let s = services();
        let session = s.login("ROOT@ferrepos.test", "root-pass").unwrap();
        assert!(session.tenant_id.is_platform());
        assert_eq!(session.role, Role::superadmin());
        assert!(matches!(s.login("root@ferrepos.test", "nope"), Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn inactive_store_cannot_log_in() {
        let s = services();
        let session = s.register_tenant("A", "a@x.py", "pw", PlanId::Free).unwrap();
        let t = session.tenant_id;
        s.dispatch::<TenantAccount>(
            t,
            AggregateId::from(t),
            streams::TENANT_ACCOUNT,
            TenantAccountCommand::DeactivateTenant(DeactivateTenant {
                tenant_id: t,
                occurred_at: Utc::now(),
            }),
            |_, _| TenantAccount::empty(t),
        )
        .unwrap();

        assert!(matches!(s.login("a@x.py", "pw"), Err(AuthError::Inactive)));
    }

    #[test]
    fn event_name_is_the_enum_tag() {
        let payload = serde_json::json!({ "ProductCreated": { "sku": "X" } });
        assert_eq!(event_name(&payload), Some("ProductCreated"));
        assert_eq!(event_name(&serde_json::json!(null)), None);
    }
}
