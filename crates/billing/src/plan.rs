//! Subscription plan catalog. Prices are monthly, in guaraníes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanId {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl PlanId {
    pub fn plan(self) -> &'static SubscriptionPlan {
        match self {
            PlanId::Free => &SUBSCRIPTION_PLANS[0],
            PlanId::Pro => &SUBSCRIPTION_PLANS[1],
            PlanId::Enterprise => &SUBSCRIPTION_PLANS[2],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanId::Free => "FREE",
            PlanId::Pro => "PRO",
            PlanId::Enterprise => "ENTERPRISE",
        }
    }
}

impl core::fmt::Display for PlanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: &'static str,
    /// Monthly fee in guaraníes (no minor unit).
    pub price: u64,
    pub max_products: usize,
    pub support_level: &'static str,
    pub features: &'static [&'static str],
}

pub static SUBSCRIPTION_PLANS: [SubscriptionPlan; 3] = [
    SubscriptionPlan {
        id: PlanId::Free,
        name: "Plan Inicial",
        price: 0,
        max_products: 50,
        support_level: "Comunidad",
        features: &["Punto de Venta Básico", "Control de Stock Limitado", "1 Usuario"],
    },
    SubscriptionPlan {
        id: PlanId::Pro,
        name: "Plan Profesional",
        price: 150_000,
        max_products: 1_000,
        support_level: "Email Prioritario",
        features: &[
            "Punto de Venta Avanzado",
            "Facturación Electrónica",
            "Reportes con IA",
            "Multi-usuario (hasta 3)",
        ],
    },
    SubscriptionPlan {
        id: PlanId::Enterprise,
        name: "Plan Empresarial",
        price: 450_000,
        max_products: 10_000,
        support_level: "24/7 Dedicado",
        features: &[
            "Todo ilimitado",
            "API Access",
            "Soporte Multi-sucursal",
            "Personalización de Marca",
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_catalog_order() {
        for plan in &SUBSCRIPTION_PLANS {
            assert_eq!(plan.id.plan(), plan);
        }
    }

    #[test]
    fn plan_ids_use_upper_case_wire_names() {
        assert_eq!(serde_json::to_string(&PlanId::Enterprise).unwrap(), "\"ENTERPRISE\"");
        let id: PlanId = serde_json::from_str("\"PRO\"").unwrap();
        assert_eq!(id, PlanId::Pro);
        assert_eq!(PlanId::default(), PlanId::Free);
    }

    #[test]
    fn product_limits_grow_with_price() {
        assert!(SUBSCRIPTION_PLANS.windows(2).all(|w| {
            w[0].price < w[1].price && w[0].max_products < w[1].max_products
        }));
    }
}
