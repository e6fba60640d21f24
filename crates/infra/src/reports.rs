//! Dashboard figures computed from the tenant's read models.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use ferrepos_ai::{SalesSummary, TopProduct};
use ferrepos_core::TenantId;
use ferrepos_products::ProductId;

use crate::projections::ReadModels;

/// Days covered by the daily chart, today included.
pub const TREND_DAYS: u64 = 7;

/// Products listed in the best-seller ranking.
pub const TOP_PRODUCTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardReport {
    pub total_revenue: Decimal,
    pub sales_count: usize,
    pub product_count: usize,
    pub low_stock_count: usize,
    /// Oldest day first; days without sales are reported as zero.
    pub last_7_days: Vec<DailyTotal>,
    pub vat10_total: Decimal,
    pub vat5_total: Decimal,
    pub top_products: Vec<TopProduct>,
}

impl DashboardReport {
    pub fn build(read_models: &ReadModels, tenant_id: TenantId, now: DateTime<Utc>) -> Self {
        let sales = read_models.sales.list(tenant_id);

        let today = now.date_naive();
        let first_day = today.checked_sub_days(Days::new(TREND_DAYS - 1)).unwrap_or(today);
        let mut last_7_days: Vec<DailyTotal> = first_day
            .iter_days()
            .take_while(|d| *d <= today)
            .map(|date| DailyTotal {
                date,
                total: Decimal::ZERO,
            })
            .collect();

        let mut total_revenue = Decimal::ZERO;
        let mut vat10_total = Decimal::ZERO;
        let mut vat5_total = Decimal::ZERO;
        // (name, units, first position seen) per product.
        let mut units: HashMap<ProductId, (String, i64, usize)> = HashMap::new();

        for sale in &sales {
            total_revenue += sale.totals.total;
            vat10_total += sale.totals.vat10;
            vat5_total += sale.totals.vat5;

            let day = sale.date.date_naive();
            if let Some(slot) = last_7_days.iter_mut().find(|d| d.date == day) {
                slot.total += sale.totals.total;
            }

            for item in &sale.items {
                let seen = units.len();
                let entry = units
                    .entry(item.product_id)
                    .or_insert_with(|| (item.name.clone(), 0, seen));
                entry.1 += item.quantity;
            }
        }

        let mut ranking: Vec<(String, i64, usize)> = units.into_values().collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        let top_products = ranking
            .into_iter()
            .take(TOP_PRODUCTS)
            .map(|(name, units, _)| TopProduct { name, units })
            .collect();

        Self {
            total_revenue,
            sales_count: sales.len(),
            product_count: read_models.catalog.count(tenant_id),
            low_stock_count: read_models.catalog.low_stock_count(tenant_id),
            last_7_days,
            vat10_total,
            vat5_total,
            top_products,
        }
    }

    /// Input for the AI sales analysis.
    pub fn to_summary(&self) -> SalesSummary {
        SalesSummary {
            total_revenue: self.total_revenue,
            sales_count: self.sales_count,
            low_stock_count: self.low_stock_count,
            top_products: self.top_products.clone(),
        }
    }
}
