use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;
use super::value_objects::{Delivery, Item, Payment};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The order row plus its single delivery, single payment and item list,
// persisted and cached as one unit. Orders are immutable once created: the
// pipeline only ever creates an order once, keyed by `order_uid`.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, sqlx::FromRow)]
#[serde(default)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    #[sqlx(skip)]
    pub delivery: Delivery,
    #[sqlx(skip)]
    pub payment: Payment,
    #[sqlx(skip)]
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl Order {
    /// Structural check of the fields every stored order must carry.
    ///
    /// No cross-field or business-rule checks happen here.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_uid.is_empty() {
            return Err(ValidationError::MissingOrderUid);
        }
        if self.track_number.is_empty() {
            return Err(ValidationError::MissingTrackNumber);
        }
        if self.entry.is_empty() {
            return Err(ValidationError::MissingEntry);
        }
        if self.items.is_empty() {
            return Err(ValidationError::EmptyItems);
        }
        Ok(())
    }
}

#[cfg(test)]
impl Order {
    /// Minimal valid order used across the crate's tests.
    pub(crate) fn sample(order_uid: &str) -> Self {
        Self {
            order_uid: order_uid.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: order_uid.to_string(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                ..Payment::default()
            },
            items: vec![Item {
                chrt_id: 9934930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
            locale: "en".to_string(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: DateTime::parse_from_rfc3339("2021-11-26T06:22:19Z")
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            oof_shard: "1".to_string(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
