//! Credit packs offered at checkout.

use serde::{Deserialize, Serialize};

/// A purchasable bundle of credits backed by a processor price id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditPack {
    /// Stable pack identifier.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Credits granted on payment.
    pub credits: i64,
    /// Processor price id.
    pub price_id: String,
    /// Display price, already formatted.
    pub price: String,
}

impl CreditPack {
    fn new(credits: i64, price: &str) -> Self {
        Self {
            id: format!("pack-{credits}"),
            label: format!("{credits} credits"),
            credits,
            price_id: format!("price_{credits}"),
            price: price.to_string(),
        }
    }
}

/// The default catalogue.
#[must_use]
pub fn default_packs() -> Vec<CreditPack> {
    vec![
        CreditPack::new(25, "9.99 €"),
        CreditPack::new(60, "19.99 €"),
        CreditPack::new(100, "34.99 €"),
    ]
}

/// Find a pack by processor price id.
#[must_use]
pub fn find_by_price_id<'a>(packs: &'a [CreditPack], price_id: &str) -> Option<&'a CreditPack> {
    packs.iter().find(|p| p.price_id == price_id)
}
