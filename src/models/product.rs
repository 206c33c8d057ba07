use super::MinorUnits;
use serde::{Deserialize, Serialize};

/// Catalog entity referenced read-only by the cart and the server price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Price of one unit in minor units
    pub unit_price: MinorUnits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit_price: MinorUnits) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
            merchant_id: None,
        }
    }
}
