use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A bookable tour/package with remaining capacity.
///
/// `is_available` is stored alongside `available_spots` but is always derived
/// from the spot count whenever the booking service writes inventory; see
/// `db::queries::set_item_spots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub destination: String,
    pub duration_days: i64,
    pub price: f64,
    pub category: String,
    pub available_spots: i64,
    pub is_available: bool,
    pub image_url: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
