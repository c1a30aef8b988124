use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::{AppError, AppResult};

pub fn validate_input<T: Validate>(input: &T) -> AppResult<()> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_particular() -> String {
    "particular".to_string()
}
fn default_usd() -> String {
    "USD".to_string()
}
fn default_active() -> String {
    "active".to_string()
}
fn default_false() -> bool {
    false
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UnitStakeInput {
    #[validate(length(min = 1, max = 120))]
    pub unit_name: String,
    #[validate(range(min = 1))]
    pub adults: u32,
    #[serde(default)]
    pub minors: u32,
    #[serde(default)]
    pub price_per_night: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateReservationInput {
    pub start_date: String,
    pub end_date: String,
    #[validate(length(min = 1, max = 255))]
    pub guest_name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: String,
    #[validate(range(min = 1))]
    pub adults: u32,
    #[serde(default)]
    pub minors: u32,
    #[serde(default = "default_usd")]
    pub currency: String,
    #[serde(default)]
    pub price_per_night: HashMap<String, f64>,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub margin_amount: f64,
    /// Manual override; when absent the total is nightly price x nights
    /// (or the sum of stake totals for multi-unit stays).
    pub total_price: Option<f64>,
    #[serde(default = "default_false")]
    pub deposit_paid: bool,
    #[serde(default)]
    pub deposit_amount: f64,
    pub deposit_date: Option<String>,
    #[serde(default = "default_particular")]
    pub channel: String,
    pub channel_contact: Option<String>,
    pub external_ref: Option<String>,
    #[serde(default = "default_active")]
    pub status: String,
    #[serde(default = "default_false")]
    pub is_multi_unit: bool,
    pub unit_name: Option<String>,
    #[validate(length(min = 1, max = 4), nested)]
    pub unit_stakes: Option<Vec<UnitStakeInput>>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
pub struct UpdateReservationInput {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub guest_name: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub adults: Option<u32>,
    pub minors: Option<u32>,
    pub currency: Option<String>,
    pub price_per_night: Option<HashMap<String, f64>>,
    pub tax_amount: Option<f64>,
    pub margin_amount: Option<f64>,
    pub total_price: Option<f64>,
    pub deposit_paid: Option<bool>,
    pub deposit_amount: Option<f64>,
    pub deposit_date: Option<String>,
    pub channel: Option<String>,
    pub channel_contact: Option<String>,
    pub external_ref: Option<String>,
    pub is_multi_unit: Option<bool>,
    pub unit_name: Option<String>,
    #[validate(length(min = 1, max = 4), nested)]
    pub unit_stakes: Option<Vec<UnitStakeInput>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AvailabilitySearchInput {
    pub start_date: String,
    pub end_date: String,
    #[validate(range(min = 1))]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
}

pub fn serialize_to_map<T: Serialize>(input: &T) -> Map<String, Value> {
    match serde_json::to_value(input) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

pub fn remove_nulls(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter().filter(|(_, value)| !value.is_null()).collect()
}
