use std::collections::HashMap;

use serde_json::{Map, Value};
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};

use crate::dates::to_valid_date;
use crate::error::{AppError, AppResult};
use crate::model::{Reservation, ReservationStatus, Unit, UnitAssignment, UnitStake};

const RESERVATIONS_TABLE: &str = "reservations";
const UNITS_TABLE: &str = "units";

/// Full-collection fetch. All overlap/availability/statistics work runs on
/// this in-memory snapshot; there is no server-side date filtering.
pub async fn list_reservations(pool: &sqlx::PgPool) -> AppResult<Vec<Reservation>> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT row_to_json(t) AS row FROM {RESERVATIONS_TABLE} t"
    ));
    query.push(" ORDER BY t.start_date ASC");

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_rows(rows).iter().map(decode_reservation).collect())
}

pub async fn list_units(pool: &sqlx::PgPool) -> AppResult<Vec<Unit>> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT row_to_json(t) AS row FROM {UNITS_TABLE} t"
    ));
    query.push(" ORDER BY t.name ASC");

    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_rows(rows).iter().map(decode_unit).collect())
}

pub async fn get_reservation(pool: &sqlx::PgPool, id: &str) -> AppResult<Reservation> {
    let row_id = parse_row_id(id)?;
    let mut query =
        QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM reservations t WHERE t.id = ");
    query.push_bind(row_id).push(" LIMIT 1");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .map(|value| decode_reservation(&value))
        .ok_or_else(|| AppError::NotFound(format!("{RESERVATIONS_TABLE} record not found.")))
}

/// Create when `id` is absent, update otherwise. Returns the stored row's
/// id. `created_at` is assigned by the table default and never rewritten.
pub async fn write_reservation(
    pool: &sqlx::PgPool,
    id: Option<&str>,
    payload: &Map<String, Value>,
) -> AppResult<String> {
    let stored = match id {
        None => insert_reservation(pool, payload).await?,
        Some(id) => update_reservation_row(pool, id, payload).await?,
    };
    let stored_id = value_str(&stored, "id");
    if stored_id.is_empty() {
        return Err(AppError::Internal(
            "Stored reservation has no id.".to_string(),
        ));
    }
    Ok(stored_id)
}

pub async fn delete_reservation(pool: &sqlx::PgPool, id: &str) -> AppResult<()> {
    let row_id = parse_row_id(id)?;
    let mut query = QueryBuilder::<Postgres>::new("DELETE FROM reservations t WHERE t.id = ");
    query.push_bind(row_id);

    let result = query.build().execute(pool).await.map_err(map_db_error)?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "{RESERVATIONS_TABLE} record not found."
        )));
    }
    Ok(())
}

async fn insert_reservation(
    pool: &sqlx::PgPool,
    payload: &Map<String, Value>,
) -> AppResult<Value> {
    if payload.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Could not create {RESERVATIONS_TABLE} record."
        )));
    }
    let keys = sorted_keys(payload)?;

    // jsonb_populate_record lets PostgreSQL resolve column types (uuid,
    // date, numeric, jsonb) from the table definition.
    let mut query = QueryBuilder::<Postgres>::new("INSERT INTO ");
    query.push(RESERVATIONS_TABLE).push(" (");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push(key.as_str());
        }
    }
    query.push(") SELECT ");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push("r.");
            separated.push_unseparated(key.as_str());
        }
    }
    query
        .push(" FROM jsonb_populate_record(NULL::")
        .push(RESERVATIONS_TABLE)
        .push(", ");
    query.push_bind(Value::Object(payload.clone()));
    query
        .push(") r RETURNING row_to_json(")
        .push(RESERVATIONS_TABLE)
        .push(".*) AS row");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .ok_or_else(|| {
            AppError::Internal(format!("Could not create {RESERVATIONS_TABLE} record."))
        })
}

async fn update_reservation_row(
    pool: &sqlx::PgPool,
    id: &str,
    payload: &Map<String, Value>,
) -> AppResult<Value> {
    let row_id = parse_row_id(id)?;
    let mut patch = payload.clone();
    patch.remove("created_at");
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }
    let keys = sorted_keys(&patch)?;

    let mut query = QueryBuilder::<Postgres>::new("UPDATE ");
    query.push(RESERVATIONS_TABLE).push(" t SET ");
    {
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push(key.as_str());
            separated.push_unseparated(" = r.");
            separated.push_unseparated(key.as_str());
        }
    }
    query
        .push(" FROM jsonb_populate_record(NULL::")
        .push(RESERVATIONS_TABLE)
        .push(", ");
    query.push_bind(Value::Object(patch));
    query.push(") r WHERE t.id = ");
    query.push_bind(row_id);
    query.push(" RETURNING row_to_json(t) AS row");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .ok_or_else(|| AppError::NotFound(format!("{RESERVATIONS_TABLE} record not found.")))
}

/// Decodes a stored reservation row. Total: malformed fields degrade one by
/// one (fallback dates, zero prices, active status) instead of dropping the
/// row or failing the fetch.
pub fn decode_reservation(row: &Value) -> Reservation {
    let start = to_valid_date(field(row, "start_date"));
    let end = to_valid_date(field(row, "end_date"));
    let created_at = to_valid_date(field(row, "created_at"));

    let is_multi_unit = bool_value(row.get("is_multi_unit"));
    let stakes = decode_stakes(row.get("unit_stakes"));
    let assignment = if is_multi_unit && !stakes.is_empty() {
        UnitAssignment::Multi(stakes)
    } else {
        if is_multi_unit {
            tracing::warn!(
                id = %value_str(row, "id"),
                "Multi-unit reservation without stakes, treating as single-unit"
            );
        }
        UnitAssignment::Single(value_str(row, "unit_name"))
    };

    Reservation {
        id: value_str(row, "id"),
        start_date: start.date(),
        end_date: end.date(),
        guest_name: value_str(row, "guest_name"),
        country: value_str(row, "country"),
        phone: value_str(row, "phone"),
        adults: number_from_value(row.get("adults")) as u32,
        minors: number_from_value(row.get("minors")) as u32,
        currency: value_str(row, "currency"),
        price_per_night: decode_price_map(row.get("price_per_night")),
        tax_amount: number_from_value(row.get("tax_amount")),
        margin_amount: number_from_value(row.get("margin_amount")),
        total_price: number_from_value(row.get("total_price")),
        deposit_paid: bool_value(row.get("deposit_paid")),
        deposit_amount: number_from_value(row.get("deposit_amount")),
        deposit_date: decode_optional_date(row.get("deposit_date")),
        channel: value_str(row, "channel"),
        channel_contact: opt_str(row, "channel_contact"),
        external_ref: opt_str(row, "external_ref"),
        status: ReservationStatus::parse(&value_str(row, "status")),
        assignment,
        notes: value_str(row, "notes"),
        created_at: created_at.value,
    }
}

pub fn decode_unit(row: &Value) -> Unit {
    Unit {
        id: value_str(row, "id"),
        name: value_str(row, "name"),
        max_guests: number_from_value(row.get("max_guests")).max(0.0) as u32,
    }
}

fn decode_stakes(raw: Option<&Value>) -> Vec<UnitStake> {
    raw.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let unit_name = value_str(item, "unit_name");
                    if unit_name.is_empty() {
                        return None;
                    }
                    Some(UnitStake {
                        unit_name,
                        adults: number_from_value(item.get("adults")) as u32,
                        minors: number_from_value(item.get("minors")) as u32,
                        price_per_night: decode_price_map(item.get("price_per_night")),
                        total_price: number_from_value(item.get("total_price")),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn decode_price_map(raw: Option<&Value>) -> HashMap<String, f64> {
    raw.and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .map(|(currency, amount)| (currency.clone(), number_from_value(Some(amount))))
                .collect()
        })
        .unwrap_or_default()
}

fn decode_optional_date(raw: Option<&Value>) -> Option<chrono::NaiveDate> {
    let value = raw.filter(|value| !value.is_null())?;
    let normalized = to_valid_date(value);
    // An optional field must not be invented: unparseable means absent.
    if normalized.fallback {
        return None;
    }
    Some(normalized.date())
}

fn field<'a>(row: &'a Value, key: &str) -> &'a Value {
    row.as_object().and_then(|obj| obj.get(key)).unwrap_or(&Value::Null)
}

fn read_rows(rows: Vec<PgRow>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| row.try_get::<Option<Value>, _>("row").ok().flatten())
        .collect()
}

fn sorted_keys(payload: &Map<String, Value>) -> AppResult<Vec<String>> {
    let mut keys = payload.keys().cloned().collect::<Vec<_>>();
    keys.sort_unstable();
    for key in &keys {
        validate_identifier(key)?;
    }
    Ok(keys)
}

fn validate_identifier(identifier: &str) -> AppResult<&str> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "Identifier cannot be empty.".to_string(),
        ));
    }
    if !trimmed.chars().all(|character| {
        character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
    }) {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    if trimmed
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_digit())
    {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    Ok(trimmed)
}

fn parse_row_id(id: &str) -> AppResult<uuid::Uuid> {
    uuid::Uuid::parse_str(id.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid reservation id '{id}'.")))
}

pub(crate) fn value_str(row: &Value, key: &str) -> String {
    row.as_object()
        .and_then(|obj| obj.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

fn opt_str(row: &Value, key: &str) -> Option<String> {
    let text = value_str(row, key);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub(crate) fn number_from_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn bool_value(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => {
            let lower = text.trim().to_ascii_lowercase();
            lower == "true" || lower == "1"
        }
        Some(Value::Number(number)) => number.as_i64().is_some_and(|value| value != 0),
        _ => false,
    }
}

fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");

    if message.contains("23505")
        || message
            .to_ascii_lowercase()
            .contains("duplicate key value violates unique constraint")
    {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    AppError::Dependency("Database operation failed.".to_string())
}
