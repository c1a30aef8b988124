use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::availability::parse_date;
use crate::dates::calculate_nights;
use crate::error::{AppError, AppResult};
use crate::model::{Reservation, ReservationStatus, UnitAssignment};
use crate::overlap::has_overlap;
use crate::repository::store;
use crate::schemas::{
    remove_nulls, serialize_to_map, validate_input, CreateReservationInput, UnitStakeInput,
    UpdateReservationInput,
};

/// Creates a reservation. Validation and the per-unit conflict check run
/// against a fresh snapshot before anything is written, so a multi-unit
/// booking either saves whole or not at all.
pub async fn create_reservation(
    pool: &sqlx::PgPool,
    input: &CreateReservationInput,
) -> AppResult<Reservation> {
    let prepared = prepare_write(input)?;

    let snapshot = store::list_reservations(pool).await?;
    ensure_no_conflicts(&snapshot, &prepared, None)?;

    let id = store::write_reservation(pool, None, &prepared.payload).await?;
    store::get_reservation(pool, &id).await
}

/// Edits a reservation in place. The existing record is merged with the
/// patch and revalidated as a whole; the record being edited is excluded
/// from its own conflict check.
pub async fn update_reservation(
    pool: &sqlx::PgPool,
    id: &str,
    patch: &UpdateReservationInput,
) -> AppResult<Reservation> {
    validate_input(patch)?;
    let existing = store::get_reservation(pool, id).await?;

    let mut merged = input_from_reservation(&existing);
    apply_patch(&mut merged, patch);
    let prepared = prepare_write(&merged)?;

    let snapshot = store::list_reservations(pool).await?;
    ensure_no_conflicts(&snapshot, &prepared, Some(id))?;

    let stored_id = store::write_reservation(pool, Some(id), &prepared.payload).await?;
    store::get_reservation(pool, &stored_id).await
}

/// Explicit lifecycle transition. Cancelling or marking no-show soft-voids
/// the record; time passing never changes a status on its own.
pub async fn change_status(
    pool: &sqlx::PgPool,
    id: &str,
    new_status: &str,
) -> AppResult<Reservation> {
    let target = ReservationStatus::from_token(new_status).ok_or_else(|| {
        AppError::UnprocessableEntity(format!("Unknown reservation status '{new_status}'."))
    })?;

    let existing = store::get_reservation(pool, id).await?;
    if existing.status == target {
        return Ok(existing);
    }
    if !allowed_transition(existing.status, target) {
        return Err(AppError::UnprocessableEntity(format!(
            "Invalid status transition: {} -> {}",
            existing.status.as_str(),
            target.as_str()
        )));
    }

    let mut payload = Map::new();
    payload.insert(
        "status".to_string(),
        Value::String(target.as_str().to_string()),
    );
    let stored_id = store::write_reservation(pool, Some(id), &payload).await?;
    store::get_reservation(pool, &stored_id).await
}

pub async fn delete_reservation(pool: &sqlx::PgPool, id: &str) -> AppResult<()> {
    store::delete_reservation(pool, id).await
}

pub fn allowed_transition(current: ReservationStatus, next: ReservationStatus) -> bool {
    use ReservationStatus::{Active, Cancelled, Confirmed, NoShow, Paid};
    matches!(
        (current, next),
        (Active, Confirmed | Cancelled | NoShow | Paid)
            | (Confirmed, Active | Cancelled | NoShow | Paid)
            | (Paid, Cancelled)
            // Voiding can be undone, back to the start of the lifecycle.
            | (Cancelled | NoShow, Active)
    )
}

struct PreparedWrite {
    start: NaiveDate,
    end: NaiveDate,
    claimed_units: Vec<String>,
    payload: Map<String, Value>,
}

fn prepare_write(input: &CreateReservationInput) -> AppResult<PreparedWrite> {
    validate_input(input)?;

    let start = parse_date(&input.start_date)?;
    let end = parse_date(&input.end_date)?;
    let nights = calculate_nights(start, end);
    if nights <= 0 {
        return Err(AppError::UnprocessableEntity(
            "End date must be after start date.".to_string(),
        ));
    }

    let status = ReservationStatus::from_token(&input.status).ok_or_else(|| {
        AppError::UnprocessableEntity(format!("Unknown reservation status '{}'.", input.status))
    })?;

    let mut payload = remove_nulls(serialize_to_map(input));
    payload.insert(
        "status".to_string(),
        Value::String(status.as_str().to_string()),
    );

    let claimed_units = if input.is_multi_unit {
        let stakes = input.unit_stakes.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| {
            AppError::UnprocessableEntity(
                "A multi-unit reservation needs between 1 and 4 units.".to_string(),
            )
        })?;

        let mut seen = HashSet::new();
        for stake in stakes {
            if !seen.insert(stake.unit_name.as_str()) {
                return Err(AppError::UnprocessableEntity(format!(
                    "Unit '{}' is listed more than once.",
                    stake.unit_name
                )));
            }
        }

        let stake_rows: Vec<Value> = stakes
            .iter()
            .map(|stake| stake_row(stake, &input.currency, nights))
            .collect();
        let total = input.total_price.unwrap_or_else(|| {
            stake_rows
                .iter()
                .map(|row| store::number_from_value(row.get("total_price")))
                .sum()
        });
        payload.insert("unit_stakes".to_string(), Value::Array(stake_rows));
        payload.remove("unit_name");
        payload.insert("total_price".to_string(), json_number(total));

        stakes.iter().map(|stake| stake.unit_name.clone()).collect()
    } else {
        let unit_name = input
            .unit_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                AppError::UnprocessableEntity("A reservation needs a unit.".to_string())
            })?;

        let nightly = input
            .price_per_night
            .get(&input.currency)
            .copied()
            .unwrap_or(0.0);
        let total = input.total_price.unwrap_or(nightly * nights as f64);
        payload.remove("unit_stakes");
        payload.insert("total_price".to_string(), json_number(total));

        vec![unit_name.to_string()]
    };

    Ok(PreparedWrite {
        start,
        end,
        claimed_units,
        payload,
    })
}

/// All-or-nothing conflict gate: the first claimed unit that overlaps an
/// existing stay aborts the whole write, named in the error.
fn ensure_no_conflicts(
    snapshot: &[Reservation],
    prepared: &PreparedWrite,
    exclude_id: Option<&str>,
) -> AppResult<()> {
    for unit_name in &prepared.claimed_units {
        if has_overlap(snapshot, unit_name, prepared.start, prepared.end, exclude_id) {
            return Err(AppError::Conflict(format!(
                "Unit '{unit_name}' is already reserved for the selected dates."
            )));
        }
    }
    Ok(())
}

fn stake_row(stake: &UnitStakeInput, currency: &str, nights: i64) -> Value {
    let nightly = stake.price_per_night.get(currency).copied().unwrap_or(0.0);
    let mut row = serialize_to_map(stake);
    row.insert(
        "total_price".to_string(),
        json_number(nightly * nights as f64),
    );
    Value::Object(row)
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn input_from_reservation(existing: &Reservation) -> CreateReservationInput {
    let (unit_name, unit_stakes) = match &existing.assignment {
        UnitAssignment::Single(name) => (Some(name.clone()), None),
        UnitAssignment::Multi(stakes) => (
            None,
            Some(
                stakes
                    .iter()
                    .map(|stake| UnitStakeInput {
                        unit_name: stake.unit_name.clone(),
                        adults: stake.adults,
                        minors: stake.minors,
                        price_per_night: stake.price_per_night.clone(),
                    })
                    .collect(),
            ),
        ),
    };

    CreateReservationInput {
        start_date: existing.start_date.to_string(),
        end_date: existing.end_date.to_string(),
        guest_name: existing.guest_name.clone(),
        country: existing.country.clone(),
        phone: existing.phone.clone(),
        adults: existing.adults,
        minors: existing.minors,
        currency: existing.currency.clone(),
        price_per_night: existing.price_per_night.clone(),
        tax_amount: existing.tax_amount,
        margin_amount: existing.margin_amount,
        total_price: Some(existing.total_price),
        deposit_paid: existing.deposit_paid,
        deposit_amount: existing.deposit_amount,
        deposit_date: existing.deposit_date.map(|date| date.to_string()),
        channel: existing.channel.clone(),
        channel_contact: existing.channel_contact.clone(),
        external_ref: existing.external_ref.clone(),
        status: existing.status.as_str().to_string(),
        is_multi_unit: existing.assignment.is_multi_unit(),
        unit_name,
        unit_stakes,
        notes: existing.notes.clone(),
    }
}

fn apply_patch(base: &mut CreateReservationInput, patch: &UpdateReservationInput) {
    let dates_changed = patch.start_date.is_some() || patch.end_date.is_some();
    let prices_changed = patch.price_per_night.is_some()
        || patch.unit_stakes.is_some()
        || patch.currency.is_some();

    if let Some(value) = &patch.start_date {
        base.start_date = value.clone();
    }
    if let Some(value) = &patch.end_date {
        base.end_date = value.clone();
    }
    if let Some(value) = &patch.guest_name {
        base.guest_name = value.clone();
    }
    if let Some(value) = &patch.country {
        base.country = value.clone();
    }
    if let Some(value) = &patch.phone {
        base.phone = value.clone();
    }
    if let Some(value) = patch.adults {
        base.adults = value;
    }
    if let Some(value) = patch.minors {
        base.minors = value;
    }
    if let Some(value) = &patch.currency {
        base.currency = value.clone();
    }
    if let Some(value) = &patch.price_per_night {
        base.price_per_night = value.clone();
    }
    if let Some(value) = patch.tax_amount {
        base.tax_amount = value;
    }
    if let Some(value) = patch.margin_amount {
        base.margin_amount = value;
    }
    if let Some(value) = patch.deposit_paid {
        base.deposit_paid = value;
    }
    if let Some(value) = patch.deposit_amount {
        base.deposit_amount = value;
    }
    if let Some(value) = &patch.deposit_date {
        base.deposit_date = Some(value.clone());
    }
    if let Some(value) = &patch.channel {
        base.channel = value.clone();
    }
    if let Some(value) = &patch.channel_contact {
        base.channel_contact = Some(value.clone());
    }
    if let Some(value) = &patch.external_ref {
        base.external_ref = Some(value.clone());
    }
    if let Some(value) = patch.is_multi_unit {
        base.is_multi_unit = value;
    }
    if let Some(value) = &patch.unit_name {
        base.unit_name = Some(value.clone());
    }
    if let Some(value) = &patch.unit_stakes {
        base.unit_stakes = Some(value.clone());
    }
    if let Some(value) = &patch.notes {
        base.notes = value.clone();
    }

    // An explicit override wins; otherwise a date or price change drops the
    // stored total so it is recomputed from the merged values.
    match patch.total_price {
        Some(value) => base.total_price = Some(value),
        None if dates_changed || prices_changed => base.total_price = None,
        None => {}
    }
}
