use chrono::NaiveDate;
use serde::Serialize;

use crate::dates::calculate_nights;
use crate::error::{AppError, AppResult};
use crate::model::{Reservation, Unit, UnitStake};
use crate::overlap::has_overlap;
use crate::schemas::{validate_input, AvailabilitySearchInput};

/// Units with no conflicting reservation over `[start, end)`. Voided
/// reservations are filtered inside the overlap check, so callers pass the
/// raw snapshot. A missing or inverted range yields an empty set — an
/// unbounded query must never read as "everything is free".
pub fn available_units<'a>(
    units: &'a [Unit],
    reservations: &[Reservation],
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<&str>,
) -> Vec<&'a Unit> {
    if end <= start {
        return Vec::new();
    }
    units
        .iter()
        .filter(|unit| !has_overlap(reservations, &unit.name, start, end, exclude_id))
        .collect()
}

/// Form-time deselection rule: after a date change, any selected stake whose
/// unit fell out of the available set is dropped along with its per-unit
/// detail, so selection state never references an unavailable unit.
pub fn retain_available_stakes(stakes: &mut Vec<UnitStake>, available: &[&Unit]) {
    stakes.retain(|stake| {
        let still_available = available.iter().any(|unit| unit.name == stake.unit_name);
        if !still_available {
            tracing::debug!(unit = %stake.unit_name, "Deselecting unit no longer available");
        }
        still_available
    });
}

/// Result of a public availability search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub nights: i64,
    pub available_units: Vec<String>,
    /// Available units ordered by capacity fit for the party.
    pub recommended: Vec<UnitRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitRecommendation {
    pub unit_name: String,
    pub max_guests: u32,
    pub fits_party: bool,
}

/// Guest-facing search: which units are free for the window, ranked by how
/// well their stated capacity matches `adults + children`.
pub fn search_availability(
    units: &[Unit],
    reservations: &[Reservation],
    query: &AvailabilitySearchInput,
) -> AppResult<AvailabilityReport> {
    validate_input(query)?;
    let start = parse_date(&query.start_date)?;
    let end = parse_date(&query.end_date)?;
    if end <= start {
        return Err(AppError::UnprocessableEntity(
            "End date must be after start date.".to_string(),
        ));
    }

    let party = query.adults + query.children;
    let free = available_units(units, reservations, start, end, None);

    let mut recommended = free.clone();
    recommended.sort_by(|left, right| {
        let left_fit = left.max_guests >= party;
        let right_fit = right.max_guests >= party;
        right_fit
            .cmp(&left_fit)
            .then_with(|| capacity_gap(left, party).cmp(&capacity_gap(right, party)))
            .then_with(|| left.name.cmp(&right.name))
    });

    Ok(AvailabilityReport {
        start_date: start,
        end_date: end,
        nights: calculate_nights(start, end),
        available_units: free.iter().map(|unit| unit.name.clone()).collect(),
        recommended: recommended
            .into_iter()
            .map(|unit| UnitRecommendation {
                unit_name: unit.name.clone(),
                max_guests: unit.max_guests,
                fits_party: unit.max_guests >= party,
            })
            .collect(),
    })
}

fn capacity_gap(unit: &Unit, party: u32) -> u32 {
    unit.max_guests.abs_diff(party)
}

pub(crate) fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Invalid ISO date.".to_string()))
}

#[cfg(test)]
mod tests {
    use crate::model::fixtures::{date, multi_reservation, reservation, unit};
    use crate::model::{ReservationStatus, UnitStake};
    use crate::schemas::AvailabilitySearchInput;

    use super::{available_units, retain_available_stakes, search_availability};

    #[test]
    fn multi_unit_booking_blocks_its_units_only() {
        let units = vec![unit("u1", "Norte", 4), unit("u2", "Sur", 2), unit("u3", "Este", 6)];
        let reservations = vec![multi_reservation(
            "y",
            &["Norte", "Sur"],
            date(2024, 4, 1),
            date(2024, 4, 5),
        )];

        let free = available_units(&units, &reservations, date(2024, 4, 2), date(2024, 4, 4), None);
        let names: Vec<&str> = free.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Este"]);
    }

    #[test]
    fn cancelled_reservations_free_their_units() {
        let units = vec![unit("u1", "Norte", 4)];
        let mut cancelled = reservation("x", "Norte", date(2024, 3, 10), date(2024, 3, 15));
        cancelled.status = ReservationStatus::Cancelled;

        let free = available_units(&units, &[cancelled], date(2024, 3, 12), date(2024, 3, 20), None);
        assert_eq!(free.len(), 1);
    }

    #[test]
    fn inverted_or_empty_range_yields_no_units() {
        let units = vec![unit("u1", "Norte", 4)];
        assert!(available_units(&units, &[], date(2024, 3, 15), date(2024, 3, 10), None).is_empty());
        assert!(available_units(&units, &[], date(2024, 3, 10), date(2024, 3, 10), None).is_empty());
    }

    #[test]
    fn exclude_id_keeps_the_edited_reservation_bookable() {
        let units = vec![unit("u1", "Norte", 4)];
        let reservations = vec![reservation("r9", "Norte", date(2024, 3, 10), date(2024, 3, 15))];

        let without = available_units(&units, &reservations, date(2024, 3, 10), date(2024, 3, 15), None);
        assert!(without.is_empty());
        let with = available_units(
            &units,
            &reservations,
            date(2024, 3, 10),
            date(2024, 3, 15),
            Some("r9"),
        );
        assert_eq!(with.len(), 1);
    }

    #[test]
    fn stakes_on_unavailable_units_are_deselected() {
        let units = vec![unit("u1", "Norte", 4), unit("u2", "Sur", 2), unit("u3", "Este", 6)];
        let reservations = vec![reservation("x", "Sur", date(2024, 5, 1), date(2024, 5, 10))];
        let free = available_units(&units, &reservations, date(2024, 5, 2), date(2024, 5, 4), None);

        let mut stakes = vec![
            UnitStake {
                unit_name: "Norte".to_string(),
                adults: 2,
                minors: 0,
                price_per_night: Default::default(),
                total_price: 0.0,
            },
            UnitStake {
                unit_name: "Sur".to_string(),
                adults: 1,
                minors: 1,
                price_per_night: Default::default(),
                total_price: 0.0,
            },
        ];
        retain_available_stakes(&mut stakes, &free);
        let kept: Vec<&str> = stakes.iter().map(|s| s.unit_name.as_str()).collect();
        assert_eq!(kept, vec!["Norte"]);
    }

    #[test]
    fn search_ranks_by_capacity_fit() {
        let units = vec![
            unit("u1", "Norte", 8),
            unit("u2", "Sur", 3),
            unit("u3", "Este", 4),
            unit("u4", "Oeste", 2),
        ];
        let query = AvailabilitySearchInput {
            start_date: "2024-06-01".to_string(),
            end_date: "2024-06-04".to_string(),
            adults: 2,
            children: 1,
        };
        let report = search_availability(&units, &[], &query).unwrap();
        assert_eq!(report.nights, 3);
        assert_eq!(report.available_units.len(), 4);

        let order: Vec<&str> = report
            .recommended
            .iter()
            .map(|r| r.unit_name.as_str())
            .collect();
        // Party of 3: exact fit first, then the smallest sufficient unit,
        // then the ones that do not fit.
        assert_eq!(order, vec!["Sur", "Este", "Norte", "Oeste"]);
        assert!(report.recommended[0].fits_party);
        assert!(!report.recommended[3].fits_party);
    }

    #[test]
    fn search_rejects_bad_ranges() {
        let units = vec![unit("u1", "Norte", 4)];
        let inverted = AvailabilitySearchInput {
            start_date: "2024-06-04".to_string(),
            end_date: "2024-06-01".to_string(),
            adults: 2,
            children: 0,
        };
        assert!(search_availability(&units, &[], &inverted).is_err());

        let garbage = AvailabilitySearchInput {
            start_date: "junio".to_string(),
            end_date: "2024-06-01".to_string(),
            adults: 2,
            children: 0,
        };
        assert!(search_availability(&units, &[], &garbage).is_err());
    }
}
