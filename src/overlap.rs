use chrono::NaiveDate;

use crate::model::Reservation;

/// Returns true when some non-voided reservation other than `exclude_id`
/// claims `unit_name` for a window intersecting `[start, end)`.
///
/// Half-open on purpose: a stay ending on day D and one starting on day D
/// share a turnover day, not a conflict. Range validity (`end > start`) is
/// the caller's responsibility.
pub fn has_overlap(
    reservations: &[Reservation],
    unit_name: &str,
    start: NaiveDate,
    end: NaiveDate,
    exclude_id: Option<&str>,
) -> bool {
    reservations.iter().any(|existing| {
        if exclude_id.is_some_and(|id| id == existing.id) {
            return false;
        }
        if existing.status.is_voided() {
            return false;
        }
        if !existing.occupies_unit(unit_name) {
            return false;
        }
        start < existing.end_date && end > existing.start_date
    })
}
