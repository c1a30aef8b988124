use serde::Serialize;

use crate::dates::month_window;
use crate::model::{Reservation, Unit};

/// Monthly dashboard figures derived from the reservation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct MonthlyStats {
    /// Reservations whose stay touches the month, any status.
    pub reservation_count: usize,
    /// Total price over the same set, voided reservations excluded.
    pub revenue: f64,
    /// Occupied-unit-nights over potential unit-nights, one decimal.
    pub occupancy_pct: f64,
}

/// Computes count, revenue and occupancy for the given month.
///
/// Stays are clipped to the half-open month window before counting nights,
/// so a stay spanning a boundary contributes each night to exactly one
/// month and a fully booked month reads exactly 100.0.
pub fn monthly_stats(
    reservations: &[Reservation],
    units: &[Unit],
    year: i32,
    month: u32,
) -> MonthlyStats {
    let Some((month_first, next_first)) = month_window(year, month) else {
        tracing::warn!(year, month, "Invalid month for stats query");
        return MonthlyStats::default();
    };
    let month_last = next_first.pred_opt().unwrap_or(month_first);
    let days_in_month = (next_first - month_first).num_days();

    let mut reservation_count = 0_usize;
    let mut revenue = 0.0_f64;
    let mut occupied_unit_nights = 0_i64;

    for reservation in reservations {
        // A stay is "in" the month when any of its nights falls inside it.
        let intersects =
            reservation.start_date <= month_last && reservation.end_date > month_first;
        if !intersects {
            continue;
        }
        reservation_count += 1;

        if reservation.status.is_voided() {
            continue;
        }
        revenue += reservation.total_price;

        let clipped_start = reservation.start_date.max(month_first);
        let clipped_end = reservation.end_date.min(next_first);
        let clipped_nights = (clipped_end - clipped_start).num_days().max(0);
        occupied_unit_nights += clipped_nights * reservation.assignment.unit_count() as i64;
    }

    let potential_unit_nights = units.len() as i64 * days_in_month;
    let occupancy_pct = if potential_unit_nights > 0 {
        round1(occupied_unit_nights as f64 / potential_unit_nights as f64 * 100.0)
    } else {
        0.0
    };

    MonthlyStats {
        reservation_count,
        revenue: round2(revenue),
        occupancy_pct,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
