use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::model::Reservation;

/// Check-ins and check-outs for one calendar day, voided stays excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct DailyOps {
    pub check_ins: Vec<Reservation>,
    pub check_outs: Vec<Reservation>,
}

/// Derives the day's arrivals and departures from the snapshot.
pub fn daily_ops(reservations: &[Reservation], day: NaiveDate) -> DailyOps {
    let mut ops = DailyOps::default();
    for reservation in reservations {
        if reservation.status.is_voided() {
            continue;
        }
        if reservation.start_date == day {
            ops.check_ins.push(reservation.clone());
        }
        if reservation.end_date == day {
            ops.check_outs.push(reservation.clone());
        }
    }
    ops
}

/// Billing follow-up flag: the stay is over and no deposit was ever logged.
/// Not a hard error, just something the front desk should chase.
pub fn needs_payment_alert(reservation: &Reservation, today: NaiveDate) -> bool {
    !reservation.deposit_paid && reservation.end_date < today
}

/// Convenience wrapper over [`needs_payment_alert`] anchored to the current
/// UTC date.
pub fn needs_payment_alert_now(reservation: &Reservation) -> bool {
    needs_payment_alert(reservation, Utc::now().date_naive())
}
