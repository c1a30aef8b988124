use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::dates::calculate_nights;

/// Lifecycle status of a reservation. Cancelled and no-show records are
/// soft-voided: they stay in the collection but are invisible to overlap
/// checks, occupancy and revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Confirmed,
    Cancelled,
    NoShow,
    Paid,
}

impl ReservationStatus {
    /// Strict token lookup, for caller-supplied statuses.
    pub fn from_token(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" | "activa" => Some(Self::Active),
            "confirmed" | "confirmada" => Some(Self::Confirmed),
            "cancelled" | "cancelada" => Some(Self::Cancelled),
            "no_presentado" | "no_show" => Some(Self::NoShow),
            "pagado" | "paid" => Some(Self::Paid),
            _ => None,
        }
    }

    /// Decodes a stored status token. Unknown tokens degrade to `Active`
    /// with a warning rather than failing the whole fetch.
    pub fn parse(raw: &str) -> Self {
        Self::from_token(raw).unwrap_or_else(|| {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                tracing::warn!(status = trimmed, "Unknown reservation status, treating as active");
            }
            Self::Active
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_presentado",
            Self::Paid => "pagado",
        }
    }

    /// Voided reservations never conflict and never earn.
    pub fn is_voided(self) -> bool {
        matches!(self, Self::Cancelled | Self::NoShow)
    }
}

/// Per-unit detail of a multi-unit reservation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitStake {
    pub unit_name: String,
    pub adults: u32,
    pub minors: u32,
    /// Nightly price keyed by currency code; missing entries read as zero.
    pub price_per_night: HashMap<String, f64>,
    /// Total for this unit over the whole stay.
    pub total_price: f64,
}

/// Unit assignment of a reservation: one named unit, or up to four stakes.
/// Modeled as a union so the overlap check is exhaustive by construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UnitAssignment {
    Single(String),
    Multi(Vec<UnitStake>),
}

/// Product cap on simultaneous units in one reservation.
pub const MAX_MULTI_UNIT_STAKES: usize = 4;

impl UnitAssignment {
    pub fn occupies(&self, unit_name: &str) -> bool {
        match self {
            Self::Single(name) => name == unit_name,
            Self::Multi(stakes) => stakes.iter().any(|stake| stake.unit_name == unit_name),
        }
    }

    pub fn unit_names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Multi(stakes) => stakes.iter().map(|stake| stake.unit_name.as_str()).collect(),
        }
    }

    /// Number of units this reservation holds, for unit-night accounting.
    pub fn unit_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi(stakes) => stakes.len(),
        }
    }

    pub fn is_multi_unit(&self) -> bool {
        matches!(self, Self::Multi(_))
    }
}

/// A stay. `end_date` is exclusive: the guest departs that day and the unit
/// is free from it onward, so back-to-back stays share a turnover day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reservation {
    pub id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub guest_name: String,
    pub country: String,
    pub phone: String,
    pub adults: u32,
    pub minors: u32,
    pub currency: String,
    pub price_per_night: HashMap<String, f64>,
    pub tax_amount: f64,
    pub margin_amount: f64,
    pub total_price: f64,
    pub deposit_paid: bool,
    pub deposit_amount: f64,
    pub deposit_date: Option<NaiveDate>,
    pub channel: String,
    pub channel_contact: Option<String>,
    pub external_ref: Option<String>,
    pub status: ReservationStatus,
    pub assignment: UnitAssignment,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn occupies_unit(&self, unit_name: &str) -> bool {
        self.assignment.occupies(unit_name)
    }

    pub fn night_count(&self) -> i64 {
        calculate_nights(self.start_date, self.end_date)
    }

    /// Nightly price in the given currency; a missing entry reads as zero
    /// so one malformed record cannot take the dashboard down.
    pub fn nightly_price(&self, currency: &str) -> f64 {
        self.price_per_night.get(currency).copied().unwrap_or(0.0)
    }
}

/// A rentable cabin/apartment. Capacity feeds the search ranking only;
/// the scheduling core identifies units by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub max_guests: u32,
}


#[cfg(test)]
mod tests {
    use super::fixtures::{date, multi_reservation, reservation};
    use super::ReservationStatus;

    #[test]
    fn status_tokens_round_trip() {
        assert_eq!(ReservationStatus::parse("no_presentado"), ReservationStatus::NoShow);
        assert_eq!(ReservationStatus::parse("pagado"), ReservationStatus::Paid);
        assert_eq!(ReservationStatus::parse("Confirmed"), ReservationStatus::Confirmed);
        assert_eq!(ReservationStatus::parse("???"), ReservationStatus::Active);
        assert_eq!(ReservationStatus::NoShow.as_str(), "no_presentado");
    }

    #[test]
    fn voided_statuses() {
        assert!(ReservationStatus::Cancelled.is_voided());
        assert!(ReservationStatus::NoShow.is_voided());
        assert!(!ReservationStatus::Active.is_voided());
        assert!(!ReservationStatus::Paid.is_voided());
    }

    #[test]
    fn assignment_occupancy_is_per_unit() {
        let single = reservation("r1", "Norte", date(2024, 3, 10), date(2024, 3, 15));
        assert!(single.occupies_unit("Norte"));
        assert!(!single.occupies_unit("Sur"));

        let multi = multi_reservation("r2", &["Norte", "Sur"], date(2024, 4, 1), date(2024, 4, 5));
        assert!(multi.occupies_unit("Norte"));
        assert!(multi.occupies_unit("Sur"));
        assert!(!multi.occupies_unit("Este"));
        assert_eq!(multi.assignment.unit_count(), 2);
    }

    #[test]
    fn missing_currency_reads_as_zero() {
        let record = reservation("r1", "Norte", date(2024, 3, 10), date(2024, 3, 15));
        assert_eq!(record.nightly_price("USD"), 100.0);
        assert_eq!(record.nightly_price("EUR"), 0.0);
    }

    #[test]
    fn night_count_follows_the_stay_window() {
        let record = reservation("r1", "Norte", date(2024, 3, 10), date(2024, 3, 15));
        assert_eq!(record.night_count(), 5);
    }
}
