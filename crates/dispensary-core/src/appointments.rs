use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// First bookable hour (UTC) of the static slot schedule.
const FIRST_SLOT_HOUR: u32 = 10;
const SLOTS_PER_DAY: u32 = 8;

pub const DEFAULT_DOCTOR_NAME: &str = "Dr. Cannabis Specialist";
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    InitialConsultation,
    FollowUp,
    ProductRecommendation,
}

impl ConsultationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConsultationType::InitialConsultation => "initial_consultation",
            ConsultationType::FollowUp => "follow_up",
            ConsultationType::ProductRecommendation => "product_recommendation",
        }
    }
}

impl std::fmt::Display for ConsultationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hourly consultation slots for `date`, 10:00 through 17:00 UTC.
///
/// There is no conflict checking against booked appointments.
#[must_use]
pub fn available_slots(date: NaiveDate) -> Vec<DateTime<Utc>> {
    (0..SLOTS_PER_DAY)
        .filter_map(|i| date.and_hms_opt(FIRST_SLOT_HOUR + i, 0, 0))
        .map(|naive| naive.and_utc())
        .collect()
}

#[must_use]
pub fn generate_appointment_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::rng().random_range(0..10_000);
    format!("APT-{}-{suffix:04}", now.timestamp_millis())
}
