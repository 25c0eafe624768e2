use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// How often a job repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceFrequency {
    #[serde(rename = "Weekly")]
    Weekly,
    #[serde(rename = "Bi-Weekly")]
    BiWeekly,
    #[serde(rename = "Monthly")]
    Monthly,
    #[serde(rename = "One-Time")]
    OneTime,
    #[serde(rename = "As-Needed")]
    AsNeeded,
}

impl ServiceFrequency {
    /// One-Time and As-Needed jobs never form a growing series.
    pub fn is_recurring(self) -> bool {
        !matches!(self, ServiceFrequency::OneTime | ServiceFrequency::AsNeeded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceFrequency::Weekly => "Weekly",
            ServiceFrequency::BiWeekly => "Bi-Weekly",
            ServiceFrequency::Monthly => "Monthly",
            ServiceFrequency::OneTime => "One-Time",
            ServiceFrequency::AsNeeded => "As-Needed",
        }
    }
}

impl std::fmt::Display for ServiceFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Weekly" => Ok(ServiceFrequency::Weekly),
            "Bi-Weekly" => Ok(ServiceFrequency::BiWeekly),
            "Monthly" => Ok(ServiceFrequency::Monthly),
            "One-Time" => Ok(ServiceFrequency::OneTime),
            "As-Needed" => Ok(ServiceFrequency::AsNeeded),
            other => Err(format!("unknown service frequency: {other}")),
        }
    }
}

/// Pricing model: flat bid or hourly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidType {
    Bid,
    Hourly,
}

impl std::fmt::Display for BidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BidType::Bid => "bid",
            BidType::Hourly => "hourly",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BidType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bid" => Ok(BidType::Bid),
            "hourly" => Ok(BidType::Hourly),
            other => Err(format!("unknown bid type: {other}")),
        }
    }
}

/// Lifecycle state of one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Scheduled,
    Pending,
    Complete,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Scheduled => "Scheduled",
            JobStatus::Pending => "Pending",
            JobStatus::Complete => "Complete",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(JobStatus::Scheduled),
            "Pending" => Ok(JobStatus::Pending),
            "Complete" => Ok(JobStatus::Complete),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Series-level switch. Only the value on the base job is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Active,
    Paused,
}

impl std::fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SeriesStatus::Active => "active",
            SeriesStatus::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SeriesStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(SeriesStatus::Active),
            "paused" => Ok(SeriesStatus::Paused),
            other => Err(format!("unknown series status: {other}")),
        }
    }
}

/// Invoice state on a routing record. `Yes` means the invoice was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    No,
    Pending,
    Yes,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvoiceStatus::No => "No",
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Yes => "Yes",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "No" => Ok(InvoiceStatus::No),
            "Pending" => Ok(InvoiceStatus::Pending),
            "Yes" => Ok(InvoiceStatus::Yes),
            other => Err(format!("unknown invoice status: {other}")),
        }
    }
}

/// One scheduled service occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Deterministic: `J-{series_id}-{scheduled_date}`.
    pub job_id: String,
    pub series_id: String,
    /// `job_id` of the series anchor. Equal to `job_id` on the base job itself.
    pub base_job_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub property_id: Option<String>,
    pub service_address: String,
    pub service_type: String,
    pub scheduled_date: NaiveDate,
    pub service_frequency: ServiceFrequency,
    pub bid_type: BidType,
    /// Normalized flat charge for this occurrence.
    pub rate: f64,
    pub hourly_rate: Option<f64>,
    pub man_hours: f64,
    /// Revenue recorded when the invoice went out.
    pub actual_rate: Option<f64>,
    pub notes: String,
    pub status: JobStatus,
    pub series_status: SeriesStatus,
    /// RFC 3339 timestamps.
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl Job {
    pub fn is_recurring(&self) -> bool {
        self.service_frequency.is_recurring()
    }

    pub fn is_base(&self) -> bool {
        self.job_id == self.base_job_id
    }

    pub fn is_paused(&self) -> bool {
        self.series_status == SeriesStatus::Paused
    }
}

/// Field-crew companion record to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    /// `{date}-{customer number}-{job_id}`.
    pub id: String,
    pub job_id: String,
    pub date: NaiveDate,
    pub customer_id: String,
    pub customer_name: String,
    pub service_address: String,
    pub job_type: String,
    /// Crew arrival on site.
    pub arrival: Option<NaiveTime>,
    /// Crew departure from site.
    pub departure: Option<NaiveTime>,
    pub man_hours: f64,
    pub bid_type: BidType,
    pub estimated_revenue: f64,
    pub revenue: f64,
    pub dollars_per_man_hour: f64,
    pub invoice: InvoiceStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Raw job input from the host (manual creation or lead conversion).
///
/// Enum-valued fields stay strings here so unknown values surface as
/// validation errors instead of deserialisation failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewJob {
    /// Join an existing series instead of starting a fresh one.
    pub series_id: Option<String>,
    pub customer_id: String,
    pub customer_name: String,
    pub property_id: Option<String>,
    pub service_address: String,
    pub service_type: String,
    pub scheduled_date: Option<NaiveDate>,
    pub service_frequency: String,
    pub bid_type: String,
    pub rate: f64,
    pub hourly_rate: Option<f64>,
    pub man_hours: f64,
    pub notes: String,
}

/// Mutable fields of a job, as submitted from the edit form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEdit {
    pub job_id: String,
    pub service_type: String,
    pub scheduled_date: NaiveDate,
    pub rate: f64,
    pub hourly_rate: Option<f64>,
    pub man_hours: f64,
    #[serde(default)]
    pub notes: String,
}

/// Which jobs an edit touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditScope {
    /// Only the targeted job.
    Single,
    /// The targeted job and every later occurrence in its series.
    Series,
}

/// Deterministic job ID; doubles as the idempotency key for `(series, date)`.
pub fn job_id_for(series_id: &str, date: NaiveDate) -> String {
    format!("J-{series_id}-{date}")
}

/// Composite routing key: date + customer number + job.
pub fn routing_id_for(date: NaiveDate, customer_id: &str, job_id: &str) -> String {
    format!("{date}-{}-{job_id}", customer_number(customer_id))
}

/// Numeric suffix of a customer ID (`ERLNS-0042` -> `42`), or the raw ID.
fn customer_number(customer_id: &str) -> String {
    customer_id
        .rsplit('-')
        .next()
        .and_then(|tail| tail.parse::<u64>().ok())
        .map(|n| n.to_string())
        .unwrap_or_else(|| customer_id.to_string())
}

/// Fresh series identifier for a newly created base job.
pub fn new_series_id() -> String {
    format!("series_{}", uuid::Uuid::now_v7().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_roundtrips_through_display() {
        for f in [
            ServiceFrequency::Weekly,
            ServiceFrequency::BiWeekly,
            ServiceFrequency::Monthly,
            ServiceFrequency::OneTime,
            ServiceFrequency::AsNeeded,
        ] {
            assert_eq!(f.to_string().parse::<ServiceFrequency>().unwrap(), f);
        }
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        assert!("Daily".parse::<ServiceFrequency>().is_err());
    }

    #[test]
    fn only_calendar_frequencies_recur() {
        assert!(ServiceFrequency::Weekly.is_recurring());
        assert!(ServiceFrequency::Monthly.is_recurring());
        assert!(!ServiceFrequency::OneTime.is_recurring());
        assert!(!ServiceFrequency::AsNeeded.is_recurring());
    }

    #[test]
    fn bid_type_parse_ignores_case() {
        assert_eq!("Hourly".parse::<BidType>().unwrap(), BidType::Hourly);
        assert_eq!("bid".parse::<BidType>().unwrap(), BidType::Bid);
    }

    #[test]
    fn job_id_is_keyed_by_series_and_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(job_id_for("series_1", date), "J-series_1-2024-01-08");
    }

    #[test]
    fn routing_id_uses_customer_number() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(
            routing_id_for(date, "ERLNS-0042", "J-s-2024-01-08"),
            "2024-01-08-42-J-s-2024-01-08"
        );
        assert_eq!(routing_id_for(date, "acme", "J1"), "2024-01-08-acme-J1");
    }

    #[test]
    fn frequency_serializes_with_hyphen() {
        let json = serde_json::to_string(&ServiceFrequency::BiWeekly).unwrap();
        assert_eq!(json, r#""Bi-Weekly""#);
    }
}
