//! Rate normalization and visit-time arithmetic.
//!
//! `rate` on a job is always the flat charge for one occurrence: the bid
//! amount for bid jobs, `hourly_rate * man_hours` for hourly jobs.

use chrono::NaiveTime;

use crate::error::{RecurrenceError, Result};
use crate::types::{BidType, Job};

/// Round to cents.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Flat charge for one occurrence under `bid_type`.
pub fn normalized_rate(
    bid_type: BidType,
    rate: f64,
    hourly_rate: Option<f64>,
    man_hours: f64,
) -> f64 {
    match bid_type {
        BidType::Hourly => hourly_rate.unwrap_or(0.0) * man_hours,
        BidType::Bid => rate,
    }
}

/// `rate / man_hours`, or 0 when no hours are booked.
pub fn dollars_per_man_hour(rate: f64, man_hours: f64) -> f64 {
    if man_hours > 0.0 {
        rate / man_hours
    } else {
        0.0
    }
}

/// Worked hours between arrival and departure, rounded to 2 decimals.
///
/// `None` when either time is missing or departure is not after arrival.
pub fn worked_hours(arrival: Option<NaiveTime>, departure: Option<NaiveTime>) -> Option<f64> {
    let (arrival, departure) = (arrival?, departure?);
    if departure <= arrival {
        return None;
    }
    let minutes = (departure - arrival).num_minutes();
    Some(round2(minutes as f64 / 60.0))
}

/// Parse an `HH:MM` time of day as entered by the crew.
pub fn parse_hhmm(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| RecurrenceError::Validation(format!("invalid time '{raw}': {e}")))
}

/// Derived routing figures for one visit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisitFigures {
    pub man_hours: f64,
    pub revenue: f64,
    pub dollars_per_man_hour: f64,
}

/// Routing figures for `job` given the hours actually worked.
///
/// Hours never change what a bid job charges.
pub fn visit_figures(job: &Job, hours: Option<f64>) -> VisitFigures {
    let hourly_rate = job.hourly_rate.unwrap_or(0.0);
    match (job.bid_type, hours) {
        (BidType::Hourly, Some(h)) => VisitFigures {
            man_hours: h,
            revenue: round2(hourly_rate * h),
            dollars_per_man_hour: hourly_rate,
        },
        (BidType::Bid, Some(h)) => VisitFigures {
            man_hours: h,
            revenue: job.rate,
            dollars_per_man_hour: round2(dollars_per_man_hour(job.rate, h)),
        },
        (BidType::Hourly, None) => VisitFigures {
            man_hours: 0.0,
            revenue: 0.0,
            dollars_per_man_hour: hourly_rate,
        },
        (BidType::Bid, None) => VisitFigures {
            man_hours: 0.0,
            revenue: job.rate,
            dollars_per_man_hour: 0.0,
        },
    }
}

/// Reject negative or non-finite money/time amounts.
pub fn check_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RecurrenceError::Validation(format!(
            "{field} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

/// Shared validation for the pricing triple on create and edit.
pub fn check_pricing(
    bid_type: BidType,
    rate: f64,
    hourly_rate: Option<f64>,
    man_hours: f64,
) -> Result<()> {
    check_amount("rate", rate)?;
    check_amount("manHours", man_hours)?;
    match (bid_type, hourly_rate) {
        (_, Some(h)) => check_amount("hourlyRate", h),
        (BidType::Hourly, None) => Err(RecurrenceError::Validation(
            "hourly jobs need an hourlyRate".to_string(),
        )),
        (BidType::Bid, None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobStatus, SeriesStatus, ServiceFrequency};
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn job(bid_type: BidType, rate: f64, hourly_rate: Option<f64>) -> Job {
        Job {
            job_id: "J1".into(),
            series_id: "s1".into(),
            base_job_id: "J1".into(),
            customer_id: "ERLNS-0001".into(),
            customer_name: "Pat Doe".into(),
            property_id: None,
            service_address: "1 Elm St".into(),
            service_type: "Mowing".into(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            service_frequency: ServiceFrequency::Weekly,
            bid_type,
            rate,
            hourly_rate,
            man_hours: 2.0,
            actual_rate: None,
            notes: String::new(),
            status: JobStatus::Scheduled,
            series_status: SeriesStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
            completed_at: None,
        }
    }

    #[test]
    fn hourly_rate_is_hours_times_rate() {
        assert_eq!(normalized_rate(BidType::Hourly, 999.0, Some(30.0), 2.5), 75.0);
    }

    #[test]
    fn bid_rate_ignores_hours() {
        assert_eq!(normalized_rate(BidType::Bid, 60.0, None, 1.0), 60.0);
        assert_eq!(normalized_rate(BidType::Bid, 60.0, None, 9.0), 60.0);
    }

    #[test]
    fn dollars_per_hour_zero_without_hours() {
        assert_eq!(dollars_per_man_hour(80.0, 0.0), 0.0);
        assert_eq!(dollars_per_man_hour(80.0, 2.0), 40.0);
    }

    #[test]
    fn worked_hours_from_times() {
        assert_eq!(worked_hours(t(9, 0), t(11, 30)), Some(2.5));
        assert_eq!(worked_hours(t(9, 0), t(9, 20)), Some(0.33));
    }

    #[test]
    fn worked_hours_never_negative() {
        assert_eq!(worked_hours(t(11, 0), t(9, 0)), None);
        assert_eq!(worked_hours(t(9, 0), t(9, 0)), None);
        assert_eq!(worked_hours(None, t(9, 0)), None);
        assert_eq!(worked_hours(t(9, 0), None), None);
    }

    #[test]
    fn hourly_visit_figures() {
        let figures = visit_figures(&job(BidType::Hourly, 60.0, Some(30.0)), Some(2.5));
        assert_eq!(figures.man_hours, 2.5);
        assert_eq!(figures.revenue, 75.0);
        assert_eq!(figures.dollars_per_man_hour, 30.0);
    }

    #[test]
    fn bid_visit_revenue_stays_flat() {
        let figures = visit_figures(&job(BidType::Bid, 100.0, None), Some(3.0));
        assert_eq!(figures.revenue, 100.0);
        assert_eq!(figures.dollars_per_man_hour, 33.33);
    }

    #[test]
    fn invalid_times_reset_hours() {
        let hourly = visit_figures(&job(BidType::Hourly, 60.0, Some(30.0)), None);
        assert_eq!(hourly.man_hours, 0.0);
        assert_eq!(hourly.revenue, 0.0);
        assert_eq!(hourly.dollars_per_man_hour, 30.0);

        let bid = visit_figures(&job(BidType::Bid, 45.0, None), None);
        assert_eq!(bid.revenue, 45.0);
        assert_eq!(bid.dollars_per_man_hour, 0.0);
    }

    #[test]
    fn parse_hhmm_accepts_crew_times() {
        assert_eq!(parse_hhmm("09:05").unwrap(), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert!(parse_hhmm("9am").is_err());
    }

    #[test]
    fn pricing_validation() {
        assert!(check_pricing(BidType::Bid, 50.0, None, 1.0).is_ok());
        assert!(check_pricing(BidType::Bid, -1.0, None, 1.0).is_err());
        assert!(check_pricing(BidType::Bid, f64::NAN, None, 1.0).is_err());
        assert!(check_pricing(BidType::Hourly, 0.0, None, 1.0).is_err());
        assert!(check_pricing(BidType::Hourly, 0.0, Some(-5.0), 1.0).is_err());
        assert!(check_pricing(BidType::Hourly, 0.0, Some(30.0), 2.0).is_ok());
    }
}
