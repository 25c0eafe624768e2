//! Revenue analytics over invoiced routing records.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::pricing::dollars_per_man_hour;
use crate::types::{InvoiceStatus, Job, JobStatus, Routing};

/// Totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    /// `YYYY-MM`.
    pub month: String,
    pub revenue: f64,
    pub hours: f64,
    pub jobs: usize,
    /// Mean of the per-job dollars-per-man-hour figures.
    pub avg_dollars_per_hour: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub total_revenue: f64,
    pub total_hours: f64,
    pub avg_dollars_per_hour: f64,
    pub completed_jobs: usize,
    /// Chronological.
    pub monthly: Vec<MonthlyRevenue>,
}

/// Summarise every routing record whose invoice was sent.
pub fn revenue_summary(routing: &[Routing]) -> RevenueSummary {
    let mut total_revenue = 0.0;
    let mut total_hours = 0.0;
    let mut completed_jobs = 0;
    // (revenue, hours, sum of per-job $/h, jobs)
    let mut months: BTreeMap<(i32, u32), (f64, f64, f64, usize)> = BTreeMap::new();

    for r in routing.iter().filter(|r| r.invoice == InvoiceStatus::Yes) {
        total_revenue += r.revenue;
        total_hours += r.man_hours;
        completed_jobs += 1;

        let bucket = months
            .entry((r.date.year(), r.date.month()))
            .or_insert((0.0, 0.0, 0.0, 0));
        bucket.0 += r.revenue;
        bucket.1 += r.man_hours;
        bucket.2 += dollars_per_man_hour(r.revenue, r.man_hours);
        bucket.3 += 1;
    }

    let monthly = months
        .into_iter()
        .map(|((year, month), (revenue, hours, dph_sum, jobs))| MonthlyRevenue {
            month: format!("{year:04}-{month:02}"),
            revenue,
            hours,
            jobs,
            avg_dollars_per_hour: dph_sum / jobs as f64,
        })
        .collect();

    RevenueSummary {
        total_revenue,
        total_hours,
        avg_dollars_per_hour: dollars_per_man_hour(total_revenue, total_hours),
        completed_jobs,
        monthly,
    }
}

/// Jobs still waiting to be serviced.
pub fn scheduled_job_count(jobs: &[Job]) -> usize {
    jobs.iter()
        .filter(|j| j.status == JobStatus::Scheduled)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BidType;
    use chrono::NaiveDate;

    fn route(date: (i32, u32, u32), revenue: f64, hours: f64, invoice: InvoiceStatus) -> Routing {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        Routing {
            id: format!("{date}-1-J"),
            job_id: format!("J-{date}"),
            date,
            customer_id: "ERLNS-0001".into(),
            customer_name: String::new(),
            service_address: String::new(),
            job_type: "Mowing".into(),
            arrival: None,
            departure: None,
            man_hours: hours,
            bid_type: BidType::Bid,
            estimated_revenue: revenue,
            revenue,
            dollars_per_man_hour: 0.0,
            invoice,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn only_invoiced_records_count() {
        let summary = revenue_summary(&[
            route((2024, 1, 8), 50.0, 1.0, InvoiceStatus::Yes),
            route((2024, 1, 15), 70.0, 2.0, InvoiceStatus::No),
            route((2024, 1, 22), 90.0, 2.0, InvoiceStatus::Pending),
        ]);
        assert_eq!(summary.completed_jobs, 1);
        assert_eq!(summary.total_revenue, 50.0);
        assert_eq!(summary.avg_dollars_per_hour, 50.0);
    }

    #[test]
    fn months_are_bucketed_chronologically() {
        let summary = revenue_summary(&[
            route((2024, 2, 5), 60.0, 2.0, InvoiceStatus::Yes),
            route((2023, 12, 4), 40.0, 1.0, InvoiceStatus::Yes),
            route((2024, 2, 19), 60.0, 1.0, InvoiceStatus::Yes),
        ]);
        let months: Vec<_> = summary.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, ["2023-12", "2024-02"]);

        let feb = &summary.monthly[1];
        assert_eq!(feb.revenue, 120.0);
        assert_eq!(feb.hours, 3.0);
        assert_eq!(feb.jobs, 2);
        // (30 + 60) / 2
        assert_eq!(feb.avg_dollars_per_hour, 45.0);
        assert_eq!(summary.total_hours, 4.0);
        assert_eq!(summary.avg_dollars_per_hour, 40.0);
    }

    #[test]
    fn zero_hours_yield_zero_rate() {
        let summary = revenue_summary(&[route((2024, 3, 1), 80.0, 0.0, InvoiceStatus::Yes)]);
        assert_eq!(summary.avg_dollars_per_hour, 0.0);
        assert_eq!(summary.monthly[0].avg_dollars_per_hour, 0.0);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let summary = revenue_summary(&[]);
        assert_eq!(summary.completed_jobs, 0);
        assert!(summary.monthly.is_empty());
        assert_eq!(summary.avg_dollars_per_hour, 0.0);
    }
}
