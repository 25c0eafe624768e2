use chrono::{Datelike, Days, NaiveDate};
use tracing::warn;

use crate::types::ServiceFrequency;

/// Compute the service date that follows `date` under `frequency`.
///
/// Returns `None` for frequencies that never repeat (One-Time, As-Needed);
/// callers treat that as "stop extending".
pub fn advance(date: NaiveDate, frequency: ServiceFrequency) -> Option<NaiveDate> {
    match frequency {
        ServiceFrequency::Weekly => date.checked_add_days(Days::new(7)),
        ServiceFrequency::BiWeekly => date.checked_add_days(Days::new(14)),
        ServiceFrequency::Monthly => add_one_month(date),
        ServiceFrequency::OneTime | ServiceFrequency::AsNeeded => None,
    }
}

/// Same day-of-month in the following month. Days past the end of the
/// shorter month roll over into the month after (Jan 31 -> Mar 3).
fn add_one_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_days(Days::new(u64::from(date.day0())));
    if next.is_none() {
        warn!(%date, "monthly advance overflowed the calendar");
    }
    next
}

/// Latest date on `date`'s cadence that is not after `today`, but only when
/// getting there takes at least `max_steps` advances.
///
/// Lets a series that fell far behind restart near today instead of spending
/// a whole pass on past occurrences. `None` when the gap is smaller.
pub fn catch_up(
    date: NaiveDate,
    frequency: ServiceFrequency,
    today: NaiveDate,
    max_steps: usize,
) -> Option<NaiveDate> {
    let mut current = date;
    let mut steps = 0;
    while let Some(next) = advance(current, frequency) {
        if next > today {
            break;
        }
        current = next;
        steps += 1;
    }
    (steps >= max_steps).then_some(current)
}

/// "Future" is strictly after the evaluation date; today itself is not future.
pub fn is_future(date: NaiveDate, today: NaiveDate) -> bool {
    date > today
}
