use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::clock::Clock;
use crate::engine::RecurrenceEngine;
use crate::store::JobStore;

/// Periodic trigger for [`RecurrenceEngine::sweep`].
///
/// The engine owns no timer; a host opts into this loop. Runs one sweep
/// immediately, then every `interval`, until `shutdown` broadcasts `true`.
pub async fn run_sweeper<S, C>(
    engine: &RecurrenceEngine<S, C>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: JobStore,
    C: Clock,
{
    info!(interval_secs = interval.as_secs(), "maintenance sweeper started");

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = engine.sweep() {
                    error!(code = e.code(), "maintenance sweep error: {e}");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("maintenance sweeper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::sqlite::SqliteStore;
    use crate::types::NewJob;
    use chrono::NaiveDate;
    use yardops_core::config::RecurrenceConfig;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn first_tick_sweeps_then_shutdown_stops_the_loop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let setup = RecurrenceEngine::with_clock(
            &store,
            FixedClock::on(d(2024, 1, 1)),
            RecurrenceConfig::default(),
        );
        setup
            .create_job(NewJob {
                customer_id: "ERLNS-0001".into(),
                scheduled_date: Some(d(2024, 1, 1)),
                service_frequency: "Weekly".into(),
                bid_type: "bid".into(),
                rate: 40.0,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.list_jobs().unwrap().len(), 5);

        // Two weeks on, only 01-22 and 01-29 are still ahead.
        let engine = RecurrenceEngine::with_clock(
            &store,
            FixedClock::on(d(2024, 1, 16)),
            RecurrenceConfig::default(),
        );
        let (tx, rx) = watch::channel(false);
        let stop_after_sweep = async {
            while store.list_jobs().unwrap().len() < 7 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tx.send(true).unwrap();
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(run_sweeper(&engine, Duration::from_secs(3600), rx), stop_after_sweep)
        })
        .await
        .expect("sweeper did not stop");

        assert_eq!(store.list_jobs().unwrap().len(), 7);
    }
}
