use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::{debug, instrument};

use crate::db::init_db;
use crate::error::{RecurrenceError, Result};
use crate::store::{JobStore, WriteBatch, WriteOp};
use crate::types::{Job, Routing};

const JOB_COLUMNS: &str = "job_id, series_id, base_job_id, customer_id, customer_name,
     property_id, service_address, service_type, scheduled_date, service_frequency,
     bid_type, rate, hourly_rate, man_hours, actual_rate, notes, status,
     series_status, created_at, updated_at, completed_at";

const ROUTING_COLUMNS: &str = "id, job_id, date, customer_id, customer_name,
     service_address, job_type, arrival, departure, man_hours, bid_type,
     estimated_revenue, revenue, dollars_per_man_hour, invoice, created_at, updated_at";

/// [`JobStore`] backed by a single SQLite connection.
///
/// Each [`WriteBatch`] runs inside one transaction, so a failing operation
/// rolls back everything queued before it.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap `conn`, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| RecurrenceError::Persistence("store lock poisoned".to_string()))
    }

    fn query_jobs(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Job>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_job)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_job(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Job>> {
        let db = self.conn()?;
        Ok(db.query_row(sql, params, row_to_job).optional()?)
    }

    fn query_routing(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Routing>> {
        let db = self.conn()?;
        Ok(db.query_row(sql, params, row_to_routing).optional()?)
    }
}

impl JobStore for SqliteStore {
    fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        self.query_job(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = ?1"),
            [job_id],
        )
    }

    fn job_on_date(&self, series_id: &str, date: NaiveDate) -> Result<Option<Job>> {
        self.query_job(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE series_id = ?1 AND scheduled_date = ?2"),
            rusqlite::params![series_id, date.to_string()],
        )
    }

    fn jobs_in_series(&self, series_id: &str) -> Result<Vec<Job>> {
        self.query_jobs(
            &format!(
                "SELECT {JOB_COLUMNS} FROM jobs WHERE series_id = ?1 ORDER BY scheduled_date"
            ),
            [series_id],
        )
    }

    fn base_job(&self, series_id: &str) -> Result<Option<Job>> {
        self.query_job(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE series_id = ?1 AND job_id = base_job_id"),
            [series_id],
        )
    }

    fn list_series(&self) -> Result<Vec<String>> {
        let db = self.conn()?;
        let mut stmt = db.prepare("SELECT DISTINCT series_id FROM jobs ORDER BY series_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_jobs(&self) -> Result<Vec<Job>> {
        self.query_jobs(
            &format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY scheduled_date, job_id"),
            [],
        )
    }

    fn get_routing(&self, routing_id: &str) -> Result<Option<Routing>> {
        self.query_routing(
            &format!("SELECT {ROUTING_COLUMNS} FROM routing WHERE id = ?1"),
            [routing_id],
        )
    }

    fn routing_for_job(&self, job_id: &str) -> Result<Option<Routing>> {
        self.query_routing(
            &format!("SELECT {ROUTING_COLUMNS} FROM routing WHERE job_id = ?1"),
            [job_id],
        )
    }

    fn list_routing(&self) -> Result<Vec<Routing>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {ROUTING_COLUMNS} FROM routing ORDER BY date, id"
        ))?;
        let rows = stmt.query_map([], row_to_routing)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        for op in batch.into_ops() {
            apply_op(&tx, op)?;
        }
        tx.commit()?;
        debug!("batch committed");
        Ok(())
    }
}

// --- private helpers -------------------------------------------------------

fn apply_op(tx: &Transaction<'_>, op: WriteOp) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    match op {
        WriteOp::CreateJob(job) => {
            insert_job(tx, &job).map_err(|e| unique_violation(e, &job))?;
        }
        WriteOp::CreateRouting(routing) => insert_routing(tx, &routing)?,
        WriteOp::UpdateJob { job_id, patch } => {
            let mut job = tx
                .query_row(
                    &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = ?1"),
                    [&job_id],
                    row_to_job,
                )
                .optional()?
                .ok_or_else(|| RecurrenceError::JobNotFound { id: job_id.clone() })?;
            patch.apply(&mut job);
            job.updated_at = now;
            tx.execute("DELETE FROM jobs WHERE job_id = ?1", [&job_id])?;
            insert_job(tx, &job).map_err(|e| unique_violation(e, &job))?;
        }
        WriteOp::UpdateRouting { routing_id, patch } => {
            let mut routing = tx
                .query_row(
                    &format!("SELECT {ROUTING_COLUMNS} FROM routing WHERE id = ?1"),
                    [&routing_id],
                    row_to_routing,
                )
                .optional()?
                .ok_or_else(|| RecurrenceError::RoutingNotFound {
                    id: routing_id.clone(),
                })?;
            patch.apply(&mut routing);
            routing.updated_at = now;
            tx.execute("DELETE FROM routing WHERE id = ?1", [&routing_id])?;
            insert_routing(tx, &routing)?;
        }
        WriteOp::DeleteJob { job_id } => {
            let n = tx.execute("DELETE FROM jobs WHERE job_id = ?1", [&job_id])?;
            if n == 0 {
                return Err(RecurrenceError::JobNotFound { id: job_id });
            }
        }
        WriteOp::DeleteRouting { routing_id } => {
            let n = tx.execute("DELETE FROM routing WHERE id = ?1", [&routing_id])?;
            if n == 0 {
                return Err(RecurrenceError::RoutingNotFound { id: routing_id });
            }
        }
    }
    Ok(())
}

fn insert_job(tx: &Transaction<'_>, job: &Job) -> rusqlite::Result<usize> {
    tx.execute(
        &format!(
            "INSERT INTO jobs ({JOB_COLUMNS})
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)"
        ),
        rusqlite::params![
            job.job_id,
            job.series_id,
            job.base_job_id,
            job.customer_id,
            job.customer_name,
            job.property_id,
            job.service_address,
            job.service_type,
            job.scheduled_date.to_string(),
            job.service_frequency.to_string(),
            job.bid_type.to_string(),
            job.rate,
            job.hourly_rate,
            job.man_hours,
            job.actual_rate,
            job.notes,
            job.status.to_string(),
            job.series_status.to_string(),
            job.created_at,
            job.updated_at,
            job.completed_at,
        ],
    )
}

fn insert_routing(tx: &Transaction<'_>, routing: &Routing) -> Result<()> {
    tx.execute(
        &format!(
            "INSERT INTO routing ({ROUTING_COLUMNS})
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)"
        ),
        rusqlite::params![
            routing.id,
            routing.job_id,
            routing.date.to_string(),
            routing.customer_id,
            routing.customer_name,
            routing.service_address,
            routing.job_type,
            routing.arrival.map(format_hhmm),
            routing.departure.map(format_hhmm),
            routing.man_hours,
            routing.bid_type.to_string(),
            routing.estimated_revenue,
            routing.revenue,
            routing.dollars_per_man_hour,
            routing.invoice.to_string(),
            routing.created_at,
            routing.updated_at,
        ],
    )?;
    Ok(())
}

/// Map a `(series_id, scheduled_date)` collision to a consistency error.
/// Any other constraint hit (e.g. a duplicate `job_id`) stays a database error.
fn unique_violation(err: rusqlite::Error, job: &Job) -> RecurrenceError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, Some(ref msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("jobs.scheduled_date") =>
        {
            RecurrenceError::Consistency {
                series_id: job.series_id.clone(),
                date: job.scheduled_date,
            }
        }
        other => RecurrenceError::Database(other),
    }
}

fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Read a TEXT column and parse it, surfacing failures as conversion errors.
fn parse_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })
}

fn parse_time_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveTime::parse_from_str(&s, "%H:%M").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    })
    .transpose()
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        job_id: row.get(0)?,
        series_id: row.get(1)?,
        base_job_id: row.get(2)?,
        customer_id: row.get(3)?,
        customer_name: row.get(4)?,
        property_id: row.get(5)?,
        service_address: row.get(6)?,
        service_type: row.get(7)?,
        scheduled_date: parse_col(row, 8)?,
        service_frequency: parse_col(row, 9)?,
        bid_type: parse_col(row, 10)?,
        rate: row.get(11)?,
        hourly_rate: row.get(12)?,
        man_hours: row.get(13)?,
        actual_rate: row.get(14)?,
        notes: row.get(15)?,
        status: parse_col(row, 16)?,
        series_status: parse_col(row, 17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
        completed_at: row.get(20)?,
    })
}

fn row_to_routing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Routing> {
    Ok(Routing {
        id: row.get(0)?,
        job_id: row.get(1)?,
        date: parse_col(row, 2)?,
        customer_id: row.get(3)?,
        customer_name: row.get(4)?,
        service_address: row.get(5)?,
        job_type: row.get(6)?,
        arrival: parse_time_col(row, 7)?,
        departure: parse_time_col(row, 8)?,
        man_hours: row.get(9)?,
        bid_type: parse_col(row, 10)?,
        estimated_revenue: row.get(11)?,
        revenue: row.get(12)?,
        dollars_per_man_hour: row.get(13)?,
        invoice: parse_col(row, 14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JobPatch;
    use crate::types::{BidType, InvoiceStatus, JobStatus, SeriesStatus, ServiceFrequency};

    fn job(job_id: &str, date: NaiveDate) -> Job {
        Job {
            job_id: job_id.into(),
            series_id: "s1".into(),
            base_job_id: "J-base".into(),
            customer_id: "ERLNS-0001".into(),
            customer_name: "Pat Doe".into(),
            property_id: Some("P-1-1".into()),
            service_address: "1 Elm St".into(),
            service_type: "Mowing".into(),
            scheduled_date: date,
            service_frequency: ServiceFrequency::Weekly,
            bid_type: BidType::Bid,
            rate: 50.0,
            hourly_rate: None,
            man_hours: 1.0,
            actual_rate: None,
            notes: String::new(),
            status: JobStatus::Scheduled,
            series_status: SeriesStatus::Active,
            created_at: "2024-01-01T00:00:00+00:00".into(),
            updated_at: "2024-01-01T00:00:00+00:00".into(),
            completed_at: None,
        }
    }

    fn routing(id: &str, job_id: &str, date: NaiveDate) -> Routing {
        Routing {
            id: id.into(),
            job_id: job_id.into(),
            date,
            customer_id: "ERLNS-0001".into(),
            customer_name: "Pat Doe".into(),
            service_address: "1 Elm St".into(),
            job_type: "Mowing".into(),
            arrival: NaiveTime::from_hms_opt(9, 0, 0),
            departure: None,
            man_hours: 1.0,
            bid_type: BidType::Bid,
            estimated_revenue: 50.0,
            revenue: 50.0,
            dollars_per_man_hour: 50.0,
            invoice: InvoiceStatus::No,
            created_at: "2024-01-01T00:00:00+00:00".into(),
            updated_at: "2024-01-01T00:00:00+00:00".into(),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn job_and_routing_round_trip_through_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut batch = WriteBatch::new();
        batch
            .create_job(job("J1", d(2024, 1, 1)))
            .create_routing(routing("R1", "J1", d(2024, 1, 1)));
        store.commit(batch).unwrap();

        assert_eq!(store.get_job("J1").unwrap().unwrap(), job("J1", d(2024, 1, 1)));
        let r = store.routing_for_job("J1").unwrap().unwrap();
        assert_eq!(r, routing("R1", "J1", d(2024, 1, 1)));
        assert_eq!(store.get_routing("R1").unwrap().unwrap().job_id, "J1");
    }

    #[test]
    fn series_jobs_come_back_in_date_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut batch = WriteBatch::new();
        batch
            .create_job(job("J3", d(2024, 1, 15)))
            .create_job(job("J1", d(2024, 1, 1)))
            .create_job(job("J2", d(2024, 1, 8)));
        store.commit(batch).unwrap();

        let ids: Vec<_> = store
            .jobs_in_series("s1")
            .unwrap()
            .into_iter()
            .map(|j| j.job_id)
            .collect();
        assert_eq!(ids, ["J1", "J2", "J3"]);
        assert_eq!(store.list_series().unwrap(), ["s1"]);
    }

    #[test]
    fn duplicate_series_date_is_a_consistency_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut first = WriteBatch::new();
        first.create_job(job("J1", d(2024, 1, 1)));
        store.commit(first).unwrap();

        let mut second = WriteBatch::new();
        second.create_job(job("J1-other", d(2024, 1, 1)));
        let err = store.commit(second).unwrap_err();
        assert!(matches!(err, RecurrenceError::Consistency { .. }));
    }

    #[test]
    fn duplicate_job_id_is_not_a_date_collision() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut first = WriteBatch::new();
        first.create_job(job("J1", d(2024, 1, 1)));
        store.commit(first).unwrap();

        let mut second = WriteBatch::new();
        second.create_job(job("J1", d(2024, 1, 8)));
        let err = store.commit(second).unwrap_err();
        assert!(matches!(err, RecurrenceError::Database(_)));
        assert!(store.job_on_date("s1", d(2024, 1, 8)).unwrap().is_none());
    }

    #[test]
    fn failed_batch_leaves_nothing_behind() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut batch = WriteBatch::new();
        batch
            .create_job(job("J1", d(2024, 1, 1)))
            .create_routing(routing("R1", "J1", d(2024, 1, 1)))
            .update_job("missing", JobPatch::default());
        let err = store.commit(batch).unwrap_err();

        assert!(matches!(err, RecurrenceError::JobNotFound { .. }));
        assert!(store.get_job("J1").unwrap().is_none());
        assert!(store.get_routing("R1").unwrap().is_none());
    }

    #[test]
    fn update_applies_patch_and_keeps_other_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut batch = WriteBatch::new();
        batch.create_job(job("J1", d(2024, 1, 1)));
        store.commit(batch).unwrap();

        let mut update = WriteBatch::new();
        update.update_job(
            "J1",
            JobPatch {
                notes: Some("gate code 1234".into()),
                status: Some(JobStatus::Complete),
                ..Default::default()
            },
        );
        store.commit(update).unwrap();

        let stored = store.get_job("J1").unwrap().unwrap();
        assert_eq!(stored.notes, "gate code 1234");
        assert_eq!(stored.status, JobStatus::Complete);
        assert_eq!(stored.rate, 50.0);
        assert_ne!(stored.updated_at, "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn delete_of_missing_row_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut batch = WriteBatch::new();
        batch.delete_routing("nope");
        assert!(matches!(
            store.commit(batch).unwrap_err(),
            RecurrenceError::RoutingNotFound { .. }
        ));
    }
}
