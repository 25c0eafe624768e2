use rusqlite::Connection;

use crate::error::Result;

/// Initialise the recurrence schema in `conn`.
///
/// Creates the `jobs` and `routing` tables (idempotent). The unique index on
/// `(series_id, scheduled_date)` backs the one-occurrence-per-date rule even
/// if two writers race past the engine's own duplicate check.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            job_id            TEXT    NOT NULL PRIMARY KEY,
            series_id         TEXT    NOT NULL,
            base_job_id       TEXT    NOT NULL,
            customer_id       TEXT    NOT NULL,
            customer_name     TEXT    NOT NULL DEFAULT '',
            property_id       TEXT,
            service_address   TEXT    NOT NULL DEFAULT '',
            service_type      TEXT    NOT NULL DEFAULT '',
            scheduled_date    TEXT    NOT NULL,   -- YYYY-MM-DD
            service_frequency TEXT    NOT NULL,
            bid_type          TEXT    NOT NULL,
            rate              REAL    NOT NULL DEFAULT 0,
            hourly_rate       REAL,
            man_hours         REAL    NOT NULL DEFAULT 0,
            actual_rate       REAL,
            notes             TEXT    NOT NULL DEFAULT '',
            status            TEXT    NOT NULL DEFAULT 'Scheduled',
            series_status     TEXT    NOT NULL DEFAULT 'active',
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL,
            completed_at      TEXT,
            UNIQUE (series_id, scheduled_date)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS routing (
            id                   TEXT NOT NULL PRIMARY KEY,
            job_id               TEXT NOT NULL UNIQUE,
            date                 TEXT NOT NULL,   -- YYYY-MM-DD
            customer_id          TEXT NOT NULL,
            customer_name        TEXT NOT NULL DEFAULT '',
            service_address      TEXT NOT NULL DEFAULT '',
            job_type             TEXT NOT NULL DEFAULT '',
            arrival              TEXT,            -- HH:MM or NULL
            departure            TEXT,            -- HH:MM or NULL
            man_hours            REAL NOT NULL DEFAULT 0,
            bid_type             TEXT NOT NULL,
            estimated_revenue    REAL NOT NULL DEFAULT 0,
            revenue              REAL NOT NULL DEFAULT 0,
            dollars_per_man_hour REAL NOT NULL DEFAULT 0,
            invoice              TEXT NOT NULL DEFAULT 'No',
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        ) STRICT;

        -- Daily route sheet: SELECT … WHERE date = ?
        CREATE INDEX IF NOT EXISTS idx_routing_date ON routing (date);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_db_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('jobs', 'routing')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }
}
