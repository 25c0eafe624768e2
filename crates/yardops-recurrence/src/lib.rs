//! `yardops-recurrence`: recurring job series maintainer with SQLite persistence.
//!
//! # Overview
//!
//! A recurring base job anchors a *series* of dated occurrences. The
//! [`engine::RecurrenceEngine`] keeps a rolling window of future scheduled
//! occurrences per series, reacts to invoice-sent completions, propagates
//! edits across a series and deletes jobs together with their routing
//! records. All writes go through the [`store::JobStore`] seam as atomic
//! batches; [`sqlite::SqliteStore`] is the bundled implementation.
//!
//! # Frequencies
//!
//! | Variant     | Next date                                  |
//! |-------------|--------------------------------------------|
//! | `Weekly`    | +7 days                                    |
//! | `Bi-Weekly` | +14 days                                   |
//! | `Monthly`   | same day next month, overflow rolls over   |
//! | `One-Time`  | none                                       |
//! | `As-Needed` | none                                       |

pub mod analytics;
pub mod clock;
pub mod db;
pub mod engine;
pub mod error;
pub mod pricing;
pub mod schedule;
pub mod sqlite;
pub mod store;
pub mod sweeper;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{Completion, CreatedJob, RecurrenceEngine, SweepReport};
pub use error::{ErrorKind, RecurrenceError, Result};
pub use sqlite::SqliteStore;
pub use store::{JobPatch, JobStore, RoutingPatch, WriteBatch, WriteOp};
pub use types::{
    BidType, EditScope, InvoiceStatus, Job, JobEdit, JobStatus, NewJob, Routing, SeriesStatus,
    ServiceFrequency,
};
