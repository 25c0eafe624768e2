use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::error::Result;
use crate::types::{InvoiceStatus, Job, JobStatus, Routing, SeriesStatus};

/// Persistence seam for jobs and their routing records.
///
/// Reads are individual; every write goes through [`JobStore::commit`], which
/// applies a [`WriteBatch`] all-or-nothing.
pub trait JobStore {
    fn get_job(&self, job_id: &str) -> Result<Option<Job>>;

    /// The occurrence occupying `date` in `series_id`, if any.
    fn job_on_date(&self, series_id: &str, date: NaiveDate) -> Result<Option<Job>>;

    /// All jobs of a series, ordered by `scheduled_date` ascending.
    fn jobs_in_series(&self, series_id: &str) -> Result<Vec<Job>>;

    /// The series anchor (`job_id == base_job_id`).
    fn base_job(&self, series_id: &str) -> Result<Option<Job>>;

    /// Distinct series IDs known to the store.
    fn list_series(&self) -> Result<Vec<String>>;

    fn list_jobs(&self) -> Result<Vec<Job>>;

    fn get_routing(&self, routing_id: &str) -> Result<Option<Routing>>;

    fn routing_for_job(&self, job_id: &str) -> Result<Option<Routing>>;

    fn list_routing(&self) -> Result<Vec<Routing>>;

    /// Apply every queued operation, or none of them.
    fn commit(&self, batch: WriteBatch) -> Result<()>;
}

macro_rules! forward_job_store {
    ($($ty:ty),*) => {$(
        impl<T: JobStore + ?Sized> JobStore for $ty {
            fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
                (**self).get_job(job_id)
            }
            fn job_on_date(&self, series_id: &str, date: NaiveDate) -> Result<Option<Job>> {
                (**self).job_on_date(series_id, date)
            }
            fn jobs_in_series(&self, series_id: &str) -> Result<Vec<Job>> {
                (**self).jobs_in_series(series_id)
            }
            fn base_job(&self, series_id: &str) -> Result<Option<Job>> {
                (**self).base_job(series_id)
            }
            fn list_series(&self) -> Result<Vec<String>> {
                (**self).list_series()
            }
            fn list_jobs(&self) -> Result<Vec<Job>> {
                (**self).list_jobs()
            }
            fn get_routing(&self, routing_id: &str) -> Result<Option<Routing>> {
                (**self).get_routing(routing_id)
            }
            fn routing_for_job(&self, job_id: &str) -> Result<Option<Routing>> {
                (**self).routing_for_job(job_id)
            }
            fn list_routing(&self) -> Result<Vec<Routing>> {
                (**self).list_routing()
            }
            fn commit(&self, batch: WriteBatch) -> Result<()> {
                (**self).commit(batch)
            }
        }
    )*};
}

// Lets several engines (e.g. with different clocks) share one store.
forward_job_store!(&T, Arc<T>);

/// One queued write.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert a new job. Fails with a consistency error if the series date is taken.
    CreateJob(Job),
    CreateRouting(Routing),
    UpdateJob { job_id: String, patch: JobPatch },
    UpdateRouting { routing_id: String, patch: RoutingPatch },
    DeleteJob { job_id: String },
    DeleteRouting { routing_id: String },
}

/// Ordered set of writes committed atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_job(&mut self, job: Job) -> &mut Self {
        self.ops.push(WriteOp::CreateJob(job));
        self
    }

    pub fn create_routing(&mut self, routing: Routing) -> &mut Self {
        self.ops.push(WriteOp::CreateRouting(routing));
        self
    }

    pub fn update_job(&mut self, job_id: impl Into<String>, patch: JobPatch) -> &mut Self {
        self.ops.push(WriteOp::UpdateJob {
            job_id: job_id.into(),
            patch,
        });
        self
    }

    pub fn update_routing(
        &mut self,
        routing_id: impl Into<String>,
        patch: RoutingPatch,
    ) -> &mut Self {
        self.ops.push(WriteOp::UpdateRouting {
            routing_id: routing_id.into(),
            patch,
        });
        self
    }

    pub fn delete_job(&mut self, job_id: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::DeleteJob {
            job_id: job_id.into(),
        });
        self
    }

    pub fn delete_routing(&mut self, routing_id: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::DeleteRouting {
            routing_id: routing_id.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Partial update of a job. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub service_type: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub rate: Option<f64>,
    pub hourly_rate: Option<Option<f64>>,
    pub man_hours: Option<f64>,
    pub notes: Option<String>,
    pub status: Option<JobStatus>,
    pub series_status: Option<SeriesStatus>,
    pub actual_rate: Option<f64>,
    pub completed_at: Option<String>,
}

impl JobPatch {
    pub fn apply(&self, job: &mut Job) {
        if let Some(ref v) = self.service_type {
            job.service_type = v.clone();
        }
        if let Some(v) = self.scheduled_date {
            job.scheduled_date = v;
        }
        if let Some(v) = self.rate {
            job.rate = v;
        }
        if let Some(v) = self.hourly_rate {
            job.hourly_rate = v;
        }
        if let Some(v) = self.man_hours {
            job.man_hours = v;
        }
        if let Some(ref v) = self.notes {
            job.notes = v.clone();
        }
        if let Some(v) = self.status {
            job.status = v;
        }
        if let Some(v) = self.series_status {
            job.series_status = v;
        }
        if let Some(v) = self.actual_rate {
            job.actual_rate = Some(v);
        }
        if let Some(ref v) = self.completed_at {
            job.completed_at = Some(v.clone());
        }
    }
}

/// Partial update of a routing record. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingPatch {
    pub date: Option<NaiveDate>,
    pub job_type: Option<String>,
    pub arrival: Option<Option<NaiveTime>>,
    pub departure: Option<Option<NaiveTime>>,
    pub man_hours: Option<f64>,
    pub revenue: Option<f64>,
    pub dollars_per_man_hour: Option<f64>,
    pub invoice: Option<InvoiceStatus>,
}

impl RoutingPatch {
    pub fn apply(&self, routing: &mut Routing) {
        if let Some(v) = self.date {
            routing.date = v;
        }
        if let Some(ref v) = self.job_type {
            routing.job_type = v.clone();
        }
        if let Some(v) = self.arrival {
            routing.arrival = v;
        }
        if let Some(v) = self.departure {
            routing.departure = v;
        }
        if let Some(v) = self.man_hours {
            routing.man_hours = v;
        }
        if let Some(v) = self.revenue {
            routing.revenue = v;
        }
        if let Some(v) = self.dollars_per_man_hour {
            routing.dollars_per_man_hour = v;
        }
        if let Some(v) = self.invoice {
            routing.invoice = v;
        }
    }
}
