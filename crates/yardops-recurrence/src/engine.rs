use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};
use yardops_core::config::RecurrenceConfig;

use crate::{
    analytics::{revenue_summary, RevenueSummary},
    clock::{Clock, SystemClock},
    error::{RecurrenceError, Result},
    pricing::{check_pricing, dollars_per_man_hour, normalized_rate, visit_figures, worked_hours},
    schedule::{advance, catch_up, is_future},
    store::{JobPatch, JobStore, RoutingPatch, WriteBatch},
    types::{
        job_id_for, new_series_id, routing_id_for, BidType, EditScope, InvoiceStatus, Job,
        JobEdit, JobStatus, NewJob, Routing, SeriesStatus, ServiceFrequency,
    },
};

/// Result of creating a job: the base occurrence plus the initial window.
#[derive(Debug, Clone)]
pub struct CreatedJob {
    pub job: Job,
    pub routing: Routing,
    pub occurrences: Vec<Job>,
}

/// Result of an invoice-sent transition.
#[derive(Debug, Clone)]
pub struct Completion {
    pub job: Job,
    pub routing: Routing,
    /// Occurrences created to keep the series window full.
    pub spawned: Vec<Job>,
}

/// Counters from one [`RecurrenceEngine::sweep`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub series_checked: usize,
    pub jobs_created: usize,
    pub failures: usize,
}

/// Keeps recurring job series populated and consistent.
///
/// Every public operation runs to completion synchronously and returns an
/// explicit `Result`; multi-record writes go through one [`WriteBatch`].
pub struct RecurrenceEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    config: RecurrenceConfig,
}

impl<S: JobStore> RecurrenceEngine<S, SystemClock> {
    pub fn new(store: S, config: RecurrenceConfig) -> Self {
        Self::with_clock(store, SystemClock, config)
    }
}

impl<S: JobStore, C: Clock> RecurrenceEngine<S, C> {
    pub fn with_clock(store: S, clock: C, config: RecurrenceConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RecurrenceConfig {
        &self.config
    }

    // --- creation ----------------------------------------------------------

    /// Validate and persist a new job with its routing record.
    ///
    /// Recurring jobs get their initial window of future occurrences right
    /// away; nothing else grows the series until completion, resume or sweep.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub fn create_job(&self, input: NewJob) -> Result<CreatedJob> {
        let scheduled_date = input
            .scheduled_date
            .ok_or_else(|| RecurrenceError::Validation("scheduledDate is required".to_string()))?;
        if input.customer_id.trim().is_empty() {
            return Err(RecurrenceError::Validation(
                "customerId is required".to_string(),
            ));
        }
        let frequency: ServiceFrequency = input
            .service_frequency
            .parse()
            .map_err(RecurrenceError::Validation)?;
        let bid_type: BidType = if input.bid_type.trim().is_empty() {
            BidType::Bid
        } else {
            input.bid_type.parse().map_err(RecurrenceError::Validation)?
        };
        check_pricing(bid_type, input.rate, input.hourly_rate, input.man_hours)?;

        let series_id = input.series_id.clone().unwrap_or_else(new_series_id);
        if self.store.job_on_date(&series_id, scheduled_date)?.is_some() {
            return Err(RecurrenceError::Validation(format!(
                "series {series_id} already has a job on {scheduled_date}"
            )));
        }
        let job_id = self.free_job_id(&series_id, scheduled_date)?;
        // Joining an existing series keeps its anchor.
        let base_job_id = match self.store.base_job(&series_id)? {
            Some(base) => base.job_id,
            None => job_id.clone(),
        };

        let now = self.clock.now().to_rfc3339();
        let job = Job {
            job_id,
            series_id,
            base_job_id,
            customer_id: input.customer_id,
            customer_name: input.customer_name,
            property_id: input.property_id,
            service_address: input.service_address,
            service_type: input.service_type,
            scheduled_date,
            service_frequency: frequency,
            bid_type,
            rate: normalized_rate(bid_type, input.rate, input.hourly_rate, input.man_hours),
            hourly_rate: input.hourly_rate,
            man_hours: input.man_hours,
            actual_rate: None,
            notes: input.notes,
            status: JobStatus::Scheduled,
            series_status: SeriesStatus::Active,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        };
        let routing = self.routing_for(&job);

        let mut batch = WriteBatch::new();
        batch.create_job(job.clone()).create_routing(routing.clone());
        self.store.commit(batch)?;
        info!(job_id = %job.job_id, series_id = %job.series_id, "job created");

        let occurrences = if job.is_recurring() && job.is_base() {
            let series = self.store.jobs_in_series(&job.series_id)?;
            self.maintain_series(&job, &series, self.config.target_future_count)?
        } else {
            Vec::new()
        };

        Ok(CreatedJob {
            job,
            routing,
            occurrences,
        })
    }

    /// Create one occurrence of `base`'s series on `date`, with its routing record.
    ///
    /// Returns `Ok(None)` without writing when the series is paused or the date
    /// is already taken.
    #[instrument(skip(self, base), fields(series_id = %base.series_id))]
    pub fn create_occurrence(&self, base: &Job, date: NaiveDate) -> Result<Option<Job>> {
        if base.is_paused() {
            debug!("series paused, occurrence skipped");
            return Ok(None);
        }
        if let Some(existing) = self.store.job_on_date(&base.series_id, date)? {
            debug!(job_id = %existing.job_id, "occurrence already exists");
            return Ok(None);
        }

        let now = self.clock.now().to_rfc3339();
        let job = Job {
            job_id: self.free_job_id(&base.series_id, date)?,
            scheduled_date: date,
            rate: normalized_rate(base.bid_type, base.rate, base.hourly_rate, base.man_hours),
            actual_rate: None,
            status: JobStatus::Scheduled,
            series_status: SeriesStatus::Active,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
            ..base.clone()
        };
        let routing = self.routing_for(&job);

        let mut batch = WriteBatch::new();
        batch.create_job(job.clone()).create_routing(routing);
        match self.store.commit(batch) {
            Ok(()) => {
                info!(job_id = %job.job_id, "occurrence created");
                Ok(Some(job))
            }
            Err(RecurrenceError::Consistency { series_id, date }) => {
                warn!(%series_id, %date, "occurrence appeared concurrently, skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // --- window maintenance ------------------------------------------------

    /// Extend the series until it holds `target` strictly-future scheduled
    /// occurrences.
    ///
    /// `series` is the live set of jobs sharing `base.series_id`. Extension
    /// continues from the latest known date, one occurrence at a time, and
    /// stops after the configured step budget. A series so far behind that
    /// the budget would run out on past dates restarts from its last cadence
    /// date not after today. Returns the jobs created.
    #[instrument(skip(self, base, series), fields(series_id = %base.series_id))]
    pub fn maintain_series(&self, base: &Job, series: &[Job], target: usize) -> Result<Vec<Job>> {
        if !base.is_recurring() || base.is_paused() {
            return Ok(Vec::new());
        }
        let Some(mut last_date) = series.iter().map(|j| j.scheduled_date).max() else {
            return Ok(Vec::new());
        };

        let today = self.clock.today();
        let mut budget = self.config.step_budget(target);
        if let Some(restart) = catch_up(last_date, base.service_frequency, today, budget) {
            debug!(from = %last_date, to = %restart, "series far behind, restarting near today");
            last_date = restart;
        }
        let mut existing: HashSet<NaiveDate> = series.iter().map(|j| j.scheduled_date).collect();
        let mut future = series
            .iter()
            .filter(|j| j.status == JobStatus::Scheduled && is_future(j.scheduled_date, today))
            .count();

        let mut created = Vec::new();
        while future < target && budget > 0 {
            budget -= 1;
            let Some(next) = advance(last_date, base.service_frequency) else {
                break;
            };
            if existing.insert(next) {
                // Only a date that really holds a scheduled job counts.
                let occupied = match self.create_occurrence(base, next)? {
                    Some(job) => {
                        created.push(job);
                        true
                    }
                    None => self
                        .store
                        .job_on_date(&base.series_id, next)?
                        .is_some_and(|j| j.status == JobStatus::Scheduled),
                };
                if occupied && is_future(next, today) {
                    future += 1;
                }
            }
            last_date = next;
        }

        if budget == 0 && future < target {
            warn!(future, "step budget exhausted before the window filled");
        }
        if !created.is_empty() {
            info!(created = created.len(), "series window extended");
        }
        Ok(created)
    }

    /// Load a series from the store and top up its window.
    pub fn maintain_series_by_id(&self, series_id: &str) -> Result<Vec<Job>> {
        let base = self.require_base(series_id)?;
        let series = self.store.jobs_in_series(series_id)?;
        self.maintain_series(&base, &series, self.config.target_future_count)
    }

    /// Top up every active recurring series.
    ///
    /// A failing series is logged and skipped; the pass carries on.
    pub fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for series_id in self.store.list_series()? {
            match self.sweep_series(&series_id) {
                Ok(None) => {}
                Ok(Some(created)) => {
                    report.series_checked += 1;
                    report.jobs_created += created;
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(%series_id, code = e.code(), "sweep failed for series: {e}");
                }
            }
        }
        info!(
            checked = report.series_checked,
            created = report.jobs_created,
            failures = report.failures,
            "maintenance sweep finished"
        );
        Ok(report)
    }

    /// Top up one series. `None` when it is paused, non-recurring or has no base job.
    fn sweep_series(&self, series_id: &str) -> Result<Option<usize>> {
        let Some(base) = self.store.base_job(series_id)? else {
            return Ok(None);
        };
        if !base.is_recurring() || base.is_paused() {
            return Ok(None);
        }
        let series = self.store.jobs_in_series(series_id)?;
        let created = self.maintain_series(&base, &series, self.config.target_future_count)?;
        Ok(Some(created.len()))
    }

    // --- pause / resume ----------------------------------------------------

    /// Stop the series from growing. Only the base job changes.
    #[instrument(skip(self))]
    pub fn pause_series(&self, series_id: &str) -> Result<()> {
        let base = self.require_base(series_id)?;
        self.set_series_status(&base, SeriesStatus::Paused)?;
        info!("series paused");
        Ok(())
    }

    /// Reactivate the series and backfill its window from the latest occurrence.
    #[instrument(skip(self))]
    pub fn resume_series(&self, series_id: &str) -> Result<Vec<Job>> {
        let base = self.require_base(series_id)?;
        self.set_series_status(&base, SeriesStatus::Active)?;
        info!("series resumed");

        let base = Job {
            series_status: SeriesStatus::Active,
            ..base
        };
        let series = self.store.jobs_in_series(series_id)?;
        self.maintain_series(&base, &series, self.config.target_future_count)
    }

    // --- completion --------------------------------------------------------

    /// Record crew arrival/departure and recompute the routing figures.
    #[instrument(skip(self))]
    pub fn record_visit_times(
        &self,
        routing_id: &str,
        arrival: Option<NaiveTime>,
        departure: Option<NaiveTime>,
    ) -> Result<Routing> {
        let (job, mut routing) = self.load_routing_pair(routing_id)?;
        let figures = visit_figures(&job, worked_hours(arrival, departure));

        let patch = RoutingPatch {
            arrival: Some(arrival),
            departure: Some(departure),
            man_hours: Some(figures.man_hours),
            revenue: Some(figures.revenue),
            dollars_per_man_hour: Some(figures.dollars_per_man_hour),
            ..Default::default()
        };
        let mut batch = WriteBatch::new();
        batch.update_routing(routing_id, patch.clone());
        self.store.commit(batch)?;

        patch.apply(&mut routing);
        Ok(routing)
    }

    /// Flip the routing record's invoice to sent and complete its job.
    pub fn mark_invoice_sent(&self, routing_id: &str) -> Result<Completion> {
        let (job, routing) = self.load_routing_pair(routing_id)?;
        self.on_invoice_marked_sent(&job, &routing)
    }

    /// Complete `job` once its invoice is sent, then keep the series growing.
    ///
    /// Revenue comes from the visit times when both are present and ordered;
    /// otherwise the routing record's existing revenue stands. A job that is
    /// already complete is returned unchanged.
    #[instrument(skip(self, job, routing), fields(job_id = %job.job_id))]
    pub fn on_invoice_marked_sent(&self, job: &Job, routing: &Routing) -> Result<Completion> {
        if job.status == JobStatus::Complete {
            debug!("job already complete");
            return Ok(Completion {
                job: job.clone(),
                routing: routing.clone(),
                spawned: Vec::new(),
            });
        }

        let mut routing_patch = RoutingPatch {
            invoice: Some(InvoiceStatus::Yes),
            ..Default::default()
        };
        let revenue = match worked_hours(routing.arrival, routing.departure) {
            Some(hours) => {
                let figures = visit_figures(job, Some(hours));
                routing_patch.man_hours = Some(figures.man_hours);
                routing_patch.revenue = Some(figures.revenue);
                routing_patch.dollars_per_man_hour = Some(figures.dollars_per_man_hour);
                figures.revenue
            }
            None => routing.revenue,
        };
        let job_patch = JobPatch {
            status: Some(JobStatus::Complete),
            actual_rate: Some(revenue),
            completed_at: Some(self.clock.now().to_rfc3339()),
            ..Default::default()
        };

        let mut batch = WriteBatch::new();
        batch
            .update_routing(&routing.id, routing_patch.clone())
            .update_job(&job.job_id, job_patch.clone());
        self.store.commit(batch)?;
        info!(revenue, "job completed");

        let mut completed = job.clone();
        job_patch.apply(&mut completed);
        let mut routing = routing.clone();
        routing_patch.apply(&mut routing);

        let spawned = if completed.is_recurring() {
            self.spawn_after_completion(&completed)?
        } else {
            Vec::new()
        };

        Ok(Completion {
            job: completed,
            routing,
            spawned,
        })
    }

    fn spawn_after_completion(&self, completed: &Job) -> Result<Vec<Job>> {
        // New occurrences are cloned from the series anchor, as in every other
        // path. A series whose base job was deleted continues from this job.
        let template = match self.store.base_job(&completed.series_id)? {
            Some(base) => base,
            None => completed.clone(),
        };
        if template.is_paused() {
            debug!(series_id = %completed.series_id, "series paused, nothing spawned");
            return Ok(Vec::new());
        }

        let mut spawned = Vec::new();
        if let Some(next) = advance(completed.scheduled_date, template.service_frequency) {
            if let Some(job) = self.create_occurrence(&template, next)? {
                spawned.push(job);
            }
        }
        let series = self.store.jobs_in_series(&completed.series_id)?;
        spawned.extend(self.maintain_series(
            &template,
            &series,
            self.config.target_future_count,
        )?);
        Ok(spawned)
    }

    // --- edits -------------------------------------------------------------

    /// Apply `edit` to one job, or to it and every later job in its series.
    ///
    /// All touched jobs and routing records are written in one batch. Returns
    /// the number of jobs updated.
    #[instrument(skip(self, edit), fields(job_id = %edit.job_id))]
    pub fn edit_job(&self, edit: &JobEdit, scope: EditScope) -> Result<usize> {
        let target = self
            .store
            .get_job(&edit.job_id)?
            .ok_or_else(|| RecurrenceError::JobNotFound {
                id: edit.job_id.clone(),
            })?;

        let hourly_rate = edit.hourly_rate.or(target.hourly_rate);
        check_pricing(target.bid_type, edit.rate, hourly_rate, edit.man_hours)?;
        let rate = normalized_rate(target.bid_type, edit.rate, hourly_rate, edit.man_hours);

        if edit.scheduled_date != target.scheduled_date {
            if let Some(other) = self
                .store
                .job_on_date(&target.series_id, edit.scheduled_date)?
            {
                return Err(RecurrenceError::Validation(format!(
                    "{} already occupies {} in series {}",
                    other.job_id, edit.scheduled_date, target.series_id
                )));
            }
        }

        let in_scope: Vec<Job> = match scope {
            EditScope::Single => vec![target.clone()],
            EditScope::Series => self
                .store
                .jobs_in_series(&target.series_id)?
                .into_iter()
                .filter(|j| j.scheduled_date >= target.scheduled_date)
                .collect(),
        };

        let mut batch = WriteBatch::new();
        for job in &in_scope {
            let is_target = job.job_id == target.job_id;
            batch.update_job(
                &job.job_id,
                JobPatch {
                    service_type: Some(edit.service_type.clone()),
                    // Dates are per-occurrence; only the targeted job moves.
                    scheduled_date: is_target.then_some(edit.scheduled_date),
                    rate: Some(rate),
                    hourly_rate: Some(hourly_rate),
                    man_hours: Some(edit.man_hours),
                    notes: Some(edit.notes.clone()),
                    ..Default::default()
                },
            );
            if let Some(routing) = self.store.routing_for_job(&job.job_id)? {
                batch.update_routing(
                    routing.id,
                    RoutingPatch {
                        date: is_target.then_some(edit.scheduled_date),
                        job_type: Some(edit.service_type.clone()),
                        revenue: Some(rate),
                        dollars_per_man_hour: Some(dollars_per_man_hour(rate, edit.man_hours)),
                        ..Default::default()
                    },
                );
            }
        }
        self.store.commit(batch)?;

        info!(updated = in_scope.len(), "jobs updated");
        Ok(in_scope.len())
    }

    // --- deletion ----------------------------------------------------------

    /// Delete one occurrence together with its routing record.
    #[instrument(skip(self))]
    pub fn delete_job(&self, job_id: &str) -> Result<()> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| RecurrenceError::JobNotFound {
                id: job_id.to_string(),
            })?;
        let mut batch = WriteBatch::new();
        if let Some(routing) = self.store.routing_for_job(&job.job_id)? {
            batch.delete_routing(routing.id);
        }
        batch.delete_job(&job.job_id);
        self.store.commit(batch)?;
        info!("job deleted");
        Ok(())
    }

    /// Delete every job of a series and every paired routing record.
    #[instrument(skip(self))]
    pub fn delete_series(&self, series_id: &str) -> Result<usize> {
        let jobs = self.store.jobs_in_series(series_id)?;
        if jobs.is_empty() {
            return Err(RecurrenceError::SeriesNotFound {
                series_id: series_id.to_string(),
            });
        }
        let mut batch = WriteBatch::new();
        for job in &jobs {
            if let Some(routing) = self.store.routing_for_job(&job.job_id)? {
                batch.delete_routing(routing.id);
            }
            batch.delete_job(&job.job_id);
        }
        self.store.commit(batch)?;
        info!(deleted = jobs.len(), "series deleted");
        Ok(jobs.len())
    }

    // --- reporting ---------------------------------------------------------

    /// Revenue analytics over every invoiced routing record.
    pub fn revenue_report(&self) -> Result<RevenueSummary> {
        Ok(revenue_summary(&self.store.list_routing()?))
    }

    // --- private helpers ---------------------------------------------------

    /// `J-{series}-{date}`, suffixed when a job moved off `date` by an edit
    /// still carries that ID.
    fn free_job_id(&self, series_id: &str, date: NaiveDate) -> Result<String> {
        let id = job_id_for(series_id, date);
        if self.store.get_job(&id)?.is_none() {
            return Ok(id);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{id}-{n}");
            if self.store.get_job(&candidate)?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    fn require_base(&self, series_id: &str) -> Result<Job> {
        self.store
            .base_job(series_id)?
            .ok_or_else(|| RecurrenceError::SeriesNotFound {
                series_id: series_id.to_string(),
            })
    }

    fn set_series_status(&self, base: &Job, status: SeriesStatus) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.update_job(
            &base.job_id,
            JobPatch {
                series_status: Some(status),
                ..Default::default()
            },
        );
        self.store.commit(batch)
    }

    fn load_routing_pair(&self, routing_id: &str) -> Result<(Job, Routing)> {
        let routing = self
            .store
            .get_routing(routing_id)?
            .ok_or_else(|| RecurrenceError::RoutingNotFound {
                id: routing_id.to_string(),
            })?;
        let job = self
            .store
            .get_job(&routing.job_id)?
            .ok_or_else(|| RecurrenceError::JobNotFound {
                id: routing.job_id.clone(),
            })?;
        Ok((job, routing))
    }

    /// Fresh routing record paired with `job`.
    fn routing_for(&self, job: &Job) -> Routing {
        Routing {
            id: routing_id_for(job.scheduled_date, &job.customer_id, &job.job_id),
            job_id: job.job_id.clone(),
            date: job.scheduled_date,
            customer_id: job.customer_id.clone(),
            customer_name: job.customer_name.clone(),
            service_address: job.service_address.clone(),
            job_type: job.service_type.clone(),
            arrival: None,
            departure: None,
            man_hours: job.man_hours,
            bid_type: job.bid_type,
            estimated_revenue: job.rate,
            revenue: job.rate,
            dollars_per_man_hour: dollars_per_man_hour(job.rate, job.man_hours),
            invoice: InvoiceStatus::No,
            created_at: job.created_at.clone(),
            updated_at: job.updated_at.clone(),
        }
    }
}
