//! The synchronization run.
//!
//! A run resolves the authenticated login, then walks the repository pages
//! and classifies and updates each record as its page arrives. Requests are
//! strictly sequential. The [`CancellationToken`] is polled before every
//! page request and before every record, so an interrupted run leaves the
//! pages it already saw fully processed and never starts another request.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::github::{
    IdentityOps, MergeSettingsOps, MutationOutcome, RepoQuery, RepositoryPager, RepositoryRecord,
};
use crate::policy::{Classification, classify};

/// Progress events emitted while a run is underway.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SyncEvent {
    /// The token's owner is known; only their repositories are in scope.
    IdentityResolved { login: String },
    /// A page of repositories arrived.
    FetchedPage {
        /// Page number (1-indexed).
        page: u32,
        /// New records on this page.
        count: usize,
        /// Records fetched so far, this page included.
        total_so_far: usize,
    },
    /// A repository needed no update.
    Skipped {
        full_name: String,
        classification: Classification,
    },
    /// A settings update was attempted.
    Mutated {
        full_name: String,
        outcome: MutationOutcome,
    },
    /// Cancellation was observed; `unreached` fetched records were not classified.
    Stopping { unreached: usize },
}

/// Callback for [`SyncEvent`]s.
pub type ProgressCallback = dyn Fn(SyncEvent) + Send + Sync;

#[inline]
fn emit(on_progress: Option<&ProgressCallback>, event: SyncEvent) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncPhase {
    Idle,
    ResolvingIdentity,
    Fetching,
    ClassifyingAndMutating,
    Summarizing,
    Done,
}

/// Per-run outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounters {
    pub updated: usize,
    pub already_compliant: usize,
    pub out_of_scope: usize,
    pub failed: usize,
}

impl SyncCounters {
    /// Number of records that reached classification.
    pub fn total(&self) -> usize {
        self.updated + self.already_compliant + self.out_of_scope + self.failed
    }
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    pub login: String,
    pub counters: SyncCounters,
    /// Distinct records fetched, whether or not they were classified.
    pub fetched: usize,
    pub elapsed: Duration,
    /// The run stopped early because of cancellation.
    pub interrupted: bool,
}

impl SyncSummary {
    /// Fetched records that were never classified because the run stopped.
    pub fn unreached(&self) -> usize {
        self.fetched.saturating_sub(self.counters.total())
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<21}{}", "Updated:", self.counters.updated)?;
        writeln!(f, "{:<21}{}", "Already squash-only:", self.counters.already_compliant)?;
        writeln!(f, "{:<21}{}", "Not owned:", self.counters.out_of_scope)?;
        writeln!(f, "{:<21}{}", "Failed:", self.counters.failed)?;
        write!(f, "{:<21}{:.1}s", "Elapsed:", self.elapsed.as_secs_f64())?;
        if self.interrupted {
            write!(f, "\nInterrupted with {} repositories unprocessed", self.unreached())?;
        }
        Ok(())
    }
}

/// Mutable state owned by a single run.
#[derive(Debug)]
struct RunState {
    phase: SyncPhase,
    counters: SyncCounters,
    fetched: usize,
    /// When the previous settings update finished, if there was one.
    last_mutation: Option<Instant>,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            counters: SyncCounters::default(),
            fetched: 0,
            last_mutation: None,
        }
    }

    fn enter(&mut self, phase: SyncPhase) {
        if self.phase != phase {
            tracing::trace!(from = ?self.phase, to = ?phase, "phase change");
            self.phase = phase;
        }
    }
}

/// Drives one synchronization run against a GitHub-like client.
pub struct SyncRunner<'a, C> {
    client: &'a C,
    config: SyncConfig,
    cancel: CancellationToken,
    on_progress: Option<&'a ProgressCallback>,
}

impl<'a, C> SyncRunner<'a, C>
where
    C: IdentityOps + RepoQuery + MergeSettingsOps,
{
    pub fn new(client: &'a C, config: SyncConfig, cancel: CancellationToken) -> Self {
        Self {
            client,
            config,
            cancel,
            on_progress: None,
        }
    }

    /// Report progress to `callback`.
    pub fn on_progress(mut self, callback: &'a ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Execute the run.
    ///
    /// Errors only for identity resolution and fetch failures. Failed
    /// updates are counted, and cancellation yields an interrupted summary.
    pub fn run(&self) -> Result<SyncSummary> {
        self.run_with(&mut RunState::new())
    }

    fn run_with(&self, state: &mut RunState) -> Result<SyncSummary> {
        let started = Instant::now();

        if self.cancel.is_cancelled() {
            return Ok(self.summarize(state, String::new(), started));
        }

        state.enter(SyncPhase::ResolvingIdentity);
        let login = self.client.authenticated_login()?;
        tracing::info!(%login, force = self.config.force, "resolved authenticated user");
        emit(
            self.on_progress,
            SyncEvent::IdentityResolved {
                login: login.clone(),
            },
        );

        let mut pager = RepositoryPager::new(self.client, &login).page_size(self.config.page_size);

        'pages: loop {
            state.enter(SyncPhase::Fetching);
            let Some(records) = pager.next_page(&self.cancel)? else {
                break;
            };
            state.fetched += records.len();
            emit(
                self.on_progress,
                SyncEvent::FetchedPage {
                    page: pager.pages_fetched(),
                    count: records.len(),
                    total_so_far: state.fetched,
                },
            );

            state.enter(SyncPhase::ClassifyingAndMutating);
            for record in &records {
                if self.cancel.is_cancelled() || !self.process(record, &login, state) {
                    break 'pages;
                }
            }
        }

        if self.cancel.is_cancelled() {
            let unreached = state.fetched - state.counters.total();
            tracing::warn!(unreached, "run cancelled");
            emit(self.on_progress, SyncEvent::Stopping { unreached });
        }

        Ok(self.summarize(state, login, started))
    }

    /// Classify `record` and act on it.
    ///
    /// Returns `false` if cancellation arrived during the throttle pause, in
    /// which case the record is left uncounted.
    fn process(&self, record: &RepositoryRecord, login: &str, state: &mut RunState) -> bool {
        let classification = classify(record, login, self.config.force);
        match classification {
            Classification::OutOfScope => state.counters.out_of_scope += 1,
            Classification::AlreadyCompliant => state.counters.already_compliant += 1,
            Classification::NeedsMutation => {
                if !self.pause_before_mutation(state) {
                    return false;
                }

                let outcome = self.client.apply_squash_only(&record.full_name);
                if outcome.is_applied() {
                    state.counters.updated += 1;
                    tracing::info!(repo = %record.full_name, "set to squash-only");
                } else {
                    state.counters.failed += 1;
                    tracing::warn!(repo = %record.full_name, %outcome, "update failed");
                }
                state.last_mutation = Some(Instant::now());
                emit(
                    self.on_progress,
                    SyncEvent::Mutated {
                        full_name: record.full_name.clone(),
                        outcome,
                    },
                );
                return true;
            }
        }

        tracing::debug!(repo = %record.full_name, %classification, "skipping");
        emit(
            self.on_progress,
            SyncEvent::Skipped {
                full_name: record.full_name.clone(),
                classification,
            },
        );
        true
    }

    /// Wait out whatever is left of the throttle interval since the previous
    /// update. The first update of a run goes out immediately and nothing
    /// waits after the last one.
    fn pause_before_mutation(&self, state: &RunState) -> bool {
        let Some(last) = state.last_mutation else {
            return !self.cancel.is_cancelled();
        };
        let remaining = self.config.throttle.saturating_sub(last.elapsed());
        if remaining.is_zero() {
            return !self.cancel.is_cancelled();
        }
        self.cancel.sleep(remaining)
    }

    fn summarize(&self, state: &mut RunState, login: String, started: Instant) -> SyncSummary {
        state.enter(SyncPhase::Summarizing);
        let summary = SyncSummary {
            login,
            counters: state.counters,
            fetched: state.fetched,
            elapsed: started.elapsed(),
            interrupted: self.cancel.is_cancelled(),
        };
        state.enter(SyncPhase::Done);
        summary
    }
}

/// Run a synchronization with default progress handling (none).
pub fn run_sync<C>(client: &C, config: SyncConfig, cancel: CancellationToken) -> Result<SyncSummary>
where
    C: IdentityOps + RepoQuery + MergeSettingsOps,
{
    SyncRunner::new(client, config, cancel).run()
}
