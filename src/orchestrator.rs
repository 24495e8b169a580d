// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Phase runner for one teardown job.
//!
//! # Overview
//!
//! A job runs three phases in a fixed order, one after another:
//!
//! 1. [`Phase::Dns`] - remove leaked records from shared public zones
//! 2. [`Phase::ResourceGroup`] - delete the cluster resource group
//! 3. [`Phase::AppRegistrations`] - delete the cluster's application registrations
//!
//! Each phase body is retried every poll interval until it succeeds, fails with an error
//! that retrying cannot fix, or its deadline passes. A phase's deadline is the earlier of
//! the job's overall deadline and the phase's own cap, so whatever one phase leaves
//! unused carries forward to the next.
//!
//! # Outcomes
//!
//! | Attempt result | Phase outcome | Job continues |
//! |----------------|---------------|---------------|
//! | success, or target already gone | succeeded | yes |
//! | [`ErrorClass::Auth`] | failed, recorded | no, job aborted |
//! | [`ErrorClass::Blocked`] from resource group deletion | failed, recorded | no, job aborted |
//! | [`ErrorClass::Blocked`] elsewhere, or [`ErrorClass::Transient`], until the deadline | timed out, recorded | yes |
//!
//! The job's result is an [`AggregateError`] holding at most one error per phase;
//! an empty aggregate means the teardown is complete.

use crate::app_registrations::{AppRegistrationCleaner, Directory, GraphDirectory};
use crate::cloud_errors::{classify, CloudError, ErrorClass};
use crate::constants::{
    DNS_PHASE_TIMEOUT_SECS, PHASE_POLL_INTERVAL_SECS, RESOURCE_GROUP_DELETE_ATTEMPT_SECS,
    RESOURCE_GROUP_PHASE_TIMEOUT_SECS, TEARDOWN_BUDGET_SECS,
};
use crate::dns::azure::backend_for;
use crate::dns::reconciler::clean_dns;
use crate::dns::DnsBackend;
use crate::metadata::TeardownJob;
use crate::resource_group::{AzureResourceGroups, ResourceGroupDeleter};
use crate::rest::{build_http_client, RestClient};
use crate::session::Session;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Top-level teardown steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Remove leaked DNS records
    Dns,
    /// Delete the cluster resource group
    ResourceGroup,
    /// Delete application registrations
    AppRegistrations,
}

impl Phase {
    /// Every phase, in the order a job runs them.
    pub const ALL: [Phase; 3] = [Phase::Dns, Phase::ResourceGroup, Phase::AppRegistrations];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dns => "DNS cleanup",
            Self::ResourceGroup => "resource group deletion",
            Self::AppRegistrations => "application registration cleanup",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Not started
    Pending,
    /// Working on a phase
    Running(Phase),
    /// Every phase was attempted
    Succeeded,
    /// Stopped early by an error retrying cannot fix
    Aborted,
}

/// Timing knobs for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownConfig {
    /// Overall budget shared by all phases
    pub budget: Duration,
    /// Delay between attempts of a phase body
    pub poll_interval: Duration,
    /// Cap on the DNS phase
    pub dns_phase_timeout: Option<Duration>,
    /// Cap on the resource group phase
    pub resource_group_phase_timeout: Option<Duration>,
    /// Cap on the application registration phase
    pub app_registrations_phase_timeout: Option<Duration>,
    /// How long one resource group delete attempt waits for completion
    pub resource_group_attempt_timeout: Duration,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(TEARDOWN_BUDGET_SECS),
            poll_interval: Duration::from_secs(PHASE_POLL_INTERVAL_SECS),
            dns_phase_timeout: Some(Duration::from_secs(DNS_PHASE_TIMEOUT_SECS)),
            resource_group_phase_timeout: Some(Duration::from_secs(
                RESOURCE_GROUP_PHASE_TIMEOUT_SECS,
            )),
            app_registrations_phase_timeout: None,
            resource_group_attempt_timeout: Duration::from_secs(RESOURCE_GROUP_DELETE_ATTEMPT_SECS),
        }
    }
}

impl TeardownConfig {
    /// Cap on `phase`, if it has one.
    #[must_use]
    pub fn phase_timeout(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Dns => self.dns_phase_timeout,
            Phase::ResourceGroup => self.resource_group_phase_timeout,
            Phase::AppRegistrations => self.app_registrations_phase_timeout,
        }
    }
}

/// Classification of one phase attempt.
#[derive(Debug)]
pub enum PhaseResult {
    /// The phase is done
    Success,
    /// Stop the job
    Fatal(ErrorClass, CloudError),
    /// Try again on the next tick
    Retry(CloudError),
}

impl PhaseResult {
    /// Classify the result of one attempt of `phase`.
    ///
    /// `Blocked` only stops the job when it comes from resource group deletion; a conflict
    /// on a single record or application is retried on the next tick.
    #[must_use]
    pub fn classify(phase: Phase, result: Result<(), CloudError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) => match classify(&e) {
                ErrorClass::NotFound => Self::Success,
                ErrorClass::Blocked if phase != Phase::ResourceGroup => Self::Retry(e),
                class @ (ErrorClass::Auth | ErrorClass::Blocked) => Self::Fatal(class, e),
                ErrorClass::Transient => Self::Retry(e),
            },
        }
    }
}

/// Final outcome of a phase.
#[derive(Debug)]
pub enum PhaseOutcome {
    /// The phase body succeeded
    Succeeded {
        /// Attempts made, including the successful one
        attempts: u32,
    },
    /// The phase body failed with an error retrying cannot fix
    Failed {
        /// Class of `error`
        class: ErrorClass,
        /// The error
        error: CloudError,
    },
    /// The deadline passed before the phase succeeded
    TimedOut {
        /// Attempts made
        attempts: u32,
        /// Error from the last attempt, if any attempt ran
        last_error: Option<CloudError>,
    },
}

/// A phase that did not succeed.
#[derive(Error, Debug)]
pub enum PhaseError {
    /// The phase failed with an error retrying cannot fix.
    #[error("{phase} failed ({class}): {source}")]
    Failed {
        /// Phase that failed
        phase: Phase,
        /// Class of the error
        class: ErrorClass,
        /// The error
        #[source]
        source: CloudError,
    },

    /// The phase ran out of time.
    #[error("{phase} timed out after {attempts} attempt(s){}", .last_error.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    TimedOut {
        /// Phase that timed out
        phase: Phase,
        /// Attempts made before the deadline
        attempts: u32,
        /// Error from the last attempt
        last_error: Option<CloudError>,
    },
}

impl PhaseError {
    /// Phase this error belongs to.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Failed { phase, .. } | Self::TimedOut { phase, .. } => *phase,
        }
    }

    /// Returns true if this error stopped the job.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Errors collected across a job, at most one per phase, in phase order.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<PhaseError>,
}

impl std::error::Error for AggregateError {}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "teardown completed without errors"),
            n => {
                write!(f, "teardown failed in {n} phase(s):")?;
                for err in &self.errors {
                    write!(f, "\n  - {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl AggregateError {
    fn push(&mut self, err: PhaseError) {
        self.errors.push(err);
    }

    /// Returns true if no phase failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failed phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The recorded errors, in phase order.
    #[must_use]
    pub fn errors(&self) -> &[PhaseError] {
        &self.errors
    }

    /// `Ok(())` if empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when any phase failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Retry `attempt` every `poll_interval` until it succeeds, fails fatally, or `deadline` passes.
///
/// No attempt is started once the deadline has passed, but an attempt in flight when it
/// passes is allowed to finish.
pub async fn run_phase<F, Fut>(
    phase: Phase,
    deadline: Instant,
    poll_interval: Duration,
    mut attempt: F,
) -> PhaseOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), CloudError>>,
{
    let mut attempts = 0;
    let mut last_error = None;

    loop {
        if Instant::now() >= deadline {
            return PhaseOutcome::TimedOut {
                attempts,
                last_error,
            };
        }

        attempts += 1;
        match PhaseResult::classify(phase, attempt().await) {
            PhaseResult::Success => return PhaseOutcome::Succeeded { attempts },
            PhaseResult::Fatal(class, error) => return PhaseOutcome::Failed { class, error },
            PhaseResult::Retry(error) => {
                warn!(
                    phase = %phase,
                    attempt = attempts,
                    error = %error,
                    "Phase attempt failed, will retry"
                );
                last_error = Some(error);
            }
        }

        let next = Instant::now() + poll_interval;
        tokio::time::sleep_until(next.min(deadline)).await;
    }
}

/// Drives one [`TeardownJob`] through every phase.
pub struct Orchestrator {
    job: TeardownJob,
    config: TeardownConfig,
    dns: Box<dyn DnsBackend>,
    resource_groups: Box<dyn ResourceGroupDeleter>,
    directory: Box<dyn Directory>,
    state: JobState,
}

impl Orchestrator {
    /// Build an orchestrator from explicit provider implementations.
    #[must_use]
    pub fn new(
        job: TeardownJob,
        config: TeardownConfig,
        dns: Box<dyn DnsBackend>,
        resource_groups: Box<dyn ResourceGroupDeleter>,
        directory: Box<dyn Directory>,
    ) -> Self {
        Self {
            job,
            config,
            dns,
            resource_groups,
            directory,
            state: JobState::Pending,
        }
    }

    /// Build an orchestrator talking to Azure through `session`.
    ///
    /// The DNS variant is picked from the job's cloud environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn for_azure(
        job: TeardownJob,
        config: TeardownConfig,
        session: &Session,
    ) -> Result<Self, CloudError> {
        let http = build_http_client()?;
        let arm = RestClient::new(
            http.clone(),
            session.arm_endpoint.clone(),
            session.arm_token(),
        );
        let graph = RestClient::new(http, session.graph_endpoint.clone(), session.graph_token());

        let dns = backend_for(
            &job.cloud,
            arm.clone(),
            &session.subscription_id,
            job.base_domain_resource_group.as_deref(),
        );
        let resource_groups = AzureResourceGroups::new(arm, session.subscription_id.clone())
            .with_attempt_timeout(config.resource_group_attempt_timeout);
        let directory = GraphDirectory::new(graph);

        Ok(Self::new(
            job,
            config,
            dns,
            Box::new(resource_groups),
            Box::new(directory),
        ))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// The job being torn down.
    #[must_use]
    pub fn job(&self) -> &TeardownJob {
        &self.job
    }

    /// Run every phase and return the errors collected along the way.
    pub async fn run(&mut self) -> AggregateError {
        let mut errors = AggregateError::default();

        info!(
            cluster_id = %self.job.cluster_id,
            resource_group = %self.job.resource_group,
            cloud = %self.job.cloud,
            deadline = %self.job.deadline_at.to_rfc3339(),
            "Starting teardown"
        );

        for phase in Phase::ALL {
            self.state = JobState::Running(phase);
            let deadline = self.phase_deadline(phase);
            let started = Instant::now();

            info!(
                phase = %phase,
                budget = ?deadline.saturating_duration_since(started),
                "Starting phase"
            );

            let outcome = run_phase(phase, deadline, self.config.poll_interval, || {
                self.phase_body(phase)
            })
            .await;

            match outcome {
                PhaseOutcome::Succeeded { attempts } => {
                    info!(
                        phase = %phase,
                        attempts = attempts,
                        elapsed = ?started.elapsed(),
                        "Phase succeeded"
                    );
                }
                PhaseOutcome::TimedOut {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        phase = %phase,
                        attempts = attempts,
                        "Phase timed out, continuing with next phase"
                    );
                    errors.push(PhaseError::TimedOut {
                        phase,
                        attempts,
                        last_error,
                    });
                }
                PhaseOutcome::Failed { class, error } => {
                    error!(
                        phase = %phase,
                        class = %class,
                        error = %error,
                        "Phase failed, aborting teardown"
                    );
                    errors.push(PhaseError::Failed {
                        phase,
                        class,
                        source: error,
                    });
                    self.state = JobState::Aborted;
                    return errors;
                }
            }
        }

        self.state = JobState::Succeeded;
        if errors.is_empty() {
            info!(cluster_id = %self.job.cluster_id, "Teardown complete");
        } else {
            warn!(
                cluster_id = %self.job.cluster_id,
                failed_phases = errors.len(),
                "Teardown finished with errors"
            );
        }
        errors
    }

    /// The earlier of the job deadline and `phase`'s cap from now.
    fn phase_deadline(&self, phase: Phase) -> Instant {
        match self.config.phase_timeout(phase) {
            Some(cap) => self.job.deadline.min(Instant::now() + cap),
            None => self.job.deadline,
        }
    }

    fn phase_body(&self, phase: Phase) -> BoxFuture<'_, Result<(), CloudError>> {
        debug!(phase = %phase, "Running phase attempt");
        match phase {
            Phase::Dns => clean_dns(self.dns.as_ref(), &self.job).boxed(),
            Phase::ResourceGroup => self.resource_groups.delete(&self.job.resource_group),
            Phase::AppRegistrations => async move {
                AppRegistrationCleaner::new(self.directory.as_ref())
                    .delete(&self.job.cluster_id)
                    .await
            }
            .boxed(),
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod orchestrator_tests;
