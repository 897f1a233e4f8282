use std::time::Duration;

use kx_ratelimit::Admission;
use kx_ratelimit::RateLimitError;

use crate::errors::CallError;
use crate::errors::HttpError;

/// Retry policy wrapped around a single logical remote call
///
/// The policy takes the operation as a closure and owns the ordering
/// admission check → attempt → sleep → admission check. Both waits block the
/// calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between attempts after a transport/remote failure, zero disables retrying
    pub retry_delay: Duration,

    /// Wait before resubmitting when the call budget is exhausted, zero raises instead
    pub budget_block_delay: Duration,

    /// Optional ceiling on failed attempts, unbounded when `None`
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retry_delay: Duration::from_millis(500), budget_block_delay: Duration::from_secs(5), max_attempts: None }
    }
}

impl RetryPolicy {
    /// Attempt once and surface every failure
    pub fn no_retry() -> Self {
        Self { retry_delay: Duration::ZERO, budget_block_delay: Duration::ZERO, max_attempts: None }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Run a budgeted call, waiting out budget exhaustion if configured
    pub fn run<A, T, F>(&self, budget: &A, cost: u32, op: F) -> Result<T, CallError>
    where
        A: Admission + ?Sized,
        F: FnMut() -> Result<T, HttpError>,
    {
        self.run_admitted(budget, cost, true, op)
    }

    /// Run a public call; a closed gate is terminal for the call
    ///
    /// A retry after a transport failure that finds the gate closed waits out
    /// the remaining spacing once. If the gate is still closed, the transport
    /// failure is returned rather than the gate rejection.
    pub fn run_public<A, T, F>(&self, gate: &A, op: F) -> Result<T, CallError>
    where
        A: Admission + ?Sized,
        F: FnMut() -> Result<T, HttpError>,
    {
        self.run_admitted(gate, 0, false, op)
    }

    fn run_admitted<A, T, F>(&self, admission: &A, cost: u32, block_on_budget: bool, mut op: F) -> Result<T, CallError>
    where
        A: Admission + ?Sized,
        F: FnMut() -> Result<T, HttpError>,
    {
        if self.retry_delay.is_zero() {
            admission.try_admit(cost).map_err(CallError::BudgetExceeded)?;
            return op().map_err(CallError::RemoteTransient);
        }

        let mut attempt: u32 = 0;
        let mut last_failure: Option<HttpError> = None;
        let mut gate_waited = false;
        loop {
            if let Err(err) = admission.try_admit(cost) {
                if block_on_budget && !self.budget_block_delay.is_zero() {
                    tracing::warn!("{err}, sleeping for {:?}", self.budget_block_delay);
                    std::thread::sleep(self.budget_block_delay);
                    continue;
                }

                match (last_failure.take(), err) {
                    // A public retry held back by the gate waits out the spacing once
                    (Some(failure), RateLimitError::PublicRateExceeded { retry_after }) if !gate_waited => {
                        tracing::debug!("public gate closed for retry, waiting {retry_after:?}");
                        gate_waited = true;
                        last_failure = Some(failure);
                        std::thread::sleep(retry_after);
                        continue;
                    }
                    (Some(failure), RateLimitError::PublicRateExceeded { .. }) => return Err(CallError::RemoteTransient(failure)),
                    (_, err) => return Err(CallError::BudgetExceeded(err)),
                }
            }
            gate_waited = false;

            match op() {
                Ok(result) => return Ok(result),
                Err(err) if !err.is_retryable() => return Err(CallError::RemoteTransient(err)),
                Err(err) => {
                    attempt += 1;
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        tracing::error!("giving up after {attempt} attempts: {err}");
                        return Err(CallError::RemoteTransient(err));
                    }
                    tracing::warn!("attempt: {attempt:03} | {err}, retrying in {:?}", self.retry_delay);
                    std::thread::sleep(self.retry_delay);
                    last_failure = Some(err);
                }
            }
        }
    }
}
