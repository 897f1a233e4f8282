use std::time::Duration;

use kx_ratelimit::Admission;
use kx_ratelimit::CallBudget;
use kx_ratelimit::DEFAULT_PUBLIC_INTERVAL;
use kx_ratelimit::PublicGate;
use kx_ratelimit::Tier;
use serde::Deserialize;
use serde_json::Value;

use crate::client::ExchangeTransport;
use crate::errors::CallError;
use crate::operation::ApiRequest;
use crate::operation::CallClass;
use crate::operation::Operation;
use crate::retry::RetryPolicy;

/// Pacing and retry configuration of an [`ExchangeClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    pub tier: Tier,
    pub retry: RetryPolicy,
    /// Minimum spacing between public calls, zero disables the gate
    pub public_min_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { tier: Tier::default(), retry: RetryPolicy::default(), public_min_interval: DEFAULT_PUBLIC_INTERVAL }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerTime {
    pub unixtime: i64,
    pub rfc1123: String,
}

/// Throttled, retrying entry point for REST operations
///
/// Private calls are charged against the account call budget, public calls
/// pass through the spacing gate, order entry goes straight to the transport.
/// Budget and gate are shared by every thread using the same client.
pub struct ExchangeClient<T: ExchangeTransport> {
    transport: T,
    budget: Box<dyn Admission>,
    public_gate: Box<dyn Admission>,
    policy: RetryPolicy,
}

impl<T: ExchangeTransport> ExchangeClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self::with_admission(transport, CallBudget::for_tier(config.tier), PublicGate::new(config.public_min_interval), config.retry)
    }

    /// Assemble a client from explicit admission controllers
    pub fn with_admission(transport: T, budget: impl Admission + 'static, public_gate: impl Admission + 'static, policy: RetryPolicy) -> Self {
        Self { transport, budget: Box::new(budget), public_gate: Box::new(public_gate), policy }
    }

    /// Run an operation under the admission and retry rules of its class
    pub fn call(&self, request: ApiRequest) -> Result<Value, CallError> {
        let operation = request.operation;
        let attempt = || self.transport.call(&request);

        match operation.class() {
            CallClass::Public => self.policy.run_public(self.public_gate.as_ref(), attempt),
            CallClass::Private => self.policy.run(self.budget.as_ref(), operation.cost(), attempt),
            CallClass::Unmetered => attempt().map_err(CallError::RemoteTransient),
        }
    }

    pub fn server_time(&self) -> Result<ServerTime, CallError> {
        let value = self.call(ApiRequest::new(Operation::ServerTime))?;
        decode(value)
    }

    pub fn ticker(&self, pairs: &[&str]) -> Result<Value, CallError> {
        self.call(ApiRequest::new(Operation::Ticker).param("pair", pairs.join(",")))
    }

    pub fn account_balance(&self) -> Result<Value, CallError> {
        self.call(ApiRequest::new(Operation::AccountBalance))
    }

    pub fn ledgers(&self, asset: Option<&str>, start: Option<i64>, end: Option<i64>) -> Result<Value, CallError> {
        self.call(ApiRequest::new(Operation::Ledgers).param_opt("asset", asset).param_opt("start", start).param_opt("end", end))
    }

    pub fn trades_history(&self, start: Option<i64>, end: Option<i64>) -> Result<Value, CallError> {
        self.call(ApiRequest::new(Operation::TradesHistory).param_opt("start", start).param_opt("end", end))
    }

    pub fn budget(&self) -> &dyn Admission {
        self.budget.as_ref()
    }

    pub fn public_gate(&self) -> &dyn Admission {
        self.public_gate.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn decode<R: serde::de::DeserializeOwned>(value: Value) -> Result<R, CallError> {
    serde_json::from_value(value).map_err(|err| CallError::RemoteTransient(err.into()))
}
