//! ExchangeClient shared across threads against an in-memory transport

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use kx_http::ApiRequest;
use kx_http::CallError;
use kx_http::ExchangeClient;
use kx_http::ExchangeTransport;
use kx_http::HttpError;
use kx_http::Operation;
use kx_http::RetryPolicy;
use kx_ratelimit::Admission;
use kx_ratelimit::CallBudget;
use kx_ratelimit::ManualClock;
use kx_ratelimit::PublicGate;
use kx_ratelimit::RateLimitError;
use serde_json::Value;
use serde_json::json;

/// Fails the first `failures` calls, then answers with the endpoint name
#[derive(Default)]
struct CountingTransport {
    calls: AtomicUsize,
    failures: usize,
}

impl ExchangeTransport for CountingTransport {
    fn call(&self, request: &ApiRequest) -> Result<Value, HttpError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(HttpError::ApiError { messages: vec!["EService:Busy".to_string()] });
        }
        Ok(json!({ "endpoint": request.operation.endpoint() }))
    }
}

fn raise_on_exhaustion() -> RetryPolicy {
    RetryPolicy { retry_delay: Duration::from_millis(5), budget_block_delay: Duration::ZERO, max_attempts: None }
}

#[test]
fn test_shared_budget_never_overcommits() {
    let clock = ManualClock::new();
    let budget = CallBudget::with_clock(Some(20), Duration::from_secs(2), clock.clone());
    let client = Arc::new(ExchangeClient::with_admission(
        CountingTransport::default(),
        budget,
        PublicGate::with_clock(Duration::from_secs(1), clock),
        raise_on_exhaustion(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = Arc::clone(&client);
            std::thread::spawn(move || {
                (0..5)
                    .map(|_| match client.account_balance() {
                        Ok(_) => (1, 0),
                        Err(CallError::BudgetExceeded(RateLimitError::BudgetExceeded { .. })) => (0, 1),
                        Err(err) => panic!("unexpected error: {err}"),
                    })
                    .fold((0, 0), |acc, r| (acc.0 + r.0, acc.1 + r.1))
            })
        })
        .collect();

    let (admitted, rejected) = handles.into_iter().map(|h| h.join().unwrap()).fold((0, 0), |acc, r| (acc.0 + r.0, acc.1 + r.1));

    assert_eq!(admitted, 20);
    assert_eq!(rejected, 20);
    assert_eq!(client.transport().calls.load(Ordering::SeqCst), 20);
    assert_eq!(client.budget().available(), Some(0));
}

#[test]
fn test_decay_frees_budget_on_manual_clock() {
    let clock = ManualClock::new();
    let budget = CallBudget::with_clock(Some(4), Duration::from_secs(2), clock.clone());
    let client = ExchangeClient::with_admission(CountingTransport::default(), budget, PublicGate::disabled(), raise_on_exhaustion());

    client.ledgers(None, None, None).unwrap();
    client.trades_history(None, None).unwrap();
    assert!(client.account_balance().unwrap_err().is_budget_exceeded());

    // One interval frees one unit
    clock.advance(Duration::from_secs(2));
    assert_eq!(client.account_balance().unwrap()["endpoint"], "Balance");
    assert!(client.account_balance().is_err());
}

#[test]
fn test_retry_consumes_budget_per_attempt() {
    let transport = CountingTransport { calls: AtomicUsize::new(0), failures: 2 };
    let budget = CallBudget::with_clock(Some(20), Duration::from_secs(2), ManualClock::new());
    let client = ExchangeClient::with_admission(transport, budget, PublicGate::disabled(), raise_on_exhaustion());

    let value = client.call(ApiRequest::new(Operation::QueryLedgers).param("id", "L1")).unwrap();

    assert_eq!(value["endpoint"], "QueryLedgers");
    assert_eq!(client.transport().calls.load(Ordering::SeqCst), 3);
    assert_eq!(client.budget().available(), Some(14));
}

#[test]
fn test_blocking_wait_on_real_clock() {
    let budget = CallBudget::new(Some(1), Duration::from_millis(20));
    let policy = RetryPolicy { retry_delay: Duration::from_millis(5), budget_block_delay: Duration::from_millis(40), max_attempts: None };
    let client = ExchangeClient::with_admission(CountingTransport::default(), budget, PublicGate::disabled(), policy);

    client.account_balance().unwrap();
    let started = Instant::now();
    client.account_balance().unwrap();

    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(client.transport().calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_public_spacing() {
    let clock = ManualClock::new();
    let client = ExchangeClient::with_admission(
        CountingTransport::default(),
        CallBudget::with_clock(Some(1), Duration::from_secs(2), clock.clone()),
        PublicGate::with_clock(Duration::from_secs(1), clock.clone()),
        raise_on_exhaustion(),
    );

    client.ticker(&["XBTUSD"]).unwrap();
    assert!(client.ticker(&["XBTUSD"]).is_err());

    clock.advance(Duration::from_secs(1));
    assert_eq!(client.call(ApiRequest::new(Operation::OrderBook).param("pair", "XBTUSD")).unwrap()["endpoint"], "Depth");
    assert_eq!(client.budget().available(), Some(1));
}
