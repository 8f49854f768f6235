use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tally_common::error::portal_error::PortalError;
use tally_engine::sequence::{ActionError, Expectation, FailureCause, RetryPolicy, Sequence, Step};

/// Counts invocations per step and records the order they ran in.
#[derive(Default)]
struct Ledger {
    calls: Vec<u32>,
    order: Vec<usize>,
}

impl Ledger {
    fn with_steps(n: usize) -> Self {
        Self {
            calls: vec![0; n],
            order: Vec::new(),
        }
    }
}

/// Step that replays a script of outcomes, repeating the last one.
struct Scripted {
    id: usize,
    script: Vec<Result<Value, ActionError>>,
}

impl Scripted {
    fn ok(id: usize, value: Value) -> Self {
        Self {
            id,
            script: vec![Ok(value)],
        }
    }

    fn failing(id: usize) -> Self {
        Self {
            id,
            script: vec![Err(ActionError::Other(format!("step {} broke", id)))],
        }
    }

    fn scripted(id: usize, script: Vec<Result<Value, ActionError>>) -> Self {
        Self { id, script }
    }
}

#[async_trait]
impl Step<Ledger> for Scripted {
    fn name(&self) -> String {
        format!("scripted-{}", self.id)
    }

    async fn execute(&self, ctx: &mut Ledger) -> Result<Value, ActionError> {
        let n = ctx.calls[self.id] as usize;
        ctx.calls[self.id] += 1;
        ctx.order.push(self.id);
        self.script[n.min(self.script.len() - 1)].clone()
    }
}

#[tokio::test]
async fn test_first_error_stops_attempt() {
    let mut seq = Sequence::new();
    seq.add(Scripted::ok(0, Value::Null))
        .add(Scripted::failing(1))
        .add(Scripted::ok(2, Value::Null))
        .add(Scripted::ok(3, Value::Null));

    let mut ledger = Ledger::with_steps(4);
    assert!(!seq.run(&mut ledger, &RetryPolicy::once()).await);
    assert_eq!(ledger.calls, vec![1, 1, 0, 0]);
}

#[tokio::test]
async fn test_first_mismatch_stops_attempt() {
    let mut seq = Sequence::new();
    seq.add_expecting(Scripted::ok(0, json!("ok")), "ok")
        .add_expecting(Scripted::ok(1, json!(false)), true)
        .add(Scripted::ok(2, Value::Null));

    let mut ledger = Ledger::with_steps(3);
    let report = seq.run_with_report(&mut ledger, &RetryPolicy::once()).await;

    assert!(!report.succeeded);
    assert_eq!(ledger.calls, vec![1, 1, 0]);
    let failure = report.last_failure.expect("failure should be reported");
    assert_eq!(failure.index, 1);
    assert_eq!(failure.step, "scripted-1");
    assert!(matches!(
        failure.cause,
        FailureCause::Mismatch { ref expected, ref actual }
            if *expected == json!(true) && *actual == json!(false)
    ));
}

#[tokio::test]
async fn test_success_needs_one_attempt() {
    let mut seq = Sequence::new();
    seq.add(Scripted::ok(0, Value::Null))
        .add_expecting(Scripted::ok(1, json!(true)), true)
        .add(Scripted::ok(2, json!(42)));

    let mut ledger = Ledger::with_steps(3);
    let report = seq
        .run_with_report(&mut ledger, &RetryPolicy::new(5, Duration::ZERO))
        .await;

    assert!(report.succeeded);
    assert_eq!(report.attempts, 1);
    assert!(report.last_failure.is_none());
    assert_eq!(ledger.calls, vec![1, 1, 1]);
    assert_eq!(ledger.order, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_persistent_failure_replays_from_start() {
    let mut seq = Sequence::new();
    seq.add(Scripted::ok(0, Value::Null))
        .add(Scripted::ok(1, Value::Null))
        .add(Scripted::failing(2))
        .add(Scripted::ok(3, Value::Null));

    let mut ledger = Ledger::with_steps(4);
    let report = seq
        .run_with_report(&mut ledger, &RetryPolicy::new(4, Duration::ZERO))
        .await;

    assert!(!report.succeeded);
    assert_eq!(report.attempts, 4);
    assert_eq!(ledger.calls, vec![4, 4, 4, 0]);
    // Every attempt starts again at step 0.
    assert_eq!(&ledger.order[..6], &[0, 1, 2, 0, 1, 2]);
}

#[tokio::test]
async fn test_mismatch_recovers_on_third_attempt() {
    let mut seq = Sequence::new();
    seq.add(Scripted::ok(0, Value::Null))
        .add_expecting(
            Scripted::scripted(
                1,
                vec![Ok(json!("fail")), Ok(json!("fail")), Ok(json!("ok"))],
            ),
            "ok",
        )
        .add(Scripted::ok(2, Value::Null));

    let mut ledger = Ledger::with_steps(3);
    assert!(seq.run(&mut ledger, &RetryPolicy::new(3, Duration::ZERO)).await);
    assert_eq!(ledger.calls, vec![3, 3, 1]);
}

#[tokio::test]
async fn test_zero_attempts_runs_once() {
    let mut seq = Sequence::new();
    seq.add(Scripted::failing(0));

    let mut ledger = Ledger::with_steps(1);
    let report = seq
        .run_with_report(&mut ledger, &RetryPolicy::new(0, Duration::ZERO))
        .await;
    assert!(!report.succeeded);
    assert_eq!(report.attempts, 1);
    assert_eq!(ledger.calls, vec![1]);
}

#[tokio::test]
async fn test_empty_sequence_succeeds() {
    let seq: Sequence<Ledger> = Sequence::new();
    let mut ledger = Ledger::default();
    assert!(seq.is_empty());
    assert!(seq.run(&mut ledger, &RetryPolicy::default()).await);
}

#[tokio::test]
async fn test_null_result_is_not_mistaken_for_no_expectation() {
    let mut seq = Sequence::new();
    seq.add_with(Scripted::ok(0, Value::Null), Expectation::None)
        .add_with(Scripted::ok(1, Value::Null), Expectation::Equals(Value::Null))
        .add_expecting(Scripted::ok(2, Value::Null), false);

    let mut ledger = Ledger::with_steps(3);
    let report = seq.run_with_report(&mut ledger, &RetryPolicy::once()).await;
    assert!(!report.succeeded);
    assert_eq!(report.last_failure.map(|f| f.index), Some(2));
}

#[tokio::test]
async fn test_error_is_reported_not_raised() {
    let mut seq = Sequence::new();
    seq.add(Scripted::failing(0));

    let mut ledger = Ledger::with_steps(1);
    let report = seq.run_with_report(&mut ledger, &RetryPolicy::once()).await;
    let failure = report.last_failure.expect("failure should be reported");
    assert!(matches!(failure.cause, FailureCause::Error(ActionError::Other(_))));
    assert!(failure.to_string().contains("step 0 broke"));
    assert!(failure.to_string().contains("[STEP_FAILED]"));
    assert_eq!(failure.recovery_hint(), None);
}

#[tokio::test]
async fn test_portal_failure_carries_code_and_hint() {
    let missing = PortalError::ElementNotFound {
        locator: "#ddlReportName".into(),
    };
    let mut seq = Sequence::new();
    seq.add(Scripted::ok(0, Value::Null))
        .add(Scripted::scripted(1, vec![Err(missing.into())]));

    let mut ledger = Ledger::with_steps(2);
    let report = seq.run_with_report(&mut ledger, &RetryPolicy::once()).await;
    let failure = report.last_failure.expect("failure should be reported");
    assert_eq!(
        failure.to_string(),
        "step 2 (scripted-1) failed [ELEMENT_NOT_FOUND]: Portal error: Element not found: #ddlReportName"
    );
    assert_eq!(
        failure.recovery_hint(),
        Some("The portal markup may have changed; check the selector")
    );
}

#[tokio::test(start_paused = true)]
async fn test_delay_only_between_attempts() {
    let mut seq = Sequence::new();
    seq.add(Scripted::failing(0));

    let mut ledger = Ledger::with_steps(1);
    let started = tokio::time::Instant::now();
    let ok = seq
        .run(&mut ledger, &RetryPolicy::new(3, Duration::from_secs(10)))
        .await;

    assert!(!ok);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}

#[test]
fn test_step_names_in_order() {
    let mut seq = Sequence::new();
    seq.add(Scripted::ok(0, Value::Null)).add(Scripted::failing(1));
    assert_eq!(seq.step_names(), vec!["scripted-0", "scripted-1"]);
    assert_eq!(seq.len(), 2);
}
