//! Integration tests for the blocking submit-and-wait flow.

mod common;

use assert_matches::assert_matches;
use mediaforge_fal::error::QueueError;
use mediaforge_fal::submit::{submit_to_queue, wait_for_completion};
use serde_json::json;

use common::*;

// ---------------------------------------------------------------------------
// Test: queued, running, completed returns the provider payload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completes_after_queue_and_progress() {
    let transport = ScriptedTransport::new()
        .statuses([in_queue(Some(2)), in_progress(), completed()])
        .result(json!({"images": [{"url": "https://cdn/a.png"}]}));

    let value = submit_to_queue(
        &transport,
        "fal-ai/flux/dev",
        &json!({"prompt": "a fox"}),
        &fast_retry(),
        &fast_poll(10),
    )
    .await
    .unwrap();

    assert_eq!(value["images"][0]["url"], "https://cdn/a.png");
    assert_eq!(transport.status_count(), 3);
    assert_eq!(transport.result_count(), 1);
    assert_eq!(
        transport.last_response_url.lock().unwrap().as_deref(),
        Some("https://queue.fal.run/fal-ai/x/requests/req-1")
    );
}

// ---------------------------------------------------------------------------
// Test: FAILED surfaces the provider message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_failure_is_an_error() {
    let statuses = [in_progress(), failed("NSFW content detected")];
    let transport = ScriptedTransport::new().statuses(statuses);

    let err = submit_to_queue(
        &transport,
        "fal-ai/flux/dev",
        &json!({}),
        &fast_retry(),
        &fast_poll(10),
    )
    .await
    .unwrap_err();

    assert_matches!(
        err,
        QueueError::Failed { ref message, .. } if message == "NSFW content detected"
    );
    assert_eq!(transport.result_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: the attempt budget bounds the number of status checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn times_out_after_max_attempts() {
    let transport = ScriptedTransport::new();

    let err = submit_to_queue(
        &transport,
        "fal-ai/flux/dev",
        &json!({}),
        &fast_retry(),
        &fast_poll(4),
    )
    .await
    .unwrap_err();

    assert_matches!(err, QueueError::Timeout { attempts: 4 });
    assert_eq!(transport.status_count(), 4);
}

// ---------------------------------------------------------------------------
// Test: transient submit errors are retried, permanent ones are not
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_retries_rate_limits() {
    let transport = ScriptedTransport::new()
        .submit_reply(Reply::Http(429))
        .submit_reply(Reply::Network)
        .statuses([completed()])
        .result(json!({"images": []}));

    submit_to_queue(
        &transport,
        "fal-ai/flux/dev",
        &json!({}),
        &fast_retry(),
        &fast_poll(3),
    )
    .await
    .unwrap();

    assert_eq!(transport.submit_count(), 3);
}

#[tokio::test]
async fn submit_does_not_retry_auth_errors() {
    let transport = ScriptedTransport::new().submit_reply(Reply::Http(401));

    let err = submit_to_queue(
        &transport,
        "fal-ai/flux/dev",
        &json!({}),
        &fast_retry(),
        &fast_poll(3),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(transport.submit_count(), 1);
    assert_eq!(transport.status_count(), 0);
}

#[tokio::test]
async fn malformed_endpoint_is_rejected_before_submitting() {
    let transport = ScriptedTransport::new();

    let err = submit_to_queue(&transport, "", &json!({}), &fast_retry(), &fast_poll(3))
        .await
        .unwrap_err();

    assert_matches!(err, QueueError::Core(_));
    assert_eq!(transport.submit_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: transient status errors cost an attempt but do not abort
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_status_errors_are_absorbed() {
    let transport = ScriptedTransport::new()
        .status_reply(Reply::Http(503))
        .status_reply(Reply::Network)
        .statuses([completed()])
        .result(json!({"images": []}));
    let poll = fast_poll(5);

    wait_for_completion(&transport, "fal-ai/flux/dev", "req-1", &poll, |_| {})
        .await
        .unwrap();

    assert_eq!(transport.status_count(), 3);
}

#[tokio::test]
async fn permanent_status_errors_abort() {
    let transport = ScriptedTransport::new().status_reply(Reply::Http(404));
    let poll = fast_poll(5);

    let err = wait_for_completion(&transport, "fal-ai/flux/dev", "req-1", &poll, |_| {})
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(transport.status_count(), 1);
}

// ---------------------------------------------------------------------------
// Test: the status callback sees every non-terminal tick
// ---------------------------------------------------------------------------

#[tokio::test]
async fn callback_receives_progress_labels() {
    let transport = ScriptedTransport::new()
        .statuses([in_queue(Some(1)), in_progress(), completed()])
        .result(json!({"images": []}));

    let mut labels = Vec::new();
    wait_for_completion(&transport, "fal-ai/flux/dev", "req-1", &fast_poll(5), |status| {
        labels.push(status.progress_label())
    })
    .await
    .unwrap();

    assert_eq!(labels, ["In queue (position 1)", "Processing..."]);
}
