use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::{StreamExt, stream};
use tokio::task::JoinSet;

use sluice_bridge::bridge::Bridge;
use sluice_bridge::error::{BoxError, CallError, TerminationReason};
use sluice_bridge::ingress::RequestStream;
use sluice_bridge::pipeline::{Pipeline, make_pipeline};
use sluice_bridge::token::Envelope;

/// Echoes each request body back as the response.
fn echo() -> impl Pipeline<String, Resp = String> {
    make_pipeline(|requests: RequestStream<String>| {
        requests.map(|envelope| -> Result<_, BoxError> {
            let body = envelope.request().clone();
            Ok((envelope, body))
        })
    })
}

#[tokio::test]
async fn each_caller_gets_its_own_response_under_concurrency() {
    let bridge = Arc::new(Bridge::new(echo()).expect("build bridge"));

    let mut calls = JoinSet::new();
    for i in 0..128 {
        let bridge = Arc::clone(&bridge);
        calls.spawn(async move {
            let request = format!("request-{i}");
            let response = bridge.call(request.clone()).await.expect("echoed response");
            (request, response)
        });
    }

    while let Some(joined) = calls.join_next().await {
        let (request, response) = joined.expect("caller task");
        assert_eq!(request, response);
    }
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn responses_map_to_the_originating_request_independent_of_submission_order() {
    // maps each request to the length of its body
    let pipeline = make_pipeline(|requests: RequestStream<String>| {
        requests.map(|envelope| -> Result<_, BoxError> {
            let length = envelope.request().len();
            Ok((envelope, length))
        })
    });
    let bridge = Arc::new(Bridge::new(pipeline).expect("build bridge"));

    let a = bridge.call(String::from("aaaa"));
    let b = bridge.call(String::from("bb"));
    let (a, b) = tokio::join!(a, b);

    assert_eq!(a.expect("response for a"), 4);
    assert_eq!(b.expect("response for b"), 2);
}

#[tokio::test]
async fn reordering_emissions_does_not_cross_wires() {
    // emits each pair of requests in reverse arrival order
    let pipeline = make_pipeline(|requests: RequestStream<String>| {
        requests
            .chunks(2)
            .flat_map(|batch| stream::iter(batch.into_iter().rev().collect::<Vec<_>>()))
            .map(|envelope| -> Result<_, BoxError> {
                let body = envelope.request().clone();
                Ok((envelope, body))
            })
    });
    let bridge = Bridge::new(pipeline).expect("build bridge");

    let (first, second) = tokio::join!(bridge.call(String::from("first")), bridge.call(String::from("second")));
    assert_eq!(first.expect("response"), "first");
    assert_eq!(second.expect("response"), "second");
}

#[tokio::test(start_paused = true)]
async fn a_slow_response_does_not_block_unrelated_calls() {
    let pipeline = make_pipeline(|requests: RequestStream<String>| {
        requests
            .map(|envelope| async move {
                if envelope.request() == "slow" {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                let body = envelope.request().clone();
                Ok::<_, BoxError>((envelope, body))
            })
            .buffer_unordered(16)
    });
    let bridge = Arc::new(Bridge::new(pipeline).expect("build bridge"));

    let slow_bridge = Arc::clone(&bridge);
    let slow = tokio::spawn(async move { slow_bridge.call(String::from("slow")).await });

    // fast calls complete while the slow one is still in flight
    for i in 0..8 {
        let request = format!("fast-{i}");
        let response = bridge.call(request.clone()).await.expect("fast response");
        assert_eq!(response, request);
    }
    assert_eq!(bridge.pending_calls(), 1);

    let slow = slow.await.expect("slow task").expect("slow response");
    assert_eq!(slow, "slow");
}

#[tokio::test]
async fn pipeline_failure_is_broadcast_to_every_waiting_caller() {
    // swallows ordinary requests and fails the whole stream on "boom"
    let pipeline = make_pipeline(|requests: RequestStream<String>| {
        requests.filter_map(|envelope| async move {
            (envelope.request() == "boom").then(|| Err::<(Envelope<String>, String), BoxError>("exploded".into()))
        })
    });
    let bridge = Arc::new(Bridge::new(pipeline).expect("build bridge"));

    let mut waiters = JoinSet::new();
    for i in 0..8 {
        let bridge = Arc::clone(&bridge);
        waiters.spawn(async move { bridge.call(format!("wait-{i}")).await });
    }
    // let every waiter register before poisoning the stream
    while bridge.pending_calls() < 8 {
        tokio::task::yield_now().await;
    }

    let boom = bridge.call(String::from("boom")).await;
    assert!(matches!(boom, Err(CallError::PipelineTerminated(TerminationReason::Failed(_)))));

    while let Some(joined) = waiters.join_next().await {
        let outcome = joined.expect("waiter task");
        assert!(matches!(outcome, Err(CallError::PipelineTerminated(TerminationReason::Failed(cause))) if &*cause == "exploded"));
    }

    // future callers fail fast instead of hanging
    let late = bridge.call(String::from("after")).await;
    assert!(matches!(late, Err(CallError::PipelineTerminated(TerminationReason::Failed(_)))));
}

#[tokio::test]
async fn pipeline_completion_fails_future_calls_fast() {
    let pipeline = make_pipeline(|requests: RequestStream<String>| {
        requests.take(1).map(|envelope| -> Result<_, BoxError> {
            let body = envelope.request().clone();
            Ok((envelope, body))
        })
    });
    let bridge = Bridge::new(pipeline).expect("build bridge");

    let only = bridge.call(String::from("only")).await.expect("first call served");
    assert_eq!(only, "only");

    while bridge.termination().is_none() {
        tokio::task::yield_now().await;
    }

    let late = bridge.call(String::from("late")).await;
    assert!(matches!(late, Err(CallError::PipelineTerminated(TerminationReason::Completed))));
}

#[tokio::test]
async fn duplicate_emission_for_one_request_is_dropped_not_crossed() {
    // emits every response twice; the second copy has no pending slot
    let pipeline = make_pipeline(|requests: RequestStream<String>| {
        requests.flat_map(|envelope| {
            let duplicate = envelope.clone();
            let body = envelope.request().clone();
            stream::iter(vec![
                Ok::<_, BoxError>((envelope, body.clone())),
                Ok::<_, BoxError>((duplicate, format!("{body}-duplicate"))),
            ])
        })
    });
    let bridge = Bridge::new(pipeline).expect("build bridge");

    let first = bridge.call(String::from("one")).await.expect("response");
    assert_eq!(first, "one");

    // the dispatcher survived the stray emission and keeps serving
    let second = bridge.call(String::from("two")).await.expect("response");
    assert_eq!(second, "two");
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_unregisters_the_slot() {
    // never responds
    let pipeline = make_pipeline(|requests: RequestStream<String>| {
        requests.filter_map(|_| async { None::<Result<(Envelope<String>, String), BoxError>> })
    });
    let bridge = Bridge::new(pipeline).expect("build bridge");

    let outcome = bridge.call_with_timeout(String::from("lost"), Duration::from_millis(50)).await;
    assert!(matches!(outcome, Err(CallError::Timeout { .. })));
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn cancelled_caller_leaves_no_slot_and_a_late_response_is_harmless() {
    // only responds when the test fires a trigger, one trigger per request
    let (trigger, triggers) = mpsc::unbounded::<()>();
    let pipeline = make_pipeline(move |requests: RequestStream<String>| {
        requests.zip(triggers).map(|(envelope, ())| -> Result<_, BoxError> {
            let body = envelope.request().clone();
            Ok((envelope, body))
        })
    });
    let bridge = Bridge::new(pipeline).expect("build bridge");

    {
        let mut abandoned = std::pin::pin!(bridge.call(String::from("abandoned")));
        assert!(futures::poll!(abandoned.as_mut()).is_pending());
        assert_eq!(bridge.pending_calls(), 1);
    }
    assert_eq!(bridge.pending_calls(), 0);

    // releases the response for the cancelled call, then one for the next
    trigger.unbounded_send(()).expect("first trigger");
    trigger.unbounded_send(()).expect("second trigger");

    let served = bridge.call(String::from("served")).await.expect("response");
    assert_eq!(served, "served");
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn shutdown_records_the_reason_and_stops_the_drive_task() {
    let bridge = Bridge::<String, String>::new(echo()).expect("build bridge");

    let served = bridge.call(String::from("before")).await.expect("response");
    assert_eq!(served, "before");

    bridge.shutdown().await;
}
