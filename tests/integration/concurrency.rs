//! Concurrency tests
//!
//! - Racing acknowledgements of one breach
//! - Overlapping evaluations against one dedup window
//! - Parallel dispatches sharing a store

use std::sync::Arc;

use chrono::{Duration, Utc};
use citywatch::{
    AlertError, Metric,
    alerts::AlertManager,
    dispatcher::DispatchRequest,
    monitors::BreachEvaluator,
    storage::{AlertStore, BreachFilter, NotificationStatus},
};

use crate::helpers::*;

#[tokio::test]
async fn test_concurrent_acks_have_exactly_one_winner() {
    let (_dir, store) = temp_store().await;
    let sampler = Arc::new(ScriptedSampler::new(&[(Metric::Traffic, 99.0)]));
    let evaluator = BreachEvaluator::new(store.clone(), sampler, Duration::minutes(5));
    let breach_id = evaluator.evaluate().await.unwrap().created[0].id;

    let alerts = AlertManager::new(store.clone());

    let mut tasks = vec![];
    for operator in 1..=10 {
        let alerts = alerts.clone();
        tasks.push(tokio::spawn(async move {
            alerts.acknowledge(breach_id, operator).await
        }));
    }

    let mut winners = vec![];
    let mut losers = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(acked) => winners.push(acked),
            Err(AlertError::NotFound { .. }) => losers += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(losers, 9);

    let stored = store.get_breach(breach_id).await.unwrap().unwrap();
    assert_eq!(stored.acked_by, Some(winners[0].acked_by));
}

#[tokio::test]
async fn test_overlapping_evaluations_record_one_breach() {
    let (_dir, store) = temp_store().await;
    let sampler = Arc::new(ScriptedSampler::new(&[(Metric::Power, 97.0)]));
    let evaluator = Arc::new(BreachEvaluator::new(
        store.clone(),
        sampler,
        Duration::minutes(5),
    ));

    let now = Utc::now();
    let mut tasks = vec![];
    for _ in 0..8 {
        let evaluator = evaluator.clone();
        tasks.push(tokio::spawn(async move { evaluator.evaluate_at(now).await }));
    }

    let mut created = 0;
    for task in tasks {
        let summary = task.await.unwrap().unwrap();
        created += summary.created.len();
    }

    assert_eq!(created, 1);
    let breaches = store.list_breaches(BreachFilter::All, 100).await.unwrap();
    assert_eq!(breaches.len(), 1);
}

#[tokio::test]
async fn test_parallel_dispatches_get_distinct_rows() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_subscription(&subscription("https://push.example/a", 1))
        .await
        .unwrap();
    let (push, dispatcher) = push_only_dispatcher(store.clone());

    let mut tasks = vec![];
    for i in 0..10 {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            dispatcher
                .dispatch(DispatchRequest::new(format!("Bulletin {i}"), "City update"))
                .await
        }));
    }

    let mut ids = vec![];
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.status, NotificationStatus::Sent);
        ids.push(outcome.id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
    assert_eq!(push.delivered.lock().unwrap().len(), 10);
    assert_eq!(store.list_notifications(100).await.unwrap().len(), 10);
}
