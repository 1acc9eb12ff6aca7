//! Notification fan-out across endpoints and channels

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use citywatch::{
    AlertError,
    dispatcher::{DispatchRequest, Dispatcher},
    storage::{
        AlertStore, Channel, NotificationSeverity, NotificationStatus, OperatorContact,
    },
};
use pretty_assertions::assert_eq;

use crate::helpers::*;

fn operator(id: i64, email: Option<&str>, phone: Option<&str>) -> OperatorContact {
    OperatorContact {
        id,
        name: format!("operator {id}"),
        email: email.map(str::to_string),
        phone: phone.map(str::to_string),
    }
}

#[tokio::test]
async fn test_push_without_subscribers_is_not_an_error() {
    let (_dir, store) = temp_store().await;
    let (push, dispatcher) = push_only_dispatcher(store.clone());

    let outcome = dispatcher
        .dispatch(DispatchRequest::new("Road closure", "Main St closed"))
        .await
        .unwrap();

    assert_eq!(outcome.status, NotificationStatus::NoSubscribers);
    assert_eq!(outcome.sent, 0);
    assert!(outcome.results.is_empty());
    assert!(push.delivered.lock().unwrap().is_empty());

    let row = store.get_notification(outcome.id).await.unwrap().unwrap();
    assert_eq!(row.status, NotificationStatus::NoSubscribers);
    assert_eq!(row.source, "alert");
    assert_eq!(row.severity, NotificationSeverity::Low);
    assert!(row.sent_at.is_some());
}

#[tokio::test]
async fn test_one_failing_endpoint_does_not_block_the_others() {
    let (_dir, store) = temp_store().await;
    for endpoint in ["https://push.example/a", "https://push.example/b", "https://push.example/c"] {
        store.upsert_subscription(&subscription(endpoint, 1)).await.unwrap();
    }

    let push = Arc::new(FakePush::default().with("https://push.example/b", PushBehaviour::Fail));
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            push.clone(),
            Arc::new(FakeProvider::unconfigured()),
            Arc::new(FakeProvider::unconfigured()),
        ),
    );

    let outcome = dispatcher
        .dispatch(DispatchRequest::new("AQI high", "Stay indoors"))
        .await
        .unwrap();

    assert_eq!(outcome.status, NotificationStatus::Sent);
    assert_eq!(outcome.sent, 2);
    assert_eq!(outcome.results.len(), 3);

    let failed: Vec<_> = outcome.results.iter().filter(|r| !r.ok).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].endpoint, "https://push.example/b");
    assert!(failed[0].error.is_some());

    assert_eq!(
        push.delivered_endpoints(),
        vec!["https://push.example/a", "https://push.example/c"]
    );

    let row = store.get_notification(outcome.id).await.unwrap().unwrap();
    let report = row.delivery_report.unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(report.results.len(), 3);
}

#[tokio::test]
async fn test_all_endpoints_failing_marks_notification_failed() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_subscription(&subscription("https://push.example/a", 1))
        .await
        .unwrap();

    let push = Arc::new(FakePush::default().with("https://push.example/a", PushBehaviour::Fail));
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            push,
            Arc::new(FakeProvider::unconfigured()),
            Arc::new(FakeProvider::unconfigured()),
        ),
    );

    let outcome = dispatcher
        .dispatch(DispatchRequest::new("Grid fault", "Sector 4"))
        .await
        .unwrap();

    assert_eq!(outcome.status, NotificationStatus::Failed);
    assert_eq!(outcome.sent, 0);
    assert_eq!(
        store.get_notification(outcome.id).await.unwrap().unwrap().status,
        NotificationStatus::Failed
    );
}

#[tokio::test]
async fn test_gone_endpoint_is_removed() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_subscription(&subscription("https://push.example/live", 1))
        .await
        .unwrap();
    store
        .upsert_subscription(&subscription("https://push.example/dead", 2))
        .await
        .unwrap();

    let push =
        Arc::new(FakePush::default().with("https://push.example/dead", PushBehaviour::Gone));
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            push,
            Arc::new(FakeProvider::unconfigured()),
            Arc::new(FakeProvider::unconfigured()),
        ),
    );

    let outcome = dispatcher
        .dispatch(DispatchRequest::new("Flooding", "Avoid the underpass"))
        .await
        .unwrap();
    assert_eq!(outcome.sent, 1);

    let remaining: Vec<String> = store
        .list_subscriptions(None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.endpoint)
        .collect();
    assert_eq!(remaining, vec!["https://push.example/live".to_string()]);

    // The next dispatch no longer targets the dead endpoint
    let next = dispatcher
        .dispatch(DispatchRequest::new("Flooding", "Update"))
        .await
        .unwrap();
    assert_eq!(next.results.len(), 1);
}

#[tokio::test]
async fn test_hanging_endpoint_times_out() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_subscription(&subscription("https://push.example/slow", 1))
        .await
        .unwrap();
    store
        .upsert_subscription(&subscription("https://push.example/fast", 1))
        .await
        .unwrap();

    let push = Arc::new(FakePush::default().with("https://push.example/slow", PushBehaviour::Hang));
    let dispatcher = Dispatcher::new(
        store.clone(),
        transports(
            push,
            Arc::new(FakeProvider::unconfigured()),
            Arc::new(FakeProvider::unconfigured()),
        ),
        Duration::from_millis(50),
    );

    let started = Instant::now();
    let outcome = dispatcher
        .dispatch(DispatchRequest::new("Heat advisory", "Cooling centers open"))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.status, NotificationStatus::Sent);
    assert_eq!(outcome.sent, 1);

    let slow = outcome
        .results
        .iter()
        .find(|r| r.endpoint == "https://push.example/slow")
        .unwrap();
    assert!(!slow.ok);
    assert!(slow.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_operator_id_narrows_push_targets() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_subscription(&subscription("https://push.example/alice", 1))
        .await
        .unwrap();
    store
        .upsert_subscription(&subscription("https://push.example/bob", 2))
        .await
        .unwrap();

    let (push, dispatcher) = push_only_dispatcher(store.clone());

    let request = DispatchRequest {
        operator_id: Some(2),
        ..DispatchRequest::new("Shift change", "You are on call")
    };
    let outcome = dispatcher.dispatch(request).await.unwrap();

    assert_eq!(outcome.sent, 1);
    assert_eq!(push.delivered_endpoints(), vec!["https://push.example/bob"]);
}

#[tokio::test]
async fn test_unconfigured_channel_creates_no_row() {
    let (_dir, store) = temp_store().await;
    let (_push, dispatcher) = push_only_dispatcher(store.clone());

    let result = dispatcher
        .dispatch(DispatchRequest::new("Bin overflow", "Zone 3").on(Channel::Sms))
        .await;

    assert_matches!(result, Err(AlertError::Unavailable(Channel::Sms)));
    assert!(store.list_notifications(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_title_is_rejected() {
    let (_dir, store) = temp_store().await;
    let (_push, dispatcher) = push_only_dispatcher(store.clone());

    let result = dispatcher.dispatch(DispatchRequest::new("   ", "body")).await;

    assert_matches!(result, Err(AlertError::Validation(_)));
    assert!(store.list_notifications(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_reuses_notification_and_replaces_report() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_subscription(&subscription("https://push.example/a", 1))
        .await
        .unwrap();

    let failing = Arc::new(FakePush::default().with("https://push.example/a", PushBehaviour::Fail));
    let first = dispatcher(
        store.clone(),
        transports(
            failing,
            Arc::new(FakeProvider::unconfigured()),
            Arc::new(FakeProvider::unconfigured()),
        ),
    )
    .dispatch(DispatchRequest::new("Outage", "Substation 9"))
    .await
    .unwrap();
    assert_eq!(first.status, NotificationStatus::Failed);

    let (_push, healthy) = push_only_dispatcher(store.clone());
    let retry = healthy
        .dispatch(DispatchRequest {
            notification_id: Some(first.id),
            ..DispatchRequest::new("Outage", "Substation 9")
        })
        .await
        .unwrap();

    assert_eq!(retry.id, first.id);
    assert_eq!(retry.status, NotificationStatus::Sent);

    let row = store.get_notification(first.id).await.unwrap().unwrap();
    assert_eq!(row.status, NotificationStatus::Sent);
    let report = row.delivery_report.unwrap();
    assert_eq!(report.sent, 1);
    assert!(report.results.iter().all(|r| r.ok));
    assert_eq!(store.list_notifications(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retry_delivers_stored_content_on_stored_channel() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_subscription(&subscription("https://push.example/a", 1))
        .await
        .unwrap();

    let failing = Arc::new(FakePush::default().with("https://push.example/a", PushBehaviour::Fail));
    let first = dispatcher(
        store.clone(),
        transports(
            failing,
            Arc::new(FakeProvider::unconfigured()),
            Arc::new(FakeProvider::unconfigured()),
        ),
    )
    .dispatch(DispatchRequest::new("Water main burst", "Elm St closed"))
    .await
    .unwrap();
    assert_eq!(first.status, NotificationStatus::Failed);

    let (push, healthy) = push_only_dispatcher(store.clone());
    let retry = healthy
        .dispatch(DispatchRequest {
            notification_id: Some(first.id),
            ..DispatchRequest::new("", "something else").on(Channel::Email)
        })
        .await
        .unwrap();

    assert_eq!(retry.status, NotificationStatus::Sent);

    let delivered = push.delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1.title, "Water main burst");
    assert_eq!(delivered[0].1.body, "Elm St closed");
    assert_eq!(delivered[0].1.notification_id, first.id);

    let row = store.get_notification(first.id).await.unwrap().unwrap();
    assert_eq!(row.title, "Water main burst");
    assert_eq!(row.channel, Channel::Push);
}

#[tokio::test]
async fn test_storage_failure_during_delivery_marks_notification_failed() {
    let (dir, store) = temp_store().await;
    let (push, dispatcher) = push_only_dispatcher(store.clone());

    let side = side_pool(&dir).await;
    sqlx::query("DROP TABLE push_subscriptions")
        .execute(&side)
        .await
        .unwrap();
    side.close().await;

    let result = dispatcher
        .dispatch(DispatchRequest::new("Flooding", "Underpass closed"))
        .await;

    assert_matches!(result, Err(AlertError::Storage(_)));
    assert!(push.delivered_endpoints().is_empty());

    let rows = store.list_notifications(10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, NotificationStatus::Failed);
    assert!(rows[0].sent_at.is_some());

    let report = rows[0].delivery_report.clone().unwrap();
    assert_eq!(report.sent, 0);
    assert!(report.error.unwrap().contains("push_subscriptions"));
}

#[tokio::test]
async fn test_storage_failure_resolving_contact_marks_notification_failed() {
    let (dir, store) = temp_store().await;
    let email = Arc::new(FakeProvider::configured());
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            Arc::new(FakePush::default()),
            email.clone(),
            Arc::new(FakeProvider::unconfigured()),
        ),
    );

    let side = side_pool(&dir).await;
    sqlx::query("DROP TABLE operators").execute(&side).await.unwrap();
    side.close().await;

    let result = dispatcher
        .dispatch(DispatchRequest {
            operator_id: Some(3),
            ..DispatchRequest::new("Weekly report", "All systems nominal").on(Channel::Email)
        })
        .await;

    assert_matches!(result, Err(AlertError::Storage(_)));
    assert!(email.messages().is_empty());

    let rows = store.list_notifications(10).await.unwrap();
    assert_eq!(rows[0].status, NotificationStatus::Failed);
    assert!(rows[0].delivery_report.clone().unwrap().error.is_some());
}

#[tokio::test]
async fn test_retry_of_unknown_notification_is_not_found() {
    let (_dir, store) = temp_store().await;
    let (_push, dispatcher) = push_only_dispatcher(store.clone());

    let result = dispatcher
        .dispatch(DispatchRequest {
            notification_id: Some(4242),
            ..DispatchRequest::new("Outage", "")
        })
        .await;

    assert_matches!(result, Err(AlertError::NotFound { .. }));
}

#[tokio::test]
async fn test_email_falls_back_to_operator_contact() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_operator(&operator(3, Some("ops@city.example"), None))
        .await
        .unwrap();

    let email = Arc::new(FakeProvider::configured());
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            Arc::new(FakePush::default()),
            email.clone(),
            Arc::new(FakeProvider::unconfigured()),
        ),
    );

    let outcome = dispatcher
        .dispatch(DispatchRequest {
            operator_id: Some(3),
            ..DispatchRequest::new("Weekly report", "All systems nominal").on(Channel::Email)
        })
        .await
        .unwrap();

    assert_eq!(outcome.status, NotificationStatus::Sent);
    assert_eq!(outcome.results[0].endpoint, "ops@city.example");
    assert_eq!(
        email.messages(),
        vec![(
            "ops@city.example".to_string(),
            "Weekly report\nAll systems nominal".to_string()
        )]
    );
}

#[tokio::test]
async fn test_email_without_any_address_has_no_subscribers() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_operator(&operator(4, None, Some("+15550100")))
        .await
        .unwrap();

    let email = Arc::new(FakeProvider::configured());
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            Arc::new(FakePush::default()),
            email.clone(),
            Arc::new(FakeProvider::unconfigured()),
        ),
    );

    let outcome = dispatcher
        .dispatch(DispatchRequest {
            operator_id: Some(4),
            ..DispatchRequest::new("Weekly report", "").on(Channel::Email)
        })
        .await
        .unwrap();

    assert_eq!(outcome.status, NotificationStatus::NoSubscribers);
    assert!(email.messages().is_empty());
}

#[tokio::test]
async fn test_sms_joins_title_and_body() {
    let (_dir, store) = temp_store().await;
    let sms = Arc::new(FakeProvider::configured());
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            Arc::new(FakePush::default()),
            Arc::new(FakeProvider::unconfigured()),
            sms.clone(),
        ),
    );

    let outcome = dispatcher
        .dispatch(DispatchRequest {
            to: Some("+15550199".to_string()),
            ..DispatchRequest::new("Water main", "Boil water notice").on(Channel::Sms)
        })
        .await
        .unwrap();

    assert_eq!(outcome.status, NotificationStatus::Sent);
    assert_eq!(
        sms.messages(),
        vec![("+15550199".to_string(), "Water main: Boil water notice".to_string())]
    );
}

#[tokio::test]
async fn test_rejected_sms_is_reported_not_raised() {
    let (_dir, store) = temp_store().await;
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            Arc::new(FakePush::default()),
            Arc::new(FakeProvider::unconfigured()),
            Arc::new(FakeProvider::failing()),
        ),
    );

    let outcome = dispatcher
        .dispatch(DispatchRequest {
            to: Some("+15550199".to_string()),
            ..DispatchRequest::new("Water main", "").on(Channel::Sms)
        })
        .await
        .unwrap();

    assert_eq!(outcome.status, NotificationStatus::Failed);
    assert!(
        outcome.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("invalid recipient")
    );
}

#[tokio::test]
async fn test_broadcast_reports_each_channel() {
    let (_dir, store) = temp_store().await;
    store
        .upsert_subscription(&subscription("https://push.example/a", 1))
        .await
        .unwrap();

    let sms = Arc::new(FakeProvider::configured());
    let dispatcher = dispatcher(
        store.clone(),
        transports(
            Arc::new(FakePush::default()),
            Arc::new(FakeProvider::unconfigured()),
            sms.clone(),
        ),
    );

    let request = DispatchRequest {
        to: Some("+15550123".to_string()),
        ..DispatchRequest::new("Storm warning", "Secure loose objects")
    };
    let outcomes = dispatcher
        .broadcast(request, &[Channel::Push, Channel::Email, Channel::Sms])
        .await;

    assert_eq!(outcomes.len(), 3);

    let push = &outcomes[0];
    assert_eq!(push.channel, Channel::Push);
    assert_eq!(push.outcome.as_ref().unwrap().status, NotificationStatus::Sent);

    let email = &outcomes[1];
    assert_eq!(email.channel, Channel::Email);
    assert!(email.outcome.is_none());
    assert!(email.error.as_deref().unwrap().contains("email"));

    let sms_outcome = &outcomes[2];
    assert_eq!(sms_outcome.outcome.as_ref().unwrap().sent, 1);

    // One row per delivered channel, none for the refused one
    let rows = store.list_notifications(10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|n| n.channel != Channel::Email));
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe_are_owner_scoped() {
    let (_dir, store) = temp_store().await;
    let (_push, dispatcher) = push_only_dispatcher(store.clone());

    dispatcher
        .subscribe(1, "https://push.example/a", "BPk3y", "s3cr3t")
        .await
        .unwrap();

    assert!(!dispatcher.unsubscribe(2, "https://push.example/a").await.unwrap());
    assert_eq!(store.list_subscriptions(None).await.unwrap().len(), 1);

    assert!(dispatcher.unsubscribe(1, "https://push.example/a").await.unwrap());
    assert!(store.list_subscriptions(None).await.unwrap().is_empty());

    assert_matches!(
        dispatcher.subscribe(1, "", "BPk3y", "s3cr3t").await,
        Err(AlertError::Validation(_))
    );
}
