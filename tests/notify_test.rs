//! Integration tests for alert delivery and the once-per-channel guarantee.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use course_scout::config::TelegramConfig;
use course_scout::db::{
    get_notifications_for_post, has_notification, try_claim_notification, upsert_post, Category,
    Channel, Database, NewPost,
};
use course_scout::notify::{
    Alert, NotificationChannel, Notifier, NotifyError, NotifyOutcome, TelegramChannel,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STALE: Duration = Duration::from_secs(600);

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn insert_post(db: &Database) -> (i64, Alert) {
    let new_post = NewPost {
        source: "reddit".to_string(),
        source_id: "abc123".to_string(),
        community: Some("udemyfreebies".to_string()),
        title: Some("Rust for Beginners".to_string()),
        body: None,
        author: None,
        permalink: Some("https://www.reddit.com/r/udemyfreebies/comments/abc123/".to_string()),
        links: vec!["https://www.udemy.com/course/rust?couponCode=FREE".to_string()],
        published_at: None,
    };
    let post_id = upsert_post(db.pool(), &new_post).await.unwrap().post_id;
    let post = course_scout::db::get_post(db.pool(), post_id)
        .await
        .unwrap()
        .unwrap();
    let alert = Alert::new(&post, 0.8, Category::ProgrammingLanguages, post.links());
    (post_id, alert)
}

fn telegram(server: &MockServer) -> Arc<dyn NotificationChannel> {
    let config = TelegramConfig {
        api_base: server.uri(),
        bot_token: "123:TEST".to_string(),
        chat_id: "42".to_string(),
    };
    Arc::new(TelegramChannel::new(&config, Duration::from_secs(5)).unwrap())
}

fn as_channel(stub: &Arc<StubChannel>) -> Arc<dyn NotificationChannel> {
    stub.clone()
}

/// Counts sends and optionally stalls or fails.
struct StubChannel {
    sends: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
}

impl StubChannel {
    fn new() -> Self {
        Self {
            sends: AtomicUsize::new(0),
            delay: None,
            fail: false,
        }
    }
}

#[async_trait]
impl NotificationChannel for StubChannel {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, _alert: &Alert) -> Result<(), NotifyError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(NotifyError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_telegram_send_records_notification() {
    let (db, _temp_dir) = setup_db().await;
    let (post_id, alert) = insert_post(&db).await;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:TEST/sendMessage"))
        .and(body_partial_json(json!({ "chat_id": "42" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 1, "chat": { "id": 42 }, "date": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = Notifier::new(
        db.pool().clone(),
        vec![telegram(&server)],
        Duration::from_secs(5),
        STALE,
    );

    let outcomes = notifier.notify(post_id, &alert).await.unwrap();
    assert_eq!(outcomes, vec![(Channel::Telegram, NotifyOutcome::Sent)]);

    // Second attempt is deduplicated without calling the API again.
    let outcomes = notifier.notify(post_id, &alert).await.unwrap();
    assert_eq!(
        outcomes,
        vec![(Channel::Telegram, NotifyOutcome::AlreadyNotified)]
    );

    let records = get_notifications_for_post(db.pool(), post_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].channel, "telegram");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["text"]
        .as_str()
        .unwrap()
        .contains("https://www.udemy.com/course/rust?couponCode=FREE"));
}

#[tokio::test]
async fn test_telegram_rejection_leaves_no_record() {
    let (db, _temp_dir) = setup_db().await;
    let (post_id, alert) = insert_post(&db).await;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let notifier = Notifier::new(
        db.pool().clone(),
        vec![telegram(&server)],
        Duration::from_secs(5),
        STALE,
    );

    let outcomes = notifier.notify(post_id, &alert).await.unwrap();
    match &outcomes[0] {
        (Channel::Telegram, NotifyOutcome::Failed(reason)) => {
            assert!(reason.contains("chat not found"), "{reason}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert!(!has_notification(db.pool(), post_id, Channel::Telegram).await.unwrap());
    // Claim was released for the next run.
    assert!(try_claim_notification(db.pool(), post_id, Channel::Telegram, STALE)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_send_timeout_leaves_no_record() {
    let (db, _temp_dir) = setup_db().await;
    let (post_id, alert) = insert_post(&db).await;

    let stub = Arc::new(StubChannel {
        delay: Some(Duration::from_secs(5)),
        ..StubChannel::new()
    });
    let notifier = Notifier::new(
        db.pool().clone(),
        vec![as_channel(&stub)],
        Duration::from_millis(200),
        STALE,
    );

    let outcomes = notifier.notify(post_id, &alert).await.unwrap();
    assert!(matches!(outcomes[0], (Channel::Email, NotifyOutcome::Failed(_))));
    assert!(!has_notification(db.pool(), post_id, Channel::Email).await.unwrap());
}

#[tokio::test]
async fn test_failed_channel_does_not_block_others() {
    let (db, _temp_dir) = setup_db().await;
    let (post_id, alert) = insert_post(&db).await;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let failing = Arc::new(StubChannel {
        fail: true,
        ..StubChannel::new()
    });
    let notifier = Notifier::new(
        db.pool().clone(),
        vec![as_channel(&failing), telegram(&server)],
        Duration::from_secs(5),
        STALE,
    );

    let outcomes = notifier.notify(post_id, &alert).await.unwrap();
    assert!(matches!(outcomes[0], (Channel::Email, NotifyOutcome::Failed(_))));
    assert_eq!(outcomes[1], (Channel::Telegram, NotifyOutcome::Sent));

    // Retry sends only on the channel still owed.
    let retry = Notifier::new(
        db.pool().clone(),
        vec![as_channel(&Arc::new(StubChannel::new())), telegram(&server)],
        Duration::from_secs(5),
        STALE,
    );
    let outcomes = retry.notify(post_id, &alert).await.unwrap();
    assert_eq!(
        outcomes,
        vec![
            (Channel::Email, NotifyOutcome::Sent),
            (Channel::Telegram, NotifyOutcome::AlreadyNotified),
        ]
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_claimed_elsewhere_is_busy() {
    let (db, _temp_dir) = setup_db().await;
    let (post_id, alert) = insert_post(&db).await;

    // Another run is mid-send.
    assert!(try_claim_notification(db.pool(), post_id, Channel::Email, STALE)
        .await
        .unwrap());

    let stub = Arc::new(StubChannel::new());
    let notifier = Notifier::new(
        db.pool().clone(),
        vec![as_channel(&stub)],
        Duration::from_secs(5),
        STALE,
    );

    let outcomes = notifier.notify(post_id, &alert).await.unwrap();
    assert_eq!(outcomes, vec![(Channel::Email, NotifyOutcome::Busy)]);
    assert_eq!(stub.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_notifiers_send_once() {
    let (db, _temp_dir) = setup_db().await;
    let (post_id, alert) = insert_post(&db).await;

    let stub = Arc::new(StubChannel {
        delay: Some(Duration::from_millis(100)),
        ..StubChannel::new()
    });
    let a = Notifier::new(db.pool().clone(), vec![as_channel(&stub)], Duration::from_secs(5), STALE);
    let b = Notifier::new(db.pool().clone(), vec![as_channel(&stub)], Duration::from_secs(5), STALE);

    let (ra, rb) = tokio::join!(a.notify(post_id, &alert), b.notify(post_id, &alert));
    let outcomes: Vec<NotifyOutcome> = ra
        .unwrap()
        .into_iter()
        .chain(rb.unwrap())
        .map(|(_, o)| o)
        .collect();

    assert_eq!(stub.sends.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcomes.iter().filter(|o| **o == NotifyOutcome::Sent).count(),
        1
    );
    assert_eq!(
        get_notifications_for_post(db.pool(), post_id).await.unwrap().len(),
        1
    );
}
