mod common;

use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};

use common::{feed_config, feed_draft, next_event, ok_response, rss, settle, worker};
use feedwire::app::control::CoreEvent;
use feedwire::domain::error::ErrorKind;

const FEED_URL: &str = "https://src.test/feed";

fn fresh_body() -> String {
    rss(&[("A", "https://ex.test/a", Utc::now() - Duration::hours(1))])
}

#[tokio::test(start_paused = true)]
async fn add_persists_the_config_and_polls_immediately() {
    let mut w = worker();
    w.http.set_default(FEED_URL, ok_response(&fresh_body()));

    w.scheduler.add(feed_draft(FEED_URL, 7, 60_000)).await;

    match next_event(&mut w.events).await {
        CoreEvent::NewItem(item) => {
            assert_eq!(item.url, "https://ex.test/a");
            assert_eq!(item.category, 7);
        }
        other => panic!("expected new item, got {other:?}"),
    }

    let stored = w.repo.stored_feed(FEED_URL).expect("feed persisted");
    assert_eq!(stored.id, 1);
    assert_eq!(stored.refresh_ms, 60_000);
    let runtime = w.scheduler.get_feed_config(FEED_URL).await.unwrap();
    assert_eq!(runtime.refresh_ms, 60_000);
}

#[tokio::test(start_paused = true)]
async fn invalid_configs_are_rejected_with_a_type_error() {
    let mut w = worker();

    w.scheduler.add(feed_draft("", 1, 60_000)).await;
    w.scheduler.add(feed_draft("https://a.test/f", 1, 0)).await;
    // Refresh at the fetch timeout is too short.
    w.scheduler
        .add(feed_draft("https://b.test/f", 1, 1_000))
        .await;

    for _ in 0..3 {
        match next_event(&mut w.events).await {
            CoreEvent::Error(event) => assert_eq!(event.kind, ErrorKind::Type),
            other => panic!("expected type error, got {other:?}"),
        }
    }
    assert_eq!(w.repo.feed_count(), 0);
    assert!(w
        .scheduler
        .get_feed_config("https://a.test/f")
        .await
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_the_interval_then_removes_the_feed() {
    let mut w = worker();
    for _ in 0..5 {
        w.http.push_status(FEED_URL, 500);
    }

    w.scheduler.add(feed_draft(FEED_URL, 2, 60_000)).await;

    // Four transient failures: applied refresh follows 60s * 2^(n-1).
    for (failures, expected_refresh) in
        [(1u32, 60_000i64), (2, 120_000), (3, 240_000), (4, 480_000)]
    {
        match next_event(&mut w.events).await {
            CoreEvent::Error(event) => assert_eq!(event.kind, ErrorKind::FetchUrl),
            other => panic!("expected fetch error, got {other:?}"),
        }
        settle().await;
        assert_eq!(
            w.repo.stored_feed(FEED_URL).unwrap().refresh_ms,
            expected_refresh
        );
        assert_eq!(
            w.scheduler
                .get_feed_config(FEED_URL)
                .await
                .unwrap()
                .refresh_ms,
            expected_refresh
        );
        assert_eq!(w.scheduler.consecutive_failures(1).await, Some(failures));
    }

    // The fifth failure is permanent.
    match next_event(&mut w.events).await {
        CoreEvent::Error(event) => assert_eq!(event.kind, ErrorKind::FetchUrl),
        other => panic!("expected fetch error, got {other:?}"),
    }
    match next_event(&mut w.events).await {
        CoreEvent::Error(event) => {
            assert_eq!(event.kind, ErrorKind::PermanentFailure);
            assert_eq!(event.feed_id, Some(1));
            // The removal message carries the last tick failure.
            assert!(
                event.message.contains("unexpected status 500"),
                "unexpected message: {}",
                event.message
            );
        }
        other => panic!("expected permanent failure, got {other:?}"),
    }
    settle().await;

    assert!(w.repo.stored_feed(FEED_URL).is_none());
    assert!(w.scheduler.get_feed_config(FEED_URL).await.is_none());
    assert_eq!(w.scheduler.consecutive_failures(1).await, None);
}

#[tokio::test(start_paused = true)]
async fn a_successful_tick_evicts_the_tracker_but_keeps_the_backed_off_refresh() {
    let mut w = worker();
    w.http.push_status(FEED_URL, 500);
    w.http.push_status(FEED_URL, 500);
    w.http.set_default(FEED_URL, ok_response(&fresh_body()));

    w.scheduler.add(feed_draft(FEED_URL, 2, 60_000)).await;

    for _ in 0..2 {
        match next_event(&mut w.events).await {
            CoreEvent::Error(event) => assert_eq!(event.kind, ErrorKind::FetchUrl),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }
    match next_event(&mut w.events).await {
        CoreEvent::NewItem(_) => {}
        other => panic!("expected new item, got {other:?}"),
    }
    settle().await;

    assert_eq!(w.scheduler.consecutive_failures(1).await, None);
    // The original refresh is not restored automatically.
    assert_eq!(w.repo.stored_feed(FEED_URL).unwrap().refresh_ms, 120_000);
}

#[tokio::test(start_paused = true)]
async fn update_interval_persists_and_applies_the_new_period() {
    let w = worker();
    w.http.set_default(FEED_URL, ok_response(&fresh_body()));
    w.scheduler.add(feed_draft(FEED_URL, 2, 60_000)).await;

    w.scheduler.update_interval(FEED_URL, 90_000).await;

    assert_eq!(w.repo.stored_feed(FEED_URL).unwrap().refresh_ms, 90_000);
    assert_eq!(
        w.scheduler
            .get_feed_config(FEED_URL)
            .await
            .unwrap()
            .refresh_ms,
        90_000
    );
}

#[tokio::test(start_paused = true)]
async fn removing_an_unknown_url_is_a_noop() {
    let mut w = worker();

    w.scheduler.remove("https://nowhere.test/feed").await;

    assert!(w.events.try_recv().is_err());
    assert_eq!(w.repo.feed_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn remove_cancels_the_timer_and_deletes_the_row() {
    let mut w = worker();
    w.http.set_default(FEED_URL, ok_response(&fresh_body()));
    w.scheduler.add(feed_draft(FEED_URL, 2, 60_000)).await;
    match next_event(&mut w.events).await {
        CoreEvent::NewItem(_) => {}
        other => panic!("expected new item, got {other:?}"),
    }

    w.scheduler.remove(FEED_URL).await;

    assert!(w.repo.stored_feed(FEED_URL).is_none());
    assert!(w.scheduler.get_feed_config(FEED_URL).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn init_starts_every_stored_feed() {
    let w = worker();
    w.repo
        .seed_feed(feed_config(1, "https://one.test/feed", 1, 60_000));
    w.repo
        .seed_feed(feed_config(2, "https://two.test/feed", 2, 60_000));

    let started = w.scheduler.init().await;

    assert_eq!(started, 2);
    assert!(w
        .scheduler
        .get_feed_config("https://one.test/feed")
        .await
        .is_some());
    assert!(w
        .scheduler
        .get_feed_config("https://two.test/feed")
        .await
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn init_reports_a_store_failure_and_starts_nothing() {
    let mut w = worker();
    w.repo.fail_get_all.store(true, Ordering::SeqCst);

    let started = w.scheduler.init().await;

    assert_eq!(started, 0);
    match next_event(&mut w.events).await {
        CoreEvent::Error(event) => assert_eq!(event.kind, ErrorKind::Db),
        other => panic!("expected db error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn reload_is_equivalent_to_destroy_then_init() {
    let w = worker();
    w.repo
        .seed_feed(feed_config(1, "https://one.test/feed", 1, 60_000));
    w.repo
        .seed_feed(feed_config(2, "https://two.test/feed", 2, 60_000));
    assert_eq!(w.scheduler.init().await, 2);

    let reloaded = w.scheduler.reload_feeds().await;

    assert_eq!(reloaded, 2);
    assert!(w
        .scheduler
        .get_feed_config("https://one.test/feed")
        .await
        .is_some());

    w.scheduler.destroy().await;
    assert!(w
        .scheduler
        .get_feed_config("https://one.test/feed")
        .await
        .is_none());
    assert!(w
        .scheduler
        .get_feed_config("https://two.test/feed")
        .await
        .is_none());
    // The store is untouched by runtime teardown.
    assert_eq!(w.repo.feed_count(), 2);
}
