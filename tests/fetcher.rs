//! Bounded fetcher against a local mock origin.

use scrape_relay::config::FetcherConfig;
use scrape_relay::fetch::{FetchError, Fetcher};

mod common;

fn config() -> FetcherConfig {
    FetcherConfig {
        close_grace_ms: 0,
        ..FetcherConfig::default()
    }
}

#[tokio::test]
async fn admission_limit_caps_in_flight_fetches() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(FetcherConfig {
        max_concurrent: 2,
        per_host_limit: 10,
        ..config()
    });

    let urls: Vec<String> = (0..6).map(|_| format!("http://{}/slow", origin)).collect();
    let results = fetcher.fetch_each(&urls).await;

    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(fetcher.peak_in_flight(), 2);
    assert_eq!(fetcher.in_flight(), 0);
    assert_eq!(fetcher.calls(), 6);
}

#[tokio::test]
async fn per_host_limit_caps_one_origin() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(FetcherConfig {
        max_concurrent: 5,
        per_host_limit: 1,
        ..config()
    });

    let urls: Vec<String> = (0..3).map(|_| format!("http://{}/slow", origin)).collect();
    let results = fetcher.fetch_each(&urls).await;

    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(fetcher.peak_in_flight(), 1);
}

#[tokio::test]
async fn error_status_is_reported() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(config());

    let err = fetcher
        .fetch(&format!("http://{}/missing", origin))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn oversized_body_rejected() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(FetcherConfig {
        max_text_bytes: 1024,
        ..config()
    });

    let err = fetcher.fetch(&format!("http://{}/big", origin)).await.unwrap_err();
    assert!(matches!(err, FetchError::PayloadTooLarge { limit: 1024, .. }));
}

#[tokio::test]
async fn slow_origin_times_out() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(FetcherConfig {
        timeout_secs: 1,
        ..config()
    });

    let err = fetcher.fetch(&format!("http://{}/hang", origin)).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }));
    assert_eq!(fetcher.in_flight(), 0);
}

#[tokio::test]
async fn fetch_multiple_keeps_successes_only() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(config());

    let urls = vec![
        format!("http://{}/page", origin),
        format!("http://{}/missing", origin),
        format!("http://{}/slow", origin),
    ];

    let pages = fetcher.fetch_multiple(&urls).await;
    let fetched: Vec<&str> = pages.iter().map(|(url, _)| url.as_str()).collect();
    assert_eq!(fetched, vec![urls[0].as_str(), urls[2].as_str()]);
    assert!(pages[0].1.contains("<title>Mock Page</title>"));

    let outcomes = fetcher.fetch_each(&urls).await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[1].1.is_err());
}

#[tokio::test]
async fn closed_fetcher_refuses_work() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(config());

    fetcher.fetch(&format!("http://{}/page", origin)).await.unwrap();
    fetcher.close().await;
    assert!(fetcher.is_closed());

    let err = fetcher.fetch(&format!("http://{}/page", origin)).await.unwrap_err();
    assert!(matches!(err, FetchError::Closed));
}

#[tokio::test]
async fn binary_fetch_returns_raw_bytes() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(config());

    let bytes = fetcher
        .fetch_binary(&format!("http://{}/img/logo.png", origin))
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), common::logo_png().as_slice());
}

#[tokio::test]
async fn binary_fetch_uses_binary_ceiling() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(FetcherConfig {
        max_binary_bytes: 1024,
        ..config()
    });

    let url = format!("http://{}/big", origin);
    let err = fetcher.fetch_binary(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::PayloadTooLarge { limit: 1024, .. }));

    // The text ceiling is separate and much larger.
    assert!(fetcher.fetch(&url).await.is_ok());
}

#[tokio::test]
async fn hosts_untracked_after_fetches_finish() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(config());

    let urls = vec![
        format!("http://{}/page", origin),
        format!("http://{}/slow", origin),
        format!("http://{}/missing", origin),
    ];
    fetcher.fetch_each(&urls).await;
    assert_eq!(fetcher.tracked_hosts(), 0);
}

#[tokio::test]
async fn time_queued_behind_a_busy_host_counts_towards_timeout() {
    let origin = common::start_origin().await;
    let fetcher = Fetcher::new(FetcherConfig {
        per_host_limit: 1,
        timeout_secs: 1,
        ..config()
    });

    let urls: Vec<String> = (0..5).map(|_| format!("http://{}/slow", origin)).collect();
    let results = fetcher.fetch_each(&urls).await;

    let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
    let timed_out = results
        .iter()
        .filter(|(_, r)| matches!(r, Err(FetchError::Timeout { .. })))
        .count();
    assert!(ok >= 1, "{:?}", results);
    assert!(timed_out >= 1, "{:?}", results);
    assert_eq!(ok + timed_out, 5);
    assert_eq!(fetcher.in_flight(), 0);
    assert_eq!(fetcher.tracked_hosts(), 0);
}
