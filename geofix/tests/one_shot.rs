//! One-shot request behavior against the simulated device.

mod common;

use std::time::Duration;

use common::{Harness, NOW};
use geofix::{LocationError, PlatformKind, RequestOptions};

#[tokio::test]
async fn test_cached_fix_against_maximum_age() {
    let h = Harness::new(PlatformKind::Criteria);
    h.device.set_last_known("gps", h.device.fix_aged(53.5, 10.0, 10_000));

    let strict = RequestOptions::new()
        .timeout(Duration::ZERO)
        .maximum_age(Duration::from_millis(5_000));
    let err = h.service.get_current_location(&strict).await.unwrap_err();
    assert!(matches!(err, LocationError::StaleLocation { age_ms: 10_000, .. }));

    let relaxed = RequestOptions::new()
        .timeout(Duration::ZERO)
        .maximum_age(Duration::from_millis(20_000));
    let fix = h.service.get_current_location(&relaxed).await.unwrap();
    assert_eq!(fix.latitude, 53.5);
    assert_eq!(fix.timestamp, NOW - 10_000);

    assert_eq!(h.device.start_count(), 0);
}

#[tokio::test]
async fn test_unbounded_maximum_age_accepts_fixes() {
    let h = Harness::new(PlatformKind::Criteria);
    h.device.set_last_known("gps", h.device.fix_aged(53.5, 10.0, 1_000));

    let cached = RequestOptions::new()
        .timeout(Duration::ZERO)
        .maximum_age(Duration::MAX);
    let fix = h.service.get_current_location(&cached).await.unwrap();
    assert_eq!(fix.latitude, 53.5);

    let live = RequestOptions::new().maximum_age(Duration::MAX);
    let task = tokio::spawn({
        let service = h.service.clone();
        async move { service.get_current_location(&live).await }
    });
    h.wait_for_sessions(1).await;
    h.device.deliver(h.device.fix_aged(4.0, 0.0, 60_000));
    let fix = task.await.unwrap().unwrap();
    assert_eq!(fix.latitude, 4.0);
}

#[tokio::test]
async fn test_cache_only_delegate_falls_back_to_fresh_manager() {
    let h = Harness::new(PlatformKind::Delegate);
    h.device.set_last_known("gps", h.device.fix_aged(1.0, 2.0, 500));

    let options = RequestOptions::new().timeout(Duration::ZERO);
    let fix = h.service.get_current_location(&options).await.unwrap();
    assert_eq!(fix.latitude, 1.0);
}

#[tokio::test]
async fn test_monitoring_ignores_stale_fixes() {
    let h = Harness::new(PlatformKind::Criteria);
    let options = RequestOptions::new().maximum_age(Duration::from_millis(5_000));

    let task = tokio::spawn({
        let service = h.service.clone();
        async move { service.get_current_location(&options).await }
    });
    h.wait_for_sessions(1).await;

    h.device.deliver(h.device.fix_aged(1.0, 0.0, 8_000));
    h.device.deliver(h.device.fix_aged(2.0, 0.0, 6_000));
    h.settle().await;
    assert!(!task.is_finished());

    h.device.deliver(h.device.fix_aged(3.0, 0.0, 2_000));
    let fix = task.await.unwrap().unwrap();
    assert_eq!(fix.latitude, 3.0);
    assert_eq!(h.device.session_count(), 0);
    assert_eq!(h.service.active_registrations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fix_and_deadline_settle_once() {
    let h = Harness::new(PlatformKind::Criteria);
    let options = RequestOptions::new().timeout(Duration::from_millis(1_000));

    let task = tokio::spawn({
        let service = h.service.clone();
        async move { service.get_current_location(&options).await }
    });
    h.wait_for_sessions(1).await;

    // Both the fix and the deadline are ready when the request is next polled.
    h.device.deliver(h.device.fix_now(48.1, 11.6));
    tokio::time::advance(Duration::from_millis(1_000)).await;

    let fix = task.await.unwrap().unwrap();
    assert_eq!(fix.latitude, 48.1);
    assert_eq!(h.device.session_count(), 0);
    assert_eq!(h.device.deliver(h.device.fix_now(0.0, 0.0)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_stops_monitoring() {
    let h = Harness::new(PlatformKind::Delegate);
    let options = RequestOptions::new().timeout(Duration::from_secs(2));

    let err = h.service.get_current_location(&options).await.unwrap_err();
    assert_eq!(err, LocationError::Timeout { timeout_ms: 2_000 });
    assert_eq!(h.device.session_count(), 0);
    assert_eq!(h.service.active_registrations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_native_failure_does_not_settle() {
    let h = Harness::new(PlatformKind::Criteria);
    let options = RequestOptions::new().timeout(Duration::from_secs(30));

    let task = tokio::spawn({
        let service = h.service.clone();
        async move { service.get_current_location(&options).await }
    });
    h.wait_for_sessions(1).await;

    h.device.fail_sessions("temporarily unavailable");
    h.settle().await;
    assert!(!task.is_finished());

    h.device.deliver(h.device.fix_now(5.0, 5.0));
    assert_eq!(task.await.unwrap().unwrap().latitude, 5.0);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let h = Harness::new(PlatformKind::Criteria);

    let requests: Vec<_> = (0..3)
        .map(|_| {
            let service = h.service.clone();
            tokio::spawn(async move { service.get_current_location(&RequestOptions::new()).await })
        })
        .collect();
    h.wait_for_sessions(3).await;

    assert_eq!(h.device.deliver(h.device.fix_now(7.0, 7.0)), 3);
    let results = futures::future::join_all(requests).await;
    for result in results {
        assert_eq!(result.unwrap().unwrap().latitude, 7.0);
    }
    assert_eq!(h.device.session_count(), 0);
}

#[tokio::test]
async fn test_named_provider_request() {
    let h = Harness::new(PlatformKind::Criteria);
    let options = RequestOptions::new().provider(geofix::options::ProviderKind::Network);

    let task = tokio::spawn({
        let service = h.service.clone();
        async move { service.get_current_location(&options).await }
    });
    h.wait_for_sessions(1).await;
    assert_eq!(
        h.device.selectors(),
        vec![geofix::platform::ProviderSelector::Named("network".into())]
    );

    assert_eq!(h.device.deliver(h.device.fix_now(1.0, 1.0)), 0);
    h.device.deliver(h.device.fix_now(2.0, 2.0).with_provider("network"));
    let fix = task.await.unwrap().unwrap();
    assert_eq!(fix.provider.as_deref(), Some("network"));
}

#[tokio::test]
async fn test_vertical_accuracy_fallback_on_criteria_platform() {
    let h = Harness::new(PlatformKind::Criteria);
    let task = tokio::spawn({
        let service = h.service.clone();
        async move { service.get_current_location(&RequestOptions::new()).await }
    });
    h.wait_for_sessions(1).await;

    h.device
        .deliver(h.device.fix_now(1.0, 1.0).with_accuracy(4.0, None));
    let fix = task.await.unwrap().unwrap();
    assert_eq!(fix.horizontal_accuracy, Some(4.0));
    assert_eq!(fix.vertical_accuracy, Some(4.0));
}
