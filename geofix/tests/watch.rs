//! Watch lifecycle and handle management.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use geofix::{Fix, LocationError, PlatformKind, RequestOptions};
use parking_lot::Mutex;

fn fix_recorder() -> (Arc<Mutex<Vec<Fix>>>, impl Fn(Fix) + Send + Sync + 'static) {
    let fixes = Arc::new(Mutex::new(Vec::new()));
    let sink = fixes.clone();
    (fixes, move |f| sink.lock().push(f))
}

#[tokio::test]
async fn test_clear_watch_is_idempotent() {
    let h = Harness::new(PlatformKind::Criteria);
    let (fixes, on_fix) = fix_recorder();
    let handle = h
        .service
        .watch_location(on_fix, |_| {}, &RequestOptions::new())
        .await
        .unwrap();

    h.device.deliver(h.device.fix_now(1.0, 1.0));
    h.service.clear_watch(handle);
    h.service.clear_watch(handle);
    h.device.deliver(h.device.fix_now(2.0, 2.0));

    assert_eq!(fixes.lock().len(), 1);
    assert_eq!(h.device.session_count(), 0);
}

#[tokio::test]
async fn test_handles_are_unique() {
    let h = Harness::new(PlatformKind::Criteria);
    let mut seen = HashSet::new();

    for round in 0..3 {
        let mut handles = Vec::new();
        for _ in 0..20 {
            let handle = h
                .service
                .watch_location(|_| {}, |_| {}, &RequestOptions::new())
                .await
                .unwrap();
            assert!(seen.insert(handle), "handle reused in round {}", round);
            handles.push(handle);
        }
        for handle in handles {
            h.service.clear_watch(handle);
        }
    }
    assert_eq!(h.service.active_registrations(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_watches_get_distinct_handles() {
    const WATCHES: usize = 32;
    let h = Harness::new(PlatformKind::Criteria);

    let tasks = (0..WATCHES).map(|_| {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .watch_location(|_| {}, |_| {}, &RequestOptions::new())
                .await
        })
    });
    let handles: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let distinct: HashSet<_> = handles.iter().copied().collect();
    assert_eq!(distinct.len(), WATCHES);
    assert_eq!(h.service.active_registrations(), WATCHES);
    assert_eq!(h.device.session_count(), WATCHES);

    for handle in handles {
        h.service.clear_watch(handle);
    }
    assert_eq!(h.service.active_registrations(), 0);
}

#[tokio::test]
async fn test_clearing_one_watch_leaves_others() {
    let h = Harness::new(PlatformKind::Delegate);
    let (first_fixes, first) = fix_recorder();
    let (second_fixes, second) = fix_recorder();

    let a = h.service.watch_location(first, |_| {}, &RequestOptions::new()).await.unwrap();
    let _b = h.service.watch_location(second, |_| {}, &RequestOptions::new()).await.unwrap();

    h.device.deliver(h.device.fix_now(1.0, 1.0));
    h.service.clear_watch(a);
    h.device.deliver(h.device.fix_now(2.0, 2.0));

    assert_eq!(first_fixes.lock().len(), 1);
    assert_eq!(second_fixes.lock().len(), 2);
}

#[tokio::test]
async fn test_watch_start_failure() {
    let h = Harness::new(PlatformKind::Delegate);
    h.device.fail_next_start("manager unavailable");
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();

    let err = h
        .service
        .watch_location(|_| {}, move |e| sink.lock().push(e), &RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LocationError::NativeStartFailure(_)));
    assert_eq!(errors.lock().len(), 1);
    assert_eq!(h.service.active_registrations(), 0);
}

#[tokio::test]
async fn test_watch_clears_itself_from_callback() {
    let h = Harness::new(PlatformKind::Criteria);
    let service = h.service.clone();
    let slot = Arc::new(Mutex::new(None));
    let count = Arc::new(Mutex::new(0));

    let (inner_slot, inner_count) = (slot.clone(), count.clone());
    let weak = Arc::downgrade(&service);
    let handle = service
        .watch_location(
            move |_| {
                *inner_count.lock() += 1;
                if let (Some(service), Some(handle)) = (weak.upgrade(), *inner_slot.lock()) {
                    service.clear_watch(handle);
                }
            },
            |_| {},
            &RequestOptions::new(),
        )
        .await
        .unwrap();
    *slot.lock() = Some(handle);

    h.device.deliver(h.device.fix_now(1.0, 1.0));
    h.device.deliver(h.device.fix_now(2.0, 2.0));
    assert_eq!(*count.lock(), 1);
    assert_eq!(h.device.session_count(), 0);
}

#[tokio::test]
async fn test_background_hints_reach_manager() {
    let h = Harness::new(PlatformKind::Delegate);
    let options = RequestOptions::new()
        .desired_accuracy(100.0)
        .update_distance(10.0)
        .allows_background_updates(true)
        .activity_type(geofix::options::ActivityType::AutomotiveNavigation)
        .deferred_updates(1_000.0, Duration::from_secs(120));
    h.service.watch_location(|_| {}, |_| {}, &options).await.unwrap();

    let configs = h.device.manager_configs();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].desired_accuracy_m, 100.0);
    assert_eq!(configs[0].distance_filter_m, Some(10.0));
    assert!(configs[0].allows_background_updates);
    assert!(configs[0].pauses_updates_automatically);
    assert_eq!(h.device.deferred_requests(), vec![(1_000.0, Duration::from_secs(120))]);
}

#[tokio::test]
async fn test_msl_altitude_from_nmea() {
    let h = Harness::new(PlatformKind::Criteria);
    let (fixes, on_fix) = fix_recorder();
    let options = RequestOptions::new().nmea_altitude(true);
    let handle = h.service.watch_location(on_fix, |_| {}, &options).await.unwrap();

    h.device.deliver(h.device.fix_now(1.0, 1.0).with_altitude(120.0));
    h.device
        .emit_nmea("$GNGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,*76");
    h.device.deliver(h.device.fix_now(1.0, 1.0).with_altitude(120.0));
    h.service.clear_watch(handle);

    let fixes = fixes.lock();
    assert_eq!(fixes[0].msl_altitude, None);
    assert_eq!(fixes[1].msl_altitude, Some(61.7));
    assert_eq!(h.device.nmea_listener_count(), 0);
}
