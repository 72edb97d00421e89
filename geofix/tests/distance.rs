mod common;

use common::Harness;
use geofix::{Fix, PlatformKind, RequestOptions};

#[tokio::test]
async fn test_distance_to_self_is_zero() {
    for kind in [PlatformKind::Criteria, PlatformKind::Delegate] {
        let h = Harness::new(kind);
        let task = tokio::spawn({
            let service = h.service.clone();
            async move { service.get_current_location(&RequestOptions::new()).await }
        });
        h.wait_for_sessions(1).await;
        h.device.deliver(h.device.fix_now(-33.8688, 151.2093));
        let fix = task.await.unwrap().unwrap();

        assert_eq!(h.service.distance(&fix, &fix), 0.0);
        let plain = Fix::new(-33.8688, 151.2093, 0);
        assert_eq!(h.service.distance(&plain, &plain), 0.0);
    }
}

#[test]
fn test_distance_is_symmetric() {
    let h = Harness::new(PlatformKind::Criteria);
    let sydney = Fix::new(-33.8688, 151.2093, 0);
    let auckland = Fix::new(-36.8485, 174.7633, 0);

    let there = h.service.distance(&sydney, &auckland);
    let back = h.service.distance(&auckland, &sydney);
    assert_eq!(there.to_bits(), back.to_bits());
    assert!((there - 2_160_000.0).abs() < 20_000.0, "got {}", there);
}
