use std::time::Duration;

use market_cache_rate_limit::{LimitReason, RateLimiter};

#[test]
fn test_per_key_throttling() {
    let limiter = RateLimiter::new(Duration::from_millis(300), 20, 10);

    limiter.record_request("2330");
    let decision = limiter.can_request("2330");
    assert!(!decision.allowed);
    assert_eq!(decision.reason_code(), "stock_limit_exceeded_for_2330");
    assert!(decision.wait <= Duration::from_millis(300));
    assert!(decision.wait > Duration::from_millis(200));

    std::thread::sleep(Duration::from_millis(350));

    let decision = limiter.can_request("2330");
    assert!(decision.allowed);
    assert_eq!(decision.reason_code(), "allowed");
    assert_eq!(decision.wait, Duration::ZERO);
}

#[test]
fn test_global_burst_limit() {
    let limiter = RateLimiter::new(Duration::from_secs(30), 20, 100);

    for i in 0..20 {
        let key = format!("key-{}", i);
        assert!(limiter.can_request(&key).allowed, "request {} should pass", i);
        limiter.record_request(&key);
    }

    // Any key, including one never seen before, is now rejected.
    let decision = limiter.can_request("fresh-key");
    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(LimitReason::GlobalPerMinute));
    assert!(decision.wait <= Duration::from_secs(60));
    assert!(decision.wait > Duration::from_secs(50));
}

#[test]
fn test_per_second_burst_limit() {
    let limiter = RateLimiter::new(Duration::ZERO, 20, 2);

    let mut last = None;
    for i in 0..3 {
        let key = format!("burst-{}", i);
        let decision = limiter.can_request(&key);
        if decision.allowed {
            limiter.record_request(&key);
        }
        last = Some(decision);
    }

    let last = last.unwrap();
    assert!(!last.allowed);
    assert_eq!(last.reason_code(), "per_second_limit_exceeded");
    assert!(last.wait <= Duration::from_secs(1));
}

#[test]
fn test_concurrent_callers_share_budget() {
    let limiter = RateLimiter::new(Duration::ZERO, 1000, 1000);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let limiter = limiter.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    limiter.record_request(&format!("t{}-{}", t, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = limiter.stats();
    assert_eq!(stats.global_requests_last_minute, 200);
    assert_eq!(stats.tracked_keys_count, 200);
}
