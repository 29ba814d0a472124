//! Integration tests for the control-loop ticker.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when every task
//! is idle. `sleep_until` then resolves instantly once the runtime
//! auto-advances to the deadline.

use std::time::Duration;

use padrelay_tick::{TickConfig, TickPolicy, TickScheduler};

// =========================================================================
// Helpers
// =========================================================================

fn config_50ms() -> TickConfig {
    TickConfig {
        initial_jitter: Duration::ZERO,
        ..TickConfig::with_interval(Duration::from_millis(50))
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_half_second() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.interval, Duration::from_millis(500));
    assert_eq!(cfg.policy, TickPolicy::Skip);
}

#[test]
fn test_validated_clamps_zero_interval() {
    let cfg = TickConfig::with_interval(Duration::ZERO).validated();
    assert_eq!(cfg.interval, TickConfig::MIN_INTERVAL);
}

#[test]
fn test_config_survives_json() {
    let cfg = config_50ms();
    let json = serde_json::to_string(&cfg).unwrap();
    let back: TickConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.interval, cfg.interval);
    assert_eq!(back.policy, cfg.policy);
}

// =========================================================================
// Lazy start
// =========================================================================

#[test]
fn test_scheduler_starts_idle() {
    let s = TickScheduler::new(config_50ms());
    assert!(!s.is_started());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.interval(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_idle_scheduler_never_fires() {
    let mut s = TickScheduler::new(config_50ms());

    // wait_for_tick should never resolve, a timeout proves it.
    let result = tokio::time::timeout(Duration::from_secs(5), s.wait_for_tick()).await;
    assert!(result.is_err(), "idle scheduler should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let mut s = TickScheduler::new(config_50ms());
    assert!(s.start());
    assert!(!s.start());
    assert!(s.is_started());

    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    // A second start() must not have pushed the deadline back.
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_stop_returns_to_idle() {
    let mut s = TickScheduler::with_interval(Duration::from_millis(50));
    s.start();
    s.wait_for_tick().await;
    s.stop();
    assert!(!s.is_started());

    let result = tokio::time::timeout(Duration::from_secs(1), s.wait_for_tick()).await;
    assert!(result.is_err(), "stopped scheduler should pend");
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_fires_and_increments() {
    let mut s = TickScheduler::new(config_50ms());
    s.start();

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert_eq!(s.tick_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_ticks_increment_monotonically() {
    let mut s = TickScheduler::new(config_50ms());
    s.start();

    for expected in 1..=5 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_only_delays_first_tick() {
    let mut s = TickScheduler::new(TickConfig {
        initial_jitter: Duration::from_millis(10),
        ..TickConfig::with_interval(Duration::from_millis(50))
    });
    let start = tokio::time::Instant::now();
    s.start();

    s.wait_for_tick().await;
    let first = start.elapsed();
    assert!(first >= Duration::from_millis(50));
    assert!(first < Duration::from_millis(60));

    s.wait_for_tick().await;
    assert_eq!(start.elapsed() - first, Duration::from_millis(50));
}

// =========================================================================
// Overrun policies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reports_skipped_ticks() {
    let mut s = TickScheduler::new(config_50ms());
    s.start();

    // The actor was busy for a while and never polled the ticker.
    tokio::time::advance(Duration::from_millis(260)).await;

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 4);

    // Skip reschedules from now, so the next tick is a full interval away.
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_cadence() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..config_50ms()
    });
    s.start();

    tokio::time::advance(Duration::from_millis(120)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);

    // The next deadline (100ms) is already in the past: it fires at once.
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::ZERO);
}

// =========================================================================
// Integration: select! loop pattern (mirrors real room usage)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_starts_on_first_request() {
    let mut s = TickScheduler::new(config_50ms());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send("request").await.ok();
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("stop").await.ok();
    });

    let mut ticks_fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => match cmd {
                "request" => {
                    s.start();
                }
                _ => break,
            },
            info = s.wait_for_tick() => {
                ticks_fired += 1;
                assert_eq!(info.tick, ticks_fired);
            }
        }
    }

    // Nothing fired during the first 100ms, then three 50ms ticks.
    assert_eq!(ticks_fired, 3);
}
