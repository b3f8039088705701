use super::*;
use events::{ConnectionTarget, DbCheck, GuardUiHints};

const FADE: Duration = Duration::from_millis(300);

fn payload(auto_dismiss_ms: Option<u64>) -> DbUnavailablePayload {
    DbUnavailablePayload {
        error: "connection refused".to_owned(),
        connection: ConnectionTarget {
            name: Some("warehouse".to_owned()),
            host: Some("db".to_owned()),
            port: Some(5432),
            database: Some("sales".to_owned()),
            db_type: Some("postgres".to_owned()),
            ..ConnectionTarget::default()
        },
        db_check: DbCheck {
            checked_at: Some("2026-01-05T10:00:00Z".to_owned()),
            suggestions: vec!["a".into(), "b".into(), " ".into(), "c".into(), "d".into(), "e".into()],
            ..DbCheck::default()
        },
        routing_info: None,
        ui: GuardUiHints { auto_dismiss_ms },
    }
}

fn manager() -> GuardManager {
    GuardManager::new(Revision::new(), FADE)
}

// =============================================================
// Snapshot
// =============================================================

#[test]
fn warning_snapshot_caps_suggestions_and_formats_target() {
    let warning = DbGuardWarning::from_payload(&payload(Some(2500)), "revenue by region");

    assert_eq!(warning.message, "connection refused");
    assert_eq!(warning.target, "warehouse (postgres sales@db:5432)");
    assert_eq!(warning.checked_at.as_deref(), Some("2026-01-05T10:00:00Z"));
    assert_eq!(warning.suggestions, vec!["a", "b", "c", "d"]);
    assert_eq!(warning.remaining_seconds, Some(3));
    assert_eq!(warning.original_query, "revenue by region");
}

#[test]
fn warning_snapshot_falls_back_to_defaults() {
    let warning = DbGuardWarning::from_payload(&DbUnavailablePayload::default(), "q");

    assert_eq!(warning.message, "database unavailable");
    assert_eq!(warning.target, "unknown connection");
    assert_eq!(warning.auto_dismiss_ms, DEFAULT_AUTO_DISMISS_MS);
    assert_eq!(warning.remaining_seconds, Some(8));
    assert!(!warning.suggestions.is_empty());
    assert!(warning.suggestions.len() <= MAX_SUGGESTIONS);
}

// =============================================================
// Timers
// =============================================================

#[tokio::test(start_paused = true)]
async fn countdown_ticks_then_fades_then_clears() {
    let guard = manager();
    guard.show(&payload(Some(3000)), "q");
    assert_eq!(guard.live_timer_count(), 2);

    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(guard.current().expect("visible").remaining_seconds, Some(2));

    tokio::time::sleep(Duration::from_millis(2000)).await;
    let fading = guard.current().expect("still visible while fading");
    assert!(fading.fading);

    tokio::time::sleep(FADE).await;
    assert!(!guard.is_visible());
}

#[tokio::test(start_paused = true)]
async fn zero_auto_dismiss_never_expires() {
    let guard = manager();
    guard.show(&payload(Some(0)), "q");

    assert_eq!(guard.live_timer_count(), 0);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let warning = guard.current().expect("still visible");
    assert_eq!(warning.remaining_seconds, None);
    assert!(!warning.fading);
}

#[tokio::test(start_paused = true)]
async fn second_warning_replaces_first_with_one_timer_pair() {
    let guard = manager();
    guard.show(&payload(Some(1000)), "first");
    guard.show(&payload(Some(5000)), "second");

    assert_eq!(guard.live_timer_count(), 2);
    assert_eq!(guard.current().expect("visible").original_query, "second");

    // The first warning's dismiss time passes without touching the second.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let warning = guard.current().expect("second still visible");
    assert!(!warning.fading);
    assert_eq!(warning.remaining_seconds, Some(4));
}

// =============================================================
// Actions
// =============================================================

#[tokio::test(start_paused = true)]
async fn continue_anyway_returns_query_and_disposes() {
    let guard = manager();
    guard.show(&payload(None), "top customers");

    assert_eq!(guard.continue_anyway().as_deref(), Some("top customers"));
    assert!(!guard.is_visible());
    assert_eq!(guard.live_timer_count(), 0);
    assert_eq!(guard.continue_anyway(), None);
}

#[tokio::test(start_paused = true)]
async fn configure_clears_warning() {
    let guard = manager();
    guard.show(&payload(Some(0)), "q");

    assert!(guard.configure());
    assert!(!guard.is_visible());
    assert!(!guard.configure());
}

#[tokio::test(start_paused = true)]
async fn expiry_does_not_resubmit() {
    let guard = manager();
    guard.show(&payload(Some(1000)), "q");

    tokio::time::sleep(Duration::from_millis(1000) + FADE + Duration::from_millis(10)).await;
    assert!(!guard.is_visible());
    assert_eq!(guard.continue_anyway(), None);
}

#[tokio::test(start_paused = true)]
async fn show_bumps_revision() {
    let revision = Revision::new();
    let guard = GuardManager::new(revision.clone(), FADE);
    let before = revision.current();

    guard.show(&payload(Some(0)), "q");
    assert!(revision.current() > before);
}
