use super::*;

// =============================================================
// UiState defaults
// =============================================================

#[test]
fn ui_state_default_is_idle() {
    let state = UiState::default();
    assert!(state.input_enabled);
    assert!(state.send_visible);
    assert!(!state.stop_visible);
    assert_eq!(state.route, Route::Chat);
    assert!(state.notices.is_empty());
}

// =============================================================
// Processing toggles
// =============================================================

#[test]
fn enter_and_leave_processing_swap_controls() {
    let mut state = UiState { input_text: "draft".to_owned(), ..UiState::default() };
    state.enter_processing();
    assert!(state.input_text.is_empty());
    assert!(!state.input_enabled);
    assert!(!state.send_visible);
    assert!(state.stop_visible);

    state.status_badge = Some("running".to_owned());
    state.leave_processing();
    assert!(state.input_enabled);
    assert!(state.send_visible);
    assert!(!state.stop_visible);
    assert_eq!(state.status_badge, None);
}

#[test]
fn restore_input_replaces_text() {
    let mut state = UiState::default();
    state.restore_input("top 5 products");
    assert_eq!(state.input_text, "top 5 products");
}

// =============================================================
// Notices
// =============================================================

#[test]
fn notify_assigns_increasing_ids_and_dismiss_removes() {
    let mut state = UiState::default();
    let first = state.notify(NoticeLevel::Info, "a");
    let second = state.notify(NoticeLevel::Error, "b");
    assert!(second > first);

    assert!(state.dismiss(first));
    assert!(!state.dismiss(first));
    assert_eq!(state.notices.len(), 1);
    assert_eq!(state.notices[0].level, NoticeLevel::Error);
}

#[test]
fn notify_keeps_only_newest_notices() {
    let mut state = UiState::default();
    for i in 0..(MAX_NOTICES + 5) {
        state.notify(NoticeLevel::Info, format!("n{i}"));
    }
    assert_eq!(state.notices.len(), MAX_NOTICES);
    assert_eq!(state.notices[0].message, "n5");
}
