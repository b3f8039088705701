use super::*;
use serde_json::json;

fn user_and_thinking(conversation: &mut Conversation, pending: bool) -> (Uuid, Uuid) {
    let make = |kind| if pending { Turn::pending(kind) } else { Turn::new(kind) };
    let user = conversation.push(make(TurnKind::User { text: "q".to_owned() }));
    let thinking = conversation.push(make(TurnKind::Thinking { stages: StageTracker::new() }));
    (user, thinking)
}

// =============================================================
// Placeholders
// =============================================================

#[test]
fn acknowledge_clears_pending_flags() {
    let mut conversation = Conversation::new();
    user_and_thinking(&mut conversation, true);

    assert_eq!(conversation.acknowledge_pending(), 2);
    assert!(conversation.turns().iter().all(|turn| !turn.pending));
    assert_eq!(conversation.acknowledge_pending(), 0);
}

#[test]
fn remove_pending_drops_only_placeholders() {
    let mut conversation = Conversation::new();
    conversation.push(Turn::user("earlier"));
    user_and_thinking(&mut conversation, true);

    assert_eq!(conversation.remove_pending(), 2);
    assert_eq!(conversation.turns().len(), 1);
}

#[test]
fn interrupt_thinking_skips_pending_turns() {
    let mut conversation = Conversation::new();
    let (_, pending_thinking) = user_and_thinking(&mut conversation, true);
    let (_, acked_thinking) = user_and_thinking(&mut conversation, false);

    assert_eq!(conversation.interrupt_thinking(), 1);
    assert!(conversation.get(pending_thinking).expect("pending").is_thinking());
    assert_eq!(
        conversation.get(acked_thinking).expect("acked").kind,
        TurnKind::Interrupted { partial: None }
    );
}

// =============================================================
// In-place transitions
// =============================================================

#[test]
fn replace_swaps_kind_and_acknowledges() {
    let mut conversation = Conversation::new();
    let (_, thinking) = user_and_thinking(&mut conversation, true);

    assert!(conversation.replace(thinking, TurnKind::Error { message: "boom".to_owned() }));
    let turn = conversation.get(thinking).expect("turn");
    assert!(!turn.pending);
    assert_eq!(conversation.turns()[1].id, thinking, "position is preserved");
}

#[test]
fn replace_and_stages_mut_miss_removed_turns() {
    let mut conversation = Conversation::new();
    let (_, thinking) = user_and_thinking(&mut conversation, false);

    assert!(conversation.stages_mut(thinking).is_some());
    assert!(conversation.remove(thinking));
    assert!(!conversation.remove(thinking));
    assert!(conversation.stages_mut(thinking).is_none());
    assert!(!conversation.replace(thinking, TurnKind::Error { message: String::new() }));
}

#[test]
fn stages_mut_ignores_non_thinking_turns() {
    let mut conversation = Conversation::new();
    let user = conversation.push(Turn::user("hi"));
    assert!(conversation.stages_mut(user).is_none());
}

#[test]
fn clear_forgets_id_and_turns() {
    let mut conversation = Conversation::new();
    conversation.set_id(Some("c-1".to_owned()));
    conversation.push(Turn::user("hi"));
    conversation.clear();

    assert_eq!(conversation.id(), None);
    assert!(conversation.turns().is_empty());
}

// =============================================================
// History
// =============================================================

#[test]
fn from_history_maps_roles() {
    let messages = vec![
        HistoryMessage { role: "user".to_owned(), content: json!("revenue by month") },
        HistoryMessage { role: "assistant".to_owned(), content: json!({"rows": 12}) },
    ];
    let conversation = Conversation::from_history("c-3", &messages);

    assert_eq!(conversation.id(), Some("c-3"));
    assert_eq!(conversation.turns()[0].kind, TurnKind::User { text: "revenue by month".to_owned() });
    let TurnKind::Assistant { content, stages } = &conversation.turns()[1].kind else {
        panic!("expected assistant turn");
    };
    assert!(content.contains("\"rows\": 12"));
    assert!(stages.is_empty());
}

#[test]
fn render_content_handles_scalars() {
    assert_eq!(render_content(&Value::Null), "");
    assert_eq!(render_content(&json!("plain")), "plain");
    assert_eq!(render_content(&json!(3)), "3");
}
