//! Integration tests for key dispatch against the default command set.
//!
//! These tests drive the registry and context manager together the way a
//! UI shell does: feed keys, read the advisory result, apply it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use daykeys_core::{
    bootstrap, text_parser, CommandContext, CommandContextManager, CommandFocus, CommandRegistry,
    CommandResult, ContextualCommand, KeyDispatch, KeyPress, ManualClock, RegistryConfig, TextIntent,
    ViewMode,
};
use proptest::prelude::*;
use serde_json::json;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

fn manager() -> CommandContextManager {
    CommandContextManager::new(ViewMode::Schedule, date())
}

fn loaded(clock: &ManualClock) -> CommandRegistry {
    let registry = CommandRegistry::with_clock(RegistryConfig::default(), Arc::new(clock.clone()));
    bootstrap(&registry, &HashMap::new()).unwrap();
    registry
}

/// Apply a result's proposed context and focus, as a shell would.
fn apply(manager: &mut CommandContextManager, result: &CommandResult) {
    if let Some(context) = result.new_context {
        match context {
            CommandContext::ViewSchedule => manager.switch_view(ViewMode::Schedule),
            CommandContext::ViewYou => manager.switch_view(ViewMode::You),
            _ => {}
        }
    }
    match result.new_focus.clone() {
        Some(CommandFocus::Block { index, id }) => manager.enter_block_level(index, id),
        Some(CommandFocus::Task {
            index,
            parent_index,
            id,
        }) => manager.enter_task_level(index, parent_index, id),
        Some(CommandFocus::View) => manager.exit_to_view_level(),
        None => {}
    }
}

#[tokio::test]
async fn test_toggle_view_is_advisory() {
    let clock = ManualClock::new(0);
    let registry = loaded(&clock);
    let manager = manager();

    let mut event = KeyPress::new("f1");
    let dispatch = registry.execute_by_key("f1", &manager, Some(&mut event)).await;

    let result = dispatch.into_result().expect("f1 should execute");
    assert!(result.success);
    assert_eq!(result.data, Some(json!({ "viewMode": "you" })));
    assert_eq!(result.new_context, Some(CommandContext::ViewYou));
    assert!(event.default_prevented);
    assert!(!event.propagation_stopped);

    // The registry never mutates the manager.
    assert_eq!(manager.view_mode(), ViewMode::Schedule);
    assert_eq!(manager.current_context(), CommandContext::ViewSchedule);
}

#[tokio::test]
async fn test_navigation_walkthrough() {
    let clock = ManualClock::new(0);
    let registry = loaded(&clock);
    let mut manager = manager();
    manager.set_metadata("blockCount", json!(3));
    manager.set_metadata("taskCount", json!(2));

    for key in ["j", "j", "j", "j"] {
        let result = registry.execute_by_key(key, &manager, None).await.into_result().unwrap();
        apply(&mut manager, &result);
    }
    assert_eq!(manager.focus().block_index(), Some(2));
    assert_eq!(manager.current_context(), CommandContext::BlockLevel);

    let result = registry.execute_by_key("enter", &manager, None).await.into_result().unwrap();
    apply(&mut manager, &result);
    assert_eq!(manager.current_context(), CommandContext::TaskLevel);
    assert_eq!(manager.focus(), &CommandFocus::task(0, 2, None));
    assert_eq!(
        manager.context_hierarchy(),
        vec![
            CommandContext::TaskLevel,
            CommandContext::BlockLevel,
            CommandContext::ViewSchedule,
            CommandContext::Global,
        ]
    );

    // Task-level j shadows block-level j.
    let result = registry.execute_by_key("j", &manager, None).await.into_result().unwrap();
    apply(&mut manager, &result);
    assert_eq!(manager.focus().task_index(), Some(1));

    for key in ["escape", "escape"] {
        let result = registry.execute_by_key(key, &manager, None).await.into_result().unwrap();
        apply(&mut manager, &result);
    }
    assert_eq!(manager.current_context(), CommandContext::ViewSchedule);
    assert_eq!(manager.focus(), &CommandFocus::View);
}

#[tokio::test]
async fn test_chord_across_calls_and_timeout() {
    let clock = ManualClock::new(1_000);
    let registry = loaded(&clock);
    let manager = manager();

    assert_eq!(registry.execute_by_key("g", &manager, None).await, KeyDispatch::Pending);
    clock.advance(200);
    let result = registry.execute_by_key("y", &manager, None).await.into_result().unwrap();
    assert_eq!(result.new_context, Some(CommandContext::ViewYou));
    assert!(registry.pending_sequence().is_empty());

    assert_eq!(registry.execute_by_key("g", &manager, None).await, KeyDispatch::Pending);
    clock.advance(600);
    assert!(registry.pending_sequence().is_empty());
    assert_eq!(registry.execute_by_key("y", &manager, None).await, KeyDispatch::NoMatch);
}

#[tokio::test]
async fn test_shortcut_override_rebinds_default() {
    let clock = ManualClock::new(0);
    let registry = CommandRegistry::with_clock(RegistryConfig::default(), Arc::new(clock.clone()));
    let overrides = HashMap::from([("toggle-view".to_string(), "g v".to_string())]);
    bootstrap(&registry, &overrides).unwrap();
    let manager = manager();

    assert_eq!(registry.execute_by_key("f1", &manager, None).await, KeyDispatch::NoMatch);
    registry.clear_sequence();
    assert_eq!(registry.execute_by_key("g", &manager, None).await, KeyDispatch::Pending);
    let result = registry.execute_by_key("v", &manager, None).await.into_result().unwrap();
    assert_eq!(result.data, Some(json!({ "viewMode": "you" })));
    assert!(registry.key_conflicts().is_empty());
}

#[tokio::test]
async fn test_user_command_shadows_default_in_deeper_context() {
    let clock = ManualClock::new(0);
    let registry = loaded(&clock);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    registry
        .register(
            ContextualCommand::builder("mark-urgent")
                .key("u")
                .context(CommandContext::BlockLevel)
                .on(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(CommandResult::ok())
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    let mut manager = manager();
    assert_eq!(registry.execute_by_key("u", &manager, None).await, KeyDispatch::NoMatch);
    registry.clear_sequence();

    manager.enter_block_level(0, Some("b-1".into()));
    assert!(registry.execute_by_key("u", &manager, None).await.is_executed());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let history = registry.history(Some(1));
    assert_eq!(history[0].command.id, "mark-urgent");
    assert_eq!(history[0].state.context, CommandContext::BlockLevel);
}

#[test]
fn test_parser_examples() {
    let parsed = text_parser::parse("b 9am 30m standup", CommandContext::ViewSchedule).unwrap();
    assert!(parsed.executable);
    assert_eq!(
        parsed.intent,
        TextIntent::Block {
            start_time: Some("09:00".into()),
            duration: Some(30),
            title: Some("standup".into()),
        }
    );

    let parsed = text_parser::parse("t 25m write report", CommandContext::TaskLevel).unwrap();
    assert_eq!(
        parsed.intent,
        TextIntent::Task {
            duration: Some(25),
            title: Some("write report".into()),
        }
    );

    assert!(text_parser::parse("b 9am", CommandContext::TaskLevel).is_none());
    assert!(text_parser::parse("", CommandContext::Global).is_none());
}

proptest! {
    #[test]
    fn prop_history_never_exceeds_capacity(count in 0usize..250) {
        let registry = CommandRegistry::default();
        bootstrap(&registry, &HashMap::new()).unwrap();
        let state = manager().state();

        futures::executor::block_on(async {
            for _ in 0..count {
                registry.execute_by_id("show-help", state.clone()).await;
            }
        });

        let len = registry.history(None).len();
        prop_assert!(len <= 100);
        prop_assert_eq!(len, count.min(100));
    }
}
