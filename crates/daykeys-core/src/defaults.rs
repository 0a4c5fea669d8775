//! Default key bindings registered at startup.
//!
//! Handlers here are pure: they describe what the UI should do in `data` and
//! propose the next context/focus. The shell applies those proposals (or
//! not) and performs the actual block/task mutations.
//!
//! Counts used for clamping are read from the `blockCount` and `taskCount`
//! metadata entries when the shell provides them.

use chrono::{Duration, Local};
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{CoreError, RegistrationError};
use crate::keys::KeySignature;
use crate::registry::CommandRegistry;
use crate::types::{
    CommandCategory, CommandContext, CommandFocus, CommandResult, CommandState, ContextualCommand,
    HandlerOutput, ViewMode,
};

use CommandContext::{BlockLevel, Global, TaskLevel, ViewSchedule, ViewYou};

pub const BLOCK_COUNT_KEY: &str = "blockCount";
pub const TASK_COUNT_KEY: &str = "taskCount";

struct Binding {
    id: &'static str,
    key: &'static [&'static str],
    contexts: &'static [CommandContext],
    category: CommandCategory,
    description: &'static str,
    handler: fn(&CommandState) -> HandlerOutput,
}

const DEFAULT_BINDINGS: &[Binding] = &[
    // Global
    Binding {
        id: "show-help",
        key: &["?"],
        contexts: &[Global],
        category: CommandCategory::Help,
        description: "Show keyboard shortcuts",
        handler: |_| Ok(action("show-help")),
    },
    Binding {
        id: "command-palette",
        key: &["ctrl+k"],
        contexts: &[Global],
        category: CommandCategory::General,
        description: "Open the command palette",
        handler: |_| Ok(action("open-palette")),
    },
    Binding {
        id: "toggle-view",
        key: &["f1"],
        contexts: &[Global],
        category: CommandCategory::View,
        description: "Switch between schedule and you views",
        handler: |state| Ok(switch_to(state.view_mode.toggled())),
    },
    Binding {
        id: "go-schedule",
        key: &["g", "s"],
        contexts: &[Global],
        category: CommandCategory::View,
        description: "Go to the schedule view",
        handler: |_| Ok(switch_to(ViewMode::Schedule)),
    },
    Binding {
        id: "go-you",
        key: &["g", "y"],
        contexts: &[Global],
        category: CommandCategory::View,
        description: "Go to the you view",
        handler: |_| Ok(switch_to(ViewMode::You)),
    },
    // Schedule view
    Binding {
        id: "jump-top",
        key: &["g", "g"],
        contexts: &[ViewSchedule, BlockLevel],
        category: CommandCategory::Navigation,
        description: "Focus the first block",
        handler: |_| Ok(focus_block(0)),
    },
    Binding {
        id: "next-block",
        key: &["j"],
        contexts: &[ViewSchedule, BlockLevel],
        category: CommandCategory::Navigation,
        description: "Focus the next block",
        handler: |state| {
            let next = match state.focus.block_index() {
                Some(index) => step(index, 1, count(state, BLOCK_COUNT_KEY)),
                None => 0,
            };
            Ok(focus_block(next))
        },
    },
    Binding {
        id: "prev-block",
        key: &["k"],
        contexts: &[ViewSchedule, BlockLevel],
        category: CommandCategory::Navigation,
        description: "Focus the previous block",
        handler: |state| {
            let index = state.focus.block_index().unwrap_or(0);
            Ok(focus_block(step(index, -1, count(state, BLOCK_COUNT_KEY))))
        },
    },
    Binding {
        id: "open-block",
        key: &["enter"],
        contexts: &[ViewSchedule],
        category: CommandCategory::Block,
        description: "Open the focused block",
        handler: |state| Ok(focus_block(state.focus.block_index().unwrap_or(0))),
    },
    Binding {
        id: "new-block",
        key: &["n"],
        contexts: &[ViewSchedule, BlockLevel],
        category: CommandCategory::Block,
        description: "Create a block",
        handler: |_| Ok(action("create-block")),
    },
    Binding {
        id: "prev-day",
        key: &["["],
        contexts: &[ViewSchedule],
        category: CommandCategory::Navigation,
        description: "Previous day",
        handler: |state| Ok(select_date(state.selected_date - Duration::days(1))),
    },
    Binding {
        id: "next-day",
        key: &["]"],
        contexts: &[ViewSchedule],
        category: CommandCategory::Navigation,
        description: "Next day",
        handler: |state| Ok(select_date(state.selected_date + Duration::days(1))),
    },
    Binding {
        id: "today",
        key: &["t"],
        contexts: &[ViewSchedule],
        category: CommandCategory::Navigation,
        description: "Jump to today",
        handler: |_| Ok(select_date(Local::now().date_naive())),
    },
    // Block level
    Binding {
        id: "enter-task",
        key: &["enter"],
        contexts: &[BlockLevel],
        category: CommandCategory::Task,
        description: "Open the first task of the focused block",
        handler: |state| {
            let block = state
                .focus
                .block_index()
                .ok_or("no block is focused")?;
            Ok(focus_task(0, block))
        },
    },
    Binding {
        id: "edit-block",
        key: &["e"],
        contexts: &[BlockLevel],
        category: CommandCategory::Block,
        description: "Edit the focused block",
        handler: |state| Ok(target_action("edit-block", &state.focus)),
    },
    Binding {
        id: "add-task",
        key: &["a"],
        contexts: &[BlockLevel],
        category: CommandCategory::Task,
        description: "Add a task to the focused block",
        handler: |state| Ok(target_action("create-task", &state.focus)),
    },
    Binding {
        id: "delete-block",
        key: &["d", "d"],
        contexts: &[BlockLevel],
        category: CommandCategory::Block,
        description: "Delete the focused block",
        handler: |state| Ok(target_action("delete-block", &state.focus)),
    },
    Binding {
        id: "exit-block",
        key: &["escape"],
        contexts: &[BlockLevel],
        category: CommandCategory::Navigation,
        description: "Back to the view",
        handler: |state| {
            Ok(CommandResult::ok()
                .with_context(state.view_mode.context())
                .with_focus(CommandFocus::View))
        },
    },
    // Task level
    Binding {
        id: "next-task",
        key: &["j"],
        contexts: &[TaskLevel],
        category: CommandCategory::Navigation,
        description: "Focus the next task",
        handler: |state| move_task(state, 1),
    },
    Binding {
        id: "prev-task",
        key: &["k"],
        contexts: &[TaskLevel],
        category: CommandCategory::Navigation,
        description: "Focus the previous task",
        handler: |state| move_task(state, -1),
    },
    Binding {
        id: "toggle-task",
        key: &["x"],
        contexts: &[TaskLevel],
        category: CommandCategory::Task,
        description: "Toggle the focused task",
        handler: |state| Ok(target_action("toggle-task", &state.focus)),
    },
    Binding {
        id: "edit-task",
        key: &["e"],
        contexts: &[TaskLevel],
        category: CommandCategory::Task,
        description: "Edit the focused task",
        handler: |state| Ok(target_action("edit-task", &state.focus)),
    },
    Binding {
        id: "delete-task",
        key: &["d", "d"],
        contexts: &[TaskLevel],
        category: CommandCategory::Task,
        description: "Delete the focused task",
        handler: |state| Ok(target_action("delete-task", &state.focus)),
    },
    Binding {
        id: "exit-task",
        key: &["escape"],
        contexts: &[TaskLevel],
        category: CommandCategory::Navigation,
        description: "Back to the block",
        handler: |state| {
            let block = state.focus.block_index().unwrap_or(0);
            Ok(CommandResult::ok()
                .with_context(BlockLevel)
                .with_focus(CommandFocus::block(block, None)))
        },
    },
    // You view
    Binding {
        id: "edit-profile",
        key: &["e"],
        contexts: &[ViewYou],
        category: CommandCategory::General,
        description: "Edit your profile",
        handler: |_| Ok(action("edit-profile")),
    },
];

/// The built-in command set.
pub fn default_commands() -> Result<Vec<ContextualCommand>, RegistrationError> {
    DEFAULT_BINDINGS
        .iter()
        .map(|binding| {
            ContextualCommand::builder(binding.id)
                .key(binding.key)
                .contexts(binding.contexts.iter().copied())
                .category(binding.category)
                .description(binding.description)
                .on(binding.handler)
                .build()
        })
        .collect()
}

/// Rebind commands by id. Values use spaces between chord steps (`"g t"`).
/// Returns the ids that matched no command.
pub fn apply_shortcut_overrides(
    commands: &mut [ContextualCommand],
    bindings: &HashMap<String, String>,
) -> Vec<String> {
    let mut unknown = Vec::new();
    for (id, raw) in bindings {
        let key = KeySignature::new(raw.split_whitespace());
        if key.is_empty() {
            warn!(command = %id, "ignoring empty shortcut override");
            continue;
        }
        match commands.iter_mut().find(|command| &command.id == id) {
            Some(command) => command.key = key,
            None => {
                warn!(command = %id, "shortcut override for unknown command");
                unknown.push(id.clone());
            }
        }
    }
    unknown.sort();
    unknown
}

/// Register the defaults, with overrides applied, into `registry`.
pub fn bootstrap(registry: &CommandRegistry, overrides: &HashMap<String, String>) -> Result<usize, CoreError> {
    let mut commands = default_commands()?;
    apply_shortcut_overrides(&mut commands, overrides);
    Ok(registry.register_batch(commands)?)
}

// ── Handler helpers ──────────────────────────────────────────────────

fn action(name: &str) -> CommandResult {
    CommandResult::ok().with_data(json!({ "action": name }))
}

fn target_action(name: &str, focus: &CommandFocus) -> CommandResult {
    CommandResult::ok().with_data(json!({ "action": name, "target": focus }))
}

fn switch_to(mode: ViewMode) -> CommandResult {
    CommandResult::ok()
        .with_data(json!({ "viewMode": mode }))
        .with_context(mode.context())
        .with_focus(CommandFocus::View)
}

fn select_date(date: chrono::NaiveDate) -> CommandResult {
    CommandResult::ok().with_data(json!({ "selectedDate": date }))
}

fn focus_block(index: usize) -> CommandResult {
    CommandResult::ok()
        .with_context(BlockLevel)
        .with_focus(CommandFocus::block(index, None))
}

fn focus_task(index: usize, block: usize) -> CommandResult {
    CommandResult::ok()
        .with_context(TaskLevel)
        .with_focus(CommandFocus::task(index, block, None))
}

fn move_task(state: &CommandState, delta: i64) -> HandlerOutput {
    match state.focus {
        CommandFocus::Task {
            index,
            parent_index,
            ..
        } => Ok(focus_task(step(index, delta, count(state, TASK_COUNT_KEY)), parent_index)),
        _ => Err("no task is focused".into()),
    }
}

fn count(state: &CommandState, key: &str) -> Option<usize> {
    state
        .metadata
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

/// Move `index` by `delta`, staying within `[0, count)` when known.
fn step(index: usize, delta: i64, count: Option<usize>) -> usize {
    let moved = if delta < 0 {
        index.saturating_sub(delta.unsigned_abs() as usize)
    } else {
        index.saturating_add(delta as usize)
    };
    match count {
        Some(0) => 0,
        Some(n) => moved.min(n - 1),
        None => moved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandContextManager;
    use crate::types::KeyDispatch;
    use chrono::NaiveDate;

    fn manager() -> CommandContextManager {
        CommandContextManager::new(ViewMode::Schedule, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
    }

    fn loaded() -> CommandRegistry {
        let registry = CommandRegistry::default();
        bootstrap(&registry, &HashMap::new()).unwrap();
        registry
    }

    #[test]
    fn defaults_have_unique_ids_and_no_conflicts() {
        let commands = default_commands().unwrap();
        let mut ids: Vec<&str> = commands.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), commands.len());
        assert!(loaded().key_conflicts().is_empty());
    }

    #[test]
    fn step_clamps_to_count() {
        assert_eq!(step(0, -1, None), 0);
        assert_eq!(step(3, 1, Some(4)), 3);
        assert_eq!(step(1, 1, Some(4)), 2);
        assert_eq!(step(5, 1, Some(0)), 0);
    }

    #[tokio::test]
    async fn j_moves_blocks_then_tasks_by_level() {
        let registry = loaded();
        let mut m = manager();
        m.set_metadata(BLOCK_COUNT_KEY, json!(3));

        let result = registry.execute_by_key("j", &m, None).await.into_result().unwrap();
        assert_eq!(result.new_focus, Some(CommandFocus::block(0, None)));

        m.enter_block_level(2, None);
        let result = registry.execute_by_key("j", &m, None).await.into_result().unwrap();
        assert_eq!(result.new_focus, Some(CommandFocus::block(2, None)));

        m.enter_task_level(0, 2, None);
        let result = registry.execute_by_key("j", &m, None).await.into_result().unwrap();
        assert_eq!(result.new_focus, Some(CommandFocus::task(1, 2, None)));
    }

    #[tokio::test]
    async fn go_chords_resolve_through_global() {
        let registry = loaded();
        let m = manager();
        assert_eq!(registry.execute_by_key("g", &m, None).await, KeyDispatch::Pending);
        let result = registry.execute_by_key("y", &m, None).await.into_result().unwrap();
        assert_eq!(result.data, Some(json!({ "viewMode": "you" })));
        assert_eq!(result.new_context, Some(ViewYou));
    }

    #[tokio::test]
    async fn day_navigation_uses_selected_date() {
        let registry = loaded();
        let m = manager();
        let result = registry.execute_by_key("]", &m, None).await.into_result().unwrap();
        assert_eq!(result.data, Some(json!({ "selectedDate": "2024-03-05" })));
    }

    #[tokio::test]
    async fn escape_proposes_parent_level() {
        let registry = loaded();
        let mut m = manager();
        m.enter_task_level(1, 4, None);
        let result = registry.execute_by_key("escape", &m, None).await.into_result().unwrap();
        assert_eq!(result.new_context, Some(BlockLevel));
        assert_eq!(result.new_focus, Some(CommandFocus::block(4, None)));
    }

    #[test]
    fn overrides_rebind_known_commands() {
        let mut commands = default_commands().unwrap();
        let overrides = HashMap::from([
            ("toggle-view".to_string(), "f2".to_string()),
            ("jump-top".to_string(), "g t".to_string()),
            ("missing".to_string(), "z".to_string()),
            ("show-help".to_string(), "  ".to_string()),
        ]);
        let unknown = apply_shortcut_overrides(&mut commands, &overrides);
        assert_eq!(unknown, vec!["missing".to_string()]);

        let find = |id: &str| commands.iter().find(|c| c.id == id).unwrap().key.clone();
        assert_eq!(find("toggle-view"), KeySignature::from("f2"));
        assert_eq!(find("jump-top"), KeySignature::from(["g", "t"]));
        assert_eq!(find("show-help"), KeySignature::from("?"));
    }
}
