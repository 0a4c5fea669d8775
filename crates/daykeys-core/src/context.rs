//! Hierarchical context and focus state machine.
//!
//! The stack always starts with `GLOBAL` and a view context. Entity levels sit
//! on top of the view, one at a time:
//!
//! ```text
//! [GLOBAL, VIEW_*]                 focus: view
//! [GLOBAL, VIEW_*, BLOCK_LEVEL]    focus: block { index }
//! [GLOBAL, VIEW_*, TASK_LEVEL]     focus: task { index, parentIndex }
//! ```
//!
//! A task level implies its block level, so the derived hierarchy for the last
//! row is `[TASK_LEVEL, BLOCK_LEVEL, VIEW_*, GLOBAL]`.

use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::types::{CommandContext, CommandFocus, CommandState, ViewMode};

/// Callback invoked once at the end of every state-changing operation.
pub type ChangeListener = Box<dyn Fn(&CommandState) + Send + Sync>;

pub struct CommandContextManager {
    stack: Vec<CommandContext>,
    focus: CommandFocus,
    view_mode: ViewMode,
    selected_date: NaiveDate,
    metadata: BTreeMap<String, serde_json::Value>,
    /// Id of the block enclosing the focused task, restored on exit.
    parent_block_id: Option<String>,
    on_change: Option<ChangeListener>,
}

impl fmt::Debug for CommandContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContextManager")
            .field("stack", &self.stack)
            .field("focus", &self.focus)
            .field("view_mode", &self.view_mode)
            .field("selected_date", &self.selected_date)
            .field("metadata", &self.metadata)
            .field("has_listener", &self.on_change.is_some())
            .finish()
    }
}

impl Default for CommandContextManager {
    fn default() -> Self {
        Self::new(ViewMode::Schedule, Local::now().date_naive())
    }
}

impl CommandContextManager {
    pub fn new(view_mode: ViewMode, selected_date: NaiveDate) -> Self {
        Self {
            stack: vec![CommandContext::Global, view_mode.context()],
            focus: CommandFocus::View,
            view_mode,
            selected_date,
            metadata: BTreeMap::new(),
            parent_block_id: None,
            on_change: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn current_context(&self) -> CommandContext {
        self.stack.last().copied().unwrap_or(CommandContext::Global)
    }

    pub fn focus(&self) -> &CommandFocus {
        &self.focus
    }

    pub fn context_stack(&self) -> &[CommandContext] {
        &self.stack
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Contexts from most to least specific, the order in which the registry
    /// resolves keys.
    pub fn context_hierarchy(&self) -> Vec<CommandContext> {
        let has_block = self.stack.contains(&CommandContext::BlockLevel);
        let mut hierarchy = Vec::with_capacity(self.stack.len() + 1);
        for context in self.stack.iter().rev() {
            hierarchy.push(*context);
            if *context == CommandContext::TaskLevel && !has_block {
                hierarchy.push(CommandContext::BlockLevel);
            }
        }
        hierarchy
    }

    pub fn is_in_context(&self, context: CommandContext) -> bool {
        self.context_hierarchy().contains(&context)
    }

    /// Snapshot handed to command handlers.
    pub fn state(&self) -> CommandState {
        CommandState {
            context: self.current_context(),
            focus: self.focus.clone(),
            selected_date: self.selected_date,
            view_mode: self.view_mode,
            metadata: self.metadata.clone(),
        }
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// Hard reset into `mode`. Focus never carries over between views.
    pub fn switch_view(&mut self, mode: ViewMode) {
        self.view_mode = mode;
        self.stack = vec![CommandContext::Global, mode.context()];
        self.focus = CommandFocus::View;
        self.parent_block_id = None;
        self.notify();
    }

    pub fn enter_block_level(&mut self, index: usize, id: Option<String>) {
        self.descend_to_block();
        self.focus = CommandFocus::Block { index, id };
        self.notify();
    }

    pub fn enter_task_level(&mut self, task_index: usize, block_index: usize, id: Option<String>) {
        let block_id = match &self.focus {
            CommandFocus::Block { index, id } if *index == block_index => id.clone(),
            CommandFocus::Task { parent_index, .. } if *parent_index == block_index => {
                self.parent_block_id.clone()
            }
            _ => None,
        };
        self.descend_to_block();
        if let Some(top) = self.stack.last_mut() {
            *top = CommandContext::TaskLevel;
        }
        self.parent_block_id = block_id;
        self.focus = CommandFocus::Task {
            index: task_index,
            parent_index: block_index,
            id,
        };
        self.notify();
    }

    /// Leave task level for its enclosing block. No-op elsewhere, and a
    /// no-op does not notify the listener.
    pub fn exit_to_block_level(&mut self) {
        if self.collapse_task_level() {
            self.notify();
        }
    }

    /// Drop any entity level and focus the view. Already at view level with
    /// view focus this is a no-op and does not notify the listener.
    pub fn exit_to_view_level(&mut self) {
        if self.stack.len() <= 2 && self.focus == CommandFocus::View {
            return;
        }
        self.stack.truncate(2);
        self.focus = CommandFocus::View;
        self.parent_block_id = None;
        self.notify();
    }

    /// Move focus to another block without changing level. Returns false
    /// (and leaves state untouched) unless the top context is `BLOCK_LEVEL`.
    pub fn navigate_to_block(&mut self, index: usize, id: Option<String>) -> bool {
        if self.current_context() != CommandContext::BlockLevel {
            return false;
        }
        self.focus = CommandFocus::Block { index, id };
        self.notify();
        true
    }

    /// Move focus to a sibling task in the same block. Returns false unless
    /// the top context is `TASK_LEVEL`.
    pub fn navigate_to_task(&mut self, index: usize, id: Option<String>) -> bool {
        let parent_index = match (&self.focus, self.current_context()) {
            (CommandFocus::Task { parent_index, .. }, CommandContext::TaskLevel) => *parent_index,
            _ => return false,
        };
        self.focus = CommandFocus::Task {
            index,
            parent_index,
            id,
        };
        self.notify();
        true
    }

    // ── Ambient state ────────────────────────────────────────────────

    pub fn set_selected_date(&mut self, date: NaiveDate) {
        if self.selected_date == date {
            return;
        }
        self.selected_date = date;
        self.notify();
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
        self.notify();
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.metadata.remove(key);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Back to the schedule view with no focus and no metadata. The listener
    /// and selected date are kept.
    pub fn reset(&mut self) {
        self.view_mode = ViewMode::Schedule;
        self.stack = vec![CommandContext::Global, ViewMode::Schedule.context()];
        self.focus = CommandFocus::View;
        self.metadata.clear();
        self.parent_block_id = None;
        self.notify();
    }

    pub fn set_on_change(&mut self, listener: ChangeListener) {
        self.on_change = Some(listener);
    }

    pub fn clear_on_change(&mut self) {
        self.on_change = None;
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Ensure the top is `BLOCK_LEVEL`, collapsing a task level first.
    fn descend_to_block(&mut self) {
        self.collapse_task_level();
        if self.current_context() != CommandContext::BlockLevel {
            self.stack.truncate(2);
            self.stack.push(CommandContext::BlockLevel);
        }
    }

    /// Replace a `TASK_LEVEL` top with its block. Returns whether it did.
    fn collapse_task_level(&mut self) -> bool {
        if self.current_context() != CommandContext::TaskLevel {
            return false;
        }
        if let Some(top) = self.stack.last_mut() {
            *top = CommandContext::BlockLevel;
        }
        let index = self.focus.block_index().unwrap_or(0);
        self.focus = CommandFocus::Block {
            index,
            id: self.parent_block_id.take(),
        };
        true
    }

    fn notify(&self) {
        debug!(
            context = %self.current_context(),
            depth = self.stack.len(),
            focus = ?self.focus,
            "command context changed"
        );
        if let Some(listener) = &self.on_change {
            listener(&self.state());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn manager() -> CommandContextManager {
        CommandContextManager::new(ViewMode::Schedule, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
    }

    fn counting(manager: &mut CommandContextManager) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        manager.set_on_change(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        count
    }

    #[test]
    fn starts_at_view_level() {
        let m = manager();
        assert_eq!(m.context_stack(), &[CommandContext::Global, CommandContext::ViewSchedule]);
        assert_eq!(m.focus(), &CommandFocus::View);
        assert_eq!(
            m.context_hierarchy(),
            vec![CommandContext::ViewSchedule, CommandContext::Global]
        );
    }

    #[test]
    fn enter_task_level_sets_task_focus() {
        let mut m = manager();
        m.enter_task_level(2, 5, None);
        assert_eq!(m.current_context(), CommandContext::TaskLevel);
        assert_eq!(m.focus(), &CommandFocus::task(2, 5, None));
        assert_eq!(
            m.context_hierarchy(),
            vec![
                CommandContext::TaskLevel,
                CommandContext::BlockLevel,
                CommandContext::ViewSchedule,
                CommandContext::Global,
            ]
        );
    }

    #[test]
    fn stack_never_exceeds_three_entries() {
        let mut m = manager();
        m.enter_block_level(1, None);
        m.enter_block_level(2, None);
        m.enter_task_level(0, 2, None);
        m.enter_task_level(1, 3, None);
        m.enter_block_level(4, None);
        m.enter_task_level(0, 4, None);
        assert_eq!(m.context_stack().len(), 3);
        assert_eq!(m.context_stack()[0], CommandContext::Global);
    }

    #[test]
    fn exit_to_block_restores_parent_focus() {
        let mut m = manager();
        m.enter_block_level(3, Some("block-3".into()));
        m.enter_task_level(1, 3, Some("task-1".into()));
        m.exit_to_block_level();
        assert_eq!(m.current_context(), CommandContext::BlockLevel);
        assert_eq!(m.focus(), &CommandFocus::block(3, Some("block-3".into())));
    }

    #[test]
    fn exit_to_view_clears_focus() {
        let mut m = manager();
        m.enter_task_level(0, 0, None);
        m.exit_to_view_level();
        assert_eq!(m.current_context(), CommandContext::ViewSchedule);
        assert_eq!(m.focus(), &CommandFocus::View);
    }

    #[test]
    fn switch_view_is_a_hard_reset() {
        let mut m = manager();
        m.enter_task_level(1, 2, None);
        m.switch_view(ViewMode::You);
        assert_eq!(m.context_stack(), &[CommandContext::Global, CommandContext::ViewYou]);
        assert_eq!(m.focus(), &CommandFocus::View);
        assert_eq!(m.view_mode(), ViewMode::You);
    }

    #[test]
    fn lateral_navigation_requires_matching_level() {
        let mut m = manager();
        assert!(!m.navigate_to_block(4, None));
        assert_eq!(m.focus(), &CommandFocus::View);

        m.enter_block_level(0, None);
        assert!(m.navigate_to_block(4, None));
        assert!(!m.navigate_to_task(1, None));
        assert_eq!(m.focus(), &CommandFocus::block(4, None));

        m.enter_task_level(0, 4, None);
        assert!(m.navigate_to_task(3, None));
        assert!(!m.navigate_to_block(1, None));
        assert_eq!(m.focus(), &CommandFocus::task(3, 4, None));
    }

    #[test]
    fn composed_operations_notify_once() {
        let mut m = manager();
        let count = counting(&mut m);
        m.enter_task_level(0, 1, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        m.exit_to_block_level();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        m.exit_to_block_level();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        m.switch_view(ViewMode::Schedule);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn noop_exits_stay_silent() {
        let mut m = manager();
        let count = counting(&mut m);
        m.exit_to_view_level();
        m.exit_to_block_level();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        m.enter_block_level(2, None);
        m.exit_to_view_level();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        m.exit_to_view_level();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn state_snapshot_reflects_manager() {
        let mut m = manager();
        m.set_metadata("blockCount", serde_json::json!(4));
        m.enter_block_level(2, None);
        let state = m.state();
        assert_eq!(state.context, CommandContext::BlockLevel);
        assert_eq!(state.focus, CommandFocus::block(2, None));
        assert_eq!(state.metadata.get("blockCount"), Some(&serde_json::json!(4)));
        assert!(m.is_in_context(CommandContext::ViewSchedule));
        assert!(!m.is_in_context(CommandContext::TaskLevel));
    }

    #[test]
    fn reset_keeps_selected_date() {
        let mut m = manager();
        m.switch_view(ViewMode::You);
        m.set_metadata("k", serde_json::json!(true));
        m.reset();
        assert_eq!(m.view_mode(), ViewMode::Schedule);
        assert!(m.metadata().is_empty());
        assert_eq!(m.selected_date(), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }
}
