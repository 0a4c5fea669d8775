//! Context-scoped command registry with multi-key chord dispatch.
//!
//! Commands are indexed three ways: by id, by each context they declare, and
//! by key signature. A keystroke is appended to a short sequence buffer which
//! is then resolved against the caller's context hierarchy, most specific
//! context first:
//!
//! ```text
//! key -> buffer -> for ctx in hierarchy:
//!                    exact signature match  => execute, clear buffer
//!                    buffer prefixes chord  => Pending, keep buffer
//!                  nothing                  => NoMatch, keep buffer until timeout
//! ```
//!
//! The registry is the error boundary for handlers: errors and panics become
//! failed [`CommandResult`]s and are recorded in history like any other run.
//! It never applies `new_context`/`new_focus` from a result; callers do.

use chrono::Utc;
use futures::FutureExt;
use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::{ChordTimer, Clock, SystemClock};
use crate::context::CommandContextManager;
use crate::error::RegistrationError;
use crate::keys::{KeyEvent, KeySignature};
use crate::types::{
    CommandContext, CommandHistoryEntry, CommandInfo, CommandResult, CommandState,
    CommandSuggestion, ContextualCommand, KeyConflict, KeyDispatch, RegistryStats,
};

pub const DEFAULT_CHORD_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_MAX_SEQUENCE_LEN: usize = 3;
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Dispatch tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Pause after which a partial key sequence is discarded.
    pub chord_timeout_ms: u64,
    /// Buffers longer than this are force-cleared.
    pub max_sequence_len: usize,
    /// History ring size; oldest entries are evicted first.
    pub history_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chord_timeout_ms: DEFAULT_CHORD_TIMEOUT_MS,
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Default)]
struct CommandIndex {
    commands: IndexMap<String, Arc<ContextualCommand>>,
    by_context: HashMap<CommandContext, IndexSet<String>>,
    by_key: IndexMap<KeySignature, IndexSet<String>>,
}

enum Resolution {
    Match(Arc<ContextualCommand>),
    Pending,
    Miss,
}

impl CommandIndex {
    fn insert(&mut self, command: ContextualCommand) {
        let id = command.id.clone();
        if let Some(previous) = self.commands.get(&id).cloned() {
            warn!(command = %id, "command already registered; overwriting");
            self.unlink(&previous);
        }
        for context in &command.contexts {
            self.by_context.entry(*context).or_default().insert(id.clone());
        }
        self.by_key.entry(command.key.clone()).or_default().insert(id.clone());
        self.commands.insert(id, Arc::new(command));
    }

    fn remove(&mut self, id: &str) -> Option<Arc<ContextualCommand>> {
        let command = self.commands.shift_remove(id)?;
        self.unlink(&command);
        Some(command)
    }

    /// Drop `command` from the context and key indices, pruning empty sets.
    fn unlink(&mut self, command: &ContextualCommand) {
        for context in &command.contexts {
            if let Some(ids) = self.by_context.get_mut(context) {
                ids.shift_remove(&command.id);
                if ids.is_empty() {
                    self.by_context.remove(context);
                }
            }
        }
        if let Some(ids) = self.by_key.get_mut(&command.key) {
            ids.shift_remove(&command.id);
            if ids.is_empty() {
                self.by_key.shift_remove(&command.key);
            }
        }
    }

    /// Within one context an exact match beats a chord prefix; across
    /// contexts the more specific one decides.
    fn resolve(&self, buffer: &[String], hierarchy: &[CommandContext]) -> Resolution {
        for context in hierarchy {
            let Some(ids) = self.by_context.get(context) else {
                continue;
            };
            let mut pending = false;
            for id in ids {
                let Some(command) = self.commands.get(id) else {
                    continue;
                };
                if command.key.matches(buffer) {
                    return Resolution::Match(Arc::clone(command));
                }
                if command.key.extends(buffer) {
                    pending = true;
                }
            }
            if pending {
                return Resolution::Pending;
            }
        }
        Resolution::Miss
    }

    fn reachable(&self, hierarchy: &[CommandContext]) -> Vec<Arc<ContextualCommand>> {
        let mut seen = IndexSet::new();
        for context in hierarchy {
            if let Some(ids) = self.by_context.get(context) {
                seen.extend(ids.iter().cloned());
            }
        }
        seen.iter()
            .filter_map(|id| self.commands.get(id).cloned())
            .collect()
    }
}

#[derive(Default)]
struct SequenceBuffer {
    keys: Vec<String>,
    timer: ChordTimer,
}

impl SequenceBuffer {
    fn expire(&mut self, now_ms: u64) {
        if self.timer.has_fired(now_ms) {
            debug!(buffer = ?self.keys, "key sequence timed out");
            self.keys.clear();
            self.timer.cancel();
        }
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.timer.cancel();
    }
}

/// Command dispatcher shared by every key and text surface of one process.
///
/// Construct it once at the application root and hand out `Arc`s. All methods
/// take `&self`; internal locks are never held across a handler await, so
/// concurrent dispatches are not serialized.
pub struct CommandRegistry {
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    index: RwLock<CommandIndex>,
    sequence: Mutex<SequenceBuffer>,
    history: Mutex<VecDeque<CommandHistoryEntry>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl CommandRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            index: RwLock::new(CommandIndex::default()),
            sequence: Mutex::new(SequenceBuffer::default()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register one command. A command with the same id is replaced.
    pub fn register(&self, command: ContextualCommand) -> Result<(), RegistrationError> {
        validate(&command)?;
        self.index.write().insert(command);
        Ok(())
    }

    /// Register many commands. Every command is validated before any is
    /// inserted, so a bad entry leaves the registry untouched.
    pub fn register_batch(
        &self,
        commands: impl IntoIterator<Item = ContextualCommand>,
    ) -> Result<usize, RegistrationError> {
        let commands: Vec<ContextualCommand> = commands.into_iter().collect();
        for command in &commands {
            validate(command)?;
        }
        let count = commands.len();
        let mut index = self.index.write();
        for command in commands {
            index.insert(command);
        }
        debug!(count, "registered command batch");
        Ok(count)
    }

    /// Remove a command from every index. Returns whether it existed.
    pub fn unregister(&self, id: &str) -> bool {
        self.index.write().remove(id).is_some()
    }

    pub fn command(&self, id: &str) -> Option<Arc<ContextualCommand>> {
        self.index.read().commands.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.read().commands.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.index.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().commands.is_empty()
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Run a command directly. An unknown id yields a failed result.
    pub async fn execute_by_id(&self, id: &str, state: CommandState) -> CommandResult {
        let Some(command) = self.command(id) else {
            debug!(command = %id, "execute_by_id: not found");
            return CommandResult::failure(format!("Command not found: {id}"));
        };
        self.execute_command(command, state).await
    }

    /// Feed one keystroke. Completes chords across calls; see module docs.
    pub async fn execute_by_key(
        &self,
        key: &str,
        context_manager: &CommandContextManager,
        event: Option<&mut dyn KeyEvent>,
    ) -> KeyDispatch {
        let hierarchy = context_manager.context_hierarchy();
        let now = self.clock.now_ms();

        let command = {
            let mut sequence = self.sequence.lock();
            sequence.expire(now);
            sequence.timer.cancel();
            sequence.keys.push(key.to_string());

            let resolution = self.index.read().resolve(&sequence.keys, &hierarchy);
            match resolution {
                Resolution::Match(command) => {
                    debug!(key, command = %command.id, "key sequence matched");
                    sequence.clear();
                    command
                }
                Resolution::Pending => {
                    debug!(buffer = ?sequence.keys, "key sequence pending");
                    sequence.timer.arm(now, self.config.chord_timeout_ms);
                    return KeyDispatch::Pending;
                }
                Resolution::Miss => {
                    if sequence.keys.len() > self.config.max_sequence_len {
                        debug!(buffer = ?sequence.keys, "key sequence too long; cleared");
                        sequence.clear();
                    } else {
                        sequence.timer.arm(now, self.config.chord_timeout_ms);
                    }
                    return KeyDispatch::NoMatch;
                }
            }
        };

        if let Some(event) = event {
            if command.prevent_default {
                event.prevent_default();
            }
            if command.stop_propagation {
                event.stop_propagation();
            }
        }

        let result = self.execute_command(command, context_manager.state()).await;
        KeyDispatch::Executed(result)
    }

    /// Keys buffered toward a chord, after applying any expired timeout.
    pub fn pending_sequence(&self) -> Vec<String> {
        let mut sequence = self.sequence.lock();
        sequence.expire(self.clock.now_ms());
        sequence.keys.clone()
    }

    pub fn clear_sequence(&self) {
        self.sequence.lock().clear();
    }

    async fn execute_command(&self, command: Arc<ContextualCommand>, state: CommandState) -> CommandResult {
        let invoked = std::panic::catch_unwind(AssertUnwindSafe(|| (command.handler)(state.clone())));
        let outcome = match invoked {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(panic) => Err(panic),
        };

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(command = %command.id, error = %err, "command handler failed");
                CommandResult::failure(err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(command = %command.id, error = %message, "command handler panicked");
                CommandResult::failure(message)
            }
        };

        self.record(CommandHistoryEntry {
            command: command.info(),
            state,
            timestamp: Utc::now(),
            result: result.clone(),
        });
        result
    }

    fn record(&self, entry: CommandHistoryEntry) {
        let mut history = self.history.lock();
        history.push_back(entry);
        while history.len() > self.config.history_capacity {
            history.pop_front();
        }
    }

    // ── Introspection ────────────────────────────────────────────────

    /// Commands reachable from the manager's hierarchy, most specific
    /// context first, each listed once.
    pub fn available_commands(&self, context_manager: &CommandContextManager) -> Vec<CommandInfo> {
        let hierarchy = context_manager.context_hierarchy();
        self.index
            .read()
            .reachable(&hierarchy)
            .iter()
            .map(|command| command.info())
            .collect()
    }

    /// Every command, annotated with availability, available ones first and
    /// then by category name.
    pub fn command_suggestions(&self, context_manager: &CommandContextManager) -> Vec<CommandSuggestion> {
        let hierarchy = context_manager.context_hierarchy();
        let mut suggestions: Vec<CommandSuggestion> = self
            .index
            .read()
            .commands
            .values()
            .map(|command| {
                let available = hierarchy.iter().any(|ctx| command.is_available_in(*ctx));
                let reason = (!available).then(|| {
                    let required: Vec<&str> = command.contexts.iter().map(|c| c.as_str()).collect();
                    if required.is_empty() {
                        "Not bound to any context".to_string()
                    } else {
                        format!("Requires {}", required.join(", "))
                    }
                });
                CommandSuggestion {
                    command: command.info(),
                    available,
                    reason,
                }
            })
            .collect();
        suggestions.sort_by_key(|s| (!s.available, s.command.category.slug()));
        suggestions
    }

    /// Signatures bound to several commands that share a context.
    ///
    /// Only literal signature equality is checked: a single key that shadows
    /// a longer chord starting with it is not reported.
    pub fn key_conflicts(&self) -> Vec<KeyConflict> {
        let index = self.index.read();
        let mut conflicts = Vec::new();
        for (key, ids) in &index.by_key {
            if ids.len() < 2 {
                continue;
            }
            let commands: Vec<&Arc<ContextualCommand>> =
                ids.iter().filter_map(|id| index.commands.get(id)).collect();

            let mut usage: BTreeMap<CommandContext, usize> = BTreeMap::new();
            for command in &commands {
                for context in &command.contexts {
                    *usage.entry(*context).or_default() += 1;
                }
            }
            let shared: Vec<CommandContext> = usage
                .into_iter()
                .filter(|(_, count)| *count > 1)
                .map(|(context, _)| context)
                .collect();
            if shared.is_empty() {
                continue;
            }

            let command_ids = commands
                .iter()
                .filter(|command| shared.iter().any(|ctx| command.is_available_in(*ctx)))
                .map(|command| command.id.clone())
                .collect();
            conflicts.push(KeyConflict {
                key: key.clone(),
                command_ids,
                shared_contexts: shared,
            });
        }
        conflicts
    }

    /// Most recent `limit` entries (all when `None`), oldest first.
    pub fn history(&self, limit: Option<usize>) -> Vec<CommandHistoryEntry> {
        let history = self.history.lock();
        let skip = limit.map_or(0, |limit| history.len().saturating_sub(limit));
        history.iter().skip(skip).cloned().collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn stats(&self) -> RegistryStats {
        let index = self.index.read();
        let mut stats = RegistryStats {
            total_commands: index.commands.len(),
            key_bindings: index.by_key.len(),
            chord_bindings: index.by_key.keys().filter(|key| key.is_chord()).count(),
            history_len: self.history.lock().len(),
            ..RegistryStats::default()
        };
        for (context, ids) in &index.by_context {
            stats.by_context.insert(*context, ids.len());
        }
        for command in index.commands.values() {
            *stats.by_category.entry(command.category).or_default() += 1;
        }
        stats
    }

    /// Drop all commands, the key buffer and history.
    pub fn reset(&self) {
        *self.index.write() = CommandIndex::default();
        self.sequence.lock().clear();
        self.history.lock().clear();
    }
}

fn validate(command: &ContextualCommand) -> Result<(), RegistrationError> {
    if command.id.trim().is_empty() {
        return Err(RegistrationError::MissingId);
    }
    if command.key.is_empty() {
        return Err(RegistrationError::MissingKey {
            id: command.id.clone(),
        });
    }
    if let Some(position) = command.key.first_blank() {
        return Err(RegistrationError::EmptyKeyToken {
            id: command.id.clone(),
            position,
        });
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "command handler panicked".to_string()
    }
}
