//! Shared type contracts between the context manager, the registry and the
//! handlers supplied by application wiring.

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::error::RegistrationError;
use crate::keys::KeySignature;

/// Scope gating which commands may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandContext {
    Global,
    ViewSchedule,
    ViewYou,
    BlockLevel,
    TaskLevel,
}

impl CommandContext {
    pub const ALL: [CommandContext; 5] = [
        CommandContext::Global,
        CommandContext::ViewSchedule,
        CommandContext::ViewYou,
        CommandContext::BlockLevel,
        CommandContext::TaskLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::ViewSchedule => "VIEW_SCHEDULE",
            Self::ViewYou => "VIEW_YOU",
            Self::BlockLevel => "BLOCK_LEVEL",
            Self::TaskLevel => "TASK_LEVEL",
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, Self::ViewSchedule | Self::ViewYou)
    }

    pub fn is_entity_level(&self) -> bool {
        matches!(self, Self::BlockLevel | Self::TaskLevel)
    }
}

impl fmt::Display for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandContext {
    type Err = String;

    /// Accepts `TASK_LEVEL`, `task-level`, `task_level` and the short forms
    /// `global`, `schedule`, `you`, `block`, `task`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "global" => Ok(Self::Global),
            "view_schedule" | "schedule" => Ok(Self::ViewSchedule),
            "view_you" | "you" => Ok(Self::ViewYou),
            "block_level" | "block" => Ok(Self::BlockLevel),
            "task_level" | "task" => Ok(Self::TaskLevel),
            _ => Err(format!("unknown command context: {s}")),
        }
    }
}

/// Top-level view of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Schedule,
    You,
}

impl ViewMode {
    /// The context a view installs above `Global`.
    pub fn context(&self) -> CommandContext {
        match self {
            Self::Schedule => CommandContext::ViewSchedule,
            Self::You => CommandContext::ViewYou,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::You => "you",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Schedule => Self::You,
            Self::You => Self::Schedule,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schedule" => Ok(Self::Schedule),
            "you" => Ok(Self::You),
            _ => Err(format!("unknown view mode: {s}")),
        }
    }
}

/// The entity currently addressed, carried alongside the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CommandFocus {
    #[default]
    View,
    Block {
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Task {
        index: usize,
        #[serde(rename = "parentIndex")]
        parent_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl CommandFocus {
    pub fn block(index: usize, id: Option<String>) -> Self {
        Self::Block { index, id }
    }

    pub fn task(index: usize, parent_index: usize, id: Option<String>) -> Self {
        Self::Task {
            index,
            parent_index,
            id,
        }
    }

    /// Index of the focused block, or of the block enclosing the focused task.
    pub fn block_index(&self) -> Option<usize> {
        match self {
            Self::View => None,
            Self::Block { index, .. } => Some(*index),
            Self::Task { parent_index, .. } => Some(*parent_index),
        }
    }

    pub fn task_index(&self) -> Option<usize> {
        match self {
            Self::Task { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Grouping used for listings and suggestion ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandCategory {
    #[default]
    General,
    Navigation,
    View,
    Block,
    Task,
    Help,
}

impl CommandCategory {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Navigation => "navigation",
            Self::View => "view",
            Self::Block => "block",
            Self::Task => "task",
            Self::Help => "help",
        }
    }
}

/// Immutable snapshot handed to command handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandState {
    pub context: CommandContext,
    pub focus: CommandFocus,
    pub selected_date: NaiveDate,
    pub view_mode: ViewMode,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl CommandState {
    pub fn new(context: CommandContext, focus: CommandFocus, selected_date: NaiveDate, view_mode: ViewMode) -> Self {
        Self {
            context,
            focus,
            selected_date,
            view_mode,
            metadata: BTreeMap::new(),
        }
    }
}

/// Outcome of a command. `new_context` and `new_focus` are advisory: the
/// registry never applies them, the caller decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_context: Option<CommandContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_focus: Option<CommandFocus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_context(mut self, context: CommandContext) -> Self {
        self.new_context = Some(context);
        self
    }

    pub fn with_focus(mut self, focus: CommandFocus) -> Self {
        self.new_focus = Some(focus);
        self
    }
}

/// Failure reported by a handler; becomes the message of a failed result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

pub type HandlerOutput = Result<CommandResult, HandlerError>;
pub type HandlerFuture = BoxFuture<'static, HandlerOutput>;

/// Uniform handler shape: sync handlers are wrapped in a ready future.
pub type CommandHandler = Arc<dyn Fn(CommandState) -> HandlerFuture + Send + Sync>;

/// Wrap a synchronous handler. The body runs when the returned future is
/// polled, so panics surface inside the registry's error boundary.
pub fn sync_handler<F>(f: F) -> CommandHandler
where
    F: Fn(&CommandState) -> HandlerOutput + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |state: CommandState| {
        let f = Arc::clone(&f);
        Box::pin(async move { f(&state) }) as HandlerFuture
    })
}

/// Wrap an asynchronous handler.
pub fn async_handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(CommandState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerOutput> + Send + 'static,
{
    Arc::new(move |state: CommandState| Box::pin(f(state)) as HandlerFuture)
}

/// A key binding scoped to a set of contexts.
#[derive(Clone)]
pub struct ContextualCommand {
    pub id: String,
    pub key: KeySignature,
    pub contexts: BTreeSet<CommandContext>,
    pub category: CommandCategory,
    pub description: String,
    pub prevent_default: bool,
    pub stop_propagation: bool,
    pub handler: CommandHandler,
}

impl fmt::Debug for ContextualCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualCommand")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("contexts", &self.contexts)
            .field("category", &self.category)
            .field("description", &self.description)
            .field("prevent_default", &self.prevent_default)
            .field("stop_propagation", &self.stop_propagation)
            .finish_non_exhaustive()
    }
}

impl ContextualCommand {
    pub fn builder(id: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(id)
    }

    pub fn is_available_in(&self, context: CommandContext) -> bool {
        self.contexts.contains(&context)
    }

    /// Serializable description without the handler.
    pub fn info(&self) -> CommandInfo {
        CommandInfo {
            id: self.id.clone(),
            key: self.key.clone(),
            contexts: self.contexts.iter().copied().collect(),
            category: self.category,
            description: self.description.clone(),
        }
    }
}

/// Builder for [`ContextualCommand`]; `build` fails on a missing id, key or
/// handler.
pub struct CommandBuilder {
    id: String,
    key: Option<KeySignature>,
    contexts: BTreeSet<CommandContext>,
    category: CommandCategory,
    description: String,
    prevent_default: bool,
    stop_propagation: bool,
    handler: Option<CommandHandler>,
}

impl CommandBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: None,
            contexts: BTreeSet::new(),
            category: CommandCategory::default(),
            description: String::new(),
            prevent_default: true,
            stop_propagation: false,
            handler: None,
        }
    }

    pub fn key(mut self, key: impl Into<KeySignature>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn context(mut self, context: CommandContext) -> Self {
        self.contexts.insert(context);
        self
    }

    pub fn contexts(mut self, contexts: impl IntoIterator<Item = CommandContext>) -> Self {
        self.contexts.extend(contexts);
        self
    }

    pub fn category(mut self, category: CommandCategory) -> Self {
        self.category = category;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn prevent_default(mut self, prevent: bool) -> Self {
        self.prevent_default = prevent;
        self
    }

    pub fn stop_propagation(mut self, stop: bool) -> Self {
        self.stop_propagation = stop;
        self
    }

    pub fn handler(mut self, handler: CommandHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Shorthand for `handler(sync_handler(f))`.
    pub fn on<F>(self, f: F) -> Self
    where
        F: Fn(&CommandState) -> HandlerOutput + Send + Sync + 'static,
    {
        self.handler(sync_handler(f))
    }

    pub fn build(self) -> Result<ContextualCommand, RegistrationError> {
        if self.id.trim().is_empty() {
            return Err(RegistrationError::MissingId);
        }
        let key = match self.key {
            Some(key) if !key.is_empty() => key,
            _ => return Err(RegistrationError::MissingKey { id: self.id }),
        };
        let handler = self
            .handler
            .ok_or_else(|| RegistrationError::MissingHandler { id: self.id.clone() })?;
        Ok(ContextualCommand {
            id: self.id,
            key,
            contexts: self.contexts,
            category: self.category,
            description: self.description,
            prevent_default: self.prevent_default,
            stop_propagation: self.stop_propagation,
            handler,
        })
    }
}

/// Handler-free view of a command for listings, history and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInfo {
    pub id: String,
    pub key: KeySignature,
    pub contexts: Vec<CommandContext>,
    pub category: CommandCategory,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandHistoryEntry {
    pub command: CommandInfo,
    pub state: CommandState,
    pub timestamp: DateTime<Utc>,
    pub result: CommandResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSuggestion {
    pub command: CommandInfo,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Two or more commands bound to the same signature with overlapping contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConflict {
    pub key: KeySignature,
    pub command_ids: Vec<String>,
    pub shared_contexts: Vec<CommandContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_commands: usize,
    pub by_context: BTreeMap<CommandContext, usize>,
    pub by_category: BTreeMap<CommandCategory, usize>,
    pub key_bindings: usize,
    pub chord_bindings: usize,
    pub history_len: usize,
}

/// Outcome of feeding one keystroke to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyDispatch {
    /// A command matched and ran; carries its result (which may be a failure).
    Executed(CommandResult),
    /// The buffer is a prefix of a registered chord; waiting for more keys.
    Pending,
    /// Nothing matched in the active hierarchy.
    NoMatch,
}

impl KeyDispatch {
    pub fn result(&self) -> Option<&CommandResult> {
        match self {
            Self::Executed(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<CommandResult> {
        match self {
            Self::Executed(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }
}
