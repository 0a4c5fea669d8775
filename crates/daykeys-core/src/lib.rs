//! # Daykeys Core Library
//!
//! This library provides the keyboard command engine for a day-planner UI.
//! The CLI binary drives the same engine a desktop shell would, so every
//! shortcut, chord and text command can be exercised without a window.
//!
//! ## Architecture
//!
//! - **Context Manager**: Tracks the active view, the selected block or task
//!   and the selected date, and publishes one state snapshot per change
//! - **Command Registry**: Context-scoped commands with multi-key chords,
//!   bounded history, conflict detection and suggestions
//! - **Text Parser**: Priority-ordered regex rules that turn free text such as
//!   `b 9am 30m standup` into typed intents
//! - **Defaults**: The built-in command set plus user shortcut overrides
//!
//! ## Key Components
//!
//! - [`CommandContextManager`]: UI focus and context stack
//! - [`CommandRegistry`]: Key dispatch and command execution
//! - [`TextCommandParser`]: Free-text command recognition
//! - [`Config`]: Engine configuration management

pub mod clock;
pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod keys;
pub mod registry;
pub mod text_parser;
pub mod types;

pub use clock::{ChordTimer, Clock, ManualClock, SystemClock};
pub use config::Config;
pub use context::CommandContextManager;
pub use defaults::{bootstrap, default_commands};
pub use error::{ConfigError, CoreError, RegistrationError};
pub use keys::{KeyEvent, KeyPress, KeySignature};
pub use registry::{CommandRegistry, RegistryConfig};
pub use text_parser::{IntentKind, ParsedTextCommand, TextAction, TextCommandParser, TextIntent};
pub use types::{
    async_handler, sync_handler, CommandCategory, CommandContext, CommandFocus, CommandHandler,
    CommandHistoryEntry, CommandInfo, CommandResult, CommandState, CommandSuggestion,
    ContextualCommand, HandlerError, KeyConflict, KeyDispatch, RegistryStats, ViewMode,
};
