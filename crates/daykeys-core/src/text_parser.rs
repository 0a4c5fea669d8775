//! Typed-command parser for the quick-entry bar.
//!
//! Turns short phrases into structured intents:
//!
//! | input                   | intent                                      |
//! |-------------------------|---------------------------------------------|
//! | `b 2pm`                 | block, start 14:00                          |
//! | `b 9:30am 90m deep work`| block, start 09:30, 90 min, "deep work"     |
//! | `t 30m review docs`     | task, 30 min, "review docs"                 |
//! | `e 3pm 1h standup`      | event, start 15:00, 60 min, "standup"       |
//! | `r morning`             | routine "morning"                           |
//! | `/settings`             | menu, query "settings"                      |
//! | `done`                  | action complete                             |
//!
//! Rules carry an explicit priority; the most specific (type + time +
//! duration) run first and the first rule whose extractor accepts the input
//! wins. The winning intent is then filtered by the active context.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::CommandContext;

/// Kind of a parsed intent, used for context filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Menu,
    Block,
    Task,
    Event,
    Routine,
    Action,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Menu => "menu",
            Self::Block => "block",
            Self::Task => "task",
            Self::Event => "event",
            Self::Routine => "routine",
            Self::Action => "action",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAction {
    Complete,
    Delete,
    Duplicate,
    Edit,
    Today,
}

/// Structured intent; each variant holds only the fields it can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TextIntent {
    Menu {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    Block {
        #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
        start_time: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Task {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Event {
        #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
        start_time: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Routine {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Action {
        action: TextAction,
    },
}

impl TextIntent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Menu { .. } => IntentKind::Menu,
            Self::Block { .. } => IntentKind::Block,
            Self::Task { .. } => IntentKind::Task,
            Self::Event { .. } => IntentKind::Event,
            Self::Routine { .. } => IntentKind::Routine,
            Self::Action { .. } => IntentKind::Action,
        }
    }

    /// Whether the intent has everything needed to act on it.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Menu { .. } | Self::Action { .. } => true,
            Self::Block { start_time, .. } => start_time.is_some(),
            Self::Task { title, .. } => title.is_some(),
            Self::Event {
                start_time, title, ..
            } => start_time.is_some() && title.is_some(),
            Self::Routine { name } => name.is_some(),
        }
    }

    /// The variant with no fields filled in.
    pub fn empty(kind: IntentKind) -> Option<Self> {
        let intent = match kind {
            IntentKind::Menu => Self::Menu { query: None },
            IntentKind::Block => Self::Block {
                start_time: None,
                duration: None,
                title: None,
            },
            IntentKind::Task => Self::Task {
                duration: None,
                title: None,
            },
            IntentKind::Event => Self::Event {
                start_time: None,
                duration: None,
                title: None,
            },
            IntentKind::Routine => Self::Routine { name: None },
            IntentKind::Action => return None,
        };
        Some(intent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTextCommand {
    #[serde(flatten)]
    pub intent: TextIntent,
    pub raw: String,
    pub executable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ParsedTextCommand {
    pub fn kind(&self) -> IntentKind {
        self.intent.kind()
    }
}

pub type Extractor = fn(&Captures<'_>) -> Option<TextIntent>;

/// A `(pattern, extractor)` pair with an explicit priority.
pub struct TextRule {
    pub name: &'static str,
    pub priority: u16,
    pattern: Regex,
    extract: Extractor,
}

impl fmt::Debug for TextRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextRule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl TextRule {
    pub fn new(name: &'static str, priority: u16, pattern: &str, extract: Extractor) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            priority,
            pattern: Regex::new(pattern)?,
            extract,
        })
    }

    fn apply(&self, input: &str) -> Option<TextIntent> {
        let caps = self.pattern.captures(input)?;
        (self.extract)(&caps)
    }
}

struct PrefixHint {
    prefix: char,
    kind: IntentKind,
    hint: &'static str,
}

const PREFIX_HINTS: &[PrefixHint] = &[
    PrefixHint {
        prefix: 'b',
        kind: IntentKind::Block,
        hint: "b <time> [duration] [title] - new time block",
    },
    PrefixHint {
        prefix: 't',
        kind: IntentKind::Task,
        hint: "t [duration] <title> - new task",
    },
    PrefixHint {
        prefix: 'e',
        kind: IntentKind::Event,
        hint: "e <time> [duration] <title> - new event",
    },
    PrefixHint {
        prefix: 'r',
        kind: IntentKind::Routine,
        hint: "r <name> - apply routine",
    },
    PrefixHint {
        prefix: '/',
        kind: IntentKind::Menu,
        hint: "/[query] - open command menu",
    },
];

const TIME: &str = r"(?P<time>\d{1,2}(?::\d{2})?(?:am|pm)?)";
const DURATION: &str = r"(?P<duration>\d+[mh])";
const TITLE: &str = r"(?:\s+(?P<title>.+))?";

static DEFAULT_PARSER: Lazy<TextCommandParser> = Lazy::new(TextCommandParser::new);

/// Ordered rule list plus context filter.
#[derive(Debug)]
pub struct TextCommandParser {
    rules: Vec<TextRule>,
}

impl Default for TextCommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCommandParser {
    /// Parser with the built-in rules.
    pub fn new() -> Self {
        let mut parser = Self { rules: Vec::new() };
        for rule in builtin_rules() {
            parser.add_rule(rule);
        }
        parser
    }

    /// Parser with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Insert a rule after every rule of equal or higher priority.
    pub fn add_rule(&mut self, rule: TextRule) {
        let position = self
            .rules
            .iter()
            .position(|existing| existing.priority < rule.priority)
            .unwrap_or(self.rules.len());
        self.rules.insert(position, rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = (&'static str, u16)> + '_ {
        self.rules.iter().map(|rule| (rule.name, rule.priority))
    }

    /// Parse `input`; `None` when no rule matches or the active context does
    /// not accept the resulting intent.
    pub fn parse(&self, input: &str, context: CommandContext) -> Option<ParsedTextCommand> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let intent = self.rules.iter().find_map(|rule| rule.apply(trimmed))?;
        if !accepts(context, intent.kind()) {
            return None;
        }
        Some(ParsedTextCommand {
            executable: intent.is_complete(),
            intent,
            raw: trimmed.to_string(),
            hint: None,
        })
    }

    /// Exact parse (if any) followed by non-executable hints for every known
    /// prefix matching the first character.
    pub fn suggestions(&self, input: &str, context: CommandContext) -> Vec<ParsedTextCommand> {
        let trimmed = input.trim();
        let Some(first) = trimmed.chars().next() else {
            return Vec::new();
        };
        let first = first.to_ascii_lowercase();

        let mut out = Vec::new();
        let parsed = self.parse(trimmed, context);
        let covered = parsed
            .as_ref()
            .filter(|p| p.executable)
            .map(ParsedTextCommand::kind);
        out.extend(parsed);

        for hint in PREFIX_HINTS.iter().filter(|h| h.prefix == first) {
            if Some(hint.kind) == covered || !accepts(context, hint.kind) {
                continue;
            }
            if let Some(intent) = TextIntent::empty(hint.kind) {
                out.push(ParsedTextCommand {
                    intent,
                    raw: trimmed.to_string(),
                    executable: false,
                    hint: Some(hint.hint.to_string()),
                });
            }
        }
        out
    }
}

/// Parse with the built-in rules.
pub fn parse(input: &str, context: CommandContext) -> Option<ParsedTextCommand> {
    DEFAULT_PARSER.parse(input, context)
}

/// Suggestions with the built-in rules.
pub fn suggestions(input: &str, context: CommandContext) -> Vec<ParsedTextCommand> {
    DEFAULT_PARSER.suggestions(input, context)
}

/// Which intents each context lets through.
pub fn accepts(context: CommandContext, kind: IntentKind) -> bool {
    match context {
        CommandContext::TaskLevel => matches!(kind, IntentKind::Task | IntentKind::Menu),
        CommandContext::BlockLevel | CommandContext::ViewSchedule => kind != IntentKind::Task,
        CommandContext::Global | CommandContext::ViewYou => true,
    }
}

/// `H[:MM][am|pm]` to 24-hour `HH:MM`. 12pm stays 12, 12am becomes 0.
pub fn normalize_time(raw: &str) -> Option<String> {
    static TIME_PARTS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?i)(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$").expect("Invalid time regex pattern")
    });
    let caps = TIME_PARTS.captures(raw.trim())?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if let Some(meridiem) = caps.get(3) {
        if !(1..=12).contains(&hour) {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        hour = match (pm, hour) {
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, 12) => 0,
            (false, h) => h,
        };
    }
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(time.format("%H:%M").to_string())
}

/// Integer with `m` or `h` suffix, in minutes.
pub fn parse_duration(raw: &str) -> Option<u32> {
    let raw = raw.trim().to_ascii_lowercase();
    let (digits, factor) = if let Some(d) = raw.strip_suffix('h') {
        (d, 60)
    } else if let Some(d) = raw.strip_suffix('m') {
        (d, 1)
    } else {
        return None;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok()?.checked_mul(factor)
}

fn text(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn time(caps: &Captures<'_>) -> Option<String> {
    normalize_time(caps.name("time")?.as_str())
}

fn duration(caps: &Captures<'_>) -> Option<u32> {
    parse_duration(caps.name("duration")?.as_str())
}

fn builtin_rules() -> Vec<TextRule> {
    let specs: [(&'static str, u16, String, Extractor); 14] = [
        (
            "block-time-duration",
            100,
            format!(r"^(?i)(?:b|block)\s+{TIME}\s+{DURATION}{TITLE}$"),
            |c| {
                Some(TextIntent::Block {
                    start_time: Some(time(c)?),
                    duration: Some(duration(c)?),
                    title: text(c, "title"),
                })
            },
        ),
        (
            "event-time-duration",
            100,
            format!(r"^(?i)(?:e|event)\s+{TIME}\s+{DURATION}{TITLE}$"),
            |c| {
                Some(TextIntent::Event {
                    start_time: Some(time(c)?),
                    duration: Some(duration(c)?),
                    title: text(c, "title"),
                })
            },
        ),
        (
            "block-time",
            80,
            format!(r"^(?i)(?:b|block)\s+{TIME}{TITLE}$"),
            |c| {
                Some(TextIntent::Block {
                    start_time: Some(time(c)?),
                    duration: None,
                    title: text(c, "title"),
                })
            },
        ),
        (
            "event-time",
            80,
            format!(r"^(?i)(?:e|event)\s+{TIME}{TITLE}$"),
            |c| {
                Some(TextIntent::Event {
                    start_time: Some(time(c)?),
                    duration: None,
                    title: text(c, "title"),
                })
            },
        ),
        (
            "block-duration",
            70,
            format!(r"^(?i)(?:b|block)\s+{DURATION}{TITLE}$"),
            |c| {
                Some(TextIntent::Block {
                    start_time: None,
                    duration: Some(duration(c)?),
                    title: text(c, "title"),
                })
            },
        ),
        (
            "task-duration",
            70,
            format!(r"^(?i)(?:t|task)\s+{DURATION}{TITLE}$"),
            |c| {
                Some(TextIntent::Task {
                    duration: Some(duration(c)?),
                    title: text(c, "title"),
                })
            },
        ),
        (
            "block-title",
            60,
            r"^(?i)(?:b|block)\s+(?P<title>.+)$".to_string(),
            |c| {
                Some(TextIntent::Block {
                    start_time: None,
                    duration: None,
                    title: text(c, "title"),
                })
            },
        ),
        (
            "task-title",
            60,
            r"^(?i)(?:t|task)\s+(?P<title>.+)$".to_string(),
            |c| {
                Some(TextIntent::Task {
                    duration: None,
                    title: text(c, "title"),
                })
            },
        ),
        (
            "event-title",
            60,
            r"^(?i)(?:e|event)\s+(?P<title>.+)$".to_string(),
            |c| {
                Some(TextIntent::Event {
                    start_time: None,
                    duration: None,
                    title: text(c, "title"),
                })
            },
        ),
        (
            "routine",
            50,
            r"^(?i)(?:r|routine)(?:\s+(?P<name>.+))?$".to_string(),
            |c| Some(TextIntent::Routine { name: text(c, "name") }),
        ),
        (
            "menu",
            40,
            r"^(?i)(?:/|menu\b)\s*(?P<query>.*)$".to_string(),
            |c| Some(TextIntent::Menu { query: text(c, "query") }),
        ),
        (
            "action",
            30,
            r"^(?i)(?P<action>done|complete|x|delete|del|dup|duplicate|edit|today)$".to_string(),
            |c| {
                let action = match c.name("action")?.as_str().to_ascii_lowercase().as_str() {
                    "done" | "complete" | "x" => TextAction::Complete,
                    "delete" | "del" => TextAction::Delete,
                    "dup" | "duplicate" => TextAction::Duplicate,
                    "edit" => TextAction::Edit,
                    "today" => TextAction::Today,
                    _ => return None,
                };
                Some(TextIntent::Action { action })
            },
        ),
        (
            "bare-block",
            10,
            r"^(?i)(?:b|block)$".to_string(),
            |_| TextIntent::empty(IntentKind::Block),
        ),
        (
            "bare-task-or-event",
            10,
            r"^(?i)(?P<word>t|task|e|event)$".to_string(),
            |c| match c.name("word")?.as_str().to_ascii_lowercase().as_str() {
                "t" | "task" => TextIntent::empty(IntentKind::Task),
                _ => TextIntent::empty(IntentKind::Event),
            },
        ),
    ];

    specs
        .into_iter()
        .filter_map(|(name, priority, pattern, extract)| {
            match TextRule::new(name, priority, &pattern, extract) {
                Ok(rule) => Some(rule),
                Err(err) => {
                    tracing::error!(rule = name, error = %err, "invalid built-in text rule");
                    None
                }
            }
        })
        .collect()
}
