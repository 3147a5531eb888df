//! ECP command interpretation
//!
//! Maps a request path such as `/keypress/Home` to the indicator state it
//! drives and how that state moves. Parsing is pure; executing a command
//! against the store lives in [`dispatch`].

pub mod dispatch;

use std::fmt;
use std::time::Duration;

pub use dispatch::Dispatcher;

/// How long a pulsed state stays `true`
pub const PULSE_DURATION: Duration = Duration::from_millis(50);

/// Recognized command categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Momentary key press
    Keypress,
    /// Key held down
    Keydown,
    /// Key released
    Keyup,
    /// Launch an app
    Launch,
    /// Install an app
    Install,
}

/// Store channel a command writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Keys,
    Apps,
}

/// State change applied for a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Set `true`, then back to `false` after [`PULSE_DURATION`]
    Pulse,
    /// Set the value and leave it
    Latch(bool),
}

/// Channel and transition for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub channel: Channel,
    pub transition: Transition,
}

/// Path segment for each category
const CATEGORIES: &[(&str, Category)] = &[
    ("keypress", Category::Keypress),
    ("keydown", Category::Keydown),
    ("keyup", Category::Keyup),
    ("launch", Category::Launch),
    ("install", Category::Install),
];

impl Category {
    /// Look up a category by its path segment
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        CATEGORIES
            .iter()
            .find(|(name, _)| *name == segment)
            .map(|(_, category)| *category)
    }

    /// Path segment for this category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keypress => "keypress",
            Self::Keydown => "keydown",
            Self::Keyup => "keyup",
            Self::Launch => "launch",
            Self::Install => "install",
        }
    }

    /// Channel and transition for this category
    #[must_use]
    pub const fn policy(self) -> Policy {
        let (channel, transition) = match self {
            Self::Keypress => (Channel::Keys, Transition::Pulse),
            Self::Keydown => (Channel::Keys, Transition::Latch(true)),
            Self::Keyup => (Channel::Keys, Transition::Latch(false)),
            Self::Launch | Self::Install => (Channel::Apps, Transition::Pulse),
        };
        Policy {
            channel,
            transition,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keys => "keys",
            Self::Apps => "apps",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub category: Category,
    /// Item with dots already replaced, safe as a store key segment
    pub item: String,
}

impl Command {
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.category.policy()
    }
}

/// Split `/category/item` into its two segments
///
/// Both segments must be non-empty, the item must not contain `/` or
/// whitespace.
#[must_use]
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix('/')?;
    let (category, item) = rest.split_once('/')?;
    if category.is_empty() || item.is_empty() || item.contains('/') {
        return None;
    }
    if item.chars().any(char::is_whitespace) {
        return None;
    }
    Some((category, item))
}

/// Replace dots so the item can be used as a store key segment
#[must_use]
pub fn normalize_item(item: &str) -> String {
    item.replace('.', "_")
}

/// Interpret a request path as a command
///
/// Returns `None` for malformed paths and unknown categories.
#[must_use]
pub fn interpret(path: &str) -> Option<Command> {
    let (segment, item) = split_path(path)?;
    let category = Category::from_segment(segment)?;
    Some(Command {
        category,
        item: normalize_item(item),
    })
}
