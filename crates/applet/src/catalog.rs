//! Built-in catalog of starter apps.
//!
//! A catalog create names one of these entries by its artifact identity; the
//! canned description goes into the prompt and the canned icon into the result.
//! Identities not found here still generate, from a generic description.

/// One built-in app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

/// Icon used for catalog identities that have no entry.
pub const FALLBACK_ICON: &str = "📱";

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Calculator",
        icon: "🔢",
        description: "A fully functional calculator with basic arithmetic operations (+, -, ×, ÷), clear functions, and a numeric display. Should have a modern, dark theme with a grid of buttons.",
    },
    CatalogEntry {
        name: "Notes",
        icon: "📝",
        description: "A simple note-taking app with a text area for writing and editing notes. Clean, minimal design with focus on text input.",
    },
    CatalogEntry {
        name: "Clock",
        icon: "⏰",
        description: "A digital clock that displays the current time, updating every second. Simple, readable display.",
    },
    CatalogEntry {
        name: "Stopwatch",
        icon: "⏱️",
        description: "A stopwatch/timer with start, stop, and reset buttons. Shows elapsed time in MM:SS:MS format. Simple controls with a large time display.",
    },
    CatalogEntry {
        name: "Todo List",
        icon: "📋",
        description: "A todo list app where users can add tasks and check them off as complete. Simple list interface with add functionality.",
    },
    CatalogEntry {
        name: "Drawing",
        icon: "✏️",
        description: "A simple drawing pad using HTML5 canvas. Allow drawing with mouse/touch, change colors, clear the canvas. Basic drawing tool with brush functionality.",
    },
    CatalogEntry {
        name: "Coin Flip",
        icon: "🪙",
        description: "A coin flip simulator that randomly shows heads or tails when clicked. Fun animation and clear result display.",
    },
    CatalogEntry {
        name: "Snake",
        icon: "🐍",
        description: "A classic Snake game where the player controls a snake that starts with 3 segments and grows as it eats food. Use arrow keys or touch swipes to control direction. Game over when snake hits walls or itself. Score increases with each food eaten.",
    },
];

/// All built-in entries, in home-screen order.
pub fn entries() -> &'static [CatalogEntry] {
    ENTRIES
}

/// Looks up an entry by exact name.
pub fn lookup(name: &str) -> Option<&'static CatalogEntry> {
    ENTRIES.iter().find(|e| e.name == name)
}

/// Prompt description for `name`, falling back to a generic one.
pub fn describe(name: &str) -> String {
    match lookup(name) {
        Some(entry) => entry.description.to_string(),
        None => format!("A simple {name} app"),
    }
}

/// Icon for `name`, falling back to [`FALLBACK_ICON`].
pub fn icon(name: &str) -> &'static str {
    lookup(name).map_or(FALLBACK_ICON, |e| e.icon)
}
