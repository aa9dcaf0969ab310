//! Ouija game
//!
//! Members of a text channel spell a message one character at a time, no
//! author posting twice in a row. Saying "goodbye" reads the message aloud and
//! starts over. [`transition`] is pure; the router applies its [`OuijaEffect`]s
//! and persists the accumulator through the [`ChannelStateStore`].

mod store;

use serde::{Deserialize, Serialize};

pub use store::ChannelStateStore;

/// Notice sent privately to an author who posts twice in a row
pub const REPEAT_NOTICE: &str = "Ouija says you may not post more than 1 character in a row";

/// One collected character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OuijaChar {
    /// The character as posted
    pub char: String,

    /// Who posted it
    pub author_id: String,
}

/// Characters collected so far in one channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccumulator {
    /// Collected characters, oldest first
    #[serde(default)]
    pub chars: Vec<OuijaChar>,
}

impl ChannelAccumulator {
    /// Whether nothing has been collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Author of the most recent character
    #[must_use]
    pub fn last_author(&self) -> Option<&str> {
        self.chars.last().map(|c| c.author_id.as_str())
    }

    /// The collected characters joined in order
    #[must_use]
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.char.as_str()).collect()
    }
}

/// Derived game state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuijaState {
    /// No characters collected
    Empty,
    /// At least one character collected
    Accumulating,
}

impl From<&ChannelAccumulator> for OuijaState {
    fn from(acc: &ChannelAccumulator) -> Self {
        if acc.is_empty() {
            Self::Empty
        } else {
            Self::Accumulating
        }
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OuijaEffect {
    /// Delete the offending message and notify its author privately
    Reject {
        /// Notice for the author
        notice: String,
    },
    /// Send the spelled text to the channel as speech
    Speak(String),
}

/// Result of feeding one message to the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Message is not part of the game; nothing to persist
    Ignored,
    /// Apply the effects, then persist the accumulator
    Updated {
        /// Accumulator after the message
        accumulator: ChannelAccumulator,
        /// Effects to apply, in order
        effects: Vec<OuijaEffect>,
    },
}

/// Feed one text-channel message to the game
///
/// `content` is compared after trimming. A single character (one Unicode
/// scalar value) is appended unless the same author posted the previous one.
/// "goodbye" (any case) flushes a non-empty accumulator.
#[must_use]
pub fn transition(current: &ChannelAccumulator, author_id: &str, content: &str) -> Transition {
    let content = content.trim();

    let mut chars = content.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if current.last_author() == Some(author_id) {
            return Transition::Updated {
                accumulator: current.clone(),
                effects: vec![OuijaEffect::Reject {
                    notice: REPEAT_NOTICE.to_string(),
                }],
            };
        }

        let mut accumulator = current.clone();
        accumulator.chars.push(OuijaChar {
            char: c.to_string(),
            author_id: author_id.to_string(),
        });
        return Transition::Updated {
            accumulator,
            effects: Vec::new(),
        };
    }

    if content.eq_ignore_ascii_case("goodbye")
        && OuijaState::from(current) == OuijaState::Accumulating
    {
        return Transition::Updated {
            accumulator: ChannelAccumulator::default(),
            effects: vec![OuijaEffect::Speak(current.text())],
        };
    }

    Transition::Ignored
}
