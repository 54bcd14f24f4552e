use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {raw}")]
pub struct ParseModeError {
    kind: &'static str,
    raw: String,
}

//
// ─── MODALITY ──────────────────────────────────────────────────────────────────
//

/// The skill a question exercises, and the tag a weak word is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Recall the meaning of a shown word.
    Meaning,
    /// Produce the spelling of a word from its meaning.
    Spelling,
}

impl Modality {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Meaning => "meaning",
            Modality::Spelling => "spelling",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meaning" => Ok(Modality::Meaning),
            "spelling" => Ok(Modality::Spelling),
            other => Err(ParseModeError {
                kind: "modality",
                raw: other.to_owned(),
            }),
        }
    }
}

//
// ─── QUIZ MODE ─────────────────────────────────────────────────────────────────
//

/// How questions are presented and answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    /// Show the word, pick its meaning among four choices.
    #[default]
    Choice,
    /// Show the meaning, type the word.
    Spelling,
    /// Like `Spelling`, with a partially revealed word as a hint.
    SpellingEasy,
}

impl QuizMode {
    /// Weak-word tag that misses in this mode are filed under.
    #[must_use]
    pub fn modality(self) -> Modality {
        match self {
            QuizMode::Choice => Modality::Meaning,
            QuizMode::Spelling | QuizMode::SpellingEasy => Modality::Spelling,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::Choice => "choice",
            QuizMode::Spelling => "spelling",
            QuizMode::SpellingEasy => "spelling_easy",
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "choice" => Ok(QuizMode::Choice),
            "spelling" => Ok(QuizMode::Spelling),
            "spelling_easy" => Ok(QuizMode::SpellingEasy),
            other => Err(ParseModeError {
                kind: "quiz mode",
                raw: other.to_owned(),
            }),
        }
    }
}

/// Partially revealed spelling used as the easy-mode hint.
///
/// Keeps the first and last letters, the middle letter of words longer than five
/// characters, and every non-alphabetic character; other letters become `_`.
#[must_use]
pub fn masked_spelling(word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    let len = chars.len();
    chars
        .iter()
        .enumerate()
        .map(|(index, ch)| {
            let shown = index == 0
                || index + 1 == len
                || (len > 5 && index == len / 2)
                || !ch.is_ascii_alphabetic();
            if shown { *ch } else { '_' }
        })
        .map(String::from)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_map_to_modalities() {
        assert_eq!(QuizMode::Choice.modality(), Modality::Meaning);
        assert_eq!(QuizMode::Spelling.modality(), Modality::Spelling);
        assert_eq!(QuizMode::SpellingEasy.modality(), Modality::Spelling);
    }

    #[test]
    fn mode_parses_from_cli_names() {
        assert_eq!("spelling_easy".parse::<QuizMode>(), Ok(QuizMode::SpellingEasy));
        assert!("typing".parse::<QuizMode>().is_err());
        assert_eq!("meaning".parse::<Modality>(), Ok(Modality::Meaning));
    }

    #[test]
    fn masked_spelling_keeps_edges_and_middle() {
        assert_eq!(masked_spelling("cat"), "c _ t");
        assert_eq!(masked_spelling("orange"), "o _ _ n _ e");
        assert_eq!(masked_spelling("ice-cream"), "i _ _ - c _ _ _ m");
        assert_eq!(masked_spelling("a"), "a");
    }
}
