use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{QuizMode, SessionRecordId, Tier, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("score ({score}) exceeds total questions ({total})")]
    ScoreOverTotal { score: u32, total: u32 },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}

//
// ─── SELECTION ─────────────────────────────────────────────────────────────────
//

/// How the questions of a session were chosen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    /// Every item up to and including this tier.
    MaxTier(Tier),
    /// The user's weak words for the session's modality.
    WeakWords(UserId),
}

/// Storage key for a weak-word selection, as recorded in session logs.
pub const WEAK_SELECTION_KEY: &str = "weak";

impl Selection {
    /// Compact encoding used in session records: the tier number, or `weak`.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Selection::MaxTier(tier) => tier.value().to_string(),
            Selection::WeakWords(_) => WEAK_SELECTION_KEY.to_owned(),
        }
    }

    /// Decode `key()` output for the given user.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::InvalidSelection` for anything else.
    pub fn from_key(key: &str, user: &UserId) -> Result<Self, SessionRecordError> {
        if key == WEAK_SELECTION_KEY {
            return Ok(Selection::WeakWords(user.clone()));
        }
        u32::from_str(key)
            .map(|v| Selection::MaxTier(Tier::new(v)))
            .map_err(|_| SessionRecordError::InvalidSelection(key.to_owned()))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::MaxTier(tier) => write!(f, "tier <= {tier}"),
            Selection::WeakWords(_) => f.write_str("weak words"),
        }
    }
}

//
// ─── SESSION RECORD ────────────────────────────────────────────────────────────
//

/// Append-only log line written when a session reaches its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    id: SessionRecordId,
    recorded_at: DateTime<Utc>,
    selection: Selection,
    mode: QuizMode,
    score: u32,
    total_questions: u32,
    duration_secs: u64,
}

impl SessionRecord {
    /// Build a record for a finished session, with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::ScoreOverTotal` if `score > total_questions`.
    pub fn new(
        recorded_at: DateTime<Utc>,
        selection: Selection,
        mode: QuizMode,
        score: u32,
        total_questions: u32,
        duration_secs: u64,
    ) -> Result<Self, SessionRecordError> {
        Self::from_persisted(
            SessionRecordId::generate(),
            recorded_at,
            selection,
            mode,
            score,
            total_questions,
            duration_secs,
        )
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::ScoreOverTotal` if totals do not align.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionRecordId,
        recorded_at: DateTime<Utc>,
        selection: Selection,
        mode: QuizMode,
        score: u32,
        total_questions: u32,
        duration_secs: u64,
    ) -> Result<Self, SessionRecordError> {
        if score > total_questions {
            return Err(SessionRecordError::ScoreOverTotal {
                score,
                total: total_questions,
            });
        }
        Ok(Self {
            id,
            recorded_at,
            selection,
            mode,
            score,
            total_questions,
            duration_secs,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionRecordId {
        self.id
    }

    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.total_questions > 0 && self.score == self.total_questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn record_rejects_score_over_total() {
        let err = SessionRecord::new(
            fixed_now(),
            Selection::MaxTier(Tier::new(4)),
            QuizMode::Choice,
            11,
            10,
            60,
        )
        .unwrap_err();
        assert_eq!(err, SessionRecordError::ScoreOverTotal { score: 11, total: 10 });
    }

    #[test]
    fn selection_key_roundtrips() {
        let user = UserId::new("u1").unwrap();
        let tier = Selection::MaxTier(Tier::new(3));
        assert_eq!(Selection::from_key(&tier.key(), &user).unwrap(), tier);

        let weak = Selection::WeakWords(user.clone());
        assert_eq!(weak.key(), "weak");
        assert_eq!(Selection::from_key("weak", &user).unwrap(), weak);
        assert!(Selection::from_key("-3", &user).is_err());
    }

    #[test]
    fn perfect_requires_nonzero_total() {
        let record = SessionRecord::new(
            fixed_now(),
            Selection::MaxTier(Tier::new(1)),
            QuizMode::Spelling,
            5,
            5,
            30,
        )
        .unwrap();
        assert!(record.is_perfect());
    }
}
