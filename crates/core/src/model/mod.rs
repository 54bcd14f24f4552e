mod ids;
mod mode;
mod question;
mod session;
mod stats;
mod vocab;
mod weak_word;

pub use ids::{ParseIdError, SessionRecordId, UserId, VocabId};
pub use mode::{Modality, ParseModeError, QuizMode, masked_spelling};
pub use question::{Answer, CHOICE_COUNT, Choice, Question, build_questions};
pub use session::{SessionRecord, SessionRecordError, Selection, WEAK_SELECTION_KEY};
pub use stats::{
    DailyMission, EXP_PER_LEVEL, LevelTitle, MISSION_CATALOG, MissionError, MissionKind,
    MissionTemplate, UserStats, level_for_exp,
};
pub use vocab::{Tier, VocabularyDraft, VocabularyError, VocabularyItem};
pub use weak_word::{Cleared, WeakTypes, WeakWordEntry, WeakWordError};
