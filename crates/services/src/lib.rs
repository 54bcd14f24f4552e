#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod progression;
pub mod question_bank;
pub mod sessions;
pub mod weak_words;

pub use vocab_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ProgressionError, QuestionBankError, SessionError};
pub use progression::ProgressionService;
pub use question_bank::{Candidates, QuestionBank};
pub use sessions::{
    ActiveSession, SessionCompletion, SessionLoopService, SessionProgress, SessionStart,
    StepResult,
};
pub use weak_words::{WeakWordReport, WeakWordTracker};
