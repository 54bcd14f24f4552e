//! Session lifecycle: start, answer, advance, and the completion side effects.

mod active;
mod workflow;

pub use active::{ActiveSession, SessionProgress};
pub use workflow::{SessionCompletion, SessionLoopService, SessionStart, StepResult};
