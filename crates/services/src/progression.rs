use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use storage::repository::UserStatsRepository;
use tracing::{debug, info};
use vocab_core::model::{UserId, UserStats};
use vocab_core::progression::{self, ProgressionOutcome, SessionTally};

use crate::Clock;
use crate::error::ProgressionError;

/// Loads, updates and persists experience, streaks and daily missions.
#[derive(Clone)]
pub struct ProgressionService {
    clock: Clock,
    offset: FixedOffset,
    stats: Arc<dyn UserStatsRepository>,
}

impl ProgressionService {
    /// `offset` decides where one study day ends and the next begins.
    #[must_use]
    pub fn new(clock: Clock, offset: FixedOffset, stats: Arc<dyn UserStatsRepository>) -> Self {
        Self {
            clock,
            offset,
            stats,
        }
    }

    /// The calendar day "now" falls on.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.offset)
    }

    /// Stored stats, or the defaults for a new user.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Storage` if the stats cannot be read.
    pub async fn load_stats(&self, user: &UserId) -> Result<UserStats, ProgressionError> {
        Ok(self.stats.get_stats(user).await?.unwrap_or_default())
    }

    /// Refresh a stale mission and zero a broken streak, writing only on change.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Storage` if the stats cannot be read or saved.
    pub async fn check_daily_resets(&self, user: &UserId) -> Result<UserStats, ProgressionError> {
        let stats = self.load_stats(user).await?;
        let today = self.today();
        let Some(updated) = progression::check_daily_resets(&stats, today, &mut rand::rng())
        else {
            return Ok(stats);
        };
        self.stats.save_stats(user, &updated).await?;
        debug!(user = %user, %today, streak = updated.streak_count, "applied daily resets");
        Ok(updated)
    }

    /// Apply a finished session to the user's stats and persist them atomically.
    ///
    /// `today` is the study day the session started on.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Tally` if `score > total`, or
    /// `ProgressionError::Storage` if the stats cannot be read or saved.
    pub async fn apply_session_result(
        &self,
        user: &UserId,
        score: u32,
        total: u32,
        duration_secs: u64,
        today: NaiveDate,
    ) -> Result<ProgressionOutcome, ProgressionError> {
        let tally = SessionTally::new(score, total, duration_secs)?;
        let stats = self.load_stats(user).await?;
        let outcome = progression::apply_session_result(stats, tally, today, &mut rand::rng());
        self.stats.save_stats(user, &outcome.stats).await?;

        info!(
            user = %user,
            exp_gained = outcome.exp_gained,
            level = outcome.stats.level(),
            leveled_up = outcome.leveled_up,
            mission_completed = outcome.mission_completed,
            "progression updated"
        );
        Ok(outcome)
    }
}
