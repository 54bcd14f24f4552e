//! Experience, streak and daily-mission rules.
//!
//! Everything here is a pure function of the previous `UserStats`, the session
//! tally and the calendar day; persistence lives in the services layer.

use chrono::NaiveDate;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::model::{MISSION_CATALOG, MissionKind, SessionRecordError, UserStats};

/// Experience per correct test answer.
pub const EXP_PER_CORRECT: u32 = 10;

/// Bonus for answering every test question correctly.
pub const PERFECT_BONUS: u32 = 20;

/// Score of one finished session as progression sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTally {
    score: u32,
    total: u32,
    duration_secs: u64,
}

impl SessionTally {
    /// # Errors
    ///
    /// Returns `SessionRecordError::ScoreOverTotal` if `score > total`.
    pub fn new(score: u32, total: u32, duration_secs: u64) -> Result<Self, SessionRecordError> {
        if score > total {
            return Err(SessionRecordError::ScoreOverTotal { score, total });
        }
        Ok(Self {
            score,
            total,
            duration_secs,
        })
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.score == self.total
    }

    /// Experience earned before any mission reward.
    #[must_use]
    pub fn base_exp(&self) -> u32 {
        let bonus = if self.is_perfect() { PERFECT_BONUS } else { 0 };
        self.score.saturating_mul(EXP_PER_CORRECT).saturating_add(bonus)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionOutcome {
    pub stats: UserStats,
    pub leveled_up: bool,
    pub mission_completed: bool,
    pub exp_gained: u32,
}

/// Fold a finished session into the user's stats.
#[must_use]
pub fn apply_session_result<R: Rng + ?Sized>(
    mut stats: UserStats,
    tally: SessionTally,
    today: NaiveDate,
    rng: &mut R,
) -> ProgressionOutcome {
    let old_level = stats.level();

    record_study_day(&mut stats, today);
    refresh_mission(&mut stats, today, rng);

    let mut exp_gained = tally.base_exp();
    let mut mission_completed = false;
    let mission_is_today = stats.last_mission_date == Some(today);
    if let Some(mission) = stats.daily_mission.as_mut().filter(|_| mission_is_today) {
        let amount = match mission.kind() {
            MissionKind::Play => tally.total(),
            MissionKind::Score => tally.score(),
        };
        if mission.advance(amount) {
            exp_gained = exp_gained.saturating_add(mission.reward());
            mission_completed = true;
        }
    }

    stats.exp = stats.exp.saturating_add(exp_gained);
    stats.total_correct = stats.total_correct.saturating_add(tally.score());
    stats.total_study_seconds = stats
        .total_study_seconds
        .saturating_add(tally.duration_secs());

    ProgressionOutcome {
        leveled_up: stats.level() > old_level,
        mission_completed,
        exp_gained,
        stats,
    }
}

/// Day-boundary maintenance run before showing or updating stats.
///
/// Issues a fresh mission when the current one is stale and zeroes a broken
/// streak. Returns `None` when nothing changed, so callers can skip the write.
#[must_use]
pub fn check_daily_resets<R: Rng + ?Sized>(
    stats: &UserStats,
    today: NaiveDate,
    rng: &mut R,
) -> Option<UserStats> {
    let mut updated = stats.clone();
    refresh_mission(&mut updated, today, rng);

    if let Some(last) = updated.last_study_date {
        if days_between(last, today) > 1 && updated.streak_count > 0 {
            updated.streak_count = 0;
        }
    }

    (updated != *stats).then_some(updated)
}

/// Mark `today` as studied; a day before the last study day only fills the calendar.
fn record_study_day(stats: &mut UserStats, today: NaiveDate) {
    stats.study_calendar.insert(today);
    let gap = stats.last_study_date.map(|last| days_between(last, today));
    match gap {
        Some(gap) if gap <= 0 => return,
        Some(1) => stats.streak_count = stats.streak_count.saturating_add(1),
        _ => stats.streak_count = 1,
    }
    stats.last_study_date = Some(today);
}

fn refresh_mission<R: Rng + ?Sized>(stats: &mut UserStats, today: NaiveDate, rng: &mut R) {
    if stats.last_mission_date.is_some_and(|issued| issued >= today) {
        return;
    }
    stats.daily_mission = MISSION_CATALOG.choose(rng).map(|template| template.issue());
    stats.last_mission_date = Some(today);
}

/// Signed whole days from `earlier` to `later`; negative when `later` is before `earlier`.
fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
