use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Experience needed per level.
pub const EXP_PER_LEVEL: u32 = 100;

/// Level reached with the given experience. Level 1 starts at 0 exp.
#[must_use]
pub fn level_for_exp(exp: u32) -> u32 {
    exp / EXP_PER_LEVEL + 1
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MissionError {
    #[error("unknown mission template: {0}")]
    UnknownTemplate(String),

    #[error("mission progress {progress} exceeds target {target}")]
    ProgressOverTarget { progress: u32, target: u32 },
}

//
// ─── MISSIONS ──────────────────────────────────────────────────────────────────
//

/// What a daily mission counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionKind {
    /// Questions answered in the test phase.
    Play,
    /// Correct answers in the test phase.
    Score,
}

/// Static definition a mission is issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissionTemplate {
    pub id: &'static str,
    pub kind: MissionKind,
    pub description: &'static str,
    pub target: u32,
    pub reward: u32,
}

pub const MISSION_CATALOG: [MissionTemplate; 3] = [
    MissionTemplate {
        id: "play_10",
        kind: MissionKind::Play,
        description: "Answer 10 questions",
        target: 10,
        reward: 50,
    },
    MissionTemplate {
        id: "play_20",
        kind: MissionKind::Play,
        description: "Answer 20 questions",
        target: 20,
        reward: 100,
    },
    MissionTemplate {
        id: "score_5",
        kind: MissionKind::Score,
        description: "Get 5 answers right",
        target: 5,
        reward: 30,
    },
];

impl MissionTemplate {
    #[must_use]
    pub fn find(id: &str) -> Option<&'static MissionTemplate> {
        MISSION_CATALOG.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn issue(&self) -> DailyMission {
        DailyMission {
            id: self.id.to_owned(),
            kind: self.kind,
            description: self.description.to_owned(),
            target: self.target,
            progress: 0,
            reward: self.reward,
        }
    }
}

/// Today's short-term goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMission {
    id: String,
    kind: MissionKind,
    description: String,
    target: u32,
    progress: u32,
    reward: u32,
}

impl DailyMission {
    /// Rehydrate a mission from storage, re-deriving kind/target/reward from the
    /// catalog.
    ///
    /// # Errors
    ///
    /// Returns `MissionError` for an unknown template id or progress over target.
    pub fn from_persisted(id: &str, progress: u32) -> Result<Self, MissionError> {
        let template =
            MissionTemplate::find(id).ok_or_else(|| MissionError::UnknownTemplate(id.to_owned()))?;
        if progress > template.target {
            return Err(MissionError::ProgressOverTarget {
                progress,
                target: template.target,
            });
        }
        let mut mission = template.issue();
        mission.progress = progress;
        Ok(mission)
    }

    /// Add progress, clamped at the target. Returns true on the transition to
    /// completed; already-completed missions never report it again.
    pub fn advance(&mut self, amount: u32) -> bool {
        if self.is_completed() {
            return false;
        }
        self.progress = self.progress.saturating_add(amount).min(self.target);
        self.is_completed()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> MissionKind {
        self.kind
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn target(&self) -> u32 {
        self.target
    }

    #[must_use]
    pub fn progress(&self) -> u32 {
        self.progress
    }

    #[must_use]
    pub fn reward(&self) -> u32 {
        self.reward
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.progress >= self.target
    }
}

//
// ─── USER STATS ────────────────────────────────────────────────────────────────
//

/// Per-user progression state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub exp: u32,
    pub streak_count: u32,
    pub last_study_date: Option<NaiveDate>,
    pub study_calendar: BTreeSet<NaiveDate>,
    pub daily_mission: Option<DailyMission>,
    pub last_mission_date: Option<NaiveDate>,
    pub total_correct: u32,
    pub total_study_seconds: u64,
}

impl UserStats {
    /// Always derived from `exp`.
    #[must_use]
    pub fn level(&self) -> u32 {
        level_for_exp(self.exp)
    }

    #[must_use]
    pub fn title(&self) -> LevelTitle {
        LevelTitle::for_level(self.level())
    }

    /// Mission that may be checked on `today`; stale missions are hidden.
    #[must_use]
    pub fn mission_for(&self, today: NaiveDate) -> Option<&DailyMission> {
        if self.last_mission_date == Some(today) {
            self.daily_mission.as_ref()
        } else {
            None
        }
    }

    /// Experience left until the next level.
    #[must_use]
    pub fn exp_to_next_level(&self) -> u32 {
        EXP_PER_LEVEL - self.exp % EXP_PER_LEVEL
    }
}

//
// ─── LEVEL TITLES ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LevelTitle {
    Apprentice,
    Adventurer,
    Explorer,
    Veteran,
    Expert,
    Master,
    Legend,
}

impl LevelTitle {
    #[must_use]
    pub fn for_level(level: u32) -> Self {
        match level {
            50.. => LevelTitle::Legend,
            40..=49 => LevelTitle::Master,
            30..=39 => LevelTitle::Expert,
            20..=29 => LevelTitle::Veteran,
            10..=19 => LevelTitle::Explorer,
            5..=9 => LevelTitle::Adventurer,
            _ => LevelTitle::Apprentice,
        }
    }
}

impl fmt::Display for LevelTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LevelTitle::Apprentice => "Apprentice",
            LevelTitle::Adventurer => "Adventurer",
            LevelTitle::Explorer => "Explorer",
            LevelTitle::Veteran => "Veteran",
            LevelTitle::Expert => "Expert",
            LevelTitle::Master => "Master",
            LevelTitle::Legend => "Legend",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_floor_of_exp_over_hundred_plus_one() {
        assert_eq!(level_for_exp(0), 1);
        assert_eq!(level_for_exp(99), 1);
        assert_eq!(level_for_exp(100), 2);
        assert_eq!(level_for_exp(1234), 13);
    }

    #[test]
    fn mission_advance_clamps_and_completes_once() {
        let mut mission = MissionTemplate::find("play_10").unwrap().issue();
        assert!(!mission.advance(4));
        assert!(mission.advance(9));
        assert_eq!(mission.progress(), 10);
        assert!(!mission.advance(3));
        assert_eq!(mission.progress(), 10);
    }

    #[test]
    fn persisted_mission_validates_template() {
        assert!(DailyMission::from_persisted("score_5", 2).is_ok());
        assert_eq!(
            DailyMission::from_persisted("nap_3", 0),
            Err(MissionError::UnknownTemplate("nap_3".into()))
        );
        assert!(DailyMission::from_persisted("score_5", 6).is_err());
    }

    #[test]
    fn stale_mission_is_hidden() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let stats = UserStats {
            daily_mission: Some(MISSION_CATALOG[0].issue()),
            last_mission_date: Some(day),
            ..UserStats::default()
        };
        assert!(stats.mission_for(day).is_some());
        assert!(stats.mission_for(day.succ_opt().unwrap()).is_none());
    }

    #[test]
    fn titles_follow_level_bands() {
        assert_eq!(LevelTitle::for_level(1), LevelTitle::Apprentice);
        assert_eq!(LevelTitle::for_level(5), LevelTitle::Adventurer);
        assert_eq!(LevelTitle::for_level(19), LevelTitle::Explorer);
        assert_eq!(LevelTitle::for_level(50), LevelTitle::Legend);
    }
}
