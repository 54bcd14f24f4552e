use std::fmt;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use vocab_core::model::{QuizMode, Selection, Tier, UserId};

pub const DEFAULT_DB_URL: &str = "sqlite:vocab.sqlite3";
pub const DEFAULT_USER: &str = "local";
pub const DEFAULT_TIER: u32 = 4;
pub const DEFAULT_COUNT: usize = 10;

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidTier { raw: String },
    InvalidMode { raw: String },
    InvalidCount { raw: String },
    InvalidUtcOffset { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidTier { raw } => {
                write!(f, "invalid --tier value: {raw} (expected a number, `weak` or -1)")
            }
            ArgsError::InvalidMode { raw } => {
                write!(f, "invalid --mode value: {raw} (choice, spelling, spelling_easy)")
            }
            ArgsError::InvalidCount { raw } => write!(f, "invalid --count value: {raw}"),
            ArgsError::InvalidUtcOffset { raw } => {
                write!(f, "invalid --utc-offset value: {raw} (minutes east of UTC)")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

/// Which words a drill draws from, before the user is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierArg {
    Max(Tier),
    Weak,
}

impl TierArg {
    fn parse(raw: &str) -> Result<Self, ArgsError> {
        match raw.trim() {
            "weak" | "-1" => Ok(Self::Weak),
            value => value
                .parse::<u32>()
                .map(|tier| Self::Max(Tier::new(tier)))
                .map_err(|_| ArgsError::InvalidTier {
                    raw: raw.to_owned(),
                }),
        }
    }

    #[must_use]
    pub fn selection(self, user: &UserId) -> Selection {
        match self {
            Self::Max(tier) => Selection::MaxTier(tier),
            Self::Weak => Selection::WeakWords(user.clone()),
        }
    }
}

/// Runtime settings, from `LEARN_*` variables overridden by flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_url: String,
    pub user: UserId,
    pub tier: TierArg,
    pub mode: QuizMode,
    pub count: usize,
    pub utc_offset: FixedOffset,
}

impl Config {
    /// Resolve settings from an environment lookup and the remaining flags.
    ///
    /// Malformed environment values are errors too, reported under the flag name.
    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("LEARN_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_owned());
        let mut user = env("LEARN_USER").unwrap_or_else(|| DEFAULT_USER.to_owned());
        let mut tier = env("LEARN_TIER")
            .map(|raw| TierArg::parse(&raw))
            .transpose()?
            .unwrap_or(TierArg::Max(Tier::new(DEFAULT_TIER)));
        let mut mode = env("LEARN_MODE")
            .map(|raw| parse_mode(&raw))
            .transpose()?
            .unwrap_or(QuizMode::Choice);
        let mut count = env("LEARN_COUNT")
            .map(|raw| parse_count(&raw))
            .transpose()?
            .unwrap_or(DEFAULT_COUNT);
        let mut utc_offset = env("LEARN_UTC_OFFSET_MINUTES")
            .map(|raw| parse_utc_offset(&raw))
            .transpose()?
            .unwrap_or_else(vocab_core::time::utc_offset);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => db_url = require_value(args, "--db")?,
                "--user" => user = require_value(args, "--user")?,
                "--tier" => tier = TierArg::parse(&require_value(args, "--tier")?)?,
                "--mode" => mode = parse_mode(&require_value(args, "--mode")?)?,
                "--count" => count = parse_count(&require_value(args, "--count")?)?,
                "--utc-offset" => {
                    utc_offset = parse_utc_offset(&require_value(args, "--utc-offset")?)?;
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if db_url.trim().is_empty() {
            return Err(ArgsError::InvalidDbUrl { raw: db_url });
        }
        let user = UserId::new(user.clone()).map_err(|_| ArgsError::InvalidUser { raw: user })?;

        Ok(Self {
            db_url: normalize_sqlite_url(db_url),
            user,
            tier,
            mode,
            count,
            utc_offset,
        })
    }

    #[must_use]
    pub fn selection(&self) -> Selection {
        self.tier.selection(&self.user)
    }
}

fn parse_mode(raw: &str) -> Result<QuizMode, ArgsError> {
    raw.trim().parse().map_err(|_| ArgsError::InvalidMode {
        raw: raw.to_owned(),
    })
}

fn parse_count(raw: &str) -> Result<usize, ArgsError> {
    match raw.trim().parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ArgsError::InvalidCount {
            raw: raw.to_owned(),
        }),
    }
}

fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ArgsError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ArgsError::InvalidUtcOffset {
            raw: raw.to_owned(),
        })
}

/// Turn relative `sqlite:` paths into absolute `sqlite://` URLs.
#[must_use]
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file and its directory so the first connect succeeds.
///
/// # Errors
///
/// Returns `ArgsError::InvalidDbUrl` for URLs without a path, or the I/O error
/// from creating the file.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let invalid = || ArgsError::InvalidDbUrl {
        raw: db_url.to_owned(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid().into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(env: &[(&str, &str)], args: &[&str]) -> Result<Config, ArgsError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        let mut args = args.iter().map(|a| (*a).to_owned());
        Config::resolve(|key| env.get(key).cloned(), &mut args)
    }

    #[test]
    fn defaults_apply_without_env_or_flags() {
        let config = resolve(&[], &[]).unwrap();
        assert!(config.db_url.starts_with("sqlite://"));
        assert!(config.db_url.ends_with("vocab.sqlite3"));
        assert_eq!(config.user.as_str(), "local");
        assert_eq!(config.tier, TierArg::Max(Tier::new(4)));
        assert_eq!(config.mode, QuizMode::Choice);
        assert_eq!(config.count, 10);
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
    }

    #[test]
    fn flags_override_env() {
        let config = resolve(
            &[("LEARN_MODE", "spelling"), ("LEARN_COUNT", "5")],
            &["--mode", "spelling_easy", "--tier", "weak", "--utc-offset", "540"],
        )
        .unwrap();
        assert_eq!(config.mode, QuizMode::SpellingEasy);
        assert_eq!(config.count, 5);
        assert_eq!(config.tier, TierArg::Weak);
        assert_eq!(config.utc_offset.local_minus_utc(), 540 * 60);
        assert_eq!(config.selection(), Selection::WeakWords(config.user.clone()));
    }

    #[test]
    fn minus_one_tier_means_weak_words() {
        let config = resolve(&[("LEARN_TIER", "-1")], &[]).unwrap();
        assert_eq!(config.tier, TierArg::Weak);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            resolve(&[], &["--count", "0"]),
            Err(ArgsError::InvalidCount { .. })
        ));
        assert!(matches!(
            resolve(&[], &["--mode", "hard"]),
            Err(ArgsError::InvalidMode { .. })
        ));
        assert!(matches!(
            resolve(&[("LEARN_TIER", "x")], &[]),
            Err(ArgsError::InvalidTier { .. })
        ));
        assert!(matches!(
            resolve(&[], &["--utc-offset", "100000"]),
            Err(ArgsError::InvalidUtcOffset { .. })
        ));
        assert!(matches!(
            resolve(&[], &["--user", "  "]),
            Err(ArgsError::InvalidUser { .. })
        ));
        assert!(matches!(
            resolve(&[], &["--db"]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(
            resolve(&[], &["--verbose"]),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/vocab.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/vocab.db"));
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
    }
}
