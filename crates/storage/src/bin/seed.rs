use std::fmt;

use chrono::{DateTime, Duration, Utc};
use storage::repository::Storage;
use vocab_core::model::{Modality, Tier, UserId, VocabId, VocabularyDraft};

/// Built-in corpus: (tier, category, word, meaning).
const CORPUS: &[(u32, &str, &str, &str)] = &[
    (1, "noun", "apple", "りんご"),
    (1, "noun", "book", "本"),
    (1, "noun", "cat", "猫"),
    (1, "noun", "dog", "犬"),
    (1, "noun", "water", "水"),
    (1, "verb", "eat", "食べる"),
    (1, "verb", "go", "行く"),
    (1, "adjective", "big", "大きい"),
    (1, "adjective", "small", "小さい"),
    (1, "pronoun", "they", "彼らは"),
    (2, "noun", "school", "学校"),
    (2, "noun", "friend", "友達"),
    (2, "noun", "morning", "朝"),
    (2, "verb", "read", "読む"),
    (2, "verb", "write", "書く"),
    (2, "verb", "swim", "泳ぐ"),
    (2, "adjective", "happy", "幸せな"),
    (2, "adjective", "busy", "忙しい"),
    (2, "adverb", "often", "よく"),
    (2, "noun", "ice-cream", "アイスクリーム"),
    (3, "noun", "library", "図書館"),
    (3, "noun", "weather", "天気"),
    (3, "noun", "holiday", "休日"),
    (3, "verb", "borrow", "借りる"),
    (3, "verb", "remember", "覚えている"),
    (3, "verb", "arrive", "到着する"),
    (3, "adjective", "famous", "有名な"),
    (3, "adjective", "expensive", "高価な"),
    (3, "adverb", "already", "すでに"),
    (3, "conjunction", "because", "なぜなら"),
    (4, "noun", "experience", "経験"),
    (4, "noun", "environment", "環境"),
    (4, "noun", "opinion", "意見"),
    (4, "verb", "improve", "改善する"),
    (4, "verb", "protect", "守る"),
    (4, "verb", "decide", "決める"),
    (4, "adjective", "necessary", "必要な"),
    (4, "adjective", "similar", "似ている"),
    (4, "adverb", "probably", "おそらく"),
    (4, "noun", "language", "言語"),
    (5, "noun", "government", "政府"),
    (5, "noun", "research", "研究"),
    (5, "verb", "consider", "よく考える"),
    (5, "verb", "achieve", "達成する"),
    (5, "adjective", "ancient", "古代の"),
    (5, "adjective", "efficient", "効率的な"),
    (6, "noun", "hypothesis", "仮説"),
    (6, "verb", "emphasize", "強調する"),
    (6, "adjective", "ambiguous", "あいまいな"),
    (99, "phrase", "by the way", "ところで"),
];

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user: Option<UserId>,
    weak: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidWeak { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidWeak { raw } => write!(f, "invalid --weak value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LEARN_DB_URL")
            .unwrap_or_else(|_| "sqlite:vocab.sqlite3?mode=rwc".into());
        let mut user = std::env::var("LEARN_USER")
            .ok()
            .and_then(|value| UserId::new(value).ok());
        let mut weak = 0;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user = Some(
                        UserId::new(value.clone())
                            .map_err(|_| ArgsError::InvalidUser { raw: value })?,
                    );
                }
                "--weak" => {
                    let value = require_value(&mut args, "--weak")?;
                    weak = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidWeak { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user,
            weak,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:vocab.sqlite3?mode=rwc)");
    eprintln!("  --user <id>               User to seed weak words for");
    eprintln!("  --weak <n>                Number of weak words to file for --user (default: 0)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LEARN_DB_URL, LEARN_USER");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    // Fixed ids keep re-seeding idempotent.
    let mut items = Vec::with_capacity(CORPUS.len());
    for (index, (tier, category, word, meaning)) in (1_u64..).zip(CORPUS) {
        let item = VocabularyDraft::new(*word, *meaning)
            .with_category(*category)
            .with_tier(Tier::new(*tier))
            .validate(VocabId::new(index))?;
        storage.vocabulary.upsert_vocabulary(&item).await?;
        items.push(item);
    }

    let mut weak_seeded = 0;
    if let Some(user) = &args.user {
        let take = usize::try_from(args.weak).unwrap_or(usize::MAX);
        for (i, item) in items.iter().take(take).enumerate() {
            let modality = if i % 2 == 0 {
                Modality::Meaning
            } else {
                Modality::Spelling
            };
            let minutes = i64::try_from(i).unwrap_or(i64::MAX);
            storage
                .weak_words
                .upsert_miss(user, item, modality, now - Duration::minutes(minutes))
                .await?;
            weak_seeded += 1;
        }
    }

    println!(
        "Seeded {} vocabulary items and {} weak words into {}",
        items.len(),
        weak_seeded,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
