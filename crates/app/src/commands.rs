use std::io::Write;

use services::{ActiveSession, AppServices, SessionCompletion, SessionStart};
use tokio::io::{AsyncBufReadExt, BufReader};
use vocab_core::model::{Answer, CHOICE_COUNT, Modality, QuizMode, UserId};
use vocab_core::quiz::{Effect, Phase};

use crate::config::Config;

/// Run one interactive session on stdin and stdout.
pub async fn drill(app: &AppServices, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let loop_svc = app.session_loop();
    let start = loop_svc
        .start_session(&config.user, config.selection(), config.mode, config.count)
        .await?;
    let mut session = match start {
        SessionStart::Ready(session) => session,
        SessionStart::NothingToReview => {
            println!("No weak words to review for {} mode. Nice work!", config.mode);
            return Ok(());
        }
    };

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    print_phase_banner(session.phase());

    while !session.is_complete() {
        prompt(&session)?;
        let Some(line) = input.next_line().await? else {
            println!();
            println!("Session abandoned; nothing was saved.");
            return Ok(());
        };
        let Some(answer) = parse_answer(session.mode(), &line) else {
            match session.mode().modality() {
                Modality::Meaning => println!("  Enter a number from 1 to {CHOICE_COUNT}."),
                Modality::Spelling => println!("  Type the word."),
            }
            continue;
        };

        for effect in loop_svc.submit(&mut session, answer) {
            if let Effect::Feedback(feedback) = effect {
                if feedback.correct {
                    println!("  ✓ Correct");
                } else {
                    println!("  ✗ Answer: {}", feedback.expected);
                }
            }
        }

        let step = loop_svc.advance(&mut session).await;
        for effect in &step.effects {
            if let Effect::PhaseChanged(phase) = effect {
                print_phase_banner(*phase);
            }
        }
        if let Some(completion) = &step.completion {
            print_summary(completion);
        }
    }

    Ok(())
}

fn prompt(session: &ActiveSession) -> std::io::Result<()> {
    let Some(question) = session.current_question() else {
        return Ok(());
    };
    let (index, len) = session.progress().position.unwrap_or((0, 0));
    println!();
    println!("[{} {}/{}]", session.phase(), index + 1, len);

    match session.mode() {
        QuizMode::Choice => {
            println!("  {}", question.item().word());
            for (i, choice) in question.choices().iter().enumerate() {
                println!("    {}) {}", i + 1, choice.label());
            }
        }
        QuizMode::Spelling | QuizMode::SpellingEasy => {
            println!("  {}", question.item().meaning());
            if let Some(hint) = session.current_hint() {
                println!("  hint: {hint}");
            }
        }
    }
    print!("> ");
    std::io::stdout().flush()
}

fn parse_answer(mode: QuizMode, line: &str) -> Option<Answer> {
    let line = line.trim();
    match mode {
        QuizMode::Choice => match line.parse::<usize>() {
            Ok(n) if (1..=CHOICE_COUNT).contains(&n) => Some(Answer::Choice(n - 1)),
            _ => None,
        },
        QuizMode::Spelling | QuizMode::SpellingEasy if line.is_empty() => None,
        QuizMode::Spelling | QuizMode::SpellingEasy => Some(Answer::text(line)),
    }
}

fn print_phase_banner(phase: Phase) {
    println!();
    match phase {
        Phase::Practice => println!("── Practice: warm up, nothing is scored ──"),
        Phase::Test => println!("── Test: every answer counts ──"),
        Phase::Review => println!("── Review: one more look at the words you missed ──"),
        Phase::Result => println!("── Result ──"),
    }
}

fn print_summary(completion: &SessionCompletion) {
    let outcome = &completion.outcome;
    println!(
        "Score: {}/{}{}",
        outcome.score,
        outcome.total_questions,
        if outcome.is_perfect() { "  Perfect!" } else { "" }
    );
    if !outcome.missed.is_empty() {
        println!("Missed:");
        for item in &outcome.missed {
            println!("  {} = {}", item.word(), item.meaning());
        }
    }

    match &completion.progression {
        Some(progress) => {
            println!(
                "+{} exp  (level {} {}, streak {})",
                progress.exp_gained,
                progress.stats.level(),
                progress.stats.title(),
                progress.stats.streak_count
            );
            if progress.leveled_up {
                println!("Level up!");
            }
            if progress.mission_completed {
                println!("Daily mission complete!");
            }
        }
        None => println!("Progress could not be saved this time."),
    }
    if !completion.record_saved {
        println!("Session history could not be saved this time.");
    }
}

/// Print the user's weak words for one modality.
pub async fn list_weak(
    app: &AppServices,
    user: &UserId,
    modality: Modality,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = app.weak_words().list(user, modality).await?;
    if entries.is_empty() {
        println!("No weak words for {modality}.");
        return Ok(());
    }
    println!("Weak words ({modality}), most recent first:");
    for entry in entries {
        let types: Vec<&str> = entry.weak_types().iter().map(Modality::as_str).collect();
        println!(
            "  {:<16} {:<20} tier {}  [{}]  {}",
            entry.item().word(),
            entry.item().meaning(),
            entry.tier(),
            types.join(", "),
            entry.last_missed().format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Print level, streak, today's mission and recent sessions.
pub async fn show_stats(app: &AppServices, user: &UserId) -> Result<(), Box<dyn std::error::Error>> {
    let progression = app.progression();
    let stats = progression.check_daily_resets(user).await?;
    let today = progression.today();

    println!("Level {} {} ({} exp)", stats.level(), stats.title(), stats.exp);
    println!("  {} exp to next level", stats.exp_to_next_level());
    println!("  streak: {} day(s)", stats.streak_count);
    println!("  study days: {}", stats.study_calendar.len());
    println!("  correct answers: {}", stats.total_correct);
    println!("  study time: {} min", stats.total_study_seconds / 60);

    match stats.mission_for(today) {
        Some(mission) => println!(
            "Today's mission: {} ({}/{}){}",
            mission.description(),
            mission.progress(),
            mission.target(),
            if mission.is_completed() { " ✓" } else { "" }
        ),
        None => println!("Today's mission: start a session to receive one"),
    }

    let weak = app.weak_words().count(user).await?;
    println!("Weak words: {weak}");

    let recent = app.session_loop().recent_sessions(user, 5).await?;
    if !recent.is_empty() {
        println!("Recent sessions:");
        for record in recent {
            println!(
                "  {}  {:<13} {:<8} {}/{}",
                record.recorded_at().format("%Y-%m-%d %H:%M"),
                record.mode().as_str(),
                record.selection().to_string(),
                record.score(),
                record.total_questions()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_input_is_one_based() {
        assert_eq!(parse_answer(QuizMode::Choice, " 2 "), Some(Answer::Choice(1)));
        assert_eq!(parse_answer(QuizMode::Choice, "0"), None);
        assert_eq!(parse_answer(QuizMode::Choice, "apple"), None);
    }

    #[test]
    fn blank_spelling_input_is_not_an_answer() {
        assert_eq!(parse_answer(QuizMode::Spelling, "   "), None);
        assert_eq!(parse_answer(QuizMode::SpellingEasy, ""), None);
        assert_eq!(
            parse_answer(QuizMode::Spelling, " apple "),
            Some(Answer::text("apple"))
        );
    }
}
