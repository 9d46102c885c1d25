//! Replays a recorded channel transcript through the session core.
//!
//! One event per line:
//!
//! ```text
//! # comment
//! storage open
//! storage message [{"name":"bisque","type":"profile","data":[[0,25],[3600,950]]}]
//! user select bisque
//! user run
//! status message {"state":"RUNNING","runtime":10,"totaltime":3600,"temperature":30,"target":31,"heat":1}
//! status close
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use embassy_futures::select::select;
use embassy_futures::{block_on, yield_now};
use kiln_session::profile::TableColumn;
use kiln_session::reconciler::{ChannelKind, InboundEvent, RecordingTransport};
use kiln_session::session::UserIntent;
use kiln_session::system::LogPresenter;
use kiln_session::{InboundQueue, IntentQueue, KilnSession, Waypoint};
use log::info;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Kiln session transcript replay")]
struct Args {
    /// Transcript file, one channel event or user intent per line
    transcript: PathBuf,
    /// Log filter used when RUST_LOG is unset or empty (e.g. debug)
    #[arg(long, default_value = "info")]
    log: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Channel(InboundEvent),
    User(UserIntent),
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok(), &args.log)?)
        .init();

    let text = std::fs::read_to_string(&args.transcript)
        .with_context(|| format!("reading {}", args.transcript.display()))?;
    let steps = parse_transcript(&text)?;
    info!("Replaying {} events from {}", steps.len(), args.transcript.display());

    let inbound = InboundQueue::new();
    let intents = IntentQueue::new();
    let mut session = KilnSession::new(RecordingTransport::default(), LogPresenter);

    let feed = async {
        for step in steps {
            match step {
                Step::Channel(event) => inbound.send(event).await,
                Step::User(intent) => intents.send(intent).await,
            }
            // Let the session handle each event before the next one is queued
            yield_now().await;
        }
    };
    block_on(select(session.run(&inbound, &intents), feed));
    session.drain(&inbound, &intents);

    info!("Final state: {:?}", session.session_state());
    match session.selected_profile_summary() {
        Some(summary) => info!("Selected: {}", summary),
        None => info!("No profile selected"),
    }
    if let Some(progress) = session.run_progress() {
        info!(
            "Progress {:.0}% elapsed {} remaining {}",
            progress.percent, progress.elapsed, progress.remaining
        );
    }
    info!(
        "Live series: {} samples, {} frames sent",
        session.live_series().measured.len(),
        session.transport().frames.len()
    );

    Ok(())
}

/// RUST_LOG when set, otherwise the `--log` fallback.
fn log_filter(rust_log: Option<String>, fallback: &str) -> Result<EnvFilter> {
    let directives = match rust_log {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ => fallback.to_string(),
    };
    EnvFilter::try_new(&directives).with_context(|| format!("bad log filter '{}'", directives))
}

fn parse_transcript(text: &str) -> Result<Vec<Step>> {
    text.lines()
        .enumerate()
        .map(|(number, line)| (number + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| parse_line(line).with_context(|| format!("line {}", number)))
        .collect()
}

fn parse_line(line: &str) -> Result<Step> {
    let (head, rest) = split_word(line);

    if head == "user" {
        return parse_intent(rest).map(Step::User);
    }

    let channel = ChannelKind::parse(head).ok_or_else(|| anyhow!("unknown channel '{}'", head))?;
    let (verb, payload) = split_word(rest);
    let event = match verb {
        "open" => InboundEvent::opened(channel),
        "close" => InboundEvent::closed(channel),
        "message" if !payload.is_empty() => InboundEvent::message(channel, payload),
        "message" => bail!("message without payload"),
        other => bail!("unknown channel verb '{}'", other),
    };
    Ok(Step::Channel(event))
}

fn parse_intent(text: &str) -> Result<UserIntent> {
    let (verb, rest) = split_word(text);
    let args: Vec<&str> = rest.split_whitespace().collect();

    let intent = match (verb, args.as_slice()) {
        ("select", _) if !rest.is_empty() => UserIntent::SelectProfile(rest.to_string()),
        ("new", []) => UserIntent::EnterNew,
        ("edit", _) if !rest.is_empty() => UserIntent::EnterEdit(rest.to_string()),
        ("leave", []) => UserIntent::LeaveEdit,
        ("save", _) if !rest.is_empty() => UserIntent::Save {
            name: rest.to_string(),
        },
        ("add", [temperature]) => UserIntent::AddPoint {
            temperature: number(temperature)?,
        },
        ("upsert", [index, time, temperature]) => UserIntent::UpsertPoint {
            index: index.parse().context("point index")?,
            point: Waypoint::new(number(time)?, number(temperature)?),
        },
        ("cell", [row, column, value]) => UserIntent::EditCell {
            row: row.parse().context("row")?,
            column: match *column {
                "time" => TableColumn::Time,
                "temp" | "temperature" => TableColumn::Temperature,
                other => bail!("unknown column '{}'", other),
            },
            value: number(value)?,
        },
        ("remove", []) => UserIntent::RemovePoint,
        ("run", []) => UserIntent::Run,
        ("pause", []) => UserIntent::Pause,
        ("simulate", []) => UserIntent::Simulate,
        ("stop", []) => UserIntent::Stop,
        ("delete", []) => UserIntent::DeleteSelected,
        ("confirm", ["yes"]) => UserIntent::ConfirmOverwrite(true),
        ("confirm", ["no"]) => UserIntent::ConfirmOverwrite(false),
        _ => bail!("unknown intent '{}'", text),
    };
    Ok(intent)
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    }
}

fn number(text: &str) -> Result<f64> {
    text.parse()
        .with_context(|| format!("'{}' is not a number", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_lines() {
        assert_eq!(
            parse_line("storage open").unwrap(),
            Step::Channel(InboundEvent::opened(ChannelKind::Storage))
        );
        assert_eq!(
            parse_line(r#"status message {"state": "IDLE"}"#).unwrap(),
            Step::Channel(InboundEvent::message(
                ChannelKind::Status,
                r#"{"state": "IDLE"}"#
            ))
        );
        assert!(parse_line("status message").is_err());
        assert!(parse_line("serial open").is_err());
    }

    #[test]
    fn test_parse_intents() {
        assert_eq!(
            parse_line("user select cone 6 glaze").unwrap(),
            Step::User(UserIntent::SelectProfile("cone 6 glaze".to_string()))
        );
        assert_eq!(
            parse_line("user upsert 2 600 150").unwrap(),
            Step::User(UserIntent::UpsertPoint {
                index: 2,
                point: Waypoint::new(600.0, 150.0)
            })
        );
        assert_eq!(
            parse_line("user cell 0 temp 90").unwrap(),
            Step::User(UserIntent::EditCell {
                row: 0,
                column: TableColumn::Temperature,
                value: 90.0
            })
        );
        assert!(parse_line("user add hot").is_err());
        assert!(parse_line("user launch").is_err());
    }

    #[test]
    fn test_log_fallback_only_without_rust_log() {
        use tracing_subscriber::filter::LevelFilter;

        let filter = log_filter(Some("warn".to_string()), "debug").unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));

        let filter = log_filter(None, "debug").unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = log_filter(Some("  ".to_string()), "info").unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_transcript_skips_comments_and_reports_line() {
        let steps = parse_transcript("# header\n\nuser run\nuser stop\n").unwrap();
        assert_eq!(steps.len(), 2);

        let err = parse_transcript("user run\nuser fly\n").unwrap_err();
        assert_eq!(err.to_string(), "line 2");
    }
}
