use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use approvebot_core::{parse_commands, Comment, LabelSet};
use approvebot_engine::{
    Event, EventKind, HostSnapshot, InMemoryHost, Outcome, ReviewTrigger, StaticOwnership,
    TriggerConfig, Write, CONFIG_ENV,
};

/// approvebot: review consensus for change requests
#[derive(Parser, Debug)]
#[command(name = "approvebot")]
#[command(about = "Review consensus tooling for change requests", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the review commands recognised in a comment body
    Parse(ParseArgs),
    /// Replay an event against a snapshot and print the resulting writes
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct ParseArgs {
    /// Comment body; read from stdin when omitted
    body: Option<String>,

    /// Read the comment body from a file
    #[arg(long, conflicts_with = "body")]
    file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Review-trigger configuration file
    #[arg(long, env = CONFIG_ENV)]
    config: PathBuf,

    /// JSON snapshot of the change request, its comments and ownership
    #[arg(long)]
    snapshot: PathBuf,

    /// Event to replay
    #[arg(long, value_enum)]
    event: SimulatedEvent,

    /// Comment author, for `--event comment`
    #[arg(long, required_if_eq("event", "comment"))]
    author: Option<String>,

    /// Comment body, for `--event comment`
    #[arg(long, required_if_eq("event", "comment"))]
    body: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SimulatedEvent {
    Opened,
    Synchronized,
    Comment,
    CiPassed,
    CiFailed,
}

/// Snapshot file contents: host state plus declared ownership.
#[derive(Debug, Deserialize)]
struct SimulationInput {
    #[serde(flatten)]
    host: HostSnapshot,
    #[serde(default)]
    ownership: StaticOwnership,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    writes: Vec<Write>,
    labels: LabelSet,
    comments: Vec<Comment>,
}

fn read_input(path: &Path) -> Result<SimulationInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse snapshot {}", path.display()))
}

fn run_parse(args: ParseArgs) -> Result<()> {
    let body = match (args.body, args.file) {
        (Some(body), _) => body,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?,
    };

    let tokens: Vec<&str> = parse_commands(&body).iter().map(|c| c.token()).collect();
    println!("{}", serde_json::to_string(&tokens)?);
    Ok(())
}

async fn run_simulate(args: SimulateArgs) -> Result<()> {
    let config = TriggerConfig::load(&args.config)?;
    let input = read_input(&args.snapshot)?;
    let pr = input.host.request.pr.clone();

    let host = Arc::new(InMemoryHost::from_snapshot(config.bot(), input.host));
    let trigger = ReviewTrigger::new(host.clone(), Arc::new(input.ownership), config);

    let kind = match args.event {
        SimulatedEvent::Opened => EventKind::PullRequestOpened,
        SimulatedEvent::Synchronized => EventKind::PullRequestSynchronized,
        SimulatedEvent::CiPassed => EventKind::CiStatusChanged { passed: true },
        SimulatedEvent::CiFailed => EventKind::CiStatusChanged { passed: false },
        SimulatedEvent::Comment => {
            let (Some(author), Some(body)) = (args.author, args.body) else {
                bail!("--author and --body are required for a comment event");
            };
            let comment = host.post(&pr, &author, &body).await;
            EventKind::CommentCreated { comment }
        }
    };

    info!("Simulating {:?} on {}", args.event, pr);
    let result = trigger.handle_event(&Event::new(pr.clone(), kind)).await;

    let (outcome, error) = match result {
        Ok(outcome) => (Some(outcome), None),
        Err(err) => (None, Some(format!("{:#}", anyhow::Error::from(err)))),
    };
    let failed = error.is_some();

    let report = SimulationReport {
        outcome,
        error,
        writes: host.writes().await,
        labels: host.labels(&pr).await,
        comments: host.comments(&pr).await,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if failed {
        bail!("event handling failed");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Parse(args) => run_parse(args),
        Commands::Simulate(args) => run_simulate(args).await,
    }
}
