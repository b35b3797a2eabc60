use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::{AnalysisReport, ApiClient, UploadArtifact};
use crate::auth::{AuthManager, AuthState, TokenStore};
use crate::capture::{format_elapsed, CaptureConfig, CaptureEngine, MicBackend};
use crate::config::Config;
use crate::error::Result;
use crate::sessions::{recording_number, SessionSync};
use crate::submit::Submitter;

#[derive(Parser)]
#[command(
    name = "podium",
    about = "Practice presentations and get AI feedback on your delivery"
)]
pub struct Cli {
    /// Configuration file (TOML); defaults apply when absent
    #[arg(long, default_value = "config/podium")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in with an existing account
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Show the signed-in identity
    Whoami,
    /// Manage practice sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// List the recordings of a session
    Recordings {
        #[arg(long)]
        session: Option<i64>,
    },
    /// Submit an audio file for analysis
    Analyze {
        file: PathBuf,
        #[arg(long)]
        session: Option<i64>,
    },
    /// Record from the microphone and submit the take
    Record {
        #[arg(long)]
        session: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// List sessions, newest first
    List,
    /// Create a session and make it active
    Create { name: String },
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;

    let api = Arc::new(ApiClient::new(&config.api.base_url, config.api.timeout_secs)?);
    let token_path = match &config.storage.token_path {
        Some(path) => path.clone(),
        None => TokenStore::default_path()?,
    };
    let auth = Arc::new(AuthManager::new(Arc::clone(&api), TokenStore::new(token_path)));
    auth.initialize().await;

    let sessions = SessionSync::new(Arc::clone(&api));

    match cli.command {
        Command::Login { email, password } => {
            let user = auth.login(&email, &password).await?;
            println!("Signed in as {} <{}>", user.name, user.email);
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let user = auth.register(&name, &email, &password).await?;
            println!("Welcome, {}! You are signed in as {}", user.name, user.email);
        }
        Command::Logout => {
            auth.logout().await;
            println!("Signed out");
        }
        Command::Whoami => match auth.state().await {
            AuthState::Authenticated(user) => println!("{} <{}>", user.name, user.email),
            _ => println!("Not signed in"),
        },
        Command::Sessions { command } => match command {
            SessionCommand::List => {
                let list = sessions.list_sessions().await?;
                if list.is_empty() {
                    println!("No sessions yet");
                }
                let active = sessions.active_session().await;
                for session in &list {
                    let marker = if active.as_ref().map(|a| a.id) == Some(session.id) {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {:>4}  {}  ({})",
                        marker,
                        session.id,
                        session.name,
                        session.created_at.format("%Y-%m-%d")
                    );
                }
            }
            SessionCommand::Create { name } => {
                let session = sessions.create_session(&name).await?;
                println!("Created session '{}' ({})", session.name, session.id);
            }
        },
        Command::Recordings { session } => {
            activate(&sessions, session).await?;
            let recordings = sessions.recordings().await;
            if recordings.is_empty() {
                println!("No recordings yet in this session");
            }
            let total = recordings.len();
            for (index, recording) in recordings.iter().enumerate() {
                println!(
                    "Recording #{}  {}  clarity {:.1}/10, {:.0} wpm, {} fillers",
                    recording_number(index, total),
                    recording.created_at.format("%Y-%m-%d %H:%M"),
                    recording.metrics.clarity_score,
                    recording.metrics.words_per_minute,
                    recording.metrics.total_fillers
                );
            }
        }
        Command::Analyze { file, session } => {
            activate(&sessions, session).await?;
            let artifact = UploadArtifact::from_file(&file)?;
            let submitter = Submitter::new(Arc::clone(&auth), sessions.clone());
            let report = submitter.submit(Some(artifact)).await?;
            print_report(&report);
        }
        Command::Record { session } => {
            activate(&sessions, session).await?;

            let capture_config = CaptureConfig {
                sample_rate: config.capture.sample_rate,
                channels: config.capture.channels,
            };
            let mut engine = CaptureEngine::new(
                Box::new(MicBackend::new(capture_config.clone())),
                capture_config,
                config.capture.max_capture_secs,
            );

            engine.start().await?;
            println!("Recording... press Enter to stop");
            let mut line = String::new();
            BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
            engine.stop().await?;
            println!("Captured {}", engine.elapsed_display());

            let artifact = engine.finalize()?;
            let submitter = Submitter::new(Arc::clone(&auth), sessions.clone());
            let report = submitter.submit(Some(artifact)).await?;
            print_report(&report);
        }
    }

    Ok(())
}

/// Load the session list and, when requested, switch to a specific session.
async fn activate(sessions: &SessionSync, requested: Option<i64>) -> Result<()> {
    sessions.list_sessions().await?;
    if let Some(id) = requested {
        sessions.select_session(id).await?;
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    let metrics = &report.metrics;
    println!("Clarity score   {:.1}/10", metrics.clarity_score);
    println!(
        "Speaking pace   {:.0} wpm ({})",
        metrics.words_per_minute, metrics.pace_feedback
    );
    println!("Filler words    {}", metrics.total_fillers);
    println!("Long pauses     {}", metrics.long_pauses.len());
    println!(
        "Duration        {}",
        format_elapsed(metrics.duration.round() as u64)
    );
    if !report.ai_feedback.is_empty() {
        println!("\n{}", report.ai_feedback);
    }
}
