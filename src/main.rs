#![forbid(unsafe_code)]

//! `pattern-jam` — command-line front end for collaborative jam sessions.
//!
//! Every subcommand maps onto one session manager operation and prints its
//! result as pretty JSON. Mutating commands wait for any refresh they armed
//! before the process exits.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use pattern_jam::models::channel::{ChannelPayload, ChannelStatus};
use pattern_jam::models::invite::InviteDecision;
use pattern_jam::models::user::UserSummary;
use pattern_jam::{AppError, GlobalConfig, Result, SessionManager};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum StatusArg {
    Draft,
    Live,
    Published,
}

impl From<StatusArg> for ChannelStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Draft => Self::Draft,
            StatusArg::Live => Self::Live,
            StatusArg::Published => Self::Published,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum DecisionArg {
    Accept,
    Decline,
}

impl From<DecisionArg> for InviteDecision {
    fn from(value: DecisionArg) -> Self {
        match value {
            DecisionArg::Accept => Self::Accept,
            DecisionArg::Decline => Self::Decline,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "pattern-jam",
    about = "Collaborative live-coding sessions",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register or update a user account.
    User {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        artist: Option<String>,
    },
    /// Create a session owned by `owner`.
    Create { owner: String, title: String },
    /// Print a session snapshot.
    Show {
        session: String,
        /// Bypass the snapshot cache.
        #[arg(long)]
        force: bool,
    },
    /// Join a session.
    Join { session: String, user: String },
    /// Leave a session.
    Leave { session: String, user: String },
    /// Create or update the caller's channel.
    Channel {
        session: String,
        user: String,
        /// Pattern source.
        code: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        element: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long)]
        volume: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        pan: Option<f64>,
    },
    /// Change a channel's status.
    Publish {
        session: String,
        channel: String,
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// Replace the master code directly.
    Override {
        session: String,
        user: String,
        code: String,
    },
    /// Set the session's apply delay in milliseconds.
    Delay {
        session: String,
        #[arg(allow_hyphen_values = true)]
        ms: i64,
    },
    /// Close a session to further edits.
    Close { session: String, user: String },
    /// Delete a session and everything in it.
    Delete { session: String, user: String },
    /// Invite users into a session.
    Invite {
        session: String,
        inviter: String,
        #[arg(required = true)]
        invitees: Vec<String>,
    },
    /// Accept or decline an invite.
    Respond {
        invite: String,
        user: String,
        #[arg(value_enum)]
        decision: DecisionArg,
    },
    /// List a user's pending invites.
    Invites { user: String },
    /// List a user's recent sessions.
    Sessions {
        user: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Recompute the master immediately.
    Recompute { session: String },
    /// Show a channel's revision history.
    History {
        channel: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if config.is_memory_database() {
        info!("using an in-memory database; nothing will persist");
    }
    debug!(database = %config.database_path, "configuration loaded");

    let manager = SessionManager::connect(config).await?;
    let result = dispatch(&manager, args.command).await;

    manager.flush().await;
    manager.shutdown().await;
    result
}

async fn dispatch(manager: &SessionManager, command: Command) -> Result<()> {
    match command {
        Command::User { id, name, artist } => {
            let user = UserSummary {
                id,
                name,
                artist_name: artist,
            };
            print_json(&manager.register_user(user).await?)
        }
        Command::Create { owner, title } => {
            print_json(&*manager.create_session(&owner, &title).await?)
        }
        Command::Show { session, force } => {
            print_json(&*manager.get_session_snapshot(&session, force).await?)
        }
        Command::Join { session, user } => {
            print_json(&*manager.join_session(&session, &user).await?)
        }
        Command::Leave { session, user } => {
            print_json(&*manager.leave_session(&session, &user).await?)
        }
        Command::Channel {
            session,
            user,
            code,
            id,
            element,
            name,
            status,
            volume,
            pan,
        } => {
            let payload = ChannelPayload {
                id,
                element_id: element,
                name,
                status: status.map(ChannelStatus::from),
                code,
                volume,
                pan,
                metadata: None,
            };
            manager.upsert_channel(&session, &user, payload).await?;
            manager.flush().await;
            print_json(&*manager.get_session_snapshot(&session, true).await?)
        }
        Command::Publish {
            session,
            channel,
            status,
        } => {
            manager
                .publish_channel(&session, &channel, status.into())
                .await?;
            manager.flush().await;
            print_json(&*manager.get_session_snapshot(&session, true).await?)
        }
        Command::Override {
            session,
            user,
            code,
        } => print_json(&*manager.override_master_code(&session, &user, &code).await?),
        Command::Delay { session, ms } => {
            print_json(&*manager.adjust_delay(&session, ms).await?)
        }
        Command::Close { session, user } => {
            print_json(&*manager.close_session(&session, &user).await?)
        }
        Command::Delete { session, user } => {
            manager.delete_session(&session, &user).await?;
            print_json(&serde_json::json!({ "deleted": session }))
        }
        Command::Invite {
            session,
            inviter,
            invitees,
        } => print_json(&manager.send_invites(&session, &inviter, &invitees).await?),
        Command::Respond {
            invite,
            user,
            decision,
        } => print_json(
            &manager
                .respond_to_invite(&invite, &user, decision.into())
                .await?,
        ),
        Command::Invites { user } => print_json(&manager.list_user_invites(&user).await?),
        Command::Sessions { user, limit } => {
            print_json(&manager.list_recent_sessions(&user, limit).await?)
        }
        Command::Recompute { session } => {
            let session_id = manager
                .resolve(&session)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("session {session} not found")))?;
            print_json(&manager.recompute_master(&session_id).await?)
        }
        Command::History { channel, limit } => {
            print_json(&manager.channel_history(&channel, limit).await?)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
