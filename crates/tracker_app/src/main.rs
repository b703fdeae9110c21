mod platform;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use tracker_core::{Msg, SiteId};

use platform::app::{self, RunOptions};
use platform::config::AppConfig;
use platform::logging::{self, LogDestination};

/// tracker - follow crawl tasks on a crawl service
///
/// Resumes tracked tasks from the state directory, polls their status until
/// they finish, and optionally keeps the site table in sync.
#[derive(Parser, Debug)]
#[command(name = "tracker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// RON config file (defaults to ./tracker.ron when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the crawl service
    #[arg(long, global = true, env = "TRACKER_BASE_URL")]
    base_url: Option<String>,

    /// Session cookie sent with every request, e.g. "sessionid=..."
    #[arg(long, global = true, env = "TRACKER_SESSION_COOKIE", hide_env_values = true)]
    session_cookie: Option<String>,

    /// CSRF token sent with POST requests
    #[arg(long, global = true, env = "TRACKER_CSRF_TOKEN", hide_env_values = true)]
    csrf_token: Option<String>,

    /// Directory holding the tracked-task registry
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Keep the site table in sync with the service
    #[arg(long, global = true)]
    list_sync: bool,

    /// Keep running when nothing is left to track
    #[arg(long, global = true)]
    follow: bool,

    /// Also write the log to ./tracker.log
    #[arg(long, global = true)]
    log_file: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Resume tracked tasks and watch them until they finish (default)
    Watch,
    /// Start a full crawl, then watch it
    StartFull,
    /// Start an update of the given sites, then watch them
    StartSingle {
        /// Site ids to update
        #[arg(required = true)]
        site_ids: Vec<SiteId>,
    },
    /// Stop every running crawl
    StopAll,
}

impl Command {
    fn messages(&self) -> Vec<Msg> {
        match self {
            Command::Watch => Vec::new(),
            Command::StartFull => vec![Msg::StartFullClicked],
            Command::StartSingle { site_ids } => site_ids
                .iter()
                .map(|&site_id| Msg::StartSingleClicked { site_id })
                .collect(),
            Command::StopAll => vec![Msg::StopAllClicked],
        }
    }
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(cookie) = &self.session_cookie {
            config.session_cookie = Some(cookie.clone());
        }
        if let Some(token) = &self.csrf_token {
            config.csrf_token = Some(token.clone());
        }
        if let Some(state_dir) = &self.state_dir {
            config.state_dir = state_dir.clone();
        }
        config.log_to_file |= self.log_file;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(LogDestination::from_flags(config.log_to_file, true), level);

    let command = cli.command.clone().unwrap_or(Command::Watch);
    app::run(
        &config,
        RunOptions {
            list_sync: cli.list_sync,
            follow: cli.follow,
            commands: command.messages(),
        },
    )
}
