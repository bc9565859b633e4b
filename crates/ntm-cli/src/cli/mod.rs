//! CLI entry and dispatch.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ntm_core::api::types::{Frequency, TaskId};
use ntm_core::app::App;
use ntm_core::config::{self, API_BASE_URL_ENV};
use ntm_core::logging;
use ntm_core::storage::FileTokenStore;

mod commands;
mod toasts;

use toasts::ToastPrinter;

#[derive(Parser)]
#[command(name = "ntm")]
#[command(version)]
#[command(about = "Schedule AI prompts and manage their runs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (overrides the config file)
    #[arg(long, global = true, env = API_BASE_URL_ENV, value_name = "URL")]
    api_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in with an emailed one-time code
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Code from the email; prompts for it when omitted
        #[arg(long)]
        code: Option<String>,
    },
    /// Email a login code without verifying it
    SendCode {
        #[arg(value_name = "EMAIL")]
        email: String,
    },
    /// Log out and forget the stored token
    Logout,
    /// Validate the stored token and show the logged-in user
    Whoami,
    /// Manage scheduled tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Schedule fields shared by `create` and `update`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ScheduleArgs {
    /// How often the task runs (once, daily, weekly, monthly, yearly)
    #[arg(long)]
    pub frequency: Option<Frequency>,
    /// Time of day, HH:MM
    #[arg(long, value_name = "HH:MM")]
    pub time: Option<String>,
    /// Date for once/yearly tasks, YYYY-MM-DD
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<String>,
    /// Weekday for weekly tasks (mon..sun)
    #[arg(long, value_name = "DAY")]
    pub day_of_week: Option<String>,
    /// Day of month for monthly tasks (1-31)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=31))]
    pub day_of_month: Option<u8>,
    /// IANA timezone, e.g. Asia/Shanghai
    #[arg(long, value_name = "ZONE")]
    pub timezone: Option<String>,
}

#[derive(clap::Subcommand)]
enum TaskCommands {
    /// List your tasks
    List,
    /// Show one task as JSON
    Show {
        #[arg(value_name = "TASK_ID")]
        id: TaskId,
    },
    /// Create a task
    Create {
        /// Task name
        #[arg(long)]
        name: String,
        /// Prompt sent to the AI on every run
        #[arg(long)]
        prompt: String,
        /// Enable expert mode
        #[arg(long)]
        expert: bool,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Update fields of a task
    Update {
        #[arg(value_name = "TASK_ID")]
        id: TaskId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        /// Turn expert mode on or off
        #[arg(long, value_name = "BOOL")]
        expert: Option<bool>,
        /// Enable or disable the task
        #[arg(long, value_name = "BOOL")]
        active: Option<bool>,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Delete a task
    Delete {
        #[arg(value_name = "TASK_ID")]
        id: TaskId,
    },
    /// Enable a disabled task or disable an enabled one
    Toggle {
        #[arg(value_name = "TASK_ID")]
        id: TaskId,
    },
    /// Run a task now and wait for the result
    Test {
        #[arg(value_name = "TASK_ID")]
        id: TaskId,
    },
    /// Show recent runs of a task
    Runs {
        #[arg(value_name = "TASK_ID")]
        id: TaskId,
        /// Number of runs to fetch (default from config)
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults (for xtask)
    Generate,
    /// Point the client at another backend origin
    SetOrigin {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Config commands must work even when the config file is broken.
    if let Commands::Config { command } = cli.command {
        return run_config(command);
    }

    let mut config = config::Config::load().context("load config")?;
    if let Some(url) = cli.api_url {
        config.api.base_url = Some(url);
    }
    let _log_guard = logging::init(&config.logging)?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli.command, config).await })
}

fn run_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            commands::config::path();
            Ok(())
        }
        ConfigCommands::Init => commands::config::init(),
        ConfigCommands::Generate => commands::config::generate(),
        ConfigCommands::SetOrigin { url } => commands::config::set_origin(&url),
    }
}

async fn dispatch(command: Commands, config: config::Config) -> Result<()> {
    let store = Arc::new(FileTokenStore::default_location());
    let app = App::new(config, store)?;
    let mut events = app.subscribe();
    let printer = ToastPrinter::start(app.toasts());

    let result = match command {
        Commands::Login { email, code } => {
            commands::auth::login(&app, &email, code.as_deref()).await
        }
        Commands::SendCode { email } => commands::auth::send_code(&app, &email).await,
        Commands::Logout => commands::auth::logout(&app).await,
        Commands::Whoami => commands::auth::whoami(&app).await,

        Commands::Tasks { command } => match command {
            TaskCommands::List => commands::tasks::list(&app).await,
            TaskCommands::Show { id } => commands::tasks::show(&app, id).await,
            TaskCommands::Create {
                name,
                prompt,
                expert,
                schedule,
            } => commands::tasks::create(&app, name, prompt, expert, schedule).await,
            TaskCommands::Update {
                id,
                name,
                prompt,
                expert,
                active,
                schedule,
            } => {
                let patch = commands::tasks::patch_from_args(name, prompt, expert, active, schedule);
                commands::tasks::update(&app, id, &patch).await
            }
            TaskCommands::Delete { id } => commands::tasks::delete(&app, id).await,
            TaskCommands::Toggle { id } => commands::tasks::toggle(&app, id).await,
            TaskCommands::Test { id } => commands::tasks::test(&app, id).await,
            TaskCommands::Runs { id, limit } => commands::tasks::runs(&app, id, limit).await,
        },

        Commands::Config { command } => run_config(command),
    };

    app.drain_events(&mut events);
    printer.finish();
    result
}
