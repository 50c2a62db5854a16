pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

use commands::decide::{DecideArgs, Verdict};
use commands::list::ListArgs;
use commands::notifications::NotificationsArgs;
use commands::settings::SettingsCommand;
use commands::submit::SubmitArgs;
use commands::{load_config, GlobalArgs};
use stressless_core::config::{AppConfig, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "stressless",
    about = "Facility stress request desk",
    long_about = "Submit, review, and inspect facility stress requests. Approving a request whose scope already has an active marking merges the two.",
    after_help = "Examples:\n  stressless migrate\n  stressless submit --as user-ops-1 --facility facility-1 --function fm_pickup --days 5 --reason \"Space Stress\"\n  stressless approve --as user-admin-1 SR-...\n  stressless list --as user-admin-1 --in-force"
)]
pub struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the demo stress requests into an empty database")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Submit a stress request for review")]
    Submit(SubmitArgs),
    #[command(about = "Approve a pending request, merging it into an active marking if one exists")]
    Approve(DecideArgs),
    #[command(about = "Reject a pending request")]
    Reject(DecideArgs),
    #[command(about = "List stress requests visible to a user")]
    List(ListArgs),
    #[command(about = "List a user's notifications")]
    Notifications(NotificationsArgs),
    #[command(about = "Inspect or change engine settings", subcommand)]
    Settings(SettingsCommand),
}

/// Installs a stderr subscriber so stdout stays a single JSON payload. A
/// second call in the same process is ignored.
pub fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(log_level).with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    if let Ok(config) = load_config(&cli.globals) {
        init_logging(&config);
    }

    let globals = &cli.globals;
    let result = match cli.command {
        Command::Migrate => commands::migrate::run(globals),
        Command::Seed => commands::seed::run(globals),
        Command::Config => commands::config::run(globals),
        Command::Submit(args) => commands::submit::run(globals, args),
        Command::Approve(args) => commands::decide::run(globals, Verdict::Approve, args),
        Command::Reject(args) => commands::decide::run(globals, Verdict::Reject, args),
        Command::List(args) => commands::list::run(globals, args),
        Command::Notifications(args) => commands::notifications::run(globals, args),
        Command::Settings(command) => commands::settings::run(globals, command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
