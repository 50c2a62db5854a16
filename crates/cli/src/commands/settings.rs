use serde_json::json;

use crate::commands::{execute, CommandResult, GlobalArgs, Session};

#[derive(Debug, Clone, clap::Subcommand)]
pub enum SettingsCommand {
    #[command(about = "Show the current maximum extension days")]
    Show,
    #[command(about = "Change the maximum extension days (administrators only)")]
    SetMaxExtensionDays {
        #[arg(long = "as", value_name = "USER_ID")]
        actor: String,
        #[arg(value_name = "DAYS")]
        days: u32,
    },
}

pub fn run(globals: &GlobalArgs, command: SettingsCommand) -> CommandResult {
    execute("settings", globals, |config| async move {
        let session = Session::open(&config).await?;
        let result = match command {
            SettingsCommand::Show => {
                let days = session.desk.max_extension_days().await;
                CommandResult::success_with_data(
                    "settings",
                    format!("max extension days is {days}"),
                    Some(json!({ "max_extension_days": days })),
                )
            }
            SettingsCommand::SetMaxExtensionDays { actor, days } => {
                let call = session.call(&actor)?;
                match session.desk.set_max_extension_days(days, &call).await {
                    Ok(days) => CommandResult::success_with_data(
                        "settings",
                        format!("max extension days set to {days}"),
                        Some(json!({ "max_extension_days": days })),
                    ),
                    Err(error) => CommandResult::rejected("settings", error, &call.correlation_id),
                }
            }
        };
        session.close().await;
        Ok(result)
    })
}
