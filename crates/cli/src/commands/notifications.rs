use serde_json::json;

use stressless_core::UserId;
use stressless_db::{NotificationRepository, SqlNotificationRepository};

use crate::commands::{
    execute, load_directory, open_pool, to_data, CommandResult, GlobalArgs, EXIT_DOMAIN,
    EXIT_RUNTIME,
};

#[derive(Debug, Clone, clap::Args)]
pub struct NotificationsArgs {
    #[arg(long = "as", value_name = "USER_ID")]
    pub actor: String,
    #[arg(long, help = "Only list notifications not yet read")]
    pub unread: bool,
    #[arg(long, help = "Mark the listed notifications as read")]
    pub mark_read: bool,
}

pub fn run(globals: &GlobalArgs, args: NotificationsArgs) -> CommandResult {
    execute("notifications", globals, |config| async move {
        let directory = load_directory(&config)?;
        let recipient = UserId(args.actor.trim().to_owned());
        if directory.user(&recipient).is_none() {
            return Err((
                "unknown_actor",
                format!("user `{recipient}` is not in the directory"),
                EXIT_DOMAIN,
            ));
        }

        let pool = open_pool(&config).await?;
        let repository = SqlNotificationRepository::new(pool.clone());
        let storage = |error: stressless_db::RepositoryError| ("storage", error.to_string(), EXIT_RUNTIME);

        let notifications =
            repository.list_for_recipient(&recipient, args.unread).await.map_err(storage)?;
        let marked = if args.mark_read {
            repository.mark_all_read(&recipient).await.map_err(storage)?
        } else {
            0
        };
        pool.close().await;

        let count = notifications.len();
        Ok(CommandResult::success_with_data(
            "notifications",
            format!("{count} notifications for {recipient}"),
            Some(json!({ "notifications": to_data(&notifications)?, "marked_read": marked })),
        ))
    })
}
