use crate::commands::{execute, open_pool, CommandResult, GlobalArgs};

pub fn run(globals: &GlobalArgs) -> CommandResult {
    execute("migrate", globals, |config| async move {
        let pool = open_pool(&config).await?;
        pool.close().await;
        Ok(CommandResult::success("migrate", "applied pending migrations"))
    })
}
