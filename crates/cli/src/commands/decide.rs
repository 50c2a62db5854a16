use serde_json::json;

use stressless_core::StressRequestId;

use crate::commands::{execute, to_data, CommandResult, GlobalArgs, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    fn command(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct DecideArgs {
    #[arg(long = "as", value_name = "USER_ID", help = "Administrator deciding the request")]
    pub actor: String,
    #[arg(value_name = "REQUEST_ID")]
    pub id: String,
    #[arg(long, help = "Comment recorded with the decision")]
    pub comments: Option<String>,
}

pub fn run(globals: &GlobalArgs, verdict: Verdict, args: DecideArgs) -> CommandResult {
    let command = verdict.command();
    execute(command, globals, |config| async move {
        let session = Session::open(&config).await?;
        let call = session.call(&args.actor)?;
        let id = StressRequestId(args.id.trim().to_owned());

        let outcome = match verdict {
            Verdict::Approve => session.desk.approve(&id, args.comments, &call).await,
            Verdict::Reject => session.desk.reject(&id, args.comments, &call).await,
        };
        let result = match outcome {
            Ok(transition) => {
                let changed = to_data(&transition.changed)?;
                CommandResult::success_with_data(
                    command,
                    format!("{id} {}", transition.kind.as_str()),
                    Some(json!({ "kind": transition.kind, "changed": changed })),
                )
            }
            Err(error) => CommandResult::rejected(command, error, &call.correlation_id),
        };
        session.close().await;
        Ok(result)
    })
}
