use anyhow::{Context, Result};
use clap::Args;
use hypo_client::Assignment;

use super::build_client;
use crate::config::ConfigFlags;

#[derive(Debug, Args)]
pub struct AssignArgs {
    /// Experiment id
    pub experiment: String,

    /// Ignore the cached assignment and ask the backend
    #[arg(short, long)]
    pub force: bool,
}

pub async fn run(args: AssignArgs, flags: &ConfigFlags) -> Result<()> {
    let client = build_client(flags)?;
    let assignment = client
        .group_assignment_with(&args.experiment, args.force)
        .await
        .with_context(|| format!("failed to resolve assignment for {}", args.experiment))?;

    print!("{}", format_assignment(&assignment));
    Ok(())
}

fn format_assignment(assignment: &Assignment) -> String {
    let mut out = format!(
        "Experiment: {}\nGroup:      {}\n",
        assignment.experiment_id, assignment.group
    );
    if let Some(user) = &assignment.user {
        out.push_str(&format!("User:       {}\n", user));
    }
    if let Some(reason) = &assignment.reason_code {
        out.push_str(&format!("Reason:     {}\n", reason));
    }
    out.push_str(&format!(
        "Expires:    {}\n",
        assignment.expiration_time.to_rfc3339()
    ));
    out
}
