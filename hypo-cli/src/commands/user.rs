use anyhow::Result;
use clap::Args;

use super::build_client;
use crate::config::ConfigFlags;

#[derive(Debug, Args)]
pub struct UserArgs {
    /// Replace the persisted user id
    #[arg(long, value_name = "ID")]
    pub set: Option<String>,
}

pub fn run(args: UserArgs, flags: &ConfigFlags) -> Result<()> {
    let client = build_client(flags)?;
    if let Some(user_id) = args.set {
        client.set_user_id(&user_id);
    }
    println!("{}", client.user_id());
    Ok(())
}
