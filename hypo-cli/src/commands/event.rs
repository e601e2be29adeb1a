//! Event command for reporting analytics events to the backend.

use anyhow::{Context, Result};
use clap::Args;
use hypo_client::{Delivery, EventOptions};

use super::build_client;
use crate::config::ConfigFlags;

/// Arguments for the `event` command
#[derive(Debug, Args)]
pub struct EventArgs {
    /// Event id
    pub event: String,

    /// Revenue attributed to the event
    #[arg(long)]
    pub revenue: Option<f64>,

    /// Deduplication key
    #[arg(short = 'k', long)]
    pub unique_key: Option<String>,

    /// Event time as Unix seconds
    #[arg(short, long)]
    pub timestamp: Option<i64>,
}

impl EventArgs {
    fn options(&self) -> EventOptions {
        EventOptions {
            revenue: self.revenue,
            unique_key: self.unique_key.clone(),
            unix_timestamp: self.timestamp,
        }
    }
}

/// Run the event command
pub async fn run(args: EventArgs, flags: &ConfigFlags) -> Result<()> {
    let client = build_client(flags)?;
    let delivery = client
        .event(&args.event, args.options())
        .await
        .with_context(|| format!("failed to report event {}", args.event))?;

    match delivery {
        Delivery::HandedOff => println!("Event {} handed off", args.event),
        Delivery::Response(_) => println!("Event {} acknowledged", args.event),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_carry_every_flag() {
        let args = EventArgs {
            event: "purchase".to_string(),
            revenue: Some(9.99),
            unique_key: Some("order-7".to_string()),
            timestamp: Some(1_700_000_000),
        };

        assert_eq!(
            args.options(),
            EventOptions::default()
                .revenue(9.99)
                .unique_key("order-7")
                .unix_timestamp(1_700_000_000)
        );
    }
}
