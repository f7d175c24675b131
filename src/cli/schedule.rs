use std::time::Duration;

use chrono::Utc;

use crate::errors::GateError;

use super::commands::{ScheduleAction, ScheduleArgs};
use super::gate::{load_config, open_scheduler};

pub async fn handle_schedule(args: ScheduleArgs) -> Result<(), GateError> {
    match args.action {
        ScheduleAction::List { config } => {
            let config = load_config(config.as_deref()).await?;
            let scheduler = open_scheduler(&config)?;
            let now = Utc::now();

            let entries = scheduler.store().list()?;
            if entries.is_empty() {
                println!("No images tracked");
                return Ok(());
            }
            for entry in entries {
                let due = if entry.is_due(now, None) { "due" } else { "ok" };
                let last = entry
                    .last_scanned
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                let outcome = entry
                    .last_outcome
                    .map(|o| o.as_str())
                    .unwrap_or("-");
                println!(
                    "{:<5} {} image={} last_scanned={} interval={}h outcome={}",
                    due,
                    entry.digest,
                    entry.image,
                    last,
                    entry.interval.as_secs() / 3600,
                    outcome
                );
            }
            Ok(())
        }
        ScheduleAction::Add {
            image,
            digest,
            interval_hours,
            config,
        } => {
            let config = load_config(config.as_deref()).await?;
            let scheduler = open_scheduler(&config)?;

            // Until a scan resolves the real digest, the image reference
            // stands in as the tracking key.
            let digest = digest.unwrap_or_else(|| image.clone());
            let interval = interval_hours.map(|h| Duration::from_secs(h * 3600));

            let entry = scheduler.register(&digest, &image, interval)?;
            println!(
                "Tracking {} (digest {}) every {}h",
                entry.image,
                entry.digest,
                entry.interval.as_secs() / 3600
            );
            Ok(())
        }
    }
}
