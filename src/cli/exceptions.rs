use std::path::Path;

use chrono::Utc;
use console::style;

use crate::errors::GateError;
use crate::exceptions::load_rules;

use super::commands::ExceptionsArgs;

pub async fn handle_exceptions(args: ExceptionsArgs) -> Result<(), GateError> {
    let rules = load_rules(Path::new(&args.file))?;
    if rules.is_empty() {
        println!("No exception rules in {}", args.file);
        return Ok(());
    }

    let now = Utc::now();
    for rule in &rules {
        if let Some(image) = &args.image {
            if !rule.in_scope(image) {
                continue;
            }
        }

        let status = if rule.is_expired(now) {
            style("EXPIRED").red()
        } else {
            style("ACTIVE").green()
        };
        let target = rule
            .cve_id
            .as_deref()
            .or(rule.package.as_deref())
            .unwrap_or("-");
        let scope = rule.scope.as_deref().unwrap_or("*");
        let expires = rule
            .expires
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<7} {:<22} scope={} expires={} -- {}",
            status, target, scope, expires, rule.justification
        );
    }
    Ok(())
}
