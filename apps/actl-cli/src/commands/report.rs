// report.rs — `action-control report`: list the actions every repository uses.

use tracing::info;

use actl_report::renderer_for;

use crate::commands::{github_client, require_target};
use crate::config::AppConfig;
use crate::driver::Driver;

pub fn execute(config: &AppConfig) -> anyhow::Result<()> {
    let (token, target) = require_target(config)?;
    let client = github_client(config, token)?;

    info!("Scanning {target}...");
    let outcome = Driver::new(&client, config.workers).collect_actions(&target)?;

    let rendered = renderer_for(config.output_format).render_usage(&outcome.results)?;
    println!("{rendered}");

    outcome.warn_skipped();
    Ok(())
}
