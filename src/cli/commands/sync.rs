//! Sync Command
//!
//! Run the pipeline and publish. With `--plan-only` this behaves like
//! `plan` but prints the full run report.

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

/// Returns the process exit code
pub async fn run(
    project_root: &Path,
    root: Option<&str>,
    plan_only: bool,
    json: bool,
) -> Result<i32> {
    let ctx = CommandContext::load(project_root)?.with_root(root)?;
    let pipeline = ctx.pipeline()?;

    let report = if plan_only {
        pipeline.plan().await?.report
    } else {
        pipeline.sync().await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.exit_code());
    }

    let out = Output::new();
    out.header(&format!("wikisync sync: {}", ctx.root()));
    out.report(&report);
    println!();
    if report.has_page_problems() {
        out.warning("Finished with pages that need attention");
    } else if plan_only {
        out.success("Plan computed, nothing published");
    } else {
        out.success("Documentation is in sync");
    }

    Ok(report.exit_code())
}
