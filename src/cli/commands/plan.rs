//! Plan Command
//!
//! Compute the mutation plan without publishing anything.

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

/// Returns the process exit code
pub async fn run(project_root: &Path, root: Option<&str>, json: bool) -> Result<i32> {
    let ctx = CommandContext::load(project_root)?.with_root(root)?;
    let preview = ctx.pipeline()?.plan().await?;

    if json {
        println!("{}", preview.plan.to_json()?);
    } else {
        let out = Output::new();
        out.header(&format!("wikisync plan: {}", ctx.root()));
        out.plan(&preview.plan);
        out.report(&preview.report);
        if preview.plan.is_noop() {
            println!();
            out.success("Nothing to publish");
        }
    }

    Ok(preview.report.exit_code())
}
