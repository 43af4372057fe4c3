//! Feedback Command
//!
//! Queue a reader correction for a page, or list the queue.

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::feedback::FeedbackQueue;
use crate::types::{PageKey, Result};

pub fn submit(project_root: &Path, page_key: &str, correction: &str) -> Result<()> {
    let ctx = CommandContext::load(project_root)?;
    let queue = FeedbackQueue::new(ctx.open_db()?);
    let feedback = queue.submit(PageKey::new(page_key), correction)?;

    Output::new().success(&format!(
        "Queued feedback {} for {}; it is forwarded after the next sync",
        &feedback.id[..8],
        feedback.page_key
    ));
    Ok(())
}

pub fn list(project_root: &Path, pending_only: bool) -> Result<()> {
    let ctx = CommandContext::load(project_root)?;
    let queue = FeedbackQueue::new(ctx.open_db()?);
    let items = if pending_only {
        queue.pending()?
    } else {
        queue.all()?
    };

    if items.is_empty() {
        println!("  No feedback");
        return Ok(());
    }

    for item in items {
        let state = match item.forwarded_at {
            Some(at) => format!("forwarded {}", at.format("%Y-%m-%d %H:%M UTC")),
            None => "pending".to_string(),
        };
        println!("  {} [{}] {}", item.page_key, state, item.correction);
    }
    Ok(())
}
