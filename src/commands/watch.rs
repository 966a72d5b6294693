use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::cli::BuildArgs;

use super::prepare;

/// Seed, then recompile on change until Ctrl+C. Returns false when the
/// seeding pass was emit-skipped.
pub fn cmd_watch(args: &BuildArgs, json: bool) -> Result<bool> {
    let Some(mut compiler) = prepare(args, json, true)? else {
        return Ok(false);
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })?;

    let seeded = compiler.watch()?;
    if compiler.watcher_count() == 0 && seeded.error_count() > 0 {
        return Ok(false);
    }
    compiler.run_watch(running)?;
    Ok(!seeded.emit_skipped)
}
