use anyhow::Result;

use crate::cli::BuildArgs;

use super::prepare;

/// Run one compile pass. Returns false when the result was emit-skipped.
pub fn cmd_build(args: &BuildArgs, json: bool) -> Result<bool> {
    let Some(mut compiler) = prepare(args, json, false)? else {
        return Ok(false);
    };
    let result = compiler.compile()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "event": "build_complete",
                "emitted": result.emitted_paths(),
                "errors": result.error_count(),
                "emit_skipped": result.emit_skipped,
            })
        );
    } else {
        let errors = result.error_count();
        eprintln!(
            "Emitted {} file(s), {} error(s){}",
            result.emitted_files.len(),
            errors,
            if result.emit_skipped { ", output skipped" } else { "" }
        );
    }
    Ok(!result.emit_skipped)
}
