//! Fuzz target for raw tool dispatch.
//!
//! Feeds arbitrary tool names and JSON argument text through
//! `ToolBox::dispatch` against a database without the dataset table. Every
//! call must end in a reply or a typed error.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tempfile::TempDir;

use campaign_insights::audit::UsageLog;
use campaign_insights::storage::SqliteStorage;
use campaign_insights::tools::{TOOL_NAMES, ToolBox};

#[derive(Arbitrary, Debug)]
struct ToolInput {
    /// Index into the known tool names; out of range picks `raw_name`
    tool_index: u8,
    raw_name: String,
    /// Argument object as JSON text
    args_json: String,
}

fuzz_target!(|input: ToolInput| {
    let Ok(args) = serde_json::from_str::<serde_json::Value>(&input.args_json) else {
        return;
    };
    let temp_dir = match TempDir::new() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let name = TOOL_NAMES
        .get(usize::from(input.tool_index))
        .map(|s| s.to_string())
        .unwrap_or(input.raw_name);

    let toolbox = ToolBox::new(
        SqliteStorage::new(temp_dir.path().join("absent.db")),
        UsageLog::new(),
        temp_dir.path().join("out"),
    );
    let _ = toolbox.dispatch(&name, args);
});
