//! JSON dump of a finished mission.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::history::MissionHistory;
use crate::core::types::{MissionSpec, Outcome};

#[derive(Serialize)]
struct MissionDump<'a> {
    mission: &'a MissionSpec,
    outcome: Option<Outcome>,
    steps: &'a MissionHistory,
}

/// Atomically write the mission and its history as pretty JSON (temp file + rename).
pub fn write_history(
    path: &Path,
    mission: &MissionSpec,
    outcome: Option<Outcome>,
    history: &MissionHistory,
) -> Result<()> {
    let dump = MissionDump {
        mission,
        outcome,
        steps: history,
    };
    let mut buf = serde_json::to_string_pretty(&dump).context("serialize history")?;
    buf.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
