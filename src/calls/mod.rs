//! Exported call records and their transcripts.

pub mod batch;
pub mod ledger;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub use batch::{run_batch, BatchSummary};
pub use ledger::Ledger;

/// Company name appended to internal participants' name plates.
pub const DEFAULT_INTERNAL_COMPANY: &str = "Caylent";

// ── Call export model ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    pub title: String,
    pub started: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub parties: Vec<Party>,
    #[serde(default)]
    pub monologues: Vec<Monologue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub speaker_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monologue {
    pub speaker_id: String,
    #[serde(default)]
    pub sentences: Vec<String>,
}

impl Party {
    /// Name, title and company as shown in the participant list.
    pub fn name_plate(&self, internal_company: &str) -> String {
        let mut plate = self.name.clone();
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            plate.push_str(&format!(" ({title})"));
        }
        if self.affiliation.as_deref() == Some("Internal") {
            plate.push_str(&format!(" - {internal_company}"));
        } else if self
            .email_address
            .as_deref()
            .is_some_and(|e| e.contains("amazon.com"))
        {
            plate.push_str(" - Amazon");
        }
        plate
    }
}

// ── Transcript formatting ────────────────────────────────────────────────────

/// Render a call as speaker-attributed text. `None` when nothing was said.
pub fn format_transcript(call: &Call, internal_company: &str) -> Option<String> {
    if call.monologues.is_empty() {
        return None;
    }

    // Only parties with a speaker id can be attributed.
    let speakers: Vec<&Party> = call.parties.iter().filter(|p| p.speaker_id.is_some()).collect();
    let names: HashMap<&str, &str> = speakers
        .iter()
        .filter_map(|p| Some((p.speaker_id.as_deref()?, p.name.as_str())))
        .collect();
    let plates: Vec<String> = speakers.iter().map(|p| p.name_plate(internal_company)).collect();

    let interactions: Vec<String> = call
        .monologues
        .iter()
        .map(|m| {
            let speaker = names.get(m.speaker_id.as_str()).copied().unwrap_or("Unknown speaker");
            format!("{speaker}:\n{}", m.sentences.join("\n"))
        })
        .collect();

    let mut transcript = format!("Title: {}\n\nCall Start Time: {}\n\n", call.title, call.started);
    transcript.push_str(&format!("Call URL: {}\n\n", call.url));
    transcript.push_str(&format!("Participants in the call:\n\n{}\n\n", plates.join("\n")));
    transcript.push_str(&interactions.join("\n\n"));
    Some(transcript)
}

// ── Loading ──────────────────────────────────────────────────────────────────

pub fn read_call(path: &Path) -> Result<Call> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read call at {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid call export at {}", path.display()))
}

/// Every `*.json` call export in `dir`, sorted by file name, keeping only
/// calls started at or after `since` when given.
pub fn load_calls(dir: &Path, since: Option<DateTime<Utc>>) -> Result<Vec<Call>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list calls in {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut calls = Vec::with_capacity(paths.len());
    for path in paths {
        let call = read_call(&path)?;
        if since.is_some_and(|s| call.started < s) {
            debug!(call_id = %call.id, "outside the requested window");
            continue;
        }
        calls.push(call);
    }
    Ok(calls)
}
