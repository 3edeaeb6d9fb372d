use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// On-disk bookkeeping for a batch run.
///
/// ```text
/// <root>/analysis/<id>-transcript.txt
/// <root>/analysis/<id>-analysis.json
/// <root>/processed/<id>          (empty marker)
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    root: PathBuf,
}

impl Ledger {
    /// Open the ledger at `root`, creating its directories if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let ledger = Self { root: root.into() };
        for dir in [ledger.analysis_dir(), ledger.processed_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(ledger)
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.root.join("analysis")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    fn marker(&self, call_id: &str) -> PathBuf {
        self.processed_dir().join(call_id)
    }

    pub fn is_processed(&self, call_id: &str) -> bool {
        self.marker(call_id).exists()
    }

    pub fn mark_processed(&self, call_id: &str) -> Result<()> {
        let path = self.marker(call_id);
        fs::write(&path, "").with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn transcript_path(&self, call_id: &str) -> PathBuf {
        self.analysis_dir().join(format!("{call_id}-transcript.txt"))
    }

    pub fn analysis_path(&self, call_id: &str) -> PathBuf {
        self.analysis_dir().join(format!("{call_id}-analysis.json"))
    }

    /// Save the transcript and the decoded analysis (`null` when absent).
    pub fn write_analysis(&self, call_id: &str, transcript: &str, body: Option<&Value>) -> Result<()> {
        let transcript_path = self.transcript_path(call_id);
        fs::write(&transcript_path, transcript)
            .with_context(|| format!("Failed to write {}", transcript_path.display()))?;

        let analysis_path = self.analysis_path(call_id);
        let json = serde_json::to_string_pretty(body.unwrap_or(&Value::Null))?;
        fs::write(&analysis_path, json)
            .with_context(|| format!("Failed to write {}", analysis_path.display()))
    }
}
