use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{format_transcript, Call, Ledger};
use crate::analysis::{Analyzer, Completion};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub analyzed: usize,
    pub skipped: usize,
    pub no_transcript: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Analyze every call not yet in the ledger, one at a time.
///
/// A call whose analysis fails is logged and left unmarked so the next run
/// retries it. Cancellation is checked between calls.
pub async fn run_batch<C: Completion>(
    calls: &[Call],
    ledger: &Ledger,
    analyzer: &Analyzer<C>,
    internal_company: &str,
    cancel: &CancellationToken,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for call in calls {
        if cancel.is_cancelled() {
            warn!("cancelled, stopping batch");
            summary.cancelled = true;
            break;
        }
        info!(call_id = %call.id, "processing call");

        if ledger.is_processed(&call.id) {
            info!(call_id = %call.id, "analysis already exists");
            summary.skipped += 1;
            continue;
        }

        let Some(transcript) = format_transcript(call, internal_company) else {
            warn!(call_id = %call.id, "no transcript found");
            ledger.mark_processed(&call.id)?;
            summary.no_transcript += 1;
            continue;
        };

        let analysis = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(call_id = %call.id, "cancelled during analysis");
                summary.cancelled = true;
                break;
            }
            result = analyzer.analyze(&transcript) => result,
        };

        match analysis {
            Ok(analysis) => {
                ledger.write_analysis(&call.id, &transcript, analysis.body())?;
                ledger.mark_processed(&call.id)?;
                info!(call_id = %call.id, "analysis saved");
                summary.analyzed += 1;
            }
            Err(e) => {
                error!(call_id = %call.id, error = %e, "analysis failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
