pub mod client;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::response::{strip_tags, BodyDecoder, DecodeError, Record, ResponseParser};

pub use client::{AnthropicClient, LlmError, SseDecoder};

// ── Instruction template ─────────────────────────────────────────────────────

pub const PROMPT_CONTEXT: &str = r#"Your job is to analyze the call data and provide insights about the call. Always provide quotes from the call that support your analysis, and always attribute them.

ONLY use the following formats as your response:

Example Call Analysis:

<response>
<response_body>
{
    "call_type": "other",
    "title": "Call Title",
    "date": "2022-01-01T12:00:00Z",
    "url": "https://gong.io/call",
    "participants": [
        {
            "name": "John Doe",
            "role": "CEO",
            "company": "ACME Inc."
        },
        {
            "name": "Jack Johnson",
            "role": "Project Manager",
            "company": "Caylent"
        }
    ],
    "summary": "The call was about...",
    "next_steps": [
        {
            "action_item": "Follow up with the client",
            "responsible": "John Doe"
        }
    ],
    "notable_mentions": [
        {
            "quote": "We are looking for a company that can help us...",
            "speaker": "John Doe"
        }
    ]
}
</response_body>
</response>

DO NOT PROVIDE ANY OTHER INFORMATION IN YOUR RESPONSE. ONLY THE RESPONSE OBJECT WITH VALID JSON IN THE RESPONSE BODY!!!

Transcript:
"#;

/// The full prompt sent for one transcript.
pub fn build_prompt(transcript: &str) -> String {
    format!("{PROMPT_CONTEXT}\n\n{transcript}")
}

// ── Completion seam ──────────────────────────────────────────────────────────

/// Text deltas of one model reply, in order.
pub type DeltaStream = BoxStream<'static, Result<String, LlmError>>;

/// Anything that can answer a prompt with a stream of text.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn stream(&self, prompt: &str) -> Result<DeltaStream, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model reply did not follow the response format: {0}")]
    Decode(#[from] DecodeError),
}

// ── Analyzer ─────────────────────────────────────────────────────────────────

/// Result of analyzing one transcript.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub record: Record,
    /// The raw reply as received.
    pub reply: String,
    top_level_tag: String,
}

impl Analysis {
    /// The decoded analysis object, if the reply carried one.
    pub fn body(&self) -> Option<&Value> {
        self.record.body()
    }

    /// Whatever the model wrote around the envelope.
    pub fn prose(&self) -> String {
        strip_tags(&self.reply, &self.top_level_tag).trim().to_string()
    }
}

pub struct Analyzer<C> {
    client: C,
    top_level_tag: Option<String>,
    decoder: BodyDecoder,
}

impl<C: Completion> Analyzer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            top_level_tag: None,
            decoder: BodyDecoder::default(),
        }
    }

    pub fn with_top_level_tag(mut self, tag: impl Into<String>) -> Self {
        self.top_level_tag = Some(tag.into());
        self
    }

    pub fn with_decoder(mut self, decoder: BodyDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    fn parser(&self) -> ResponseParser {
        let parser = ResponseParser::new().with_decoder(self.decoder.clone());
        match &self.top_level_tag {
            Some(tag) => parser.with_top_level_tag(tag.clone()),
            None => parser,
        }
    }

    /// Send `transcript` to the model and decode its reply as it streams in.
    #[instrument(skip_all, fields(transcript_chars = transcript.len()))]
    pub async fn analyze(&self, transcript: &str) -> Result<Analysis, AnalysisError> {
        let prompt = build_prompt(transcript);
        let mut parser = self.parser();
        let top_level_tag = parser.top_level_tag().to_string();
        let mut reply = String::new();

        info!("requesting analysis");
        let mut deltas = self.client.stream(&prompt).await?;
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            parser.feed(&delta);
            reply.push_str(&delta);
        }
        debug!(reply_chars = reply.len(), "reply received");

        let record = parser.into_record().inspect_err(|e| {
            warn!(field = %e.field, error = %e.source, "reply body is not valid JSON");
        })?;
        let analysis = Analysis {
            record,
            reply,
            top_level_tag,
        };

        if analysis.body().is_none() {
            warn!("reply carried no response body");
        }
        let prose = analysis.prose();
        if !prose.is_empty() {
            debug!(%prose, "model wrote text outside the response envelope");
        }
        Ok(analysis)
    }
}
