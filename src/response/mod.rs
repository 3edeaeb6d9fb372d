//! Recovering structured data from tagged model replies.
//!
//! Replies are expected to look like
//!
//! ```text
//! <response>
//! <response_body>
//! { ...json... }
//! </response_body>
//! </response>
//! ```
//!
//! but may carry prose around the envelope, stray tags, or wrapped JSON.
//! [`ResponseParser`] tolerates all of that and only fails when the body it
//! found is not JSON.

pub mod decoder;
pub mod extractor;
pub mod scanner;
pub mod strip;

pub use decoder::{
    decode, normalize_body, BodyDecoder, DecodeError, Record, DEFAULT_BODY_FIELD,
    DEFAULT_CONTEXT_FIELD,
};
pub use extractor::{scan, Captures, Extractor};
pub use strip::{strip_response, strip_tags};

/// Wrapper tag around the structured part of a reply.
pub const DEFAULT_TOP_LEVEL_TAG: &str = "response";

// ── ResponseParser ───────────────────────────────────────────────────────────

/// Parses one model reply, either whole or streamed in chunks.
///
/// ```
/// use call_analysis::response::ResponseParser;
///
/// let mut parser = ResponseParser::new();
/// parser.feed("Sure! <response><response_body>{\"a\":");
/// parser.feed(" 1}</response_body></response>");
/// let record = parser.into_record().unwrap();
/// assert_eq!(record.body(), Some(&serde_json::json!({"a": 1})));
/// ```
#[derive(Debug, Clone)]
pub struct ResponseParser {
    extractor: Extractor,
    decoder: BodyDecoder,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            extractor: Extractor::new(DEFAULT_TOP_LEVEL_TAG),
            decoder: BodyDecoder::default(),
        }
    }

    /// Use a different wrapper tag. Call before feeding.
    pub fn with_top_level_tag(mut self, tag: impl Into<String>) -> Self {
        self.extractor = Extractor::new(tag);
        self
    }

    /// Use different names for the JSON body and context fields.
    pub fn with_decoder(mut self, decoder: BodyDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn top_level_tag(&self) -> &str {
        self.extractor.top_level_tag()
    }

    pub fn feed(&mut self, chunk: &str) {
        self.extractor.feed(chunk);
    }

    /// Whether anything has been captured yet.
    pub fn has_values(&self) -> bool {
        !self.extractor.captures().is_empty()
    }

    /// Stop scanning and return the raw capture mapping.
    pub fn into_captures(self) -> Captures {
        self.extractor.finish()
    }

    /// Stop scanning and decode the body field.
    pub fn into_record(self) -> Result<Record, DecodeError> {
        let Self { extractor, decoder } = self;
        decoder.decode(extractor.finish())
    }
}

/// Scan and decode a complete reply with the default tag and field names.
pub fn parse_response(text: &str) -> Result<Record, DecodeError> {
    let mut parser = ResponseParser::new();
    parser.feed(text);
    parser.into_record()
}
