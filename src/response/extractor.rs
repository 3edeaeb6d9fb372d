use serde::ser::{Serialize, SerializeMap, Serializer};

use super::scanner::{next_step, Step, Token};

// ── Capture mapping ──────────────────────────────────────────────────────────

/// Tag name → accumulated text, in the order tags were first seen.
///
/// Replies carry a handful of tags, so lookups are a linear scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    entries: Vec<(String, String)>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == tag)
            .map(|(_, text)| text.as_str())
    }

    /// Append `text` to the entry for `tag`, creating it on first use.
    pub fn append(&mut self, tag: &str, text: &str) {
        match self.entries.iter_mut().find(|(name, _)| name == tag) {
            Some((_, existing)) => existing.push_str(text),
            None => self.entries.push((tag.to_string(), text.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl IntoIterator for Captures {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Captures {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut captures = Captures::new();
        for (k, v) in iter {
            captures.append(&k.into(), &v.into());
        }
        captures
    }
}

impl Serialize for Captures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ── Extractor state machine ──────────────────────────────────────────────────

/// Where the extractor is relative to the top-level tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    Inside,
}

/// Incremental extractor for one model reply.
///
/// Only text inside the top-level tag is captured, and only while some tag
/// is "currently open". There is no nesting stack: the most recently opened
/// tag receives the text, and closing any tag other than the top-level one
/// stops capture until the next tag opens.
#[derive(Debug, Clone)]
pub struct Extractor {
    top_level_tag: String,
    state: State,
    reading: Option<String>,
    captures: Captures,
    pending: String,
}

impl Extractor {
    pub fn new(top_level_tag: impl Into<String>) -> Self {
        Self {
            top_level_tag: top_level_tag.into(),
            state: State::Outside,
            reading: None,
            captures: Captures::new(),
            pending: String::new(),
        }
    }

    pub fn top_level_tag(&self) -> &str {
        &self.top_level_tag
    }

    /// Feed the next chunk of the reply. Chunks may split tags anywhere.
    pub fn feed(&mut self, chunk: &str) {
        self.pending.push_str(chunk);
        self.drain(false);
    }

    /// Flush anything held back and return the frozen capture mapping.
    pub fn finish(mut self) -> Captures {
        self.drain(true);
        self.captures
    }

    /// Captures gathered so far, excluding held-back partial markup.
    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    fn drain(&mut self, at_eof: bool) {
        let buffer = std::mem::take(&mut self.pending);
        let mut rest = buffer.as_str();
        while let Some(step) = next_step(rest, at_eof) {
            match step {
                Step::Token(token, len) => {
                    self.handle(token);
                    rest = &rest[len..];
                }
                Step::Skip(len) => rest = &rest[len..],
                Step::Incomplete => break,
            }
        }
        self.pending = rest.to_string();
    }

    fn handle(&mut self, token: Token<'_>) {
        match token {
            Token::Start(name) => self.start_tag(name),
            Token::End(name) => self.end_tag(name),
            Token::SelfClosing(name) => {
                self.start_tag(name);
                self.end_tag(name);
            }
            Token::Text(text) => self.text(text),
        }
    }

    fn start_tag(&mut self, name: &str) {
        if name == self.top_level_tag {
            self.state = State::Inside;
        }
        if self.state == State::Inside {
            self.reading = Some(name.to_string());
        }
    }

    fn end_tag(&mut self, name: &str) {
        if name == self.top_level_tag {
            self.state = State::Outside;
        }
        // Outside, nothing is being read anyway.
        self.reading = None;
    }

    fn text(&mut self, text: &str) {
        if self.state == State::Outside {
            return;
        }
        if let Some(tag) = &self.reading {
            self.captures.append(tag, text);
        }
    }
}

/// Scan a complete reply and return what the top-level tag held.
pub fn scan(text: &str, top_level_tag: &str) -> Captures {
    let mut extractor = Extractor::new(top_level_tag);
    extractor.feed(text);
    extractor.finish()
}
