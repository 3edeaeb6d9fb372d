// ── Tag stream scanner ───────────────────────────────────────────────────────

/// One lexical unit of a model reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `<name>` or `<name attr="ignored">`
    Start(&'a str),
    /// `</name>`
    End(&'a str),
    /// `<name/>`, reported as a start immediately followed by an end
    SelfClosing(&'a str),
    Text(&'a str),
}

/// Outcome of trying to read one token at the front of a buffer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step<'a> {
    /// A token and the number of bytes it consumed.
    Token(Token<'a>, usize),
    /// Markup with no lexical meaning (comments, declarations).
    Skip(usize),
    /// The buffer ends inside markup; wait for more input.
    Incomplete,
}

/// Read the next token at the start of `input`.
///
/// With `at_eof` false, a `<` whose markup is not closed yet yields
/// `Step::Incomplete`. With `at_eof` true the same bytes are literal text.
/// Returns `None` only for an empty buffer.
pub(crate) fn next_step(input: &str, at_eof: bool) -> Option<Step<'_>> {
    if input.is_empty() {
        return None;
    }
    if !input.starts_with('<') {
        // Text runs up to the next '<' (always an ASCII boundary).
        let end = input.find('<').unwrap_or(input.len());
        return Some(Step::Token(Token::Text(&input[..end]), end));
    }
    let step = match markup(input) {
        Markup::Token(tok, len) => Step::Token(tok, len),
        Markup::Skip(len) => Step::Skip(len),
        Markup::Unclosed if !at_eof => Step::Incomplete,
        Markup::Unclosed | Markup::Literal => Step::Token(Token::Text(&input[..1]), 1),
    };
    Some(step)
}

enum Markup<'a> {
    Token(Token<'a>, usize),
    Skip(usize),
    /// Looks like markup but the closing `>` has not arrived.
    Unclosed,
    /// The `<` is plain text (`a < b`, `<3`, an interrupted tag).
    Literal,
}

fn markup(input: &str) -> Markup<'_> {
    let bytes = input.as_bytes();
    match bytes.get(1) {
        None => Markup::Unclosed,
        Some(b'!') => declaration(input),
        Some(b'?') => match input.find('>') {
            Some(end) => Markup::Skip(end + 1),
            None => Markup::Unclosed,
        },
        Some(b'/') => match bytes.get(2) {
            None => Markup::Unclosed,
            Some(b) if b.is_ascii_alphabetic() => tag(input, 2, true),
            Some(_) => Markup::Literal,
        },
        Some(b) if b.is_ascii_alphabetic() => tag(input, 1, false),
        Some(_) => Markup::Literal,
    }
}

fn declaration(input: &str) -> Markup<'_> {
    if input.starts_with("<!--") {
        return match input[4..].find("-->") {
            Some(end) => Markup::Skip(4 + end + 3),
            None => Markup::Unclosed,
        };
    }
    // A partial "<!-" may still become a comment.
    if "<!--".starts_with(input) {
        return Markup::Unclosed;
    }
    match input.find('>') {
        Some(end) => Markup::Skip(end + 1),
        None => Markup::Unclosed,
    }
}

/// Read a start or end tag whose name begins at `name_start`.
fn tag(input: &str, name_start: usize, closing: bool) -> Markup<'_> {
    let rest = &input[name_start..];
    let name_len = rest
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>' || c == '<')
        .unwrap_or(rest.len());
    let name = &rest[..name_len];

    // The tag closes at the first '>', unless another '<' comes first.
    let after_name = name_start + name_len;
    let Some(close_rel) = input[after_name..].find(['>', '<']) else {
        return Markup::Unclosed;
    };
    let close = after_name + close_rel;
    if input.as_bytes()[close] == b'<' {
        return Markup::Literal;
    }

    let len = close + 1;
    let token = if closing {
        Token::End(name)
    } else if input[after_name..close].trim_end().ends_with('/') {
        Token::SelfClosing(name)
    } else {
        Token::Start(name)
    };
    Markup::Token(token, len)
}

/// Iterator over the tokens of a complete input.
///
/// ```
/// use call_analysis::response::scanner::{TagScanner, Token};
///
/// let tokens: Vec<_> = TagScanner::new("hi <b>there</b>").collect();
/// assert_eq!(tokens, vec![
///     Token::Text("hi "),
///     Token::Start("b"),
///     Token::Text("there"),
///     Token::End("b"),
/// ]);
/// ```
#[derive(Debug, Clone)]
pub struct TagScanner<'a> {
    rest: &'a str,
}

impl<'a> TagScanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { rest: input }
    }
}

impl<'a> Iterator for TagScanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            match next_step(self.rest, true)? {
                Step::Token(token, len) => {
                    self.rest = &self.rest[len..];
                    return Some(token);
                }
                Step::Skip(len) => self.rest = &self.rest[len..],
                // Never produced at EOF.
                Step::Incomplete => return None,
            }
        }
    }
}
