pub mod analysis;
pub mod calls;
pub mod config;
pub mod response;

pub use analysis::{Analysis, Analyzer, AnthropicClient, Completion, PROMPT_CONTEXT};
pub use config::Config;
pub use response::{parse_response, strip_tags, Captures, DecodeError, Record, ResponseParser};

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use response::{BodyDecoder, DEFAULT_CONTEXT_FIELD};

/// Read a file, or stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => fs::read_to_string(p)
            .with_context(|| format!("Failed to read {}", p.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Parse a model reply into a record.
pub fn parse_reply(text: &str, tag: &str, field: &str) -> Result<Record> {
    let mut parser = ResponseParser::new()
        .with_top_level_tag(tag)
        .with_decoder(BodyDecoder::new(field, DEFAULT_CONTEXT_FIELD));
    parser.feed(text);
    Ok(parser.into_record()?)
}

pub fn parse(path: Option<&Path>, tag: &str, field: &str) -> Result<()> {
    let text = read_input(path)?;
    let record = parse_reply(&text, tag, field)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

pub fn strip(path: Option<&Path>, tag: &str) -> Result<()> {
    let text = read_input(path)?;
    print!("{}", strip_tags(&text, tag));
    io::stdout().flush().ok();
    Ok(())
}

pub fn show_prompt() -> Result<()> {
    print!("{PROMPT_CONTEXT}");
    io::stdout().flush().ok();
    Ok(())
}

/// Write the decoded analysis to `out`, or stdout.
pub fn write_analysis(analysis: &Analysis, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(&analysis.body())?;
    match out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            println!("Analysis saved to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
