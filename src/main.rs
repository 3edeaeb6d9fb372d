use call_analysis::analysis::{Analyzer, AnthropicClient};
use call_analysis::calls::{self, Ledger, DEFAULT_INTERNAL_COMPANY};
use call_analysis::config::{self, Config};
use call_analysis::response::{DEFAULT_BODY_FIELD, DEFAULT_TOP_LEVEL_TAG};
use call_analysis::{parse, read_input, show_prompt, strip, write_analysis};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "call-analysis", version, about = "Analyze call transcripts with an LLM")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a model reply and print the recovered record as JSON
    Parse {
        /// Reply file (stdin when omitted)
        file: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_TOP_LEVEL_TAG)]
        tag: String,
        /// Field holding the JSON body
        #[arg(long, default_value = DEFAULT_BODY_FIELD)]
        field: String,
    },
    /// Remove every <tag>…</tag> span from a text
    Strip {
        /// Input file (stdin when omitted)
        file: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_TOP_LEVEL_TAG)]
        tag: String,
    },
    /// Print the instruction template sent before each transcript
    Prompt,
    /// Analyze a single transcript text file
    Analyze {
        /// Transcript file (stdin when omitted)
        transcript: Option<PathBuf>,
        /// Write the analysis JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyze every exported call in a directory that was not processed yet
    Run {
        /// Directory of call export JSON files
        #[arg(long)]
        calls: PathBuf,
        /// Output directory for analyses and processed markers
        #[arg(long, default_value = "calls")]
        out: PathBuf,
        /// Only calls started within this many days
        #[arg(long)]
        since_days: Option<i64>,
        /// Company appended to internal participants
        #[arg(long, default_value = DEFAULT_INTERNAL_COMPANY)]
        company: String,
    },
    /// Store the API key in the config file
    SetKey {
        key: String,
    },
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("call_analysis=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn analyzer(config: &Config) -> Result<Analyzer<AnthropicClient>> {
    config.require_api_key()?;
    let client = AnthropicClient::from_config(config)?;
    info!(model = client.model(), "using model");
    Ok(Analyzer::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config_file = cli.config.clone().or_else(config::config_path);

    match cli.command {
        Commands::Parse { file, tag, field } => parse(file.as_deref(), &tag, &field),
        Commands::Strip { file, tag } => strip(file.as_deref(), &tag),
        Commands::Prompt => show_prompt(),
        Commands::SetKey { key } => {
            let path = config_file.context("No config directory available; pass --config")?;
            config::save_api_key(&path, &key)?;
            println!("API key saved to {}", path.display());
            Ok(())
        }
        Commands::Analyze { transcript, out } => {
            let config = Config::load(config_file.as_deref())?;
            let text = read_input(transcript.as_deref())?;
            let analysis = analyzer(&config)?.analyze(&text).await?;
            write_analysis(&analysis, out.as_deref())
        }
        Commands::Run { calls: dir, out, since_days, company } => {
            let config = Config::load(config_file.as_deref())?;
            let analyzer = analyzer(&config)?;
            let since = since_days.map(|d| Utc::now() - Duration::days(d));
            let exported = calls::load_calls(&dir, since)?;
            let ledger = Ledger::open(out)?;
            info!(count = exported.len(), "calls to consider");

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            let summary = calls::run_batch(&exported, &ledger, &analyzer, &company, &cancel).await?;
            println!(
                "Analyzed: {}, skipped: {}, no transcript: {}, failed: {}",
                summary.analyzed, summary.skipped, summary.no_transcript, summary.failed
            );
            if summary.failed > 0 {
                anyhow::bail!("{} call(s) failed; rerun to retry them", summary.failed);
            }
            Ok(())
        }
    }
}
