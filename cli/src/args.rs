//! CLI argument definitions

use clap::{Parser, ValueEnum};
use council_infrastructure::FileConfig;
use std::path::PathBuf;

/// How events are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Server-Sent-Event frames (`data: <json>`)
    Sse,
    /// One JSON object per line
    Ndjson,
}

/// CLI arguments for council
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about = "LLM council - models answer, rank each other anonymously, and a lead synthesizes")]
#[command(long_about = r#"
Council runs one deliberation round over a question.

The round has three stages:
1. Answers: every member model answers the question in parallel
2. Peer ranking: each member ranks the anonymized answers
3. Synthesis: the lead model writes the final answer from all of the above

Events are streamed to stdout as they happen; logs go to stderr.
The OpenRouter API key is read from OPENROUTER_API_KEY.

Configuration files are loaded from (in priority order):
1. COUNCIL_* environment variables (e.g. COUNCIL_BACKEND__MAX_RETRIES=5)
2. --config <path>     Explicit config file
3. ./council.toml      Project-level config
4. ~/.config/council/config.toml   Global config

Example:
  council "What's the best way to handle errors in Rust?"
  council -m openai/gpt-5.1 -m x-ai/grok-4 --lead openai/gpt-5.1 "Compare async runtimes"
  council --show-round 3f2b9c1e-8d4a-4c6e-9a57-0e1d2c3b4a59
"#)]
pub struct Cli {
    /// The question to put to the council
    pub question: Option<String>,

    /// Members to include, a subset of the configured ones (repeatable)
    #[arg(short, long, value_name = "MODEL")]
    pub model: Vec<String>,

    /// Lead model for the final synthesis
    #[arg(long, value_name = "MODEL")]
    pub lead: Option<String>,

    /// Minimum number of successful answers
    #[arg(long, value_name = "N")]
    pub quorum: Option<usize>,

    /// Round identifier (default: a fresh UUID)
    #[arg(long, value_name = "ID")]
    pub round_id: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "sse")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Directory for round records (overrides storage.data_dir)
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Do not persist the round
    #[arg(long)]
    pub no_store: bool,

    /// Print a stored round as JSON and exit
    #[arg(long, value_name = "ID", conflicts_with = "question")]
    pub show_round: Option<String>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// Apply flags that override file configuration.
    pub fn apply_overrides(&self, config: &mut FileConfig) {
        if let Some(quorum) = self.quorum {
            config.deliberation.quorum = Some(quorum);
        }
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
    }
}
