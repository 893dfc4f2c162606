//! Command-line interface for verifai.
//!
//! Provides commands for fact-checking text, listing the workflow presets,
//! and inspecting the resolved configuration.

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;

use crate::config::Settings;
use crate::core::{all_presets, Mode, Orchestrator, StreamRecord};
use crate::domain::events::names;
use crate::domain::{ProgressEvent, Verdict};

/// verifai - Claim-level fact-checking with streaming progress
#[derive(Parser, Debug)]
#[command(name = "verifai")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fact-check text and stream the run
    Check {
        /// Text to check (reads --input or stdin if not provided)
        text: Option<String>,

        /// Input file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Workflow preset
        #[arg(short, long, value_enum, default_value_t = Mode::Default)]
        mode: Mode,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Ndjson)]
        format: OutputFormat,
    },

    /// Show all workflow presets
    Modes,

    /// Show resolved configuration (debug)
    Config,
}

/// How `check` renders the run stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON record per line
    Ndjson,

    /// Report text on stdout, progress on stderr
    Text,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Check {
                text,
                input,
                mode,
                format,
            } => check(text, input, mode, format).await,
            Commands::Modes => show_modes(),
            Commands::Config => show_config(),
        }
    }
}

/// Run a fact-check and stream its records
async fn check(
    text: Option<String>,
    input_file: Option<PathBuf>,
    mode: Mode,
    format: OutputFormat,
) -> Result<()> {
    let input = read_input(text, input_file)?;

    let settings = Settings::load()?;
    let orchestrator = Orchestrator::from_settings(&settings)?;
    let mut stream = orchestrator.start(input, mode);

    let mut out = io::stdout();
    let mut failed = false;

    while let Some(record) = stream.next().await {
        failed |= record.is_error();
        match format {
            OutputFormat::Ndjson => {
                writeln!(out, "{}", record.to_ndjson()?)?;
                out.flush()?;
            }
            OutputFormat::Text => render_text(&mut out, &record)?,
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Resolve input from the argument, a file, or piped stdin
fn read_input(text: Option<String>, input_file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }

    if let Some(path) = input_file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()));
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        anyhow::bail!("No input provided. Pass TEXT, use --input <file>, or pipe to stdin");
    }

    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok(buffer)
}

/// Render one record in text mode
fn render_text(out: &mut impl Write, record: &StreamRecord) -> Result<()> {
    if let Some(fragment) = record.as_token() {
        write!(out, "{}", fragment)?;
        out.flush()?;
    } else if let Some(event) = record.as_event() {
        if let Some(line) = describe_event(&event) {
            eprintln!("{}", line);
        }
    } else if let Some(message) = record.error_message() {
        eprintln!("\n[Run failed: {}]", message);
    } else if record.is_terminal() {
        writeln!(out)?;
        eprintln!("\n[Run completed]");
    }
    Ok(())
}

/// One-line progress summary for a lifecycle event
fn describe_event(event: &ProgressEvent) -> Option<String> {
    let payload = event.payload.as_ref();

    match event.event.as_str() {
        names::EXTRACT_CLAIMS_START => Some("Extracting claims...".to_string()),
        names::EXTRACT_CLAIMS_END => {
            let count = payload.and_then(|p| p.as_array()).map_or(0, Vec::len);
            Some(format!("Found {} claim(s)", count))
        }
        names::GENERATE_REPORT_START => Some("Writing report...\n".to_string()),
        name => {
            let index = event.claim_index()?;
            if name == names::research_start(index) {
                Some(format!("  [claim {}] researching", index))
            } else if name == names::research_query_failed(index) {
                Some(format!("  [claim {}] a search query failed", index))
            } else if name == names::verify_end(index) {
                let verdict: Verdict = serde_json::from_value(payload?.clone()).ok()?;
                Some(format!(
                    "  [claim {}] {} ({}%)",
                    index,
                    verdict.status,
                    verdict.confidence_percent()
                ))
            } else {
                None
            }
        }
    }
}

/// Print every preset keyed by name
fn show_modes() -> Result<()> {
    let presets = serde_json::to_string_pretty(&all_presets())?;
    println!("{}", presets);
    Ok(())
}

/// Print resolved settings with credentials redacted
fn show_config() -> Result<()> {
    let settings = Settings::load_unchecked()?;
    let redact = |key: &str| if key.trim().is_empty() { "(missing)" } else { "(set)" };

    println!("verifai configuration");
    println!();
    println!(
        "Config file: {}",
        settings
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Language model:");
    println!("  Base URL: {}", settings.openai_base_url);
    println!("  API key:  {}", redact(&settings.openai_api_key));
    println!();
    println!("Search:");
    println!("  Base URL: {}", settings.tavily_base_url);
    println!("  API key:  {}", redact(&settings.tavily_api_key));
    println!();
    println!("Request timeout: {}s", settings.request_timeout_seconds);
    println!();
    println!("Run limits:");
    println!("  Max input size:      {} bytes", settings.limits.max_input_bytes);
    println!("  Concurrent branches: {}", settings.limits.max_concurrent_branches);
    println!("  Timeout:             {}s", settings.limits.run_timeout_seconds);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_args_parse() {
        let cli = Cli::try_parse_from(["verifai", "check", "Some text", "--mode", "fast", "-f", "text"])
            .unwrap();
        match cli.command {
            Commands::Check {
                text, mode, format, ..
            } => {
                assert_eq!(text.as_deref(), Some("Some text"));
                assert_eq!(mode, Mode::Fast);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["verifai", "check", "x", "--mode", "turbo"]).is_err());
    }

    #[test]
    fn test_check_defaults() {
        let cli = Cli::try_parse_from(["verifai", "check", "x"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Check {
                mode: Mode::Default,
                format: OutputFormat::Ndjson,
                ..
            }
        ));
    }

    #[test]
    fn test_describe_verdict_event() {
        let verdict = Verdict::degraded("claim", "offline");
        let event = ProgressEvent::with_payload(names::verify_end(3), &verdict);
        assert_eq!(
            describe_event(&event).as_deref(),
            Some("  [claim 3] NOT ENOUGH INFO (0%)")
        );

        let event = ProgressEvent::with_payload(names::EXTRACT_CLAIMS_END, &json!([{}, {}]));
        assert_eq!(describe_event(&event).as_deref(), Some("Found 2 claim(s)"));

        let event = ProgressEvent::new(names::research_queries(1));
        assert_eq!(describe_event(&event), None);
    }

    #[test]
    fn test_text_mode_writes_tokens_only() {
        let mut out = Vec::new();
        render_text(&mut out, &StreamRecord::start("x")).unwrap();
        render_text(&mut out, &StreamRecord::token("Hello")).unwrap();
        render_text(&mut out, &StreamRecord::token(" world")).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hello world");
    }
}
