//! Lexitrace CLI - command-line wrapper around the analysis engine
//!
//! Commands:
//! - analyze: Run the full detection pipeline over an event export
//! - validate: Validate raw event records against the input schema
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use lexitrace::report::{ReportEncoder, ReportFormat};
use lexitrace::schema::{RawConfessionRecord, RawEventRecord, RecordAdapter};
use lexitrace::{AnalysisConfig, AnalysisEngine, ConfessionRecord, ENGINE_VERSION, SCHEMA_VERSION};

/// Lexitrace - behavioral anomaly detection for word-puzzle studies
#[derive(Parser)]
#[command(name = "lexitrace")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Detect externally-assisted words in study event logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full detection pipeline over an event export
    Analyze {
        /// Event records path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Confession records path
        #[arg(short, long)]
        confessions: Option<PathBuf>,

        /// Metrics output path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Directory for per-participant audit documents
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,

        /// Analysis configuration file (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Validate raw event records against the input schema
    Validate {
        /// Event records path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one metrics row per line)
    Ndjson,
    /// JSON array of metrics rows
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Ndjson => ReportFormat::Ndjson,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::JsonPretty => ReportFormat::JsonPretty,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (study.raw_event.v1)
    Input,
    /// Output schema (lexitrace.report.v1)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LexitraceCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            confessions,
            output,
            artifacts_dir,
            config,
            input_format,
            output_format,
        } => cmd_analyze(
            &input,
            confessions.as_deref(),
            &output,
            artifacts_dir.as_deref(),
            config.as_deref(),
            input_format,
            output_format,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema { schema_type } => {
            cmd_schema(schema_type);
            Ok(())
        }
    }
}

fn cmd_analyze(
    input: &Path,
    confessions: Option<&Path>,
    output: &Path,
    artifacts_dir: Option<&Path>,
    config: Option<&Path>,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), LexitraceCliError> {
    let records = read_event_records(input, &input_format)?;
    if records.is_empty() {
        return Err(LexitraceCliError::NoRecords);
    }

    let confession_records = match confessions {
        Some(path) => read_confession_records(path, &input_format)?,
        None => Vec::new(),
    };

    let engine = match config {
        Some(path) => {
            let config_json = fs::read_to_string(path)?;
            let config: AnalysisConfig = serde_json::from_str(&config_json)?;
            AnalysisEngine::with_config(config)?
        }
        None => AnalysisEngine::new(),
    };

    let run = engine.run(records, &confession_records)?;
    let encoder = ReportEncoder::new();

    let metrics = encoder.encode_metrics(&run, output_format.into())?;
    if output.to_string_lossy() == "-" {
        print!("{}", metrics);
    } else {
        fs::write(output, metrics)?;
    }

    if let Some(dir) = artifacts_dir {
        fs::create_dir_all(dir)?;
        for (participant_id, document) in encoder.encode_artifacts(&run)? {
            fs::write(dir.join(format!("{participant_id}.json")), document)?;
        }
        fs::write(dir.join("run_summary.json"), encoder.encode_summary(&run)?)?;
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), LexitraceCliError> {
    let records = read_event_records(input, &input_format)?;
    let issues = RecordAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - issues.len(),
        invalid_records: issues.len(),
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!(
                    "  - Record {} (participant {}): {}",
                    issue.index,
                    issue.participant_id.as_deref().unwrap_or("unknown"),
                    issue.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(LexitraceCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) {
    match schema_type {
        SchemaType::Input => {
            println!("Input Schema: {}", SCHEMA_VERSION);
            println!();
            println!("One record per event:");
            println!("  participantId  string, required");
            println!("  sessionPhase   tutorial | main");
            println!("  type           page_leave | page_return | mouse_inactive_start |");
            println!("                 mouse_active | word_validation | word_submission |");
            println!("                 word_removal | confession");
            println!("  timestamp      ISO-8601, required");
            println!("  payload        type-dependent object");
            println!();
            println!("Word payloads carry word, length, isValid, reward; page payloads");
            println!("carry tabCount; confession payloads carry confessedWords and");
            println!("usedExternalResources.");
            println!();
            println!("Confession records (separate file): participantId, confessedWords,");
            println!("usedExternalResources.");
        }
        SchemaType::Output => {
            println!("Output Schema: lexitrace.report.v1");
            println!();
            println!("Metrics: one flat row per participant with columns");
            println!("  participantId, cheatingRatePracticeRound, cheatingRateMainRound,");
            println!("  cheatingMainRound, lyingRate, hasConfessed, hasPageLeft,");
            println!("  totalTimePageLeft, hasMouseInactivity, totalTimeMouseInactivity,");
            println!("  performanceScoreExcludingCheatedWords,");
            println!("  performanceScoreIncludingCheatedWords, validWordsShort,");
            println!("  validWordsMedium, validWordsLong, dataQualityIssue");
            println!();
            println!("Audit documents: per participant, provenance-stamped, containing");
            println!("suspicious intervals, word records, per-word verdicts with the");
            println!("triggering rules, confession cross-checks, and data-quality flags.");
        }
    }
}

// Helper functions

fn read_input(path: &Path) -> Result<String, LexitraceCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn read_event_records(
    path: &Path,
    format: &InputFormat,
) -> Result<Vec<RawEventRecord>, LexitraceCliError> {
    let data = read_input(path)?;
    let records = match format {
        InputFormat::Ndjson => RecordAdapter::parse_ndjson(&data)?,
        InputFormat::Json => RecordAdapter::parse_array(&data)?,
    };
    Ok(records)
}

fn read_confession_records(
    path: &Path,
    format: &InputFormat,
) -> Result<Vec<ConfessionRecord>, LexitraceCliError> {
    let data = read_input(path)?;
    let raw: Vec<RawConfessionRecord> = match format {
        InputFormat::Ndjson => RecordAdapter::parse_confession_ndjson(&data)?,
        InputFormat::Json => RecordAdapter::parse_confession_array(&data)?,
    };
    let confessions = raw
        .iter()
        .map(|r| r.to_confession())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(confessions)
}

// Error types

#[derive(Debug)]
enum LexitraceCliError {
    Io(io::Error),
    Analysis(lexitrace::AnalysisError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
}

impl From<io::Error> for LexitraceCliError {
    fn from(e: io::Error) -> Self {
        LexitraceCliError::Io(e)
    }
}

impl From<lexitrace::AnalysisError> for LexitraceCliError {
    fn from(e: lexitrace::AnalysisError) -> Self {
        LexitraceCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for LexitraceCliError {
    fn from(e: serde_json::Error) -> Self {
        LexitraceCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LexitraceCliError> for CliError {
    fn from(e: LexitraceCliError) -> Self {
        match e {
            LexitraceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LexitraceCliError::Analysis(e) => CliError {
                code: "ANALYSIS_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches the {} schema", SCHEMA_VERSION)),
            },
            LexitraceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LexitraceCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No event records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            LexitraceCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    issues: Vec<lexitrace::schema::ValidationIssue>,
}
