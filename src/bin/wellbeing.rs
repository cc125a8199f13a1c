//! Wellbeing CLI - Command-line interface for Synheart Wellbeing
//!
//! Commands:
//! - analyze: Evaluate a user's recent window from exported records (batch mode)
//! - validate: Validate health records or check-ins
//! - doctor: Diagnose configuration and environment

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use synheart_wellbeing::adapters::{CheckInLog, InMemoryCheckInLog, InMemoryHealthSource};
use synheart_wellbeing::clock::ManualClock;
use synheart_wellbeing::config::LoggingConfig;
use synheart_wellbeing::schema::{parse_array, parse_ndjson, validate_batch, ValidationError};
use synheart_wellbeing::types::CheckIn;
use synheart_wellbeing::{
    logging, AnalysisEncoder, CheckInSubmission, Config, EngineBuilder, HealthRecord,
    WellbeingError, PRODUCER_NAME, WELLBEING_VERSION,
};

/// Wellbeing - On-device engine for wellbeing trends and peer support
#[derive(Parser)]
#[command(name = "wellbeing")]
#[command(author = "Synheart AI Inc")]
#[command(version = WELLBEING_VERSION)]
#[command(about = "Compare recent wellbeing signals against a personal baseline", long_about = None)]
struct Cli {
    /// Emit logs to stderr at this level (e.g. "debug")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a user's recent window (batch mode)
    Analyze {
        /// User to evaluate
        #[arg(short, long)]
        user: String,

        /// Health records file, NDJSON or JSON array (use - for stdin)
        #[arg(short, long)]
        records: PathBuf,

        /// Historical check-ins file, NDJSON or JSON array; each needs a timestamp
        #[arg(long)]
        check_ins: Option<PathBuf>,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Evaluation time (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Validate health records or check-ins
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Kind of records in the input
        #[arg(long, default_value = "records")]
        kind: InputKind,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum InputKind {
    /// Health records (sleep, activity, exercise, steps)
    Records,
    /// Mood check-ins
    CheckIns,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match &cli.log_level {
        Some(level) => {
            let config = LoggingConfig {
                level: level.clone(),
                directory: None,
            };
            match logging::init(&config) {
                Ok(guard) => Some(guard),
                Err(e) => return fail(WellbeingCliError::Engine(e)),
            }
        }
        None => None,
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn fail(e: WellbeingCliError) -> ExitCode {
    eprintln!(
        "{}",
        serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
    );
    ExitCode::FAILURE
}

fn run(command: Commands) -> Result<(), WellbeingCliError> {
    match command {
        Commands::Analyze {
            user,
            records,
            check_ins,
            config,
            now,
            format,
        } => cmd_analyze(
            &user,
            &records,
            check_ins.as_deref(),
            config.as_deref(),
            now,
            format,
        ),
        Commands::Validate { input, kind, json } => cmd_validate(&input, kind, json),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_analyze(
    user: &str,
    records_path: &Path,
    check_ins_path: Option<&Path>,
    config_path: Option<&Path>,
    now: Option<DateTime<Utc>>,
    format: OutputFormat,
) -> Result<(), WellbeingCliError> {
    let config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let records: Vec<HealthRecord> = parse_records(&read_input(records_path)?)?;
    if records.is_empty() {
        return Err(WellbeingCliError::NoRecords);
    }

    let health = Arc::new(InMemoryHealthSource::new());
    health.insert(user, records)?;

    let check_in_log = Arc::new(InMemoryCheckInLog::new());
    if let Some(path) = check_ins_path {
        let submissions: Vec<CheckInSubmission> = parse_records(&read_input(path)?)?;
        for check_in in import_check_ins(user, submissions)? {
            check_in_log.append(check_in)?;
        }
    }

    let engine = EngineBuilder::from_config(&config)
        .clock(Arc::new(ManualClock::new(now.unwrap_or_else(Utc::now))))
        .health_source(health)
        .check_in_log(check_in_log)
        .build()?;

    let result = engine.analyze_recent(user)?;
    let encoder = AnalysisEncoder::new();
    let output = match format {
        OutputFormat::Json => encoder.encode_to_json(&result)?,
        OutputFormat::JsonPretty => encoder.encode_to_json_pretty(&result)?,
    };
    println!("{output}");
    Ok(())
}

/// Historical check-ins keep their own timestamps and skip the cooldown
fn import_check_ins(
    user: &str,
    submissions: Vec<CheckInSubmission>,
) -> Result<Vec<CheckIn>, WellbeingCliError> {
    submissions
        .into_iter()
        .enumerate()
        .map(|(index, submission)| {
            let timestamp = submission.timestamp.ok_or_else(|| {
                WellbeingCliError::ParseError(format!("check-in {index} has no timestamp"))
            })?;
            Ok(submission.into_check_in(user, timestamp)?)
        })
        .collect()
}

fn cmd_validate(input: &Path, kind: InputKind, json: bool) -> Result<(), WellbeingCliError> {
    let data = read_input(input)?;

    let (total, failures) = match kind {
        InputKind::Records => {
            let records: Vec<HealthRecord> = parse_records(&data)?;
            (records.len(), validate_batch(&records, HealthRecord::validate))
        }
        InputKind::CheckIns => {
            let submissions: Vec<CheckInSubmission> = parse_records(&data)?;
            (
                submissions.len(),
                validate_batch(&submissions, CheckInSubmission::validate),
            )
        }
    };

    let report = ValidationReport {
        total_records: total,
        valid_records: total - failures.len(),
        invalid_records: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Record {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(WellbeingCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), WellbeingCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "wellbeing_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Wellbeing version {WELLBEING_VERSION}"),
    });

    let config = match config_path {
        Some(path) if !path.exists() => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist, defaults apply".to_string(),
            });
            Some(Config::default())
        }
        Some(path) => match Config::load(path) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Config file valid ({})", path.display()),
                });
                Some(config)
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {e}"),
                });
                None
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "No config file given, defaults apply".to_string(),
            });
            Some(Config::default())
        }
    };

    if let Some(config) = &config {
        let policy = &config.policy;
        checks.push(DoctorCheck {
            name: "windows".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Baseline {} days, evaluation {} days, {} samples required",
                policy.baseline_window_days,
                policy.evaluation_window_days,
                policy.min_baseline_samples
            ),
        });

        if let Some(dir) = &config.logging.directory {
            let status = if dir.is_dir() {
                CheckStatus::Ok
            } else {
                CheckStatus::Warning
            };
            checks.push(DoctorCheck {
                name: "log_directory".to_string(),
                status,
                message: format!(
                    "Logs written to {}",
                    logging::log_file_path(dir).display()
                ),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (use - to read records from it)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: WELLBEING_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Wellbeing Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(WellbeingCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn read_input(path: &Path) -> io::Result<String> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path)
    }
}

/// Accept either a JSON array or NDJSON
fn parse_records<T: serde::de::DeserializeOwned>(data: &str) -> Result<Vec<T>, ValidationError> {
    if data.trim_start().starts_with('[') {
        parse_array(data)
    } else {
        parse_ndjson(data)
    }
}

enum WellbeingCliError {
    Io(io::Error),
    Engine(WellbeingError),
    Json(serde_json::Error),
    Validation(ValidationError),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for WellbeingCliError {
    fn from(e: io::Error) -> Self {
        WellbeingCliError::Io(e)
    }
}

impl From<WellbeingError> for WellbeingCliError {
    fn from(e: WellbeingError) -> Self {
        WellbeingCliError::Engine(e)
    }
}

impl From<serde_json::Error> for WellbeingCliError {
    fn from(e: serde_json::Error) -> Self {
        WellbeingCliError::Json(e)
    }
}

impl From<ValidationError> for WellbeingCliError {
    fn from(e: ValidationError) -> Self {
        WellbeingCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<WellbeingCliError> for CliError {
    fn from(e: WellbeingCliError) -> Self {
        match e {
            WellbeingCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            WellbeingCliError::Engine(e) => {
                let hint = match &e {
                    WellbeingError::InsufficientData(_) => {
                        Some("Provide records covering the evaluation window".to_string())
                    }
                    WellbeingError::Config(_) | WellbeingError::Toml(_) => {
                        Some("Run 'wellbeing doctor --config <file>' for details".to_string())
                    }
                    WellbeingError::InvalidInput(_) => {
                        Some("Run 'wellbeing validate' for details".to_string())
                    }
                    _ => None,
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint,
                }
            }
            WellbeingCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            WellbeingCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'wellbeing validate' for details".to_string()),
            },
            WellbeingCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No health records found in input".to_string(),
                hint: Some("Ensure the records file is not empty".to_string()),
            },
            WellbeingCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} records failed validation"),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            WellbeingCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            WellbeingCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
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
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
