//! fixbench - verification harness CLI
//!
//! The `fixbench` command lints, runs and tests candidate fixes inside a
//! bounded workspace.
//!
//! ## Commands
//!
//! - `verify`: Run the full Lint, Run, Test pipeline and report a verdict
//! - `exec`: Run one file or snippet in the sandbox
//! - `read` / `write` / `backup` / `restore` / `list`: Workspace file access
//! - `analyze`: Show the functions and imports of a Python file
//! - `config`: Print the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, Level};

use fixbench_ci::{render_summary_md, to_value, write_report_json, VerificationPipeline, VerificationReport, VerifyRequest};
use fixbench_core::{
    extract_functions, extract_imports, ExecutionMode, ExecutionRequest, ExecutionResult,
    FunctionInfo, HarnessConfig, Sandbox, Workspace,
};

#[derive(Parser)]
#[command(name = "fixbench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verification harness for candidate code fixes", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Harness configuration file (JSON)
    #[arg(short, long, global = true, env = "FIXBENCH_CONFIG")]
    config: Option<PathBuf>,

    /// Workspace root, overriding the configuration file
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint, run and test a candidate, then print the verdict
    Verify {
        /// Candidate source file, relative to the workspace root
        candidate: PathBuf,

        /// Test file to run against the candidate
        #[arg(short, long)]
        test: Option<PathBuf>,

        /// Skip the lint stage
        #[arg(long)]
        no_lint: bool,

        /// Skip the test stage even when a test file is given
        #[arg(long)]
        no_test: bool,

        /// Let lint findings fail the verdict
        #[arg(long)]
        strict_lint: bool,

        /// Per-stage timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// File whose contents are fed to the candidate's stdin
        #[arg(long)]
        stdin_file: Option<PathBuf>,

        /// Write the JSON report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Output format on stdout
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Arguments passed to the candidate in the run stage
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Execute a single file or inline snippet in the sandbox
    Exec {
        /// File to execute, relative to the workspace root
        #[arg(required_unless_present = "code")]
        target: Option<PathBuf>,

        /// Inline source to execute instead of a file
        #[arg(long, conflicts_with = "target")]
        code: Option<String>,

        /// Which tool handles the target
        #[arg(short, long, value_enum, default_value = "run")]
        mode: ModeArg,

        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// File whose contents are fed to stdin
        #[arg(long)]
        stdin_file: Option<PathBuf>,

        /// Output format on stdout
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Arguments passed to the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print a workspace file
    Read {
        /// Path relative to the workspace root
        path: PathBuf,
    },

    /// Write a workspace file from a local file or stdin
    Write {
        /// Path relative to the workspace root
        path: PathBuf,

        /// Read content from this file instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Copy a workspace file to its `.backup` sibling
    Backup {
        /// Path relative to the workspace root
        path: PathBuf,
    },

    /// Put a file's `.backup` copy back in place
    Restore {
        /// Path relative to the workspace root
        path: PathBuf,
    },

    /// List workspace files
    List {
        /// Directory relative to the workspace root
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Keep only these extensions (repeatable)
        #[arg(short, long = "ext")]
        extensions: Vec<String>,
    },

    /// Show functions and imports of a Python file
    Analyze {
        /// Path relative to the workspace root
        path: PathBuf,

        /// Output format on stdout
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Md,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Run,
    Test,
    Lint,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Run => ExecutionMode::Run,
            ModeArg::Test => ExecutionMode::Test,
            ModeArg::Lint => ExecutionMode::Lint,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    fixbench_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref(), cli.workspace.as_deref())?;

    match cli.command {
        Commands::Verify {
            candidate,
            test,
            no_lint,
            no_test,
            strict_lint,
            timeout,
            stdin_file,
            report,
            format,
            args,
        } => {
            let mut config = config;
            if strict_lint {
                config.lint_affects_verdict = true;
            }
            if let Some(secs) = timeout {
                config.timeout_secs = secs;
            }
            let mut request = VerifyRequest::new(candidate).with_run_args(args);
            if let Some(test) = test {
                request = request.with_test_file(test);
            }
            if let Some(path) = stdin_file {
                request = request.with_stdin(read_local(&path)?);
            }
            if no_lint {
                request = request.without_lint();
            }
            if no_test {
                request = request.without_test();
            }
            cmd_verify(config, &request, report.as_deref(), format).await
        }
        Commands::Exec {
            target,
            code,
            mode,
            timeout,
            stdin_file,
            format,
            args,
        } => {
            let mut request = match (target, code) {
                (_, Some(code)) => ExecutionRequest::inline(code, mode.into()),
                (Some(target), None) => ExecutionRequest::file(target, mode.into()),
                (None, None) => anyhow::bail!("either a target file or --code is required"),
            };
            request = request.with_args(args);
            if let Some(secs) = timeout {
                request = request.with_timeout(Duration::from_secs(secs));
            }
            if let Some(path) = stdin_file {
                request = request.with_stdin(read_local(&path)?);
            }
            cmd_exec(config, &request, format).await
        }
        Commands::Read { path } => cmd_read(&open_workspace(&config)?, &path),
        Commands::Write { path, from } => cmd_write(&open_workspace(&config)?, &path, from.as_deref()),
        Commands::Backup { path } => cmd_backup(&open_workspace(&config)?, &path),
        Commands::Restore { path } => cmd_restore(&open_workspace(&config)?, &path),
        Commands::List { dir, extensions } => cmd_list(&open_workspace(&config)?, &dir, &extensions),
        Commands::Analyze { path, format } => cmd_analyze(&open_workspace(&config)?, &path, format),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load the configuration file if one is named, then apply CLI overrides.
fn load_config(path: Option<&Path>, workspace: Option<&Path>) -> Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => HarnessConfig::default(),
    };
    if let Some(root) = workspace {
        config.workspace_root = root.to_path_buf();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_workspace(config: &HarnessConfig) -> Result<Workspace> {
    Workspace::open(&config.workspace_root)
        .with_context(|| format!("Failed to open workspace {:?}", config.workspace_root))
}

fn read_local(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

/// Run the verification pipeline and print its report.
async fn cmd_verify(
    mut config: HarnessConfig,
    request: &VerifyRequest,
    report_path: Option<&Path>,
    format: ReportFormat,
) -> Result<ExitCode> {
    config.validate().context("Invalid configuration")?;
    let pipeline = VerificationPipeline::from_config(config).context("Failed to set up sandbox")?;
    let report = pipeline
        .run(request)
        .await
        .context("Verification aborted by a harness error")?;

    if let Some(path) = report_path {
        write_report_json(path, &report)?;
        info!(path = %path.display(), "report written");
    }

    match format {
        ReportFormat::Json => {
            let value = to_value(&report).context("Malformed report")?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ReportFormat::Md => print!("{}", render_summary_md(&report)),
        ReportFormat::Text => print_report_text(&report),
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report_text(report: &VerificationReport) {
    let verdict = report.verdict();
    println!("Run ID: {}", report.run_id());
    println!("Candidate: {}", report.candidate().display());
    println!(
        "Status: {}",
        if verdict.passed { "✓ PASSED" } else { "✗ FAILED" }
    );
    println!("Duration: {}ms", report.duration_ms());
    println!();

    for stage in report.stages() {
        let status = if stage.passed() { "✓" } else { "✗" };
        let advisory = if stage.counts_toward_verdict {
            ""
        } else {
            " [advisory]"
        };
        let exit = match (stage.result.exit_code, stage.result.signal) {
            (Some(code), _) => format!("exit code: {}", code),
            (None, Some(sig)) => format!("signal: {}", sig),
            (None, None) => "no exit status".to_string(),
        };
        println!(
            "  {} {} ({}ms, {}){}",
            status, stage.stage, stage.result.duration_ms, exit, advisory
        );
    }

    println!();
    println!(
        "Summary: {}/{} stages passed",
        report.passed_count(),
        report.stages().len()
    );
    println!("{}", verdict.message);
    for v in &verdict.violations {
        println!("  - {}", v);
    }
    for a in &verdict.advisories {
        println!("  ~ {}", a);
    }
}

/// Run one request through the sandbox.
async fn cmd_exec(
    config: HarnessConfig,
    request: &ExecutionRequest,
    format: OutputFormat,
) -> Result<ExitCode> {
    let sandbox = Sandbox::from_config(config).context("Failed to set up sandbox")?;
    let result = sandbox.run(request).await.context("Execution failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
            if result.duration_exceeded {
                eprintln!("fixbench: timed out after {}ms", result.duration_ms);
            }
        }
    }
    Ok(exit_code_for(&result))
}

fn exit_code_for(result: &ExecutionResult) -> ExitCode {
    if result.succeeded {
        return ExitCode::SUCCESS;
    }
    match result.exit_code {
        Some(code) if (1..=255).contains(&code) => ExitCode::from(code as u8),
        _ => ExitCode::FAILURE,
    }
}

fn cmd_read(workspace: &Workspace, path: &Path) -> Result<ExitCode> {
    let text = workspace.read(path)?;
    print!("{}", text);
    Ok(ExitCode::SUCCESS)
}

fn cmd_write(workspace: &Workspace, path: &Path, from: Option<&Path>) -> Result<ExitCode> {
    let text = match from {
        Some(source) => read_local(source)?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    let written = workspace.write(path, &text)?;
    println!("Wrote {} bytes to {}", text.len(), written.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_backup(workspace: &Workspace, path: &Path) -> Result<ExitCode> {
    let backup = workspace.backup(path)?;
    println!("Backed up to {}", backup.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_restore(workspace: &Workspace, path: &Path) -> Result<ExitCode> {
    let restored = workspace.restore(path)?;
    println!("Restored {}", restored.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(workspace: &Workspace, dir: &Path, extensions: &[String]) -> Result<ExitCode> {
    let exts: Vec<&str> = extensions.iter().map(String::as_str).collect();
    let filter = if exts.is_empty() { None } else { Some(exts.as_slice()) };
    for path in workspace.list(dir, filter)? {
        let shown = path.strip_prefix(workspace.root()).unwrap_or(&path);
        println!("{}", shown.display());
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct Analysis {
    functions: Vec<FunctionInfo>,
    imports: Vec<String>,
}

impl Analysis {
    fn of(source: &str) -> Self {
        Self {
            functions: extract_functions(source),
            imports: extract_imports(source),
        }
    }
}

fn cmd_analyze(workspace: &Workspace, path: &Path, format: OutputFormat) -> Result<ExitCode> {
    let source = workspace.read(path)?;
    let analysis = Analysis::of(&source);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&analysis)?),
        OutputFormat::Text => {
            println!("Functions:");
            for f in &analysis.functions {
                println!(
                    "  {}({}) lines {}-{}",
                    f.name,
                    f.args.join(", "),
                    f.line_start,
                    f.line_end
                );
            }
            println!("Imports:");
            for i in &analysis.imports {
                println!("  {}", i);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
