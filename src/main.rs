use anyhow::{Context, Result};
use clap::Parser;
use gofix::bundle::Bundle;
use gofix::config::{Config, OutputFormat};
use gofix::events::{parse_events, TestEvent};
use gofix::pipeline::Triage;
use gofix::prompt::render_repair_prompt;
use gofix::{correlate, telemetry};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "gofix",
    about = "Extract the source context of failing Go tests from `go test -json` output",
    version
)]
struct Args {
    /// Project root to search for test files (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Read the test feed from a file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Config file to use instead of <root>/.gofix.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format for bundles
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Keep processing other files after one fails
    #[arg(long, overrides_with = "no_keep_going")]
    keep_going: bool,

    /// Halt at the first file that fails, even if config says otherwise
    #[arg(long, overrides_with = "keep_going")]
    no_keep_going: bool,

    /// Process files in parallel
    #[arg(long, overrides_with = "no_parallel")]
    parallel: bool,

    /// Process files one at a time
    #[arg(long, overrides_with = "parallel")]
    no_parallel: bool,

    /// Also include functions called by the test's dependencies
    #[arg(long, overrides_with = "no_transitive")]
    transitive: bool,

    /// Only include functions the test calls directly
    #[arg(long, overrides_with = "transitive")]
    no_transitive: bool,

    /// Name prefix of test functions (default: Test)
    #[arg(long)]
    test_prefix: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

/// Value of a `--flag` / `--no-flag` pair, if either was given
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(prefix) = &self.test_prefix {
            config.test_prefix = prefix.clone();
        }
        if let Some(keep_going) = switch(self.keep_going, self.no_keep_going) {
            config.keep_going = keep_going;
        }
        if let Some(parallel) = switch(self.parallel, self.no_parallel) {
            config.parallel = parallel;
        }
        if let Some(transitive) = switch(self.transitive, self.no_transitive) {
            config.transitive = transitive;
        }
    }
}

fn read_events(input: Option<&Path>) -> Result<Vec<TestEvent>> {
    match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(parse_events(BufReader::new(file))?)
        }
        None => Ok(parse_events(io::stdin().lock())?),
    }
}

fn render(out: &mut impl Write, format: OutputFormat, bundle: &Bundle) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, bundle)?;
            writeln!(out)?;
        }
        OutputFormat::Prompt => {
            writeln!(out, "{}\n", render_repair_prompt(bundle))?;
        }
        OutputFormat::Summary => {
            let file = bundle
                .test_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            writeln!(
                out,
                "{}\t{}\t{} test decl(s)\t{} dependency decl(s)\t{}",
                file,
                bundle.full_test_name,
                bundle.test_sources.len(),
                bundle.dependency_sources.len(),
                bundle.test_error
            )?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(args.log_json, telemetry::level_for_verbosity(args.verbose));

    let mut config = Config::load(&args.root, args.config.as_deref())?;
    args.apply(&mut config);

    let events = read_events(args.input.as_deref()).context("Failed to read test output")?;
    let index = correlate(&events);

    if index.is_empty() {
        info!("no attributable failing tests");
        eprintln!("No attributable failing tests.");
        return Ok(());
    }

    let triage = Triage::from_config(&args.root, &config);
    let slots = triage.resolve(&index);
    let total = slots.len();

    eprintln!("Files:");
    for slot in &slots {
        match &slot.located {
            Ok(located) => eprintln!("  {}", located.path.display()),
            Err(_) => eprintln!("  {} (unresolved)", slot.reported.display()),
        }
    }

    let outcomes = triage.run_resolved(slots);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(bundles) => {
                for bundle in &bundles {
                    render(&mut out, config.format, bundle)?;
                }
            }
            Err(err) => {
                error!(file = %outcome.file.display(), error = %err, "failed to process file");
                failures.push((outcome.file, err));
            }
        }
    }
    out.flush()?;

    match failures.len() {
        0 => Ok(()),
        1 => {
            let (file, err) = failures.remove(0);
            Err(anyhow::Error::new(err)
                .context(format!("Failed to process failing tests in {}", file.display())))
        }
        n => {
            for (file, err) in &failures {
                eprintln!("Error: {}: {}", file.display(), err);
            }
            anyhow::bail!("{} of {} files could not be processed", n, total)
        }
    }
}
