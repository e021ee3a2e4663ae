mod content;
mod evaluator;
mod reports;
mod runner;
mod scenario;
mod script;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use waterfall_engine::{ChallengeRegistry, ContentSource, EngineConfig};

use content::PackDirectory;
use runner::{ScenarioResult, SessionOutcome, build_service, replay_script, run_catalog};
use scenario::{expand_scenarios, list_scenarios};
use script::EventScript;

#[derive(Debug, Parser)]
#[command(name = "waterfall-tester", version = "0.1.0")]
#[command(
    about = "QA harness for the waterfall challenge engine - scripted sessions and property scenarios"
)]
struct Args {
    /// Content pack file, or a directory of pack files
    #[arg(long)]
    content: Option<PathBuf>,

    /// Event script to replay against --content
    #[arg(long)]
    script: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenarios to run (comma-separated, `all` for the whole catalog)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let config = load_config(args.config.as_deref())?;
    let seeds = parse_seeds(&args.seeds)?;

    let (scenarios, unknown) = expand_scenarios(&split_csv(&args.scenarios));
    for name in unknown {
        eprintln!("⚠️  Unknown scenario: {}", name.yellow());
    }

    let mut results = Vec::new();
    if !scenarios.is_empty() {
        println!("{}", "🧠 Running Scenarios".bright_yellow().bold());
        println!("{}", "-".repeat(30).yellow());
        results = run_catalog(&scenarios, &seeds, args.iterations, &config, args.verbose).await?;
    }

    let sessions = run_content(&args, &config, &mut results).await?;

    write_reports(&args, &results, &sessions, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🌊 Waterfall Engine Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    EngineConfig::from_json(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn parse_seeds(raw: &str) -> Result<Vec<u64>> {
    let seeds = split_csv(raw)
        .iter()
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed '{token}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    if seeds.is_empty() {
        bail!("at least one seed is required");
    }
    Ok(seeds)
}

/// Validate `--content` and replay `--script` against it.
async fn run_content(
    args: &Args,
    config: &EngineConfig,
    results: &mut Vec<ScenarioResult>,
) -> Result<Vec<SessionOutcome>> {
    let Some(content_path) = args.content.as_ref() else {
        if args.script.is_some() {
            bail!("--script requires --content");
        }
        return Ok(Vec::new());
    };

    let packs = PackDirectory::new(content_path)
        .load_packs()
        .with_context(|| format!("loading content from {}", content_path.display()))?;
    let registry = ChallengeRegistry::from_packs(&packs, config.latest_version)
        .context("content was rejected")?;
    let challenges: usize = packs.iter().map(|pack| pack.challenge_count()).sum();
    println!(
        "📦 Loaded {} packs with {challenges} challenges from {}",
        packs.len(),
        content_path.display()
    );

    let Some(script_path) = args.script.as_ref() else {
        return Ok(Vec::new());
    };
    let script = EventScript::load(script_path)?;
    println!(
        "🎬 Replaying {} ({} sessions, {} events)",
        script.name.bright_white(),
        script.sessions.len(),
        script.event_count()
    );

    let name = script.name.clone();
    let service = Arc::new(build_service(registry, config.clone())?);
    let sessions = replay_script(service, Arc::new(script)).await?;
    results.push(runner::script_result(&name, &sessions));
    Ok(sessions)
}

fn write_reports(
    args: &Args,
    results: &[ScenarioResult],
    sessions: &[SessionOutcome],
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(&mut output_target, results, sessions)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Waterfall Engine Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                reports::generate_markdown_report(&mut output_target, results, sessions)?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                reports::generate_console_report(
                    &mut output_target,
                    results,
                    sessions,
                    duration,
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
