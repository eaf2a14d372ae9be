//! `ffqueue` — capability introspection and transcode queue execution.
//!
//! The binary is the presentation boundary: it resolves the tool, keeps the
//! capability cache fresh, loads YAML job files, and renders the
//! scheduler's event stream to the terminal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

use clap::{Args, Parser, Subcommand};

use ffqueue_core::{CapabilityCache, Job, JobStatus};
use ffqueue_introspect::{FfmpegProbe, snapshot};
use ffqueue_runner::{QueueEvent, Scheduler, compile_command};

#[derive(Debug, Parser)]
#[command(name = "ffqueue")]
#[command(about = "FFmpeg capability introspection and transcode queue execution")]
struct Cli {
    /// Directory containing the ffmpeg binary; PATH is searched otherwise.
    #[arg(long, global = true)]
    ffmpeg_dir: Option<PathBuf>,
    /// Capability cache file.
    #[arg(long, global = true, default_value = "ffmpeg-capabilities.bin")]
    cache: PathBuf,
    /// Enable debug logging.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build or refresh the capability cache by introspecting the tool.
    Introspect(IntrospectArgs),
    /// Print a section of the capability cache as JSON.
    Show(ShowArgs),
    /// Compile a job file into the tool's argument vector.
    Compile(CompileArgs),
    /// Run a queue of jobs from a job list file.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct IntrospectArgs {
    /// Re-introspect even when the persisted cache is still valid.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Capability section to print.
    #[arg(value_enum)]
    section: Section,
    /// Optional entry name inside the section.
    name: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Section {
    Codecs,
    Formats,
    Filters,
    PixFmts,
    Globals,
}

#[derive(Debug, Args)]
struct CompileArgs {
    /// YAML file declaring one job.
    #[arg(long)]
    job: PathBuf,
    /// Compile for preview: raw streaming container on stdout.
    #[arg(long)]
    preview: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// YAML file declaring a list of jobs.
    #[arg(long)]
    jobs: PathBuf,
    /// Only run jobs that failed on a previous attempt.
    #[arg(long)]
    retry_failed: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<(), String> {
    let Cli {
        ffmpeg_dir,
        cache,
        verbose: _,
        command,
    } = cli;

    // No degraded mode: everything below needs the tool binary.
    let probe = FfmpegProbe::locate("ffmpeg", ffmpeg_dir.as_deref())
        .map_err(|err| format!("{err}; install ffmpeg or pass --ffmpeg-dir"))?;

    match command {
        Command::Introspect(args) => introspect(&cache, &probe, args.force),
        Command::Show(args) => show(&cache, &probe, args),
        Command::Compile(args) => compile(&cache, &probe, args),
        Command::Run(args) => run_queue(&cache, &probe, args),
    }
}

fn introspect(cache_path: &Path, probe: &FfmpegProbe, force: bool) -> Result<(), String> {
    let progress = |name: &str, fraction: f64| {
        eprint!("\r[{:>5.1}%] {name:<40}", fraction * 100.0);
    };
    let cache = snapshot::load_or_rebuild(cache_path, probe, force, Some(&progress))
        .map_err(|err| err.to_string())?;
    eprintln!();
    println!(
        "{} codecs, {} formats, {} filters, {} pixel formats ({})",
        cache.codecs.len(),
        cache.formats.len(),
        cache.filters.len(),
        cache.pixel_formats.len(),
        cache_path.display()
    );
    Ok(())
}

fn show(cache_path: &Path, probe: &FfmpegProbe, args: ShowArgs) -> Result<(), String> {
    let cache = load_valid_cache(cache_path, probe)?;
    let name = args.name.as_deref();
    let json = match args.section {
        Section::Codecs => section_json(&cache.codecs, name)?,
        Section::Formats => section_json(&cache.formats, name)?,
        Section::Filters => section_json(&cache.filters, name)?,
        Section::PixFmts => section_json(&cache.pixel_formats, name)?,
        Section::Globals => {
            serde_json::to_string_pretty(&cache.globals).map_err(|err| err.to_string())?
        }
    };
    println!("{json}");
    Ok(())
}

fn compile(cache_path: &Path, probe: &FfmpegProbe, args: CompileArgs) -> Result<(), String> {
    let job: Job = load_yaml(&args.job)?;
    let cache = load_valid_cache(cache_path, probe)?;
    for arg in compile_command(&job, &cache, args.preview) {
        println!("{arg}");
    }
    Ok(())
}

fn run_queue(cache_path: &Path, probe: &FfmpegProbe, args: RunArgs) -> Result<(), String> {
    let declared: Vec<Job> = load_yaml(&args.jobs)?;
    if declared.is_empty() {
        return Err(format!("{} declares no jobs", args.jobs.display()));
    }
    let mut jobs: BTreeMap<u64, Job> = declared
        .into_iter()
        .enumerate()
        .map(|(index, job)| (index as u64 + 1, job))
        .collect();
    let cache = load_valid_cache(cache_path, probe)?;

    let (sender, receiver) = mpsc::channel();
    let scheduler = Scheduler::new(probe.path(), sender);

    let renderer = thread::spawn(move || {
        for event in receiver {
            match event {
                QueueEvent::QueueStarted => eprintln!("queue started"),
                QueueEvent::JobStarted { id, name } => eprintln!("[{id}] {name}: running"),
                QueueEvent::JobProgress { id, info, .. } => eprint!("\r[{id}] {info}    "),
                QueueEvent::JobFinished { id, status } => eprintln!("\n[{id}] {status:?}"),
                QueueEvent::TotalProgress(fraction) => {
                    eprintln!("total progress: {:.0}%", fraction * 100.0)
                }
                QueueEvent::QueueFinished => eprintln!("queue finished"),
            }
        }
    });

    let outcome = scheduler
        .run_queue(&cache, &mut jobs, args.retry_failed)
        .map_err(|err| err.to_string());
    // Dropping the scheduler closes the channel and ends the renderer.
    drop(scheduler);
    let _ = renderer.join();
    outcome?;

    let mut failures = 0;
    for (id, job) in &jobs {
        if job.status == JobStatus::Failed {
            failures += 1;
            eprintln!("[{id}] {} failed:\n{}", job.name, job.error_log.trim_end());
        }
    }
    if failures > 0 {
        return Err(format!("{failures} job(s) failed"));
    }
    Ok(())
}

fn load_valid_cache(cache_path: &Path, probe: &FfmpegProbe) -> Result<CapabilityCache, String> {
    let banner = probe.version_banner().map_err(|err| err.to_string())?;
    let cache = snapshot::load_from_file(cache_path).map_err(|_| {
        format!(
            "no usable capability cache at {}; run `ffqueue introspect` first",
            cache_path.display()
        )
    })?;
    cache
        .ensure_valid(&banner)
        .map_err(|err| format!("{err}; run `ffqueue introspect` to rebuild"))?;
    Ok(cache)
}

fn section_json<T: serde::Serialize>(
    section: &BTreeMap<String, T>,
    name: Option<&str>,
) -> Result<String, String> {
    match name {
        Some(name) => {
            let entry = section
                .get(name)
                .ok_or_else(|| format!("no entry named '{name}'"))?;
            serde_json::to_string_pretty(entry).map_err(|err| err.to_string())
        }
        None => serde_json::to_string_pretty(section).map_err(|err| err.to_string()),
    }
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    serde_yaml::from_str(&text).map_err(|err| format!("cannot parse {}: {err}", path.display()))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
