use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use layerlapse::capture::stager::count_staged_frames;
use layerlapse::naming::{OutputName, next_sequence};

#[derive(Parser, Debug)]
#[command(name = "layerlapse", version)]
struct Cli {
    /// Time-lapse settings JSON; defaults apply when the file is missing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode an existing directory of `frame_NNNN.jpg` files.
    Encode(EncodeArgs),
    /// Encode or preserve frame directories left by dead processes.
    Recover,
    /// Validate a JPEG the way the frame stager does.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct EncodeArgs {
    /// Directory holding the staged frames.
    #[arg(long)]
    frames: PathBuf,

    /// Base name of the output video.
    #[arg(long)]
    name: String,

    /// Output directory (overrides the config).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// JPEG file to inspect.
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Encode(args) => cmd_encode(config, args),
        Command::Recover => cmd_recover(config),
        Command::Check(args) => cmd_check(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<layerlapse::SessionConfig> {
    match path {
        Some(p) => layerlapse::SessionConfig::load_or_default(p)
            .with_context(|| format!("load config '{}'", p.display())),
        None => Ok(layerlapse::SessionConfig::default()),
    }
}

fn orchestrator(config: &layerlapse::SessionConfig) -> layerlapse::EncodeOrchestrator {
    layerlapse::EncodeOrchestrator::software_only(layerlapse::SoftwareEncodeCascade::from_config(
        &config.transcoder,
    ))
}

fn cmd_encode(config: layerlapse::SessionConfig, args: EncodeArgs) -> anyhow::Result<()> {
    layerlapse::config::validate_base_name(&args.name)?;
    let config = config.resolved();
    let output_dir = args.out.unwrap_or_else(|| config.output_dir());

    let frame_count = count_staged_frames(&args.frames);
    if frame_count == 0 {
        anyhow::bail!("no frames found in '{}'", args.frames.display());
    }

    let report = orchestrator(&config).finalize(&layerlapse::FinalizeRequest {
        frame_dir: &args.frames,
        frame_count,
        geometry: None,
        output_dir: &output_dir,
        name: OutputName::Session {
            sequence: next_sequence(&args.name, &output_dir),
            base_name: args.name.clone(),
        },
        config: &config,
        owner_pid: std::process::id(),
    });

    if !report.succeeded() {
        anyhow::bail!("encode failed: {}", report.detail);
    }
    let outputs = report.outputs.context("encode reported no outputs")?;
    eprintln!("{}", report.detail);
    println!("{}", outputs.video.display());
    println!("{}", outputs.thumbnail.display());
    Ok(())
}

fn cmd_recover(config: layerlapse::SessionConfig) -> anyhow::Result<()> {
    let scanner =
        layerlapse::RecoveryScanner::new(&config, orchestrator(&config), Default::default());
    let summary = scanner
        .scan_blocking()
        .context("another recovery pass is running")?;
    println!("{}", summary.detail());
    if summary.failed > 0 {
        anyhow::bail!("{} orphan(s) could not be recovered", summary.failed);
    }
    Ok(())
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(&args.path).with_context(|| format!("read '{}'", args.path.display()))?;
    layerlapse::jpeg::validate_jpeg(&bytes)?;
    let info = layerlapse::jpeg::read_info(&bytes)?;
    println!(
        "{}: {}x{} {:?}, {} bytes",
        args.path.display(),
        info.width,
        info.height,
        info.subsampling,
        bytes.len()
    );
    Ok(())
}
