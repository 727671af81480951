mod cli;

use kwzforge::{config, delivery::DirectoryDelivery, intake};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use kf_audio::{TrackSelector, WavTrackSource};
use kf_av::tools::{AUDIO_RENDERER, FFMPEG, VIDEO_RENDERER};
use kf_av::ToolRegistry;
use kf_pipeline::{AudioOutcome, ConversionRequest, ExternalStages, JobOrchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;

async fn convert(
    inputs: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let tools = ToolRegistry::discover(&config.tools, config.conversion.stage_timeout());
    for name in [FFMPEG, VIDEO_RENDERER, AUDIO_RENDERER] {
        tools.require(name)?;
    }

    let orchestrator = Arc::new(JobOrchestrator::new(
        &config.conversion,
        Arc::new(ExternalStages::new(tools)),
    )?);
    let output_dir = output_dir.unwrap_or_else(|| config.delivery.output_dir.clone());
    let delivery = Arc::new(DirectoryDelivery::new(output_dir));

    let mut requests = Vec::new();
    for input in &inputs {
        if !intake::accepts(&input.to_string_lossy()) {
            println!("Skipping {}: not a .kwz file", input.display());
            continue;
        }
        let request = ConversionRequest::from_file(input)
            .await
            .with_context(|| format!("Cannot read input file: {:?}", input))?;
        requests.push(request);
    }
    if requests.is_empty() {
        anyhow::bail!("No .kwz input files given");
    }

    tracing::info!(
        "Converting {} file(s), {} at a time",
        requests.len(),
        orchestrator.slots().capacity()
    );

    let dispatched = intake::dispatch(orchestrator, delivery.clone(), requests);
    let total = dispatched.len();
    let mut failed = 0;

    for job in dispatched {
        match job.handle.await {
            Ok(Ok(report)) => {
                let dest = delivery
                    .delivered(&report.job.id)
                    .unwrap_or_else(|| delivery.destination(&job.name));
                match report.audio {
                    AudioOutcome::Muxed => println!("✓ {} -> {}", job.name, dest.display()),
                    AudioOutcome::Silent { .. } => {
                        println!("✓ {} -> {} (no audio)", job.name, dest.display())
                    }
                }
            }
            Ok(Err(e)) => {
                failed += 1;
                println!("✗ {}: {}", job.name, e.diagnostic());
            }
            Err(e) => {
                failed += 1;
                tracing::error!("conversion task for {} panicked: {e}", job.name);
                println!("✗ {}: internal error", job.name);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} conversion(s) failed");
    }
    Ok(())
}

fn export_audio(
    tracks_dir: &Path,
    output: &Path,
    track: &str,
    sample_rate: Option<u32>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let selector: TrackSelector = track.parse()?;
    let sample_rate = sample_rate.unwrap_or(config.conversion.sample_rate_hz);

    if !tracks_dir.is_dir() {
        anyhow::bail!("Tracks directory does not exist: {:?}", tracks_dir);
    }

    let source = WavTrackSource::new(tracks_dir);
    let rendered = kf_audio::render(&source, selector, sample_rate)
        .with_context(|| format!("Failed to render track {selector}"))?;
    kf_audio::write_wav(output, &rendered.samples, rendered.sample_rate)
        .with_context(|| format!("Failed to write {:?}", output))?;

    println!(
        "Wrote {} samples ({selector}) at {} Hz to {}",
        rendered.samples.len(),
        rendered.sample_rate,
        output.display()
    );
    Ok(())
}

async fn check_tools(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools, config.conversion.stage_timeout());
    let infos = tools.check_all().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("Checking external tools...\n");
    let mut all_ok = true;

    for tool in &infos {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Conversion needs all of them.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!(
        "  Concurrent jobs: {}",
        config.conversion.max_concurrent_jobs
    );
    println!("  Stage timeout: {}s", config.conversion.stage_timeout_secs);
    println!(
        "  Max input size: {} bytes",
        config.conversion.max_input_size_bytes
    );
    println!("  Sample rate: {} Hz", config.conversion.sample_rate_hz);
    println!("  Output dir: {}", config.delivery.output_dir.display());

    for warning in config.validate() {
        println!("  warning: {warning}");
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "kwzforge=trace,kf_core=trace,kf_audio=trace,kf_av=trace,kf_pipeline=trace".to_string()
        } else {
            "kwzforge=debug,kf_core=debug,kf_audio=debug,kf_av=debug,kf_pipeline=debug".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert { inputs, output_dir } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert(inputs, output_dir, cli.config.as_deref()))
        }
        Commands::ExportAudio {
            tracks_dir,
            output,
            track,
            sample_rate,
        } => export_audio(
            &tracks_dir,
            &output,
            &track,
            sample_rate,
            cli.config.as_deref(),
        ),
        Commands::CheckTools { json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref(), json))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("kwzforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
