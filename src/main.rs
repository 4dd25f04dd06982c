mod audio;
mod cli;
mod config;
mod encode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use cli::Cli;
use encode::wav::WavEncoder;
use spectra::spectral::{
    AnalysisSettings, DistanceMetric, EditRegion, EditSettings, EditTool, PcmFormat,
    SessionSettings, SpectralSession, SpectrumLayout,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut analysis = AnalysisSettings {
        overlap: cli.overlap,
        ..AnalysisSettings::default()
    };
    let mut edit = EditSettings {
        deform_factor: cli.deform_factor,
        metric: parse_metric(&cli.metric)?,
    };
    let mut layout = SpectrumLayout::default();
    let mut format = parse_format(&cli.format)?;

    // Load config: explicit --config path, or auto-detect spectra.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = std::path::PathBuf::from("spectra.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("spectra").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("spectra").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.overlap == 0.5 { analysis.overlap = cfg.analysis.overlap; }
            if cli.deform_factor == 0.01 { edit.deform_factor = cfg.edit.deform_factor; }
            if cli.metric == "euclidean" { edit.metric = cfg.edit.metric; }
            if cli.format == "float32" { format = cfg.export.format; }
            layout = cfg.layout;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("spectra - spectral audio editor");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());

    // 1. Decode audio
    log::info!("Decoding audio...");
    let buffer = audio::decode::decode_audio(input)?;

    // 2. Analyze
    let session = SpectralSession::new(SessionSettings {
        analysis,
        edit,
        layout,
    });
    let pb = spinner("Analyzing spectrum...")?;
    let loaded = session.load(&buffer);
    pb.finish_and_clear();
    if !loaded.context("Spectral analysis failed")? {
        anyhow::bail!("Input file contains no samples: {}", input.display());
    }

    if cli.info {
        session.read_model(|model| {
            println!("Sample rate:     {} Hz", model.sample_rate());
            println!("Samples:         {} ({:.1}s)", model.sample_count(), buffer.duration_ms() / 1000.0);
            println!("Frame size:      {}", model.frame_size());
            println!("Visible bins:    {}", model.bin_count());
            println!("Bin resolution:  {:.2} Hz", model.sample_rate() as f64 / model.frame_size() as f64);
            println!("Frames:          {} ({} without overlap)", model.frame_count(), model.chunk_count());
            println!(
                "Peak magnitude:  {:.6} ({:.1} dB)",
                model.max_magnitude(),
                spectra::spectral::model::to_db(model.max_magnitude())
            );
        });
        return Ok(());
    }

    // 3. Edit
    if !cli.points.is_empty() {
        let tool = match (cli.offset, cli.set, cli.restore) {
            (Some(direction), _, _) => EditTool::Offset { direction },
            (_, Some(value), _) => EditTool::Absolute { value },
            (_, _, true) => EditTool::Restore,
            _ => anyhow::bail!("Stroke points given without a tool: use --offset, --set or --restore"),
        };
        let region = EditRegion {
            stroke: cli.points.clone(),
            radius: cli.radius,
            tool,
        };
        let touched = session.apply_edit(&region).context("Edit failed")?;
        let frames: std::collections::BTreeSet<usize> = touched.iter().map(|&(f, _)| f).collect();
        log::info!("Edited {} cells across {} frames", touched.len(), frames.len());
        if touched.is_empty() {
            log::warn!("Stroke did not reach any cell; check --radius and the layout origin");
        }
    }

    // 4. Resynthesize
    let pb = spinner("Resynthesizing...")?;
    let rendered = session.synthesize();
    pb.finish_and_clear();
    let rendered = rendered.context("Resynthesis failed")?;
    // Synthesis covers whole frames; the padded tail is dropped.
    let samples = &rendered[..buffer.samples.len().min(rendered.len())];

    // 5. Export
    if cli.raw {
        encode::raw::write_raw(&cli.output, samples, format)?;
    } else {
        let mut encoder = WavEncoder::new(&cli.output, buffer.sample_rate, format)?;
        encoder.write_samples(samples)?;
        encoder.finish()?;
    }

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner} {msg}")
            .context("Invalid progress template")?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn parse_metric(name: &str) -> Result<DistanceMetric> {
    match name {
        "euclidean" => Ok(DistanceMetric::Euclidean),
        "planar" => Ok(DistanceMetric::Planar),
        other => anyhow::bail!("Unknown distance metric: {} (expected euclidean or planar)", other),
    }
}

fn parse_format(name: &str) -> Result<PcmFormat> {
    match name {
        "int16" => Ok(PcmFormat::Int16),
        "float32" => Ok(PcmFormat::Float32),
        "float64" => Ok(PcmFormat::Float64),
        other => anyhow::bail!("Unknown sample format: {} (expected int16, float32 or float64)", other),
    }
}
