use anyhow::{Context, Result};
use auto_looper::backend;
use auto_looper::config::{self, LooperConfig};
use auto_looper::time_index::{self, TimeIndex};
use auto_looper::{analysis, export, AnalysisSettings};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about = "Find a seamless loop point in a track and play it forever", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a track, then loop it (or save a looped copy)
    Run {
        input: PathBuf,
        /// Decoder backend: mpg123 or wav
        #[arg(long)]
        backend: Option<String>,
        /// Earliest loop start, as seconds or MM:SS.mmm
        #[arg(long = "start_time", alias = "start-time")]
        start_time: Option<String>,
        /// Write a looped WAV here instead of playing
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Length of the saved file in seconds
        #[arg(short, long, default_value_t = 600.0)]
        duration: f64,
    },
    /// Show settings, or update them with key=value pairs
    Config { assignments: Vec<String> },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path().context("no config directory on this platform")?,
    };

    match cli.command {
        Command::Run {
            input,
            backend,
            start_time,
            output,
            duration,
        } => {
            let config = LooperConfig::load(&config_path)?;
            let backend_name = backend.unwrap_or(config.backend);
            run(&input, &backend_name, start_time.as_deref(), output.as_deref(), duration)
        }
        Command::Config { assignments } => {
            let mut config = LooperConfig::load(&config_path)?;
            if !assignments.is_empty() {
                for assignment in &assignments {
                    config.set(assignment)?;
                }
                config.save(&config_path)?;
            }
            println!("{}", config);
            Ok(())
        }
    }
}

fn run(
    input: &Path,
    backend_name: &str,
    start_time: Option<&str>,
    output: Option<&Path>,
    duration: f64,
) -> Result<()> {
    println!("Loading {:?}...", input);
    let track = backend::open_track(input, backend_name).with_context(|| {
        format!(
            "failed to load {} (backends: {})",
            input.display(),
            backend::available_backends().join(", ")
        )
    })?;
    let backend = backend::backend_for(backend_name)?;
    println!(
        "Audio loaded. Sample rate: {}, Channels: {}, Frames: {}",
        track.sample_rate(),
        track.channels(),
        track.frame_count()
    );

    let mut settings = AnalysisSettings::default();
    let times = TimeIndex::from_track(&track, settings.fingerprint.leading_boundary_frames)?;

    if let Some(text) = start_time {
        let frame = times.time_to_frame(time_index::parse_timestamp(text)?);
        settings.search.start_offset =
            frame.saturating_sub(settings.fingerprint.leading_boundary_frames);
    }

    println!("Detecting loop points...");
    let points = analysis::detect_loop(&track, &settings)?;
    println!(
        "Loop from {} back to {} ({:.0}% match)",
        times.time_of_frame(points.end_frame),
        times.time_of_frame(points.start_frame),
        points.confidence * 100.0
    );

    if let Some(output_path) = output {
        println!("Exporting {:.0}s to {:?}...", duration, output_path);
        export::save_loop(&track, points.start_frame, points.end_frame, output_path, duration)?;
        println!("Export complete.");
    } else {
        println!("Playing... (press Enter or Ctrl+C to stop)");
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let mut line = String::new();
            // EOF drops the sender; playback then runs until interrupted
            if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
                let _ = tx.send(());
            }
        });
        backend.play(&track, points.start_frame, points.end_frame, &rx)?;
    }

    Ok(())
}
