use anyhow::{Context, Result};
use auto_looper::analysis::{find_loop_point, pct_match, sig_corr};
use auto_looper::fingerprint::extract_fingerprint;
use auto_looper::time_index::TimeIndex;
use auto_looper::{backend, AnalysisSettings};
use clap::Parser;
use std::path::PathBuf;

/// Prints the intermediate stages of loop detection for one file.
#[derive(Parser)]
struct Args {
    input: PathBuf,
    #[arg(long, default_value = backend::DEFAULT_BACKEND)]
    backend: String,
    #[arg(long)]
    start_offset: Option<usize>,
    #[arg(long)]
    test_length: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let track = backend::open_track(&args.input, &args.backend)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    println!(
        "Loaded. Sample Rate: {}, Channels: {}, Frames: {}",
        track.sample_rate(),
        track.channels(),
        track.frame_count()
    );

    let mut settings = AnalysisSettings::default();
    if let Some(offset) = args.start_offset {
        settings.search.start_offset = offset;
    }
    if let Some(len) = args.test_length {
        settings.search.test_length = len;
    }

    // 1. Frame sizes
    let sizes: Vec<usize> = track.frames().iter().map(|f| f.byte_len()).collect();
    let lead = settings.fingerprint.leading_boundary_frames;
    if let (Some(first), Some(interior), Some(last)) = (sizes.first(), sizes.get(lead), sizes.last()) {
        println!("Frame bytes: first {}, interior {}, last {}", first, interior, last);
    }
    let times = TimeIndex::from_track(&track, lead)?;
    println!("Frames per second: {:.4}", times.frames_per_second());

    // 2. Fingerprint
    let series = extract_fingerprint(&track, &settings.fingerprint)?;
    println!(
        "Fingerprint: {} values, {} masked ({:.1}%), offset {}",
        series.len(),
        series.masked_count(),
        100.0 * series.masked_count() as f64 / series.len() as f64,
        series.frame_offset()
    );

    // 3. Search
    let candidate = match find_loop_point(&series, &settings.search) {
        Ok(c) => c,
        Err(e) => {
            println!("Search failed: {}", e);
            return Ok(());
        }
    };
    let len = settings.search.test_length;
    let start_frame = series.to_track_frame(candidate.start);
    let end_frame = series.to_track_frame(candidate.end);

    println!("--- Best Candidate ---");
    println!(
        "Start: series {} / frame {} ({})",
        candidate.start,
        start_frame,
        times.time_of_frame(start_frame)
    );
    println!(
        "End:   series {} / frame {} ({})",
        candidate.end,
        end_frame,
        times.time_of_frame(end_frame)
    );
    println!(
        "Span: {} frames ({:.2}s)",
        candidate.span(),
        times.seconds_of_frame(candidate.span())
    );
    println!("Corr: {:.4}", candidate.score);
    match pct_match(&series, candidate.start, candidate.end, len) {
        Some(pct) => println!("Exact note match: {:.1}%", pct * 100.0),
        None => println!("Exact note match: n/a (all masked)"),
    }

    // Neighbouring ends, to see how sharp the peak is
    println!("--- Neighbourhood ---");
    let lo = candidate.end.saturating_sub(3);
    for end in lo..=candidate.end + 3 {
        if let Some(r) = sig_corr(&series, candidate.start, end, len) {
            println!("end {:>6}: corr {:.4}", end, r);
        }
    }

    Ok(())
}
