//!
//! This binary provides a CLI for grouping strip detector events in time
//! and fitting per-strip delay calibrations.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};

use ruststrip_core::{Edge, Event, NoCalibration, StripDelayTable, StripId, TimeCalibration};
use ruststrip_grouping::histogram::SQRT_TWO_PI;
use ruststrip_grouping::{fit_gaussian, GroupingConfig, Hist1d, TimeGroup, TimeGrouper};
use ruststrip_io::{
    load_delay_table, store_delay_table, AssignmentWriter, JsonlEventReader, TDC_LSB_NS,
};
use ruststrip_track::{default_workers, ResidualHarness, WorkerPool};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    RuststripIo(#[from] ruststrip_io::Error),

    #[error("Grouping error: {0}")]
    Grouping(#[from] ruststrip_grouping::Error),
}

/// Strip detector event time grouping and calibration.
#[derive(Parser)]
#[command(name = "ruststrip")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group event times and write per-sample assignments
    Process {
        /// Input JSONL event file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output CSV file path
        #[arg(short, long)]
        output: PathBuf,

        /// Strip delay table applied while decoding
        #[arg(short, long)]
        calibration: Option<PathBuf>,

        /// Histogram range in nanoseconds, as LOW,HIGH
        #[arg(long, value_parser = parse_range)]
        range: Option<(f64, f64)>,

        /// Capacity of the per-event group list
        #[arg(long, default_value = "20")]
        max_groups: usize,

        /// Worker threads (0 = machine default)
        #[arg(short, long, default_value = "0")]
        jobs: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Fit per-strip time delays from grouped events
    Calibrate {
        /// Input JSONL event file
        input: PathBuf,

        /// Output delay table path
        #[arg(short, long)]
        output: PathBuf,

        /// Strip delay table applied while decoding; fitted delays add to it
        #[arg(short, long)]
        calibration: Option<PathBuf>,

        /// Minimum residual samples per strip
        #[arg(long, default_value = "100")]
        min_entries: usize,

        /// Worker threads (0 = machine default)
        #[arg(short, long, default_value = "0")]
        jobs: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a JSONL event file
    Info {
        /// Input JSONL event file
        input: PathBuf,
    },
}

/// Parses a `LOW,HIGH` time range in nanoseconds.
fn parse_range(text: &str) -> std::result::Result<(f64, f64), String> {
    let Some((low, high)) = text.split_once(',') else {
        return Err(format!("expected LOW,HIGH, got '{}'", text));
    };
    let low: f64 = low
        .trim()
        .parse()
        .map_err(|_| format!("invalid time '{}'", low))?;
    let high: f64 = high
        .trim()
        .parse()
        .map_err(|_| format!("invalid time '{}'", high))?;
    if low > high {
        return Err(format!("range is inverted: {} > {}", low, high));
    }
    Ok((low, high))
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            calibration,
            range,
            max_groups,
            jobs,
            verbose,
        } => {
            // Processing pipeline:
            // 1. Read JSONL event records
            // 2. Decode to calibrated events
            // 3. Group event times in parallel
            // 4. Write per-sample group assignments

            if verbose {
                eprintln!("Processing {} file(s)...", input.len());
                eprintln!("Max groups: {}", max_groups);
                if let Some((low, high)) = range {
                    eprintln!("Histogram range: {} to {} ns", low, high);
                }
            }

            if jobs > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .ok();
            }

            let stop = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
            signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))?;

            let start = Instant::now();

            let calibration: Box<dyn TimeCalibration> = match &calibration {
                Some(path) => {
                    let table = load_delay_table(path)?;
                    if verbose {
                        eprintln!(
                            "Calibration: {} strip delays from {}",
                            table.len(),
                            path.display()
                        );
                    }
                    Box::new(table)
                }
                None => Box::new(NoCalibration),
            };

            let mut config = GroupingConfig::new().with_max_groups(max_groups);
            if let Some((low, high)) = range {
                config = config.with_time_range(low, high);
            }
            let grouper = TimeGrouper::new(config)?;

            let mut writer = AssignmentWriter::create(&output)?;
            if verbose {
                eprintln!("Writing output to: {}", output.display());
            }

            let mut total_events = 0usize;
            let mut total_triggered = 0usize;

            for path in &input {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                if verbose {
                    eprintln!("Reading: {}", path.display());
                }

                let mut events = Vec::new();
                for record in JsonlEventReader::open(path)? {
                    events.push(record?.decode(TDC_LSB_NS, calibration.as_ref()));
                }

                let groups = grouper.process_events(&mut events, Some(&stop));
                let file_triggered = groups
                    .iter()
                    .filter(|list| list.first().is_some_and(TimeGroup::is_real))
                    .count();

                for event in &events {
                    writer.write_event(total_events, event)?;
                    total_events += 1;
                }
                total_triggered += file_triggered;

                if verbose {
                    eprintln!("  {} events read", events.len());
                    eprintln!("  {} events with a trigger group", file_triggered);
                }
            }

            writer.finish()?;

            let elapsed = start.elapsed();

            if stop.load(Ordering::Relaxed) {
                eprintln!("Interrupted, the assignment file is partial");
            }
            println!(
                "Processed {} events in {:.2}s",
                total_events,
                elapsed.as_secs_f64()
            );
            println!("Events with a trigger group: {}", total_triggered);
        }

        Commands::Calibrate {
            input,
            output,
            calibration,
            min_entries,
            jobs,
            verbose,
        } => {
            // Calibration pipeline:
            // 1. Decode and group every event
            // 2. Probe each layer against a track fit of the other layers
            // 3. Histogram corrected times per strip, relative to the
            //    event's trigger group center
            // 4. Fit each populated histogram peak to get the strip delay

            if jobs > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .ok();
            }

            let stop = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
            signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))?;

            let start = Instant::now();

            let prior = match &calibration {
                Some(path) => load_delay_table(path)?,
                None => StripDelayTable::new(),
            };
            if verbose && !prior.is_empty() {
                eprintln!("Calibration: {} existing strip delays", prior.len());
            }

            if verbose {
                eprintln!("Reading: {}", input.display());
            }
            let mut events = Vec::new();
            for record in JsonlEventReader::open(&input)? {
                events.push(record?.decode(TDC_LSB_NS, &prior));
            }

            let grouper = TimeGrouper::new(GroupingConfig::default())?;
            let group_lists = grouper.process_events(&mut events, Some(&stop));

            let workers = if jobs == 0 { default_workers() } else { jobs };
            if verbose {
                eprintln!("Probing {} events on {} workers", events.len(), workers);
            }

            let harness = ResidualHarness::default();
            let pool = WorkerPool::with_stop_flag(
                workers,
                Arc::clone(&stop),
                move |(event, reference): (Event, f64)| {
                    harness
                        .probe_event(&event)
                        .into_iter()
                        .filter_map(|probe| {
                            probe
                                .corrected_time
                                .map(|time| (probe.strip, time - reference))
                        })
                        .collect::<Vec<_>>()
                },
            );
            for (event, groups) in events.into_iter().zip(group_lists) {
                let Some(reference) = groups
                    .first()
                    .and_then(TimeGroup::info)
                    .map(|info| info.center)
                else {
                    continue;
                };
                pool.submit((event, reference));
            }

            let mut residuals: BTreeMap<StripId, Vec<f64>> = BTreeMap::new();
            for batch in pool.join() {
                for (strip, residual) in batch {
                    residuals.entry(strip).or_default().push(residual);
                }
            }

            // Unfitted strips keep their prior delay so the output table
            // stands alone.
            let mut table = prior.clone();
            let mut fitted_strips = 0usize;
            let mut skipped = 0usize;
            let mut failed = 0usize;

            for (strip, values) in &residuals {
                if values.len() < min_entries {
                    skipped += 1;
                    continue;
                }

                let mut hist = Hist1d::new(200, -50.0, 50.0);
                for &value in values {
                    hist.fill(value);
                }
                let (peak_bin, peak_height) = hist.maximum_bin();
                let mean = hist.bin_center(peak_bin);
                let half_width = 6.0;
                let (xs, ys) = hist.samples_within(mean - half_width, mean + half_width);
                let max_integral = peak_height * SQRT_TWO_PI * half_width;
                let Some(fitted) = fit_gaussian(
                    &xs,
                    &ys,
                    [peak_height, mean, half_width],
                    [max_integral * 0.01, mean - half_width * 0.2, 0.25],
                    [max_integral * 2.0, mean + half_width * 0.2, half_width * 2.0],
                ) else {
                    failed += 1;
                    if verbose {
                        eprintln!("  {}: peak fit failed, strip skipped", strip);
                    }
                    continue;
                };

                let delay = prior.delay(strip).unwrap_or(0.0) + fitted.center;
                table.set_delay(*strip, delay);
                fitted_strips += 1;
                if verbose {
                    eprintln!(
                        "  {}: {} samples, delay {:.3} ns",
                        strip,
                        values.len(),
                        delay
                    );
                }
            }

            store_delay_table(&output, &table)?;

            let elapsed = start.elapsed();

            if stop.load(Ordering::Relaxed) {
                eprintln!("Interrupted, the table covers the events probed so far");
            }
            println!(
                "Fitted {} strip delays in {:.2}s",
                fitted_strips,
                elapsed.as_secs_f64()
            );
            println!("Strips below {} samples: {}", min_entries, skipped);
            if failed > 0 {
                println!("Strips with failed fits: {}", failed);
            }
            println!("Delay table ({} strips): {}", table.len(), output.display());
        }

        Commands::Info { input } => {
            let file_size = std::fs::metadata(&input)?.len();

            let mut events = Vec::new();
            for record in JsonlEventReader::open(&input)? {
                events.push(record?.decode(TDC_LSB_NS, &NoCalibration));
            }

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Events: {}", events.len());

            let total_hits: usize = events.iter().map(Event::len).sum();
            let total_samples: usize = events
                .iter()
                .flat_map(|event| event.hits())
                .map(|hit| hit.raw_times(Edge::Leading).len())
                .sum();
            println!("Hits: {}", total_hits);
            println!("Leading samples: {}", total_samples);

            let mut lowest = f64::INFINITY;
            let mut highest = f64::NEG_INFINITY;
            for event in &events {
                let low = event.lowest_calibrated_leading_time();
                let high = event.highest_calibrated_leading_time();
                if low.is_nan() || high.is_nan() {
                    continue;
                }
                lowest = lowest.min(low);
                highest = highest.max(high);
            }
            if lowest.is_finite() {
                println!("Leading time range: {:.1} - {:.1} ns", lowest, highest);
            }
        }
    }

    Ok(())
}
