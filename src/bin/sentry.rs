//! Sentry CLI - Command-line interface for Posture Sentry
//!
//! Commands:
//! - run: Monitor an NDJSON pose-frame stream from stdin
//! - replay: Monitor a recorded pose-frame file
//! - probe: Check actuator connectivity and input mode
//! - config: Print the default configuration as JSON
//!
//! The pose pipeline (camera capture + keypoint extraction) lives outside
//! this binary; it feeds frames in as newline-delimited JSON, one object per
//! frame: `{"keypoints": [[x, y, confidence], ...]}`. An object with missing
//! or empty keypoints is a frame with no person detected.

use clap::{Parser, Subcommand};
use log::warn;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use posture_sentry::monitor::{PoseFrame, PoseSource, PostureMonitor};
use posture_sentry::recorder::{FixedPaths, NoPrompt, SavePrompt, SaveTarget};
use posture_sentry::{
    Keypoint, MonitorConfig, MonitorError, Notifier, SessionRecorder, SENTRY_VERSION,
};

/// Sentry - real-time seated posture monitor
#[derive(Parser)]
#[command(name = "sentry")]
#[command(version = SENTRY_VERSION)]
#[command(about = "Monitor seated posture and signal an actuator on sustained slouching", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor an NDJSON pose-frame stream from stdin
    Run {
        /// Configuration file (JSON); flags below override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Actuator base URL
        #[arg(long)]
        actuator_url: Option<String>,

        /// Spine-tilt tolerance in degrees
        #[arg(long)]
        angle_threshold: Option<f64>,

        /// Where to save the session CSV; omit to discard the log
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the startup actuator connectivity probe
        #[arg(long)]
        no_probe: bool,
    },

    /// Monitor a recorded pose-frame file (same NDJSON format as `run`)
    Replay {
        /// Recorded frame file
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Where to save the session CSV; omit to discard the log
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check actuator connectivity and input mode
    Probe {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Actuator base URL
        #[arg(long)]
        actuator_url: Option<String>,
    },

    /// Print the default configuration as JSON
    Config,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), MonitorError> {
    match cli.command {
        Commands::Run {
            config,
            actuator_url,
            angle_threshold,
            output,
            no_probe,
        } => {
            let config = load_config(config.as_deref(), actuator_url, angle_threshold)?;
            let stdin = io::stdin();
            let mut source = NdjsonSource::new(stdin.lock());
            cmd_monitor(&config, &mut source, output, !no_probe)
        }

        Commands::Replay {
            input,
            config,
            output,
        } => {
            let config = load_config(config.as_deref(), None, None)?;
            let file = File::open(&input).map_err(|e| {
                MonitorError::SensorUnavailable(format!("cannot open {}: {}", input.display(), e))
            })?;
            let mut source = NdjsonSource::new(BufReader::new(file));
            cmd_monitor(&config, &mut source, output, false)
        }

        Commands::Probe {
            config,
            actuator_url,
        } => {
            let config = load_config(config.as_deref(), actuator_url, None)?;
            cmd_probe(&config);
            Ok(())
        }

        Commands::Config => {
            println!("{}", MonitorConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn load_config(
    path: Option<&Path>,
    actuator_url: Option<String>,
    angle_threshold: Option<f64>,
) -> Result<MonitorConfig, MonitorError> {
    let mut config = match path {
        Some(p) => MonitorConfig::from_json(&fs::read_to_string(p)?)?,
        None => MonitorConfig::default(),
    };
    if let Some(url) = actuator_url {
        config.actuator_url = url;
    }
    if let Some(threshold) = angle_threshold {
        config.angle_threshold_deg = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_monitor<S: PoseSource>(
    config: &MonitorConfig,
    source: &mut S,
    output: Option<PathBuf>,
    probe: bool,
) -> Result<(), MonitorError> {
    let notifier = Notifier::new(config.notifier());
    if probe {
        notifier.probe();
    }

    let mut recorder = SessionRecorder::new();
    let mut monitor = PostureMonitor::new(config, &notifier, &mut recorder);
    let report = monitor.run(source)?;

    let prompt: Box<dyn SavePrompt> = match output {
        Some(path) => Box::new(FixedPaths::new().with_path(SaveTarget::Data, path)),
        None => Box::new(NoPrompt),
    };
    match recorder.save_with_prompt(prompt.as_ref())? {
        Some(path) => println!("session data saved to {}", path.display()),
        None => println!("session data discarded"),
    }

    println!(
        "processed {} frames in {:.1}s, {} signal(s) requested",
        report.frames,
        report.duration.as_secs_f64(),
        report.signals_requested
    );

    // Queued deliveries finish on their own time
    notifier.shutdown();
    Ok(())
}

fn cmd_probe(config: &MonitorConfig) {
    println!("Sentry Probe");
    println!("============");
    println!("Version:  {}", SENTRY_VERSION);
    println!("Actuator: {}", config.actuator_url);

    let notifier = Notifier::new(config.notifier());
    notifier.probe();
    notifier.shutdown();

    if atty::is(atty::Stream::Stdin) {
        println!("stdin:    TTY (pipe pose frames in for `sentry run`)");
    } else {
        println!("stdin:    pipe (streaming mode ready)");
    }
}

/// One NDJSON line from the pose pipeline
#[derive(Deserialize)]
struct FrameLine {
    #[serde(default)]
    keypoints: Option<Vec<[f64; 3]>>,
}

/// Pose source over newline-delimited JSON frames.
///
/// A malformed line is a pose-extraction anomaly: it degrades to a
/// no-detection frame rather than ending the session. Read failures are
/// sensor failures and terminate.
struct NdjsonSource<R: BufRead> {
    reader: R,
    line: String,
}

impl<R: BufRead> NdjsonSource<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead> PoseSource for NdjsonSource<R> {
    fn next_frame(&mut self) -> Result<PoseFrame, MonitorError> {
        loop {
            self.line.clear();
            let bytes = self
                .reader
                .read_line(&mut self.line)
                .map_err(|e| MonitorError::FrameRead(e.to_string()))?;
            if bytes == 0 {
                return Ok(PoseFrame::EndOfStream);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<FrameLine>(trimmed) {
                Ok(frame) => {
                    return Ok(match frame.keypoints {
                        Some(points) if !points.is_empty() => {
                            PoseFrame::Detected(points.into_iter().map(Keypoint::from).collect())
                        }
                        _ => PoseFrame::NoDetection,
                    });
                }
                Err(e) => {
                    warn!(target: "system", "malformed pose frame, treating as no detection: {}", e);
                    return Ok(PoseFrame::NoDetection);
                }
            }
        }
    }
}
