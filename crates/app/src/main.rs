use std::{f32::consts::TAU, fs::File, io::BufWriter, path::PathBuf};

use clap::{Parser, Subcommand};
use movement_feedback_core::{
    ActivityEngine, AppConfig, FeedbackEvent, FeedbackPipeline, Handedness, Landmark,
    PlaybackClock, RawFrame, RawHand, RenderMode, Settings, SettingsPatch,
};
use tracing_subscriber::EnvFilter;

const FRAME_MS: f64 = 1000.0 / 60.0;
const KICK_INTERVAL_MS: f64 = 500.0;

fn main() -> movement_feedback_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulation(args),
        Commands::Activities => list_activities(),
        Commands::Config { path } => show_config(path),
    }
}

fn run_simulation(args: SimulateArgs) -> movement_feedback_core::Result<()> {
    let config = match &args.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };
    let sample_rate = config.audio.sample_rate;
    tracing::info!(frames = args.frames, activity = ?args.activity, "starting simulation");

    let mut clock = PlaybackClock::default();
    let mut pipeline = FeedbackPipeline::with_seed(config, clock.now(), args.seed)?;
    let events = pipeline.subscribe();

    if let Some(mode) = args.mode {
        pipeline.apply_settings(&SettingsPatch {
            render_mode: Some(mode),
            ..Default::default()
        })?;
    }
    pipeline.start(clock.now())?;
    if let Some(name) = &args.activity {
        if !pipeline.start_activity(name, None, clock.now()) {
            return Err(movement_feedback_core::FeedbackError::UnknownActivity {
                name: name.clone(),
            });
        }
    }

    let samples_per_frame = (f64::from(sample_rate) * FRAME_MS / 1000.0).round() as usize;
    for index in 0..args.frames {
        let now = clock.now();
        if args.audio {
            let block = synthetic_audio(now, samples_per_frame, sample_rate);
            pipeline.on_audio_samples(&block, now)?;
        }
        pipeline.on_perception_frame(&synthetic_frame(index, now));
        pipeline.on_animation_frame(now);

        for event in events.try_iter() {
            match event {
                FeedbackEvent::Achievement { achievement, .. } => {
                    tracing::info!(name = %achievement.name, at = now, "achievement")
                }
                FeedbackEvent::Error { source, message } => {
                    tracing::warn!(%source, %message, "activity error")
                }
                other => tracing::debug!(?other, "event"),
            }
        }
        clock.advance(FRAME_MS);
    }

    if let Some(path) = &args.snapshot {
        pipeline
            .render()
            .surface()
            .write_ppm(BufWriter::new(File::create(path)?))?;
        tracing::info!(?path, "wrote snapshot");
    }

    let summary = pipeline.session_summary(clock.now());
    pipeline.stop(clock.now());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn list_activities() -> movement_feedback_core::Result<()> {
    let engine = ActivityEngine::new(&Settings::default(), 0.0);
    println!("{}", serde_json::to_string_pretty(&engine.catalog())?);
    Ok(())
}

fn show_config(path: Option<PathBuf>) -> movement_feedback_core::Result<()> {
    let config = match path {
        Some(path) => {
            let config = AppConfig::from_json_file(&path)?;
            tracing::info!(?path, "configuration is valid");
            config
        }
        None => AppConfig::default(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Two hands circling in opposite directions, opening and closing slowly.
fn synthetic_frame(index: usize, now_ms: f64) -> RawFrame {
    let phase = (now_ms / 2_000.0) as f32 * TAU;
    let open = (index / 90) % 2 == 0;
    let left = (0.35 + 0.12 * phase.cos(), 0.5 + 0.15 * phase.sin());
    let right = (0.65 - 0.12 * phase.cos(), 0.5 + 0.15 * phase.sin());

    RawFrame {
        timestamp: now_ms,
        // The detector labels hands as seen by the camera.
        hands: vec![
            synthetic_hand(Handedness::Right, left, open),
            synthetic_hand(Handedness::Left, right, open),
        ],
    }
}

/// 21 landmarks around a mirrored screen position.
fn synthetic_hand(label: Handedness, (x, y): (f32, f32), open: bool) -> RawHand {
    let cx = 1.0 - x;
    let mut landmarks = vec![Landmark::new(cx, y, 0.0); 21];
    landmarks[0] = Landmark::new(cx, y + 0.08, 0.0);
    landmarks[4] = Landmark::new(cx - 0.08, y, 0.0);
    for (finger, (tip, pip)) in [(8, 6), (12, 10), (16, 14), (20, 18)].into_iter().enumerate() {
        let fx = cx - 0.03 + finger as f32 * 0.02;
        landmarks[pip] = Landmark::new(fx, y - 0.02, 0.0);
        let tip_y = if open { y - 0.07 } else { y + 0.01 };
        landmarks[tip] = Landmark::new(fx, tip_y, 0.0);
    }

    RawHand {
        landmarks,
        label,
        confidence: 0.92,
    }
}

/// Low sine kick every half second over a quiet pad.
fn synthetic_audio(now_ms: f64, len: usize, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let start = (now_ms / 1000.0 * f64::from(sample_rate)) as usize;
    (0..len)
        .map(|i| {
            let n = start + i;
            let t = n as f32 / rate;
            let since_kick = (n as f64 / f64::from(sample_rate) * 1000.0) % KICK_INTERVAL_MS;
            let envelope = (-(since_kick as f32) / 60.0).exp();
            0.6 * envelope * (TAU * 60.0 * t).sin() + 0.05 * (TAU * 440.0 * t).sin()
        })
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_render_mode(raw: &str) -> Result<RenderMode, String> {
    raw.parse().map_err(|err: movement_feedback_core::FeedbackError| err.to_string())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Hand movement feedback for therapy sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the pipeline with synthetic hands and print the session summary.
    Simulate(SimulateArgs),
    /// List the available activities and their default parameters.
    Activities,
    /// Print the effective configuration, validating a file when given.
    Config {
        /// Configuration file to validate.
        path: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct SimulateArgs {
    /// Number of 60 Hz frames to simulate.
    #[arg(short, long, default_value_t = 600)]
    frames: usize,
    /// Activity to run, e.g. `bilateral-coordination`.
    #[arg(short, long)]
    activity: Option<String>,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Render mode override.
    #[arg(short, long, value_parser = parse_render_mode)]
    mode: Option<RenderMode>,
    /// Feed a synthetic drum track through the analyser.
    #[arg(long)]
    audio: bool,
    /// Particle seed.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Write the final frame as a binary PPM image.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}
