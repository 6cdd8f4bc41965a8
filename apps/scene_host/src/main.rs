use std::env;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Level, debug, error, info, warn};

use scene_log::{LogConfig, init_logging, parse_level};
use scene_runtime::{MemoryWorld, SceneRuntime};
use scene_schema::{SceneManifest, Validatable};

mod config;
use config::HostConfig;

mod scenes;
use scenes::SceneKind;

const VERSION: &str = "0.1.0";

/// Get default config path based on executable location
fn default_config_path() -> Option<String> {
    let exe_path = env::current_exe().ok()?;
    let stem = exe_path.file_stem()?;
    let parent = exe_path.parent()?;
    let path = parent.join(stem).with_extension("json");
    if !path.exists() {
        return None;
    }
    path.to_str().map(|s| s.to_string())
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaKind {
    Config,
    Manifest,
}

/// Headless host running example scenes on the frame-synchronized runtime
#[derive(Parser, Debug)]
#[command(name = "scene_host")]
#[command(version = VERSION)]
#[command(about = "Runs example scenes against an in-memory scene engine", long_about = None)]
struct Args {
    /// Path to configuration file (JSON); defaults apply when absent
    #[arg(short, long, env = "SCENE_CONFIG")]
    config: Option<String>,

    /// Path to a scene manifest (JSON), overrides the configured one
    #[arg(short, long, env = "SCENE_MANIFEST")]
    manifest: Option<String>,

    /// Scene to run, repeatable; all scenes when omitted
    #[arg(short, long = "scene", value_enum)]
    scenes: Vec<SceneKind>,

    /// Stop after this many frames, overrides max_frames
    #[arg(short, long)]
    frames: Option<u64>,

    /// Also write logs to this file
    #[arg(long, env = "SCENE_LOG_FILE")]
    log_file: Option<String>,

    /// Print a JSON schema and exit
    #[arg(long, value_enum)]
    print_schema: Option<SchemaKind>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    if let Some(kind) = args.print_schema {
        let schema = match kind {
            SchemaKind::Config => HostConfig::schema_json(),
            SchemaKind::Manifest => SceneManifest::schema_json(),
        };
        match schema {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to generate schema: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // We can't log errors yet, so we use eprintln! for early failures
    let config_path = args.config.clone().or_else(default_config_path);
    let config = match &config_path {
        Some(path) => match HostConfig::from_json_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load config from '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => HostConfig::default(),
    };

    let log_level = parse_level(&config.log_level).unwrap_or_else(|| {
        eprintln!("Warning: Invalid log level '{}', using INFO", config.log_level);
        Level::INFO
    });

    let log_config = match &args.log_file {
        Some(path) => match std::fs::File::create(path) {
            Ok(file) => LogConfig::new("scene_host::")
                .with_level(log_level)
                .with_log_file(file),
            Err(e) => {
                eprintln!("Unable to create log file '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => LogConfig::<std::fs::File>::new("scene_host::").with_level(log_level),
    };

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("{} v{}", config.name, VERSION);
    info!(
        "Configuration: {}",
        config_path.as_deref().unwrap_or("(built-in defaults)")
    );

    debug!("Settings:");
    debug!("  Tick Rate: {} Hz", config.tick_rate);
    debug!("  Max Frames: {}", config.max_frames);
    debug!("  Realtime: {}", config.realtime);
    debug!("  Default Timeout: {} ms", config.runtime.default_timeout_ms);
    debug!("  Poll Interval: {} frame(s)", config.runtime.poll_interval_frames);
    debug!("  Log Level: {}", config.log_level);

    let manifest = match config.load_manifest(args.manifest.as_deref()) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Manifest: {} asset(s), player on frame {}", manifest.assets.len(), manifest.player_frame);

    let selected: Vec<SceneKind> = if args.scenes.is_empty() {
        SceneKind::all().to_vec()
    } else {
        args.scenes.clone()
    };

    let mut runtime = SceneRuntime::new(MemoryWorld::new(manifest), config.runtime.clone());
    let mut procedures = Vec::new();
    for kind in &selected {
        info!("Starting scene '{}'", kind.id());
        procedures.extend(scenes::launch(*kind, &runtime));
    }

    let max_frames = args.frames.unwrap_or(config.max_frames);
    let frame_duration = config.frame_duration();
    let mut tick_interval = interval(frame_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if config.realtime {
        info!("Entering Main Loop at {} Hz (Use Ctrl+C to shutdown)", config.tick_rate);
    } else {
        info!("Entering Main Loop, frames run back to back");
    }

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut frames = 0u64;
    loop {
        if config.realtime {
            tokio::select! {
                biased;

                _ = &mut ctrl_c => {
                    info!("Received shutdown signal (Ctrl+C)");
                    break;
                }

                _ = tick_interval.tick() => {}
            }
        }

        scenes::step(&mut runtime, frame_duration);
        frames += 1;

        if max_frames > 0 && frames >= max_frames {
            info!("Frame limit of {} reached", max_frames);
            break;
        }
        if !config.realtime && max_frames == 0 && runtime.pending_tasks() == 0 {
            info!("All procedures ended after {} frame(s)", frames);
            break;
        }
    }

    info!("Shutting down scene host...");

    let mut failed = 0;
    for procedure in &procedures {
        let outcome = if procedure.handle.is_finished() {
            match procedure.handle.try_take() {
                Some(true) => "completed",
                _ => {
                    failed += 1;
                    "failed"
                }
            }
        } else {
            "interrupted"
        };
        info!("  {}::{}: {}", procedure.scene, procedure.task, outcome);
    }
    runtime.shutdown();

    if failed > 0 {
        warn!("{} procedure(s) failed", failed);
        info!("Shutdown complete.");
        std::process::exit(1);
    }
    info!("Shutdown complete.");
}
