//! gesture-pointer - drive the pointer with hand gestures.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use gesture_pointer::config::{parse_confidence, parse_resolution, ControllerConfig, PipelineConfig};
use gesture_pointer::mapping::FileMappingStore;
use gesture_pointer::service::{self, ServiceOptions};

#[derive(Parser, Debug)]
#[command(name = "gesture-pointer", about = "Hand-gesture pointer controller", version)]
struct Cli {
    /// Recorded landmark file to replay; repeat for independent streams
    #[arg(long = "replay", value_name = "PATH")]
    replays: Vec<PathBuf>,

    /// Replay pacing in frames per second (0 = as fast as possible)
    #[arg(long, default_value_t = 30)]
    replay_fps: u32,

    /// Gesture-to-action mapping file
    #[arg(long, value_name = "PATH")]
    mapping: Option<PathBuf>,

    /// Treat the left hand as the dominant (Major) hand
    #[arg(long)]
    left_handed: bool,

    /// Virtual screen size for the headless pointer, WxH
    #[arg(long, default_value = "1920x1080", value_parser = parse_resolution)]
    screen: (u32, u32),

    /// Duration of each pointer move in milliseconds
    #[arg(long, default_value_t = 100)]
    move_duration_ms: u64,

    /// Minimum detection confidence in [0, 1]
    #[arg(long, default_value = "0.5", value_parser = parse_confidence)]
    min_detection_confidence: f32,

    /// Minimum tracking confidence in [0, 1]
    #[arg(long, default_value = "0.5", value_parser = parse_confidence)]
    min_tracking_confidence: f32,

    /// IPC socket path (default: $XDG_RUNTIME_DIR/gesture-pointer.sock)
    #[arg(long)]
    ipc_socket: Option<PathBuf>,

    /// Log all IPC messages
    #[arg(long)]
    ipc_trace: bool,

    /// Start with gesture processing disabled
    #[arg(long)]
    start_disabled: bool,

    /// Write the default mapping to the mapping path and exit
    #[arg(long)]
    write_default_mapping: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_pointer=info".into()),
        )
        .init();

    let mut pipeline = PipelineConfig {
        min_detection_confidence: cli.min_detection_confidence,
        min_tracking_confidence: cli.min_tracking_confidence,
        screen: cli.screen,
        start_enabled: !cli.start_disabled,
        ..PipelineConfig::default()
    };
    if let Some(path) = cli.mapping {
        pipeline.mapping_path = path;
    }

    if cli.write_default_mapping {
        return FileMappingStore::write_default(&pipeline.mapping_path);
    }

    let mut controller = ControllerConfig::default()
        .with_move_duration(Duration::from_millis(cli.move_duration_ms));
    controller.dominant_right = !cli.left_handed;

    info!("gesture-pointer v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        mapping = %pipeline.mapping_path.display(),
        dominant = if controller.dominant_right { "right" } else { "left" },
        streams = cli.replays.len(),
        "configuration"
    );

    service::run(ServiceOptions {
        controller,
        pipeline,
        replays: cli.replays,
        replay_fps: cli.replay_fps,
        ipc_socket: cli.ipc_socket,
        ipc_trace: cli.ipc_trace,
        ..ServiceOptions::default()
    })
}
