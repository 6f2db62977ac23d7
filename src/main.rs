//! `camera-mesh`: edit the mesh config, scan for cameras, and export or
//! preview the live composite.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use camera_mesh_lib::camera::discovery;
use camera_mesh_lib::preview::encode;
use camera_mesh_lib::preview::session::{self, PreviewOptions};
use camera_mesh_lib::settings::store::SettingsStore;
use camera_mesh_lib::settings::types::{MeshConfig, ParamUpdate};
use camera_mesh_lib::{create_backend, BackendKind, CaptureFormat, MeshPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about = "Live multi-camera mesh compositor")]
struct Cli {
    /// Mesh config file (camera name -> placement), in layer order
    #[arg(long, global = true, default_value = "config/mesh_config.json")]
    config: PathBuf,
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the config in compositing order
    Show,
    /// Add a camera with default placement on top of the stack
    Add {
        name: String,
        /// Device index to capture from
        #[arg(long)]
        device: u32,
    },
    /// Edit a camera's placement
    Set {
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        x: Option<i32>,
        #[arg(long, allow_hyphen_values = true)]
        y: Option<i32>,
        /// Degrees, counter-clockwise
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<f64>,
        /// 0.0 (invisible) to 1.0 (opaque)
        #[arg(long, allow_hyphen_values = true)]
        opacity: Option<f64>,
        #[arg(long)]
        device: Option<u32>,
    },
    /// Remove a camera
    Remove { name: String },
    /// Probe device indices for cameras
    Scan {
        #[arg(long, default_value_t = 10)]
        max: u32,
        #[arg(long, value_enum, default_value_t = BackendChoice::Auto)]
        backend: BackendChoice,
    },
    /// Capture one composite and write it as PNG or JPEG
    Export {
        #[arg(long, default_value = "mesh.png")]
        out: PathBuf,
        /// Longest wait for every camera's first frame
        #[arg(long, default_value_t = 2000)]
        warmup_ms: u64,
        #[command(flatten)]
        mesh: MeshArgs,
    },
    /// Continuously rewrite an image with the live composite
    Preview {
        #[arg(long, default_value = "preview.jpg")]
        out: PathBuf,
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
        /// Stop after this many frames instead of waiting for Ctrl-C
        #[arg(long)]
        frames: Option<u64>,
        /// Also write a 160x120 thumbnail here
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        #[command(flatten)]
        mesh: MeshArgs,
    },
}

#[derive(Args, Debug)]
struct MeshArgs {
    #[arg(long, default_value_t = 800)]
    width: u32,
    #[arg(long, default_value_t = 600)]
    height: u32,
    #[arg(long, default_value_t = 640)]
    capture_width: u32,
    #[arg(long, default_value_t = 480)]
    capture_height: u32,
    #[arg(long, default_value_t = 30.0)]
    fps: f32,
    #[arg(long, value_enum, default_value_t = BackendChoice::Auto)]
    backend: BackendChoice,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendChoice {
    Auto,
    Dummy,
    Native,
}

impl From<BackendChoice> for BackendKind {
    fn from(choice: BackendChoice) -> Self {
        match choice {
            BackendChoice::Auto => BackendKind::Auto,
            BackendChoice::Dummy => BackendKind::Dummy,
            BackendChoice::Native => BackendKind::Native,
        }
    }
}

impl MeshArgs {
    fn capture_format(&self) -> CaptureFormat {
        CaptureFormat::new(self.capture_width, self.capture_height, self.fps)
    }

    /// Build and start a pipeline for every camera in `config`.
    fn start(&self, config: &MeshConfig) -> Result<MeshPipeline> {
        if config.is_empty() {
            bail!("no cameras configured; add one with `camera-mesh add`");
        }
        let backend = create_backend(self.backend.into())?;
        let mut pipeline =
            MeshPipeline::new(backend, self.width, self.height, self.capture_format());
        pipeline
            .start(config.layout())
            .context("failed to start mesh")?;
        Ok(pipeline)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?,
        )
        .init();

    let store = SettingsStore::open(cli.config.clone())
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Command::Show => show(&store.config()),
        Command::Add { name, device } => {
            if !store.add_camera(&name, device) {
                bail!("camera '{name}' already exists");
            }
            store.save()?;
        }
        Command::Set {
            name,
            x,
            y,
            rotation,
            opacity,
            device,
        } => {
            let updates = [
                device.map(ParamUpdate::DeviceId),
                x.map(ParamUpdate::XOffset),
                y.map(ParamUpdate::YOffset),
                rotation.map(ParamUpdate::RotationDeg),
                opacity.map(ParamUpdate::Opacity),
            ];
            for update in updates.into_iter().flatten() {
                store.update_param(&name, update)?;
            }
            store.save()?;
            show(&store.config());
        }
        Command::Remove { name } => {
            if !store.remove_camera(&name) {
                bail!("camera '{name}' not found");
            }
            store.save()?;
        }
        Command::Scan { max, backend } => {
            let backend = create_backend(backend.into())?;
            let found = discovery::probe(backend.as_ref(), max, &CaptureFormat::default());
            if found.is_empty() {
                println!("No cameras found.");
            }
            for device in found {
                let status = if device.responsive { "ok" } else { "no frames" };
                println!("  [{}] {} ({status})", device.index, device.name);
            }
        }
        Command::Export {
            out,
            warmup_ms,
            mesh,
        } => {
            let mut pipeline = mesh.start(&store.config())?;
            let deadline = Instant::now() + Duration::from_millis(warmup_ms);
            while !pipeline.is_live() && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            if !pipeline.is_live() {
                warn!("Not every camera delivered a frame; exporting with blanks");
            }
            let canvas = pipeline.next_frame()?;
            pipeline.stop();
            encode::save_canvas(&canvas, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(
                "Exported {}x{} composite to {}",
                canvas.width(),
                canvas.height(),
                out.display()
            );
        }
        Command::Preview {
            out,
            interval_ms,
            frames,
            thumbnail,
            mesh,
        } => {
            encode::format_for_path(&out)
                .with_context(|| format!("cannot preview to {}", out.display()))?;
            let mut pipeline = mesh.start(&store.config())?;
            let options = PreviewOptions {
                out,
                interval: Duration::from_millis(interval_ms.max(1)),
                max_frames: frames,
                watch_config: Some(cli.config.clone()),
                thumbnail: thumbnail.map(|path| (path, 160, 120)),
            };
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Ctrl-C handler unavailable: {e}");
                    std::future::pending::<()>().await;
                }
            };
            let report = session::run_preview(&pipeline, &options, shutdown)
                .await
                .with_context(|| format!("cannot preview to {}", options.out.display()))?;

            for (camera, stats) in pipeline.diagnostics() {
                info!(
                    camera = %camera,
                    frames = stats.frame_count,
                    failures = stats.failure_count,
                    fps = stats.fps,
                    "Camera diagnostics"
                );
            }
            pipeline.stop();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn show(config: &MeshConfig) {
    if config.is_empty() {
        println!("No cameras configured.");
        return;
    }
    println!("Current camera config (bottom layer first):");
    for (name, cam) in config.iter() {
        println!("  {name} ({}):", cam.device_id);
        println!("    x_offset      = {}", cam.x_offset);
        println!("    y_offset      = {}", cam.y_offset);
        println!("    rotation_deg  = {}", cam.rotation_deg);
        println!("    opacity       = {}", cam.opacity);
    }
}
