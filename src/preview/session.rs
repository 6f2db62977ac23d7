//! Live preview: pull composites from a running pipeline on a fixed tick,
//! write them to disk, and follow edits to the config file.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::mesh::pipeline::MeshPipeline;
use crate::preview::encode;
use crate::settings::store::SettingsStore;
use crate::settings::types::MeshConfig;

/// Refresh interval used when none is given (10 fps).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PreviewOptions {
    /// Where each composite is written; the extension picks PNG or JPEG.
    pub out: PathBuf,
    pub interval: Duration,
    /// Stop after this many frames. `None` runs until shutdown.
    pub max_frames: Option<u64>,
    /// Config file to watch for placement edits.
    pub watch_config: Option<PathBuf>,
    /// Optional downscaled copy: path and size.
    pub thumbnail: Option<(PathBuf, u32, u32)>,
}

impl PreviewOptions {
    pub fn new(out: impl Into<PathBuf>) -> Self {
        Self {
            out: out.into(),
            interval: DEFAULT_INTERVAL,
            max_frames: None,
            watch_config: None,
            thumbnail: None,
        }
    }
}

/// What a preview run did, logged when it ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub frames_written: u64,
    pub write_failures: u64,
    pub config_reloads: u64,
    pub elapsed_ms: u64,
}

/// Reloads the config file whenever its modification time changes.
pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Watch `path`, treating its current state as already seen.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        Self {
            path,
            last_modified,
        }
    }

    /// The new config if the file changed since the last poll.
    ///
    /// A file that is mid-write or invalid is skipped; the next change is
    /// picked up normally.
    pub fn poll(&mut self) -> Option<MeshConfig> {
        let current = modified(&self.path);
        if current.is_none() || current == self.last_modified {
            return None;
        }
        self.last_modified = current;
        match SettingsStore::load(&self.path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Ignoring config change: {e}");
                None
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Push the placement of every camera the pipeline already runs.
///
/// Cameras added to or removed from the file only take effect on the next
/// start. Returns how many cameras were updated.
pub fn apply_config(pipeline: &MeshPipeline, config: &MeshConfig) -> usize {
    let mut applied = 0;
    for (identity, params) in config.layout() {
        match pipeline.update_params(&identity, params) {
            Ok(()) => applied += 1,
            Err(e) => debug!("Config entry not applied until restart: {e}"),
        }
    }
    applied
}

/// Run the preview loop until `shutdown` resolves or `max_frames` frames
/// have been written.
///
/// An output path whose extension is neither PNG nor JPEG fails before
/// the first tick. After that, frame and write errors are logged and
/// counted; they never end the session.
pub async fn run_preview<F>(
    pipeline: &MeshPipeline,
    options: &PreviewOptions,
    shutdown: F,
) -> encode::Result<PreviewReport>
where
    F: Future<Output = ()>,
{
    let format = encode::format_for_path(&options.out)?;
    let started = Instant::now();
    let mut report = PreviewReport::default();
    let mut watcher = options.watch_config.as_ref().map(ConfigWatcher::new);

    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(
        out = %options.out.display(),
        interval_ms = options.interval.as_millis() as u64,
        "Preview started"
    );

    loop {
        if options.max_frames.is_some_and(|max| report.frames_written >= max) {
            break;
        }
        tokio::select! {
            _ = &mut shutdown => {
                info!("Preview interrupted");
                break;
            }
            _ = ticker.tick() => {}
        }

        if let Some(config) = watcher.as_mut().and_then(ConfigWatcher::poll) {
            let applied = apply_config(pipeline, &config);
            report.config_reloads += 1;
            info!(applied, "Config reloaded");
        }

        let canvas = match pipeline.next_frame() {
            Ok(canvas) => canvas,
            Err(e) => {
                warn!("Preview stopped: {e}");
                break;
            }
        };

        let written = encode::encode_canvas(&canvas, format)
            .and_then(|bytes| encode::write_atomic(&options.out, &bytes));
        match written {
            Ok(()) => report.frames_written += 1,
            Err(e) => {
                report.write_failures += 1;
                warn!(failures = report.write_failures, "Preview write failed: {e}");
                continue;
            }
        }

        if let Some((path, width, height)) = &options.thumbnail {
            let written = encode::thumbnail(&canvas, *width, *height)
                .and_then(|bytes| encode::write_atomic(path, &bytes));
            if let Err(e) = written {
                debug!("Thumbnail write failed: {e}");
            }
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        frames = report.frames_written,
        failures = report.write_failures,
        reloads = report.config_reloads,
        "Preview finished"
    );
    Ok(report)
}
