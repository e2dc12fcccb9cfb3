//! On-disk thumbnail cache.
//!
//! A thumbnail is a single PNG frame grabbed a few seconds into the video and
//! stored as `<cache_dir>/<id>.png`. The file is written once and then served
//! as-is: there is no expiry, no size bound and no check that the source URL
//! still matches.
//!
//! Concurrent requests for the same id share one generation job. The job runs
//! on its own task, so a caller that stops waiting does not cancel it for the
//! others; [`ThumbnailStore::cancel`] does.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use image::{DynamicImage, ImageFormat};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::process::Command;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::error::ThumbnailError;

/// Extracts a single still frame from a media URL.
pub trait FrameGrabber: Send + Sync + 'static {
  fn grab_frame(&self, url: &str, offset: Duration) -> impl Future<Output = Result<DynamicImage, ThumbnailError>> + Send;
}

/// Grabs frames by piping one PNG frame out of `ffmpeg`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameGrabber;

impl FrameGrabber for FfmpegFrameGrabber {
  fn grab_frame(&self, url: &str, offset: Duration) -> impl Future<Output = Result<DynamicImage, ThumbnailError>> + Send {
    async move {
      let offset_str = format!("{:.3}", offset.as_secs_f64());
      let output = Command::new("ffmpeg")
        .args([
          "-nostdin",
          "-loglevel",
          "error",
          "-ss",
          &offset_str,
          "-i",
          url,
          "-frames:v",
          "1",
          "-f",
          "image2pipe",
          "-vcodec",
          "png",
          "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
          if e.kind() == std::io::ErrorKind::NotFound {
            ThumbnailError::ToolMissing
          } else {
            ThumbnailError::Grab { url: url.to_string(), message: format!("failed to start ffmpeg: {}", e) }
          }
        })?;

      if !output.status.success() {
        return Err(ThumbnailError::Grab {
          url: url.to_string(),
          message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
      }
      // ffmpeg exits cleanly but writes nothing when the seek lands past the end
      if output.stdout.is_empty() {
        return Err(ThumbnailError::NoFrame { url: url.to_string() });
      }

      image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
        .map_err(|e| ThumbnailError::Grab { url: url.to_string(), message: e.to_string() })
    }
  }
}

type Flight = Shared<BoxFuture<'static, Result<PathBuf, ThumbnailError>>>;

/// One running generation. `generation` tells a finished task whether the
/// entry under its id is still its own.
struct Entry {
  flight: Flight,
  abort: AbortHandle,
  generation: u64,
}

struct Inner<G> {
  cache_dir: PathBuf,
  offset: Duration,
  grabber: G,
  next_generation: AtomicU64,
  in_flight: Mutex<HashMap<String, Entry>>,
}

/// Write-once thumbnail cache with single-flight generation per id.
pub struct ThumbnailStore<G> {
  inner: Arc<Inner<G>>,
}

impl<G> Clone for ThumbnailStore<G> {
  fn clone(&self) -> Self {
    Self { inner: Arc::clone(&self.inner) }
  }
}

impl<G: FrameGrabber> ThumbnailStore<G> {
  pub fn new(cache_dir: impl Into<PathBuf>, offset: Duration, grabber: G) -> Self {
    Self {
      inner: Arc::new(Inner {
        cache_dir: cache_dir.into(),
        offset,
        grabber,
        next_generation: AtomicU64::new(0),
        in_flight: Mutex::new(HashMap::new()),
      }),
    }
  }

  pub fn cache_dir(&self) -> &Path {
    &self.inner.cache_dir
  }

  /// Deterministic cache path for `id`.
  pub fn path_for(&self, id: &str) -> Result<PathBuf, ThumbnailError> {
    if id.is_empty() || id == "." || id.contains("..") || id.contains('/') || id.contains('\\') {
      return Err(ThumbnailError::InvalidId(id.to_string()));
    }
    Ok(self.inner.cache_dir.join(format!("{}.png", id)))
  }

  /// Return the cached thumbnail for `id`, generating it from `url` on first access.
  pub async fn get(&self, id: &str, url: &str) -> Result<PathBuf, ThumbnailError> {
    let path = self.path_for(id)?;

    let flight = {
      let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
      if let Some(entry) = in_flight.get(id) {
        debug!(id = %id, "thumbnail: joining in-flight generation");
        entry.flight.clone()
      } else if path.exists() {
        debug!(id = %id, "thumbnail: cache hit");
        return Ok(path);
      } else {
        // the task cannot release its entry before this insert: it needs the lock we hold
        let entry = self.spawn_generation(id, url, path);
        let flight = entry.flight.clone();
        in_flight.insert(id.to_string(), entry);
        flight
      }
    };

    flight.await
  }

  /// Abort the in-flight generation for `id`. Every waiter gets [`ThumbnailError::Cancelled`].
  pub fn cancel(&self, id: &str) -> bool {
    let removed = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
    match removed {
      Some(entry) => {
        info!(id = %id, "thumbnail: cancelling generation");
        entry.abort.abort();
        true
      }
      None => false,
    }
  }

  /// Cancel every in-flight generation. Returns how many were cancelled.
  pub fn cancel_all(&self) -> usize {
    let ids: Vec<String> = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
    ids.iter().filter(|id| self.cancel(id)).count()
  }

  /// Number of ids currently being generated.
  #[cfg(test)]
  pub fn in_flight(&self) -> usize {
    self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  fn spawn_generation(&self, id: &str, url: &str, path: PathBuf) -> Entry {
    let inner = Arc::clone(&self.inner);
    let generation = inner.next_generation.fetch_add(1, Ordering::Relaxed);
    let task_id = id.to_string();
    let task_url = url.to_string();
    let handle = tokio::spawn(async move {
      let result = inner.generate(&task_id, &task_url, path).await;
      // The file (if any) is in place before the entry disappears, so a
      // caller that misses the entry always finds the file.
      inner.release(&task_id, generation);
      result
    });
    let abort = handle.abort_handle();

    let id = id.to_string();
    let flight = async move {
      match handle.await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(ThumbnailError::Cancelled { id }),
        Err(_) => Err(ThumbnailError::Panicked { id }),
      }
    }
    .boxed()
    .shared();

    Entry { flight, abort, generation }
  }
}

impl<G> Inner<G> {
  /// Drop the entry for `id` if it still belongs to `generation`.
  fn release(&self, id: &str, generation: u64) -> bool {
    let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
    if in_flight.get(id).is_some_and(|entry| entry.generation == generation) {
      in_flight.remove(id);
      return true;
    }
    debug!(id = %id, generation, "thumbnail: entry superseded, leaving it");
    false
  }
}

impl<G: FrameGrabber> Inner<G> {
  async fn generate(&self, id: &str, url: &str, path: PathBuf) -> Result<PathBuf, ThumbnailError> {
    info!(id = %id, url = %url, "thumbnail: cache miss, grabbing frame");

    let frame = match self.grabber.grab_frame(url, self.offset).await {
      Ok(frame) => frame,
      Err(e) => {
        warn!(id = %id, err = %e, "thumbnail: frame extraction failed");
        return Err(e);
      }
    };

    tokio::fs::create_dir_all(&self.cache_dir).await?;

    // Write to a temp file, then rename so readers never see a partial PNG
    let id_owned = id.to_string();
    let written = tokio::task::spawn_blocking(move || {
      let tmp_path = path.with_extension("png.part");
      frame
        .save_with_format(&tmp_path, ImageFormat::Png)
        .map_err(|e| ThumbnailError::Encode { id: id_owned, message: e.to_string() })?;
      std::fs::rename(&tmp_path, &path)?;
      Ok::<PathBuf, ThumbnailError>(path)
    })
    .await
    .map_err(|_| ThumbnailError::Panicked { id: id.to_string() })?;

    match &written {
      Ok(path) => info!(id = %id, path = %path.display(), "thumbnail: wrote cache file"),
      Err(e) => warn!(id = %id, err = %e, "thumbnail: failed to write cache file"),
    }
    written
  }
}
