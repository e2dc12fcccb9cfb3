//! Error taxonomies for the manifest loader and the thumbnail store.

use thiserror::Error;

/// Why a manifest load failed. Every variant is terminal for the load.
#[derive(Error, Debug)]
pub enum ManifestError {
  #[error("HTTP {status} {reason} fetching {url}")]
  Http { url: String, status: u16, reason: String },

  #[error("request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("manifest is not valid JSON: {0}")]
  Parse(#[from] serde_json::Error),
}

impl ManifestError {
  /// HTTP status code, when the server answered at all.
  pub fn status(&self) -> Option<u16> {
    match self {
      ManifestError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  /// Short human-readable reason shown in the alert description.
  pub fn reason(&self) -> String {
    match self {
      ManifestError::Http { reason, .. } => reason.clone(),
      ManifestError::Transport { source, .. } => source.to_string(),
      ManifestError::Parse(e) => e.to_string(),
    }
  }
}

/// Why a thumbnail could not be produced.
///
/// `Clone` because one generation result is shared by every waiter of the same id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
  #[error("invalid thumbnail id {0:?}")]
  InvalidId(String),

  #[error("ffmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)")]
  ToolMissing,

  #[error("frame extraction failed for {url}: {message}")]
  Grab { url: String, message: String },

  #[error("no frame at the requested offset in {url}")]
  NoFrame { url: String },

  #[error("failed to encode thumbnail {id}: {message}")]
  Encode { id: String, message: String },

  #[error("thumbnail cache I/O error: {0}")]
  Io(String),

  #[error("thumbnail generation for {id} was cancelled")]
  Cancelled { id: String },

  #[error("thumbnail generation for {id} panicked")]
  Panicked { id: String },
}

impl From<std::io::Error> for ThumbnailError {
  fn from(e: std::io::Error) -> Self {
    ThumbnailError::Io(e.to_string())
  }
}
