//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file I/O.
//! Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub default_base_url: String,
  pub manifest_path: String,

  // Thumbnails
  pub thumbnail_offset_secs: f64,
  pub placeholder_src: String,
  pub populate_concurrency: usize,
  pub highlight_delay_ms: u64,

  // Templates
  pub catalog_title: String,
  pub catalog_thumb_width: u32,
  pub catalog_thumb_height: u32,
  pub showcase_thumb_width: u32,
  pub showcase_thumb_height: u32,
}

impl Constants {
  /// Position in the stream the thumbnail frame is grabbed from.
  pub fn thumbnail_offset(&self) -> Duration {
    Duration::from_secs_f64(self.thumbnail_offset_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
