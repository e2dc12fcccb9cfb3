use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::constants;

/// How selecting a label moves from the catalog to its showcase.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShowcaseTransition {
  /// Swap the catalog out; back navigation skips past it.
  #[default]
  Replace,
  /// Stack the showcase on top of the catalog.
  Push,
}

/// User preferences from `prefs.toml`. Every field is optional.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct Config {
  pub base_url: Option<String>,
  pub manifest_path: Option<String>,
  pub cache_dir: Option<PathBuf>,
  pub highlight_delay_ms: Option<u64>,
  pub showcase_transition: Option<ShowcaseTransition>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file) {
        return Self::parse(&content);
      }
    }
    Self::default()
  }

  /// Invalid TOML falls back to defaults.
  pub fn parse(content: &str) -> Self {
    toml::from_str(content).unwrap_or_default()
  }

  pub fn base_url(&self) -> &str {
    self.base_url.as_deref().unwrap_or(&constants().default_base_url)
  }

  pub fn manifest_path(&self) -> &str {
    self.manifest_path.as_deref().unwrap_or(&constants().manifest_path)
  }

  /// Explicit `cache_dir`, else `<platform cache dir>/thumbnails`, else the temp dir.
  pub fn thumbnail_dir(&self) -> PathBuf {
    if let Some(dir) = &self.cache_dir {
      return dir.clone();
    }
    match project_dirs() {
      Some(proj_dirs) => proj_dirs.cache_dir().join("thumbnails"),
      None => std::env::temp_dir().join("screensavers-thumbnails"),
    }
  }

  pub fn highlight_delay(&self) -> Duration {
    Duration::from_millis(self.highlight_delay_ms.unwrap_or(constants().highlight_delay_ms))
  }

  pub fn showcase_transition(&self) -> ShowcaseTransition {
    self.showcase_transition.unwrap_or_default()
  }
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "screensavers")
}
