use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use tracing::{debug, info};

use crate::error::ManifestError;

/// Lighting condition a screensaver was filmed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
  Day,
  Night,
}

impl TimeOfDay {
  pub fn label(self) -> &'static str {
    match self {
      TimeOfDay::Day => "Day",
      TimeOfDay::Night => "Night",
    }
  }
}

impl fmt::Display for TimeOfDay {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// A single video from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAsset {
  pub id: String,
  pub url: String,
  pub label: String,
  pub time_of_day: TimeOfDay,
}

/// All videos sharing one accessibility label, in first-seen id order.
#[derive(Debug, Clone, Default)]
pub struct LabelGroup {
  label: String,
  assets: Vec<VideoAsset>,
  positions: HashMap<String, usize>,
}

impl LabelGroup {
  fn new(label: String) -> Self {
    Self { label, assets: Vec::new(), positions: HashMap::new() }
  }

  /// Insert or overwrite by id. An overwrite keeps the first-seen slot.
  fn upsert(&mut self, asset: VideoAsset) {
    match self.positions.get(&asset.id) {
      Some(&pos) => {
        debug!(label = %self.label, id = %asset.id, "manifest: duplicate id, overwriting");
        self.assets[pos] = asset;
      }
      None => {
        self.positions.insert(asset.id.clone(), self.assets.len());
        self.assets.push(asset);
      }
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn assets(&self) -> &[VideoAsset] {
    &self.assets
  }

  pub fn get(&self, id: &str) -> Option<&VideoAsset> {
    self.positions.get(id).map(|&pos| &self.assets[pos])
  }

  pub fn len(&self) -> usize {
    self.assets.len()
  }
}

/// Videos grouped by label. Labels iterate in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct VideoIndex {
  groups: Vec<LabelGroup>,
  positions: HashMap<String, usize>,
}

impl VideoIndex {
  pub fn insert(&mut self, asset: VideoAsset) {
    let pos = match self.positions.get(&asset.label) {
      Some(&pos) => pos,
      None => {
        self.positions.insert(asset.label.clone(), self.groups.len());
        self.groups.push(LabelGroup::new(asset.label.clone()));
        self.groups.len() - 1
      }
    };
    self.groups[pos].upsert(asset);
  }

  pub fn groups(&self) -> &[LabelGroup] {
    &self.groups
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.groups.iter().map(|g| g.label())
  }

  pub fn group(&self, label: &str) -> Option<&LabelGroup> {
    self.positions.get(label).map(|&pos| &self.groups[pos])
  }

  pub fn asset(&self, label: &str, id: &str) -> Option<&VideoAsset> {
    self.group(label).and_then(|g| g.get(id))
  }

  pub fn label_count(&self) -> usize {
    self.groups.len()
  }

  pub fn asset_count(&self) -> usize {
    self.groups.iter().map(LabelGroup::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.groups.is_empty()
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAsset {
  id: String,
  url: String,
  accessibility_label: String,
  time_of_day: TimeOfDay,
}

/// Build a [`VideoIndex`] from the manifest body.
///
/// The body must be a JSON array. Entries without an `assets` array (or with an
/// empty one) are skipped; a malformed asset fails the whole load.
pub fn parse_manifest(body: &str) -> Result<VideoIndex, ManifestError> {
  let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
  let mut index = VideoIndex::default();

  for (slot, entry) in entries.into_iter().enumerate() {
    let Some(assets) = entry.get("assets") else {
      info!(slot, "manifest: no assets in entry, skipping");
      continue;
    };
    let assets: Vec<RawAsset> = serde_json::from_value(assets.clone())?;
    if assets.is_empty() {
      info!(slot, "manifest: empty assets in entry, skipping");
      continue;
    }
    for raw in assets {
      index.insert(VideoAsset { id: raw.id, url: raw.url, label: raw.accessibility_label, time_of_day: raw.time_of_day });
    }
  }

  info!(labels = index.label_count(), assets = index.asset_count(), "manifest: indexed");
  Ok(index)
}

/// Anything that can produce a [`VideoIndex`] for a manifest URL.
pub trait ManifestSource: Send + Sync + 'static {
  fn fetch(&self, url: &str) -> impl Future<Output = Result<VideoIndex, ManifestError>> + Send;
}

/// Fetches the manifest over plain HTTP GET.
#[derive(Debug, Clone, Default)]
pub struct HttpManifestSource {
  client: Client,
}

impl HttpManifestSource {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

impl ManifestSource for HttpManifestSource {
  fn fetch(&self, url: &str) -> impl Future<Output = Result<VideoIndex, ManifestError>> + Send {
    async move {
      info!(url = %url, "manifest: fetching");
      let transport = |source| ManifestError::Transport { url: url.to_string(), source };

      let response = self.client.get(url).send().await.map_err(transport)?;
      let status = response.status();
      if status != StatusCode::OK {
        return Err(ManifestError::Http {
          url: url.to_string(),
          status: status.as_u16(),
          reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
      }

      let body = response.text().await.map_err(transport)?;
      parse_manifest(&body)
    }
  }
}
