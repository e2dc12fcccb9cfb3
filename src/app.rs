use anyhow::{Context, Result, anyhow};
use futures::stream::{self, StreamExt};
use reqwest::Url;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ShowcaseTransition};
use crate::constants::constants;
use crate::document::{Document, DocumentKind, Trigger, UiEvent};
use crate::error::{ManifestError, ThumbnailError};
use crate::manifest::{ManifestSource, VideoAsset, VideoIndex};
use crate::navigation::{DocumentId, NavigationStack, Screen};
use crate::player::{MediaItem, Playback, Playlist};
use crate::templates;
use crate::thumbnail::{FrameGrabber, ThumbnailStore};

// --- Types ---

/// Options the host passes on launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
  pub base_url: String,
  pub manifest_path: String,
}

impl LaunchOptions {
  pub fn manifest_url(&self) -> Result<String> {
    let base = Url::parse(&self.base_url).with_context(|| format!("Invalid base URL {}", self.base_url))?;
    let url = base.join(&self.manifest_path).with_context(|| format!("Invalid manifest path {}", self.manifest_path))?;
    Ok(url.to_string())
  }
}

/// Host lifecycle notifications after launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
  WillResignActive,
  DidEnterBackground,
  WillEnterForeground,
  DidBecomeActive,
  WillTerminate,
}

/// Behaviour knobs, resolved from `Config` and the embedded constants.
#[derive(Debug, Clone)]
pub struct Settings {
  pub highlight_delay: Duration,
  pub placeholder_src: String,
  pub showcase_transition: ShowcaseTransition,
  pub populate_concurrency: usize,
}

impl Settings {
  pub fn from_config(config: &Config) -> Self {
    let c = constants();
    Self {
      highlight_delay: config.highlight_delay(),
      placeholder_src: c.placeholder_src.clone(),
      showcase_transition: config.showcase_transition(),
      populate_concurrency: c.populate_concurrency.max(1),
    }
  }
}

/// One thumbnail of a highlighted catalog section.
struct ThumbnailUpdate {
  label: String,
  asset_id: String,
  result: Result<PathBuf, ThumbnailError>,
}

/// All thumbnails of a showcase, resolved off the UI loop.
struct ShowcaseReady {
  label: String,
  target: DocumentId,
  thumbnails: HashMap<String, Result<PathBuf, ThumbnailError>>,
}

/// In-flight async task receivers and handles.
#[derive(Default)]
struct AsyncTasks {
  manifest_rx: Option<oneshot::Receiver<Result<VideoIndex, ManifestError>>>,
  manifest_handle: Option<JoinHandle<()>>,
  manifest_target: Option<DocumentId>,
  showcase_rx: Option<oneshot::Receiver<ShowcaseReady>>,
  showcase_handle: Option<JoinHandle<()>>,
  showcase_target: Option<DocumentId>,
  population_handle: Option<JoinHandle<()>>,
}

/// Image source for a cached thumbnail.
fn file_src(path: &Path) -> String {
  Url::from_file_path(path).map(|u| u.to_string()).unwrap_or_else(|()| path.display().to_string())
}

// --- App ---

/// Navigation and event controller.
///
/// Owns the document stack and the current index. Background work reports
/// back through channels that [`App::check_pending`] drains on the host loop.
pub struct App<S, G, P> {
  pub stack: NavigationStack,
  pub player: P,
  pub last_error: Option<String>,
  index: Option<Arc<VideoIndex>>,
  manifest_url: Option<String>,
  source: Arc<S>,
  thumbnails: ThumbnailStore<G>,
  settings: Settings,
  tasks: AsyncTasks,
  thumb_tx: mpsc::UnboundedSender<ThumbnailUpdate>,
  thumb_rx: mpsc::UnboundedReceiver<ThumbnailUpdate>,
}

impl<S: ManifestSource, G: FrameGrabber, P: Playback> App<S, G, P> {
  pub fn new(source: Arc<S>, thumbnails: ThumbnailStore<G>, player: P, settings: Settings) -> Self {
    let (thumb_tx, thumb_rx) = mpsc::unbounded_channel();
    Self {
      stack: NavigationStack::default(),
      player,
      last_error: None,
      index: None,
      manifest_url: None,
      source,
      thumbnails,
      settings,
      tasks: AsyncTasks::default(),
      thumb_tx,
      thumb_rx,
    }
  }

  pub fn index(&self) -> Option<&VideoIndex> {
    self.index.as_deref()
  }

  pub fn screen(&self) -> Screen {
    self.stack.screen()
  }

  // --- Lifecycle ---

  /// Show the loading screen and start fetching the manifest.
  pub fn launch(&mut self, options: &LaunchOptions) -> Result<()> {
    let url = options.manifest_url()?;
    info!(url = %url, "lifecycle: launch");
    self.manifest_url = Some(url);
    let loading = self.stack.push(templates::loading(None));
    self.trigger_manifest_load(loading);
    Ok(())
  }

  pub async fn on_lifecycle(&mut self, event: LifecycleEvent) -> Result<()> {
    info!(event = ?event, "lifecycle: notification");
    match event {
      LifecycleEvent::WillResignActive | LifecycleEvent::DidEnterBackground => self.cancel_population(),
      LifecycleEvent::WillEnterForeground | LifecycleEvent::DidBecomeActive => {}
      LifecycleEvent::WillTerminate => {
        self.cancel_manifest_load();
        self.cancel_showcase();
        self.cancel_population();
        let cancelled = self.thumbnails.cancel_all();
        if cancelled > 0 {
          info!(cancelled, "lifecycle: cancelled thumbnail generations");
        }
        self.player.stop().await.context("Failed to stop playback on terminate")?;
      }
    }
    Ok(())
  }

  /// Replace the top document with a loading screen and fetch the manifest again.
  pub fn reload(&mut self) -> Result<()> {
    if self.manifest_url.is_none() {
      return Err(anyhow!("reload requested before launch"));
    }
    let loading = templates::loading(None);
    let target = match self.stack.top_id() {
      Some(top) => self.stack.replace(top, loading),
      None => self.stack.push(loading),
    };
    self.trigger_manifest_load(target);
    Ok(())
  }

  /// Host "back": dismiss the modal if one is up, otherwise pop. Work still
  /// headed for the popped document is cancelled with it.
  pub fn back(&mut self) -> Option<Document> {
    if let Some(doc) = self.stack.dismiss_modal() {
      return Some(doc);
    }
    let top = self.stack.top_id()?;
    if self.tasks.showcase_target == Some(top) {
      debug!("nav: back during showcase load, cancelling it");
      self.cancel_showcase();
    }
    if self.tasks.manifest_target == Some(top) {
      debug!("nav: back during manifest load, cancelling it");
      self.cancel_manifest_load();
    }
    self.stack.pop()
  }

  // --- Background tasks ---

  fn trigger_manifest_load(&mut self, target: DocumentId) {
    self.cancel_manifest_load();
    let Some(url) = self.manifest_url.clone() else { return };

    let source = Arc::clone(&self.source);
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
      let _ = tx.send(source.fetch(&url).await);
    });
    self.tasks.manifest_rx = Some(rx);
    self.tasks.manifest_handle = Some(handle);
    self.tasks.manifest_target = Some(target);
  }

  /// Abort a superseded manifest fetch.
  fn cancel_manifest_load(&mut self) {
    if let Some(handle) = self.tasks.manifest_handle.take() {
      handle.abort();
    }
    self.tasks.manifest_rx = None;
    self.tasks.manifest_target = None;
  }

  fn cancel_showcase(&mut self) {
    if let Some(handle) = self.tasks.showcase_handle.take() {
      handle.abort();
    }
    self.tasks.showcase_rx = None;
    self.tasks.showcase_target = None;
  }

  /// Drop the pending thumbnail population batch, if any.
  fn cancel_population(&mut self) {
    if let Some(handle) = self.tasks.population_handle.take()
      && !handle.is_finished()
    {
      debug!("nav: cancelling pending thumbnail population");
      handle.abort();
    }
  }

  pub fn has_pending(&self) -> bool {
    self.tasks.manifest_rx.is_some()
      || self.tasks.showcase_rx.is_some()
      || self.tasks.population_handle.as_ref().is_some_and(|h| !h.is_finished())
  }

  /// Apply every finished background result to the document stack.
  pub async fn check_pending(&mut self) -> Result<()> {
    if let Some(mut rx) = self.tasks.manifest_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.tasks.manifest_handle = None;
          let target = self.tasks.manifest_target.take();
          self.on_manifest_loaded(result, target);
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.manifest_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.tasks.manifest_handle = None;
          self.tasks.manifest_target = None;
          self.last_error = Some("Manifest task failed.".to_string());
        }
      }
    }

    if let Some(mut rx) = self.tasks.showcase_rx.take() {
      match rx.try_recv() {
        Ok(ready) => {
          self.tasks.showcase_handle = None;
          self.tasks.showcase_target = None;
          self.on_showcase_ready(ready);
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.showcase_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.tasks.showcase_handle = None;
          self.tasks.showcase_target = None;
          self.last_error = Some("Showcase task failed.".to_string());
        }
      }
    }

    while let Ok(update) = self.thumb_rx.try_recv() {
      self.apply_thumbnail(update);
    }

    Ok(())
  }

  /// Poll until no background work is left.
  pub async fn settle(&mut self) -> Result<()> {
    loop {
      let busy = self.has_pending();
      self.check_pending().await?;
      if !busy {
        return Ok(());
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  }

  fn on_manifest_loaded(&mut self, result: Result<VideoIndex, ManifestError>, target: Option<DocumentId>) {
    match result {
      Ok(index) => {
        let catalog = templates::catalog(&index, &self.settings.placeholder_src);
        info!(labels = index.label_count(), assets = index.asset_count(), "nav: showing catalog");
        self.index = Some(Arc::new(index));
        match target {
          Some(target) if self.stack.contains(target) => {
            self.stack.replace(target, catalog);
          }
          Some(_) => debug!("nav: loading document gone, catalog not shown"),
          None => {
            self.stack.push(catalog);
          }
        }
      }
      Err(e) => {
        error!(err = %e, "manifest: load failed");
        let url = self.manifest_url.clone().unwrap_or_default();
        if let Some(target) = target {
          self.stack.remove(target);
        }
        self.stack.present_modal(templates::fetch_error_alert(&url, &e));
        self.last_error = Some(e.to_string());
      }
    }
  }

  fn on_showcase_ready(&mut self, ready: ShowcaseReady) {
    if !self.stack.contains(ready.target) {
      debug!(label = %ready.label, "nav: showcase target gone, dropping result");
      return;
    }
    let Some(index) = self.index.clone() else { return };
    let Some(group) = index.group(&ready.label) else {
      warn!(label = %ready.label, "nav: label vanished before showcase was ready");
      return;
    };

    let mut sources = HashMap::new();
    for (id, result) in ready.thumbnails {
      match result {
        Ok(path) => {
          sources.insert(id, file_src(&path));
        }
        Err(e) => warn!(id = %id, err = %e, "nav: thumbnail unavailable, using placeholder"),
      }
    }

    let doc = templates::showcase(group, &sources, &self.settings.placeholder_src);
    info!(label = %ready.label, videos = group.len(), "nav: showing showcase");
    self.stack.replace(ready.target, doc);
  }

  fn apply_thumbnail(&mut self, update: ThumbnailUpdate) {
    let src = match update.result {
      Ok(path) => file_src(&path),
      Err(e) => {
        warn!(id = %update.asset_id, err = %e, "nav: thumbnail unavailable, keeping placeholder");
        return;
      }
    };
    let Some(catalog) = self.stack.find_kind_mut(DocumentKind::Catalog) else {
      debug!(id = %update.asset_id, "nav: catalog gone, dropping thumbnail update");
      return;
    };
    let highlight = UiEvent::HighlightSection { label: update.label };
    let Some(section) = catalog.element_for(Trigger::Highlight, &highlight).map(str::to_string) else { return };
    catalog.set_image_src(&section, &update.asset_id, &src);
  }

  // --- Events ---

  /// Resolve a host interaction against the visible document and handle it.
  /// Returns `false` when nothing is bound to `(element_id, trigger)`.
  pub async fn dispatch(&mut self, element_id: &str, trigger: Trigger) -> Result<bool> {
    let Some(event) = self.stack.visible().and_then(|doc| doc.resolve(element_id, trigger)).cloned() else {
      debug!(element = %element_id, trigger = ?trigger, "nav: no binding");
      return Ok(false);
    };
    self.handle_event(event).await?;
    Ok(true)
  }

  pub async fn handle_event(&mut self, event: UiEvent) -> Result<()> {
    match event {
      UiEvent::SelectVideo { url } => self.play(url).await,
      UiEvent::SelectLabel { label } => {
        self.open_showcase(&label);
        Ok(())
      }
      UiEvent::HighlightSection { label } => {
        self.schedule_population(&label);
        Ok(())
      }
    }
  }

  async fn play(&mut self, url: String) -> Result<()> {
    info!(url = %url, "nav: handing video to player");
    if let Err(e) = self.player.play(Playlist::single(MediaItem::video(url))).await {
      error!(err = %e, "player: playback failed");
      self.last_error = Some(format!("Playback error: {:#}", e));
    }
    Ok(())
  }

  /// Show a loading screen for `label`, then its showcase once every thumbnail is resolved.
  fn open_showcase(&mut self, label: &str) {
    let Some(index) = self.index.clone() else {
      warn!(label = %label, "nav: showcase requested before the manifest loaded");
      return;
    };
    let Some(group) = index.group(label) else {
      warn!(label = %label, "nav: unknown label");
      return;
    };

    let loading = templates::loading(Some(&format!("Loading {}...", label)));
    let target = match (self.settings.showcase_transition, self.stack.top_id()) {
      (ShowcaseTransition::Replace, Some(top)) => self.stack.replace(top, loading),
      _ => self.stack.push(loading),
    };

    self.cancel_showcase();
    let assets: Vec<VideoAsset> = group.assets().to_vec();
    let store = self.thumbnails.clone();
    let concurrency = self.settings.populate_concurrency;
    let label = label.to_string();

    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
      let thumbnails = stream::iter(assets)
        .map(|asset| {
          let store = store.clone();
          async move {
            let result = store.get(&asset.id, &asset.url).await;
            (asset.id, result)
          }
        })
        .buffer_unordered(concurrency)
        .collect::<HashMap<_, _>>()
        .await;
      let _ = tx.send(ShowcaseReady { label, target, thumbnails });
    });
    self.tasks.showcase_rx = Some(rx);
    self.tasks.showcase_handle = Some(handle);
    self.tasks.showcase_target = Some(target);
  }

  /// Populate a catalog section's thumbnails after the highlight delay.
  /// A newer highlight cancels the pending batch first.
  fn schedule_population(&mut self, label: &str) {
    self.cancel_population();
    let Some(index) = self.index.clone() else { return };
    let Some(group) = index.group(label) else { return };

    let assets: Vec<VideoAsset> = group.assets().to_vec();
    let store = self.thumbnails.clone();
    let tx = self.thumb_tx.clone();
    let delay = self.settings.highlight_delay;
    let concurrency = self.settings.populate_concurrency;
    let label = label.to_string();

    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      info!(label = %label, count = assets.len(), "nav: populating section thumbnails");
      stream::iter(assets)
        .map(|asset| {
          let store = store.clone();
          let tx = tx.clone();
          let label = label.clone();
          async move {
            let result = store.get(&asset.id, &asset.url).await;
            let _ = tx.send(ThumbnailUpdate { label, asset_id: asset.id, result });
          }
        })
        .buffer_unordered(concurrency)
        .collect::<()>()
        .await;
    });
    self.tasks.population_handle = Some(handle);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::parse_manifest;
  use image::DynamicImage;
  use std::future::Future;
  use std::sync::Mutex;
  use std::sync::atomic::{AtomicUsize, Ordering};

  const MANIFEST: &str = r#"[
    {"assets":[
      {"id":"a1","url":"http://x/a1.mov","accessibilityLabel":"Nature","timeOfDay":"day"},
      {"id":"a2","url":"http://x/a2.mov","accessibilityLabel":"Nature","timeOfDay":"night"}
    ]},
    {"id":"no-assets"},
    {"assets":[
      {"id":"c1","url":"http://x/c1.mov","accessibilityLabel":"City","timeOfDay":"night"}
    ]}
  ]"#;

  #[derive(Clone)]
  enum MockResponse {
    Body(String),
    Status(u16),
  }

  struct MockSource {
    response: Mutex<MockResponse>,
  }

  impl MockSource {
    fn new(response: MockResponse) -> Arc<Self> {
      Arc::new(Self { response: Mutex::new(response) })
    }

    fn set(&self, response: MockResponse) {
      *self.response.lock().unwrap() = response;
    }
  }

  impl ManifestSource for MockSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<VideoIndex, ManifestError>> + Send {
      async move {
        let response = self.response.lock().unwrap().clone();
        match response {
          MockResponse::Body(body) => parse_manifest(&body),
          MockResponse::Status(status) => {
            Err(ManifestError::Http { url: url.to_string(), status, reason: "Not Found".to_string() })
          }
        }
      }
    }
  }

  #[derive(Default)]
  struct Grabber {
    calls: AtomicUsize,
    fail: bool,
  }

  impl FrameGrabber for Arc<Grabber> {
    fn grab_frame(&self, url: &str, _offset: Duration) -> impl Future<Output = Result<DynamicImage, ThumbnailError>> + Send {
      async move {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
          return Err(ThumbnailError::NoFrame { url: url.to_string() });
        }
        Ok(DynamicImage::new_rgb8(2, 2))
      }
    }
  }

  #[derive(Default)]
  struct RecordingPlayer {
    played: Vec<Playlist>,
    stopped: usize,
  }

  impl Playback for RecordingPlayer {
    fn play(&mut self, playlist: Playlist) -> impl Future<Output = Result<()>> + Send {
      self.played.push(playlist);
      async { Ok(()) }
    }

    fn stop(&mut self) -> impl Future<Output = Result<()>> + Send {
      self.stopped += 1;
      async { Ok(()) }
    }
  }

  type TestApp = App<MockSource, Arc<Grabber>, RecordingPlayer>;

  struct Harness {
    app: TestApp,
    source: Arc<MockSource>,
    grabber: Arc<Grabber>,
    _dir: tempfile::TempDir,
  }

  fn harness(response: MockResponse, transition: ShowcaseTransition, fail_thumbnails: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let grabber = Arc::new(Grabber { fail: fail_thumbnails, ..Default::default() });
    let store = ThumbnailStore::new(dir.path().to_path_buf(), Duration::from_secs(3), Arc::clone(&grabber));
    let source = MockSource::new(response);
    let settings = Settings {
      highlight_delay: Duration::from_millis(10),
      placeholder_src: "resource://_pattern".to_string(),
      showcase_transition: transition,
      populate_concurrency: 2,
    };
    let app = App::new(Arc::clone(&source), store, RecordingPlayer::default(), settings);
    Harness { app, source, grabber, _dir: dir }
  }

  fn options() -> LaunchOptions {
    LaunchOptions { base_url: "http://x/".to_string(), manifest_path: "data/m.json".to_string() }
  }

  async fn launched(response: MockResponse, transition: ShowcaseTransition) -> Harness {
    let mut h = harness(response, transition, false);
    h.app.launch(&options()).unwrap();
    h.app.settle().await.unwrap();
    h
  }

  fn img_src<'a>(doc: &'a Document, section: &str, img: &str) -> Option<&'a str> {
    let section = doc.element_by_id(section)?;
    section.descendants("img").into_iter().find(|e| e.id() == Some(img))?.get_attr("src")
  }

  #[test]
  fn manifest_url_joins_base_and_path() {
    assert_eq!(options().manifest_url().unwrap(), "http://x/data/m.json");
    let bad = LaunchOptions { base_url: "not a url".into(), manifest_path: "m.json".into() };
    assert!(bad.manifest_url().is_err());
  }

  #[tokio::test]
  async fn launch_shows_loading_then_catalog() {
    let mut h = harness(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace, false);
    h.app.launch(&options()).unwrap();
    assert_eq!(h.app.screen(), Screen::Loading);

    h.app.settle().await.unwrap();
    assert_eq!(h.app.screen(), Screen::Catalog);
    assert_eq!(h.app.stack.depth(), 1);
    let index = h.app.index().unwrap();
    assert_eq!(index.labels().collect::<Vec<_>>(), vec!["Nature", "City"]);
    assert_eq!(index.asset_count(), 3);
  }

  #[tokio::test]
  async fn http_404_pops_loading_and_presents_alert() {
    let h = launched(MockResponse::Status(404), ShowcaseTransition::Replace).await;
    assert_eq!(h.app.screen(), Screen::Alert);
    assert_eq!(h.app.stack.depth(), 0);
    let alert = h.app.stack.modal().unwrap();
    let title = alert.find_all("title")[0].inner_text();
    assert!(title.contains("404"), "title was {title}");
    assert!(h.app.index().is_none());
    assert!(h.app.last_error.is_some());
  }

  #[tokio::test]
  async fn failed_reload_keeps_previous_index() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace).await;
    h.source.set(MockResponse::Status(500));

    h.app.reload().unwrap();
    assert_eq!(h.app.screen(), Screen::Loading);
    h.app.settle().await.unwrap();

    assert_eq!(h.app.screen(), Screen::Alert);
    assert_eq!(h.app.index().unwrap().label_count(), 2);
  }

  #[tokio::test]
  async fn malformed_manifest_presents_fetch_error_alert() {
    let h = launched(MockResponse::Body("nope".into()), ShowcaseTransition::Replace).await;
    assert_eq!(h.app.screen(), Screen::Alert);
    assert_eq!(h.app.stack.depth(), 0);
    let alert = h.app.stack.modal().unwrap();
    assert_eq!(alert.find_all("title")[0].inner_text(), "Fetch Error");
    assert!(h.app.index().is_none());
  }

  #[tokio::test]
  async fn back_during_showcase_load_drops_the_showcase() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Push).await;

    h.app.handle_event(UiEvent::SelectLabel { label: "Nature".into() }).await.unwrap();
    assert_eq!(h.app.stack.depth(), 2);
    h.app.back();
    assert_eq!(h.app.screen(), Screen::Catalog);

    h.app.settle().await.unwrap();
    assert_eq!(h.app.screen(), Screen::Catalog);
    assert_eq!(h.app.stack.depth(), 1);
  }

  #[tokio::test]
  async fn back_during_reload_keeps_the_catalog() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Push).await;
    h.app.handle_event(UiEvent::SelectLabel { label: "Nature".into() }).await.unwrap();
    h.app.settle().await.unwrap();
    assert_eq!(h.app.screen(), Screen::Showcase);

    h.source.set(MockResponse::Status(500));
    h.app.reload().unwrap();
    h.app.back();
    assert_eq!(h.app.screen(), Screen::Catalog);

    h.app.settle().await.unwrap();
    assert_eq!(h.app.screen(), Screen::Catalog);
    assert_eq!(h.app.stack.depth(), 1);
    assert!(h.app.stack.modal().is_none());
  }

  #[tokio::test]
  async fn failed_fetch_removes_only_its_loading_document() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Push).await;
    h.source.set(MockResponse::Status(500));

    h.app.reload().unwrap();
    h.app.handle_event(UiEvent::SelectLabel { label: "City".into() }).await.unwrap();
    assert_eq!(h.app.stack.depth(), 2);
    h.app.settle().await.unwrap();

    assert_eq!(h.app.screen(), Screen::Alert);
    assert_eq!(h.app.stack.depth(), 1);
    assert_eq!(h.app.stack.top().map(Document::kind), Some(DocumentKind::Showcase));
  }

  #[tokio::test]
  async fn reload_before_launch_is_an_error() {
    let mut h = harness(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace, false);
    assert!(h.app.reload().is_err());
  }

  #[tokio::test]
  async fn selecting_a_section_replaces_catalog_with_showcase() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace).await;

    assert!(h.app.dispatch("section-0", Trigger::Select).await.unwrap());
    assert_eq!(h.app.screen(), Screen::Loading);
    h.app.settle().await.unwrap();

    assert_eq!(h.app.screen(), Screen::Showcase);
    assert_eq!(h.app.stack.depth(), 1);
    let showcase = h.app.stack.top().unwrap();
    let srcs: Vec<_> = showcase.find_all("img").iter().filter_map(|e| e.get_attr("src")).collect();
    assert_eq!(srcs.len(), 2);
    assert!(srcs.iter().all(|s| s.starts_with("file://") && s.ends_with(".png")));
    assert_eq!(h.grabber.calls.load(Ordering::SeqCst), 2);

    // catalog was discarded, back leaves nothing behind
    h.app.back();
    assert_eq!(h.app.screen(), Screen::Empty);
  }

  #[tokio::test]
  async fn push_transition_keeps_catalog_for_back() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Push).await;

    h.app.handle_event(UiEvent::SelectLabel { label: "City".into() }).await.unwrap();
    h.app.settle().await.unwrap();
    assert_eq!(h.app.screen(), Screen::Showcase);
    assert_eq!(h.app.stack.depth(), 2);

    h.app.back();
    assert_eq!(h.app.screen(), Screen::Catalog);
  }

  #[tokio::test]
  async fn failed_thumbnails_render_placeholder_in_showcase() {
    let mut h = harness(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace, true);
    h.app.launch(&options()).unwrap();
    h.app.settle().await.unwrap();

    h.app.handle_event(UiEvent::SelectLabel { label: "Nature".into() }).await.unwrap();
    h.app.settle().await.unwrap();

    let showcase = h.app.stack.top().unwrap();
    assert_eq!(showcase.kind(), DocumentKind::Showcase);
    assert!(showcase.find_all("img").iter().all(|e| e.get_attr("src") == Some("resource://_pattern")));
  }

  #[tokio::test]
  async fn last_highlight_wins() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace).await;

    assert!(h.app.dispatch("section-0", Trigger::Highlight).await.unwrap());
    assert!(h.app.dispatch("section-1", Trigger::Highlight).await.unwrap());
    h.app.settle().await.unwrap();

    assert_eq!(h.grabber.calls.load(Ordering::SeqCst), 1);
    let catalog = h.app.stack.top().unwrap();
    assert_eq!(img_src(catalog, "section-0", "a1"), Some("resource://_pattern"));
    assert_eq!(img_src(catalog, "section-0", "a2"), Some("resource://_pattern"));
    let city = img_src(catalog, "section-1", "c1").unwrap();
    assert!(city.starts_with("file://") && city.ends_with("c1.png"), "src was {city}");
  }

  #[tokio::test]
  async fn highlight_populates_every_image_of_the_section() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace).await;

    h.app.handle_event(UiEvent::HighlightSection { label: "Nature".into() }).await.unwrap();
    h.app.settle().await.unwrap();

    let catalog = h.app.stack.top().unwrap();
    assert!(img_src(catalog, "section-0", "a1").unwrap().ends_with("a1.png"));
    assert!(img_src(catalog, "section-0", "a2").unwrap().ends_with("a2.png"));
    assert_eq!(img_src(catalog, "section-1", "c1"), Some("resource://_pattern"));
  }

  #[tokio::test]
  async fn resigning_active_cancels_pending_population() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace).await;

    h.app.handle_event(UiEvent::HighlightSection { label: "Nature".into() }).await.unwrap();
    h.app.on_lifecycle(LifecycleEvent::WillResignActive).await.unwrap();
    h.app.settle().await.unwrap();

    assert_eq!(h.grabber.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn selecting_a_video_hands_off_a_single_item_queue() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace).await;

    assert!(h.app.dispatch("lockup-1-0", Trigger::Select).await.unwrap());
    assert_eq!(h.app.player.played, vec![Playlist::single(MediaItem::video("http://x/c1.mov"))]);
    assert_eq!(h.app.screen(), Screen::Catalog);
    assert_eq!(h.app.stack.depth(), 1);
  }

  #[tokio::test]
  async fn unbound_interaction_is_ignored() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace).await;
    assert!(!h.app.dispatch("nope", Trigger::Select).await.unwrap());
    assert!(!h.app.dispatch("lockup-0-0", Trigger::Highlight).await.unwrap());
  }

  #[tokio::test]
  async fn terminate_stops_playback() {
    let mut h = launched(MockResponse::Body(MANIFEST.into()), ShowcaseTransition::Replace).await;
    h.app.on_lifecycle(LifecycleEvent::WillTerminate).await.unwrap();
    assert_eq!(h.app.player.stopped, 1);
    assert!(!h.app.has_pending());
  }
}
