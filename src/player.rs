use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
  pub kind: MediaKind,
  pub url: String,
}

impl MediaItem {
  pub fn video(url: impl Into<String>) -> Self {
    Self { kind: MediaKind::Video, url: url.into() }
  }
}

/// Ordered queue handed to the player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
  items: Vec<MediaItem>,
}

impl Playlist {
  pub fn single(item: MediaItem) -> Self {
    Self { items: vec![item] }
  }

  pub fn items(&self) -> &[MediaItem] {
    &self.items
  }
}

/// External playback capability. Only start/stop are modelled.
pub trait Playback: Send {
  fn play(&mut self, playlist: Playlist) -> impl Future<Output = Result<()>> + Send;
  fn stop(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Plays videos fullscreen in an `mpv` child process.
#[derive(Default)]
pub struct MpvPlayer {
  current_process: Option<Child>,
  pub now_playing: Option<Playlist>,
}

impl MpvPlayer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }
}

impl Playback for MpvPlayer {
  fn play(&mut self, playlist: Playlist) -> impl Future<Output = Result<()>> + Send {
    async move {
      if playlist.items().is_empty() {
        return Err(anyhow!("Nothing to play: empty playlist"));
      }
      self.stop().await.context("Failed to stop previous playback")?;

      let mut cmd = Command::new("mpv");
      cmd.args(["--fs", "--really-quiet", "--"]);
      cmd.args(playlist.items().iter().map(|item| item.url.as_str()));
      cmd.stdin(Stdio::null());
      cmd.stdout(Stdio::null());
      // Send stderr to null: if piped but never drained, the pipe buffer fills and mpv blocks.
      cmd.stderr(Stdio::null());

      let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
          anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
        } else {
          anyhow!(e).context("Failed to spawn mpv process")
        }
      })?;

      let first = &playlist.items()[0];
      info!(items = playlist.items().len(), kind = ?first.kind, url = %first.url, "player: started mpv");
      self.current_process = Some(child);
      self.now_playing = Some(playlist);
      Ok(())
    }
  }

  fn stop(&mut self) -> impl Future<Output = Result<()>> + Send {
    async move {
      if let Some(mut child) = self.current_process.take() {
        child.kill().await.context("Failed to kill mpv process")?;
        let _ = child.wait().await;
        info!("player: stopped mpv");
      }
      self.now_playing = None;
      Ok(())
    }
  }
}
