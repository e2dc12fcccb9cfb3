mod app;
mod config;
mod constants;
mod document;
mod error;
mod logging;
mod manifest;
mod navigation;
mod player;
mod templates;
mod thumbnail;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use app::{App, LaunchOptions, LifecycleEvent, Settings};
use config::Config;
use constants::constants;
use document::{Document, Trigger, UiEvent};
use manifest::{HttpManifestSource, ManifestSource, VideoIndex};
use navigation::Screen;
use player::{MpvPlayer, Playback};
use thumbnail::{FfmpegFrameGrabber, FrameGrabber, ThumbnailStore};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Server root the manifest path is resolved against (overrides prefs.toml)
  #[arg(long)]
  base_url: Option<String>,

  /// Directory for generated thumbnails (overrides prefs.toml)
  #[arg(long)]
  cache_dir: Option<PathBuf>,

  /// Mirror logs to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the catalog document
  Catalog,
  /// Print the menu-bar document
  Menu,
  /// List labels with their video counts
  Labels,
  /// Print the showcase document for a label
  Showcase { label: String },
  /// Highlight a label's catalog section and print the catalog once its thumbnails are in
  Populate { label: String },
  /// Print the cached thumbnail path for a video, generating it if needed
  Thumbnail { id: String, url: String },
  /// Play one video
  Play { label: String, id: String },
  /// Drive the app with host events read line by line from stdin
  Session,
}

/// One host event in a `session`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostEvent {
  Interact { element_id: String, trigger: Trigger },
  Back,
  Reload,
  Lifecycle(LifecycleEvent),
  Show,
  Quit,
}

impl FromStr for HostEvent {
  type Err = anyhow::Error;

  fn from_str(line: &str) -> Result<Self> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| anyhow!("empty command"))?;
    let event = match verb {
      "select" | "highlight" => {
        let element_id = words.next().ok_or_else(|| anyhow!("{} needs an element id", verb))?.to_string();
        let trigger = if verb == "select" { Trigger::Select } else { Trigger::Highlight };
        HostEvent::Interact { element_id, trigger }
      }
      "back" => HostEvent::Back,
      "reload" => HostEvent::Reload,
      "resign" => HostEvent::Lifecycle(LifecycleEvent::WillResignActive),
      "background" => HostEvent::Lifecycle(LifecycleEvent::DidEnterBackground),
      "foreground" => HostEvent::Lifecycle(LifecycleEvent::WillEnterForeground),
      "active" => HostEvent::Lifecycle(LifecycleEvent::DidBecomeActive),
      "show" => HostEvent::Show,
      "quit" => HostEvent::Quit,
      other => bail!("unknown command: {}", other),
    };
    if words.next().is_some() {
      bail!("too many arguments for {}", verb);
    }
    Ok(event)
  }
}

// --- Helpers ---

/// Print a document to stdout. A document that fails to serialize is replaced by the evaluation alert.
fn print_document(doc: &Document) -> Result<()> {
  match doc.to_xml() {
    Ok(xml) => println!("{}", xml),
    Err(e) => {
      tracing::error!(err = %e, "document: serialization failed");
      println!("{}", templates::eval_error_alert().to_xml()?);
    }
  }
  Ok(())
}

fn unknown_label(label: &str) -> Result<()> {
  print_document(&templates::descriptive_alert("Unknown label", &format!("No screensavers are labelled \"{}\".", label)))?;
  Err(anyhow!("unknown label: {}", label))
}

/// Launch and wait for the manifest. A fetch failure prints its alert and fails.
async fn launch<S: ManifestSource, G: FrameGrabber, P: Playback>(
  app: &mut App<S, G, P>,
  options: &LaunchOptions,
) -> Result<()> {
  app.launch(options)?;
  app.settle().await?;
  app.on_lifecycle(LifecycleEvent::DidBecomeActive).await?;

  if app.index().is_some_and(VideoIndex::is_empty) {
    warn!("manifest: no videos in manifest");
  }
  if app.screen() == Screen::Alert {
    if let Some(alert) = app.stack.modal() {
      print_document(alert)?;
    }
    bail!(app.last_error.clone().unwrap_or_else(|| "manifest fetch failed".to_string()));
  }
  Ok(())
}

/// Status line on stderr: screen, stack depth and the first title on screen.
fn report(app: &App<impl ManifestSource, impl FrameGrabber, impl Playback>) {
  let title = app.stack.visible().and_then(|doc| doc.find_all("title").first().map(|t| t.inner_text()));
  eprintln!("[{:?}] depth={} {}", app.screen(), app.stack.depth(), title.unwrap_or_default());
}

/// Read host events from stdin until `quit` or EOF, printing the visible document after each.
async fn session<S: ManifestSource, G: FrameGrabber, P: Playback>(
  app: &mut App<S, G, P>,
  options: &LaunchOptions,
) -> Result<()> {
  app.launch(options)?;
  app.settle().await?;
  report(app);

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  while let Some(line) = lines.next_line().await? {
    if line.trim().is_empty() {
      continue;
    }
    let event = match line.parse::<HostEvent>() {
      Ok(event) => event,
      Err(e) => {
        eprintln!("{:#}", e);
        continue;
      }
    };

    match event {
      HostEvent::Interact { element_id, trigger } => {
        if app.stack.visible().and_then(|doc| doc.element_by_id(&element_id)).is_none() {
          eprintln!("no element {} on screen", element_id);
          continue;
        }
        if !app.dispatch(&element_id, trigger).await? {
          eprintln!("nothing bound to {:?} on {}", trigger, element_id);
          continue;
        }
      }
      HostEvent::Back => {
        app.back();
      }
      HostEvent::Reload => app.reload()?,
      HostEvent::Lifecycle(event) => app.on_lifecycle(event).await?,
      HostEvent::Show => {}
      HostEvent::Quit => break,
    }

    app.settle().await?;
    if let Some(err) = app.last_error.take() {
      eprintln!("{}", err);
    }
    if let Some(doc) = app.stack.visible() {
      print_document(doc)?;
    }
    report(app);
  }
  Ok(())
}

fn section_of(app: &App<impl ManifestSource, impl FrameGrabber, impl Playback>, label: &str) -> Option<String> {
  app.index()?.groups().iter().position(|g| g.label() == label).map(templates::section_id)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _guard = logging::init_logging(args.verbose)?;

  let mut config = Config::load();
  if let Some(url) = args.base_url {
    config.base_url = Some(url);
  }
  if let Some(dir) = args.cache_dir {
    config.cache_dir = Some(dir);
  }

  run(args.command, config).await
}

async fn run(command: Command, config: Config) -> Result<()> {
  let store = ThumbnailStore::new(config.thumbnail_dir(), constants().thumbnail_offset(), FfmpegFrameGrabber);
  info!(dir = %store.cache_dir().display(), "thumbnail: cache dir");

  if let Command::Thumbnail { id, url } = &command {
    let path = store.get(id, url).await.with_context(|| format!("Failed to get thumbnail for {}", id))?;
    println!("{}", path.display());
    return Ok(());
  }

  let client = reqwest::Client::builder()
    .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
    .build()
    .context("Failed to build HTTP client")?;
  let source = Arc::new(HttpManifestSource::new(client));
  let mut app = App::new(source, store, MpvPlayer::new(), Settings::from_config(&config));
  let options =
    LaunchOptions { base_url: config.base_url().to_string(), manifest_path: config.manifest_path().to_string() };

  if let Command::Session = command {
    session(&mut app, &options).await?;
    app.on_lifecycle(LifecycleEvent::WillTerminate).await?;
    return Ok(());
  }

  launch(&mut app, &options).await?;

  match command {
    Command::Catalog => {
      if let Some(catalog) = app.stack.top() {
        print_document(catalog)?;
      }
    }
    Command::Menu => {
      if let Some(index) = app.index() {
        print_document(&templates::menu_bar(index))?;
      }
    }
    Command::Labels => {
      if let Some(index) = app.index() {
        for group in index.groups() {
          println!("{}\t{}", group.label(), group.len());
        }
      }
    }
    Command::Showcase { label } => {
      let Some(section) = section_of(&app, &label) else { return unknown_label(&label) };
      app.dispatch(&section, Trigger::Select).await?;
      app.settle().await?;
      if let Some(showcase) = app.stack.top() {
        print_document(showcase)?;
      }
    }
    Command::Populate { label } => {
      let Some(section) = section_of(&app, &label) else { return unknown_label(&label) };
      app.dispatch(&section, Trigger::Highlight).await?;
      app.settle().await?;
      if let Some(catalog) = app.stack.top() {
        print_document(catalog)?;
      }
    }
    Command::Play { label, id } => {
      let Some(asset) = app.index().and_then(|index| index.asset(&label, &id)) else {
        return unknown_label(&label);
      };
      let url = asset.url.clone();
      app.handle_event(UiEvent::SelectVideo { url: url.clone() }).await?;
      if !app.player.is_playing() {
        bail!(app.last_error.take().unwrap_or_else(|| "playback did not start".to_string()));
      }
      println!("Playing {}", url);
      return Ok(());
    }
    // answered before launch
    Command::Thumbnail { .. } | Command::Session => {}
  }

  app.on_lifecycle(LifecycleEvent::WillTerminate).await?;
  Ok(())
}
