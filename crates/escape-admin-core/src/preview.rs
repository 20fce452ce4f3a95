//! H5P preview loading.
//!
//! A preview needs the H5P standalone player bundle before a viewer can be
//! mounted. [`LibraryLoader`] fetches the bundle and raises a readiness
//! signal once it is available; [`PreviewLoader`] waits on that signal for at
//! most `poll_interval_ms * max_attempts` and then mounts the content or
//! switches its viewer to the error panel.
//!
//! Closing a preview aborts any pending library load, tears the viewer down
//! and resets it, so the next preview starts from a clean renderer.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::PreviewConfig;
use crate::error::{AdminError, Result};
use crate::models::H5pContent;
use crate::view::escape_html;

// ============================================================================
// Readiness signal
// ============================================================================

/// Creates a connected readiness signal and receiver, initially not ready.
#[must_use]
pub fn readiness() -> (ReadinessSignal, Readiness) {
    let (tx, rx) = watch::channel(false);
    (ReadinessSignal { tx }, Readiness { rx })
}

/// Raised by whoever loads the player library.
#[derive(Debug)]
pub struct ReadinessSignal {
    tx: watch::Sender<bool>,
}

impl ReadinessSignal {
    /// Marks the library as available.
    pub fn mark_ready(&self) {
        self.tx.send_replace(true);
    }
}

/// Waits for the player library to become available.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<bool>,
}

impl Readiness {
    /// Returns `true` if the library is already available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the library is available, or fails when `ceiling` has
    /// elapsed.
    ///
    /// If the signal is dropped without ever being raised the library will
    /// not appear, but the error is still only reported at the ceiling.
    pub async fn wait(&mut self, ceiling: Duration) -> Result<()> {
        let deadline = Instant::now() + ceiling;
        let rx = &mut self.rx;
        let ready = async move {
            if rx.wait_for(|ready| *ready).await.is_ok() {
                return true;
            }
            tokio::time::sleep_until(deadline).await;
            false
        };

        match tokio::time::timeout_at(deadline, ready).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(AdminError::PreviewLibraryTimeout {
                waited_ms: u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

// ============================================================================
// Library loader
// ============================================================================

/// A library load in progress: its readiness and, if spawned, its task.
#[derive(Debug)]
pub struct LibraryHandle {
    readiness: Readiness,
    task: Option<JoinHandle<Result<()>>>,
}

impl LibraryHandle {
    /// Wraps a readiness receiver driven from elsewhere.
    #[must_use]
    pub const fn new(readiness: Readiness) -> Self {
        Self {
            readiness,
            task: None,
        }
    }
}

impl From<Readiness> for LibraryHandle {
    fn from(readiness: Readiness) -> Self {
        Self::new(readiness)
    }
}

/// Fetches the H5P player bundle from the server.
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    api: ApiClient,
    library_path: String,
}

impl LibraryLoader {
    /// Loads the bundle at `library_path` on the API server.
    #[must_use]
    pub fn new(api: ApiClient, library_path: impl Into<String>) -> Self {
        Self {
            api,
            library_path: library_path.into(),
        }
    }

    /// Fetches the bundle and raises `signal` if it is non-empty.
    pub async fn load(&self, signal: ReadinessSignal) -> Result<()> {
        debug!(path = %self.library_path, "Loading H5P player library");
        let bundle = self.api.fetch_asset(&self.library_path).await?;
        if bundle.is_empty() {
            warn!(path = %self.library_path, "H5P player library is empty");
            return Err(AdminError::Preview(format!(
                "player library at {} is empty",
                self.library_path
            )));
        }
        info!(path = %self.library_path, bytes = bundle.len(), "H5P player library available");
        signal.mark_ready();
        Ok(())
    }

    /// Runs [`load`](Self::load) on a background task.
    #[must_use]
    pub fn spawn(self) -> LibraryHandle {
        let (signal, readiness) = readiness();
        let task = tokio::spawn(async move {
            let result = self.load(signal).await;
            if let Err(e) = &result {
                warn!(error = %e, "H5P player library failed to load");
            }
            result
        });
        LibraryHandle {
            readiness,
            task: Some(task),
        }
    }
}

// ============================================================================
// Viewer
// ============================================================================

/// Something that can display H5P content once the player library is there.
pub trait H5pViewer {
    /// Displays `content`.
    fn mount(&mut self, content: &H5pContent) -> impl Future<Output = Result<()>> + Send;

    /// Shows the error panel instead of content.
    fn show_error(&mut self, message: &str);

    /// Removes mounted content and clears the container.
    fn teardown(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Returns the renderer to its initial state.
    fn reset(&mut self);
}

/// Writes a standalone HTML page that embeds the H5P player for a content
/// package served by the API.
#[derive(Debug, Clone)]
pub struct StandalonePageViewer {
    api_base: String,
    library_path: String,
    output_dir: PathBuf,
    mounted: Option<PathBuf>,
    error: Option<String>,
}

impl StandalonePageViewer {
    /// Pages are written to `config.output_dir` and load the player from
    /// `api_base` + `config.library_path`.
    #[must_use]
    pub fn new(api_base: impl Into<String>, config: &PreviewConfig) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            library_path: config.library_path.clone(),
            output_dir: PathBuf::from(&config.output_dir),
            mounted: None,
            error: None,
        }
    }

    /// Path of the currently mounted page.
    #[must_use]
    pub fn mounted(&self) -> Option<&Path> {
        self.mounted.as_deref()
    }

    /// Message of the error panel, if shown.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The page markup for `content`.
    #[must_use]
    pub fn render_page(&self, content: &H5pContent) -> String {
        let library = format!("{}{}", self.api_base, self.library_path);
        let dist = library
            .rsplit_once('/')
            .map_or(library.as_str(), |(dir, _)| dir);
        let title = escape_html(content.title().unwrap_or(&content.content_id));
        let content_url = format!("{}{}", self.api_base, content.content_path);
        let json = |s: &str| serde_json::Value::from(s).to_string();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{library_attr}"></script>
</head>
<body>
<div id="h5p-container"></div>
<script>
new H5PStandalone.H5P(document.getElementById('h5p-container'), {{
  h5pJsonPath: {content_json},
  frameJs: {frame_js},
  frameCss: {frame_css}
}});
</script>
</body>
</html>
"#,
            library_attr = escape_html(&library),
            content_json = json(&content_url),
            frame_js = json(&format!("{dist}/frame.bundle.js")),
            frame_css = json(&format!("{dist}/styles/h5p.css")),
        )
    }
}

impl H5pViewer for StandalonePageViewer {
    async fn mount(&mut self, content: &H5pContent) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let file_name: String = content
            .content_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let path = self.output_dir.join(format!("{file_name}.html"));
        tokio::fs::write(&path, self.render_page(content)).await?;
        info!(path = %path.display(), content_id = %content.content_id, "Wrote H5P preview page");
        self.error = None;
        self.mounted = Some(path);
        Ok(())
    }

    fn show_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    async fn teardown(&mut self) -> Result<()> {
        if let Some(path) = self.mounted.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.mounted = None;
        self.error = None;
    }
}

// ============================================================================
// Preview loader
// ============================================================================

/// Lifecycle of the preview panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreviewState {
    /// Nothing shown.
    #[default]
    Idle,
    /// Waiting for the player library.
    Loading {
        /// Content being opened.
        content_id: String,
    },
    /// Content is mounted.
    Ready {
        /// Mounted content.
        content_id: String,
    },
    /// The error panel is shown.
    Failed {
        /// Content that failed to open.
        content_id: String,
        /// Error shown to the user.
        message: String,
    },
}

/// Opens and closes H5P previews in a single viewer.
#[derive(Debug)]
pub struct PreviewLoader<V> {
    viewer: V,
    ceiling: Duration,
    state: PreviewState,
    task: Option<JoinHandle<Result<()>>>,
}

impl<V: H5pViewer> PreviewLoader<V> {
    /// Creates an idle loader waiting at most `config.ceiling()` for the
    /// player library.
    pub fn new(viewer: V, config: &PreviewConfig) -> Self {
        Self {
            viewer,
            ceiling: config.ceiling(),
            state: PreviewState::Idle,
            task: None,
        }
    }

    /// Current state.
    pub const fn state(&self) -> &PreviewState {
        &self.state
    }

    /// The viewer.
    pub const fn viewer(&self) -> &V {
        &self.viewer
    }

    /// How long [`open`](Self::open) waits for the library.
    pub const fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Waits for the player library, then mounts `content`.
    ///
    /// Any open preview is closed first. If the library is not available
    /// within the ceiling the viewer shows the error panel and
    /// `PreviewLibraryTimeout` is returned.
    pub async fn open(&mut self, content: &H5pContent, library: LibraryHandle) -> Result<()> {
        self.close().await?;

        let content_id = content.content_id.clone();
        info!(content_id = %content_id, ceiling = ?self.ceiling, "Opening H5P preview");
        self.state = PreviewState::Loading {
            content_id: content_id.clone(),
        };

        let LibraryHandle {
            mut readiness,
            task,
        } = library;
        self.task = task;

        let mounted = match readiness.wait(self.ceiling).await {
            Ok(()) => self.viewer.mount(content).await,
            Err(e) => Err(e),
        };
        self.abort_task();

        match mounted {
            Ok(()) => {
                self.state = PreviewState::Ready { content_id };
                Ok(())
            }
            Err(e) => {
                warn!(content_id = %content_id, error = %e, "H5P preview failed");
                let message = e.to_string();
                self.viewer.show_error(&message);
                self.state = PreviewState::Failed {
                    content_id,
                    message,
                };
                Err(e)
            }
        }
    }

    /// Stops any pending load, tears the viewer down and resets it.
    pub async fn close(&mut self) -> Result<()> {
        self.abort_task();
        if self.state == PreviewState::Idle {
            return Ok(());
        }
        let torn_down = self.viewer.teardown().await;
        self.viewer.reset();
        self.state = PreviewState::Idle;
        debug!("Closed H5P preview");
        torn_down
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<V> Drop for PreviewLoader<V> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
