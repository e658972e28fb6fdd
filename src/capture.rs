//! Diagnostic capture
//!
//! Screenshots and browser-side logs are the harness's substitute for stack
//! traces: a UI-level failure is triaged from the artifacts, not from a rerun.
//! Every scenario captures on both the success and the failure path, under
//! filenames that disambiguate scenario, variant, and outcome.

use crate::error::{CaptureError, Error, Result};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Upper bound on buffered log entries per session
const LOG_BUFFER_CAP: usize = 2000;

/// Where a log entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogSource {
    /// `console.*` call in the page
    Console,
    /// Uncaught exception in the page
    PageError,
}

/// One recorded console message or page error
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Origin of the entry
    pub source: LogSource,
    /// Console level or exception marker (e.g. `log`, `error`)
    pub level: String,
    /// Rendered message text
    pub message: String,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
}

/// Records console messages and uncaught page errors for the session's
/// lifetime.
///
/// Attached once per scenario so failed runs carry the browser-side story,
/// not just a screenshot. Entries are mirrored to `tracing` as they arrive.
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LogSink {
    /// Subscribe to console and exception events on the page
    pub async fn attach(page: &Page) -> Result<Self> {
        page.execute(runtime::EnableParams::default())
            .await
            .map_err(|e| CaptureError::SinkFailed(e.to_string()))?;

        let entries = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = Vec::new();

        let mut console_events = page
            .event_listener::<runtime::EventConsoleApiCalled>()
            .await
            .map_err(|e| CaptureError::SinkFailed(e.to_string()))?;
        let console_buf = Arc::clone(&entries);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = console_events.next().await {
                let message = render_console_args(&event.args);
                let level = format!("{:?}", event.r#type).to_lowercase();
                debug!(target: "browser", "console.{level}: {message}");
                push_entry(
                    &console_buf,
                    LogEntry {
                        source: LogSource::Console,
                        level,
                        message,
                        timestamp: Utc::now(),
                    },
                );
            }
        }));

        let mut error_events = page
            .event_listener::<runtime::EventExceptionThrown>()
            .await
            .map_err(|e| CaptureError::SinkFailed(e.to_string()))?;
        let error_buf = Arc::clone(&entries);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = error_events.next().await {
                let message = render_exception(&event.exception_details);
                warn!(target: "browser", "page error: {message}");
                push_entry(
                    &error_buf,
                    LogEntry {
                        source: LogSource::PageError,
                        level: "error".to_string(),
                        message,
                        timestamp: Utc::now(),
                    },
                );
            }
        }));

        debug!("Log sink attached");
        Ok(Self { entries, tasks })
    }

    /// Snapshot of the recorded entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Number of recorded page errors
    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.source == LogSource::PageError)
            .count()
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn push_entry(buf: &Mutex<Vec<LogEntry>>, entry: LogEntry) {
    let mut entries = buf.lock();
    if entries.len() >= LOG_BUFFER_CAP {
        entries.remove(0);
    }
    entries.push(entry);
}

fn render_console_args(args: &[runtime::RemoteObject]) -> String {
    args.iter()
        .map(|arg| {
            arg.value
                .as_ref()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .or_else(|| arg.description.clone())
                .unwrap_or_else(|| "<object>".to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_exception(details: &runtime::ExceptionDetails) -> String {
    let description = details
        .exception
        .as_ref()
        .and_then(|e| e.description.clone());
    match description {
        Some(desc) => desc,
        None => details.text.clone(),
    }
}

/// A recorded artifact
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Where the artifact was written
    pub path: PathBuf,
    /// What it is (`screenshot`, `summary`)
    pub kind: String,
}

/// Per-scenario artifact writer.
///
/// Files are named `{scenario}_{label}.png`; repeating a label within one run
/// or colliding with a file left by an earlier run appends a counter, so
/// capture never overwrites earlier evidence.
pub struct Recorder {
    scenario: String,
    out_dir: PathBuf,
    artifacts: Mutex<Vec<Artifact>>,
}

impl Recorder {
    /// Create a recorder for one scenario run
    pub fn new<S: Into<String>, P: Into<PathBuf>>(scenario: S, out_dir: P) -> Self {
        Self {
            scenario: scenario.into(),
            out_dir: out_dir.into(),
            artifacts: Mutex::new(Vec::new()),
        }
    }

    /// The scenario this recorder belongs to
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Artifacts produced so far
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().clone()
    }

    /// Capture a screenshot under `{scenario}_{label}.png`.
    ///
    /// Side-effecting and idempotent per call: repeated captures produce
    /// additional artifacts and never mutate page state.
    #[instrument(skip(self, page))]
    pub async fn screenshot(&self, page: &Page, label: &str, full_page: bool) -> Result<PathBuf> {
        let path = self.next_path(label, "png");

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .from_surface(true)
            .capture_beyond_viewport(full_page)
            .build();

        let data = page
            .screenshot(params)
            .await
            .map_err(|e| CaptureError::ScreenshotFailed(e.to_string()))?;

        self.write(&path, &data).await?;
        info!("Screenshot saved to {}", path.display());

        self.artifacts.lock().push(Artifact {
            path: path.clone(),
            kind: "screenshot".to_string(),
        });
        Ok(path)
    }

    /// Serialize `value` as the run's JSON summary (`{scenario}_result.json`)
    pub async fn write_summary<T: Serialize>(&self, value: &T) -> Result<PathBuf> {
        let path = self.next_path("result", "json");
        let json = serde_json::to_vec_pretty(value)?;
        self.write(&path, &json).await?;
        debug!("Summary written to {}", path.display());

        self.artifacts.lock().push(Artifact {
            path: path.clone(),
            kind: "summary".to_string(),
        });
        Ok(path)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|e| Error::Capture(CaptureError::WriteFailed {
                path: self.out_dir.display().to_string(),
                message: e.to_string(),
            }))?;
        tokio::fs::write(path, data)
            .await
            .map_err(|e| Error::Capture(CaptureError::WriteFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            }))?;
        Ok(())
    }

    /// Next free path for a label: `{scenario}_{label}.{ext}`, then `_2`,
    /// `_3`, ... when the label repeats within this run or a file from an
    /// earlier run already occupies the name.
    fn next_path(&self, label: &str, ext: &str) -> PathBuf {
        let used = self.artifacts.lock();
        let mut attempt = 0usize;
        loop {
            let name = if attempt == 0 {
                format!("{}_{}.{}", self.scenario, label, ext)
            } else {
                format!("{}_{}_{}.{}", self.scenario, label, attempt + 1, ext)
            };
            let path = self.out_dir.join(name);
            let taken = used.iter().any(|a| a.path == path) || path.exists();
            if !taken {
                return path;
            }
            attempt += 1;
        }
    }
}
