//! An editor session: child process, RPC client, and screen grid.
//!
//! # Process Cleanup Safety
//! The child is spawned with `kill_on_drop`, so dropping a `Session` never
//! leaves an orphaned editor. [`Session::shutdown`] is the graceful path:
//! detach, close stdin, and give the editor a short grace period before
//! killing it.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::grid::{Grid, SharedGrid};
use crate::redraw::RedrawOp;
use crate::rpc::transport::drain_diagnostics;
use crate::rpc::{RedrawHandler, RpcClient, RpcError};

/// How long the editor gets to exit (and to answer `ui_detach`) before it
/// is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Receiver of screen updates.
///
/// Both methods run on the connection's reader task; keep them short.
pub trait GridObserver: Send + Sync + 'static {
    /// A redraw batch has been fully applied. `grid` is read-locked for the
    /// duration of the call.
    fn on_grid_updated(&self, grid: &Grid);

    /// The editor connection has closed.
    fn on_closed(&self, _reason: &str) {}
}

/// Applies decoded batches to the shared grid.
struct GridUpdater {
    grid: SharedGrid,
    observer: Option<Arc<dyn GridObserver>>,
}

impl RedrawHandler for GridUpdater {
    fn apply_batch(&self, ops: Vec<RedrawOp>) {
        if ops.is_empty() {
            return;
        }
        self.grid.apply_batch(&ops);
        if let Some(observer) = &self.observer {
            self.grid.read(|grid| observer.on_grid_updated(grid));
        }
    }

    fn connection_closed(&self, reason: &str) {
        if let Some(observer) = &self.observer {
            observer.on_closed(reason);
        }
    }
}

/// A running editor attached to a local grid.
pub struct Session {
    client: RpcClient,
    grid: SharedGrid,
    width: u16,
    height: u16,
    rgb: bool,
    reader: JoinHandle<()>,
    /// Only set when this session spawned the editor.
    child: Option<Child>,
    diagnostics: Option<JoinHandle<()>>,
}

impl Session {
    /// Launch the editor described by `config` and connect to it.
    ///
    /// Must be called inside a tokio runtime. The UI is not attached yet;
    /// call [`Session::attach`] to start receiving screen updates.
    pub fn spawn(config: &EditorConfig, observer: Option<Arc<dyn GridObserver>>) -> Result<Self> {
        info!("Starting editor: {} {}", config.program, config.args.join(" "));

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn editor process '{}'", config.program))?;

        let stdin = child
            .stdin
            .take()
            .context("Failed to get stdin handle for editor")?;
        let stdout = child
            .stdout
            .take()
            .context("Failed to get stdout handle for editor")?;
        let stderr = child
            .stderr
            .take()
            .context("Failed to get stderr handle for editor")?;

        let mut session = Self::connect(stdout, stdin, config, observer);
        session.diagnostics = Some(drain_diagnostics(stderr));
        session.child = Some(child);
        Ok(session)
    }

    /// Connect over existing pipes, e.g. a socket or an in-memory stream.
    pub fn connect<R, W>(
        reader: R,
        writer: W,
        config: &EditorConfig,
        observer: Option<Arc<dyn GridObserver>>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let grid = SharedGrid::new(Grid::new(
            usize::from(config.height),
            usize::from(config.width),
        ));
        let updater = Arc::new(GridUpdater {
            grid: grid.clone(),
            observer,
        });
        let (client, reader) =
            RpcClient::spawn_with_method(reader, writer, &config.redraw_method, Some(updater));

        Self {
            client,
            grid,
            width: config.width,
            height: config.height,
            rgb: config.rgb,
            reader,
            child: None,
            diagnostics: None,
        }
    }

    /// Register as the editor's UI at the configured size.
    pub async fn attach(&self) -> Result<(), RpcError> {
        self.client
            .ui_attach(self.width, self.height, self.rgb)
            .await?;
        info!("Attached UI at {}x{}", self.width, self.height);
        Ok(())
    }

    /// Send keys in the editor's key notation (`<CR>`, `<C-w>`, ...).
    pub async fn send_input(&self, keys: &str) -> Result<(), RpcError> {
        let written = self.client.vim_input(keys).await?;
        if usize::try_from(written).map_or(true, |n| n < keys.len()) {
            debug!("Editor consumed {} of {} input bytes", written, keys.len());
        }
        Ok(())
    }

    /// Ask the editor to resize its screen. The grid follows when the
    /// resulting `resize` redraw arrives.
    pub async fn resize(&mut self, width: u16, height: u16) -> Result<(), RpcError> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.client.ui_try_resize(width, height).await?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    /// Requested size as `(width, height)`.
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed() || self.reader.is_finished()
    }

    /// Detach, close the editor's input, and wait briefly for it to exit
    /// before killing it.
    pub async fn shutdown(mut self) -> Result<()> {
        if !self.client.is_closed() {
            match tokio::time::timeout(SHUTDOWN_GRACE, self.client.ui_detach()).await {
                Ok(Ok(())) => debug!("UI detached"),
                Ok(Err(e)) => debug!("ui_detach failed: {}", e),
                Err(_) => debug!("ui_detach timed out"),
            }
        }
        self.client.close("session shut down").await;

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("Editor exited: {}", status),
                Ok(Err(e)) => warn!("Error waiting for editor: {}", e),
                Err(_) => {
                    warn!("Editor didn't exit gracefully, killing");
                    child
                        .kill()
                        .await
                        .context("Failed to kill editor process")?;
                }
            }
        }

        if let Some(diagnostics) = self.diagnostics.take() {
            diagnostics.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        titles: Mutex<Vec<String>>,
        closed: Mutex<Option<String>>,
    }

    impl GridObserver for Recorder {
        fn on_grid_updated(&self, grid: &Grid) {
            self.titles.lock().unwrap().push(grid.title().to_string());
        }

        fn on_closed(&self, reason: &str) {
            *self.closed.lock().unwrap() = Some(reason.to_string());
        }
    }

    #[test]
    fn test_updater_notifies_once_per_batch() {
        let recorder = Arc::new(Recorder::default());
        let updater = GridUpdater {
            grid: SharedGrid::new(Grid::new(2, 2)),
            observer: Some(recorder.clone()),
        };

        updater.apply_batch(vec![
            RedrawOp::SetTitle("a".into()),
            RedrawOp::SetTitle("b".into()),
        ]);
        updater.apply_batch(Vec::new());
        updater.apply_batch(vec![RedrawOp::SetTitle("c".into())]);

        // Observers only ever see the end of a batch.
        assert_eq!(*recorder.titles.lock().unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_updater_forwards_close() {
        let recorder = Arc::new(Recorder::default());
        let updater = GridUpdater {
            grid: SharedGrid::new(Grid::new(1, 1)),
            observer: Some(recorder.clone()),
        };
        updater.connection_closed("end of stream");
        assert_eq!(
            recorder.closed.lock().unwrap().as_deref(),
            Some("end of stream")
        );
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails_with_context() {
        let config = EditorConfig {
            program: "/nonexistent/nvim-tui-test-editor".to_string(),
            ..EditorConfig::default()
        };
        let err = Session::spawn(&config, None).err().unwrap();
        assert!(err.to_string().contains("Failed to spawn editor process"));
    }
}
