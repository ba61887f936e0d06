//! Fire-and-forget persistence for the engine.
//!
//! Mutations hand a snapshot to [`PersistenceGateway::persist`] and return
//! immediately. A single writer task drains the queue in order, collapsing
//! runs of pending saves into one write of the newest snapshot.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use recall_core::model::EngineSnapshot;
use recall_storage::{StateRepository, encode_snapshot};

use crate::error::PersistError;

enum Command {
    Save(Box<EngineSnapshot>),
    Clear,
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer. Dropping it lets the writer finish the
/// queued commands and exit.
#[derive(Debug)]
pub struct PersistenceGateway {
    tx: Option<mpsc::UnboundedSender<Command>>,
}

impl PersistenceGateway {
    /// Start a writer task for `repo` on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `PersistError::NoRuntime` when called outside a runtime.
    pub fn spawn(repo: Arc<dyn StateRepository>) -> Result<Self, PersistError> {
        let handle = Handle::try_current().map_err(|_| PersistError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run_writer(repo, rx));
        Ok(Self { tx: Some(tx) })
    }

    /// A gateway that drops everything; for engines with no durable state.
    #[must_use]
    pub fn detached() -> Self {
        Self { tx: None }
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.tx.is_none()
    }

    /// Queue a save of `snapshot`. Never blocks.
    pub fn persist(&self, snapshot: EngineSnapshot) {
        self.send(Command::Save(Box::new(snapshot)));
    }

    /// Queue removal of the stored document.
    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    /// Wait until every command queued before this call has been handled.
    ///
    /// # Errors
    ///
    /// Returns `PersistError::WriterClosed` if the writer task is gone.
    pub async fn flush(&self) -> Result<(), PersistError> {
        let Some(tx) = &self.tx else {
            return Ok(());
        };
        let (done_tx, done_rx) = oneshot::channel();
        tx.send(Command::Flush(done_tx))
            .map_err(|_| PersistError::WriterClosed)?;
        done_rx.await.map_err(|_| PersistError::WriterClosed)
    }

    fn send(&self, command: Command) {
        if let Some(tx) = &self.tx {
            if tx.send(command).is_err() {
                tracing::warn!("persistence writer has stopped, dropping command");
            }
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Save(snapshot) => write!(f, "Save({} items)", snapshot.items.len()),
            Self::Clear => f.write_str("Clear"),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

async fn run_writer(repo: Arc<dyn StateRepository>, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut pending: Option<Command> = None;
    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match rx.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::Save(mut snapshot) => {
                let mut skipped = 0_usize;
                while let Ok(next) = rx.try_recv() {
                    match next {
                        Command::Save(newer) => {
                            snapshot = newer;
                            skipped += 1;
                        }
                        other => {
                            pending = Some(other);
                            break;
                        }
                    }
                }
                if skipped > 0 {
                    tracing::debug!(skipped, "coalesced queued saves");
                }
                write_snapshot(repo.as_ref(), &snapshot).await;
            }
            Command::Clear => {
                if let Err(err) = repo.clear().await {
                    tracing::warn!(error = %err, "failed to clear stored document");
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("persistence writer stopped");
}

async fn write_snapshot(repo: &dyn StateRepository, snapshot: &EngineSnapshot) {
    let document = match encode_snapshot(snapshot) {
        Ok(document) => document,
        Err(err) => {
            tracing::warn!(error = %err, "failed to encode snapshot, skipping save");
            return;
        }
    };
    if let Err(err) = repo.save(&document).await {
        tracing::warn!(error = %err, "failed to save document, in-memory state stays authoritative");
    }
}
