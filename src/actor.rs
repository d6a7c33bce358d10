//! Per-log worker task.
//!
//! Every log is served by exactly one task that owns the [`LogFile`] and is
//! the only code to touch its state or disk file. Callers talk to it
//! through a [`LogHandle`]: each command carries a oneshot reply sender,
//! and the worker finishes one command before taking the next, so all
//! operations on a log are strictly serialized in arrival order.
//!
//! There is no shutdown protocol. A worker runs until the process exits or
//! every handle to it is dropped, and an accepted command always runs to
//! completion — a caller going away does not cancel in-flight work.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::codec::Message;
use crate::error::{Error, Result};
use crate::logfile::{LogFile, LogStats};

pub(crate) enum LogCommand {
    Get {
        from: u32,
        resp: oneshot::Sender<Result<Vec<Message>>>,
    },
    Put {
        data: Bytes,
        resp: oneshot::Sender<Result<u32>>,
    },
    Archive {
        upto: u32,
        resp: oneshot::Sender<Result<()>>,
    },
    Stat {
        resp: oneshot::Sender<LogStats>,
    },
}

/// Handle to one log's worker task.
#[derive(Clone)]
pub struct LogHandle {
    name: String,
    tx: mpsc::Sender<LogCommand>,
}

/// Starts the worker task for an opened log file.
pub fn spawn(file: LogFile) -> LogHandle {
    let (tx, rx) = mpsc::channel(1);
    let name = file.name().to_string();
    tokio::spawn(run(file, rx));
    LogHandle { name, tx }
}

async fn run(mut file: LogFile, mut rx: mpsc::Receiver<LogCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            LogCommand::Get { from, resp } => {
                file.counters.gets += 1;
                let result = file.read_window(from).await;
                if result.is_err() {
                    file.counters.errs += 1;
                }
                let _ = resp.send(result);
            }
            LogCommand::Put { data, resp } => {
                file.counters.puts += 1;
                let result = file.append(&data).await;
                if result.is_err() {
                    file.counters.errs += 1;
                }
                let _ = resp.send(result);
            }
            LogCommand::Archive { upto, resp } => {
                file.counters.archives += 1;
                let result = file.archive(upto).await;
                if result.is_err() {
                    file.counters.errs += 1;
                }
                let _ = resp.send(result);
            }
            LogCommand::Stat { resp } => {
                let _ = resp.send(file.snapshot_counters());
            }
        }
    }
}

impl LogHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the window of records numbered `from` and up.
    pub async fn get(&self, from: u32) -> Result<Vec<Message>> {
        let (resp, rx) = oneshot::channel();
        self.send(LogCommand::Get { from, resp }).await?;
        rx.await.map_err(|_| Error::WorkerStopped)?
    }

    /// Appends a record and returns its assigned number.
    pub async fn put(&self, data: Bytes) -> Result<u32> {
        let (resp, rx) = oneshot::channel();
        self.send(LogCommand::Put { data, resp }).await?;
        rx.await.map_err(|_| Error::WorkerStopped)?
    }

    /// Rotates the log, keeping records numbered strictly after `upto`.
    pub async fn archive(&self, upto: u32) -> Result<()> {
        let (resp, rx) = oneshot::channel();
        self.send(LogCommand::Archive { upto, resp }).await?;
        rx.await.map_err(|_| Error::WorkerStopped)?
    }

    /// Takes the counter snapshot, resetting the counters.
    pub async fn stat(&self) -> Result<LogStats> {
        let (resp, rx) = oneshot::channel();
        self.send(LogCommand::Stat { resp }).await?;
        rx.await.map_err(|_| Error::WorkerStopped)
    }

    async fn send(&self, cmd: LogCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| Error::WorkerStopped)
    }
}
