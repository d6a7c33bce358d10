//! Log-set registry.
//!
//! One task owns the `name → worker` map for the whole server. Because the
//! registry serves one request at a time, creating a log is race-free: two
//! concurrent requests for the same missing name produce one worker. The
//! registry holds no per-log state; scans and worker spawns happen while
//! its single in-flight request is being processed.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::{mpsc, oneshot};

use crate::actor::{self, LogHandle};
use crate::error::{Error, Result};
use crate::logfile::LogFile;

/// Name of the log the server appends its own statistics to.
pub const RESERVED_LOG: &str = "_kaf";

/// Names that never denote a live log: empty, dot files, and archived
/// files (`--<name>--<stamp>`).
pub fn is_hidden_name(name: &str) -> bool {
    name.is_empty() || name.starts_with('.') || name.starts_with("--")
}

enum RegistryCommand {
    Resolve {
        name: String,
        create: bool,
        resp: oneshot::Sender<Result<Option<LogHandle>>>,
    },
    ListAll {
        resp: oneshot::Sender<Vec<LogHandle>>,
    },
}

/// Handle to the registry task.
#[derive(Clone)]
pub struct Registry {
    tx: mpsc::Sender<RegistryCommand>,
}

impl Registry {
    /// Starts the registry task over an empty map.
    pub fn start(data_dir: PathBuf) -> Registry {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(run(data_dir, rx));
        Registry { tx }
    }

    /// Starts the registry and registers every log already on disk.
    ///
    /// Hidden and archived files are skipped; anything else that fails to
    /// load makes the whole boot fail.
    pub async fn boot(data_dir: PathBuf) -> Result<Registry> {
        let registry = Self::start(data_dir.clone());
        let mut entries = fs::read_dir(&data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden_name(&name) || !entry.file_type().await?.is_file() {
                continue;
            }
            if let Err(e) = registry.resolve(&name, true).await {
                tracing::error!(log = %name, error = %e, "failed loading log at boot");
                return Err(e);
            }
        }
        Ok(registry)
    }

    /// Looks a log up by name, creating it when `create` is set.
    ///
    /// Returns `Ok(None)` when the log is unknown, has no file on disk and
    /// creation was not requested — "no such log" is not an error here.
    pub async fn resolve(&self, name: &str, create: bool) -> Result<Option<LogHandle>> {
        let (resp, rx) = oneshot::channel();
        let cmd = RegistryCommand::Resolve {
            name: name.to_string(),
            create,
            resp,
        };
        self.tx.send(cmd).await.map_err(|_| Error::WorkerStopped)?;
        rx.await.map_err(|_| Error::WorkerStopped)?
    }

    /// Snapshot of every registered log handle.
    pub async fn list_all(&self) -> Result<Vec<LogHandle>> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::ListAll { resp })
            .await
            .map_err(|_| Error::WorkerStopped)?;
        rx.await.map_err(|_| Error::WorkerStopped)
    }
}

async fn run(data_dir: PathBuf, mut rx: mpsc::Receiver<RegistryCommand>) {
    let mut logs: HashMap<String, LogHandle> = HashMap::new();
    while let Some(cmd) = rx.recv().await {
        match cmd {
            RegistryCommand::Resolve { name, create, resp } => {
                let result = resolve_log(&data_dir, &mut logs, &name, create).await;
                let _ = resp.send(result);
            }
            RegistryCommand::ListAll { resp } => {
                let _ = resp.send(logs.values().cloned().collect());
            }
        }
    }
}

async fn resolve_log(
    data_dir: &Path,
    logs: &mut HashMap<String, LogHandle>,
    name: &str,
    create: bool,
) -> Result<Option<LogHandle>> {
    if let Some(handle) = logs.get(name) {
        return Ok(Some(handle.clone()));
    }

    let path = data_dir.join(name);
    if !create && !file_exists(&path).await? {
        return Ok(None);
    }

    let file = LogFile::open(name, path).await?;
    let handle = actor::spawn(file);
    logs.insert(name.to_string(), handle.clone());
    Ok(Some(handle))
}

async fn file_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
