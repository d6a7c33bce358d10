//! Per-log on-disk state.
//!
//! [`LogFile`] bundles one log's open handle with everything cached about
//! it: total size, the last assigned record number, the descriptor list and
//! the activity counters. It is owned and mutated by exactly one worker
//! task (see [`crate::actor`]); nothing here is synchronized.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::codec::{self, Descriptor, Message};
use crate::error::{Error, Result};

/// A get returns at most this many records.
pub const WINDOW_MAX_RECORDS: usize = 5;

/// A get stops once the returned payload bytes reach this bound. Sized to
/// fit a single initial TCP congestion window; the first record always goes
/// out even when it is larger.
pub const WINDOW_MAX_BYTES: u64 = 3200;

/// Chunk size for streaming the retained tail during an archive.
const ARCHIVE_COPY_CHUNK: usize = 4096;

/// Activity counters, reset each time a stat snapshot is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub(crate) gets: u32,
    pub(crate) puts: u32,
    pub(crate) archives: u32,
    pub(crate) errs: u32,
}

/// Counter snapshot for one log, taken (and reset) by a stat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStats {
    pub name: String,
    pub lastmsg: u32,
    pub gets: u32,
    pub puts: u32,
    pub archives: u32,
    pub errs: u32,
}

impl LogStats {
    /// A log counts as active when it served any get or put, or saw errors.
    pub fn has_activity(&self) -> bool {
        self.gets + self.puts > 0 || self.errs > 0
    }
}

/// One log's open file and cached state.
pub struct LogFile {
    name: String,
    path: PathBuf,
    file: File,
    size: u64,
    lastmsg: u32,
    descriptors: Vec<Descriptor>,
    pub(crate) counters: Counters,
}

impl LogFile {
    /// Opens the log at `path`, creating it with a fresh DB header if it
    /// does not exist, and scans it to rebuild the descriptor cache.
    pub async fn open(name: impl Into<String>, path: PathBuf) -> Result<Self> {
        let file = match open_rw(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => create_with_header(&path, 0).await?,
            Err(e) => return Err(e.into()),
        };
        let mut log = Self {
            name: name.into(),
            path,
            file,
            size: 0,
            lastmsg: 0,
            descriptors: Vec::new(),
            counters: Counters::default(),
        };
        log.rescan().await?;
        Ok(log)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lastmsg(&self) -> u32 {
        self.lastmsg
    }

    #[cfg(test)]
    pub(crate) fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Reads the window of records with `num >= from`.
    ///
    /// At most [`WINDOW_MAX_RECORDS`] records are returned, fewer when the
    /// accumulated payload reaches [`WINDOW_MAX_BYTES`]. Every record is
    /// re-validated against its descriptor as it is read.
    pub(crate) async fn read_window(&mut self, from: u32) -> Result<Vec<Message>> {
        let ndx = self.descriptors.partition_point(|d| d.num < from);
        let window: Vec<Descriptor> = self
            .descriptors
            .iter()
            .skip(ndx)
            .take(WINDOW_MAX_RECORDS)
            .copied()
            .collect();

        let mut out = Vec::with_capacity(window.len());
        let mut total = 0u64;
        for desc in window {
            let message = codec::read_record(&mut self.file, desc, self.size).await?;
            total += message.data.len() as u64;
            out.push(message);
            if total >= WINDOW_MAX_BYTES {
                break;
            }
        }
        Ok(out)
    }

    /// Appends one record and returns its assigned number.
    ///
    /// The file is re-stat'ed first so edits made between requests (a
    /// truncation by hand, a deleted file) are picked up before the write.
    /// The cache is only updated once both header and payload are written.
    pub(crate) async fn append(&mut self, data: &[u8]) -> Result<u32> {
        self.refresh().await?;

        let num = self.lastmsg + 1;
        let offset = self.size;
        let header = codec::encode_record_header(num, data.len() as u32);

        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(&header).await?;
        self.file.write_all(data).await?;
        self.file.flush().await?;

        self.descriptors.push(Descriptor { num, offset });
        self.lastmsg = num;
        self.size = offset + header.len() as u64 + data.len() as u64;
        Ok(num)
    }

    /// Rotates the log: the active file is renamed aside and a successor is
    /// created under the original name, seeded with every record numbered
    /// strictly greater than `upto`.
    ///
    /// The successor's DB header carries `upto` so numbering continues from
    /// `upto + 1`; retained frames are copied verbatim, numbers intact.
    pub(crate) async fn archive(&mut self, upto: u32) -> Result<()> {
        if self.descriptors.is_empty() {
            return Err(Error::Archive("empty logfile".into()));
        }
        if upto == 0 {
            return Err(Error::Archive("upto not given".into()));
        }

        let mut upto = upto;
        let ndx = self.descriptors.partition_point(|d| d.num < upto);
        let retain = if ndx >= self.descriptors.len() {
            // asked to archive past the end: keep nothing
            upto = self.lastmsg;
            None
        } else if self.descriptors[ndx].num == upto {
            self.descriptors.get(ndx + 1).copied()
        } else {
            Some(self.descriptors[ndx])
        };

        self.descriptors.clear();
        self.lastmsg = 0;
        self.size = 0;

        let stamp = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .replace(':', "_");
        let archived = self
            .path
            .with_file_name(format!("--{}--{}", self.name, stamp));
        fs::rename(&self.path, &archived).await?;

        let mut fresh = create_with_header(&self.path, upto).await?;
        if let Some(desc) = retain {
            let mut old = File::open(&archived).await?;
            old.seek(SeekFrom::Start(desc.offset)).await?;
            fresh.seek(SeekFrom::End(0)).await?;
            let mut chunk = [0u8; ARCHIVE_COPY_CHUNK];
            loop {
                let n = old.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                fresh.write_all(&chunk[..n]).await?;
            }
            fresh.flush().await?;
        }

        self.file = fresh;
        self.rescan().await
    }

    /// Returns the counter snapshot and resets the counters.
    pub(crate) fn snapshot_counters(&mut self) -> LogStats {
        let stats = LogStats {
            name: self.name.clone(),
            lastmsg: self.lastmsg,
            gets: self.counters.gets,
            puts: self.counters.puts,
            archives: self.counters.archives,
            errs: self.counters.errs,
        };
        self.counters = Counters::default();
        stats
    }

    /// Picks up external changes: a missing file is recreated empty, a file
    /// whose size drifted from the cache is reopened and rescanned. An edit
    /// that preserves the size is invisible until the next drift.
    async fn refresh(&mut self) -> Result<()> {
        match fs::metadata(&self.path).await {
            Ok(meta) if meta.len() == self.size => Ok(()),
            Ok(_) => {
                self.file = open_rw(&self.path).await?;
                self.rescan().await
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.file = create_with_header(&self.path, 0).await?;
                self.rescan().await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn rescan(&mut self) -> Result<()> {
        self.size = self.file.metadata().await?.len();
        let (lastmsg, descriptors) = codec::scan(&mut self.file, self.size).await?;
        self.lastmsg = lastmsg;
        self.descriptors = descriptors;
        Ok(())
    }
}

async fn open_rw(path: &Path) -> std::io::Result<File> {
    fs::OpenOptions::new().read(true).write(true).open(path).await
}

/// Creates a new log file carrying a DB header with the given start number.
async fn create_with_header(path: &Path, start: u32) -> Result<File> {
    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(&codec::encode_db_header(start)).await?;
    file.flush().await?;
    Ok(file)
}
