//! Kaf - a small, human-inspectable event-log server.
//!
//! Kaf stores append-only message logs as plain text-framed files, one per
//! log, that can be examined with standard line-oriented tools and repaired
//! by hand. Producers POST opaque byte payloads to a named log; consumers
//! GET a short window of records starting from a sequence number they track
//! themselves.
//!
//! # Architecture
//!
//! Every log is owned by a single worker task (the only code that touches
//! its file), and a single registry task owns the name-to-worker map for
//! the whole server. All communication goes over bounded command channels
//! with oneshot replies, so operations on one log are strictly serialized
//! while distinct logs proceed in parallel.
//!
//! # Key Concepts
//!
//! - **Log**: a named, append-only, ordered sequence of records backed by
//!   one file. Record numbers are monotonic and assigned at append time.
//! - **Descriptor**: an in-RAM `(num, offset)` pair kept per record so a
//!   window read can locate records without rereading the file.
//! - **Archive**: a rotation that renames the active file aside and seeds a
//!   fresh successor with a tail of the old one. The log keeps its name and
//!   its numbering, so stateless consumers never notice.
//! - **`_kaf`**: a reserved log the server appends its own periodic
//!   statistics snapshots to, as JSON records.
//!
//! # Example
//!
//! ```ignore
//! use kaf::{Registry, stats};
//!
//! // Load every log in the data directory and start serving
//! let registry = Registry::boot("./kafdata".into()).await?;
//! stats::spawn(registry.clone(), stats::STATS_INTERVAL);
//!
//! let orders = registry.resolve("orders", true).await?.unwrap();
//! let num = orders.put(bytes::Bytes::from("order-123")).await?;
//! let window = orders.get(num).await?;
//! ```

mod actor;
mod codec;
mod error;
mod logfile;
mod registry;
pub mod server;
pub mod stats;

pub use actor::LogHandle;
pub use codec::{Descriptor, Message};
pub use error::{Error, Result};
pub use logfile::{LogFile, LogStats, WINDOW_MAX_BYTES, WINDOW_MAX_RECORDS};
pub use registry::{is_hidden_name, Registry, RESERVED_LOG};
