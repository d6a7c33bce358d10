//! Periodic self-telemetry.
//!
//! A background task sweeps every log's counters on a fixed cadence and
//! appends one JSON snapshot per active interval to the reserved `_kaf`
//! log, where it can be consumed like any other message stream. Taking a
//! stat snapshot resets the counters, so each report covers exactly one
//! interval.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::error::Result;
use crate::logfile::LogStats;
use crate::registry::{Registry, RESERVED_LOG};

/// How often counters are collected and published.
pub const STATS_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Starts the stats loop. The first snapshot is taken one period in.
pub fn spawn(registry: Registry, period: Duration) -> JoinHandle<()> {
    tokio::spawn(run(registry, period))
}

async fn run(registry: Registry, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    let mut statno: u32 = 0;
    loop {
        let start = Utc::now();
        ticker.tick().await;
        statno += 1;
        if let Err(e) = publish(&registry, statno, start).await {
            tracing::warn!(error = %e, "failed publishing stats snapshot");
        }
    }
}

/// Sweeps all logs and appends a report to `_kaf` when anything was active.
///
/// `statno` counts ticks, not written reports: intervals in which every log
/// was idle leave a gap in the published numbers.
pub(crate) async fn publish(registry: &Registry, statno: u32, start: DateTime<Utc>) -> Result<()> {
    let mut active = Vec::new();
    for handle in registry.list_all().await? {
        if handle.name() == RESERVED_LOG {
            continue;
        }
        let stats = handle.stat().await?;
        if stats.has_activity() {
            active.push(stats);
        }
    }
    let end = Utc::now();

    if active.is_empty() {
        return Ok(());
    }

    let Some(kaf) = registry.resolve(RESERVED_LOG, true).await? else {
        return Ok(());
    };
    let report = build_report(&active, statno, start, end);
    kaf.put(Bytes::from(report)).await?;
    Ok(())
}

#[derive(Serialize)]
struct Report<'a> {
    start: String,
    end: String,
    statno: u32,
    logs: Vec<ReportEntry<'a>>,
}

/// One log's line in the report. Counters are omitted for shapes that do
/// not carry them: logs with errors report everything, active logs skip
/// `errs`, idle logs report name and last number only.
#[derive(Serialize)]
struct ReportEntry<'a> {
    name: &'a str,
    last: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    gets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    puts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errs: Option<u32>,
}

impl<'a> From<&'a LogStats> for ReportEntry<'a> {
    fn from(stats: &'a LogStats) -> Self {
        let (gets, puts, errs) = if stats.errs > 0 {
            (Some(stats.gets), Some(stats.puts), Some(stats.errs))
        } else if stats.has_activity() {
            (Some(stats.gets), Some(stats.puts), None)
        } else {
            (None, None, None)
        };
        ReportEntry {
            name: &stats.name,
            last: stats.lastmsg,
            gets,
            puts,
            errs,
        }
    }
}

fn build_report(stats: &[LogStats], statno: u32, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let report = Report {
        start: start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end: end.to_rfc3339_opts(SecondsFormat::Secs, true),
        statno,
        logs: stats.iter().map(ReportEntry::from).collect(),
    };
    serde_json::to_string(&report).expect("stats report serializes")
}
