//! Canonical order events and their one-line text form.
//!
//! Each event renders as comma-separated fields with the kind tag first:
//!
//! ```text
//! ADD,<ts_ns>,<B|A>,<order_id>,<price>,<size>
//! MOD,<ts_ns>,<order_id>,<new_price>,<new_size>
//! CXL,<ts_ns>,<order_id>
//! TRD,<ts_ns>,<order_id>,<fill_qty>
//! CLR,<ts_ns>
//! ```
//!
//! All fields are integers or a single side character, so no quoting is
//! needed. Parsing accepts the same lines, optionally prefixed with a
//! `@<send_wall_ns>,` stamp as added by line streamers.
use crate::side::Side;
use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Add,
    Mod,
    Cxl,
    Trd,
    Clr,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [EventKind::Add, EventKind::Mod, EventKind::Cxl, EventKind::Trd, EventKind::Clr];

    pub fn tag(self) -> &'static str {
        match self {
            EventKind::Add => "ADD",
            EventKind::Mod => "MOD",
            EventKind::Cxl => "CXL",
            EventKind::Trd => "TRD",
            EventKind::Clr => "CLR",
        }
    }

    pub fn from_tag(tag: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// Number of comma-separated fields in a line of this kind, tag included.
    pub fn field_count(self) -> usize {
        match self {
            EventKind::Add => 6,
            EventKind::Mod => 5,
            EventKind::Cxl => 3,
            EventKind::Trd => 4,
            EventKind::Clr => 2,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalEvent {
    Add { ts_ns: u64, side: Side, order_id: u64, price: i64, size: u32 },
    Mod { ts_ns: u64, order_id: u64, new_price: i64, new_size: u32 },
    Cxl { ts_ns: u64, order_id: u64 },
    Trd { ts_ns: u64, order_id: u64, fill_qty: u32 },
    Clr { ts_ns: u64 },
}

impl CanonicalEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CanonicalEvent::Add { .. } => EventKind::Add,
            CanonicalEvent::Mod { .. } => EventKind::Mod,
            CanonicalEvent::Cxl { .. } => EventKind::Cxl,
            CanonicalEvent::Trd { .. } => EventKind::Trd,
            CanonicalEvent::Clr { .. } => EventKind::Clr,
        }
    }

    pub fn ts_ns(&self) -> u64 {
        match *self {
            CanonicalEvent::Add { ts_ns, .. }
            | CanonicalEvent::Mod { ts_ns, .. }
            | CanonicalEvent::Cxl { ts_ns, .. }
            | CanonicalEvent::Trd { ts_ns, .. }
            | CanonicalEvent::Clr { ts_ns } => ts_ns,
        }
    }
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CanonicalEvent::Add { ts_ns, side, order_id, price, size } => {
                write!(f, "ADD,{ts_ns},{},{order_id},{price},{size}", side.as_char())
            }
            CanonicalEvent::Mod { ts_ns, order_id, new_price, new_size } => {
                write!(f, "MOD,{ts_ns},{order_id},{new_price},{new_size}")
            }
            CanonicalEvent::Cxl { ts_ns, order_id } => write!(f, "CXL,{ts_ns},{order_id}"),
            CanonicalEvent::Trd { ts_ns, order_id, fill_qty } => write!(f, "TRD,{ts_ns},{order_id},{fill_qty}"),
            CanonicalEvent::Clr { ts_ns } => write!(f, "CLR,{ts_ns}"),
        }
    }
}

/// Render a nanosecond timestamp as RFC 3339 UTC, or the raw number if it is
/// outside the representable range.
pub fn utc_string(ts_ns: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ts_ns as i128)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ts_ns.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseLineError {
    #[error("empty line")]
    Empty,

    #[error("unknown event tag {0:?}")]
    UnknownTag(String),

    #[error("{kind} line needs {expected} fields, got {got}")]
    MissingField { kind: EventKind, expected: usize, got: usize },

    #[error("invalid {field} {value:?}")]
    InvalidInt { field: &'static str, value: String },
}

/// Drop a leading `@<digits>,` stamp. Lines whose stamp does not parse are
/// returned whole.
fn strip_stamp(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix('@') {
        if let Some((stamp, body)) = rest.split_once(',') {
            if stamp.parse::<u64>().is_ok() {
                return body;
            }
        }
    }
    line
}

fn int<T: FromStr>(field: &'static str, value: &str) -> Result<T, ParseLineError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParseLineError::InvalidInt { field, value: value.to_owned() })
}

impl FromStr for CanonicalEvent {
    type Err = ParseLineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_stamp(line.trim_end_matches(['\r', '\n']));
        if line.trim().is_empty() {
            return Err(ParseLineError::Empty);
        }
        let f: Vec<&str> = line.split(',').collect();
        let tag = f[0].trim();
        let kind = EventKind::from_tag(tag).ok_or_else(|| ParseLineError::UnknownTag(tag.to_owned()))?;
        if f.len() < kind.field_count() {
            return Err(ParseLineError::MissingField { kind, expected: kind.field_count(), got: f.len() });
        }
        let ts_ns = int("timestamp", f[1])?;
        Ok(match kind {
            EventKind::Add => CanonicalEvent::Add {
                ts_ns,
                side: if f[2].trim() == "B" { Side::Bid } else { Side::Ask },
                order_id: int("order_id", f[3])?,
                price: int("price", f[4])?,
                size: int("size", f[5])?,
            },
            EventKind::Mod => CanonicalEvent::Mod {
                ts_ns,
                order_id: int("order_id", f[2])?,
                new_price: int("new_price", f[3])?,
                new_size: int("new_size", f[4])?,
            },
            EventKind::Cxl => CanonicalEvent::Cxl { ts_ns, order_id: int("order_id", f[2])? },
            EventKind::Trd => CanonicalEvent::Trd {
                ts_ns,
                order_id: int("order_id", f[2])?,
                fill_qty: int("fill_qty", f[3])?,
            },
            EventKind::Clr => CanonicalEvent::Clr { ts_ns },
        })
    }
}

/// Tallies over a canonical event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub counts: BTreeMap<EventKind, u64>,
    /// Lines that did not parse as an event.
    pub malformed: u64,
    /// Timestamps of the first and last event, in file order.
    pub first_ts: Option<u64>,
    pub last_ts: Option<u64>,
    /// The first events of the log, up to the requested count.
    pub head: Vec<CanonicalEvent>,
}

impl LogSummary {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

/// Read a log line by line, keeping the first `keep` events in `head`.
/// Malformed lines are counted, not fatal; read errors are.
pub fn summarize<R: BufRead>(rdr: R, keep: usize) -> anyhow::Result<LogSummary> {
    use anyhow::Context;

    let mut summary = LogSummary::default();
    for (n, line) in rdr.lines().enumerate() {
        let line = line.with_context(|| format!("read line {}", n + 1))?;
        let ev: CanonicalEvent = match line.parse() {
            Ok(ev) => ev,
            Err(e) => {
                summary.malformed += 1;
                tracing::debug!(line = n + 1, "malformed: {e}");
                continue;
            }
        };
        *summary.counts.entry(ev.kind()).or_default() += 1;
        summary.first_ts.get_or_insert(ev.ts_ns());
        summary.last_ts = Some(ev.ts_ns());
        if summary.head.len() < keep {
            summary.head.push(ev);
        }
    }
    Ok(summary)
}
