//! Stream driver: decoded records in, canonical lines out.
//!
//! Records are pulled one at a time, normalized, and written in the order
//! they arrive; a record yields zero or one line. The stop flag is checked
//! before each pull so a run can be interrupted between records without
//! leaving half a line behind.
use crate::event::CanonicalEvent;
use crate::normalize::normalize;
use crate::record::RawRecord;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Records pulled from the source.
    pub read: u64,
    /// Lines written to the output.
    pub written: u64,
    /// Records that were not order events or had an unknown action.
    pub skipped: u64,
    /// The stop flag ended the run before the source was exhausted.
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Capacity of the channel between the decoding loop and the writer.
    pub queue_depth: usize,
    /// Size of the output `BufWriter`.
    pub buffer_bytes: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self { queue_depth: 8192, buffer_bytes: 1 << 20 }
    }
}

/// Write one event as a newline-terminated line.
pub fn write_event<W: Write>(w: &mut W, ev: &CanonicalEvent) -> std::io::Result<()> {
    writeln!(w, "{ev}")
}

/// Pull records until the source ends or `stop` is set, handing each event
/// to `emit`.
fn drive<I, F>(records: I, stop: &AtomicBool, summary: &mut Summary, mut emit: F) -> Result<()>
where
    I: IntoIterator<Item = Result<RawRecord>>,
    F: FnMut(CanonicalEvent) -> Result<()>,
{
    let mut records = records.into_iter();
    loop {
        if stop.load(Ordering::Relaxed) {
            summary.interrupted = true;
            tracing::warn!(read = summary.read, "stop requested, ending early");
            return Ok(());
        }
        let Some(rec) = records.next() else { return Ok(()) };
        let rec = rec.with_context(|| format!("decode record {}", summary.read))?;
        summary.read += 1;
        match normalize(&rec) {
            Some(ev) => emit(ev)?,
            None => {
                summary.skipped += 1;
                tracing::trace!(record = summary.read - 1, "skipped non-order record");
            }
        }
    }
}

/// Transcode on the calling thread into any writer.
pub fn transcode<I, W>(records: I, out: W, stop: &AtomicBool) -> Result<Summary>
where
    I: IntoIterator<Item = Result<RawRecord>>,
    W: Write,
{
    let mut w = BufWriter::new(out);
    let mut summary = Summary::default();
    let mut written = 0u64;
    drive(records, stop, &mut summary, |ev| {
        write_event(&mut w, &ev)?;
        written += 1;
        Ok(())
    })?;
    w.flush()?;
    summary.written = written;
    Ok(summary)
}

fn create_output(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create {parent:?}"))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("open {path:?} for writing"))
}

fn writer_thread(file: File, buffer_bytes: usize, rx: Receiver<CanonicalEvent>) -> Result<u64> {
    let mut w = BufWriter::with_capacity(buffer_bytes.max(1), file);
    let mut n = 0u64;
    for ev in rx {
        write_event(&mut w, &ev)?;
        n += 1;
    }
    w.flush()?;
    Ok(n)
}

/// Transcode into a file, with formatting and file I/O on a writer thread.
///
/// The output is created before the first record is read. A single FIFO
/// channel carries events, so line order equals record order. On any error
/// the writer still drains what was queued and flushes before returning.
pub fn transcode_to_file<I>(records: I, out: &Path, opts: &WriterOptions, stop: &AtomicBool) -> Result<Summary>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let file = create_output(out)?;
    let (tx, rx) = bounded::<CanonicalEvent>(opts.queue_depth.max(1));
    let buffer_bytes = opts.buffer_bytes;
    let writer = thread::Builder::new()
        .name("line-writer".into())
        .spawn(move || writer_thread(file, buffer_bytes, rx))
        .context("spawn writer thread")?;

    let mut summary = Summary::default();
    let mut sent = 0u64;
    let fed = feed(records, &tx, stop, &mut summary, &mut sent);
    drop(tx);

    let written = writer.join().map_err(|_| anyhow!("writer thread panicked"))??;
    fed?;
    debug_assert_eq!(written, sent);
    summary.written = written;
    tracing::debug!(?summary, path = ?out, "transcode finished");
    Ok(summary)
}

fn feed<I>(records: I, tx: &Sender<CanonicalEvent>, stop: &AtomicBool, summary: &mut Summary, sent: &mut u64) -> Result<()>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    drive(records, stop, summary, |ev| {
        tx.send(ev).map_err(|_| anyhow!("writer thread stopped"))?;
        *sent += 1;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(action: &str, order_id: u64) -> Result<RawRecord> {
        Ok(RawRecord {
            action: Some(action.into()),
            order_id: Some(order_id),
            price: Some(10),
            size: Some(1),
            ts_event: Some(order_id),
            ..Default::default()
        })
    }

    fn status() -> Result<RawRecord> {
        Ok(RawRecord { action: Some("clear".into()), ts_recv: Some(1), ..Default::default() })
    }

    #[test]
    fn order_and_count_preserved() {
        let input = vec![rec("add", 1), status(), rec("cxl", 2), rec("zzz", 3), rec("trade", 4)];
        let mut out = Vec::new();
        let summary = transcode(input, &mut out, &AtomicBool::new(false)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "ADD,1,B,1,10,1\nCXL,2,2\nTRD,4,4,1\n");
        assert_eq!(summary, Summary { read: 5, written: 3, skipped: 2, interrupted: false });
        assert_eq!(summary.written as usize, text.lines().count());
    }

    #[test]
    fn decode_error_aborts() {
        let input = vec![rec("add", 1), Err(anyhow!("bad frame")), rec("add", 2)];
        let mut out = Vec::new();
        let err = transcode(input, &mut out, &AtomicBool::new(false)).unwrap_err();
        assert!(format!("{err:#}").contains("bad frame"));
    }

    #[test]
    fn stop_flag_ends_before_first_record() {
        let mut out = Vec::new();
        let summary = transcode(vec![rec("add", 1)], &mut out, &AtomicBool::new(true)).unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.read, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn file_writer_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        let input = || (0..1000u64).map(|i| rec(if i % 3 == 0 { "add" } else { "mod" }, i));
        let opts = WriterOptions { queue_depth: 4, buffer_bytes: 64 };

        let summary = transcode_to_file(input(), &path, &opts, &AtomicBool::new(false)).unwrap();
        let mut expected = Vec::new();
        let mem = transcode(input(), &mut expected, &AtomicBool::new(false)).unwrap();

        assert_eq!(summary, mem);
        assert_eq!(fs::read(&path).unwrap(), expected);
    }

    #[test]
    fn file_writer_keeps_lines_written_before_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let input = vec![rec("add", 1), Err(anyhow!("bad frame"))];
        let res = transcode_to_file(input, &path, &WriterOptions::default(), &AtomicBool::new(false));
        assert!(res.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "ADD,1,B,1,10,1\n");
    }
}
