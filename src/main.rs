use anyhow::{bail, Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use mbo_lines::capture::CaptureReader;
use mbo_lines::logging;
use mbo_lines::pipeline::{transcode_to_file, WriterOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(version, about = "Convert an MBO capture into canonical ADD/MOD/CXL/TRD/CLR lines")]
struct Args {
    /// Input capture file
    input: PathBuf,

    /// Output text file (created or truncated)
    output: PathBuf,

    /// Events buffered between the decoder and the writer thread
    #[arg(long, env = "MBO_QUEUE_DEPTH", default_value_t = 8192)]
    queue_depth: usize,

    /// Output buffer size in bytes
    #[arg(long, env = "MBO_BUFFER_BYTES", default_value_t = 1 << 20)]
    buffer_bytes: usize,
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    let args = Args::parse();
    logging::init();

    if !args.input.exists() {
        bail!("input not found: {}", args.input.display());
    }
    let reader = CaptureReader::open(&args.input).context("open capture")?;
    let h = reader.header();
    tracing::info!(dataset = %h.dataset, schema = %h.schema, version = h.version, "reading {}", args.input.display());

    // Ctrl+C stops between records; the writer still flushes what it has.
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        tracing::warn!("could not install Ctrl+C handler: {e}");
    }

    let opts = WriterOptions { queue_depth: args.queue_depth, buffer_bytes: args.buffer_bytes };
    let summary = transcode_to_file(reader, &args.output, &opts, &stop)
        .with_context(|| format!("transcode into {}", args.output.display()))?;
    tracing::info!(read = summary.read, skipped = summary.skipped, "done");

    if summary.interrupted {
        bail!(
            "interrupted after writing {} lines to {}; output is incomplete",
            summary.written,
            args.output.display()
        );
    }
    println!("wrote {} lines to {}", summary.written, args.output.display());
    Ok(())
}
