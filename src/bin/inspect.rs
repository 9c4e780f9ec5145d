use anyhow::{Context, Result};
use clap::Parser;
use mbo_lines::event::{summarize, utc_string, EventKind};
use mbo_lines::logging;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Read a canonical MBO event log and summarize it")]
struct Args {
    /// Event log to read (output of mbo_lines)
    input: PathBuf,

    /// Print the first N events with their UTC time
    #[arg(long, default_value_t = 0)]
    show: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();
    let rdr = BufReader::new(File::open(&args.input).with_context(|| format!("open {:?}", args.input))?);
    let summary = summarize(rdr, args.show)?;

    for ev in &summary.head {
        println!("{} {}", utc_string(ev.ts_ns()), ev);
    }
    println!("events: {}", summary.total());
    for kind in EventKind::ALL {
        println!("  {kind}: {}", summary.count(kind));
    }
    println!("malformed: {}", summary.malformed);
    if let (Some(f), Some(l)) = (summary.first_ts, summary.last_ts) {
        println!("first: {}", utc_string(f));
        println!("last:  {}", utc_string(l));
    }
    Ok(())
}
