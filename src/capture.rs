//! Framed capture files of decoded records.
//!
//! A capture is a sequence of frames, each laid out as
//! `len: u32 LE | crc32: u32 LE | payload`, where the payload is a
//! bincode-encoded [`CaptureFrame`]. The first frame is always a
//! [`CaptureHeader`]; the rest are records. Header frames met later in the
//! stream (concatenated captures) are checked and skipped.
//!
//! [`CaptureReader`] is the decoding side the transcoder consumes: it yields
//! records lazily and in file order, and turns CRC mismatches or truncated
//! frames into errors instead of guessing.
use crate::record::{CaptureFrame, CaptureHeader, RawRecord, CAPTURE_VERSION};
use anyhow::{bail, Context, Result};
use crc32fast::Hasher as Crc32;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Frames larger than this are treated as corruption rather than allocated.
pub const MAX_FRAME_LEN: usize = 16 << 20;

fn crc32(payload: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(payload);
    hasher.finalize()
}

pub fn write_frame<W: Write>(w: &mut W, frame: &CaptureFrame) -> Result<()> {
    let payload = bincode::serialize(frame)?;
    if payload.len() > MAX_FRAME_LEN {
        bail!("frame payload of {} bytes exceeds {MAX_FRAME_LEN}", payload.len());
    }
    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&crc32(&payload).to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

/// Read the length prefix. `Ok(None)` on a clean end of file.
fn read_len<R: Read>(r: &mut R) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(u32::from_le_bytes(buf))),
        n => bail!("truncated frame length ({n} of 4 bytes)"),
    }
}

/// Read one frame. `frame_no` is only used in error messages.
pub fn read_frame<R: Read>(r: &mut R, frame_no: u64) -> Result<Option<CaptureFrame>> {
    let Some(len) = read_len(r)? else { return Ok(None) };
    let len = len as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame {frame_no}: length {len} exceeds {MAX_FRAME_LEN}");
    }
    let mut crc = [0u8; 4];
    r.read_exact(&mut crc).with_context(|| format!("frame {frame_no}: truncated crc"))?;
    let crc_on_file = u32::from_le_bytes(crc);
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).with_context(|| format!("frame {frame_no}: truncated payload"))?;
    let crc_calc = crc32(&payload);
    if crc_calc != crc_on_file {
        bail!("CRC mismatch at frame {frame_no}: file={crc_on_file:#x}, calc={crc_calc:#x}");
    }
    let frame = bincode::deserialize(&payload).with_context(|| format!("frame {frame_no}: bincode decode"))?;
    Ok(Some(frame))
}

fn check_version(h: &CaptureHeader) -> Result<()> {
    if h.version != CAPTURE_VERSION {
        bail!("unsupported capture version {} (expected {CAPTURE_VERSION})", h.version);
    }
    Ok(())
}

/// Lazily decodes the records of a capture.
pub struct CaptureReader<R: Read> {
    rdr: R,
    header: CaptureHeader,
    frames: u64,
    failed: bool,
}

impl CaptureReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {path:?}"))?;
        Self::new(BufReader::new(file)).with_context(|| format!("{path:?} is not a readable MBO capture"))
    }
}

impl<R: Read> CaptureReader<R> {
    /// Wrap a reader positioned at the start of a capture and read its header.
    pub fn new(mut rdr: R) -> Result<Self> {
        let header = match read_frame(&mut rdr, 0)? {
            Some(CaptureFrame::Header(h)) => h,
            Some(CaptureFrame::Record(_)) => bail!("first frame is a record, expected a header"),
            None => bail!("empty capture"),
        };
        check_version(&header)?;
        Ok(Self { rdr, header, frames: 1, failed: false })
    }

    pub fn header(&self) -> &CaptureHeader {
        &self.header
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        loop {
            let frame = read_frame(&mut self.rdr, self.frames)?;
            self.frames += 1;
            match frame {
                None => return Ok(None),
                Some(CaptureFrame::Record(rec)) => return Ok(Some(rec)),
                Some(CaptureFrame::Header(h)) => {
                    check_version(&h)?;
                    tracing::debug!(dataset = %h.dataset, schema = %h.schema, "skipping embedded capture header");
                }
            }
        }
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = Result<RawRecord>;

    /// Yields records until end of file. After the first error the iterator
    /// is exhausted, since the frame boundary is lost.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(rec) => rec.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Writes a capture: header first, then one frame per record.
pub struct CaptureWriter<W: Write> {
    w: W,
    records: u64,
}

impl CaptureWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, dataset: &str, schema: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("create {parent:?}"))?;
            }
        }
        let file = File::create(path).with_context(|| format!("create {path:?}"))?;
        let header = CaptureHeader {
            version: CAPTURE_VERSION,
            created_unix_ns: SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos(),
            dataset: dataset.to_owned(),
            schema: schema.to_owned(),
        };
        Self::new(BufWriter::new(file), &header)
    }
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(mut w: W, header: &CaptureHeader) -> Result<Self> {
        write_frame(&mut w, &CaptureFrame::Header(header.clone()))?;
        Ok(Self { w, records: 0 })
    }

    pub fn write_record(&mut self, rec: &RawRecord) -> Result<()> {
        write_frame(&mut self.w, &CaptureFrame::Record(rec.clone()))?;
        self.records += 1;
        Ok(())
    }

    /// Flush and hand back the sink along with the number of records written.
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.w.flush()?;
        Ok((self.w, self.records))
    }
}
