//! pcap output for forwarded capture frames
//!
//! Writes classic little-endian pcap files with the IEEE 802.11 + radiotap
//! link type, so the output of the hook opens directly in capture tools.
//!
//! Format reference: https://wiki.wireshark.org/Development/LibpcapFileFormat

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

use rxtap::{FramePool, FrameSink};

use crate::Result;

const MAGIC: u32 = 0xa1b2_c3d4;
const VERSION_MAJOR: u16 = 2;
const VERSION_MINOR: u16 = 4;

/// LINKTYPE_IEEE802_11_RADIOTAP
pub const LINKTYPE_IEEE802_11_RADIOTAP: u32 = 127;

pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

/// Writes radiotap frames as pcap records
#[derive(Debug)]
pub struct PcapWriter<W: Write> {
    out: W,
    snaplen: u32,
    records: u64,
}

impl<W: Write> PcapWriter<W> {
    /// Write the global header and return a writer ready for records
    pub fn new(mut out: W, snaplen: u32) -> Result<Self> {
        let mut header = [0u8; GLOBAL_HEADER_LEN];
        let mut buf = &mut header[..];
        buf.put_u32_le(MAGIC);
        buf.put_u16_le(VERSION_MAJOR);
        buf.put_u16_le(VERSION_MINOR);
        // GMT offset and timestamp accuracy, always zero in practice
        buf.put_i32_le(0);
        buf.put_u32_le(0);
        buf.put_u32_le(snaplen);
        buf.put_u32_le(LINKTYPE_IEEE802_11_RADIOTAP);

        out.write_all(&header)?;
        Ok(Self {
            out,
            snaplen,
            records: 0,
        })
    }

    /// Write a frame stamped with the current time
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.write_frame_at(frame, Utc::now())
    }

    /// Write a frame with an explicit capture time. Frames longer than the
    /// snapshot length are truncated; the original length is kept.
    pub fn write_frame_at(&mut self, frame: &[u8], ts: DateTime<Utc>) -> Result<()> {
        let captured = frame.len().min(self.snaplen as usize);

        let mut header = BytesMut::with_capacity(RECORD_HEADER_LEN);
        // Classic pcap stores seconds in 32 bits
        header.put_u32_le(ts.timestamp() as u32);
        header.put_u32_le(ts.timestamp_subsec_micros());
        header.put_u32_le(captured as u32);
        header.put_u32_le(frame.len() as u32);

        self.out.write_all(&header)?;
        self.out.write_all(&frame[..captured])?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Frame sink that appends every delivered frame to a pcap stream
///
/// Write failures are logged and counted; the hook never sees them. When
/// built with a pool, written buffers are recycled into it.
#[derive(Debug)]
pub struct PcapSink<W: Write> {
    writer: Mutex<PcapWriter<W>>,
    pool: Option<Arc<FramePool>>,
    failed: AtomicU64,
}

impl<W: Write> PcapSink<W> {
    pub fn new(writer: PcapWriter<W>) -> Self {
        Self {
            writer: Mutex::new(writer),
            pool: None,
            failed: AtomicU64::new(0),
        }
    }

    /// Return buffers to `pool` once written
    pub fn with_pool(mut self, pool: Arc<FramePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Frames that could not be written
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn flush(&self) -> Result<()> {
        self.lock_writer().flush()
    }

    pub fn into_writer(self) -> PcapWriter<W> {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, PcapWriter<W>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write> FrameSink for PcapSink<W> {
    fn deliver(&self, frame: BytesMut) {
        if let Err(e) = self.lock_writer().write_frame(&frame) {
            self.failed.fetch_add(1, Ordering::Relaxed);
            warn!("Failed to write {} byte frame to capture: {}", frame.len(), e);
        }

        if let Some(pool) = &self.pool {
            pool.recycle(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rxtap::BufferAllocator;

    #[test]
    fn test_global_header() {
        let writer = PcapWriter::new(Vec::new(), 65535).unwrap();
        let out = writer.into_inner();

        assert_eq!(out.len(), GLOBAL_HEADER_LEN);
        assert_eq!(&out[0..4], &[0xd4, 0xc3, 0xb2, 0xa1]);
        assert_eq!(&out[4..8], &[2, 0, 4, 0]);
        assert_eq!(&out[16..20], &65535u32.to_le_bytes());
        assert_eq!(&out[20..24], &[127, 0, 0, 0]);
    }

    #[test]
    fn test_record_layout() {
        let mut writer = PcapWriter::new(Vec::new(), 65535).unwrap();
        let ts = Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap();
        writer.write_frame_at(b"frame", ts).unwrap();
        assert_eq!(writer.records(), 1);

        let out = writer.into_inner();
        let record = &out[GLOBAL_HEADER_LEN..];
        assert_eq!(&record[0..4], &1_700_000_000u32.to_le_bytes());
        assert_eq!(&record[4..8], &250_000u32.to_le_bytes());
        assert_eq!(&record[8..12], &5u32.to_le_bytes());
        assert_eq!(&record[12..16], &5u32.to_le_bytes());
        assert_eq!(&record[16..], b"frame");
    }

    #[test]
    fn test_snaplen_truncates() {
        let mut writer = PcapWriter::new(Vec::new(), 4).unwrap();
        writer.write_frame(b"abcdefgh").unwrap();

        let out = writer.into_inner();
        let record = &out[GLOBAL_HEADER_LEN..];
        assert_eq!(&record[8..12], &4u32.to_le_bytes());
        assert_eq!(&record[12..16], &8u32.to_le_bytes());
        assert_eq!(&record[16..], b"abcd");
    }

    #[test]
    fn test_sink_recycles_into_pool() {
        let pool = Arc::new(FramePool::new(128, 1));
        let sink = PcapSink::new(PcapWriter::new(Vec::new(), 65535).unwrap())
            .with_pool(Arc::clone(&pool));

        let mut buffer = pool.acquire(8).unwrap();
        buffer.copy_from_slice(b"12345678");
        sink.deliver(buffer);

        assert_eq!(pool.available(), 1);
        assert_eq!(sink.failed(), 0);
        assert_eq!(sink.into_writer().records(), 1);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_counts_write_failures() {
        let writer = PcapWriter {
            out: BrokenPipe,
            snaplen: 65535,
            records: 0,
        };
        let sink = PcapSink::new(writer);
        sink.deliver(BytesMut::from(&b"frame"[..]));
        assert_eq!(sink.failed(), 1);
    }
}
