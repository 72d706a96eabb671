// pcap-client-sampler/src/packet_capture.rs
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapReader, PcapWriter};
use pcap_file::{DataLink, PcapError, TsResolution};

use crate::error::{Result, SamplerError};

/// Largest record the sink accepts.
pub const MAX_RECORD_SIZE: u32 = 65535;

/// One capture record, bytes and metadata exactly as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPacket {
    pub timestamp: Duration,
    pub orig_len: u32,
    pub data: Vec<u8>,
}

impl CapturedPacket {
    pub fn new(timestamp: Duration, data: Vec<u8>) -> Self {
        CapturedPacket {
            timestamp,
            orig_len: data.len() as u32,
            data,
        }
    }
}

/// A lazy, finite sequence of capture records.
///
/// `Ok(None)` is end of input; `Err` is a read failure.
pub trait PacketSource {
    fn datalink(&self) -> DataLink;
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>>;
}

pub trait PacketSink {
    fn write_packet(&mut self, packet: &CapturedPacket) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

pub struct PcapSource<R: Read> {
    reader: PcapReader<R>,
}

impl PcapSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SamplerError::SourceOpen {
            path: path.to_path_buf(),
            source: PcapError::IoError(e),
        })?;
        let source = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            SamplerError::Read(source) => SamplerError::SourceOpen {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!(
            "Opened input {} (datalink {:?})",
            path.display(),
            source.datalink()
        );
        Ok(source)
    }
}

impl<R: Read> PcapSource<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let reader = PcapReader::new(reader).map_err(SamplerError::Read)?;
        Ok(PcapSource { reader })
    }

    pub fn ts_resolution(&self) -> TsResolution {
        self.reader.header().ts_resolution
    }
}

impl<R: Read> PacketSource for PcapSource<R> {
    fn datalink(&self) -> DataLink {
        self.reader.header().datalink
    }

    fn next_packet(&mut self) -> Result<Option<CapturedPacket>> {
        self.reader
            .next_packet()
            .map(|pkt| {
                pkt.map(|p| CapturedPacket {
                    timestamp: p.timestamp,
                    orig_len: p.orig_len,
                    data: p.data.into_owned(),
                })
                .map_err(SamplerError::Read)
            })
            .transpose()
    }
}

/// Writes records with a raw-IP link-layer header.
///
/// Records longer than [`MAX_RECORD_SIZE`] are truncated; `orig_len` is kept.
pub struct PcapSink<W: Write> {
    writer: Option<PcapWriter<W>>,
    finished: Option<W>,
}

impl PcapSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, ts_resolution: TsResolution) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| SamplerError::SinkOpen {
            path: path.to_path_buf(),
            source: PcapError::IoError(e),
        })?;
        let sink = Self::from_writer(BufWriter::new(file), ts_resolution).map_err(|e| match e {
            SamplerError::Write(source) => SamplerError::SinkOpen {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Opened output {}", path.display());
        Ok(sink)
    }
}

impl<W: Write> PcapSink<W> {
    pub fn from_writer(writer: W, ts_resolution: TsResolution) -> Result<Self> {
        let header = PcapHeader {
            snaplen: MAX_RECORD_SIZE,
            datalink: DataLink::RAW,
            ts_resolution,
            ..Default::default()
        };
        let writer = PcapWriter::with_header(writer, header).map_err(SamplerError::Write)?;
        Ok(PcapSink {
            writer: Some(writer),
            finished: None,
        })
    }

    pub fn into_inner(self) -> Option<W> {
        self.finished.or_else(|| self.writer.map(PcapWriter::into_writer))
    }
}

impl<W: Write> PacketSink for PcapSink<W> {
    fn write_packet(&mut self, packet: &CapturedPacket) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            SamplerError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "sink already finished"))
        })?;

        let data = if packet.data.len() > MAX_RECORD_SIZE as usize {
            warn!(
                "Truncating record of {} bytes to snaplen {}",
                packet.data.len(),
                MAX_RECORD_SIZE
            );
            &packet.data[..MAX_RECORD_SIZE as usize]
        } else {
            &packet.data[..]
        };
        let orig_len = packet.orig_len.max(packet.data.len() as u32);

        let record = PcapPacket::new(packet.timestamp, orig_len, data);
        writer.write_packet(&record).map_err(SamplerError::Write)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let mut inner = writer.into_writer();
            inner.flush()?;
            self.finished = Some(inner);
        }
        Ok(())
    }
}

/// In-memory source, mostly for driving the sampler from code.
pub struct MemorySource {
    datalink: DataLink,
    packets: std::vec::IntoIter<CapturedPacket>,
}

impl MemorySource {
    pub fn new(datalink: DataLink, packets: Vec<CapturedPacket>) -> Self {
        MemorySource {
            datalink,
            packets: packets.into_iter(),
        }
    }
}

impl PacketSource for MemorySource {
    fn datalink(&self) -> DataLink {
        self.datalink
    }

    fn next_packet(&mut self) -> Result<Option<CapturedPacket>> {
        Ok(self.packets.next())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub packets: Vec<CapturedPacket>,
}

impl PacketSink for MemorySink {
    fn write_packet(&mut self, packet: &CapturedPacket) -> Result<()> {
        self.packets.push(packet.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
