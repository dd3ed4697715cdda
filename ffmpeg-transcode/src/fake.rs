//! In-memory backend: a scripted input container, codecs with configurable
//! latency and a muxer that records everything written to it.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use ffmpeg_next::{Rational, Rescale};

use crate::{
    backend::{
        AvResult, Backend, Decode, Demux, Encode, FilterGraph, MediaFrame, MediaKind,
        MediaPacket, Mux, Pull, StreamInfo,
    },
    error::{Result, TranscodeError},
};

/// Codec name no decoder is registered for.
pub const UNKNOWN_CODEC: &str = "unknown";
/// Codec name that decodes but has no encoder.
pub const NO_ENCODER_CODEC: &str = "noenc";
/// Filter that drops every second frame.
pub const DECIMATE: &str = "decimate";

#[derive(Debug, Clone, PartialEq)]
pub struct FakePacket {
    pub stream: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub data: Vec<u8>,
    pub key: bool,
    pub position: i64,
}

impl MediaPacket for FakePacket {
    fn empty() -> Self {
        Self {
            stream: 0,
            pts: None,
            dts: None,
            data: Vec::new(),
            key: false,
            position: -1,
        }
    }

    fn stream_index(&self) -> usize {
        self.stream
    }

    fn set_stream_index(&mut self, index: usize) {
        self.stream = index;
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn dts(&self) -> Option<i64> {
        self.dts
    }

    fn rescale_ts(&mut self, from: Rational, to: Rational) {
        self.pts = self.pts.map(|ts| ts.rescale(from, to));
        self.dts = self.dts.map(|ts| ts.rescale(from, to));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeFrame {
    pub pts: Option<i64>,
    pub best_effort: Option<i64>,
    pub data: Vec<u8>,
    /// Picture type inherited from the source packet.
    pub key: bool,
}

impl MediaFrame for FakeFrame {
    fn empty(_kind: MediaKind) -> Self {
        Self {
            pts: None,
            best_effort: None,
            data: Vec::new(),
            key: false,
        }
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    fn best_effort_timestamp(&self) -> Option<i64> {
        self.best_effort
    }

    fn clear_picture_type(&mut self) {
        self.key = false;
    }
}

/// Counts live handles; every fake object holds one.
#[derive(Debug)]
pub struct Handle(Arc<AtomicUsize>);

impl Handle {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live.clone())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputStream {
    pub index: usize,
    pub copied: bool,
    pub time_base: Rational,
    /// Encoder was asked to emit extradata instead of in-band headers.
    pub global_header: bool,
}

/// Everything the fake muxer and codecs saw during a run.
#[derive(Debug, Default)]
pub struct Recording {
    pub streams: Vec<OutputStream>,
    pub header_written: bool,
    pub trailer_written: bool,
    pub packets: Vec<FakePacket>,
    pub decoder_eofs: usize,
    pub encoder_flushes: usize,
    /// Frames that reached an encoder still carrying the source picture type.
    pub typed_frames: usize,
}

impl Recording {
    pub fn packets_of(&self, stream: usize) -> Vec<&FakePacket> {
        self.packets.iter().filter(|p| p.stream == stream).collect()
    }
}

/// Scripted input: stream descriptions plus packets in file order.
#[derive(Debug, Clone, Default)]
pub struct FakeMedia {
    pub streams: Vec<StreamInfo>,
    pub packets: Vec<FakePacket>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(mut self, kind: MediaKind, codec: &str, time_base: Rational) -> Self {
        let index = self.streams.len();
        self.streams.push(StreamInfo {
            index,
            kind,
            codec: codec.to_string(),
            time_base,
            has_decoder: codec != UNKNOWN_CODEC,
        });
        self
    }

    /// Appends one packet of `stream` with identical pts and dts.
    pub fn packet(self, stream: usize, ts: i64) -> Self {
        self.reordered_packet(stream, ts, ts)
    }

    /// Appends one packet whose presentation time differs from decode order.
    pub fn reordered_packet(mut self, stream: usize, pts: i64, dts: i64) -> Self {
        let seq = self.packets.len();
        self.packets.push(FakePacket {
            stream,
            pts: Some(pts),
            dts: Some(dts),
            data: format!("s{}-p{}-#{}", stream, pts, seq).into_bytes(),
            key: true,
            position: seq as i64 * 188,
        });
        self
    }

    /// Round-robin interleave of `count` packets per stream, `step` ticks apart.
    pub fn interleaved(mut self, count: usize, step: i64) -> Self {
        let streams = self.streams.len();
        for n in 0..count as i64 {
            for stream in 0..streams {
                self = self.packet(stream, n * step);
            }
        }
        self
    }
}

#[derive(Clone)]
pub struct FakeBackend {
    pub media: FakeMedia,
    pub recording: Arc<Mutex<Recording>>,
    pub live: Arc<AtomicUsize>,
    /// Packets a decoder holds before releasing frames in pts order.
    pub reorder_depth: usize,
    /// Frames an encoder holds back; non-zero means it advertises delay.
    pub encoder_delay: usize,
    /// Every stream's time base after the header is written, like mp4 forcing its own.
    pub muxer_time_base: Option<Rational>,
    /// Encoders fail once they were sent this many frames.
    pub fail_encode_after: Option<usize>,
    /// The muxer wants codec headers out of band, like mp4 and mkv.
    pub global_header: bool,
}

impl FakeBackend {
    pub fn new(media: FakeMedia) -> Self {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
        Self {
            media,
            recording: Arc::new(Mutex::new(Recording::default())),
            live: Arc::new(AtomicUsize::new(0)),
            reorder_depth: 0,
            encoder_delay: 0,
            muxer_time_base: None,
            fail_encode_after: None,
            global_header: false,
        }
    }

    pub fn with_reorder_depth(mut self, depth: usize) -> Self {
        self.reorder_depth = depth;
        self
    }

    pub fn with_encoder_delay(mut self, delay: usize) -> Self {
        self.encoder_delay = delay;
        self
    }

    pub fn with_muxer_time_base(mut self, time_base: Rational) -> Self {
        self.muxer_time_base = Some(time_base);
        self
    }

    pub fn with_fail_encode_after(mut self, frames: usize) -> Self {
        self.fail_encode_after = Some(frames);
        self
    }

    pub fn with_global_header(mut self) -> Self {
        self.global_header = true;
        self
    }

    pub fn recording(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap()
    }

    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeInput {
    streams: Vec<StreamInfo>,
    packets: VecDeque<FakePacket>,
    _handle: Handle,
}

impl Demux for FakeInput {
    type Packet = FakePacket;

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<FakePacket>> {
        while let Some(packet) = self.packets.pop_front() {
            if packet.stream < self.streams.len() {
                return Ok(Some(packet));
            }
            log::warn!("dropping packet of unknown stream #{}", packet.stream);
        }
        Ok(None)
    }
}

pub struct FakeOutput {
    recording: Arc<Mutex<Recording>>,
    muxer_time_base: Option<Rational>,
    global_header: bool,
    _handle: Handle,
}

impl FakeOutput {
    fn record(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap()
    }
}

impl Mux for FakeOutput {
    type Packet = FakePacket;

    fn requires_global_header(&self) -> bool {
        self.global_header
    }

    fn nb_streams(&self) -> usize {
        self.record().streams.len()
    }

    fn write_header(&mut self) -> Result<()> {
        let muxer_time_base = self.muxer_time_base;
        let mut record = self.record();
        if let Some(time_base) = muxer_time_base {
            for stream in record.streams.iter_mut() {
                stream.time_base = time_base;
            }
        }
        record.header_written = true;
        Ok(())
    }

    fn stream_time_base(&self, index: usize) -> Rational {
        self.record().streams[index].time_base
    }

    fn write_interleaved(&mut self, packet: &mut FakePacket) -> Result<()> {
        let mut record = self.record();
        if !record.header_written || record.trailer_written {
            return Err(TranscodeError::WriteFailure {
                what: "packet",
                source: ffmpeg_next::Error::InvalidData,
            });
        }
        packet.position = -1;
        record.packets.push(packet.clone());
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.record().trailer_written = true;
        Ok(())
    }
}

pub struct FakeDecoder {
    time_base: Rational,
    depth: usize,
    held: Vec<FakeFrame>,
    ready: VecDeque<FakeFrame>,
    eof: bool,
    recording: Arc<Mutex<Recording>>,
    _handle: Handle,
}

impl FakeDecoder {
    fn release(&mut self, keep: usize) {
        self.held.sort_by_key(|frame| frame.best_effort);
        while self.held.len() > keep {
            let frame = self.held.remove(0);
            self.ready.push_back(frame);
        }
    }
}

impl Decode for FakeDecoder {
    type Packet = FakePacket;
    type Frame = FakeFrame;

    fn time_base(&self) -> Rational {
        self.time_base
    }

    fn send_packet(&mut self, packet: &FakePacket) -> AvResult<()> {
        if self.eof {
            return Err(ffmpeg_next::Error::Eof);
        }
        self.held.push(FakeFrame {
            pts: None,
            best_effort: packet.pts,
            data: packet.data.clone(),
            key: packet.key,
        });
        self.release(self.depth);
        Ok(())
    }

    fn send_eof(&mut self) -> AvResult<()> {
        self.eof = true;
        self.release(0);
        self.recording.lock().unwrap().decoder_eofs += 1;
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut FakeFrame) -> AvResult<Pull> {
        match self.ready.pop_front() {
            Some(next) => {
                *frame = next;
                Ok(Pull::Ready)
            }
            None if self.eof => Ok(Pull::Drained),
            None => Ok(Pull::Pending),
        }
    }
}

pub struct FakeEncoder {
    time_base: Rational,
    delay: usize,
    held: VecDeque<FakeFrame>,
    ready: VecDeque<FakePacket>,
    flushed: bool,
    sent: usize,
    fail_after: Option<usize>,
    recording: Arc<Mutex<Recording>>,
    _handle: Handle,
}

impl FakeEncoder {
    fn release(&mut self, keep: usize) {
        while self.held.len() > keep {
            if let Some(frame) = self.held.pop_front() {
                self.ready.push_back(FakePacket {
                    stream: 0,
                    pts: frame.pts,
                    dts: frame.pts,
                    data: frame.data,
                    key: false,
                    position: 0,
                });
            }
        }
    }
}

impl Encode for FakeEncoder {
    type Packet = FakePacket;
    type Frame = FakeFrame;

    fn time_base(&self) -> Rational {
        self.time_base
    }

    fn has_delay(&self) -> bool {
        self.delay > 0
    }

    fn send_frame(&mut self, frame: Option<&FakeFrame>) -> AvResult<()> {
        if self.flushed {
            return Err(ffmpeg_next::Error::Eof);
        }
        match frame {
            Some(frame) => {
                if self.fail_after.is_some_and(|limit| self.sent >= limit) {
                    return Err(ffmpeg_next::Error::InvalidData);
                }
                self.sent += 1;
                if frame.key {
                    self.recording.lock().unwrap().typed_frames += 1;
                }
                self.held.push_back(frame.clone());
                self.release(self.delay);
            }
            None => {
                self.flushed = true;
                self.release(0);
                self.recording.lock().unwrap().encoder_flushes += 1;
            }
        }
        Ok(())
    }

    fn receive_packet(&mut self, packet: &mut FakePacket) -> AvResult<Pull> {
        match self.ready.pop_front() {
            Some(next) => {
                *packet = next;
                Ok(Pull::Ready)
            }
            None if self.flushed => Ok(Pull::Drained),
            None => Ok(Pull::Pending),
        }
    }
}

pub struct FakeGraph {
    time_base: Rational,
    decimate: bool,
    seen: usize,
    queue: VecDeque<FakeFrame>,
    eof: bool,
    _handle: Handle,
}

impl FilterGraph for FakeGraph {
    type Frame = FakeFrame;

    fn push(&mut self, frame: Option<&FakeFrame>) -> AvResult<()> {
        match frame {
            Some(frame) => {
                self.seen += 1;
                if !(self.decimate && self.seen % 2 == 0) {
                    self.queue.push_back(frame.clone());
                }
            }
            None => self.eof = true,
        }
        Ok(())
    }

    fn pull(&mut self, frame: &mut FakeFrame) -> AvResult<Pull> {
        match self.queue.pop_front() {
            Some(next) => {
                *frame = next;
                Ok(Pull::Ready)
            }
            None if self.eof => Ok(Pull::Drained),
            None => Ok(Pull::Pending),
        }
    }

    fn output_time_base(&self) -> Rational {
        self.time_base
    }
}

impl Backend for FakeBackend {
    type Packet = FakePacket;
    type Frame = FakeFrame;
    type Input = FakeInput;
    type Output = FakeOutput;
    type Decoder = FakeDecoder;
    type Encoder = FakeEncoder;
    type Graph = FakeGraph;

    fn open_input(&self, path: &str) -> Result<FakeInput> {
        if path.is_empty() {
            return Err(TranscodeError::OpenFailure {
                path: path.to_string(),
                source: ffmpeg_next::Error::InvalidData,
            });
        }
        Ok(FakeInput {
            streams: self.media.streams.clone(),
            packets: self.media.packets.iter().cloned().collect(),
            _handle: Handle::new(&self.live),
        })
    }

    fn open_decoder(&self, _input: &FakeInput, stream: &StreamInfo) -> Result<FakeDecoder> {
        if !stream.has_decoder {
            return Err(TranscodeError::UnsupportedStream {
                index: stream.index,
                reason: format!("no decoder for codec {}", stream.codec),
                code: ffmpeg_next::Error::DecoderNotFound,
            });
        }
        Ok(FakeDecoder {
            time_base: stream.time_base,
            depth: self.reorder_depth,
            held: Vec::new(),
            ready: VecDeque::new(),
            eof: false,
            recording: self.recording.clone(),
            _handle: Handle::new(&self.live),
        })
    }

    fn create_output(&self, path: &str) -> Result<FakeOutput> {
        if path.is_empty() {
            return Err(TranscodeError::OpenFailure {
                path: path.to_string(),
                source: ffmpeg_next::Error::InvalidData,
            });
        }
        Ok(FakeOutput {
            recording: self.recording.clone(),
            muxer_time_base: self.muxer_time_base,
            global_header: self.global_header,
            _handle: Handle::new(&self.live),
        })
    }

    fn add_encoded_stream(
        &self,
        output: &mut FakeOutput,
        decoder: &FakeDecoder,
        stream: &StreamInfo,
    ) -> Result<FakeEncoder> {
        if stream.codec == NO_ENCODER_CODEC {
            return Err(TranscodeError::EncoderNotFound {
                index: stream.index,
                codec: stream.codec.clone(),
            });
        }
        // audio encoders count in samples, like FFmpeg's 1/sample_rate
        let time_base = match stream.kind {
            MediaKind::Audio => Rational::new(1, 48000),
            _ => decoder.time_base,
        };
        let global_header = output.requires_global_header();
        output.record().streams.push(OutputStream {
            index: stream.index,
            copied: false,
            time_base,
            global_header,
        });
        Ok(FakeEncoder {
            time_base,
            delay: self.encoder_delay,
            held: VecDeque::new(),
            ready: VecDeque::new(),
            flushed: false,
            sent: 0,
            fail_after: self.fail_encode_after,
            recording: self.recording.clone(),
            _handle: Handle::new(&self.live),
        })
    }

    fn add_copy_stream(
        &self,
        output: &mut FakeOutput,
        _input: &FakeInput,
        stream: &StreamInfo,
    ) -> Result<()> {
        output.record().streams.push(OutputStream {
            index: stream.index,
            copied: true,
            time_base: stream.time_base,
            global_header: false,
        });
        Ok(())
    }

    fn build_filter(
        &self,
        decoder: &FakeDecoder,
        _encoder: &FakeEncoder,
        stream: &StreamInfo,
        spec: &str,
    ) -> Result<FakeGraph> {
        let decimate = match spec {
            "null" | "anull" => false,
            DECIMATE => true,
            _ => {
                return Err(TranscodeError::FilterGraphInvalid {
                    index: stream.index,
                    spec: spec.to_string(),
                    source: ffmpeg_next::Error::InvalidData,
                });
            }
        };
        Ok(FakeGraph {
            time_base: decoder.time_base,
            decimate,
            seen: 0,
            queue: VecDeque::new(),
            eof: false,
            _handle: Handle::new(&self.live),
        })
    }
}
