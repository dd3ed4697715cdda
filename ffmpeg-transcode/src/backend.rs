//! Capability seams between the pipeline and the codec/container library.
//!
//! The pipeline only talks to these traits. [`crate::native::Ffmpeg`] binds them to
//! FFmpeg; tests bind them to an in-memory container.

use ffmpeg_next::Rational;

use crate::error::Result;

/// Raw result of a codec call, before it is tied to a stream and stage.
pub type AvResult<T> = std::result::Result<T, ffmpeg_next::Error>;

/// Outcome of pulling one unit out of a decoder, encoder or filter graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// The out-buffer was filled.
    Ready,
    /// Nothing more until the next input unit is pushed.
    Pending,
    /// Fully flushed; nothing will ever come out again.
    Drained,
}

impl Pull {
    pub fn is_ready(self) -> bool {
        self == Pull::Ready
    }

    /// Maps the FFmpeg receive conventions (`EAGAIN`, `EOF`) onto [`Pull`].
    pub fn from_av(result: AvResult<()>) -> AvResult<Self> {
        match result {
            Ok(()) => Ok(Pull::Ready),
            Err(ffmpeg_next::Error::Eof) => Ok(Pull::Drained),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(Pull::Pending)
            }
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Unknown,
}

impl MediaKind {
    /// Video and audio are decoded, filtered and re-encoded; everything else is remuxed.
    pub fn is_transcoded(self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Audio)
    }
}

impl From<ffmpeg_next::media::Type> for MediaKind {
    fn from(value: ffmpeg_next::media::Type) -> Self {
        use ffmpeg_next::media::Type;
        match value {
            Type::Video => MediaKind::Video,
            Type::Audio => MediaKind::Audio,
            Type::Subtitle => MediaKind::Subtitle,
            Type::Data => MediaKind::Data,
            Type::Attachment => MediaKind::Attachment,
            Type::Unknown => MediaKind::Unknown,
        }
    }
}

/// Description of one input stream, taken when the input is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: MediaKind,
    pub codec: String,
    pub time_base: Rational,
    /// A decoder is registered for `codec`.
    pub has_decoder: bool,
}

pub trait MediaPacket: Sized {
    fn empty() -> Self;
    fn stream_index(&self) -> usize;
    fn set_stream_index(&mut self, index: usize);
    fn pts(&self) -> Option<i64>;
    fn dts(&self) -> Option<i64>;
    fn rescale_ts(&mut self, from: Rational, to: Rational);
}

pub trait MediaFrame: Sized {
    fn empty(kind: MediaKind) -> Self;
    fn pts(&self) -> Option<i64>;
    fn set_pts(&mut self, pts: Option<i64>);
    fn best_effort_timestamp(&self) -> Option<i64>;
    /// Drops the source GOP decision (`pict_type`) so the encoder picks its own.
    fn clear_picture_type(&mut self);
}

pub trait Decode {
    type Packet: MediaPacket;
    type Frame: MediaFrame;

    fn time_base(&self) -> Rational;
    fn send_packet(&mut self, packet: &Self::Packet) -> AvResult<()>;
    fn send_eof(&mut self) -> AvResult<()>;
    fn receive_frame(&mut self, frame: &mut Self::Frame) -> AvResult<Pull>;
}

pub trait Encode {
    type Packet: MediaPacket;
    type Frame: MediaFrame;

    fn time_base(&self) -> Rational;
    /// Whether the codec buffers frames internally and must be flushed at the end.
    fn has_delay(&self) -> bool;
    /// `None` signals end of input.
    fn send_frame(&mut self, frame: Option<&Self::Frame>) -> AvResult<()>;
    fn receive_packet(&mut self, packet: &mut Self::Packet) -> AvResult<Pull>;
}

pub trait FilterGraph {
    type Frame: MediaFrame;

    /// `None` signals end of input.
    fn push(&mut self, frame: Option<&Self::Frame>) -> AvResult<()>;
    fn pull(&mut self, frame: &mut Self::Frame) -> AvResult<Pull>;
    /// Time base of frames leaving the sink.
    fn output_time_base(&self) -> Rational;
}

pub trait Demux {
    type Packet: MediaPacket;

    fn streams(&self) -> &[StreamInfo];
    /// `Ok(None)` once the container is exhausted. Packets of streams missing
    /// from [`Demux::streams`] are skipped.
    fn read_packet(&mut self) -> Result<Option<Self::Packet>>;
}

pub trait Mux {
    type Packet: MediaPacket;

    fn requires_global_header(&self) -> bool;
    fn nb_streams(&self) -> usize;
    fn write_header(&mut self) -> Result<()>;
    /// Valid after the header is written; muxers may adjust time bases there.
    fn stream_time_base(&self, index: usize) -> Rational;
    fn write_interleaved(&mut self, packet: &mut Self::Packet) -> Result<()>;
    fn write_trailer(&mut self) -> Result<()>;
}

/// Factory for every codec/container object one transcode needs.
pub trait Backend {
    type Packet: MediaPacket;
    type Frame: MediaFrame;
    type Input: Demux<Packet = Self::Packet>;
    type Output: Mux<Packet = Self::Packet>;
    type Decoder: Decode<Packet = Self::Packet, Frame = Self::Frame>;
    type Encoder: Encode<Packet = Self::Packet, Frame = Self::Frame>;
    type Graph: FilterGraph<Frame = Self::Frame>;

    fn open_input(&self, path: &str) -> Result<Self::Input>;

    /// Opens a decoder for a video or audio stream of `input`.
    fn open_decoder(&self, input: &Self::Input, stream: &StreamInfo) -> Result<Self::Decoder>;

    fn create_output(&self, path: &str) -> Result<Self::Output>;

    /// Opens an encoder of the decoder's codec family and adds its output stream.
    fn add_encoded_stream(
        &self,
        output: &mut Self::Output,
        decoder: &Self::Decoder,
        stream: &StreamInfo,
    ) -> Result<Self::Encoder>;

    /// Adds an output stream whose codec parameters are copied from `input`.
    fn add_copy_stream(
        &self,
        output: &mut Self::Output,
        input: &Self::Input,
        stream: &StreamInfo,
    ) -> Result<()>;

    fn build_filter(
        &self,
        decoder: &Self::Decoder,
        encoder: &Self::Encoder,
        stream: &StreamInfo,
        spec: &str,
    ) -> Result<Self::Graph>;
}
