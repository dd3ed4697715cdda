use std::ffi::CStr;

use ffmpeg_next::{Rational, ffi};

use crate::{
    backend::{AvResult, Decode, MediaKind, Pull},
    error::{Result, Stage, TranscodeError},
    frame::RawFrame,
    packet::RawPacket,
    stream::AvStream,
};

enum DecoderType {
    Video(ffmpeg_next::codec::decoder::Video),
    Audio(ffmpeg_next::codec::decoder::Audio),
}

impl DecoderType {
    fn opened(&mut self) -> &mut ffmpeg_next::codec::decoder::Opened {
        match self {
            DecoderType::Video(decoder) => decoder,
            DecoderType::Audio(decoder) => decoder,
        }
    }
}

pub struct Decoder {
    index: usize,
    inner: DecoderType,
    decoder_time_base: Rational,
}

unsafe impl Send for Decoder {}

impl Decoder {
    /// Opens a decoder for a video or audio stream, pre-configured from the
    /// stream's codec parameters. Video decoders also get the guessed frame rate.
    pub fn open(stream: &AvStream) -> Result<Self> {
        let index = stream.index();
        let kind = stream.kind();
        if !kind.is_transcoded() {
            return Err(TranscodeError::UnsupportedStream {
                index,
                reason: format!("{:?} streams are not decoded", kind),
                code: ffmpeg_next::Error::InvalidData,
            });
        }

        let mut decoder_ctx = ffmpeg_next::codec::Context::new();
        decoder_ctx
            .set_parameters(stream.parameters().clone())
            .map_err(TranscodeError::codec(Stage::DecoderOpen, index))?;
        unsafe {
            let ptr = decoder_ctx.as_mut_ptr();
            (*ptr).time_base = stream.time_base().into();
            (*ptr).pkt_timebase = stream.time_base().into();
            if kind == MediaKind::Video {
                (*ptr).framerate = stream.rate().into();
            }
        }

        let open_err = |source: ffmpeg_next::Error| match source {
            ffmpeg_next::Error::DecoderNotFound => TranscodeError::UnsupportedStream {
                index,
                reason: format!("no decoder for codec {}", stream.codec_name()),
                code: source,
            },
            source => TranscodeError::Codec {
                stage: Stage::DecoderOpen,
                index,
                source,
            },
        };

        let inner = if kind == MediaKind::Video {
            DecoderType::Video(decoder_ctx.decoder().video().map_err(open_err)?)
        } else {
            DecoderType::Audio(decoder_ctx.decoder().audio().map_err(open_err)?)
        };

        Ok(Self {
            index,
            inner,
            decoder_time_base: stream.time_base(),
        })
    }

    pub fn stream_index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> MediaKind {
        match self.inner {
            DecoderType::Video(_) => MediaKind::Video,
            DecoderType::Audio(_) => MediaKind::Audio,
        }
    }

    pub fn codec_id(&self) -> ffmpeg_next::codec::Id {
        match &self.inner {
            DecoderType::Video(decoder) => decoder.id(),
            DecoderType::Audio(decoder) => decoder.id(),
        }
    }

    pub fn video(&self) -> Option<&ffmpeg_next::codec::decoder::Video> {
        match &self.inner {
            DecoderType::Video(decoder) => Some(decoder),
            DecoderType::Audio(_) => None,
        }
    }

    pub fn audio(&self) -> Option<&ffmpeg_next::codec::decoder::Audio> {
        match &self.inner {
            DecoderType::Audio(decoder) => Some(decoder),
            DecoderType::Video(_) => None,
        }
    }

    /// Frame rate handed to the decoder at open time.
    pub fn frame_rate(&self) -> Rational {
        let ptr = match &self.inner {
            DecoderType::Video(decoder) => unsafe { decoder.as_ptr() },
            DecoderType::Audio(decoder) => unsafe { decoder.as_ptr() },
        };
        unsafe { (*ptr).framerate.into() }
    }

    /// The decoder's channel layout, or the default layout for its channel
    /// count when the stream did not declare one.
    pub fn channel_layout(&self) -> Option<ChLayout> {
        let decoder = self.audio()?;
        unsafe {
            let ptr = decoder.as_ptr();
            let mut layout = ChLayout::empty();
            if (*ptr).ch_layout.order == ffi::AVChannelOrder::AV_CHANNEL_ORDER_UNSPEC {
                ffi::av_channel_layout_default(&mut layout.0, (*ptr).ch_layout.nb_channels);
            } else if ffi::av_channel_layout_copy(&mut layout.0, &(*ptr).ch_layout) < 0 {
                return None;
            }
            Some(layout)
        }
    }
}

impl Decode for Decoder {
    type Packet = RawPacket;
    type Frame = RawFrame;

    fn time_base(&self) -> Rational {
        self.decoder_time_base
    }

    fn send_packet(&mut self, packet: &RawPacket) -> AvResult<()> {
        self.inner.opened().send_packet(packet.packet())
    }

    fn send_eof(&mut self) -> AvResult<()> {
        self.inner.opened().send_eof()
    }

    fn receive_frame(&mut self, frame: &mut RawFrame) -> AvResult<Pull> {
        Pull::from_av(self.inner.opened().receive_frame(frame.as_frame_mut()))
    }
}

/// Owned `AVChannelLayout`.
pub struct ChLayout(ffi::AVChannelLayout);

unsafe impl Send for ChLayout {}

impl ChLayout {
    fn empty() -> Self {
        Self(unsafe { std::mem::zeroed() })
    }

    pub fn as_ptr(&self) -> *const ffi::AVChannelLayout {
        &self.0
    }

    /// Textual form accepted by `abuffer`/`abuffersink`, e.g. "stereo".
    pub fn describe(&self) -> String {
        let mut buf = [0 as std::os::raw::c_char; 128];
        unsafe {
            if ffi::av_channel_layout_describe(&self.0, buf.as_mut_ptr(), buf.len()) < 0 {
                return format!("{}c", self.0.nb_channels);
            }
            CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
        }
    }
}

impl Drop for ChLayout {
    fn drop(&mut self) {
        unsafe { ffi::av_channel_layout_uninit(&mut self.0) }
    }
}
