use ffmpeg_next::{Rational, codec::capabilities::Capabilities, ffi};

use crate::{
    backend::{AvResult, Encode, Pull},
    decoder::Decoder,
    error::{Result, Stage, TranscodeError},
    frame::RawFrame,
    packet::RawPacket,
};

enum EncoderType {
    Video(ffmpeg_next::codec::encoder::Video),
    Audio(ffmpeg_next::codec::encoder::Audio),
}

impl EncoderType {
    fn opened(&mut self) -> &mut ffmpeg_next::codec::encoder::Encoder {
        match self {
            EncoderType::Video(encoder) => encoder,
            EncoderType::Audio(encoder) => encoder,
        }
    }

    fn context(&self) -> &ffmpeg_next::codec::Context {
        match self {
            EncoderType::Video(encoder) => encoder,
            EncoderType::Audio(encoder) => encoder,
        }
    }
}

pub struct Encoder {
    inner: EncoderType,
    encoder_time_base: Rational,
    delay: bool,
}

unsafe impl Send for Encoder {}

impl Encoder {
    /// Opens an encoder of the same codec as `decoder`, carrying over picture
    /// size and aspect (video) or sample rate and channel layout (audio). The
    /// first format the encoder advertises is used.
    pub fn for_decoder(decoder: &Decoder, global_header: bool) -> Result<Self> {
        let index = decoder.stream_index();
        let codec_id = decoder.codec_id();
        let codec =
            ffmpeg_next::encoder::find(codec_id).ok_or_else(|| TranscodeError::EncoderNotFound {
                index,
                codec: codec_id.name().to_string(),
            })?;
        let delay = codec.capabilities().contains(Capabilities::DELAY);
        let open_err = TranscodeError::codec(Stage::EncoderOpen, index);
        let ctx = ffmpeg_next::codec::Context::new_with_codec(codec);

        let inner = match (decoder.video(), decoder.audio()) {
            (Some(source), _) => {
                let mut encoder = ctx.encoder().video().map_err(open_err)?;
                encoder.set_width(source.width());
                encoder.set_height(source.height());
                encoder.set_aspect_ratio(source.aspect_ratio());
                let format = codec
                    .video()
                    .ok()
                    .and_then(|video| video.formats())
                    .and_then(|mut formats| formats.next())
                    .unwrap_or(source.format());
                encoder.set_format(format);
                encoder.set_time_base(decoder.time_base());
                let rate = decoder.frame_rate();
                if rate.numerator() > 0 {
                    encoder.set_frame_rate(Some(rate));
                }
                if global_header {
                    encoder.set_flags(ffmpeg_next::codec::flag::Flags::GLOBAL_HEADER);
                }
                EncoderType::Video(
                    encoder
                        .open_as(codec)
                        .map_err(TranscodeError::codec(Stage::EncoderOpen, index))?,
                )
            }
            (None, Some(source)) => {
                let mut encoder = ctx.encoder().audio().map_err(open_err)?;
                let rate = source.rate() as i32;
                encoder.set_rate(rate);
                if let Some(layout) = decoder.channel_layout() {
                    unsafe {
                        let ptr = encoder.as_mut_ptr();
                        ffi::av_channel_layout_uninit(&mut (*ptr).ch_layout);
                        ffi::av_channel_layout_copy(&mut (*ptr).ch_layout, layout.as_ptr());
                    }
                }
                let format = codec
                    .audio()
                    .ok()
                    .and_then(|audio| audio.formats())
                    .and_then(|mut formats| formats.next())
                    .unwrap_or(source.format());
                encoder.set_format(format);
                encoder.set_time_base(Rational::new(1, rate));
                if global_header {
                    encoder.set_flags(ffmpeg_next::codec::flag::Flags::GLOBAL_HEADER);
                }
                EncoderType::Audio(
                    encoder
                        .open_as(codec)
                        .map_err(TranscodeError::codec(Stage::EncoderOpen, index))?,
                )
            }
            (None, None) => {
                return Err(TranscodeError::UnsupportedStream {
                    index,
                    reason: "only video and audio streams are re-encoded".to_string(),
                    code: ffmpeg_next::Error::InvalidData,
                });
            }
        };

        let encoder_time_base: Rational = unsafe { (*inner.context().as_ptr()).time_base.into() };
        log::info!(
            "stream #{} encoder {} opened, time_base: {}, delay: {}",
            index,
            codec.name(),
            encoder_time_base,
            delay
        );

        Ok(Self {
            inner,
            encoder_time_base,
            delay,
        })
    }

    pub fn context(&self) -> &ffmpeg_next::codec::Context {
        self.inner.context()
    }

    pub fn video(&self) -> Option<&ffmpeg_next::codec::encoder::Video> {
        match &self.inner {
            EncoderType::Video(encoder) => Some(encoder),
            EncoderType::Audio(_) => None,
        }
    }

    pub fn audio(&self) -> Option<&ffmpeg_next::codec::encoder::Audio> {
        match &self.inner {
            EncoderType::Audio(encoder) => Some(encoder),
            EncoderType::Video(_) => None,
        }
    }
}

impl Encode for Encoder {
    type Packet = RawPacket;
    type Frame = RawFrame;

    fn time_base(&self) -> Rational {
        self.encoder_time_base
    }

    fn has_delay(&self) -> bool {
        self.delay
    }

    fn send_frame(&mut self, frame: Option<&RawFrame>) -> AvResult<()> {
        match frame {
            Some(frame) => self.inner.opened().send_frame(frame.as_frame()),
            None => self.inner.opened().send_eof(),
        }
    }

    fn receive_packet(&mut self, packet: &mut RawPacket) -> AvResult<Pull> {
        let pull = Pull::from_av(self.inner.opened().receive_packet(packet.get_mut()))?;
        if pull.is_ready() {
            packet.set_time_base(self.encoder_time_base);
        }
        Ok(pull)
    }
}
