use ffmpeg_next::{Rational, codec::Parameters};

use crate::backend::{MediaKind, StreamInfo};

unsafe impl Send for AvStream {}
unsafe impl Sync for AvStream {}

/// Owned snapshot of one demuxed stream: parameters, time base and guessed rate.
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
}

impl AvStream {
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn time_base(&self) -> Rational {
        self.time_base
    }
    pub fn rate(&self) -> Rational {
        self.rate
    }

    pub fn kind(&self) -> MediaKind {
        self.parameters.medium().into()
    }

    pub fn codec_name(&self) -> String {
        let id = self.parameters.id();
        if id == ffmpeg_next::codec::Id::None {
            return "none".to_string();
        }
        id.name().to_string()
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            index: self.index,
            kind: self.kind(),
            codec: self.codec_name(),
            time_base: self.time_base,
            has_decoder: ffmpeg_next::decoder::find(self.parameters.id()).is_some(),
        }
    }

    /// Snapshots `stream`, guessing its frame rate the way the demuxer would
    /// (`av_guess_frame_rate`) for video streams.
    pub fn snapshot(ctx: &mut ffmpeg_next::format::context::Input, index: usize) -> Option<Self> {
        let (time_base, parameters, is_video) = {
            let stream = ctx.stream(index)?;
            let parameters = stream.parameters();
            let is_video = parameters.medium() == ffmpeg_next::media::Type::Video;
            (stream.time_base(), parameters, is_video)
        };
        let rate = if is_video {
            unsafe {
                let fmt = ctx.as_mut_ptr();
                let st = *(*fmt).streams.add(index);
                ffmpeg_next::ffi::av_guess_frame_rate(fmt, st, std::ptr::null_mut()).into()
            }
        } else {
            Rational::new(0, 1)
        };
        Some(Self {
            index,
            parameters,
            time_base,
            rate,
        })
    }
}

impl Clone for AvStream {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            parameters: self.parameters.clone(),
            time_base: self.time_base,
            rate: self.rate,
        }
    }
}
