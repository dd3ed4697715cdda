//! Per-stream filter graph: one `buffer`/`abuffer` source, the user chain,
//! one `buffersink`/`abuffersink` locked to what the encoder accepts.

use std::ffi::CString;

use ffmpeg_next::{Rational, ffi, filter};

use crate::{
    backend::{AvResult, Decode, FilterGraph, MediaKind, Pull},
    decoder::Decoder,
    encoder::Encoder,
    error::{Result, TranscodeError},
    frame::RawFrame,
};

/// Identity chain for video streams.
pub const VIDEO_PASSTHROUGH: &str = "null";
/// Identity chain for audio streams.
pub const AUDIO_PASSTHROUGH: &str = "anull";

const SOURCE: &str = "in";
const SINK: &str = "out";

pub struct AvFilter {
    graph: filter::Graph,
    output_time_base: Rational,
}

unsafe impl Send for AvFilter {}

impl AvFilter {
    pub fn build(decoder: &Decoder, encoder: &Encoder, spec: &str) -> Result<Self> {
        let index = decoder.stream_index();
        let invalid = |source: ffmpeg_next::Error| TranscodeError::FilterGraphInvalid {
            index,
            spec: spec.to_string(),
            source,
        };

        let mut graph = filter::Graph::new();
        match decoder.kind() {
            MediaKind::Video => {
                let (source, sink) = match (decoder.video(), encoder.video()) {
                    (Some(source), Some(sink)) => (source, sink),
                    _ => return Err(invalid(ffmpeg_next::Error::InvalidData)),
                };
                let time_base = decoder.time_base();
                let aspect = source.aspect_ratio();
                let args = format!(
                    "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
                    source.width(),
                    source.height(),
                    ffi::AVPixelFormat::from(source.format()) as i32,
                    time_base.numerator(),
                    time_base.denominator(),
                    aspect.numerator(),
                    aspect.denominator().max(1),
                );
                graph
                    .add(&lookup("buffer").map_err(invalid)?, SOURCE, &args)
                    .map_err(invalid)?;
                graph
                    .add(&lookup("buffersink").map_err(invalid)?, SINK, "")
                    .map_err(invalid)?;
                let mut out = graph
                    .get(SINK)
                    .ok_or(invalid(ffmpeg_next::Error::FilterNotFound))?;
                out.set_pixel_format(sink.format());
            }
            MediaKind::Audio => {
                let (source, sink) = match (decoder.audio(), encoder.audio()) {
                    (Some(source), Some(sink)) => (source, sink),
                    _ => return Err(invalid(ffmpeg_next::Error::InvalidData)),
                };
                let layout = decoder
                    .channel_layout()
                    .ok_or(invalid(ffmpeg_next::Error::InvalidData))?
                    .describe();
                let time_base = decoder.time_base();
                let args = format!(
                    "time_base={}/{}:sample_rate={}:sample_fmt={}:channel_layout={}",
                    time_base.numerator(),
                    time_base.denominator(),
                    source.rate(),
                    source.format().name(),
                    layout,
                );
                graph
                    .add(&lookup("abuffer").map_err(invalid)?, SOURCE, &args)
                    .map_err(invalid)?;
                graph
                    .add(&lookup("abuffersink").map_err(invalid)?, SINK, "")
                    .map_err(invalid)?;
                let mut out = graph
                    .get(SINK)
                    .ok_or(invalid(ffmpeg_next::Error::FilterNotFound))?;
                out.set_sample_format(sink.format());
                out.set_sample_rate(sink.rate());
                let encoder_layout = encoder_layout(encoder);
                set_string_option(&mut out, "ch_layouts", &encoder_layout).map_err(invalid)?;
            }
            _ => return Err(invalid(ffmpeg_next::Error::InvalidData)),
        }

        graph
            .output(SOURCE, 0)
            .and_then(|parser| parser.input(SINK, 0))
            .and_then(|parser| parser.parse(spec))
            .map_err(invalid)?;
        graph.validate().map_err(invalid)?;

        let output_time_base = {
            let sink = graph
                .get(SINK)
                .ok_or(invalid(ffmpeg_next::Error::FilterNotFound))?;
            unsafe { ffi::av_buffersink_get_time_base(sink.as_ptr()).into() }
        };
        log::debug!(
            "stream #{} filter graph {:?} configured, output time_base: {}",
            index,
            spec,
            output_time_base
        );

        Ok(Self {
            graph,
            output_time_base,
        })
    }
}

impl FilterGraph for AvFilter {
    type Frame = RawFrame;

    fn push(&mut self, frame: Option<&RawFrame>) -> AvResult<()> {
        let mut ctx = self.graph.get(SOURCE).ok_or(ffmpeg_next::Error::FilterNotFound)?;
        let mut source = ctx.source();
        match frame {
            Some(frame) => source.add(frame.as_frame()),
            None => source.flush(),
        }
    }

    fn pull(&mut self, frame: &mut RawFrame) -> AvResult<Pull> {
        let mut ctx = self.graph.get(SINK).ok_or(ffmpeg_next::Error::FilterNotFound)?;
        let mut sink = ctx.sink();
        Pull::from_av(sink.frame(frame.as_frame_mut()))
    }

    fn output_time_base(&self) -> Rational {
        self.output_time_base
    }
}

fn lookup(name: &str) -> AvResult<filter::Filter> {
    filter::find(name).ok_or(ffmpeg_next::Error::FilterNotFound)
}

fn encoder_layout(encoder: &Encoder) -> String {
    let mut buf = [0 as std::os::raw::c_char; 128];
    unsafe {
        let ptr = encoder.context().as_ptr();
        if ffi::av_channel_layout_describe(&(*ptr).ch_layout, buf.as_mut_ptr(), buf.len()) < 0 {
            return String::new();
        }
        std::ffi::CStr::from_ptr(buf.as_ptr())
            .to_string_lossy()
            .into_owned()
    }
}

fn set_string_option(ctx: &mut filter::Context, name: &str, value: &str) -> AvResult<()> {
    let name = CString::new(name).map_err(|_| ffmpeg_next::Error::InvalidData)?;
    let value = CString::new(value).map_err(|_| ffmpeg_next::Error::InvalidData)?;
    let ret = unsafe {
        ffi::av_opt_set(
            ctx.as_mut_ptr() as *mut std::ffi::c_void,
            name.as_ptr(),
            value.as_ptr(),
            ffi::AV_OPT_SEARCH_CHILDREN as i32,
        )
    };
    if ret < 0 {
        Err(ffmpeg_next::Error::from(ret))
    } else {
        Ok(())
    }
}
