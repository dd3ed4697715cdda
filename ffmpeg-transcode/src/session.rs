//! One transcode operation's state: the input, the output and one
//! [`StreamContext`] per input stream, indexed by stream index.
//!
//! Everything is owned by [`MediaSession`]; dropping it releases whatever was
//! opened, on success and failure paths alike.

use ffmpeg_next::Rational;

use crate::{
    backend::{Backend, Demux, MediaFrame, MediaKind, MediaPacket, Mux, StreamInfo},
    config::TranscodeConfig,
    error::{Result, TranscodeError},
};

/// Per-stream counters, reported in the run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub index: usize,
    pub packets_read: u64,
    pub frames_decoded: u64,
    pub frames_filtered: u64,
    pub packets_written: u64,
}

/// Filter graph of a transcoded stream plus its reusable out-buffers.
pub struct FilterContext<B: Backend> {
    pub graph: B::Graph,
    pub filtered: B::Frame,
    pub encoded: B::Packet,
}

/// A stream going through decode, filter and encode.
pub struct TranscodeStream<B: Backend> {
    pub(crate) index: usize,
    pub(crate) kind: MediaKind,
    pub(crate) input_time_base: Rational,
    pub(crate) output_time_base: Rational,
    pub(crate) decoder: B::Decoder,
    pub(crate) decoded: B::Frame,
    pub(crate) encoder: B::Encoder,
    pub(crate) filter: FilterContext<B>,
    pub(crate) stats: StreamStats,
}

/// A stream remuxed without touching its payload.
pub struct CopyStream {
    pub(crate) index: usize,
    pub(crate) input_time_base: Rational,
    pub(crate) output_time_base: Rational,
    pub(crate) stats: StreamStats,
}

pub enum StreamContext<B: Backend> {
    Copy(CopyStream),
    Transcode(TranscodeStream<B>),
}

impl<B: Backend> StreamContext<B> {
    pub fn stats(&self) -> StreamStats {
        match self {
            StreamContext::Copy(stream) => stream.stats,
            StreamContext::Transcode(stream) => stream.stats,
        }
    }
}

pub struct MediaSession<B: Backend> {
    pub input: B::Input,
    pub output: B::Output,
    pub streams: Vec<StreamContext<B>>,
}

/// A stream whose output side exists, before the header is written.
enum Planned<B: Backend> {
    Copy(StreamInfo),
    Transcode {
        info: StreamInfo,
        decoder: B::Decoder,
        encoder: B::Encoder,
        graph: B::Graph,
    },
}

impl<B: Backend> MediaSession<B> {
    /// Opens the input and its decoders, creates the output with one stream per
    /// input stream, builds the filter graphs and writes the output header.
    pub fn open(
        backend: &B,
        input_path: &str,
        output_path: &str,
        config: &TranscodeConfig,
    ) -> Result<Self> {
        let input = backend.open_input(input_path)?;
        let infos = input.streams().to_vec();
        log::info!("input {} opened, {} stream(s)", input_path, infos.len());

        let mut decoders = Vec::with_capacity(infos.len());
        for info in &infos {
            log::info!(
                "stream #{}: {:?} {}, time_base: {}",
                info.index,
                info.kind,
                info.codec,
                info.time_base
            );
            match info.kind {
                MediaKind::Video | MediaKind::Audio => {
                    decoders.push(Some(backend.open_decoder(&input, info)?));
                }
                MediaKind::Unknown => {
                    return Err(TranscodeError::UnsupportedStream {
                        index: info.index,
                        reason: "unknown media type".to_string(),
                        code: ffmpeg_next::Error::InvalidData,
                    });
                }
                _ if !info.has_decoder => {
                    return Err(TranscodeError::UnsupportedStream {
                        index: info.index,
                        reason: format!("no decoder for codec {}", info.codec),
                        code: ffmpeg_next::Error::DecoderNotFound,
                    });
                }
                _ => decoders.push(None),
            }
        }

        let mut output = backend.create_output(output_path)?;
        let mut planned = Vec::with_capacity(infos.len());
        for (info, decoder) in infos.into_iter().zip(decoders) {
            match decoder {
                Some(decoder) => {
                    let encoder = backend.add_encoded_stream(&mut output, &decoder, &info)?;
                    let spec = config.filter_spec(info.kind);
                    let graph = backend.build_filter(&decoder, &encoder, &info, spec)?;
                    planned.push(Planned::Transcode {
                        info,
                        decoder,
                        encoder,
                        graph,
                    });
                }
                None => {
                    backend.add_copy_stream(&mut output, &input, &info)?;
                    planned.push(Planned::Copy(info));
                }
            }
        }

        output.write_header()?;
        log::info!(
            "output {} opened, {} stream(s)",
            output_path,
            output.nb_streams()
        );

        let streams = planned
            .into_iter()
            .map(|planned| Self::stream_context(&output, planned))
            .collect();

        Ok(Self {
            input,
            output,
            streams,
        })
    }

    /// Output stream time bases are final only once the header is written.
    fn stream_context(output: &B::Output, planned: Planned<B>) -> StreamContext<B> {
        match planned {
            Planned::Copy(info) => StreamContext::Copy(CopyStream {
                index: info.index,
                input_time_base: info.time_base,
                output_time_base: output.stream_time_base(info.index),
                stats: StreamStats {
                    index: info.index,
                    ..Default::default()
                },
            }),
            Planned::Transcode {
                info,
                decoder,
                encoder,
                graph,
            } => StreamContext::Transcode(TranscodeStream {
                index: info.index,
                kind: info.kind,
                input_time_base: info.time_base,
                output_time_base: output.stream_time_base(info.index),
                decoder,
                decoded: B::Frame::empty(info.kind),
                encoder,
                filter: FilterContext {
                    graph,
                    filtered: B::Frame::empty(info.kind),
                    encoded: B::Packet::empty(),
                },
                stats: StreamStats {
                    index: info.index,
                    ..Default::default()
                },
            }),
        }
    }

    pub fn stats(&self) -> Vec<StreamStats> {
        self.streams.iter().map(StreamContext::stats).collect()
    }
}
