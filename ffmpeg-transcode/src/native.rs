//! Binds the FFmpeg wrappers to the [`Backend`] traits.

use crate::{
    backend::{Backend, Mux, StreamInfo},
    decoder::Decoder,
    encoder::Encoder,
    error::{Result, TranscodeError},
    filter::AvFilter,
    frame::RawFrame,
    input::AvInput,
    output::AvOutput,
    packet::RawPacket,
    stream::AvStream,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct Ffmpeg;

impl Ffmpeg {
    fn stream<'a>(input: &'a AvInput, info: &StreamInfo) -> Result<&'a AvStream> {
        input
            .stream(info.index)
            .ok_or(TranscodeError::UnsupportedStream {
                index: info.index,
                reason: "stream not present in input".to_string(),
                code: ffmpeg_next::Error::StreamNotFound,
            })
    }
}

impl Backend for Ffmpeg {
    type Packet = RawPacket;
    type Frame = RawFrame;
    type Input = AvInput;
    type Output = AvOutput;
    type Decoder = Decoder;
    type Encoder = Encoder;
    type Graph = AvFilter;

    fn open_input(&self, path: &str) -> Result<AvInput> {
        AvInput::open(path)
    }

    fn open_decoder(&self, input: &AvInput, stream: &StreamInfo) -> Result<Decoder> {
        Decoder::open(Self::stream(input, stream)?)
    }

    fn create_output(&self, path: &str) -> Result<AvOutput> {
        AvOutput::create(path)
    }

    fn add_encoded_stream(
        &self,
        output: &mut AvOutput,
        decoder: &Decoder,
        _stream: &StreamInfo,
    ) -> Result<Encoder> {
        let encoder = Encoder::for_decoder(decoder, output.requires_global_header())?;
        output.add_encoded_stream(&encoder)?;
        Ok(encoder)
    }

    fn add_copy_stream(
        &self,
        output: &mut AvOutput,
        input: &AvInput,
        stream: &StreamInfo,
    ) -> Result<()> {
        output.add_copy_stream(Self::stream(input, stream)?)?;
        Ok(())
    }

    fn build_filter(
        &self,
        decoder: &Decoder,
        encoder: &Encoder,
        _stream: &StreamInfo,
        spec: &str,
    ) -> Result<AvFilter> {
        AvFilter::build(decoder, encoder, spec)
    }
}
