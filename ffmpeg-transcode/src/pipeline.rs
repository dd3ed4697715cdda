//! Per-stream packet handling: decode, filter and encode for transcoded
//! streams, timestamp rescaling for copied ones, and the end-of-input flush.

use ffmpeg_next::Rescale;

use crate::{
    backend::{Backend, Decode, Encode, FilterGraph, MediaFrame, MediaPacket, Mux, Pull},
    error::{Result, Stage, TranscodeError},
    session::{CopyStream, StreamContext, TranscodeStream},
};

/// Where finished packets go: the muxer itself, or a handle shared between workers.
pub trait PacketWriter<P> {
    /// `packet` already carries its output stream index and output time base.
    fn write_packet(&mut self, packet: &mut P) -> Result<()>;
}

impl<M: Mux> PacketWriter<M::Packet> for M {
    fn write_packet(&mut self, packet: &mut M::Packet) -> Result<()> {
        self.write_interleaved(packet)
    }
}

impl<B: Backend> StreamContext<B> {
    pub fn process_packet<W>(&mut self, packet: &mut B::Packet, out: &mut W) -> Result<()>
    where
        W: PacketWriter<B::Packet>,
    {
        match self {
            StreamContext::Copy(stream) => stream.process_packet(packet, out),
            StreamContext::Transcode(stream) => stream.process_packet(packet, out),
        }
    }

    /// Copy streams hold nothing back, so flushing them is a no-op.
    pub fn flush<W>(&mut self, out: &mut W) -> Result<()>
    where
        W: PacketWriter<B::Packet>,
    {
        match self {
            StreamContext::Copy(_) => Ok(()),
            StreamContext::Transcode(stream) => stream.flush(out),
        }
    }
}

impl CopyStream {
    pub fn process_packet<P, W>(&mut self, packet: &mut P, out: &mut W) -> Result<()>
    where
        P: MediaPacket,
        W: PacketWriter<P>,
    {
        self.stats.packets_read += 1;
        packet.rescale_ts(self.input_time_base, self.output_time_base);
        packet.set_stream_index(self.index);
        out.write_packet(packet)?;
        self.stats.packets_written += 1;
        Ok(())
    }
}

impl<B: Backend> TranscodeStream<B> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn process_packet<W>(&mut self, packet: &mut B::Packet, out: &mut W) -> Result<()>
    where
        W: PacketWriter<B::Packet>,
    {
        self.stats.packets_read += 1;
        packet.rescale_ts(self.input_time_base, self.decoder.time_base());
        self.decoder
            .send_packet(packet)
            .map_err(TranscodeError::codec(Stage::Decode, self.index))?;
        self.drain_decoder(out)
    }

    /// Drains the decoder, then the filter graph, then the encoder. The encoder
    /// is only flushed when it buffers frames.
    pub fn flush<W>(&mut self, out: &mut W) -> Result<()>
    where
        W: PacketWriter<B::Packet>,
    {
        self.decoder
            .send_eof()
            .map_err(TranscodeError::codec(Stage::Decode, self.index))?;
        self.drain_decoder(out)?;

        self.filter
            .graph
            .push(None)
            .map_err(TranscodeError::codec(Stage::Filter, self.index))?;
        self.drain_filter(out)?;

        if self.encoder.has_delay() {
            self.encoder
                .send_frame(None)
                .map_err(TranscodeError::codec(Stage::Encode, self.index))?;
            self.drain_encoder(out)?;
        }

        log::debug!(
            "stream #{} ({:?}) flushed: {:?}",
            self.index,
            self.kind,
            self.stats
        );
        Ok(())
    }

    fn drain_decoder<W>(&mut self, out: &mut W) -> Result<()>
    where
        W: PacketWriter<B::Packet>,
    {
        loop {
            let pull = self
                .decoder
                .receive_frame(&mut self.decoded)
                .map_err(TranscodeError::codec(Stage::Decode, self.index))?;
            if !pull.is_ready() {
                return Ok(());
            }
            self.stats.frames_decoded += 1;

            let timestamp = self.decoded.best_effort_timestamp();
            self.decoded.set_pts(timestamp);
            self.filter
                .graph
                .push(Some(&self.decoded))
                .map_err(TranscodeError::codec(Stage::Filter, self.index))?;
            self.drain_filter(out)?;
        }
    }

    fn drain_filter<W>(&mut self, out: &mut W) -> Result<()>
    where
        W: PacketWriter<B::Packet>,
    {
        let filter_time_base = self.filter.graph.output_time_base();
        let encoder_time_base = self.encoder.time_base();
        loop {
            let pull = self
                .filter
                .graph
                .pull(&mut self.filter.filtered)
                .map_err(TranscodeError::codec(Stage::Filter, self.index))?;
            if !pull.is_ready() {
                return Ok(());
            }
            self.stats.frames_filtered += 1;

            let frame = &mut self.filter.filtered;
            frame.clear_picture_type();
            if filter_time_base != encoder_time_base {
                if let Some(pts) = frame.pts() {
                    frame.set_pts(Some(pts.rescale(filter_time_base, encoder_time_base)));
                }
            }
            self.encoder
                .send_frame(Some(&self.filter.filtered))
                .map_err(TranscodeError::codec(Stage::Encode, self.index))?;
            self.drain_encoder(out)?;
        }
    }

    fn drain_encoder<W>(&mut self, out: &mut W) -> Result<()>
    where
        W: PacketWriter<B::Packet>,
    {
        let encoder_time_base = self.encoder.time_base();
        loop {
            match self
                .encoder
                .receive_packet(&mut self.filter.encoded)
                .map_err(TranscodeError::codec(Stage::Encode, self.index))?
            {
                Pull::Ready => {}
                Pull::Pending | Pull::Drained => return Ok(()),
            }

            let packet = &mut self.filter.encoded;
            packet.set_stream_index(self.index);
            packet.rescale_ts(encoder_time_base, self.output_time_base);
            out.write_packet(packet)?;
            self.stats.packets_written += 1;
        }
    }
}
