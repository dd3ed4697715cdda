use std::path::Path;

use crate::{
    backend::{Demux, StreamInfo},
    error::{Result, TranscodeError},
    packet::RawPacket,
    stream::AvStream,
};

pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    streams: Vec<AvStream>,
    infos: Vec<StreamInfo>,
}

unsafe impl Send for AvInput {}

impl AvInput {
    /// Opens the container and snapshots every stream.
    pub fn open(url: &str) -> Result<Self> {
        let mut input = ffmpeg_next::format::input(Path::new(url)).map_err(|source| {
            TranscodeError::OpenFailure {
                path: url.to_string(),
                source,
            }
        })?;

        let mut streams = Vec::with_capacity(input.nb_streams() as usize);
        for index in 0..input.nb_streams() as usize {
            let stream = AvStream::snapshot(&mut input, index).ok_or(TranscodeError::OpenFailure {
                path: url.to_string(),
                source: ffmpeg_next::Error::StreamNotFound,
            })?;
            streams.push(stream);
        }
        let infos = streams.iter().map(AvStream::info).collect();

        ffmpeg_next::format::context::input::dump(&input, 0, Some(url));

        Ok(Self {
            inner: input,
            streams,
            infos,
        })
    }

    pub fn stream(&self, index: usize) -> Option<&AvStream> {
        self.streams.get(index)
    }
}

impl Demux for AvInput {
    type Packet = RawPacket;

    fn streams(&self) -> &[StreamInfo] {
        &self.infos
    }

    fn read_packet(&mut self) -> Result<Option<RawPacket>> {
        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.inner) {
                Ok(()) => {
                    let index = packet.stream();
                    // NOHEADER containers (mpegts) may add streams after open
                    match self.streams.get(index) {
                        Some(stream) => {
                            return Ok(Some(RawPacket::from((packet, stream.time_base()))));
                        }
                        None => log::warn!("dropping packet of unknown stream #{}", index),
                    }
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(source) => return Err(TranscodeError::Read { source }),
            }
        }
    }
}
