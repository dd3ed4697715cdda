use bytes::Bytes;
use ffmpeg_next::Rational;

use crate::backend::MediaPacket;

/// Message on a per-stream worker queue.
pub enum PacketCmd<P> {
    Data(P),
    Eof,
}

/// FFmpeg packet tagged with the time base its timestamps are expressed in.
#[derive(Clone)]
pub struct RawPacket {
    packet: ffmpeg_next::codec::packet::Packet,
    time_base: Rational,
}

unsafe impl Send for RawPacket {}

impl RawPacket {
    pub fn size(&self) -> usize {
        self.packet.size()
    }

    pub fn data(&self) -> Bytes {
        self.packet
            .data()
            .map(Bytes::copy_from_slice)
            .unwrap_or_default()
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn set_time_base(&mut self, time_base: Rational) {
        self.time_base = time_base;
    }

    pub fn get_mut(&mut self) -> &mut ffmpeg_next::codec::packet::Packet {
        &mut self.packet
    }

    pub fn packet(&self) -> &ffmpeg_next::codec::packet::Packet {
        &self.packet
    }
}

impl MediaPacket for RawPacket {
    fn empty() -> Self {
        Self {
            packet: ffmpeg_next::codec::packet::Packet::empty(),
            time_base: Rational::new(0, 1),
        }
    }

    fn stream_index(&self) -> usize {
        self.packet.stream()
    }

    fn set_stream_index(&mut self, index: usize) {
        self.packet.set_stream(index);
    }

    fn pts(&self) -> Option<i64> {
        self.packet.pts()
    }

    fn dts(&self) -> Option<i64> {
        self.packet.dts()
    }

    fn rescale_ts(&mut self, from: Rational, to: Rational) {
        self.packet.rescale_ts(from, to);
        self.time_base = to;
    }
}

impl From<(ffmpeg_next::codec::packet::Packet, Rational)> for RawPacket {
    fn from((packet, time_base): (ffmpeg_next::codec::packet::Packet, Rational)) -> Self {
        Self { packet, time_base }
    }
}
