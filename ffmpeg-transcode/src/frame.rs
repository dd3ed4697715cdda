use ffmpeg_next::picture;

use crate::backend::{MediaFrame, MediaKind};

/// Decoded (or filtered) FFmpeg frame.
#[derive(Clone)]
pub enum RawFrame {
    Video(ffmpeg_next::frame::Video),
    Audio(ffmpeg_next::frame::Audio),
}

unsafe impl Send for RawFrame {}

impl RawFrame {
    pub fn as_frame(&self) -> &ffmpeg_next::Frame {
        match self {
            RawFrame::Video(frame) => frame,
            RawFrame::Audio(frame) => frame,
        }
    }

    pub fn as_frame_mut(&mut self) -> &mut ffmpeg_next::Frame {
        match self {
            RawFrame::Video(frame) => frame,
            RawFrame::Audio(frame) => frame,
        }
    }
}

impl MediaFrame for RawFrame {
    fn empty(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => RawFrame::Audio(ffmpeg_next::frame::Audio::empty()),
            _ => RawFrame::Video(ffmpeg_next::frame::Video::empty()),
        }
    }

    fn pts(&self) -> Option<i64> {
        self.as_frame().pts()
    }

    fn set_pts(&mut self, pts: Option<i64>) {
        self.as_frame_mut().set_pts(pts);
    }

    fn best_effort_timestamp(&self) -> Option<i64> {
        self.as_frame().timestamp()
    }

    fn clear_picture_type(&mut self) {
        if let RawFrame::Video(frame) = self {
            frame.set_kind(picture::Type::None);
        }
    }
}
