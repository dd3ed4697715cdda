use crate::{
    backend::MediaKind,
    filter::{AUDIO_PASSTHROUGH, VIDEO_PASSTHROUGH},
};

/// Default bound of each per-stream worker queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Knobs of one transcode run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeConfig {
    /// Filter chain applied to every video stream.
    pub video_filter: String,
    /// Filter chain applied to every audio stream.
    pub audio_filter: String,
    /// Run each transcoded stream on its own worker thread.
    pub workers: bool,
    /// Packets buffered per worker before the demuxer blocks.
    pub queue_capacity: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            video_filter: VIDEO_PASSTHROUGH.to_string(),
            audio_filter: AUDIO_PASSTHROUGH.to_string(),
            workers: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl TranscodeConfig {
    pub fn with_video_filter(mut self, spec: impl Into<String>) -> Self {
        self.video_filter = spec.into();
        self
    }

    pub fn with_audio_filter(mut self, spec: impl Into<String>) -> Self {
        self.audio_filter = spec.into();
        self
    }

    pub fn with_workers(mut self, workers: bool) -> Self {
        self.workers = workers;
        self
    }

    /// A capacity of zero is raised to one so the demuxer can always hand off.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Filter chain for a stream of `kind`.
    pub fn filter_spec(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Audio => &self.audio_filter,
            _ => &self.video_filter,
        }
    }
}
