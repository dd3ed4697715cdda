use std::fmt;

pub type Result<T> = std::result::Result<T, TranscodeError>;

/// Pipeline stage a codec failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DecoderOpen,
    EncoderOpen,
    Decode,
    Filter,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DecoderOpen => "decoder open",
            Stage::EncoderOpen => "encoder open",
            Stage::Decode => "decode",
            Stage::Filter => "filter",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("cannot open {path}: {source}")]
    OpenFailure {
        path: String,
        #[source]
        source: ffmpeg_next::Error,
    },

    /// Stream of unknown media type, or no decoder for its codec.
    #[error("stream #{index} is not supported: {reason}")]
    UnsupportedStream {
        index: usize,
        reason: String,
        code: ffmpeg_next::Error,
    },

    #[error("no encoder found for codec {codec} (stream #{index})")]
    EncoderNotFound { index: usize, codec: String },

    #[error("invalid filter graph {spec:?} for stream #{index}: {source}")]
    FilterGraphInvalid {
        index: usize,
        spec: String,
        #[source]
        source: ffmpeg_next::Error,
    },

    /// Container-level demux failure, not tied to any stream.
    #[error("failed to read input: {source}")]
    Read {
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("{stage} failed on stream #{index}: {source}")]
    Codec {
        stage: Stage,
        index: usize,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("failed to write {what}: {source}")]
    WriteFailure {
        what: &'static str,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("transcode cancelled")]
    Cancelled,

    #[error("worker for stream #{0} stopped without reporting")]
    WorkerLost(usize),
}

impl TranscodeError {
    pub fn codec(stage: Stage, index: usize) -> impl FnOnce(ffmpeg_next::Error) -> Self {
        move |source| TranscodeError::Codec {
            stage,
            index,
            source,
        }
    }

    pub fn write(what: &'static str) -> impl FnOnce(ffmpeg_next::Error) -> Self {
        move |source| TranscodeError::WriteFailure { what, source }
    }

    /// The FFmpeg error this failure maps to.
    pub fn av_error(&self) -> ffmpeg_next::Error {
        match self {
            TranscodeError::OpenFailure { source, .. }
            | TranscodeError::FilterGraphInvalid { source, .. }
            | TranscodeError::Read { source }
            | TranscodeError::Codec { source, .. }
            | TranscodeError::WriteFailure { source, .. } => *source,
            TranscodeError::UnsupportedStream { code, .. } => *code,
            TranscodeError::EncoderNotFound { .. } => ffmpeg_next::Error::InvalidData,
            TranscodeError::Cancelled => ffmpeg_next::Error::Exit,
            TranscodeError::WorkerLost(_) => ffmpeg_next::Error::Bug,
        }
    }

    /// Negative status code reported at the entry point.
    pub fn status_code(&self) -> i32 {
        let code = i32::from(self.av_error());
        if code < 0 { code } else { -1 }
    }
}
