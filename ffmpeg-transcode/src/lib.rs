//! Generic media transcoding over FFmpeg: one input container in, one output
//! container out. Video and audio streams are decoded, filtered and encoded
//! again with the same codec; every other stream is copied as is.

pub mod backend;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod frame;
pub mod input;
pub mod native;
pub mod output;
pub mod packet;
pub mod pipeline;
pub mod session;
pub mod stream;
pub mod transcoder;
mod worker;

#[cfg(test)]
mod fake;

pub use config::TranscodeConfig;
pub use error::{Result, TranscodeError};
pub use native::Ffmpeg;
pub use transcoder::{TranscodeSummary, Transcoder};

/// Registers FFmpeg components. Safe to call more than once.
pub fn init() -> std::result::Result<(), ffmpeg_next::Error> {
    ffmpeg_next::init()
}

/// Transcodes `input` into `output` with pass-through filters.
///
/// Returns 0 on success, otherwise the negative FFmpeg error code of the first
/// failure.
pub fn transcode(input: &str, output: &str) -> i32 {
    transcode_with(input, output, &TranscodeConfig::default())
}

/// Like [`transcode`], with explicit filter chains and threading.
pub fn transcode_with(input: &str, output: &str, config: &TranscodeConfig) -> i32 {
    if let Err(err) = init() {
        log::error!("ffmpeg init: {}", err);
        return i32::from(err);
    }
    match Transcoder::new(Ffmpeg)
        .with_config(config.clone())
        .run(input, output)
    {
        Ok(_) => 0,
        Err(err) => err.status_code(),
    }
}
