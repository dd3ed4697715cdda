use std::path::Path;

use anyhow::Context;
use ffmpeg_transcode::TranscodeConfig;
use serde::Deserialize;

use crate::cli::Cli;

/// Optional JSON config; every field may be omitted.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct FileConfig {
    pub video_filter: Option<String>,
    pub audio_filter: Option<String>,
    pub workers: Option<bool>,
    pub queue_capacity: Option<usize>,
}

pub fn load(path: Option<&Path>) -> anyhow::Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

impl FileConfig {
    /// File values over the defaults, command-line flags over both.
    pub fn merge(self, cli: &Cli) -> TranscodeConfig {
        let mut config = TranscodeConfig::default();
        if let Some(spec) = cli.video_filter.clone().or(self.video_filter) {
            config = config.with_video_filter(spec);
        }
        if let Some(spec) = cli.audio_filter.clone().or(self.audio_filter) {
            config = config.with_audio_filter(spec);
        }
        config = config.with_workers(cli.workers || self.workers.unwrap_or(false));
        if let Some(capacity) = cli.queue_capacity.or(self.queue_capacity) {
            config = config.with_queue_capacity(capacity);
        }
        config
    }
}
