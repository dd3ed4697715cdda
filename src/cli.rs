use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lite-transcode")]
#[command(author, version, about = "Re-encode the audio and video streams of a media file")]
pub struct Cli {
    /// Input media file
    #[arg(required = true)]
    pub input: String,

    /// Output media file; the container is guessed from the extension
    #[arg(required = true)]
    pub output: String,

    /// Filter chain applied to video streams
    #[arg(long)]
    pub video_filter: Option<String>,

    /// Filter chain applied to audio streams
    #[arg(long)]
    pub audio_filter: Option<String>,

    /// Run every transcoded stream on its own thread
    #[arg(long)]
    pub workers: bool,

    /// Packets buffered per stream in worker mode
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Path to a JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
