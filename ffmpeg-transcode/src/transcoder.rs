use tokio_util::sync::CancellationToken;

use crate::{
    backend::{Backend, Demux, MediaPacket, Mux},
    config::TranscodeConfig,
    error::{Result, TranscodeError},
    session::{MediaSession, StreamStats, TranscodeStream},
    worker,
};

/// What a finished run produced, one entry per output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeSummary {
    pub streams: Vec<StreamStats>,
}

impl TranscodeSummary {
    pub fn packets_written(&self) -> u64 {
        self.streams.iter().map(|stats| stats.packets_written).sum()
    }
}

/// Drives one input file through the pipeline into one output file.
pub struct Transcoder<B: Backend> {
    backend: B,
    config: TranscodeConfig,
    cancel: CancellationToken,
}

impl<B: Backend> Transcoder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: TranscodeConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: TranscodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Cancelling `token` aborts the run at the next packet boundary.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs the whole operation. On failure nothing more is written and every
    /// opened resource is released; the first error is returned.
    pub fn run(&self, input: &str, output: &str) -> Result<TranscodeSummary>
    where
        B::Output: Send,
        B::Packet: Send,
        TranscodeStream<B>: Send,
    {
        let result = MediaSession::open(&self.backend, input, output, &self.config).and_then(
            |session| {
                if self.config.workers {
                    worker::run(session, &self.cancel, self.config.queue_capacity)
                } else {
                    self.run_sequential(session)
                }
            },
        );
        match &result {
            Ok(summary) => log::info!(
                "transcode {} -> {} done, {} packet(s) written",
                input,
                output,
                summary.packets_written()
            ),
            Err(err) => log::error!("transcode {} -> {} failed: {}", input, output, err),
        }
        result
    }

    fn run_sequential(&self, mut session: MediaSession<B>) -> Result<TranscodeSummary> {
        let MediaSession {
            input,
            output,
            streams,
        } = &mut session;

        while let Some(mut packet) = input.read_packet()? {
            if self.cancel.is_cancelled() {
                return Err(TranscodeError::Cancelled);
            }
            let index = packet.stream_index();
            match streams.get_mut(index) {
                Some(stream) => stream.process_packet(&mut packet, output)?,
                None => {
                    return Err(TranscodeError::Read {
                        source: ffmpeg_next::Error::StreamNotFound,
                    });
                }
            }
        }

        for stream in streams.iter_mut() {
            stream.flush(output)?;
        }
        output.write_trailer()?;

        Ok(TranscodeSummary {
            streams: session.stats(),
        })
    }
}
