//! Per-stream worker mode: every transcoded stream runs on its own thread,
//! fed by the demuxer through a bounded queue. Copied streams are written
//! straight from the demux thread. All writers share one muxer.

use std::{
    sync::{
        Mutex,
        mpsc::{self, Receiver, SyncSender},
    },
    thread,
};

use tokio_util::sync::CancellationToken;

use crate::{
    backend::{Backend, Demux, MediaPacket, Mux},
    error::{Result, TranscodeError},
    packet::PacketCmd,
    pipeline::PacketWriter,
    session::{CopyStream, MediaSession, StreamContext, StreamStats, TranscodeStream},
    transcoder::TranscodeSummary,
};

/// State every thread of one run can reach.
struct Shared<M> {
    output: Mutex<M>,
    cancel: CancellationToken,
    first_error: Mutex<Option<TranscodeError>>,
}

impl<M> Shared<M> {
    /// Records `err` unless an earlier failure is already recorded, then stops everyone.
    fn fail(&self, err: TranscodeError) {
        if let Ok(mut slot) = self.first_error.lock() {
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.cancel.cancel();
    }

    fn take_error(&self) -> Option<TranscodeError> {
        match self.first_error.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => Some(TranscodeError::Cancelled),
        }
    }
}

/// Muxer handle used from several threads.
struct SharedWriter<'a, M>(&'a Mutex<M>);

impl<M: Mux> PacketWriter<M::Packet> for SharedWriter<'_, M> {
    fn write_packet(&mut self, packet: &mut M::Packet) -> Result<()> {
        let index = packet.stream_index();
        let mut output = self
            .0
            .lock()
            .map_err(|_| TranscodeError::WorkerLost(index))?;
        output.write_interleaved(packet)
    }
}

enum Lane<P> {
    Copy(CopyStream),
    Worker {
        index: usize,
        queue: SyncSender<PacketCmd<P>>,
    },
}

pub(crate) fn run<B: Backend>(
    session: MediaSession<B>,
    cancel: &CancellationToken,
    queue_capacity: usize,
) -> Result<TranscodeSummary>
where
    B::Output: Send,
    B::Packet: Send,
    TranscodeStream<B>: Send,
{
    let MediaSession {
        mut input,
        output,
        streams,
    } = session;
    let shared = Shared {
        output: Mutex::new(output),
        cancel: cancel.child_token(),
        first_error: Mutex::new(None),
    };

    let mut stats = thread::scope(|scope| {
        let mut lanes = Vec::with_capacity(streams.len());
        let mut handles = Vec::new();
        for stream in streams {
            match stream {
                StreamContext::Copy(stream) => lanes.push(Lane::Copy(stream)),
                StreamContext::Transcode(stream) => {
                    let index = stream.index();
                    let (queue, rx) = mpsc::sync_channel(queue_capacity.max(1));
                    let shared = &shared;
                    let handle = thread::Builder::new()
                        .name(format!("transcode-stream-{}", index))
                        .spawn_scoped(scope, move || worker_loop(stream, rx, shared));
                    match handle {
                        Ok(handle) => handles.push((index, handle)),
                        Err(err) => {
                            log::error!("failed to spawn worker for stream #{}: {}", index, err);
                            shared.fail(TranscodeError::WorkerLost(index));
                        }
                    }
                    lanes.push(Lane::Worker { index, queue });
                }
            }
        }

        if let Err(err) = demux_loop::<B>(&mut input, &mut lanes, &shared) {
            shared.fail(err);
        }

        let mut stats = Vec::with_capacity(lanes.len());
        for lane in lanes {
            match lane {
                Lane::Copy(stream) => stats.push(stream.stats),
                Lane::Worker { index, queue } => {
                    // a dropped queue without Eof tells the worker to stop
                    if !shared.cancel.is_cancelled() && queue.send(PacketCmd::Eof).is_err() {
                        shared.fail(TranscodeError::WorkerLost(index));
                    }
                }
            }
        }
        for (index, handle) in handles {
            match handle.join() {
                Ok(Some(worker_stats)) => stats.push(worker_stats),
                Ok(None) => {}
                Err(_) => {
                    log::error!("worker for stream #{} panicked", index);
                    shared.fail(TranscodeError::WorkerLost(index));
                }
            }
        }
        stats
    });

    if let Some(err) = shared.take_error() {
        return Err(err);
    }
    let mut output = shared
        .output
        .into_inner()
        .map_err(|_| TranscodeError::Cancelled)?;
    output.write_trailer()?;

    stats.sort_by_key(|stats| stats.index);
    Ok(TranscodeSummary { streams: stats })
}

fn demux_loop<B: Backend>(
    input: &mut B::Input,
    lanes: &mut [Lane<B::Packet>],
    shared: &Shared<B::Output>,
) -> Result<()> {
    let mut writer = SharedWriter(&shared.output);
    while let Some(mut packet) = input.read_packet()? {
        if shared.cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }
        let index = packet.stream_index();
        match lanes.get_mut(index) {
            Some(Lane::Copy(stream)) => stream.process_packet(&mut packet, &mut writer)?,
            // blocks while the worker's queue is full
            Some(Lane::Worker { queue, .. }) => queue
                .send(PacketCmd::Data(packet))
                .map_err(|_| TranscodeError::WorkerLost(index))?,
            None => {
                return Err(TranscodeError::Read {
                    source: ffmpeg_next::Error::StreamNotFound,
                });
            }
        }
    }
    Ok(())
}

fn worker_loop<B: Backend>(
    mut stream: TranscodeStream<B>,
    rx: Receiver<PacketCmd<B::Packet>>,
    shared: &Shared<B::Output>,
) -> Option<StreamStats> {
    let index = stream.index();
    match pump(&mut stream, &rx, shared) {
        Ok(()) => Some(stream.stats),
        Err(err) => {
            log::debug!("worker for stream #{} stopped: {}", index, err);
            shared.fail(err);
            None
        }
    }
}

fn pump<B: Backend>(
    stream: &mut TranscodeStream<B>,
    rx: &Receiver<PacketCmd<B::Packet>>,
    shared: &Shared<B::Output>,
) -> Result<()> {
    let mut writer = SharedWriter(&shared.output);
    loop {
        if shared.cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }
        match rx.recv() {
            Ok(PacketCmd::Data(mut packet)) => stream.process_packet(&mut packet, &mut writer)?,
            Ok(PacketCmd::Eof) => return stream.flush(&mut writer),
            Err(_) => return Err(TranscodeError::Cancelled),
        }
    }
}
