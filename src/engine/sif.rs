//! Server-initiated frames.
//!
//! [`Engine::send_sif`] writes a frame directly. While [`Engine::run`] owns
//! the engine, other tasks go through a cloneable [`SifHandle`]; requests are
//! queued on a channel and written by the loop between exchanges.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use super::Engine;
use crate::error::{A2jError, Result};
use crate::protocol::{Frame, FrameKind, MAX_PAYLOAD};
use crate::transport::Transport;

/// Requests a [`SifHandle`] may queue before `send` waits.
pub(crate) const SIF_QUEUE_CAPACITY: usize = 16;

/// A queued server-initiated frame and where to report the outcome.
pub(crate) struct SifRequest {
    code: u8,
    payload: Bytes,
    reply: oneshot::Sender<Result<u8>>,
}

/// Cloneable sender for server-initiated frames.
///
/// Obtained from [`Engine::sif_handle`]. Frames are written by the engine's
/// [`run`](Engine::run) loop, so a handle is only useful while that loop
/// (or a caller of [`Engine::serve_sif_requests`]) is active.
#[derive(Clone)]
pub struct SifHandle {
    tx: mpsc::Sender<SifRequest>,
    enabled: bool,
}

impl SifHandle {
    pub(crate) fn new(tx: mpsc::Sender<SifRequest>, enabled: bool) -> Self {
        Self { tx, enabled }
    }

    /// Queue a frame and wait until the engine has written it.
    ///
    /// Returns the sequence number the frame carried.
    ///
    /// # Errors
    ///
    /// The same errors as [`Engine::send_sif`], plus
    /// [`A2jError::ConnectionClosed`] once the engine is gone.
    pub async fn send(&self, code: u8, payload: &[u8]) -> Result<u8> {
        if !self.enabled {
            return Err(A2jError::SifDisabled);
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(A2jError::PayloadTooLarge(payload.len()));
        }

        let (reply, outcome) = oneshot::channel();
        let request = SifRequest {
            code,
            payload: Bytes::copy_from_slice(payload),
            reply,
        };
        self.tx
            .send(request)
            .await
            .map_err(|_| A2jError::ConnectionClosed)?;
        outcome.await.map_err(|_| A2jError::ConnectionClosed)?
    }
}

impl<T: Transport> Engine<T> {
    /// A handle for sending server-initiated frames from other tasks.
    pub fn sif_handle(&self) -> SifHandle {
        SifHandle::new(self.sif_tx.clone(), self.config.features.sif)
    }

    /// Write every frame currently queued by [`SifHandle`]s.
    ///
    /// Returns how many requests were served. [`run`](Self::run) calls this
    /// before each exchange; a custom polling loop should do the same.
    pub async fn serve_sif_requests(&mut self) -> usize {
        let mut served = 0;
        while let Ok(request) = self.sif_rx.try_recv() {
            self.serve_sif(request).await;
            served += 1;
        }
        served
    }

    pub(crate) async fn serve_sif(&mut self, request: SifRequest) {
        let outcome = self.send_sif(request.code, &request.payload).await;
        if let Err(e) = &outcome {
            tracing::debug!("Queued server-initiated frame not sent: {}", e);
        }
        // The sender may have stopped waiting.
        let _ = request.reply.send(outcome);
    }

    /// Send an unsolicited frame (SOS marker) to the host.
    ///
    /// Returns the sequence number the frame carried. The internal counter
    /// advances only when the frame was written and flushed.
    ///
    /// # Errors
    ///
    /// - [`A2jError::SifDisabled`] when the feature is switched off
    /// - [`A2jError::SifBusy`] when a reply or another frame holds the busy
    ///   flag; nothing is written and the counter is unchanged
    /// - [`A2jError::PayloadTooLarge`] for payloads over 255 bytes
    /// - transport errors from the write itself
    pub async fn send_sif(&mut self, code: u8, payload: &[u8]) -> Result<u8> {
        if !self.config.features.sif {
            return Err(A2jError::SifDisabled);
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(A2jError::PayloadTooLarge(payload.len()));
        }
        let _guard = self.busy.try_acquire().ok_or(A2jError::SifBusy)?;

        let seq = self.sif_seq;
        let frame = Frame::new(
            FrameKind::ServerInitiated,
            seq,
            code,
            Bytes::copy_from_slice(payload),
        );
        self.send(&frame).await?;
        self.sif_seq = seq.wrapping_add(1);

        tracing::trace!("Server-initiated frame {} sent", seq);
        Ok(seq)
    }
}
