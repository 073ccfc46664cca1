//! Connection lifecycle: handles, generations, close classification and the
//! per-connection link task.
//!
//! Every connection attempt gets a [`ConnectionHandle`] with a fresh,
//! monotonically increasing generation. The link task that drives the
//! attempt tags everything it reports with that generation, and the session
//! driver ignores signals whose generation is no longer current. Replacing
//! the handle is therefore the only cancellation needed: a superseded link
//! task, a late close or a stale reconnect timer can never touch state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::close_code::CloseCode;
use crate::protocol::SessionId;
use crate::transport::{Connector, InboundFrame, Transport};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    /// The transport is being opened; outbound frames are refused.
    Connecting,
    /// The transport is open; outbound frames are accepted.
    Open,
    /// The transport closed; a reconnect may be pending.
    Closed,
}

/// The one live connection the client considers current.
#[derive(Debug)]
pub struct ConnectionHandle {
    session_id: SessionId,
    generation: u64,
    attempt: u32,
    retries_remaining: u32,
    phase: LinkPhase,
    outbound: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(
        session_id: SessionId,
        generation: u64,
        attempt: u32,
        retries_remaining: u32,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            session_id,
            generation,
            attempt,
            retries_remaining,
            phase: LinkPhase::Connecting,
            outbound,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of automatic reconnects that led to this handle.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase == LinkPhase::Open
    }

    /// Returns `true` if a signal tagged with `generation` belongs to this
    /// handle.
    pub fn owns(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn mark_open(&mut self) {
        self.phase = LinkPhase::Open;
    }

    /// Record a close and decide what follows. A retry spends one unit of
    /// the budget.
    pub fn mark_closed(&mut self, code: CloseCode) -> CloseDisposition {
        self.phase = LinkPhase::Closed;
        let disposition = classify_close(code, self.retries_remaining);
        if let CloseDisposition::Reconnect { retries_remaining } = disposition {
            self.retries_remaining = retries_remaining;
        }
        disposition
    }

    /// Queue a frame for the link task.
    ///
    /// Returns `false` if the handle is not open or its link task is gone.
    pub fn send(&self, frame: String) -> bool {
        self.is_open() && self.outbound.send(frame).is_ok()
    }
}

/// What to do after a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Open a new connection to the same session after the reconnect delay.
    Reconnect { retries_remaining: u32 },
    /// Stop and return to the pre-connection state.
    Terminal { budget_exhausted: bool },
}

/// Classify a close by its code and the remaining retry budget.
pub fn classify_close(code: CloseCode, retries_remaining: u32) -> CloseDisposition {
    if code.is_terminal() {
        CloseDisposition::Terminal {
            budget_exhausted: false,
        }
    } else if retries_remaining == 0 {
        CloseDisposition::Terminal {
            budget_exhausted: true,
        }
    } else {
        CloseDisposition::Reconnect {
            retries_remaining: retries_remaining - 1,
        }
    }
}

// ── Link task ───────────────────────────────────────────────────────

/// What a link task reports about its connection.
#[derive(Debug)]
pub enum LinkEvent {
    Opened,
    Frame(InboundFrame),
    /// A transport error; logged only; a `Closed` always follows.
    Error(String),
    Closed { code: CloseCode, reason: String },
}

/// A [`LinkEvent`] tagged with the generation of the handle that produced it.
#[derive(Debug)]
pub struct LinkSignal {
    pub generation: u64,
    pub event: LinkEvent,
}

/// Drive one connection attempt from connect to close.
///
/// Inbound frames are forwarded in arrival order. The task ends after
/// reporting `Closed`, or silently once its handle is dropped (the
/// outbound channel closes), in which case the transport is closed.
pub(crate) async fn run_link<C: Connector>(
    connector: Arc<C>,
    session_id: SessionId,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<String>,
    signals: mpsc::UnboundedSender<LinkSignal>,
) {
    let report = |event: LinkEvent| {
        if signals.send(LinkSignal { generation, event }).is_err() {
            debug!(generation, "session driver gone, dropping link signal");
        }
    };

    debug!(%session_id, generation, "opening connection");
    let mut transport = match connector.connect(&session_id).await {
        Ok(transport) => transport,
        Err(e) => {
            error!(%session_id, generation, "connection failed: {e}");
            report(LinkEvent::Error(e.to_string()));
            report(LinkEvent::Closed {
                code: CloseCode::Abnormal,
                reason: e.to_string(),
            });
            return;
        }
    };
    info!(%session_id, generation, "connection open");
    report(LinkEvent::Opened);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        if let Err(e) = transport.send(text).await {
                            error!(generation, "transport send error: {e}");
                            report(LinkEvent::Error(e.to_string()));
                            let _ = transport.close().await;
                            report(LinkEvent::Closed {
                                code: CloseCode::Abnormal,
                                reason: e.to_string(),
                            });
                            break;
                        }
                    }
                    None => {
                        debug!(generation, "connection handle superseded, abandoning link");
                        let _ = transport.close().await;
                        break;
                    }
                }
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(InboundFrame::Close { code, reason })) => {
                        report(LinkEvent::Closed { code, reason });
                        break;
                    }
                    Some(Ok(frame)) => report(LinkEvent::Frame(frame)),
                    Some(Err(e)) => {
                        error!(generation, "transport receive error: {e}");
                        report(LinkEvent::Error(e.to_string()));
                        report(LinkEvent::Closed {
                            code: CloseCode::Abnormal,
                            reason: e.to_string(),
                        });
                        break;
                    }
                    None => {
                        report(LinkEvent::Closed {
                            code: CloseCode::Abnormal,
                            reason: "connection ended without a close frame".into(),
                        });
                        break;
                    }
                }
            }
        }
    }

    debug!(generation, "link task exited");
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use async_trait::async_trait;

    fn handle(retries: u32) -> (ConnectionHandle, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(SessionId::new("abc"), 7, 0, retries, tx), rx)
    }

    #[test]
    fn terminal_codes_never_retry() {
        for code in [1000u16, 1001, 1008] {
            assert_eq!(
                classify_close(CloseCode::from(code), 5),
                CloseDisposition::Terminal {
                    budget_exhausted: false
                }
            );
        }
    }

    #[test]
    fn retryable_codes_spend_the_budget() {
        assert_eq!(
            classify_close(CloseCode::Abnormal, 5),
            CloseDisposition::Reconnect {
                retries_remaining: 4
            }
        );
        assert_eq!(
            classify_close(CloseCode::Other(4000), 0),
            CloseDisposition::Terminal {
                budget_exhausted: true
            }
        );
    }

    #[test]
    fn handle_budget_runs_out_after_five_retries() {
        let (mut h, _rx) = handle(5);
        for expected in (0..5).rev() {
            assert_eq!(
                h.mark_closed(CloseCode::Abnormal),
                CloseDisposition::Reconnect {
                    retries_remaining: expected
                }
            );
        }
        assert_eq!(
            h.mark_closed(CloseCode::Abnormal),
            CloseDisposition::Terminal {
                budget_exhausted: true
            }
        );
    }

    #[test]
    fn only_open_handles_send() {
        let (mut h, mut rx) = handle(5);
        assert!(!h.send("early".into()));
        h.mark_open();
        assert!(h.send("frame".into()));
        assert_eq!(rx.try_recv().unwrap(), "frame");
        h.mark_closed(CloseCode::Abnormal);
        assert!(!h.send("late".into()));
    }

    #[test]
    fn generation_ownership() {
        let (h, _rx) = handle(5);
        assert!(h.owns(7));
        assert!(!h.owns(6));
    }

    struct RefusingConnector;

    struct NeverTransport;

    #[async_trait]
    impl Transport for NeverTransport {
        async fn send(&mut self, _message: String) -> Result<(), ClientError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<InboundFrame, ClientError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for RefusingConnector {
        type Transport = NeverTransport;

        async fn connect(&self, _session_id: &SessionId) -> Result<NeverTransport, ClientError> {
            Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }
    }

    #[tokio::test]
    async fn failed_connect_reports_abnormal_close() {
        let (_out_tx, out_rx) = mpsc::unbounded_channel();
        let (sig_tx, mut sig_rx) = mpsc::unbounded_channel();
        run_link(
            Arc::new(RefusingConnector),
            SessionId::new("abc"),
            3,
            out_rx,
            sig_tx,
        )
        .await;

        let first = sig_rx.recv().await.unwrap();
        assert_eq!(first.generation, 3);
        assert!(matches!(first.event, LinkEvent::Error(_)));
        let second = sig_rx.recv().await.unwrap();
        assert!(matches!(
            second.event,
            LinkEvent::Closed {
                code: CloseCode::Abnormal,
                ..
            }
        ));
    }
}
