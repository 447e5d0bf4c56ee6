//! WebSocket task feeding decoded push events to the controller.

use super::events::PushEvent;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Something that happened on one socket generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub generation: u64,
    pub kind: ChannelEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    /// Handshake completed
    Opened,
    Push(PushEvent),
    /// The peer closed the connection or the stream ended
    Closed { reason: Option<String> },
    /// Connecting failed or the transport errored
    Failed { error: String },
}

/// One WebSocket connection per session, replaceable via [`reconnect`].
///
/// Each connection attempt gets a new generation number. Events from a torn
/// down generation may still be queued when the controller reads them; the
/// controller drops anything whose generation is not [`generation`].
///
/// The channel never retries on its own.
///
/// [`reconnect`]: RealtimeChannel::reconnect
/// [`generation`]: RealtimeChannel::generation
#[derive(Debug)]
pub struct RealtimeChannel {
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<ChannelEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    /// Starts connecting to `url`. Must be called within a tokio runtime.
    pub fn connect(url: String, first_generation: u64, events: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        let mut channel = Self {
            url,
            generation: first_generation,
            events,
            shutdown: None,
            task: None,
        };
        channel.spawn();
        channel
    }

    /// Tears down the current socket, if any, and connects again.
    pub fn reconnect(&mut self) -> u64 {
        self.close();
        self.generation += 1;
        self.spawn();
        self.generation
    }

    /// Closes the socket. Events already queued from it become stale only
    /// after a subsequent reconnect.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task = None;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the socket task for the current generation is still alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn spawn(&mut self) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(run_socket(
            self.url.clone(),
            self.generation,
            self.events.clone(),
            shutdown_rx,
        )));
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_socket(
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let emit = |kind: ChannelEventKind| {
        // The controller is gone; nothing left to notify.
        let _ = events.send(ChannelEvent { generation, kind });
    };

    let connecting = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = &mut shutdown => return,
    };
    let mut stream = match connecting {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(generation, "⚠️ WebSocket connect failed: {}", e);
            emit(ChannelEventKind::Failed { error: e.to_string() });
            return;
        }
    };

    info!(generation, "🔗 Realtime channel open");
    emit(ChannelEventKind::Opened);

    loop {
        let message = tokio::select! {
            message = stream.next() => message,
            _ = &mut shutdown => {
                debug!(generation, "closing realtime channel");
                let _ = stream.close(None).await;
                return;
            }
        };

        match message {
            Some(Ok(Message::Text(text))) => dispatch_text(&text, &emit),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => dispatch_text(text, &emit),
                Err(_) => warn!(generation, len = bytes.len(), "ignoring non-UTF-8 binary frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.as_str().to_string())
                    .filter(|reason| !reason.is_empty());
                info!(generation, ?reason, "🔌 Realtime channel closed by server");
                emit(ChannelEventKind::Closed { reason });
                return;
            }
            // Pings are answered by tungstenite on the next read.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(generation, "⚠️ Realtime channel error: {}", e);
                emit(ChannelEventKind::Failed { error: e.to_string() });
                return;
            }
            None => {
                info!(generation, "🔌 Realtime channel stream ended");
                emit(ChannelEventKind::Closed { reason: None });
                return;
            }
        }
    }
}

fn dispatch_text(text: &str, emit: &impl Fn(ChannelEventKind)) {
    match PushEvent::decode(text) {
        Ok(PushEvent::Unknown) => debug!(raw = text, "ignoring unknown push event"),
        Ok(event) => emit(ChannelEventKind::Push(event)),
        Err(e) => warn!(raw = text, "⚠️ Malformed push event: {}", e),
    }
}
