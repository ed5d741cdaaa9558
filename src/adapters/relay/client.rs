//! Client relay driver.
//!
//! Runs a `RelaySession` against a real transport. The session decides;
//! this driver owns the stream handle and the retry timer and executes the
//! session's commands. Everything happens on one task, so there is never
//! more than one open handle and never more than one armed timer.

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::time::{sleep, Sleep};
use tokio_util::sync::CancellationToken;

use crate::domain::notification::{
    PaymentEvent, ReconnectBackoff, RelayCommand, RelaySession, RelayState,
};
use crate::ports::{EventByteStream, EventStreamTransport, TransportError};

use super::decoder::EventStreamDecoder;

/// The one live upstream connection.
struct OpenStream {
    bytes: EventByteStream,
    decoder: EventStreamDecoder,
}

/// What woke the driver loop.
enum Wake {
    Shutdown,
    Chunk(Option<Result<Bytes, TransportError>>),
    RetryElapsed,
}

/// Keeps one event stream open to the gateway and hands payment events to
/// a display callback.
pub struct ClientRelay {
    transport: Arc<dyn EventStreamTransport>,
    session: RelaySession,
    stream: Option<OpenStream>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl ClientRelay {
    pub fn new(transport: Arc<dyn EventStreamTransport>, backoff: ReconnectBackoff) -> Self {
        Self {
            transport,
            session: RelaySession::new(backoff),
            stream: None,
            retry: None,
        }
    }

    pub fn state(&self) -> RelayState {
        self.session.state()
    }

    /// Runs until `shutdown` is cancelled, then tears the session down.
    ///
    /// `on_event` receives `payment_success` and `payment_failed` events in
    /// arrival order. Transport failures never reach it.
    pub async fn run<F>(mut self, shutdown: CancellationToken, mut on_event: F)
    where
        F: FnMut(PaymentEvent) + Send,
    {
        let commands = self.session.activate();
        let mut running = self.execute(commands, &shutdown, &mut on_event).await;

        while running {
            let commands = match self.wait(&shutdown).await {
                Wake::Shutdown => break,
                Wake::Chunk(Some(Ok(chunk))) => self.on_chunk(&chunk),
                Wake::Chunk(Some(Err(e))) => {
                    tracing::warn!(error = %e, "event stream failed");
                    self.session.on_transport_error()
                }
                Wake::Chunk(None) => {
                    tracing::warn!("event stream closed by gateway");
                    self.session.on_transport_error()
                }
                Wake::RetryElapsed => {
                    self.retry = None;
                    self.session.on_retry_elapsed()
                }
            };
            running = self.execute(commands, &shutdown, &mut on_event).await;
        }

        let commands = self.session.teardown();
        self.execute(commands, &shutdown, &mut on_event).await;
        tracing::info!("client relay torn down");
    }

    async fn wait(&mut self, shutdown: &CancellationToken) -> Wake {
        let stream = &mut self.stream;
        let retry = &mut self.retry;
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Wake::Shutdown,
            chunk = next_chunk(stream) => Wake::Chunk(chunk),
            _ = retry_elapsed(retry) => Wake::RetryElapsed,
        }
    }

    fn on_chunk(&mut self, chunk: &[u8]) -> Vec<RelayCommand> {
        let Some(stream) = self.stream.as_mut() else {
            return Vec::new();
        };
        let payloads = match stream.decoder.push(chunk) {
            Ok(payloads) => payloads,
            Err(e) => {
                tracing::warn!(error = %e, "event stream failed");
                return self.session.on_transport_error();
            }
        };
        let mut commands = Vec::new();
        for data in payloads {
            let before = self.session.state();
            commands.extend(self.session.on_frame(&data));
            if before == RelayState::Connecting && self.session.state() == RelayState::Connected {
                tracing::info!("subscription confirmed");
            }
        }
        commands
    }

    /// Executes commands in order. Returns false if shutdown interrupted
    /// an open attempt.
    async fn execute<F>(
        &mut self,
        commands: Vec<RelayCommand>,
        shutdown: &CancellationToken,
        on_event: &mut F,
    ) -> bool
    where
        F: FnMut(PaymentEvent) + Send,
    {
        let mut queue: VecDeque<RelayCommand> = commands.into();
        while let Some(command) = queue.pop_front() {
            match command {
                RelayCommand::OpenStream => {
                    // The session closes any previous handle first; enforce it here too.
                    self.stream = None;
                    let opened = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return false,
                        opened = self.transport.open() => opened,
                    };
                    match opened {
                        Ok(bytes) => {
                            tracing::debug!("event stream opened");
                            self.stream = Some(OpenStream {
                                bytes,
                                decoder: EventStreamDecoder::new(),
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "event stream open failed");
                            queue.extend(self.session.on_transport_error());
                        }
                    }
                }
                RelayCommand::CloseStream => self.stream = None,
                RelayCommand::ScheduleRetry(delay) => {
                    tracing::info!(
                        retry_count = self.session.retry_count(),
                        delay_ms = delay.as_millis() as u64,
                        "reconnect scheduled"
                    );
                    self.retry = Some(Box::pin(sleep(delay)));
                }
                RelayCommand::CancelRetry => self.retry = None,
                RelayCommand::Deliver(event) => on_event(event),
            }
        }
        true
    }
}

async fn next_chunk(stream: &mut Option<OpenStream>) -> Option<Result<Bytes, TransportError>> {
    match stream {
        Some(stream) => stream.bytes.next().await,
        None => pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Transport whose streams are fed by the test.
    struct ChannelTransport {
        opens: Mutex<Vec<mpsc::UnboundedSender<Result<Bytes, TransportError>>>>,
        notify: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl EventStreamTransport for ChannelTransport {
        async fn open(&self) -> Result<EventByteStream, TransportError> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.opens.lock().unwrap().push(tx);
            let _ = self.notify.send(());
            Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed())
        }
    }

    fn frame(json: &str) -> Result<Bytes, TransportError> {
        Ok(Bytes::from(format!("data: {}\n\n", json)))
    }

    #[tokio::test]
    async fn delivers_notifications_but_not_connected() {
        let (notify, mut opened) = mpsc::unbounded_channel();
        let transport = Arc::new(ChannelTransport {
            opens: Mutex::new(Vec::new()),
            notify,
        });
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let relay = ClientRelay::new(transport.clone(), ReconnectBackoff::default());
        let task = tokio::spawn(relay.run(shutdown.clone(), move |event| {
            let _ = events_tx.send(event);
        }));

        opened.recv().await.unwrap();
        let tx = transport.opens.lock().unwrap()[0].clone();
        tx.send(frame(r#"{"type":"connected"}"#)).unwrap();
        tx.send(Ok(Bytes::from_static(b": heartbeat\n\n"))).unwrap();
        tx.send(frame("not json")).unwrap();
        tx.send(frame(
            r#"{"type":"payment_success","productId":"P1","productTitle":"Widget"}"#,
        ))
        .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            PaymentEvent::PaymentSuccess {
                product_id: "P1".to_string(),
                product_title: Some("Widget".to_string()),
            }
        );

        shutdown.cancel();
        task.await.unwrap();
        assert!(events.try_recv().is_err());
        assert_eq!(transport.opens.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gateway_closing_stream_triggers_reconnect() {
        let (notify, mut opened) = mpsc::unbounded_channel();
        let transport = Arc::new(ChannelTransport {
            opens: Mutex::new(Vec::new()),
            notify,
        });
        let shutdown = CancellationToken::new();
        let relay = ClientRelay::new(transport.clone(), ReconnectBackoff::default());
        let task = tokio::spawn(relay.run(shutdown.clone(), |_| {}));

        opened.recv().await.unwrap();
        let first = transport.opens.lock().unwrap().remove(0);
        drop(first);

        let start = tokio::time::Instant::now();
        opened.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_line_drops_the_stream_and_reconnects() {
        let (notify, mut opened) = mpsc::unbounded_channel();
        let transport = Arc::new(ChannelTransport {
            opens: Mutex::new(Vec::new()),
            notify,
        });
        let shutdown = CancellationToken::new();
        let relay = ClientRelay::new(transport.clone(), ReconnectBackoff::default());
        let task = tokio::spawn(relay.run(shutdown.clone(), |_| {}));

        opened.recv().await.unwrap();
        let tx = transport.opens.lock().unwrap()[0].clone();
        let unterminated = vec![b'x'; crate::adapters::relay::decoder::MAX_LINE_BYTES + 2];
        tx.send(Ok(Bytes::from(unterminated))).unwrap();

        let start = tokio::time::Instant::now();
        opened.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(tx.is_closed());

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_retry_wait_stops_for_good() {
        struct Refusing;

        #[async_trait]
        impl EventStreamTransport for Refusing {
            async fn open(&self) -> Result<EventByteStream, TransportError> {
                Err(TransportError::Status(503))
            }
        }

        let shutdown = CancellationToken::new();
        let relay = ClientRelay::new(Arc::new(Refusing), ReconnectBackoff::default());
        let task = tokio::spawn(relay.run(shutdown.clone(), |_| {}));

        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("relay stops promptly")
            .unwrap();
    }
}
