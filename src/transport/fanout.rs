//! Fan-out (publish/subscribe) sockets.
//!
//! A [`Subscriber`] binds and accepts any number of publishers. Frames whose
//! bytes do not start with the subscribed topic are discarded on arrival.
//!
//! A [`Publisher`] connects in the background. `send` only queues the frame;
//! a writer task delivers queued frames in order once connected.

use std::sync::{Arc, Mutex};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::frame::{read_frame, write_frame};
use super::{connect_with_backoff, serve_listener, Endpoint, Result, TransportError, LINGER};

/// Matching frames buffered ahead of the subscriber's owner.
const CHANNEL_CAPACITY: usize = 1024;

/// Connecting fan-out socket.
pub struct Publisher {
    endpoint: Endpoint,
    queue: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Publisher {
    /// Start a publisher for `endpoint`.
    ///
    /// Never fails: the connection is made by the writer task, which holds
    /// queued frames until it succeeds or gives up.
    pub fn connect(endpoint: &Endpoint) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(endpoint.clone(), rx));

        Self {
            endpoint: endpoint.clone(),
            queue: Mutex::new(Some(tx)),
            writer: tokio::sync::Mutex::new(Some(writer)),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Connect, write a single frame and disconnect.
    ///
    /// Unlike [`send`](Self::send), connection and write failures are
    /// returned to the caller.
    pub async fn send_once(endpoint: &Endpoint, frame: &[u8]) -> Result<()> {
        let mut stream = connect_with_backoff(endpoint).await?;
        write_frame(&mut stream, frame).await?;
        stream.shutdown().await?;
        Ok(())
    }

    /// Queue one frame for delivery. Fails only after [`close`](Self::close).
    pub fn send(&self, frame: impl Into<Vec<u8>>) -> Result<()> {
        let queue = self.queue.lock().map_err(|_| TransportError::Closed)?;
        match queue.as_ref() {
            Some(tx) => tx.send(frame.into()).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    /// Stop accepting frames and wait for the queue to drain.
    ///
    /// Waits at most [`LINGER`]; frames still queued after that are lost.
    /// Calling `close` again is a no-op.
    pub async fn close(&self) {
        let tx = self.queue.lock().ok().and_then(|mut queue| queue.take());
        drop(tx);

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if tokio::time::timeout(LINGER, &mut writer).await.is_err() {
                warn!(endpoint = %self.endpoint, "Publisher did not drain in time, aborting");
                writer.abort();
            }
            debug!(endpoint = %self.endpoint, "Publisher closed");
        }
    }
}

async fn write_loop(endpoint: Endpoint, mut queue: mpsc::UnboundedReceiver<Vec<u8>>) {
    let mut stream: Option<TcpStream> = None;

    while let Some(frame) = queue.recv().await {
        if stream.is_none() {
            match connect_with_backoff(&endpoint).await {
                Ok(connected) => {
                    info!(endpoint = %endpoint, "Publisher connected");
                    stream = Some(connected);
                }
                Err(e) => {
                    warn!(error = %e, "Dropping frame, subscriber unreachable");
                    continue;
                }
            }
        }

        if let Some(connected) = stream.as_mut() {
            if let Err(e) = write_frame(connected, &frame).await {
                warn!(endpoint = %endpoint, error = %e, "Dropping frame, write failed");
                stream = None;
            }
        }
    }

    if let Some(mut connected) = stream {
        let _ = connected.shutdown().await;
    }
}

/// Bound fan-out socket filtered to one topic.
pub struct Subscriber {
    endpoint: Endpoint,
    topic: Arc<[u8]>,
    frames: mpsc::Receiver<Vec<u8>>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl Subscriber {
    /// Bind the endpoint and accept publishers, keeping only frames that
    /// start with `topic`.
    pub async fn bind(endpoint: &Endpoint, topic: impl AsRef<[u8]>) -> Result<Self> {
        let listener = TcpListener::bind(endpoint.bind_addr())
            .await
            .map_err(|source| TransportError::Bind {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let endpoint = endpoint.with_port(listener.local_addr()?.port());
        let topic: Arc<[u8]> = Arc::from(topic.as_ref());

        let (tx, frames) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let filter = topic.clone();
        let accept_task = tokio::spawn(serve_listener(listener, shutdown_rx, move |stream, shutdown| {
            read_publisher(stream, filter.clone(), tx.clone(), shutdown)
        }));

        info!(
            endpoint = %endpoint,
            topic = %String::from_utf8_lossy(&topic),
            "Subscriber bound"
        );

        Ok(Self {
            endpoint,
            topic,
            frames,
            shutdown,
            accept_task,
        })
    }

    /// The endpoint actually bound (resolves port `0`).
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn topic(&self) -> &[u8] {
        &self.topic
    }

    /// Wait for the next frame matching the topic.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        self.frames.recv().await.ok_or(TransportError::Closed)
    }

    /// Stop accepting and drop every publisher connection.
    pub async fn close(self) {
        let Self {
            endpoint,
            frames,
            shutdown,
            mut accept_task,
            ..
        } = self;

        let _ = shutdown.send(true);
        drop(frames);

        if tokio::time::timeout(LINGER, &mut accept_task).await.is_err() {
            warn!(endpoint = %endpoint, "Subscriber did not drain in time, aborting");
            accept_task.abort();
        }
        info!(endpoint = %endpoint, "Subscriber closed");
    }
}

async fn read_publisher(
    stream: TcpStream,
    topic: Arc<[u8]>,
    frames: mpsc::Sender<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut stream = stream;

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = read_frame(&mut stream) => frame,
        };

        match frame {
            Ok(Some(frame)) if frame.starts_with(&topic) => {
                if frames.send(frame).await.is_err() {
                    break;
                }
            }
            Ok(Some(frame)) => trace!(len = frame.len(), "Discarding frame for another topic"),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Dropping publisher connection");
                break;
            }
        }
    }
}
