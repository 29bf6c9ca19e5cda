//! Rendezvous (request/reply) sockets.
//!
//! A [`Responder`] binds and hands each received request to its owner as an
//! [`Incoming`]. The connection that delivered the request reads nothing more
//! until the owner answers through the [`ReplyHandle`], so every connection
//! strictly alternates request and reply.
//!
//! A [`Requester`] connects lazily and performs one bounded round trip at a
//! time. A timed-out or failed round trip discards the connection; the next
//! request reconnects, so a late reply can never be read as the answer to a
//! newer request.

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::frame::{read_frame, write_frame};
use super::{connect_with_backoff, serve_listener, Endpoint, Result, TransportError, LINGER};

/// Requests accepted but not yet taken by the owner.
const QUEUE_DEPTH: usize = 64;

/// A request waiting for its reply.
#[derive(Debug)]
pub struct Incoming {
    payload: Vec<u8>,
    reply: ReplyHandle,
}

impl Incoming {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (Vec<u8>, ReplyHandle) {
        (self.payload, self.reply)
    }
}

/// One-shot reply slot for a single request.
#[derive(Debug)]
pub struct ReplyHandle {
    tx: oneshot::Sender<Vec<u8>>,
}

impl ReplyHandle {
    /// Send the reply. Fails if the requester's connection is already gone.
    pub fn send(self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.tx
            .send(payload.into())
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

/// Bound request/reply socket.
pub struct Responder {
    endpoint: Endpoint,
    requests: mpsc::Receiver<Incoming>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl Responder {
    /// Bind the endpoint and start accepting requesters.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        let listener = TcpListener::bind(endpoint.bind_addr())
            .await
            .map_err(|source| TransportError::Bind {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let endpoint = endpoint.with_port(listener.local_addr()?.port());

        let (tx, requests) = mpsc::channel(QUEUE_DEPTH);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(serve_listener(listener, shutdown_rx, move |stream, shutdown| {
            serve_connection(stream, tx.clone(), shutdown)
        }));

        info!(endpoint = %endpoint, "Responder bound");

        Ok(Self {
            endpoint,
            requests,
            shutdown,
            accept_task,
        })
    }

    /// The endpoint actually bound (resolves port `0`).
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Wait for the next request.
    pub async fn recv(&mut self) -> Result<Incoming> {
        self.requests.recv().await.ok_or(TransportError::Closed)
    }

    /// Stop accepting and drop every connection.
    ///
    /// Replies already handed to a [`ReplyHandle`] are written first.
    /// Requests still queued are dropped unanswered.
    pub async fn close(self) {
        let Self {
            endpoint,
            requests,
            shutdown,
            mut accept_task,
        } = self;

        let _ = shutdown.send(true);
        drop(requests);

        if tokio::time::timeout(LINGER, &mut accept_task).await.is_err() {
            warn!(endpoint = %endpoint, "Responder did not drain in time, aborting");
            accept_task.abort();
        }
        info!(endpoint = %endpoint, "Responder closed");
    }
}

async fn serve_connection(
    stream: TcpStream,
    requests: mpsc::Sender<Incoming>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = read_frame(&mut reader) => frame,
        };

        let payload = match frame {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Dropping requester connection");
                break;
            }
        };

        let (tx, rx) = oneshot::channel();
        let incoming = Incoming {
            payload,
            reply: ReplyHandle { tx },
        };
        if requests.send(incoming).await.is_err() {
            break;
        }

        // A reply produced before shutdown still wins the race.
        let reply = tokio::select! {
            biased;
            reply = rx => match reply {
                Ok(reply) => reply,
                Err(_) => {
                    debug!("Request dropped without a reply, closing connection");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        };

        if let Err(e) = write_frame(&mut writer, &reply).await {
            warn!(error = %e, "Failed to write reply");
            break;
        }
    }
}

/// Connecting request/reply socket.
pub struct Requester {
    endpoint: Endpoint,
    stream: Option<TcpStream>,
}

impl Requester {
    /// Create a requester for `endpoint`. The connection is made on first use.
    pub fn connect(endpoint: &Endpoint) -> Self {
        Self {
            endpoint: endpoint.clone(),
            stream: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send one request and wait for its reply, bounded by `timeout`.
    ///
    /// The bound covers connecting as well as the round trip itself.
    pub async fn request(&mut self, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        match tokio::time::timeout(timeout, self.round_trip(payload)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                self.stream = None;
                Err(e)
            }
            Err(_) => {
                self.stream = None;
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    async fn round_trip(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if self.stream.is_none() {
            self.stream = Some(connect_with_backoff(&self.endpoint).await?);
        }
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;

        write_frame(stream, payload).await?;
        read_frame(stream)
            .await?
            .ok_or(TransportError::ConnectionClosed)
    }

    pub async fn close(mut self) {
        if let Some(mut stream) = self.stream.take() {
            use tokio::io::AsyncWriteExt;
            let _ = stream.shutdown().await;
        }
    }
}
