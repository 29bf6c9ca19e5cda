//! Message transport over TCP.
//!
//! Two messaging patterns, both carried as length-prefixed frames:
//! - Rendezvous: [`Responder`] (bind) / [`Requester`] (connect), strict
//!   one-request/one-reply alternation per connection.
//! - Fan-out: [`Subscriber`] (bind) / [`Publisher`] (connect), byte-prefix
//!   topic filtering at the subscriber.
//!
//! Endpoints use the `tcp://<host>:<port>` form. Binding to port `0` picks an
//! ephemeral port; bound sockets report the endpoint actually in use.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use backon::Retryable;
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::utils::retry::connection_backoff;

pub mod fanout;
pub mod frame;
pub mod rendezvous;

pub use fanout::{Publisher, Subscriber};
pub use rendezvous::{Incoming, ReplyHandle, Requester, Responder};

/// How long a closing socket waits for in-flight frames to be written.
pub const LINGER: Duration = Duration::from_secs(1);

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    #[error("Peer closed the connection")]
    ConnectionClosed,

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Socket is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A `tcp://host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    const SCHEME: &'static str = "tcp://";

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Socket address string for binding. `*` means all interfaces.
    pub fn bind_addr(&self) -> String {
        let host = if self.host == "*" { "0.0.0.0" } else { &self.host };
        format!("{}:{}", host, self.port)
    }

    /// Socket address string for connecting.
    pub fn connect_addr(&self) -> String {
        let host = match self.host.as_str() {
            "*" | "0.0.0.0" => "127.0.0.1",
            other => other,
        };
        format!("{}:{}", host, self.port)
    }

    /// Same host, different port. Used to report an ephemeral bind.
    pub(crate) fn with_port(&self, port: u16) -> Self {
        Self::new(self.host.clone(), port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", Self::SCHEME, self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            endpoint: s.to_string(),
            reason: reason.to_string(),
        };

        let rest = s
            .strip_prefix(Self::SCHEME)
            .ok_or_else(|| invalid("expected tcp:// scheme"))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;

        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Connect to `endpoint`, retrying with exponential backoff.
pub(crate) async fn connect_with_backoff(endpoint: &Endpoint) -> Result<TcpStream> {
    let addr = endpoint.connect_addr();

    let stream = (|| TcpStream::connect(addr.as_str()))
        .retry(connection_backoff())
        .notify(|err: &std::io::Error, dur: Duration| {
            debug!(endpoint = %endpoint, error = %err, delay = ?dur, "Connection failed, retrying");
        })
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let _ = stream.set_nodelay(true);
    Ok(stream)
}

/// Accept connections until `shutdown` fires, serving each with `serve`.
///
/// On shutdown the listener is dropped first, then every connection task is
/// awaited so in-flight writes can finish.
pub(crate) async fn serve_listener<F, Fut>(
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
    serve: F,
) where
    F: Fn(TcpStream, watch::Receiver<bool>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "Peer connected");
                    let _ = stream.set_nodelay(true);
                    connections.spawn(serve(stream, shutdown.clone()));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
}
