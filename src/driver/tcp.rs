//! TCP driver implementation
//!
//! Pools plain TCP sockets. Useful for proxies and for exercising the pool
//! against any listening service.

use super::{Driver, RawConnection};
use crate::config::DataSourceConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

/// Driver identifier accepted by [`TcpDriver`]
pub const TCP_DRIVER: &str = "tcp";

/// Socket options applied to every pooled socket
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(30),
            keepalive_interval: Some(10),
        }
    }
}

impl SocketOpts {
    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Driver opening plain TCP connections to `tcp://host:port`
#[derive(Debug, Clone)]
pub struct TcpDriver {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Connection timeout
    connect_timeout: Duration,
}

impl Default for TcpDriver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TcpDriver {
    /// Create a new TCP driver with default options
    pub fn with_defaults() -> Self {
        TcpDriver {
            socket_opts: SocketOpts::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Extract `host:port` from a connection URI
    ///
    /// Accepts `tcp://host:port` as well as a bare `host:port`.
    pub fn parse_target(url: &str) -> Result<String> {
        let url = url.trim();
        if !url.contains("://") {
            if url.rsplit_once(':').map_or(false, |(h, p)| {
                !h.is_empty() && p.parse::<u16>().is_ok()
            }) {
                return Ok(url.to_string());
            }
            bail!("Invalid tcp target {:?}: expected host:port", url);
        }

        let parsed = Url::parse(url).with_context(|| format!("Invalid connection url {:?}", url))?;
        if parsed.scheme() != TCP_DRIVER {
            bail!("Unsupported url scheme {:?}", parsed.scheme());
        }
        let host = parsed
            .host_str()
            .with_context(|| format!("Missing host in {:?}", url))?;
        let port = parsed
            .port()
            .with_context(|| format!("Missing port in {:?}", url))?;
        Ok(format!("{}:{}", host, port))
    }
}

#[async_trait]
impl Driver for TcpDriver {
    type Connection = TcpConnection;

    async fn check(&self, driver: &str, url: &str) -> Result<()> {
        let driver = driver.trim();
        if !driver.is_empty() && driver != TCP_DRIVER {
            bail!("Unknown driver {:?}, only {:?} is supported", driver, TCP_DRIVER);
        }
        Self::parse_target(url)?;
        Ok(())
    }

    async fn connect(&self, config: &DataSourceConfig) -> Result<Self::Connection> {
        let target = Self::parse_target(&config.url)?;

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&target))
            .await
            .with_context(|| format!("Connection timeout to {}", target))?
            .with_context(|| format!("Failed to connect to {}", target))?;

        self.socket_opts.apply(&stream)?;

        debug!("TCP connection established to {}", target);

        Ok(TcpConnection { stream, target })
    }
}

/// A pooled TCP socket
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    target: String,
}

impl TcpConnection {
    /// The `host:port` this socket was opened to
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get a reference to the stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Get a mutable reference to the stream
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

#[async_trait]
impl RawConnection for TcpConnection {
    /// Non-blocking peek: EOF means the peer went away.
    ///
    /// The peek never blocks, so `timeout` is not consulted here; the pool
    /// bounds the whole check with it.
    async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
        let socket = socket2::SockRef::from(&self.stream);
        let mut buf = [MaybeUninit::<u8>::uninit(); 1];
        match socket.peek(&mut buf) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::BrokenPipe
                        | io::ErrorKind::NotConnected
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(e).with_context(|| format!("Liveness check on {} failed", self.target)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .shutdown()
            .await
            .with_context(|| format!("Failed to close connection to {}", self.target))
    }
}
