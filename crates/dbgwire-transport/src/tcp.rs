use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::IpcStream;

/// TCP transport.
///
/// Debug adapters are commonly reached over a loopback TCP port; this wraps
/// bind/accept/connect so callers get the same [`IpcStream`] as with Unix
/// domain sockets.
pub struct TcpSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpSocket {
    /// Bind and listen on a TCP address. Port `0` picks a free port.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            endpoint: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            endpoint: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        Ok(IpcStream::from_tcp(stream))
    }

    /// Connect to a listening TCP address (blocking).
    pub fn connect(addr: SocketAddr) -> Result<IpcStream> {
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            endpoint: addr.to_string(),
            source: e,
        })?;
        debug!(%addr, "connected over tcp");
        Ok(IpcStream::from_tcp(stream))
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}
