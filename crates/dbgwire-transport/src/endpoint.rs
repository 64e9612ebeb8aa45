use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::Result;
use crate::tcp::TcpSocket;
use crate::traits::IpcStream;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Where a debugger client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Filesystem-path Unix domain socket.
    #[cfg(unix)]
    Unix(PathBuf),
    /// TCP address.
    Tcp(SocketAddr),
}

impl Endpoint {
    /// Interpret a command-line style endpoint.
    ///
    /// Anything that parses as `host:port` is TCP; everything else is a Unix
    /// socket path.
    #[cfg(unix)]
    pub fn parse(input: &str) -> Self {
        match input.parse::<SocketAddr>() {
            Ok(addr) => Self::Tcp(addr),
            Err(_) => Self::Unix(PathBuf::from(input)),
        }
    }

    /// Bind a listener on this endpoint.
    pub fn bind(&self) -> Result<EndpointListener> {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => Ok(EndpointListener::Unix(UnixDomainSocket::bind(path)?)),
            Self::Tcp(addr) => Ok(EndpointListener::Tcp(TcpSocket::bind(*addr)?)),
        }
    }

    /// Connect to a listener on this endpoint (blocking).
    pub fn connect(&self) -> Result<IpcStream> {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => UnixDomainSocket::connect(path),
            Self::Tcp(addr) => TcpSocket::connect(*addr),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "{addr}"),
        }
    }
}

/// A bound listener for either endpoint kind.
pub enum EndpointListener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpSocket),
}

impl EndpointListener {
    /// Accept the next client (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        match self {
            #[cfg(unix)]
            Self::Unix(socket) => socket.accept(),
            Self::Tcp(socket) => socket.accept(),
        }
    }

    /// The endpoint actually bound (TCP port `0` is resolved).
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            Self::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
            Self::Tcp(socket) => Endpoint::Tcp(socket.local_addr()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            #[cfg(unix)]
            Self::Unix(socket) => socket.transport_name(),
            Self::Tcp(socket) => socket.transport_name(),
        }
    }
}
