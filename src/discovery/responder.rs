//! Discovery responder
//!
//! Listens on the SSDP port and answers `M-SEARCH` discovery requests with
//! one advertisement per registered device, sent unicast to the requester.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use super::ssdp::{self, SsdpMessage};
use crate::config::{Config, SSDP_PORT};
use crate::registry::DeviceRegistry;
use crate::shutdown::wait_for_shutdown;
use crate::{Error, Result};

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 8192;

/// Lifecycle of the discovery socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    Stopped,
    Binding,
    Listening,
}

/// Socket settings for the responder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Local address the UDP socket binds to
    pub listen: SocketAddrV4,
    /// Multicast group to join
    pub multicast_ip: Ipv4Addr,
    /// Interface address used for the group membership
    pub interface: Ipv4Addr,
}

impl DiscoveryConfig {
    /// Derive socket settings from the emulator configuration
    ///
    /// The socket always binds the wildcard address so multicast traffic is
    /// received; the configured bind address selects the interface.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            listen: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.discovery_port),
            multicast_ip: config.multicast_ip,
            interface: config.bind,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SSDP_PORT),
            multicast_ip: crate::config::DEFAULT_MULTICAST_IP,
            interface: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Answers SSDP discovery for every registered device
pub struct DiscoveryResponder {
    registry: Arc<DeviceRegistry>,
    config: DiscoveryConfig,
    state: watch::Sender<ResponderState>,
}

impl DiscoveryResponder {
    /// Create a stopped responder
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>, config: DiscoveryConfig) -> Self {
        let (state, _) = watch::channel(ResponderState::Stopped);
        Self {
            registry,
            config,
            state,
        }
    }

    /// Observe lifecycle transitions
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ResponderState> {
        self.state.subscribe()
    }

    /// Bind the socket and join the multicast group
    ///
    /// A failed group join is logged and the socket keeps serving unicast
    /// searches.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the socket cannot be bound
    pub fn bind(&self) -> Result<UdpSocket> {
        self.state.send_replace(ResponderState::Binding);

        let socket = match open_socket(self.config.listen) {
            Ok(socket) => socket,
            Err(e) => {
                self.state.send_replace(ResponderState::Stopped);
                tracing::error!(
                    addr = %self.config.listen,
                    error = %e,
                    "failed to bind discovery socket"
                );
                return Err(Error::Transport(format!(
                    "failed to bind discovery socket {}: {e}",
                    self.config.listen
                )));
            }
        };

        if let Err(e) = socket.join_multicast_v4(self.config.multicast_ip, self.config.interface) {
            tracing::warn!(
                group = %self.config.multicast_ip,
                interface = %self.config.interface,
                error = %e,
                "failed to join multicast group"
            );
        }

        self.state.send_replace(ResponderState::Listening);
        tracing::debug!(addr = %self.config.listen, "discovery listening");
        Ok(socket)
    }

    /// Serve discovery requests until shutdown or a socket error
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` on a socket error; the socket is closed
    /// and not reopened
    pub async fn serve(
        &self,
        socket: UdpSocket,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        let result = loop {
            tokio::select! {
                () = wait_for_shutdown(&mut shutdown) => break Ok(()),
                received = socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(r) => r,
                        Err(e) => break Err(e),
                    };
                    if let Err(e) = self.respond(&socket, &buf[..len], peer).await {
                        break Err(e);
                    }
                }
            }
        };

        drop(socket);
        self.finish(result)
    }

    /// Record the end of the serve loop
    fn finish(&self, result: std::io::Result<()>) -> Result<()> {
        self.state.send_replace(ResponderState::Stopped);
        match result {
            Ok(()) => {
                tracing::debug!("discovery stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "discovery socket error");
                Err(Error::Transport(format!("discovery socket error: {e}")))
            }
        }
    }

    /// Bind and serve until shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` on bind or socket failure
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let socket = self.bind()?;
        self.serve(socket, shutdown).await
    }

    async fn respond(
        &self,
        socket: &UdpSocket,
        datagram: &[u8],
        peer: SocketAddr,
    ) -> std::io::Result<()> {
        let advertisements = advertisements_for(datagram, &self.registry);
        if advertisements.is_empty() {
            return Ok(());
        }

        tracing::debug!(%peer, devices = advertisements.len(), "responding to discovery");
        for ad in advertisements {
            socket.send_to(ad, peer).await?;
        }
        Ok(())
    }
}

/// Advertisements to send in reply to one datagram
///
/// Non-discovery datagrams get no reply; `NOTIFY` announcements are accepted
/// and ignored.
#[must_use]
pub fn advertisements_for<'a>(datagram: &[u8], registry: &'a DeviceRegistry) -> Vec<&'a [u8]> {
    match ssdp::parse(datagram) {
        msg @ SsdpMessage::Search(_) if msg.is_discover() => {
            registry.iter().map(|d| d.advertisement.as_slice()).collect()
        }
        SsdpMessage::Search(_) => {
            tracing::debug!("ignoring search without ssdp:discover");
            Vec::new()
        }
        SsdpMessage::Notify => Vec::new(),
        SsdpMessage::Other => {
            tracing::debug!(len = datagram.len(), "ignoring unrecognized datagram");
            Vec::new()
        }
    }
}

/// Open a reusable, non-blocking UDP socket
fn open_socket(addr: SocketAddrV4) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::V4(addr).into())?;
    UdpSocket::from_std(socket.into())
}
