//! DCS-BIOS import socket.
//!
//! DCS-BIOS accepts plain-text commands (`<CONTROL> <ARGUMENT>\n`) as UDP
//! datagrams on its import port.

use super::{Upstream, UpstreamError};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Default DCS-BIOS import address.
pub const DEFAULT_IMPORT_ADDRESS: &str = "127.0.0.1:7778";

/// Upstream that sends each command as one UDP datagram.
#[derive(Debug)]
pub struct UdpUpstream {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpUpstream {
    /// Bind an ephemeral local socket that sends to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` is not a socket address or binding fails.
    pub async fn bind(target: &str) -> Result<Self, UpstreamError> {
        let target: SocketAddr = target
            .parse()
            .map_err(|_| UpstreamError::InvalidAddress(target.to_string()))?;

        let local = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).await?;

        tracing::debug!("Upstream socket bound (target: {})", target);
        Ok(Self { socket, target })
    }

    /// Address commands are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl Upstream for UdpUpstream {
    async fn send_raw(&self, payload: &str) -> Result<(), UpstreamError> {
        let mut datagram = payload.to_string();
        if !datagram.ends_with('\n') {
            datagram.push('\n');
        }

        let sent = self.socket.send_to(datagram.as_bytes(), self.target).await?;
        if sent != datagram.len() {
            return Err(UpstreamError::SendFailed(format!(
                "short write: {} of {} bytes",
                sent,
                datagram.len()
            )));
        }
        Ok(())
    }
}
