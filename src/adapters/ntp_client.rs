use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use chrono::Utc;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::NtpError;

/// Large enough for a header plus extension fields and a MAC.
const RECV_BUFFER: usize = 1024;

/// Bytes received from one UDP exchange together with the local clock
/// readings around it.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub raw: Vec<u8>,
    /// Milliseconds since the Unix epoch right before `send`.
    pub client_send_ms: f64,
    /// Milliseconds since the Unix epoch right after `recv`.
    pub client_receive_ms: f64,
}

/// Send `request` to `addr` and wait for a single reply.
///
/// No deadline is applied here; the caller races the whole attempt against
/// its timeout. The socket lives only inside this call, so it is closed on
/// success, error and when the caller drops the future.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Result<Exchange, NtpError> {
    let bind: SocketAddr = if addr.is_ipv6() {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| NtpError::Transport(format!("bind {bind}: {e}")))?;
    // Connected socket: datagrams from any other peer are discarded by the kernel.
    socket
        .connect(addr)
        .await
        .map_err(|e| NtpError::Transport(format!("connect {addr}: {e}")))?;

    let client_send_ms = now_ms();
    socket
        .send(request)
        .await
        .map_err(|e| NtpError::Transport(format!("send to {addr}: {e}")))?;

    let mut buf = vec![0u8; RECV_BUFFER];
    let len = socket
        .recv(&mut buf)
        .await
        .map_err(|e| NtpError::Transport(format!("receive from {addr}: {e}")))?;
    let client_receive_ms = now_ms();
    buf.truncate(len);
    debug!(%addr, bytes = len, "received reply");

    Ok(Exchange {
        raw: buf,
        client_send_ms,
        client_receive_ms,
    })
}

fn now_ms() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1000.0
}
