//! Mock NTP servers for engine tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;

/// How a mock server answers each request.
#[derive(Clone, Copy, Debug)]
#[allow(dead_code)]
pub enum Behavior {
    /// Valid server-mode reply with the given stratum and reference id.
    Reply { stratum: u8, reference_id: [u8; 4] },
    /// Never answers.
    Silent,
    /// Answers with a truncated packet.
    Truncated,
}

/// A running mock server and the requests it has seen.
pub struct MockServer {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockServer {
    /// Target string accepted by the client (`127.0.0.1:port`).
    pub fn target(&self) -> String {
        self.addr.to_string()
    }

    #[allow(dead_code)]
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn ntp_now() -> [u8; 8] {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    let secs = (now.as_secs() + 2_208_988_800) as u32;
    let frac = ((u64::from(now.subsec_nanos()) << 32) / 1_000_000_000) as u32;
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&secs.to_be_bytes());
    out[4..].copy_from_slice(&frac.to_be_bytes());
    out
}

/// Build a server reply to `request`.
pub fn reply_to(request: &[u8], stratum: u8, reference_id: [u8; 4]) -> [u8; 48] {
    let mut buf = [0u8; 48];
    buf[0] = 0b00_100_100;
    buf[1] = stratum;
    buf[2] = 6;
    buf[3] = 0xE9; // -23
    buf[4..8].copy_from_slice(&0x0000_0800u32.to_be_bytes());
    buf[8..12].copy_from_slice(&0x0000_1000u32.to_be_bytes());
    buf[12..16].copy_from_slice(&reference_id);
    let now = ntp_now();
    buf[16..24].copy_from_slice(&now);
    if request.len() >= 48 {
        buf[24..32].copy_from_slice(&request[40..48]);
    }
    buf[32..40].copy_from_slice(&now);
    buf[40..48].copy_from_slice(&ntp_now());
    buf
}

/// Spawn a mock server on an ephemeral loopback port.
pub async fn spawn(behavior: Behavior) -> MockServer {
    let sock = UdpSocket::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = sock.local_addr().expect("local addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let Ok((len, peer)) = sock.recv_from(&mut buf).await else {
                break;
            };
            let request = buf[..len].to_vec();
            seen.lock().unwrap().push(request.clone());
            match behavior {
                Behavior::Reply {
                    stratum,
                    reference_id,
                } => {
                    let reply = reply_to(&request, stratum, reference_id);
                    let _ = sock.send_to(&reply, peer).await;
                }
                Behavior::Silent => {}
                Behavior::Truncated => {
                    let _ = sock.send_to(&[0x24u8; 20], peer).await;
                }
            }
        }
    });

    MockServer { addr, requests }
}
