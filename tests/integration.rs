use std::time::Duration;

use ntpclock::{ClientConfig, NtpClient};

#[tokio::test]
async fn test_query_invalid_host() {
    let client = NtpClient::new(
        ClientConfig::default()
            .with_host("no.such.domain.invalid")
            .with_timeout(Duration::from_secs(1)),
    );
    let err = client.query().await.expect_err("expected error");
    assert!(err.is_resolution(), "unexpected error: {err}");
}

#[cfg(feature = "network-tests")]
#[tokio::test]
async fn test_query_public_pool() {
    let client = NtpClient::new(
        ClientConfig::default()
            .with_fallbacks(["time.google.com", "time.cloudflare.com"])
            .with_timeout(Duration::from_secs(3)),
    );
    let res = client.query().await.expect("public pool reachable");
    assert!(client.servers().contains(&res.used_server.as_str()));
    assert!(res.packet.header.stratum >= 1);
}
