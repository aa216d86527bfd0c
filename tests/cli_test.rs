use assert_cmd::Command;
use predicates::str::contains;
use std::net::UdpSocket;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// Answer `replies` requests on a loopback port with a stratum-1 "GPS" reply.
fn spawn_std_server(replies: usize) -> String {
    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = sock.local_addr().unwrap();
    thread::spawn(move || {
        let mut buf = [0u8; 512];
        for _ in 0..replies {
            let Ok((len, peer)) = sock.recv_from(&mut buf) else {
                return;
            };
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
            let secs = ((now.as_secs() + 2_208_988_800) as u32).to_be_bytes();
            let frac = (((u64::from(now.subsec_nanos()) << 32) / 1_000_000_000) as u32)
                .to_be_bytes();
            let mut reply = [0u8; 48];
            reply[0] = 0x24;
            reply[1] = 1;
            reply[3] = 0xEC;
            reply[12..16].copy_from_slice(b"GPS\0");
            if len >= 48 {
                reply[24..32].copy_from_slice(&buf[40..48]);
            }
            for off in [16usize, 32, 40] {
                reply[off..off + 4].copy_from_slice(&secs);
                reply[off + 4..off + 8].copy_from_slice(&frac);
            }
            let _ = sock.send_to(&reply, peer);
        }
    });
    addr.to_string()
}

#[cfg(feature = "network-tests")]
#[test]
fn test_positional_argument_as_server() {
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    cmd.arg("--nocolor")
        .arg("pool.ntp.org")
        .assert()
        .success()
        .stdout(contains("Server:"));
}

#[test]
fn test_text_output_against_local_server() {
    let target = spawn_std_server(1);
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    cmd.arg("--nocolor")
        .arg(&target)
        .assert()
        .success()
        .stdout(contains("Server: 127.0.0.1"))
        .stdout(contains("Stratum: 1"))
        .stdout(contains("Precision: 2^-20"));
}

#[cfg(feature = "json")]
#[test]
fn test_json_output_against_local_server() {
    let target = spawn_std_server(1);
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    let out = cmd.arg("--json").arg(&target).assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(v["server"]["reference_id"], "GPS");
    assert_eq!(v["server"]["hostname"], target.as_str());
}

#[test]
fn test_offset_only_output_is_numeric() {
    let target = spawn_std_server(1);
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    let out = cmd.arg("--offset").arg(&target).assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let offset: f64 = stdout.trim().parse().expect("numeric offset");
    assert!(offset.abs() < 1.0, "offset {offset}");
}

#[test]
fn test_fallback_flag_reaches_second_server() {
    let dead = UdpSocket::bind("127.0.0.1:0").unwrap();
    let target = spawn_std_server(1);
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    cmd.arg("--nocolor")
        .args(["--timeout", "0.3"])
        .arg(dead.local_addr().unwrap().to_string())
        .args(["--fallback", target.as_str()])
        .assert()
        .success()
        .stdout(contains(format!("({target}, v4)")));
}

#[test]
fn test_unreachable_server_fails_with_error_line() {
    let dead = UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    cmd.arg("--nocolor")
        .args(["--timeout", "0.2"])
        .arg(dead.local_addr().unwrap().to_string())
        .assert()
        .code(3)
        .stdout(contains("Error:"));
}

#[test]
fn test_invalid_target_exits_2() {
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    cmd.arg("--nocolor")
        .arg("host:99999")
        .assert()
        .code(2)
        .stdout(contains("Error:"));
}

#[test]
fn test_interval_requires_repetition() {
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    cmd.arg("--nocolor")
        .args(["--interval", "2", "127.0.0.1"])
        .assert()
        .code(2);
}

#[test]
fn test_monitoring_prints_stats() {
    let target = spawn_std_server(3);
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    cmd.arg("--nocolor")
        .args(["--count", "3", "--interval", "0.05", target.as_str()])
        .assert()
        .success()
        .stdout(contains("count 3"));
}

#[test]
fn test_out_of_range_timeout_exits_2() {
    for bad in ["1e20", "0", "NaN"] {
        let mut cmd = Command::cargo_bin("ntpclock").unwrap();
        cmd.arg("--nocolor")
            .args(["--timeout", bad, "127.0.0.1"])
            .assert()
            .code(2)
            .stdout(contains("invalid --timeout"));
    }
}

#[test]
fn test_out_of_range_interval_exits_2() {
    let mut cmd = Command::cargo_bin("ntpclock").unwrap();
    cmd.arg("--nocolor")
        .args(["--count", "2", "--interval", "1e300", "127.0.0.1"])
        .assert()
        .code(2)
        .stdout(contains("invalid --interval"));
}
