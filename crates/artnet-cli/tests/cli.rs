use std::net::UdpSocket;
use std::time::Duration;

use artnet_core::packets::{ArtNetPacket, parse_packet};
use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("artnet"))
}

/// Loopback socket standing in for the network; returns it with its port.
fn sink() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind sink");
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("read timeout");
    let port = socket.local_addr().expect("sink addr").port();
    (socket, port)
}

#[test]
fn help_lists_every_subcommand() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("discover").and(contains("send-dmx")).and(contains("listen")));
    for sub in ["discover", "send-dmx", "listen"] {
        cmd().arg(sub).arg("--help").assert().success();
    }
}

#[test]
fn invalid_dmx_value_shows_error_and_hint() {
    cmd()
        .args(["send-dmx", "--port", "0", "1,2,300"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")).and(contains("300")));
}

#[test]
fn universe_out_of_range_is_rejected() {
    cmd()
        .args(["send-dmx", "--port", "0", "--universe", "16", "1"])
        .assert()
        .failure()
        .stderr(contains("universe out of range").and(contains("hint:")));
}

#[test]
fn discover_requires_an_output() {
    cmd()
        .args(["discover", "--port", "0"])
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn pretty_and_compact_conflict() {
    cmd()
        .args(["discover", "--stdout", "--pretty", "--compact"])
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn send_dmx_emits_one_frame() {
    let (sink, port) = sink();
    cmd()
        .args(["-q", "send-dmx", "--port", "0", "--broadcast", "127.0.0.1"])
        .args(["--send-port", &port.to_string()])
        .args(["--subnet", "1", "--universe", "3", "--sequence", "7", "255,128,0"])
        .assert()
        .success();

    let mut buf = [0u8; 1024];
    let (len, _) = sink.recv_from(&mut buf).expect("ArtDmx datagram");
    let Some(ArtNetPacket::Dmx(dmx)) = parse_packet(&buf[..len]).expect("decodable") else {
        panic!("expected ArtDmx");
    };
    assert_eq!(dmx.subnet_id(), 1);
    assert_eq!(dmx.universe_id(), 3);
    assert_eq!(dmx.sequence_id(), 7);
    assert_eq!(&dmx.dmx()[..3], &[255, 128, 0]);
}

#[test]
fn discover_writes_json_report() {
    let (sink, port) = sink();
    let temp = TempDir::new().expect("tempdir");
    let report = temp.path().join("out").join("nodes.json");

    cmd()
        .args(["discover", "--port", "0", "--broadcast", "127.0.0.1"])
        .args(["--send-port", &port.to_string(), "--wait-ms", "200"])
        .arg("-o")
        .arg(&report)
        .assert()
        .success()
        .stderr(contains("OK:"));

    let mut buf = [0u8; 1024];
    let (len, _) = sink.recv_from(&mut buf).expect("ArtPoll datagram");
    assert!(matches!(
        parse_packet(&buf[..len]),
        Ok(Some(ArtNetPacket::Poll(_)))
    ));

    let json: Value =
        serde_json::from_str(&std::fs::read_to_string(&report).expect("report written"))
            .expect("valid json");
    assert_eq!(json["tool"]["name"], "artnet");
    assert!(json["nodes"].as_array().expect("nodes array").is_empty());
    assert!(json["generated_at"].as_str().expect("timestamp").contains('T'));
}

#[test]
fn listen_stops_after_duration() {
    let assert = cmd()
        .args(["-q", "listen", "--port", "0", "--duration-ms", "200"])
        .assert()
        .success();
    assert!(assert.get_output().stdout.is_empty());
}
