//! End-to-end fan-in test: three independent drives answered by real UDP
//! loopback sockets, driven entirely through the public `Controller` API.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use manipulator::codec::{CommandParameter, ParamType, ResponseDescriptor};
use manipulator::drive::{Drive, DriveConfig};
use manipulator::transport::Transport;
use manipulator::Controller;

/// A minimal stand-in servo drive: answers whatever response fields the
/// request asked for with fixed values, for a bounded number of requests,
/// then exits.
fn mock_drive(ip: Ipv4Addr, requests: usize) -> JoinHandle<()> {
    let socket = UdpSocket::bind(SocketAddrV4::new(ip, manipulator::transport::DRIVE_PORT)).unwrap();
    thread::spawn(move || {
        let mut buf = [0u8; 64];
        for _ in 0..requests {
            let (_, from) = socket.recv_from(&mut buf).unwrap();
            let response_def = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
            let rd = ResponseDescriptor::from_bits_truncate(response_def);

            let mut out = vec![0u8; 4];
            out.extend(response_def.to_le_bytes());
            if rd.contains(ResponseDescriptor::STATUS_WORD) {
                out.extend(0u16.to_le_bytes());
            }
            if rd.contains(ResponseDescriptor::STATE_VAR) {
                out.extend([0x00u8, 8u8]);
            }
            if rd.contains(ResponseDescriptor::ACTUAL_POS) {
                out.extend(500_000i32.to_le_bytes());
            }
            if rd.contains(ResponseDescriptor::DEMAND_POS) {
                out.extend(500_000i32.to_le_bytes());
            }
            if rd.contains(ResponseDescriptor::CURRENT) {
                out.extend(0i16.to_le_bytes());
            }
            if rd.contains(ResponseDescriptor::WARN_WORD) {
                out.extend(0u16.to_le_bytes());
            }
            if rd.contains(ResponseDescriptor::ERROR_CODE) {
                out.extend(0u16.to_le_bytes());
            }
            if rd.contains(ResponseDescriptor::MONITORING_CHANNEL) {
                let mut channel = [0u8; 16];
                channel[0..4].copy_from_slice(&100_000i32.to_le_bytes());
                out.extend(channel);
            }

            socket.send_to(&out, from).unwrap();
        }
    })
}

fn drive_config(ip: Ipv4Addr, name: &str) -> DriveConfig {
    DriveConfig {
        ip,
        name: name.to_string(),
        min_position: Some(0.0),
        max_position: Some(0.2),
        monitoring_channel_parameters: [
            Some(CommandParameter::new("velocity", "m/s", 1e6, ParamType::Sint32)),
            None,
            None,
            None,
        ],
        response_timeout: Duration::from_millis(200),
        max_send_attempts: 2,
    }
}

#[test]
fn go_to_pos_waits_for_every_drive_before_returning() {
    let ips = [Ipv4Addr::new(127, 0, 0, 41), Ipv4Addr::new(127, 0, 0, 42), Ipv4Addr::new(127, 0, 0, 43)];
    // Each drive answers one internal MC_count query plus the go_to_pos
    // motion command itself.
    let mocks: Vec<_> = ips.iter().map(|&ip| mock_drive(ip, 2)).collect();

    let transport = Transport::bind().expect("bind host transport");
    transport.spawn_listener();

    let drives: Vec<Drive> = ips
        .iter()
        .enumerate()
        .map(|(i, &ip)| Drive::spawn(drive_config(ip, &format!("DRIVE_{i}")), transport.clone()))
        .collect();

    let controller = Controller::new(drives);
    let results = controller
        .go_to_pos(&[0.05, 0.05, 0.05], &[0.02, 0.02, 0.02], &[1.0, 1.0, 1.0])
        .expect("all three drives should answer");

    assert_eq!(results.len(), 3);
    for (position, velocity) in results {
        assert_eq!(position, 0.05);
        assert_eq!(velocity, 0.1);
    }

    for mock in mocks {
        mock.join().unwrap();
    }
}
