#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rtpmidi_participant::net::{DatagramSocket, NetworkInterface};
use rtpmidi_participant::packets::codec::WirePacket;
use rtpmidi_participant::packets::control_packets::clock_sync_packet::SynchronizationPacket;
use rtpmidi_participant::packets::control_packets::control_packet::{ControlCommand, ControlPacket};
use rtpmidi_participant::packets::control_packets::exchange_packet::ExchangePacket;
use tokio::sync::Notify;

pub const INITIATOR_TOKEN: u32 = 0x327b23c6;
pub const INITIATOR_SSRC: u32 = 0xa556f4da;
pub const LOCAL_SSRC: u32 = 0xdbffa3a1;

pub fn find_consecutive_ports() -> (u16, u16) {
    loop {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).unwrap();
        let port = socket.local_addr().unwrap().port();
        if port == u16::MAX {
            continue;
        }
        let next_port = port + 1;
        if let Ok(socket2) = UdpSocket::bind(("0.0.0.0", next_port)) {
            drop(socket);
            drop(socket2);
            return (port, next_port);
        }
    }
}

pub fn invitation() -> Vec<u8> {
    ExchangePacket::new(ControlCommand::Invitation, INITIATOR_TOKEN, INITIATOR_SSRC, "HOST").datagram().to_vec()
}

pub fn termination() -> Vec<u8> {
    ExchangePacket::new_termination(INITIATOR_TOKEN, INITIATOR_SSRC).datagram().to_vec()
}

pub fn clock_sync(count: u8, timestamps: [u64; 3]) -> Vec<u8> {
    SynchronizationPacket::new(count, timestamps, INITIATOR_SSRC).to_network_bytes().to_vec()
}

/// A data packet from the initiator carrying `command_list` after a short header with Z set.
pub fn midi_data(sequence_number: u16, command_list: &[u8]) -> Vec<u8> {
    let mut datagram = vec![0x80, 0x61];
    datagram.extend_from_slice(&sequence_number.to_be_bytes());
    datagram.extend_from_slice(&0u32.to_be_bytes());
    datagram.extend_from_slice(&INITIATOR_SSRC.to_be_bytes());
    datagram.push(0x20 | command_list.len() as u8);
    datagram.extend_from_slice(command_list);
    datagram
}

pub fn parse_exchange(bytes: &[u8]) -> ExchangePacket {
    match ControlPacket::parse(bytes).unwrap() {
        ControlPacket::Exchange(packet) => packet,
        other => panic!("Expected exchange packet, got {other:?}"),
    }
}

pub fn parse_sync(bytes: &[u8]) -> SynchronizationPacket {
    match ControlPacket::parse(bytes).unwrap() {
        ControlPacket::Sync(packet) => packet,
        other => panic!("Expected clock sync packet, got {other:?}"),
    }
}

/// Network whose connect outcome is fixed up front and which counts disconnects.
#[derive(Default)]
pub struct TestNetwork {
    pub fail_connect: bool,
    pub disconnects: AtomicUsize,
}

impl TestNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(TestNetwork {
            fail_connect: true,
            ..Default::default()
        })
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl NetworkInterface for TestNetwork {
    fn connect(&self) -> io::Result<()> {
        if self.fail_connect {
            return Err(io::Error::new(io::ErrorKind::NetworkUnreachable, "link down"));
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn bind_address(&self) -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }
}

/// In-memory socket fed with datagrams by the test. Everything sent is recorded.
#[derive(Default)]
pub struct ScriptedSocket {
    incoming: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    arrived: Notify,
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    bound: Mutex<Option<SocketAddr>>,
    timeout: Mutex<Option<Duration>>,
    closed: Mutex<bool>,
    failing_sends: AtomicUsize,
    fail_bind: bool,
}

impl ScriptedSocket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_bind() -> Arc<Self> {
        Arc::new(ScriptedSocket {
            fail_bind: true,
            ..Default::default()
        })
    }

    pub fn push(&self, datagram: Vec<u8>, from: SocketAddr) {
        self.incoming.lock().unwrap().push_back((datagram, from));
        self.arrived.notify_one();
    }

    /// The next `count` sends fail without reaching the peer.
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock().unwrap()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    fn pop(&self) -> Option<(Vec<u8>, SocketAddr)> {
        self.incoming.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl DatagramSocket for ScriptedSocket {
    async fn bind(&self, addr: SocketAddr) -> io::Result<()> {
        if self.fail_bind {
            return Err(io::Error::from(io::ErrorKind::AddrInUse));
        }
        *self.bound.lock().unwrap() = Some(addr);
        *self.closed.lock().unwrap() = false;
        Ok(())
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.lock().unwrap() = timeout;
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        if self.failing_sends.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        self.sent.lock().unwrap().push((buf.to_vec(), target));
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        loop {
            if let Some((datagram, from)) = self.pop() {
                buf[..datagram.len()].copy_from_slice(&datagram);
                return Ok((datagram.len(), from));
            }

            let timeout = *self.timeout.lock().unwrap();
            match timeout {
                Some(timeout) => {
                    if tokio::time::timeout(timeout, self.arrived.notified()).await.is_err() {
                        return Err(io::Error::from(io::ErrorKind::TimedOut));
                    }
                }
                None => self.arrived.notified().await,
            }
        }
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}

/// An initiator talking to a participant over loopback UDP.
pub struct FakeInitiator {
    pub control: tokio::net::UdpSocket,
    pub midi: tokio::net::UdpSocket,
    pub participant_control: SocketAddr,
    pub participant_midi: SocketAddr,
}

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(3);

impl FakeInitiator {
    pub async fn bind(control_port: u16) -> Self {
        FakeInitiator {
            control: tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap(),
            midi: tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap(),
            participant_control: SocketAddr::from((Ipv4Addr::LOCALHOST, control_port)),
            participant_midi: SocketAddr::from((Ipv4Addr::LOCALHOST, control_port + 1)),
        }
    }

    /// Invites on both channels, resending until the participant has bound its sockets.
    pub async fn invite(&self) -> (ExchangePacket, ExchangePacket) {
        let control = Self::invite_on(&self.control, self.participant_control).await;
        let midi = Self::invite_on(&self.midi, self.participant_midi).await;
        (control, midi)
    }

    async fn invite_on(socket: &tokio::net::UdpSocket, target: SocketAddr) -> ExchangePacket {
        let mut buf = [0u8; 1024];
        for _ in 0..50 {
            socket.send_to(&invitation(), target).await.unwrap();
            if let Ok(Ok((amt, _))) = tokio::time::timeout(Duration::from_millis(100), socket.recv_from(&mut buf)).await {
                return parse_exchange(&buf[..amt]);
            }
        }
        panic!("Participant never answered the invitation");
    }

    /// Plays the initiator side of one CK0/CK1/CK2 exchange and returns the participant's CK1.
    pub async fn sync_round(&self, initiator_time: u64) -> SynchronizationPacket {
        self.midi.send_to(&clock_sync(0, [initiator_time, 0, 0]), self.participant_midi).await.unwrap();
        let ck1 = loop {
            let datagram = self.recv_midi().await;
            if ControlPacket::is_control_packet(&datagram) {
                break parse_sync(&datagram);
            }
        };
        let [t0, t1, _] = ck1.timestamps();
        self.midi.send_to(&clock_sync(2, [t0, t1, initiator_time + 5]), self.participant_midi).await.unwrap();
        ck1
    }

    pub async fn send_midi(&self, datagram: &[u8]) {
        self.midi.send_to(datagram, self.participant_midi).await.unwrap();
    }

    pub async fn recv_midi(&self) -> Vec<u8> {
        Self::recv(&self.midi).await
    }

    pub async fn recv_control(&self) -> Vec<u8> {
        Self::recv(&self.control).await
    }

    async fn recv(socket: &tokio::net::UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 1024];
        let (amt, _) = tokio::time::timeout(RECEIVE_TIMEOUT, socket.recv_from(&mut buf))
            .await
            .expect("Timed out waiting for the participant")
            .unwrap();
        buf[..amt].to_vec()
    }
}
