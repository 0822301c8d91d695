use std::io;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Level, event, instrument};

use super::MAX_UDP_PACKET_SIZE;
use crate::net::DatagramSocket;
use crate::packets::control_packets::clock_sync_packet::SynchronizationPacket;
use crate::packets::control_packets::control_packet::{ControlCommand, ControlPacket};
use crate::packets::midi_packets::midi_packet::MidiPacket;

/// Sync packets the host may send before the next round collects them.
pub(super) const SYNC_QUEUE_SIZE: usize = 8;

/// Control traffic on the MIDI port, handed to the syncer.
#[derive(Debug)]
pub(super) enum SyncMessage {
    Sync(SynchronizationPacket),
    EndSession,
    Unexpected(u16),
}

/// Owns the receive side of the MIDI socket for the rest of the session.
///
/// Clock sync packets and a host BY go to the syncer, MIDI data goes to every subscriber.
#[instrument(name = "MIDI", skip_all)]
pub(super) async fn listen_midi_channel(
    socket: Arc<dyn DatagramSocket>,
    sync_tx: mpsc::Sender<SyncMessage>,
    midi_tx: broadcast::Sender<MidiPacket>,
    cancel_token: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_UDP_PACKET_SIZE];
    loop {
        let recv = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            recv = socket.recv_from(&mut buf) => recv,
        };

        let (amt, src) = match recv {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => {
                event!(Level::WARN, "MIDI channel receive failed: {e}");
                break;
            }
        };
        let datagram = &buf[..amt];
        event!(Level::TRACE, %src, "Received {amt} bytes");

        if !ControlPacket::is_control_packet(datagram) {
            match MidiPacket::parse(datagram) {
                Ok(packet) => {
                    event!(Level::DEBUG, %src, seq = packet.sequence_number(), "Received MIDI packet");
                    if midi_tx.send(packet).is_err() {
                        event!(Level::TRACE, "No MIDI subscribers");
                    }
                }
                Err(e) => event!(Level::WARN, %src, "Failed to parse MIDI packet: {e}"),
            }
            continue;
        }

        let message = match ControlPacket::parse(datagram) {
            Ok(ControlPacket::Sync(packet)) => SyncMessage::Sync(packet),
            Ok(ControlPacket::Exchange(packet)) if packet.command_header.is(ControlCommand::EndSession) => {
                event!(Level::INFO, %src, "Host ended the session on the MIDI channel");
                SyncMessage::EndSession
            }
            Ok(ControlPacket::Exchange(packet)) => SyncMessage::Unexpected(packet.command_header.command.get()),
            Err(e) => {
                event!(Level::WARN, %src, "Failed to parse control packet: {e}");
                continue;
            }
        };

        if let Err(e) = sync_tx.try_send(message) {
            event!(Level::DEBUG, "Dropping control packet, sync queue unavailable: {e}");
        }
    }
    event!(Level::DEBUG, "MIDI channel listener stopped");
}
