use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tracing::{Level, event, instrument};

use super::clock_sync::{DriftCorrection, MonotonicClock, SyncSample};
use super::midi_channel::SyncMessage;
use super::midi_transport::MidiTransport;
use super::session_identity::SessionIdentity;
use crate::error::{CommandError, RtpMidiError, SyncError};
use crate::packets::codec::WirePacket;
use crate::packets::control_packets::clock_sync_packet::SynchronizationPacket;
use crate::packets::control_packets::control_packet::ControlCommand;

pub(crate) type SharedDriftCorrection = Arc<Mutex<Box<dyn DriftCorrection>>>;

/// Answers the host's clock synchronization exchanges on the MIDI channel.
#[derive(Clone)]
pub(super) struct HostSyncer {
    identity: Arc<SessionIdentity>,
    clock: MonotonicClock,
    sync_rx: Arc<Mutex<mpsc::Receiver<SyncMessage>>>,
    receive_timeout: Duration,
    transport: Arc<MidiTransport>,
    drift: SharedDriftCorrection,
}

impl HostSyncer {
    pub fn new(
        identity: Arc<SessionIdentity>,
        clock: MonotonicClock,
        sync_rx: mpsc::Receiver<SyncMessage>,
        receive_timeout: Duration,
        transport: Arc<MidiTransport>,
        drift: SharedDriftCorrection,
    ) -> Self {
        HostSyncer {
            identity,
            clock,
            sync_rx: Arc::new(Mutex::new(sync_rx)),
            receive_timeout,
            transport,
            drift,
        }
    }

    /// Runs `rounds` exchanges back to back. Missed rounds are logged and skipped; socket
    /// failures and the host leaving abort the burst.
    #[instrument(skip_all, fields(rounds = rounds))]
    pub async fn initial_burst(&self, rounds: usize) -> Result<(), RtpMidiError> {
        let mut completed = 0;
        for round in 1..=rounds {
            match self.sync_round().await {
                Ok(_) => completed += 1,
                Err(e) if e.is_transient() => {
                    event!(Level::WARN, round, "Missed clock sync round: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        event!(Level::INFO, completed, "Initial clock sync finished");
        Ok(())
    }

    /// One CK0 -> CK1 -> CK2 exchange. Nothing carries over from a failed round.
    ///
    /// Rounds run on our own schedule. A CK0 the host sends between rounds waits in the queue
    /// and is answered when the next round starts, by which time the host has usually given up
    /// on it and the round times out waiting for CK2.
    #[instrument(skip_all, fields(ssrc = self.identity.ssrc))]
    pub async fn sync_round(&self) -> Result<SyncSample, RtpMidiError> {
        let ck0 = self.receive_sync().await?;
        let ck1 = self.identity.respond_to_sync(&ck0, self.clock.now())?;
        self.transport.send_control(ck1.to_network_bytes()).await?;
        event!(Level::TRACE, "Sent clock sync response");

        let ck2 = self.receive_sync().await?;
        if ck2.count != 2 {
            return Err(SyncError { expected: 2, actual: ck2.count }.into());
        }

        let sample = SyncSample::from_timestamps(ck2.timestamps());
        event!(
            Level::DEBUG,
            latency_estimate = std::format!("{}ms", sample.latency_ms()),
            offset = sample.offset(),
            "Clock sync finalized"
        );
        self.drift.lock().await.observe(sample);
        Ok(sample)
    }

    /// Waits up to the receive timeout for the next synchronization packet.
    async fn receive_sync(&self) -> Result<SynchronizationPacket, RtpMidiError> {
        let mut sync_rx = self.sync_rx.lock().await;
        let message = tokio::time::timeout(self.receive_timeout, sync_rx.recv())
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "MIDI channel listener stopped"))?;

        match message {
            SyncMessage::Sync(packet) => Ok(packet),
            SyncMessage::EndSession => Err(RtpMidiError::SessionEnded),
            SyncMessage::Unexpected(command) => Err(CommandError {
                expected: ControlCommand::ClockSync,
                actual: command,
            }
            .into()),
        }
    }
}
