use std::time::Instant;

use super::session_identity::SessionIdentity;
use crate::error::SyncError;
use crate::packets::control_packets::clock_sync_packet::SynchronizationPacket;

/// Session clock in 100 microsecond ticks since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock { start: Instant::now() }
    }

    pub fn now(&self) -> u64 {
        (self.start.elapsed().as_micros() / 100) as u64
    }

    /// Low 32 bits of [`MonotonicClock::now`], as carried in MIDI packet headers.
    pub fn now_u32(&self) -> u32 {
        self.now() as u32
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdentity {
    /// Answers the peer's CK0 with CK1, stamping `local_timestamp` into the second slot.
    pub fn respond_to_sync(&self, packet: &SynchronizationPacket, local_timestamp: u64) -> Result<SynchronizationPacket, SyncError> {
        if packet.count != 0 {
            return Err(SyncError {
                expected: 0,
                actual: packet.count,
            });
        }

        let [initiator_timestamp, ..] = packet.timestamps();
        Ok(SynchronizationPacket::new(1, [initiator_timestamp, local_timestamp, 0], self.ssrc))
    }
}

/// The three timestamps of a completed CK0/CK1/CK2 exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSample {
    /// Peer clock when it sent CK0.
    pub initiator_sent: u64,
    /// Our clock when we answered with CK1.
    pub local_received: u64,
    /// Peer clock when CK1 arrived back.
    pub initiator_received: u64,
}

impl SyncSample {
    pub fn from_timestamps(timestamps: [u64; 3]) -> Self {
        SyncSample {
            initiator_sent: timestamps[0],
            local_received: timestamps[1],
            initiator_received: timestamps[2],
        }
    }

    pub fn round_trip(&self) -> u64 {
        self.initiator_received.saturating_sub(self.initiator_sent)
    }

    /// Estimated peer clock minus local clock, assuming a symmetric path.
    pub fn offset(&self) -> i64 {
        let peer_midpoint = self.initiator_sent as i128 + self.round_trip() as i128 / 2;
        (peer_midpoint - self.local_received as i128) as i64
    }

    pub fn latency_ms(&self) -> f32 {
        self.round_trip() as f32 / 10.0
    }
}

/// Consumes completed sync exchanges to track drift between the two clocks.
pub trait DriftCorrection: Send {
    fn observe(&mut self, sample: SyncSample);
}

/// Completes the exchange without acting on the measured offset.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDriftCorrection;

impl DriftCorrection for NoDriftCorrection {
    fn observe(&mut self, _sample: SyncSample) {}
}
