use std::fmt;

use super::session_identity::SessionIdentity;
use crate::error::CommandError;
use crate::packets::control_packets::control_packet::ControlCommand;
use crate::packets::control_packets::exchange_packet::ExchangePacket;

/// Where a participant is on the way to an established session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    NetworkConnecting,
    AwaitingControlInvitation,
    AwaitingMidiInvitation,
    Established,
}

impl SessionState {
    pub fn is_established(&self) -> bool {
        *self == SessionState::Established
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::NetworkConnecting => "connecting network",
            SessionState::AwaitingControlInvitation => "awaiting control invitation",
            SessionState::AwaitingMidiInvitation => "awaiting MIDI invitation",
            SessionState::Established => "established",
        };
        f.write_str(state)
    }
}

impl SessionIdentity {
    /// Builds the acceptance for a peer's invitation. Performs no I/O.
    pub fn accept_invitation(&self, invitation: &ExchangePacket) -> Result<ExchangePacket, CommandError> {
        if !invitation.command_header.is(ControlCommand::Invitation) {
            return Err(CommandError {
                expected: ControlCommand::Invitation,
                actual: invitation.command_header.command.get(),
            });
        }

        Ok(ExchangePacket::new(
            ControlCommand::AcceptInvitation,
            invitation.initiator_token.get(),
            self.ssrc,
            self.name.as_str(),
        ))
    }
}
