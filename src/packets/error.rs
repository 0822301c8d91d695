use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketParseError {
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("Not a control packet, signature {0:#06X}")]
    BadSignature(u16),
    #[error("Unknown control command {0:#06X}")]
    UnknownCommand(u16),
    #[error("Not an RTP-MIDI packet, header bytes {vpxcc:#04X} {mpayload:#04X}")]
    NotMidiPacket { vpxcc: u8, mpayload: u8 },
    #[error("Delta time runs past the end of the command list")]
    TruncatedDeltaTime,
    #[error("Data byte without a running status")]
    MissingRunningStatus,
    #[error("Unsupported MIDI status {0:#04X}")]
    UnsupportedStatus(u8),
    #[error("Command with status {0:#04X} is truncated")]
    TruncatedCommand(u8),
    #[error("System exclusive message without an end byte")]
    UnterminatedSysEx,
}
