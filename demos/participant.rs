#[cfg(feature = "examples")]
#[tokio::main]
async fn main() {
    use std::time::Duration;

    use midi_types::{Channel, MidiMessage, Note, Value7};
    use rtpmidi_participant::{DEFAULT_CONTROL_PORT, RtpMidiParticipant, SessionConfig, SessionName};
    use tracing::{Level, event};
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

    let config = SessionConfig::new(SessionName::new("My Participant").expect("Name fits"), rand::random());
    let participant = RtpMidiParticipant::with_host_network(config);
    let mut received = participant.subscribe_midi();

    event!(Level::INFO, "Waiting for an invitation on port {DEFAULT_CONTROL_PORT}");
    participant
        .connect_and_sync(DEFAULT_CONTROL_PORT)
        .await
        .expect("Failed to establish RTP-MIDI session");

    let mut state = participant.subscribe_state();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let note = Note::from(60);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                event!(Level::INFO, "Stopping RTP-MIDI session gracefully");
                participant.disconnect().await;
                break;
            }
            _ = state.changed() => {
                event!(Level::INFO, state = %*state.borrow(), "Session state changed");
                if !participant.state().is_established() {
                    break;
                }
            }
            Ok(packet) = received.recv() => {
                for midi_event in packet.commands() {
                    event!(Level::INFO, delta_time = midi_event.delta_time(), "Received {:?}", midi_event.command());
                }
            }
            _ = ticker.tick() => {
                let sent = async {
                    participant.write(&MidiMessage::NoteOn(Channel::C1, note, Value7::from(100))).await?;
                    participant.write(&MidiMessage::NoteOff(Channel::C1, note, Value7::from(0))).await?;
                    participant.flush().await
                };
                if let Err(e) = sent.await {
                    event!(Level::WARN, "Error sending MIDI packet: {e}");
                }
            }
        }
    }
}

#[cfg(not(feature = "examples"))]
fn main() {
    println!("This example requires the 'examples' feature to be enabled.");
}
