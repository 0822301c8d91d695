use std::io;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event, instrument};

use super::MAX_UDP_PACKET_SIZE;
use super::clock_sync::{DriftCorrection, MonotonicClock, NoDriftCorrection};
use super::config::SessionConfig;
use super::handshake::SessionState;
use super::host_syncer::{HostSyncer, SharedDriftCorrection};
use super::mdns::{MdnsAdvertisement, advertise_mdns};
use super::midi_channel::{SYNC_QUEUE_SIZE, listen_midi_channel};
use super::midi_transport::MidiTransport;
use super::scheduler::PeriodicTask;
use super::session_identity::SessionIdentity;
use crate::error::{CommandError, ConnectError, RtpMidiError};
use crate::net::{DatagramSocket, HostNetwork, NetworkInterface, TokioDatagramSocket};
use crate::packets::control_packets::control_packet::{ControlCommand, ControlPacket};
use crate::packets::control_packets::exchange_packet::ExchangePacket;
use crate::packets::midi_packets::midi_command::MidiCommand;
use crate::packets::midi_packets::midi_packet::MidiPacket;

/// The initiator we accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub name: String,
    pub ssrc: u32,
    pub initiator_token: u32,
    pub control_addr: SocketAddr,
    pub midi_addr: SocketAddr,
}

/// Resources owned for the whole participant lifetime, shared with the background tasks.
struct SessionResources {
    network: Box<dyn NetworkInterface>,
    control_socket: Arc<dyn DatagramSocket>,
    midi_socket: Arc<dyn DatagramSocket>,
    state: watch::Sender<SessionState>,
}

impl SessionResources {
    fn set_state(&self, state: SessionState) {
        event!(Level::DEBUG, %state, "Session state changed");
        self.state.send_replace(state);
    }

    /// Releases both sockets and the network. Safe to call more than once.
    fn teardown(&self) {
        if self.state.send_replace(SessionState::Disconnected) == SessionState::Disconnected {
            return;
        }
        self.control_socket.close();
        self.midi_socket.close();
        self.network.disconnect();
        event!(Level::INFO, "Session resources released");
    }
}

/// Tears everything down again unless the attempt got to the end, including when the
/// `connect_and_sync` future is dropped halfway.
struct ConnectAttempt<'a> {
    resources: &'a SessionResources,
    established: bool,
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.established {
            self.resources.teardown();
        }
    }
}

struct SessionContext {
    peer: PeerInfo,
    transport: Arc<MidiTransport>,
    cancel_token: CancellationToken,
    _sync_task: PeriodicTask,
    _control_watcher: JoinHandle<()>,
    _midi_listener: JoinHandle<()>,
    _mdns: Option<MdnsAdvertisement>,
}

/// An RTP-MIDI participant that accepts a single initiator.
///
/// [`RtpMidiParticipant::connect_and_sync`] binds the control port and the MIDI port right above
/// it, answers one invitation on each, completes the initial clock sync burst and then keeps
/// answering the host's sync exchanges in the background. MIDI goes out through
/// [`RtpMidiParticipant::write`] and [`RtpMidiParticipant::flush`], and MIDI from the host
/// arrives on [`RtpMidiParticipant::subscribe_midi`].
///
/// Dropping the participant cancels the background work, closes both sockets and disconnects the
/// network.
pub struct RtpMidiParticipant {
    config: SessionConfig,
    identity: Arc<SessionIdentity>,
    clock: MonotonicClock,
    resources: Arc<SessionResources>,
    drift: SharedDriftCorrection,
    midi_events: broadcast::Sender<MidiPacket>,
    session_ctx: Mutex<Option<SessionContext>>,
}

impl RtpMidiParticipant {
    pub fn new(
        config: SessionConfig,
        network: impl NetworkInterface + 'static,
        control_socket: impl DatagramSocket + 'static,
        midi_socket: impl DatagramSocket + 'static,
    ) -> Self {
        let identity = Arc::new(SessionIdentity::new(config.ssrc, config.name.clone()));
        let (state, _) = watch::channel(SessionState::Disconnected);
        let (midi_events, _) = broadcast::channel(config.inbound_midi_capacity.max(1));
        RtpMidiParticipant {
            config,
            identity,
            clock: MonotonicClock::new(),
            resources: Arc::new(SessionResources {
                network: Box::new(network),
                control_socket: Arc::new(control_socket),
                midi_socket: Arc::new(midi_socket),
                state,
            }),
            drift: Arc::new(Mutex::new(Box::new(NoDriftCorrection))),
            midi_events,
            session_ctx: Mutex::new(None),
        }
    }

    /// A participant on the host's network stack using tokio UDP sockets.
    pub fn with_host_network(config: SessionConfig) -> Self {
        Self::new(config, HostNetwork, TokioDatagramSocket::new(), TokioDatagramSocket::new())
    }

    pub fn with_drift_correction(mut self, drift: impl DriftCorrection + 'static) -> Self {
        self.drift = Arc::new(Mutex::new(Box::new(drift)));
        self
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        *self.resources.state.borrow()
    }

    /// Observes state changes, including the host ending the session.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.resources.state.subscribe()
    }

    /// MIDI packets the host sends, from the next one received on. Works before connecting and
    /// across reconnects.
    pub fn subscribe_midi(&self) -> broadcast::Receiver<MidiPacket> {
        self.midi_events.subscribe()
    }

    /// The accepted initiator while the session is established. Waits for a
    /// [`RtpMidiParticipant::connect_and_sync`] in progress to return first.
    pub async fn peer(&self) -> Option<PeerInfo> {
        let session_ctx = self.session_ctx.lock().await;
        session_ctx.as_ref().filter(|_| self.state() == SessionState::Established).map(|ctx| ctx.peer.clone())
    }

    /// Brings the session up on `control_port` and `control_port + 1`.
    ///
    /// Returns once both invitations are accepted and the initial sync burst is done. On any
    /// failure, or when the returned future is dropped before it completes, the sockets and the
    /// network are released again and the participant is back to
    /// [`SessionState::Disconnected`]. Nothing is retried.
    #[instrument(skip_all, fields(name = %self.identity.name, ssrc = self.identity.ssrc, control_port = control_port))]
    pub async fn connect_and_sync(&self, control_port: u16) -> Result<(), RtpMidiError> {
        let mut session_ctx = self.session_ctx.lock().await;
        if self.state() != SessionState::Disconnected {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "Session already started").into());
        }
        // left behind when the host ended the previous session
        session_ctx.take();

        let mut attempt = ConnectAttempt {
            resources: &self.resources,
            established: false,
        };
        match self.establish(control_port).await {
            Ok(ctx) => {
                event!(Level::INFO, peer = %ctx.peer.name, "Session established");
                attempt.established = true;
                *session_ctx = Some(ctx);
                Ok(())
            }
            Err(e) => {
                event!(Level::WARN, "Failed to establish session: {e}");
                Err(e)
            }
        }
    }

    async fn establish(&self, control_port: u16) -> Result<SessionContext, RtpMidiError> {
        let midi_port = control_port.checked_add(1).ok_or(ConnectError::PortOutOfRange(control_port))?;
        let resources = &self.resources;

        resources.set_state(SessionState::NetworkConnecting);
        resources.network.connect().map_err(ConnectError::Network)?;

        let ip = resources.network.bind_address();
        resources
            .control_socket
            .bind(SocketAddr::new(ip, control_port))
            .await
            .map_err(|source| ConnectError::ControlSocket { port: control_port, source })?;
        resources
            .midi_socket
            .bind(SocketAddr::new(ip, midi_port))
            .await
            .map_err(|source| ConnectError::MidiSocket { port: midi_port, source })?;
        event!(Level::INFO, "Listening on control port {control_port}, MIDI port {midi_port}");

        // withdrawn again when establishing fails
        let mdns = match advertise_mdns(self.identity.name.as_str(), control_port) {
            Ok(advertisement) => Some(advertisement),
            Err(e) => {
                event!(Level::WARN, "Failed to advertise session: {e}");
                None
            }
        };

        resources.control_socket.set_timeout(self.config.handshake_timeout);
        resources.midi_socket.set_timeout(self.config.handshake_timeout);

        resources.set_state(SessionState::AwaitingControlInvitation);
        let (control_invitation, control_addr) = self.answer_invitation(&resources.control_socket, "control").await?;
        resources.set_state(SessionState::AwaitingMidiInvitation);
        let (midi_invitation, midi_addr) = self.answer_invitation(&resources.midi_socket, "MIDI").await?;

        if control_invitation.initiator_token != midi_invitation.initiator_token {
            event!(
                Level::WARN,
                control_token = control_invitation.initiator_token.get(),
                midi_token = midi_invitation.initiator_token.get(),
                "Invitation tokens differ between channels"
            );
        }

        // both listeners wait indefinitely, sync rounds time out on their own
        resources.control_socket.set_timeout(None);
        resources.midi_socket.set_timeout(None);

        let cancel_token = CancellationToken::new();
        let cancel_on_failure = cancel_token.clone().drop_guard();
        let (sync_tx, sync_rx) = mpsc::channel(SYNC_QUEUE_SIZE);
        let midi_listener = tokio::spawn(listen_midi_channel(
            resources.midi_socket.clone(),
            sync_tx,
            self.midi_events.clone(),
            cancel_token.clone(),
        ));

        let peer = PeerInfo {
            name: control_invitation.name().into_owned(),
            ssrc: control_invitation.sender_ssrc.get(),
            initiator_token: control_invitation.initiator_token.get(),
            control_addr,
            midi_addr,
        };

        let transport = Arc::new(MidiTransport::new(
            resources.midi_socket.clone(),
            midi_addr,
            self.identity.ssrc,
            self.clock,
            self.config.command_list_length,
        ));
        let syncer = HostSyncer::new(
            self.identity.clone(),
            self.clock,
            sync_rx,
            self.config.sync_receive_timeout,
            transport.clone(),
            self.drift.clone(),
        );
        syncer.initial_burst(self.config.initial_sync_rounds).await?;

        cancel_on_failure.disarm();
        resources.set_state(SessionState::Established);

        let control_watcher = tokio::spawn(watch_control_channel(resources.clone(), peer.ssrc, cancel_token.clone()));
        let sync_task = spawn_periodic_sync(syncer, resources.clone(), self.config.sync_interval, cancel_token.clone());

        Ok(SessionContext {
            peer,
            transport,
            cancel_token,
            _sync_task: sync_task,
            _control_watcher: control_watcher,
            _midi_listener: midi_listener,
            _mdns: mdns,
        })
    }

    /// Waits for exactly one invitation on `socket` and accepts it.
    #[instrument(skip_all, fields(channel = channel, src))]
    async fn answer_invitation(&self, socket: &Arc<dyn DatagramSocket>, channel: &'static str) -> Result<(ExchangePacket, SocketAddr), RtpMidiError> {
        let mut buf = vec![0u8; MAX_UDP_PACKET_SIZE];
        let (amt, src) = socket.recv_from(&mut buf).await.map_err(|source| ConnectError::Handshake { channel, source })?;
        tracing::Span::current().record("src", src.to_string());
        event!(Level::TRACE, "Received {amt} bytes");

        let invitation = match ControlPacket::parse(&buf[..amt])? {
            ControlPacket::Exchange(packet) => packet,
            ControlPacket::Sync(packet) => {
                return Err(CommandError {
                    expected: ControlCommand::Invitation,
                    actual: packet.command_header.command.get(),
                }
                .into());
            }
        };

        let response = self.identity.accept_invitation(&invitation)?;
        socket
            .send_to(response.datagram(), src)
            .await
            .map_err(|source| ConnectError::Handshake { channel, source })?;
        event!(Level::INFO, peer = %invitation.name(), "Accepted {channel} invitation");

        Ok((invitation, src))
    }

    /// Buffers one MIDI command for the host.
    pub async fn write(&self, command: &impl MidiCommand) -> Result<(), RtpMidiError> {
        self.transport().await?.write(command).await
    }

    /// Sends everything buffered by [`RtpMidiParticipant::write`] as one packet.
    pub async fn flush(&self) -> Result<(), RtpMidiError> {
        self.transport().await?.flush().await
    }

    async fn transport(&self) -> Result<Arc<MidiTransport>, RtpMidiError> {
        if self.state() != SessionState::Established {
            return Err(RtpMidiError::NotConnected);
        }
        let session_ctx = self.session_ctx.lock().await;
        session_ctx.as_ref().map(|ctx| ctx.transport.clone()).ok_or(RtpMidiError::NotConnected)
    }

    /// Tells the host we are leaving, then releases everything [`Drop`] would.
    ///
    /// A [`RtpMidiParticipant::connect_and_sync`] in progress holds the session until it returns,
    /// so this waits for it. Drop that future instead to abandon a pending handshake.
    #[instrument(skip_all, fields(name = %self.identity.name))]
    pub async fn disconnect(&self) {
        let Some(ctx) = self.session_ctx.lock().await.take() else {
            self.resources.teardown();
            return;
        };

        if self.state() == SessionState::Established {
            let termination = ExchangePacket::new_termination(ctx.peer.initiator_token, self.identity.ssrc);
            match self.resources.control_socket.send_to(termination.datagram(), ctx.peer.control_addr).await {
                Ok(_) => event!(Level::INFO, "Sent termination packet"),
                Err(e) => event!(Level::WARN, "Failed to send termination packet: {e}"),
            }
        }

        ctx.cancel_token.cancel();
        self.resources.teardown();
    }
}

impl Drop for RtpMidiParticipant {
    fn drop(&mut self) {
        if let Some(ctx) = self.session_ctx.get_mut().take() {
            ctx.cancel_token.cancel();
        }
        self.resources.teardown();
    }
}

fn end_session(resources: &SessionResources, cancel_token: &CancellationToken) {
    cancel_token.cancel();
    resources.teardown();
}

fn spawn_periodic_sync(syncer: HostSyncer, resources: Arc<SessionResources>, interval: Duration, cancel_token: CancellationToken) -> PeriodicTask {
    let token = cancel_token.clone();
    PeriodicTask::spawn(interval, cancel_token, move || {
        let syncer = syncer.clone();
        let resources = resources.clone();
        let token = token.clone();
        async move {
            match syncer.sync_round().await {
                Ok(_) => ControlFlow::Continue(()),
                Err(RtpMidiError::SessionEnded) => {
                    end_session(&resources, &token);
                    ControlFlow::Break(())
                }
                Err(e) if e.is_transient() => {
                    event!(Level::DEBUG, "Missed periodic clock sync: {e}");
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    event!(Level::WARN, "Periodic clock sync failed: {e}");
                    ControlFlow::Continue(())
                }
            }
        }
    })
}

/// Listens on the control channel for the host ending the session.
#[instrument(name = "CTRL", skip_all, fields(peer_ssrc = peer_ssrc))]
async fn watch_control_channel(resources: Arc<SessionResources>, peer_ssrc: u32, cancel_token: CancellationToken) {
    let mut buf = vec![0u8; MAX_UDP_PACKET_SIZE];
    loop {
        let recv = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            recv = resources.control_socket.recv_from(&mut buf) => recv,
        };

        let (amt, src) = match recv {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => {
                event!(Level::WARN, "Control channel receive failed: {e}");
                break;
            }
        };

        match ControlPacket::parse(&buf[..amt]) {
            Ok(ControlPacket::Exchange(packet)) if packet.command_header.is(ControlCommand::EndSession) => {
                if packet.sender_ssrc.get() != peer_ssrc {
                    event!(Level::WARN, %src, ssrc = packet.sender_ssrc.get(), "Ignoring termination from unknown sender");
                    continue;
                }
                event!(Level::INFO, %src, "Host ended the session");
                end_session(&resources, &cancel_token);
                break;
            }
            Ok(packet) => {
                event!(Level::DEBUG, %src, "Ignoring control packet {:?}", packet.header());
            }
            Err(e) => {
                event!(Level::WARN, %src, "Failed to parse control packet: {e}");
            }
        }
    }
    event!(Level::DEBUG, "Control watcher stopped");
}
