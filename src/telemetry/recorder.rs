use std::{
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info, warn};

use crate::LaplineError;

use super::{LapSegmenter, Session, SessionStatus, Transition, codec::decode_packet};

pub const DEFAULT_PORT: u16 = 7100;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;
/// Larger than any valid datagram so oversized packets show up as a length error.
const RECV_BUFFER_SIZE: usize = 512;

/// Notifications emitted by the recorder worker as the session evolves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecorderEvent {
    SessionStarted { track_id: String },
    SessionReset { track_id: String },
    SessionRestarted { track_id: String, lap_number: u8 },
    LapStarted { lap_number: u8 },
    TrackChanged { from: String, to: String },
    Halted,
}

struct Worker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Session>,
    local_addr: SocketAddr,
}

/// Owns the telemetry socket and the background thread that fills a [`Session`].
///
/// `start` and `stop` are meant to be driven by a single owner. The session is
/// only handed out once the worker has been joined.
pub struct SessionRecorder {
    segmenter: LapSegmenter,
    poll_interval: Duration,
    events: Option<Sender<RecorderEvent>>,
    worker: Option<Worker>,
    last_status: SessionStatus,
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self {
            segmenter: LapSegmenter::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            events: None,
            worker: None,
            last_status: SessionStatus::Idle,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Forward session transitions to `events`. A dropped receiver is ignored.
    pub fn with_events(mut self, events: Sender<RecorderEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn status(&self) -> SessionStatus {
        match &self.worker {
            Some(worker) if !worker.handle.is_finished() => SessionStatus::Recording,
            Some(_) => SessionStatus::Stopped,
            None => self.last_status,
        }
    }

    /// Address the socket is bound to while a worker exists.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.worker.as_ref().map(|w| w.local_addr)
    }

    /// Bind the telemetry socket on `port` and start recording a fresh session.
    ///
    /// # Errors
    ///
    /// Returns [`LaplineError::AlreadyRunning`] while a worker is still
    /// listening, or a socket error if the port cannot be bound.
    pub fn start(&mut self, port: u16) -> Result<(), LaplineError> {
        if let Some(worker) = self.worker.take() {
            if !worker.handle.is_finished() {
                self.worker = Some(worker);
                return Err(LaplineError::AlreadyRunning);
            }
            // the previous session halted on its own and was never collected
            let stale = worker
                .handle
                .join()
                .map_err(|_| LaplineError::RecorderPanicked)?;
            info!(
                "Discarding uncollected session with {} samples",
                stale.buffer.len()
            );
        }

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let socket =
            UdpSocket::bind(bind_addr).map_err(|e| LaplineError::SocketBind { port, source: e })?;
        socket
            .set_nonblocking(true)
            .map_err(|e| LaplineError::SocketConfig { source: e })?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| LaplineError::SocketConfig { source: e })?;

        let cancel = Arc::new(AtomicBool::new(false));
        let listener = Listener {
            socket,
            cancel: Arc::clone(&cancel),
            segmenter: self.segmenter.clone(),
            poll_interval: self.poll_interval,
            events: self.events.clone(),
        };
        let handle = thread::Builder::new()
            .name("lapline-recorder".to_string())
            .spawn(move || listener.run())
            .map_err(|e| LaplineError::WorkerSpawn { source: e })?;

        info!("Recording telemetry on {local_addr}");
        self.worker = Some(Worker {
            cancel,
            handle,
            local_addr,
        });
        self.last_status = SessionStatus::Recording;
        Ok(())
    }

    /// Stop the worker and return the recorded session.
    ///
    /// Calling this on a recorder that is not running returns an empty session.
    ///
    /// # Errors
    ///
    /// Returns [`LaplineError::RecorderPanicked`] if the worker thread panicked.
    pub fn stop(&mut self) -> Result<Session, LaplineError> {
        let Some(worker) = self.worker.take() else {
            return Ok(Session::default());
        };

        worker.cancel.store(true, Ordering::Release);
        let joined = worker.handle.join();
        // the worker is gone either way
        self.last_status = SessionStatus::Stopped;
        let session = joined.map_err(|_| LaplineError::RecorderPanicked)?;
        info!(
            "Recorder stopped with {} samples on {}",
            session.buffer.len(),
            session.track_id.as_deref().unwrap_or("no track")
        );
        Ok(session)
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.store(true, Ordering::Release);
            if worker.handle.join().is_err() {
                error!("Recorder worker panicked during shutdown");
            }
        }
    }
}

/// State moved into the worker thread. The socket is dropped, and therefore
/// closed, when `run` returns.
struct Listener {
    socket: UdpSocket,
    cancel: Arc<AtomicBool>,
    segmenter: LapSegmenter,
    poll_interval: Duration,
    events: Option<Sender<RecorderEvent>>,
}

impl Listener {
    fn run(mut self) -> Session {
        let mut session = Session {
            status: SessionStatus::Recording,
            ..Default::default()
        };
        let mut buf = [0u8; RECV_BUFFER_SIZE];

        while !self.cancel.load(Ordering::Acquire) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => match decode_packet(&buf[..len]) {
                    Ok(packet) => {
                        let transition = self.segmenter.apply(&mut session, packet);
                        if !self.on_transition(&session, transition) {
                            break;
                        }
                    }
                    Err(e) => debug!("Dropping telemetry datagram: {e}"),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(self.poll_interval),
                // ICMP port unreachable surfaces as a reset on some platforms
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::ConnectionReset) => {
                    debug!("Transient telemetry socket error: {e}");
                }
                Err(e) if self.cancel.load(Ordering::Acquire) => {
                    debug!("Telemetry socket closed during shutdown: {e}");
                }
                Err(e) => {
                    error!("Telemetry socket failed, halting recorder: {e}");
                    break;
                }
            }
        }

        self.emit(RecorderEvent::Halted);
        session.status = SessionStatus::Stopped;
        session
    }

    /// Returns false when the loop must end.
    fn on_transition(&mut self, session: &Session, transition: Transition) -> bool {
        let track_id = || session.track_id.clone().unwrap_or_default();
        match transition {
            Transition::Ignored | Transition::Appended => {}
            Transition::Reset { discarded } => {
                if discarded > 0 {
                    self.emit(RecorderEvent::SessionReset {
                        track_id: track_id(),
                    });
                }
            }
            Transition::Started => self.emit(RecorderEvent::SessionStarted {
                track_id: track_id(),
            }),
            Transition::LapAdvanced { lap_number } => {
                self.emit(RecorderEvent::LapStarted { lap_number })
            }
            Transition::Restarted { lap_number } => self.emit(RecorderEvent::SessionRestarted {
                track_id: track_id(),
                lap_number,
            }),
            Transition::TrackChanged { from, to } => {
                warn!("Track changed from {from} to {to}, halting recorder");
                self.emit(RecorderEvent::TrackChanged { from, to });
                return false;
            }
        }
        true
    }

    fn emit(&mut self, event: RecorderEvent) {
        let disconnected = self
            .events
            .as_ref()
            .is_some_and(|events| events.send(event).is_err());
        if disconnected {
            debug!("Recorder event receiver dropped");
            self.events = None;
        }
    }
}
