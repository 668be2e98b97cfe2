//! JACK client that drives a [`Bridge`] from the JACK process thread.
//!
//! Ports `playback_1..N` are JACK inputs (graph → device) and `capture_1..N`
//! are JACK outputs (device → graph). Sample rate and buffer size are
//! negotiated on the calling thread before activation; afterwards the
//! buffer-size callback resizes the bridge and the notification handler
//! checks later rate changes against the session's [`SampleRateLock`].
//!
//! Fatal conditions seen on JACK's threads are sent to the owner as a
//! [`Stop`] so it can tear the session down from a normal thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use jack::{
    AudioIn, AudioOut, Client, ClientOptions, ClientStatus, Control, Frames, Port, ProcessScope,
};

use crate::bridge::Bridge;
use crate::config::SessionConfig;
use crate::device::{PcmBackend, PcmStream};
use crate::diagnostics::{self, EventReceiver};
use crate::error::{BridgeError, ConfigError, DeviceError};
use crate::negotiate::SampleRateLock;
use crate::ports::CyclePorts;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("jack: {0}")]
    Jack(#[from] jack::Error),
    #[error("jack client name {0:?} already taken (already started?)")]
    NameTaken(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Why a running session asked to stop.
#[derive(Debug)]
pub enum Stop {
    /// The server switched to a rate the devices were not configured for.
    RateConflict(ConfigError),
    /// Resizing for a new buffer size failed.
    BufferSize(BridgeError),
    /// The JACK server went away.
    ServerShutdown(String),
}

impl Stop {
    /// Whether the stop reflects a configuration conflict rather than the server leaving.
    pub fn is_conflict(&self) -> bool {
        !matches!(self, Stop::ServerShutdown(_))
    }
}

/// Process-thread half: owns the bridge and the JACK ports.
pub struct Process<S: PcmStream> {
    bridge: Bridge<S>,
    playback: Vec<Port<AudioIn>>,
    capture: Vec<Port<AudioOut>>,
    stop: Sender<Stop>,
}

impl<S: PcmStream + 'static> jack::ProcessHandler for Process<S> {
    fn process(&mut self, _: &Client, ps: &ProcessScope) -> Control {
        // JACK hands out output buffers with stale contents
        for port in self.capture.iter_mut() {
            port.as_mut_slice(ps).iter_mut().for_each(|s| *s = 0.0);
        }

        let frames = ps.n_frames() as usize;
        let mut ports = JackPorts {
            playback: &self.playback,
            capture: &mut self.capture,
            ps,
        };
        self.bridge.process(&mut ports, frames);
        Control::Continue
    }

    fn buffer_size(&mut self, _: &Client, size: Frames) -> Control {
        match self.bridge.on_buffer_size(size as usize) {
            Ok(()) => Control::Continue,
            Err(err) => {
                tracing::error!(%err, size, "cannot follow new buffer size");
                let _ = self.stop.send(Stop::BufferSize(err));
                Control::Quit
            }
        }
    }
}

/// Notification half: checks rate changes and watches for server shutdown.
pub struct Notifications {
    rate: Arc<SampleRateLock>,
    stop: Sender<Stop>,
}

impl jack::NotificationHandler for Notifications {
    fn sample_rate(&mut self, _: &Client, srate: Frames) -> Control {
        match self.rate.negotiate(srate) {
            Ok(_) => Control::Continue,
            Err(err) => {
                tracing::error!(%err, "jack sample rate changed");
                let _ = self.stop.send(Stop::RateConflict(err));
                Control::Quit
            }
        }
    }

    unsafe fn shutdown(&mut self, status: ClientStatus, reason: &str) {
        tracing::warn!(?status, reason, "jack server shut down");
        let _ = self.stop.send(Stop::ServerShutdown(reason.to_string()));
    }
}

struct JackPorts<'a> {
    playback: &'a [Port<AudioIn>],
    capture: &'a mut [Port<AudioOut>],
    ps: &'a ProcessScope,
}

impl CyclePorts for JackPorts<'_> {
    fn playback(&self, channel: usize) -> Option<&[f32]> {
        self.playback.get(channel).map(|port| port.as_slice(self.ps))
    }

    fn capture(&mut self, channel: usize) -> Option<&mut [f32]> {
        let ps = self.ps;
        self.capture.get_mut(channel).map(|port| port.as_mut_slice(ps))
    }
}

/// An activated JACK client bridging to PCM devices.
pub struct JackSession<S: PcmStream + 'static> {
    client: jack::AsyncClient<Notifications, Process<S>>,
    events: EventReceiver,
    stop: Receiver<Stop>,
}

impl<S: PcmStream + 'static> JackSession<S> {
    /// Open the JACK client, open and configure the devices, then activate.
    pub fn start<B>(config: SessionConfig, backend: &mut B) -> Result<Self, HostError>
    where
        B: PcmBackend<Stream = S>,
    {
        tracing::info!(name = %config.client_name, "opening jack client");
        let (client, status) = Client::new(&config.client_name, ClientOptions::NO_START_SERVER)?;
        if status.contains(ClientStatus::NAME_NOT_UNIQUE) {
            return Err(HostError::NameTaken(config.client_name.clone()));
        }

        let playback = (1..=config.playback_channels)
            .map(|n| client.register_port(&format!("playback_{n}"), AudioIn::default()))
            .collect::<Result<Vec<_>, _>>()?;
        let capture = (1..=config.capture_channels)
            .map(|n| client.register_port(&format!("capture_{n}"), AudioOut::default()))
            .collect::<Result<Vec<_>, _>>()?;

        let (tx, events) = diagnostics::channel(config.event_capacity);
        let mut bridge = Bridge::open(config, backend, tx)?;

        // the buffer size goes first so the device period matches the cycle
        bridge.on_buffer_size(client.buffer_size() as usize)?;
        bridge.on_sample_rate(client.sample_rate() as u32)?;

        let (stop_tx, stop) = mpsc::channel();
        let notifications = Notifications {
            rate: bridge.rate_lock(),
            stop: stop_tx.clone(),
        };
        let process = Process {
            bridge,
            playback,
            capture,
            stop: stop_tx,
        };

        tracing::info!("activating jack client");
        let client = client.activate_async(notifications, process)?;
        tracing::info!("jack client active");
        Ok(Self { client, events, stop })
    }

    /// Block until a [`Stop`] arrives, logging diagnostics every `poll`.
    pub fn run(&mut self, poll: Duration) -> Stop {
        loop {
            match self.stop.recv_timeout(poll) {
                Ok(stop) => {
                    self.events.log_pending();
                    return stop;
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.events.log_pending();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Stop::ServerShutdown("jack handlers dropped".to_string());
                }
            }
        }
    }

    /// Deactivate the client, then drain and close the devices.
    pub fn stop(mut self) -> Result<(), HostError> {
        tracing::info!("deactivating jack client");
        let (_client, _notifications, process) = self.client.deactivate()?;
        self.events.log_pending();
        process.bridge.shutdown()?;
        Ok(())
    }
}
