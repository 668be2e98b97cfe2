use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use jacktoalsa::device::alsa::AlsaBackend;
use jacktoalsa::jack_host::JackSession;
use jacktoalsa::{DevicePolicy, SampleFormat, SessionConfig};

/// Bridge JACK ports to ALSA playback and capture devices.
#[derive(Parser, Debug)]
#[command(name = "jacktoalsa", version, about)]
struct Cli {
    /// ALSA device used for both directions
    #[arg(long, env = "ALSA_CARD", default_value = "default")]
    alsa_card: String,

    /// ALSA playback device (overrides --alsa-card)
    #[arg(long)]
    alsa_card_playback: Option<String>,

    /// ALSA capture device (overrides --alsa-card)
    #[arg(long)]
    alsa_card_capture: Option<String>,

    /// JACK client name
    #[arg(long, default_value = "meta_jacktoalsa")]
    jack_client: String,

    /// Channel count for both directions
    #[arg(long, default_value_t = 2)]
    ports_num: usize,

    /// Playback channel count (overrides --ports-num)
    #[arg(long)]
    playback_ports: Option<usize>,

    /// Capture channel count (overrides --ports-num)
    #[arg(long)]
    capture_ports: Option<usize>,

    /// Device sample width: 16, 24 or 32
    #[arg(long, default_value_t = 32)]
    bit_depth: u32,

    /// Encode 24-bit samples with the legacy 2^22 full scale
    #[arg(long)]
    s24_headroom: bool,

    /// What to do when a device fails to open or configure: abort or degrade
    #[arg(long, default_value = "abort")]
    on_device_error: DevicePolicy,

    /// Diagnostics queued between log flushes
    #[arg(long, default_value_t = 256)]
    event_capacity: usize,

    /// List ALSA devices and exit
    #[cfg(feature = "device_probe")]
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let format = SampleFormat::from_bit_depth(self.bit_depth, self.s24_headroom)?;
        let mut config = SessionConfig::default()
            .with_channels(
                self.playback_ports.unwrap_or(self.ports_num),
                self.capture_ports.unwrap_or(self.ports_num),
            )
            .with_format(format)
            .with_device_policy(self.on_device_error);

        let card = |specific: &Option<String>| {
            specific.clone().unwrap_or_else(|| self.alsa_card.clone())
        };
        config.playback_device = card(&self.alsa_card_playback);
        config.capture_device = card(&self.alsa_card_capture);
        config.client_name = self.jack_client.clone();
        config.event_capacity = self.event_capacity;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "device_probe")]
fn list_devices() {
    use jacktoalsa::device::probe::DeviceInfo;

    for info in DeviceInfo::list_playback().iter().chain(DeviceInfo::list_capture().iter()) {
        println!(
            "{:<8} {} ({} Hz, {} ch, {})",
            info.direction().to_string(),
            info.name(),
            info.sample_rate(),
            info.channels(),
            info.sample_format()
        );
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    #[cfg(feature = "device_probe")]
    {
        if cli.list_devices {
            list_devices();
            return Ok(ExitCode::SUCCESS);
        }
    }

    let config = cli.session_config().context("invalid configuration")?;
    tracing::info!(
        playback = %config.playback_device,
        capture = %config.capture_device,
        playback_channels = config.playback_channels,
        capture_channels = config.capture_channels,
        format = %config.format,
        "starting"
    );

    let mut backend = AlsaBackend;
    let mut session =
        JackSession::start(config, &mut backend).context("failed to start jack session")?;

    tracing::info!("running");
    let stop = session.run(Duration::from_millis(100));
    let conflict = stop.is_conflict();
    if conflict {
        tracing::error!(?stop, "stopping");
    } else {
        tracing::info!(?stop, "stopping");
    }

    session.stop().context("failed to stop cleanly")?;
    Ok(if conflict { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
