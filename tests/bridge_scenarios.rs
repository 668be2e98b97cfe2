use jacktoalsa::device::mock::{MockBackend, MockPcm, Script};
use jacktoalsa::device::Resume;
use jacktoalsa::diagnostics::{self, EventReceiver};
use jacktoalsa::{
    Bridge, BridgeError, ConfigError, DevicePolicy, Direction, EventKind, PlanarPorts, RateDecision,
    SampleFormat, SessionConfig, XferError,
};

type Session = (Bridge<MockPcm>, MockBackend, EventReceiver);

fn open(config: SessionConfig) -> Session {
    let mut backend = MockBackend::new();
    let (tx, rx) = diagnostics::channel(64);
    let bridge = Bridge::open(config, &mut backend, tx).unwrap();
    (bridge, backend, rx)
}

fn negotiated(config: SessionConfig, frames: usize) -> Session {
    let (mut bridge, backend, rx) = open(config);
    bridge.on_sample_rate(48_000).unwrap();
    bridge.on_buffer_size(frames).unwrap();
    (bridge, backend, rx)
}

#[test]
fn stereo_s16_reaches_the_device_interleaved() {
    let config = SessionConfig::default().with_channels(2, 0).with_format(SampleFormat::S16);
    let (mut bridge, backend, _rx) = negotiated(config, 2);

    let mut ports = PlanarPorts::from_interleaved(2, &[1.0, -1.0, 0.5, -0.5], 0);
    let report = bridge.process(&mut ports, 2);

    assert_eq!(report.frames_written, 2);
    let state = backend.state(Direction::Playback).unwrap();
    assert_eq!(state.written(), vec![32767, -32768, 16384, -16384]);
    assert_eq!(state.stats().write_calls, 1);
}

#[test]
fn underrun_is_recovered_and_reported_once() {
    let (mut bridge, backend, mut rx) = negotiated(SessionConfig::default().with_channels(2, 0), 4);
    let state = backend.state(Direction::Playback).unwrap();
    state.script_write(Script::Fail(XferError::Xrun));

    let mut ports = PlanarPorts::new(2, 0, 4);
    ports.playback_mut(0).fill(0.25);
    let report = bridge.process(&mut ports, 4);

    assert_eq!(report.underruns, 1);
    assert_eq!(report.frames_written, 4);
    assert_eq!(state.stats().recover_calls, 1);
    assert_eq!(state.written(), vec![1 << 29, 0, 1 << 29, 0, 1 << 29, 0, 1 << 29, 0]);

    let events: Vec<_> = rx.drain().map(|e| e.kind).collect();
    assert_eq!(events, vec![EventKind::Underrun]);
}

#[test]
fn failed_recovery_drops_the_cycle_output() {
    let (mut bridge, backend, mut rx) = negotiated(SessionConfig::default().with_channels(2, 0), 4);
    let state = backend.state(Direction::Playback).unwrap();
    state.script_write(Script::Fail(XferError::Xrun));
    state.fail_recover(XferError::Errno(16));

    let report = bridge.process(&mut PlanarPorts::new(2, 0, 4), 4);

    assert_eq!(report.failures, 1);
    assert_eq!(report.frames_written, 0);
    assert_eq!(state.stats().write_calls, 1);
    assert!(state.written().is_empty());
    let events: Vec<_> = rx.drain().map(|e| e.kind).collect();
    assert_eq!(
        events,
        vec![EventKind::TransferFailed {
            direction: Direction::Playback,
            error: XferError::Errno(16),
        }]
    );

    // the next cycle goes through normally
    let report = bridge.process(&mut PlanarPorts::new(2, 0, 4), 4);
    assert_eq!(report.frames_written, 4);
}

#[test]
fn suspended_capture_retries_resume_next_cycle() {
    let (mut bridge, backend, _rx) = negotiated(SessionConfig::default().with_channels(0, 1), 2);
    let state = backend.state(Direction::Capture).unwrap();
    state.script_read(Script::Fail(XferError::Suspended));
    state.script_resume(Ok(Resume::Pending));

    let report = bridge.process(&mut PlanarPorts::new(0, 1, 2), 2);
    assert_eq!(report.overruns, 1);
    assert_eq!(state.stats().resume_calls, 1);

    let report = bridge.process(&mut PlanarPorts::new(0, 1, 2), 2);
    assert_eq!(report.frames_read, 2);
}

#[test]
fn overrun_leaves_graph_outputs_silent() {
    let (mut bridge, backend, mut rx) = negotiated(SessionConfig::default().with_channels(0, 2), 8);
    let state = backend.state(Direction::Capture).unwrap();
    // stale data from a previous cycle must not leak through
    state.feed_capture(vec![1 << 30; 16]);
    bridge.process(&mut PlanarPorts::new(0, 2, 8), 8);
    state.script_read(Script::Fail(XferError::Xrun));

    let mut ports = PlanarPorts::new(0, 2, 8);
    let report = bridge.process(&mut ports, 8);

    assert_eq!(report.overruns, 1);
    assert_eq!(report.frames_read, 0);
    assert!(ports.capture_ref(0).iter().all(|&s| s == 0.0));
    assert!(ports.capture_ref(1).iter().all(|&s| s == 0.0));

    let stats = state.stats();
    assert_eq!(stats.read_calls, 2);
    assert_eq!(stats.prepare_calls, 1);
    let overruns = rx.drain().filter(|e| e.kind == EventKind::Overrun).count();
    assert_eq!(overruns, 1);
}

#[test]
fn sample_rate_conflict_leaves_devices_alone() {
    let (mut bridge, backend, _rx) = open(SessionConfig::default());
    assert_eq!(bridge.on_sample_rate(48_000).unwrap(), RateDecision::Fixed(48_000));
    let before = backend.state(Direction::Playback).unwrap().stats().configure_calls;

    let err = bridge.on_sample_rate(44_100).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Config(ConfigError::SampleRateConflict { fixed: 48_000, requested: 44_100 })
    ));
    assert_eq!(backend.state(Direction::Playback).unwrap().stats().configure_calls, before);
    assert_eq!(bridge.sample_rate(), Some(48_000));
}

#[test]
fn repeated_sample_rate_does_not_reconfigure() {
    let (mut bridge, backend, _rx) = open(SessionConfig::default());
    bridge.on_sample_rate(96_000).unwrap();
    assert_eq!(bridge.on_sample_rate(96_000).unwrap(), RateDecision::Unchanged(96_000));
    assert_eq!(backend.state(Direction::Capture).unwrap().stats().configure_calls, 1);
    let params = backend.state(Direction::Capture).unwrap().params();
    assert_eq!(params.map(|p| p.sample_rate), Some(96_000));
}

#[test]
fn capture_only_session_never_opens_playback() {
    let (mut bridge, backend, _rx) = negotiated(SessionConfig::default().with_channels(0, 2), 16);

    assert!(backend.state(Direction::Playback).is_none());
    assert!(!bridge.is_active(Direction::Playback));
    assert_eq!(bridge.scratch().bytes(Direction::Playback), 0);

    let report = bridge.process(&mut PlanarPorts::new(0, 2, 16), 16);
    assert_eq!(report.frames_written, 0);
    assert_eq!(report.frames_read, 16);
}

#[test]
fn buffer_size_change_resizes_scratch() {
    let config = SessionConfig::default().with_channels(2, 4).with_format(SampleFormat::S24);
    let (mut bridge, _backend, _rx) = negotiated(config, 256);
    assert_eq!(bridge.scratch().bytes(Direction::Playback), 256 * 2 * 4);

    bridge.on_buffer_size(128).unwrap();
    assert_eq!(bridge.cycle_len(), 128);
    assert_eq!(bridge.scratch().bytes(Direction::Playback), 128 * 2 * 4);
    assert_eq!(bridge.scratch().bytes(Direction::Capture), 128 * 4 * 4);

    // the old length is now a mismatch
    let report = bridge.process(&mut PlanarPorts::new(2, 4, 256), 256);
    assert!(report.skipped);
    let report = bridge.process(&mut PlanarPorts::new(2, 4, 128), 128);
    assert_eq!(report.frames_written, 128);
}

#[test]
fn period_follows_cycle_length_known_at_configuration() {
    let (mut bridge, backend, _rx) = open(SessionConfig::default());
    bridge.on_buffer_size(512).unwrap();
    bridge.on_sample_rate(44_100).unwrap();

    let params = backend.state(Direction::Playback).unwrap().params().unwrap();
    assert_eq!(params.period_frames, Some(512));
    assert_eq!(params.channels, 2);
    assert_eq!(params.format, SampleFormat::S32);
}

#[test]
fn abort_policy_fails_on_missing_device() {
    let mut backend = MockBackend::new().fail_open(Direction::Capture);
    let (tx, _rx) = diagnostics::channel(8);
    let err = Bridge::open(SessionConfig::default(), &mut backend, tx).err().unwrap();
    assert!(matches!(err, BridgeError::Device(_)));
}

#[test]
fn degrade_policy_keeps_the_healthy_direction() {
    let mut backend = MockBackend::new().fail_open(Direction::Capture);
    let (tx, _rx) = diagnostics::channel(8);
    let config = SessionConfig::default().with_device_policy(DevicePolicy::Degrade);
    let mut bridge = Bridge::open(config, &mut backend, tx).unwrap();
    bridge.on_buffer_size(32).unwrap();
    bridge.on_sample_rate(48_000).unwrap();

    assert!(bridge.is_active(Direction::Playback));
    assert!(!bridge.is_active(Direction::Capture));
    assert_eq!(bridge.scratch().bytes(Direction::Capture), 0);

    let report = bridge.process(&mut PlanarPorts::new(2, 2, 32), 32);
    assert_eq!(report.frames_written, 32);
    assert_eq!(report.frames_read, 0);
}

#[test]
fn degrade_policy_drops_direction_that_fails_configuration() {
    let mut backend = MockBackend::new();
    let (tx, _rx) = diagnostics::channel(8);
    let config = SessionConfig::default().with_device_policy(DevicePolicy::Degrade);
    let mut bridge = Bridge::open(config, &mut backend, tx).unwrap();
    backend.state(Direction::Playback).unwrap().fail_configure();

    bridge.on_buffer_size(64).unwrap();
    bridge.on_sample_rate(48_000).unwrap();

    assert!(!bridge.is_active(Direction::Playback));
    assert!(bridge.is_active(Direction::Capture));
    assert_eq!(bridge.scratch().bytes(Direction::Playback), 0);
}

#[test]
fn degrade_policy_still_needs_one_direction() {
    let mut backend = MockBackend::new()
        .fail_open(Direction::Playback)
        .fail_open(Direction::Capture);
    let (tx, _rx) = diagnostics::channel(8);
    let config = SessionConfig::default().with_device_policy(DevicePolicy::Degrade);
    let err = Bridge::open(config, &mut backend, tx).err().unwrap();
    assert!(matches!(err, BridgeError::NoActiveDirection));
}

#[test]
fn no_channels_at_all_is_a_config_error() {
    let mut backend = MockBackend::new();
    let (tx, _rx) = diagnostics::channel(8);
    let config = SessionConfig::default().with_channels(0, 0);
    let err = Bridge::open(config, &mut backend, tx).err().unwrap();
    assert!(matches!(err, BridgeError::Config(ConfigError::NoChannels)));
    assert!(backend.opened().is_empty());
}

#[test]
fn devices_are_opened_by_name() {
    let config = SessionConfig::default().with_device("hw:USB");
    let (_bridge, backend, _rx) = open(config);
    assert_eq!(
        backend.opened(),
        &[
            (Direction::Playback, "hw:USB".to_string()),
            (Direction::Capture, "hw:USB".to_string()),
        ]
    );
}

#[test]
fn capture_decodes_at_configured_width() {
    let config = SessionConfig::default()
        .with_channels(0, 1)
        .with_format(SampleFormat::S24Headroom);
    let (mut bridge, backend, _rx) = negotiated(config, 3);
    backend
        .state(Direction::Capture)
        .unwrap()
        .feed_capture([4_194_304, -2_097_152, 0]);

    let mut ports = PlanarPorts::new(0, 1, 3);
    bridge.process(&mut ports, 3);
    assert_eq!(ports.capture_ref(0), &[1.0, -0.5, 0.0]);
}
