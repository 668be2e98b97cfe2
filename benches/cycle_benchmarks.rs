use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jacktoalsa::codec::{FixedFormat, S16, S24};
use jacktoalsa::device::mock::MockBackend;
use jacktoalsa::{diagnostics, Bridge, Direction, PlanarPorts, SampleFormat, SessionConfig};

fn bridge_cycle(c: &mut Criterion, name: &str, format: SampleFormat) {
    c.bench_function(name, |b| {
        let frames = 256;
        let config = SessionConfig::default().with_channels(8, 8).with_format(format);
        let mut backend = MockBackend::new();
        let (tx, mut rx) = diagnostics::channel(1024);
        let mut bridge = Bridge::open(config, &mut backend, tx).unwrap();
        bridge.on_buffer_size(frames).unwrap();
        bridge.on_sample_rate(48_000).unwrap();
        let playback = backend.state(Direction::Playback).unwrap();

        let mut ports = PlanarPorts::new(8, 8, frames);
        for ch in 0..8 {
            for (n, s) in ports.playback_mut(ch).iter_mut().enumerate() {
                *s = ((n + ch) as f32 * 0.01).sin();
            }
        }

        b.iter(|| {
            black_box(bridge.process(&mut ports, frames));
            rx.drain().for_each(drop);
            playback.clear_written();
        })
    });
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("S16::encode(256)", |b| {
        let input: Vec<f32> = (0..256).map(|n| (n as f32 * 0.05).sin()).collect();
        b.iter(|| input.iter().map(|&s| S16::encode(black_box(s)) as i32).sum::<i32>())
    });

    c.bench_function("S24::decode(256)", |b| {
        let input: Vec<i32> = (0..256).map(|n| (n - 128) * 32_768).collect();
        b.iter(|| input.iter().map(|&s| S24::decode(black_box(s))).sum::<f32>())
    });

    bridge_cycle(c, "Bridge.process() 8ch S16", SampleFormat::S16);
    bridge_cycle(c, "Bridge.process() 8ch S32", SampleFormat::S32);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
