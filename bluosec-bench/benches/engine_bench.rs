//! Protocol engine benchmarks.

use bluosec_core::{Assembler, ControllerConfig, Engine, NoSignals, Telemetry};
use bluosec_eeprom::layout::IMAGE_SIZE;
use bluosec_eeprom::{FileEeprom, MemoryEeprom};
use bluosec_protocol::{Address, Code, Function, RawRequest, Request};
use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

fn create_test_engine() -> Engine<MemoryEeprom, NoSignals> {
    let (engine, _) =
        Engine::start(MemoryEeprom::new(IMAGE_SIZE), &ControllerConfig::default()).unwrap();
    engine
}

fn telemetry() -> Telemetry {
    Telemetry {
        battery_voltage: 38,
        speed: 24,
        er_speed: 410,
        battery_current: 120,
        hall_currents: [10, 20, 30, 40, 50, 60],
        hall_order: [1, 3, 2, 6, 4, 5],
        ..Default::default()
    }
}

fn bench_read_requests(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_read");
    group.throughput(Throughput::Elements(1));

    let mut engine = create_test_engine();
    let telemetry = telemetry();
    let mut out = BytesMut::with_capacity(128);

    let requests = [
        ("basic", Request::read(Address::DynamicData, Function::BasicInfos)),
        ("detail", Request::read(Address::DynamicData, Function::DetailInfos)),
        ("hall", Request::read(Address::DynamicData, Function::HallInfos)),
        ("config", Request::read(Address::StaticData, Function::ConfigInfos)),
    ];

    for (name, request) in requests {
        let raw = request.encode();
        group.bench_with_input(BenchmarkId::from_parameter(name), &raw, |b, raw| {
            b.iter(|| {
                out.clear();
                black_box(engine.process(raw, &telemetry, &mut out))
            });
        });
    }

    group.finish();
}

fn bench_checksum_mismatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_checksum_mismatch");
    group.throughput(Throughput::Elements(1));

    let mut engine = create_test_engine();
    let telemetry = telemetry();
    let mut out = BytesMut::with_capacity(128);

    let mut bytes = Request::read(Address::DynamicData, Function::BasicInfos)
        .encode()
        .0;
    bytes[13] = if bytes[13] == b'0' { b'1' } else { b'0' };
    let raw = RawRequest::from(bytes);

    group.bench_function("error_echo", |b| {
        b.iter(|| {
            out.clear();
            black_box(engine.process(&raw, &telemetry, &mut out))
        });
    });

    group.finish();
}

fn bench_config_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_config_write");
    group.throughput(Throughput::Elements(1));

    let telemetry = telemetry();
    let mut out = BytesMut::with_capacity(128);

    let mut memory = create_test_engine();
    let volatile = Request::write(Code::MaxSpeedDefault, 25, false).encode();
    group.bench_function("volatile", |b| {
        b.iter(|| {
            out.clear();
            black_box(memory.process(&volatile, &telemetry, &mut out))
        });
    });

    let persisted = Request::write(Code::MaxBatCurrent, 300, true).encode();
    group.bench_function("persisted_memory", |b| {
        b.iter(|| {
            out.clear();
            memory.eeprom().clear_writes();
            black_box(memory.process(&persisted, &telemetry, &mut out))
        });
    });

    // Every persisted byte is synced to disk.
    let dir = TempDir::new().unwrap();
    let eeprom = FileEeprom::open(dir.path().join("eeprom.bin"), IMAGE_SIZE).unwrap();
    let (mut file, _) = Engine::start(eeprom, &ControllerConfig::default()).unwrap();
    group.sample_size(20);
    group.bench_function("persisted_file", |b| {
        b.iter(|| {
            out.clear();
            black_box(file.process(&persisted, &telemetry, &mut out))
        });
    });

    group.finish();
}

fn bench_assembler(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembler");

    let raw = Request::read(Address::DynamicData, Function::BasicInfos).encode();
    let stream: Vec<u8> = raw.as_bytes().repeat(16);
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("byte_by_byte", |b| {
        b.iter(|| {
            let mut assembler = Assembler::new();
            let mut frames = 0;
            for &byte in &stream {
                assembler.receive_byte(byte);
                if assembler.poll_frame().is_some() {
                    frames += 1;
                }
            }
            black_box(frames)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_read_requests,
    bench_checksum_mismatch,
    bench_config_write,
    bench_assembler,
);

criterion_main!(benches);
