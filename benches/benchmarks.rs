//! Performance benchmarks for wscore.
//!
//! Run with: `cargo bench`

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use wscore::protocol::{FrameEncoder, apply_mask, compute_accept_key, encode_frame};
use wscore::{Config, Connection, FragmentState, FrameHandler, MessageAssembler, OpCode, Role};

const SIZES: [usize; 3] = [10, 1024, 65536];

struct Discard;

impl FrameHandler for Discard {
    fn on_frame(&mut self, payload: &[u8], _binary: bool, _state: FragmentState) {
        black_box(payload);
    }
}

fn masked_frame(payload_size: usize) -> Vec<u8> {
    let mut out = BytesMut::new();
    encode_frame(
        &mut out,
        true,
        OpCode::Binary,
        &vec![0xab; payload_size],
        Some([0x37, 0xfa, 0x21, 0x3d]),
    )
    .unwrap();
    out.to_vec()
}

// =============================================================================
// Decoding
// =============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in SIZES {
        let frame = masked_frame(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("whole", size), &frame, |b, frame| {
            b.iter(|| {
                let mut server = Connection::new(Role::Server, Config::default());
                server.process(black_box(frame), &mut Discard).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("chunks_of_7", size), &frame, |b, frame| {
            b.iter(|| {
                let mut server = Connection::new(Role::Server, Config::default());
                for chunk in frame.chunks(7) {
                    server.process(black_box(chunk), &mut Discard).unwrap();
                }
            })
        });
    }

    group.finish();
}

// =============================================================================
// Encoding
// =============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in SIZES {
        let payload = vec![0xab; size];
        group.throughput(Throughput::Bytes(size as u64));

        for role in [Role::Client, Role::Server] {
            let mut encoder = FrameEncoder::new(role);
            let mut out = BytesMut::with_capacity(size + 14);
            group.bench_with_input(BenchmarkId::new(role.to_string(), size), &payload, |b, payload| {
                b.iter(|| {
                    out.clear();
                    encoder.encode(&mut out, OpCode::Binary, black_box(payload)).unwrap();
                })
            });
        }
    }

    group.finish();
}

// =============================================================================
// Masking
// =============================================================================

fn bench_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("masking");
    let mask = [0x37, 0xfa, 0x21, 0x3d];

    for size in SIZES {
        let mut data = vec![0xab; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| apply_mask(black_box(&mut data), mask))
        });
    }

    group.finish();
}

// =============================================================================
// Handshake and reassembly
// =============================================================================

fn bench_accept_key(c: &mut Criterion) {
    c.bench_function("accept_key", |b| {
        b.iter(|| compute_accept_key(black_box("dGhlIHNhbXBsZSBub25jZQ==")))
    });
}

fn bench_reassembly(c: &mut Criterion) {
    let mut client = Connection::new(Role::Client, Config::default().with_fragment_size(1024));
    client.send_binary(&vec![0xcd; 64 * 1024]).unwrap();
    let wire = client.take_outbound().unwrap();

    let mut group = c.benchmark_group("reassembly");
    group.throughput(Throughput::Bytes(64 * 1024));
    group.bench_function("64kb_in_64_fragments", |b| {
        b.iter(|| {
            let mut server = Connection::new(Role::Server, Config::default());
            let mut inbox = MessageAssembler::default();
            server.process(black_box(&wire), &mut inbox).unwrap();
            inbox.pop().unwrap()
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_encode,
    bench_masking,
    bench_accept_key,
    bench_reassembly
);
criterion_main!(benches);
