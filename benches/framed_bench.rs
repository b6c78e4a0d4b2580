use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata::{
    Borrowed, ChunkDecoder, ChunkEncoder, Compression, FramedSnappyOptions, FramedSnappyWriter,
    VecWriter, Writer,
};

fn bench_framed_write(c: &mut Criterion) {
    let compressible = vec![42u8; 1024 * 1024];
    let mixed: Vec<u8> = (0..1024 * 1024usize).map(|i| (i * 31 % 251) as u8).collect();

    c.bench_function("framed_write_1mb_compressible", |b| {
        b.iter(|| {
            let mut inner = VecWriter::new();
            let mut writer =
                FramedSnappyWriter::new(Borrowed(&mut inner), FramedSnappyOptions::default());
            writer.write(black_box(&compressible));
            writer.close();
        })
    });

    c.bench_function("framed_write_1mb_mixed", |b| {
        b.iter(|| {
            let mut inner = VecWriter::new();
            let mut writer =
                FramedSnappyWriter::new(Borrowed(&mut inner), FramedSnappyOptions::default());
            writer.write(black_box(&mixed));
            writer.close();
        })
    });
}

fn bench_chunk_round_trip(c: &mut Criterion) {
    let mut encoder = ChunkEncoder::new();
    for i in 0..10_000usize {
        encoder.add_record(format!("record payload number {i}").as_bytes());
    }
    let chunk = encoder.encode(Compression::Snappy).unwrap();

    c.bench_function("chunk_decode_10k_records", |b| {
        b.iter(|| {
            let mut decoder = ChunkDecoder::new();
            decoder.reset(black_box(&chunk));
            while decoder.read_record_slice().is_some() {}
        })
    });
}

criterion_group!(benches, bench_framed_write, bench_chunk_round_trip);
criterion_main!(benches);
