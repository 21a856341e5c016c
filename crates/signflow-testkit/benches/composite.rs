use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use signflow_composite::Compositor;
use signflow_core::StoredEmbed;
use signflow_testkit::fixtures::{placement, png_signature, sample_pdf};

fn build_log(len: usize) -> Vec<StoredEmbed> {
    let image = png_signature(120, 40, 200);
    (0..len)
        .map(|i| StoredEmbed {
            position: placement(
                1,
                20.0 + (i % 4) as f32 * 140.0,
                40.0 + (i / 4) as f32 * 60.0,
            ),
            image: image.clone(),
            applied_at: i as i64,
        })
        .collect()
}

fn bench_composite(c: &mut Criterion) {
    let original = sample_pdf(2);
    let compositor = Compositor::default();
    let new = StoredEmbed {
        position: placement(2, 300.0, 100.0),
        image: png_signature(120, 40, 255),
        applied_at: 0,
    };

    let mut group = c.benchmark_group("composite");
    for history in [0usize, 4, 16] {
        let log = build_log(history);
        let applied: Vec<&StoredEmbed> = log.iter().collect();
        group.bench_with_input(BenchmarkId::from_parameter(history), &applied, |b, applied| {
            b.iter(|| {
                let _ = black_box(compositor.composite(&original, applied, &new));
            });
        });
    }
    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let original = sample_pdf(2);
    let compositor = Compositor::default();

    let mut group = c.benchmark_group("rebuild");
    for history in [1usize, 8, 32] {
        let log = build_log(history);
        let applied: Vec<&StoredEmbed> = log.iter().collect();
        group.bench_with_input(BenchmarkId::from_parameter(history), &applied, |b, applied| {
            b.iter(|| {
                let _ = black_box(compositor.rebuild(&original, applied));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_composite, bench_rebuild);
criterion_main!(benches);
