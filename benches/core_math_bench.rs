use criterion::{Criterion, criterion_group, criterion_main};
use draw_rs::core::{AffineMatrix, ComposeMode, PathModel};
use draw_rs::{MemoryDocument, SpriteDescriptor, SpriteKind, Surface, SurfaceConfig, TransformOp};
use std::hint::black_box;

fn bench_matrix_compose_inverse(c: &mut Criterion) {
    let mut base = AffineMatrix::identity();
    base.translate(12.5, -4.0, ComposeMode::Prepend)
        .rotate(0.3, ComposeMode::Prepend)
        .scale(1.5, 0.75, ComposeMode::Prepend);

    c.bench_function("matrix_compose_inverse", |b| {
        b.iter(|| {
            let mut matrix = black_box(base);
            matrix.compose(&black_box(base).inverse(), ComposeMode::Append);
            black_box(matrix.transform_point((3.0, 4.0)))
        })
    });
}

fn bench_path_parse_1k(c: &mut Criterion) {
    let data: String = (0..1_000)
        .map(|i| {
            let x = f64::from(i) * 0.5;
            format!("L{x},{} q2 3 4 0 ", x.sin() * 10.0)
        })
        .collect();
    let data = format!("M0,0{data}z");

    c.bench_function("path_parse_1k", |b| {
        b.iter(|| {
            let path = PathModel::parse(black_box(&data));
            black_box(path.to_svg_string().len())
        })
    });
}

fn bench_render_all_2k(c: &mut Criterion) {
    let mut surface = Surface::new(MemoryDocument::new(), SurfaceConfig::new(1600.0, 900.0)).expect("surface");
    let ids: Vec<_> = (0..2_000)
        .map(|i| {
            let t = f64::from(i);
            surface
                .add_sprite(
                    SpriteDescriptor::new(SpriteKind::Circle)
                        .with_attr("x", t % 1600.0)
                        .with_attr("y", (t * 7.0) % 900.0)
                        .with_attr("radius", 3.0)
                        .with_attr("fill", "steelblue")
                        .with_transform(TransformOp::Rotate {
                            degrees: t % 360.0,
                            x: None,
                            y: None,
                        }),
                )
                .expect("sprite")
        })
        .collect();
    surface.render_all().expect("initial render");

    let mut tick = 0.0;
    c.bench_function("render_all_2k_dirty_tenth", |b| {
        b.iter(|| {
            tick += 1.0;
            for id in ids.iter().step_by(10) {
                surface.set_attributes(*id, [("radius", 3.0 + tick % 5.0)]).expect("update");
            }
            surface.render_all().expect("render");
        })
    });
}

criterion_group!(
    benches,
    bench_matrix_compose_inverse,
    bench_path_parse_1k,
    bench_render_all_2k
);
criterion_main!(benches);
