//! # Closest Point Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use follow_lib::{
    geom::RotationMatrix,
    traj_ctrl::{heading, Path},
};
use nalgebra::DVector;

fn closest_point_benchmark(c: &mut Criterion) {
    let v = |x: f64, y: f64, z: f64| DVector::from_vec(vec![x, y, z]);

    // Cubic from the spatial scenario
    let cubic = Path::new(
        vec![
            v(0.0, 0.0, 0.0),
            v(0.0, 0.0, 1.0),
            v(0.0, 1.0, 1.0),
            v(1.0, 1.0, 1.0),
        ],
        heading::constant(RotationMatrix::identity(3)),
    )
    .unwrap();

    // Higher degree planar curve which folds back on itself
    let quintic = Path::new(
        vec![
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![2.0, 3.0]),
            DVector::from_vec(vec![4.0, -1.0]),
            DVector::from_vec(vec![1.0, -2.0]),
            DVector::from_vec(vec![3.0, 2.0]),
            DVector::from_vec(vec![5.0, 0.0]),
        ],
        heading::tangent_2d(),
    )
    .unwrap();

    let query_3d = v(0.3, 0.6, 0.4);
    let query_2d = DVector::from_vec(vec![2.5, 0.5]);

    c.bench_function("Path::closest_t::cubic_3d", |b| {
        b.iter(|| cubic.closest_t(black_box(&query_3d)).unwrap())
    });

    c.bench_function("Path::closest_t::quintic_2d", |b| {
        b.iter(|| quintic.closest_t(black_box(&query_2d)).unwrap())
    });

    c.bench_function("Path::closest_pose::quintic_2d", |b| {
        b.iter(|| quintic.closest_pose(black_box(&query_2d)).unwrap())
    });
}

criterion_group!(benches, closest_point_benchmark);
criterion_main!(benches);
