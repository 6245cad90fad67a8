use approx::assert_relative_eq;
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};

use fermisurf::{
    EnergyGrid,
    ExpandedKPoint,
    IrreducibleKPoint,
    SymmetryOperation,
    crossing_bands,
    expand,
    polygonise,
    symmetry::equivalent,
    trilinear_weights,
    wrap,
};


fn rng() -> StdRng {
    StdRng::seed_from_u64(20241016)
}


#[test]
fn test_wrap_range_and_idempotence() {
    let mut rng = rng();
    for _ in 0 .. 10000 {
        let k = [0; 3].map(|_| rng.gen_range(-20.0 .. 20.0));
        let w = wrap(k);
        assert!(w.iter().all(|x| (-0.5 .. 0.5).contains(x)), "{:?} -> {:?}", k, w);
        assert_eq!(wrap(w), w);
        assert!(equivalent(k, w, 1e-9));

        let shifted = wrap([k[0] + 3.0, k[1] - 1.0, k[2] + 7.0]);
        assert!(equivalent(shifted, w, 1e-9));
    }
}


#[test]
fn test_trilinear_weights_sum_to_one() {
    let mut rng = rng();
    for _ in 0 .. 1000 {
        let f = [0; 3].map(|_| rng.gen_range(0.0 .. 1.0));
        let w = trilinear_weights(f);
        assert!(w.iter().all(|&x| x >= 0.0));
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }
}


/// Full 4x4x4 mesh of a function linear in each coordinate, sampled on the
/// same mesh it was built from.
#[test]
fn test_interpolation_is_exact_on_sampled_points() {
    let mut rng = rng();
    let energy = |k: [f64; 3]| 3.0 * k[0] - 2.0 * k[1] + k[2];
    let points = (0 .. 64)
        .map(|i| {
            let k = [i % 4, i / 4 % 4, i / 16].map(|n| -0.5 + n as f64 / 4.0);
            ExpandedKPoint { coords: k, energies: vec![energy(k), rng.gen()], origin: i }
        })
        .collect::<Vec<_>>();

    let grid = EnergyGrid::interpolate(&points, 0.0, 4, 4).unwrap();
    for p in points.iter() {
        for band in 0 .. 2 {
            assert_relative_eq!(grid.sample(band, p.coords).unwrap(), p.energies[band], epsilon = 1e-9);
        }
    }
}


#[test]
fn test_identity_expansion_keeps_points() {
    let mut rng = rng();
    let points = (0 .. 50)
        .map(|_| IrreducibleKPoint {
            coords: [0; 3].map(|_| rng.gen_range(-0.45 .. 0.45)),
            weight: 1.0,
            energies: vec![rng.gen()],
        })
        .collect::<Vec<_>>();

    let expanded = expand(&points, &[SymmetryOperation::identity()], 1e-6);
    assert_eq!(expanded.len(), points.len());
    for (e, p) in expanded.iter().zip(points.iter()) {
        assert_eq!(e.coords, p.coords);
        assert_eq!(e.energies, p.energies);
    }
}


#[test]
fn test_crossing_requires_both_sides() {
    let crossing = [-1.0, 0.5, 2.0];
    let above = [1.0, 2.0, 3.0];
    let samples = crossing.iter().zip(above.iter())
        .map(|(&a, &b)| vec![a, b])
        .collect::<Vec<_>>();
    assert_eq!(crossing_bands(samples.iter().map(Vec::as_slice), 2, 0.0), vec![0]);
}


#[test]
fn test_single_cube_configurations() {
    let mut values = [1.0; 8];
    assert!(polygonise(&values, 0.0).is_empty());

    values[0] = -1.0;
    let mesh = polygonise(&values, 0.0);
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.triangle_count(), 1);

    assert!(polygonise(&[-1.0; 8], 0.0).is_empty());
}


#[test]
fn test_fermi_shift_round_trip() {
    let mut rng = rng();
    let points = (0 .. 8)
        .map(|i| {
            let k = [i % 2, i / 2 % 2, i / 4].map(|n| -0.5 + n as f64 / 2.0);
            ExpandedKPoint { coords: k, energies: vec![rng.gen_range(-5.0 .. 5.0)], origin: i }
        })
        .collect::<Vec<_>>();
    let ef = 1.25;
    let grid = EnergyGrid::interpolate(&points, ef, 2, 2).unwrap();
    let shifted = grid.shift_to_fermi();

    assert_eq!(shifted.fermi_energy, 0.0);
    for (a, b) in grid.data[0].iter().zip(shifted.data[0].iter()) {
        assert_relative_eq!(b + ef, *a, epsilon = 1e-12);
    }
}
