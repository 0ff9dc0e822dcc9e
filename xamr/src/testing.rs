use std::path::PathBuf;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::memory::{AmrSnapshot, MemoryEngine, Patch};

/// Fields stored in every fixture snapshot, besides `density`.
pub(crate) const VELOCITIES: [&str; 3] = ["x_velocity", "y_velocity", "z_velocity"];

fn velocity(name: &str, time: f64, p: &[f64]) -> f64 {
    match name {
        "x_velocity" => p[0] * p[1] + time,
        "y_velocity" => p[0] - 2.0 * p[1],
        _ => p.iter().sum::<f64>() * 0.5,
    }
}

fn patch(snapshot: &AmrSnapshot, level: usize, lo: &[i64], dims: &[usize], rng: &mut StdRng) -> Patch {
    let time = snapshot.time;
    let names = &VELOCITIES[..snapshot.dimensionality()];
    let mut patch = snapshot.fill_patch(level, lo, dims, names, |name, p| velocity(name, time, p));
    let len: usize = dims.iter().product();
    let density = (0..len).map(|_| rng.gen_range(1.0..2.0)).collect();
    patch.fields.insert(String::from("density"), density);

    patch
}

/// A 2 dimensional snapshot on the unit square, 8x8 level 0 cells, with a level 1 patch over
/// the upper right quarter.
///
pub(crate) fn snapshot2d(time: f64) -> AmrSnapshot {
    let mut rng = StdRng::seed_from_u64(42);
    let snapshot = AmrSnapshot::new(time, vec![0.0, 0.0], vec![1.0, 1.0], vec![8, 8]);
    let base = patch(&snapshot, 0, &[0, 0], &[8, 8], &mut rng);
    let fine = patch(&snapshot, 1, &[8, 8], &[8, 8], &mut rng);

    snapshot.with_patch(base).with_patch(fine)
}

/// A 3 dimensional snapshot on the unit cube, 4x4x4 level 0 cells, with a level 1 patch over
/// the upper corner.
///
pub(crate) fn snapshot3d(time: f64) -> AmrSnapshot {
    let mut rng = StdRng::seed_from_u64(42);
    let snapshot = AmrSnapshot::new(
        time,
        vec![0.0, 0.0, 0.0],
        vec![1.0, 1.0, 1.0],
        vec![4, 4, 4],
    );
    let base = patch(&snapshot, 0, &[0, 0, 0], &[4, 4, 4], &mut rng);
    let fine = patch(&snapshot, 1, &[4, 4, 4], &[4, 4, 4], &mut rng);

    snapshot.with_patch(base).with_patch(fine)
}

pub(crate) fn snapshot(dimensionality: usize, time: f64) -> AmrSnapshot {
    match dimensionality {
        2 => snapshot2d(time),
        _ => snapshot3d(time),
    }
}

pub(crate) fn engine_with(snapshots: Vec<(PathBuf, AmrSnapshot)>) -> MemoryEngine {
    let engine = MemoryEngine::new();
    for (path, snapshot) in snapshots {
        engine.insert(path, snapshot).expect("fixture snapshot is valid");
    }

    engine
}

/// An engine serving one snapshot per time, named `plt00000`, `plt00001`, ... in the order
/// given, along with those names.
///
pub(crate) fn series(dimensionality: usize, times: &[f64]) -> (MemoryEngine, Vec<PathBuf>) {
    let snapshots: Vec<(PathBuf, AmrSnapshot)> = times
        .iter()
        .enumerate()
        .map(|(i, time)| {
            (
                PathBuf::from(format!("plt{i:05}")),
                snapshot(dimensionality, *time),
            )
        })
        .collect();
    let paths = snapshots.iter().map(|(path, _)| path.clone()).collect();

    (engine_with(snapshots), paths)
}
