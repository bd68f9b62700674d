//! End-to-end properties of the jump flooding engine.

use jfa_core::{
    Buffer, CpuKernel, DistanceMode, EngineConfig, Grid, PingPongScheduler, SeedPoint,
    StepSequence, VoronoiEngine, VoronoiError,
};
use proptest::prelude::*;

fn new_engine<P>(width: u32, height: u32, mode: DistanceMode) -> VoronoiEngine<P> {
    VoronoiEngine::with_config(width, height, EngineConfig { mode }).unwrap()
}

fn brute_force_distance(seeds: &[SeedPoint<usize>], x: u32, y: u32) -> f32 {
    seeds
        .iter()
        .map(|s| {
            let dx = x as f64 - s.x as f64;
            let dy = y as f64 - s.y as f64;
            (dx * dx + dy * dy).sqrt() as f32
        })
        .fold(f32::INFINITY, f32::min)
}

// ── Scenarios ───────────────────────────────────────────────

#[test]
fn scenario_two_corners() {
    for mode in [DistanceMode::Canonical, DistanceMode::Sampled] {
        let mut engine = new_engine(4, 4, mode);
        engine
            .set_seeds(vec![SeedPoint::new(0, 0, "A"), SeedPoint::new(3, 3, "B")])
            .unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.payload(0, 0), Some(&"A"));
        assert_eq!(result.cell(0, 0).distance, 0.0);
        assert_eq!(result.payload(3, 3), Some(&"B"));
        assert_eq!(result.cell(3, 3).distance, 0.0);
        assert_eq!(result.payload(1, 1), Some(&"A"), "{}", mode);
        assert_eq!(result.payload(2, 2), Some(&"B"), "{}", mode);
    }
}

#[test]
fn scenario_single_center_seed() {
    let mut engine = new_engine(8, 8, DistanceMode::Canonical);
    engine.set_seeds(vec![SeedPoint::new(4, 4, "X")]).unwrap();
    let result = engine.run().unwrap();

    assert_eq!(result.cells().len(), 64);
    for y in 0..8 {
        for x in 0..8 {
            assert!(result.cell(x, y).occupied);
            assert_eq!(result.payload(x, y), Some(&"X"));
        }
    }
}

#[test]
fn scenario_rejected_seed_keeps_previous() {
    let mut engine = new_engine(8, 8, DistanceMode::Canonical);
    engine.set_seeds(vec![SeedPoint::new(1, 2, "Y")]).unwrap();

    let err = engine.set_seeds(vec![SeedPoint::new(8, 0, "Z")]).unwrap_err();
    assert_eq!(
        err,
        VoronoiError::OutOfBounds {
            index: 0,
            x: 8,
            y: 0,
            width: 8,
            height: 8,
        }
    );
    assert_eq!(engine.seeds(), &[SeedPoint::new(1, 2, "Y")]);

    let result = engine.run().unwrap();
    assert_eq!(result.payload(7, 7), Some(&"Y"));
}

#[test]
fn zero_seeds_leave_everything_empty() {
    let mut engine = new_engine::<()>(13, 9, DistanceMode::Canonical);
    engine.set_seeds(vec![]).unwrap();
    let result = engine.run().unwrap();
    assert!(result.cells().iter().all(|c| !c.occupied));
}

#[test]
fn duplicate_seed_last_wins() {
    let mut engine = new_engine(6, 6, DistanceMode::Canonical);
    engine
        .set_seeds(vec![
            SeedPoint::new(3, 3, "first"),
            SeedPoint::new(0, 5, "other"),
            SeedPoint::new(3, 3, "last"),
        ])
        .unwrap();
    let result = engine.run().unwrap();
    assert_eq!(result.payload(3, 3), Some(&"last"));
    assert_eq!(result.areas()[0], 0);
}

#[test]
fn pass_count_matches_grid_extent() {
    for (size, expected) in [(1u32, 1usize), (2, 1), (4, 2), (5, 3), (16, 4), (17, 5)] {
        let mut engine = new_engine::<()>(size, size, DistanceMode::Canonical);
        assert_eq!(engine.run().unwrap().passes(), expected, "size {}", size);

        // Only the larger dimension matters.
        let mut wide = new_engine::<()>(size, 1, DistanceMode::Canonical);
        assert_eq!(wide.run().unwrap().passes(), expected, "width {}", size);
        assert_eq!(StepSequence::for_grid(&Grid::new(1, size).unwrap()).passes(), expected);
    }
}

#[test]
fn repeated_runs_are_bit_identical() {
    let grid = Grid::new(50, 37).unwrap();
    let seeds = jfa_core::random_seeds(40, &grid, 3);
    let mut engine = new_engine(50, 37, DistanceMode::Sampled);
    engine.set_seeds(seeds).unwrap();

    let first: Buffer = engine.run().unwrap().buffer().clone();
    let second: Buffer = engine.run().unwrap().buffer().clone();
    assert_eq!(first, second);
    assert_eq!(engine.result().unwrap().buffer(), &second);
}

#[test]
fn independent_engines_share_nothing() {
    let mut canonical = new_engine(32, 32, DistanceMode::Canonical);
    let mut sampled = new_engine(32, 32, DistanceMode::Sampled);
    let seeds = vec![SeedPoint::new(2, 30, 0u8), SeedPoint::new(29, 3, 1u8)];
    canonical.set_seeds(seeds.clone()).unwrap();
    sampled.set_seeds(seeds).unwrap();
    canonical.run().unwrap();
    sampled.run().unwrap();

    assert_eq!(canonical.config().mode, DistanceMode::Canonical);
    assert_eq!(sampled.config().mode, DistanceMode::Sampled);
    let c = canonical.result().unwrap();
    for cell in c.cells() {
        let seed = &c.seeds()[cell.owner as usize];
        assert_eq!(cell.origin, [seed.x as u32, seed.y as u32]);
    }
}

// ── Property tests ──────────────────────────────────────────

fn arb_mode() -> impl Strategy<Value = DistanceMode> {
    prop_oneof![Just(DistanceMode::Canonical), Just(DistanceMode::Sampled)]
}

fn arb_scene() -> impl Strategy<Value = (u32, u32, Vec<(u32, u32)>)> {
    (1u32..40, 1u32..40).prop_flat_map(|(w, h)| {
        let seeds = prop::collection::vec((0..w, 0..h), 1..12);
        (Just(w), Just(h), seeds)
    })
}

fn seeds_of(points: &[(u32, u32)]) -> Vec<SeedPoint<usize>> {
    points
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| SeedPoint::new(x as i64, y as i64, i))
        .collect()
}

proptest! {
    #[test]
    fn single_seed_floods_everything(
        w in 1u32..48,
        h in 1u32..48,
        sx in 0u32..48,
        sy in 0u32..48,
        mode in arb_mode(),
    ) {
        let (sx, sy) = (sx % w, sy % h);
        let mut engine = new_engine(w, h, mode);
        engine.set_seeds(vec![SeedPoint::new(sx as i64, sy as i64, 'S')]).unwrap();
        let result = engine.run().unwrap();
        for y in 0..h {
            for x in 0..w {
                prop_assert_eq!(result.payload(x, y), Some(&'S'));
            }
        }
    }

    #[test]
    fn every_cell_reached_and_seeds_keep_their_cell(
        (w, h, points) in arb_scene(),
        mode in arb_mode(),
    ) {
        let seeds = seeds_of(&points);
        let mut engine = new_engine(w, h, mode);
        engine.set_seeds(seeds.clone()).unwrap();
        let result = engine.run().unwrap();

        prop_assert!(result.cells().iter().all(|c| c.occupied));
        for (i, s) in seeds.iter().enumerate() {
            let last = seeds.iter().rposition(|o| o.x == s.x && o.y == s.y).unwrap();
            let cell = result.cell(s.x as u32, s.y as u32);
            prop_assert_eq!(cell.owner as usize, last, "seed {}", i);
            prop_assert_eq!(cell.distance, 0.0);
        }
    }

    #[test]
    fn canonical_distance_is_exact_to_owner(
        (w, h, points) in arb_scene(),
    ) {
        let seeds = seeds_of(&points);
        let mut engine = new_engine(w, h, DistanceMode::Canonical);
        engine.set_seeds(seeds.clone()).unwrap();
        let result = engine.run().unwrap();

        for (i, cell) in result.cells().iter().enumerate() {
            let (x, y) = result.grid().coords(i);
            let owner = &seeds[cell.owner as usize];
            let dx = x as f64 - owner.x as f64;
            let dy = y as f64 - owner.y as f64;
            prop_assert_eq!(cell.distance, (dx * dx + dy * dy).sqrt() as f32);
            // Never closer than the true nearest seed.
            prop_assert!(cell.distance >= brute_force_distance(&seeds, x, y));
        }
    }

    #[test]
    fn thread_split_does_not_change_result(
        (w, h, points) in arb_scene(),
        mode in arb_mode(),
    ) {
        let seeds = seeds_of(&points);
        let grid = Grid::new(w, h).unwrap();

        let mut parallel = PingPongScheduler::new(grid);
        parallel.seed(&seeds).unwrap();
        let mut sequential = parallel.clone();

        let a = parallel.run(&CpuKernel::new(mode));
        let b = sequential.run(&CpuKernel::sequential(mode));
        prop_assert_eq!(a, b);
    }
}
