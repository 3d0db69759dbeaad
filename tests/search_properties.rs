use itertools::Itertools;
use stepwise_pathfinding::{
    ControlEvent, HeuristicKind, MapConfig, MapConfigHandle, SearchEngine, SearchStatus,
    StepOutcome, TerrainWeights,
};

fn seeded(seed: u64, heuristic: HeuristicKind) -> MapConfig {
    MapConfig::new(12, 12, 16)
        .with_heuristic(heuristic)
        .with_terrain(TerrainWeights::mixed(0.2))
        .with_seed(seed)
}

fn expansion_order(engine: &mut SearchEngine) -> Vec<usize> {
    let mut order = Vec::new();
    while !engine.status().is_terminal() {
        if let StepOutcome::Expanded(ix) = engine.step().unwrap() {
            order.push(ix);
        }
    }
    order
}

#[test]
fn found_paths_are_connected_and_simple() {
    for heuristic in HeuristicKind::ALL {
        let allow_diagonals = heuristic.allows_diagonal_movement();
        for seed in 0..100 {
            let config = seeded(seed, heuristic).into_shared();
            let mut engine = SearchEngine::new(&config);
            engine.rebuild().unwrap();
            if engine.finish().unwrap() != SearchStatus::PathFound {
                continue;
            }
            let path = engine.path();
            let grid = engine.grid().unwrap();
            assert!(path.iter().all_unique());
            assert_eq!(path.first(), Some(&(11, 11)));
            assert_eq!(path.last(), Some(&(0, 0)));
            for ((row, column), (next_row, next_column)) in path.iter().copied().tuple_windows() {
                let next = grid.index(next_row, next_column).unwrap();
                assert!(grid.is_walkable(next_row, next_column));
                assert!(grid.neighbors(row, column, allow_diagonals).contains(&next));
            }
        }
    }
}

#[test]
fn costs_only_improve_and_closed_cells_stay_final() {
    for heuristic in HeuristicKind::ALL {
        for seed in 0..100 {
            let config = MapConfig::new(10, 10, 16)
                .with_heuristic(heuristic)
                .with_terrain(TerrainWeights::mixed(0.2))
                .with_seed(seed)
                .into_shared();
            let mut engine = SearchEngine::new(&config);
            engine.rebuild().unwrap();
            while !engine.status().is_terminal() {
                let before = engine.grid().unwrap().cells().to_vec();
                engine.step().unwrap();
                let after = engine.grid().unwrap().cells();
                for (old, new) in before.iter().zip_eq(after) {
                    assert!(new.g_cost() <= old.g_cost(), "{heuristic}, seed {seed}");
                    if old.is_closed() {
                        assert!(new.is_closed());
                        assert_eq!(new.g_cost(), old.g_cost());
                        assert_eq!(new.parent(), old.parent());
                    }
                }
            }
        }
    }
}

#[test]
fn reset_replays_the_same_expansions() {
    for seed in 0..20 {
        let config = seeded(seed, HeuristicKind::Octile).into_shared();
        let mut engine = SearchEngine::new(&config);
        engine.rebuild().unwrap();
        let first = expansion_order(&mut engine);
        let first_status = engine.status();
        engine.reset().unwrap();
        assert_eq!(engine.stats().expansions, 0);
        assert_eq!(expansion_order(&mut engine), first);
        assert_eq!(engine.status(), first_status);

        // The same seed also rebuilds the same terrain
        let mut other = SearchEngine::new(&config);
        other.rebuild().unwrap();
        assert_eq!(
            other.grid().unwrap().to_string(),
            engine.grid().unwrap().to_string()
        );
        assert_eq!(expansion_order(&mut other), first);
    }
}

#[test]
fn expansions_never_exceed_the_cell_count() {
    for seed in 0..50 {
        let config = seeded(seed, HeuristicKind::Euclidean).into_shared();
        let mut engine = SearchEngine::new(&config);
        engine.rebuild().unwrap();
        engine.finish().unwrap();
        let stats = engine.stats();
        assert!(stats.expansions <= 12 * 12);
        // Exhausting takes one extra step on the empty frontier
        let extra = usize::from(engine.status() == SearchStatus::Exhausted);
        assert_eq!(stats.steps, stats.expansions + stats.discarded + extra);
        assert_eq!(engine.closed_cells().len(), stats.expansions);
    }
}

#[test]
fn drives_a_search_through_events() {
    let config = MapConfig::new(6, 6, 16)
        .with_heuristic(HeuristicKind::Manhattan)
        .with_terrain(TerrainWeights::walls_only(0.0))
        .with_simulation_speed(1.0)
        .into_shared();
    let mut engine = SearchEngine::new(&config);
    assert_eq!(engine.handle(ControlEvent::Rebuild), Ok(SearchStatus::Paused));
    assert_eq!(engine.handle(ControlEvent::Start), Ok(SearchStatus::Running));
    let mut ticks = 0;
    while engine.is_running() {
        engine.handle(ControlEvent::Tick(0.02)).unwrap();
        ticks += 1;
        assert!(ticks < 1000);
    }
    assert_eq!(engine.status(), SearchStatus::PathFound);
    assert_eq!(engine.path_cost(), Some(10.0));
    assert_eq!(engine.path().len(), 11);

    // Edits made to the configuration take effect on the next reset
    config.borrow_mut().heuristic = HeuristicKind::Octile;
    assert_eq!(engine.handle(ControlEvent::Reset), Ok(SearchStatus::Paused));
    assert_eq!(engine.heuristic(), HeuristicKind::Octile);
    assert_eq!(engine.finish(), Ok(SearchStatus::PathFound));
    assert!((engine.path_cost().unwrap() - 5.0 * std::f32::consts::SQRT_2).abs() < 1e-4);

    let other = MapConfig::new(3, 3, 16).with_seed(3).into_shared();
    assert_eq!(
        engine.handle(ControlEvent::MapConfigurationChanged(MapConfigHandle::new(
            &other
        ))),
        Ok(SearchStatus::Paused)
    );
    assert_eq!(engine.grid().map(|grid| grid.len()), Some(9));
    drop(other);
    assert!(engine.handle(ControlEvent::Step).is_err());
}
