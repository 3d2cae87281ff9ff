use emu_core::SystemId;
use emu_dist::partition::{Block, CostBalanced, PartitionStrategy, RoundRobin};
use emu_dist::{partition, StrategyKind};
use proptest::prelude::*;

#[test]
fn sixteen_systems_on_eight_processes() {
    let p = partition(16, 8).unwrap();
    assert_eq!(p.sizes(), vec![2; 8]);
    assert_eq!(p.max_load(), 2);
    assert!(p.idle_ranks().is_empty());
    assert_eq!(p.systems_for(3), vec![SystemId::from_raw(3), SystemId::from_raw(11)]);
}

#[test]
fn sixteen_systems_on_fifteen_processes() {
    let p = partition(16, 15).unwrap();
    let sizes = p.sizes();
    assert_eq!(p.max_load(), 2);
    assert_eq!(sizes.iter().filter(|&&s| s == 2).count(), 1);
    assert_eq!(sizes.iter().filter(|&&s| s == 1).count(), 14);
    assert_eq!(p.owner(SystemId::from_raw(15)), Some(0));
}

#[test]
fn ten_systems_on_three_processes() {
    let p = partition(10, 3).unwrap();
    let mut sizes = p.sizes();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(sizes, vec![4, 3, 3]);
    assert_eq!(p.max_load(), 4);
    assert!(p.is_balanced());
}

#[test]
fn fewer_systems_than_processes_leaves_idle_ranks() {
    let p = partition(3, 5).unwrap();
    assert_eq!(p.idle_ranks(), vec![3, 4]);
    assert_eq!(p.max_load(), 1);
    assert_eq!(p.owner(SystemId::from_raw(7)), None);
}

#[test]
fn empty_system_set_is_valid() {
    let p = partition(0, 4).unwrap();
    assert_eq!(p.n_systems(), 0);
    assert_eq!(p.max_load(), 0);
    assert_eq!(p.idle_ranks(), vec![0, 1, 2, 3]);
}

#[test]
fn zero_processes_is_a_partition_error() {
    let err = partition(4, 0).unwrap_err();
    assert_eq!(err.code(), "partition_no_processes");
    for kind in [StrategyKind::RoundRobin, StrategyKind::Block, StrategyKind::CostBalanced] {
        assert_eq!(kind.assign(&[1.0], 0).unwrap_err().code(), "partition_no_processes");
    }
}

#[test]
fn block_strategy_is_contiguous() {
    let p = Block.assign(&[1.0; 10], 3).unwrap();
    assert_eq!(p.assignments(), &[0, 0, 0, 0, 1, 1, 1, 2, 2, 2]);
}

#[test]
fn cost_balanced_spreads_expensive_systems() {
    let costs = [9.0, 1.0, 1.0, 1.0, 8.0, 1.0, 1.0, 1.0];
    let p = CostBalanced.assign(&costs, 2).unwrap();
    assert_ne!(p.owner(SystemId::from_raw(0)), p.owner(SystemId::from_raw(4)));
    let mut loads = vec![0.0; 2];
    for (system, &rank) in p.assignments().iter().enumerate() {
        loads[rank] += costs[system];
    }
    assert_eq!(loads, vec![12.0, 11.0]);

    let err = CostBalanced.assign(&[1.0, f64::NAN], 2).unwrap_err();
    assert_eq!(err.code(), "partition_invalid_cost");
}

#[test]
fn cost_balanced_never_exceeds_the_count_optimum() {
    let p = CostBalanced.assign(&[10.0, 1.0, 1.0, 1.0], 2).unwrap();
    assert_eq!(p.sizes(), vec![2, 2]);
    assert_eq!(p.max_load(), 2);
    assert!(p.is_balanced());
    assert_eq!(p.systems_for(0), vec![SystemId::from_raw(0), SystemId::from_raw(3)]);
}

#[test]
fn strategy_kind_reads_kebab_case() {
    let kind: StrategyKind = serde_json::from_str("\"cost-balanced\"").unwrap();
    assert_eq!(kind, StrategyKind::CostBalanced);
    assert_eq!(kind.strategy().name(), "cost-balanced");
    assert_eq!(StrategyKind::default().strategy().name(), RoundRobin.name());
}

proptest! {
    #[test]
    fn every_system_has_exactly_one_owner(systems in 0usize..200, processes in 1usize..40) {
        for kind in [StrategyKind::RoundRobin, StrategyKind::Block, StrategyKind::CostBalanced] {
            let p = kind.assign(&vec![1.0; systems], processes).unwrap();
            prop_assert_eq!(p.n_systems(), systems);
            prop_assert_eq!(p.sizes().iter().sum::<usize>(), systems);
            let mut seen = vec![0usize; systems];
            for rank in 0..processes {
                for system in p.systems_for(rank) {
                    seen[system.index()] += 1;
                    prop_assert_eq!(p.owner(system), Some(rank));
                }
            }
            prop_assert!(seen.iter().all(|&count| count == 1));
            prop_assert!(p.max_load() <= systems.div_ceil(processes));
            prop_assert!(p.is_balanced());
        }
    }

    #[test]
    fn uneven_costs_stay_within_the_count_optimum(
        costs in proptest::collection::vec(0.0f64..1000.0, 0..120),
        processes in 1usize..24,
    ) {
        for kind in [StrategyKind::RoundRobin, StrategyKind::Block, StrategyKind::CostBalanced] {
            let p = kind.assign(&costs, processes).unwrap();
            prop_assert_eq!(p.n_systems(), costs.len());
            prop_assert_eq!(p.sizes().iter().sum::<usize>(), costs.len());
            prop_assert!(p.max_load() <= costs.len().div_ceil(processes));
            prop_assert!(p.is_balanced());
        }
    }

    #[test]
    fn partitioning_is_deterministic(
        costs in proptest::collection::vec(0.0f64..100.0, 0..64),
        processes in 1usize..16,
    ) {
        for kind in [StrategyKind::RoundRobin, StrategyKind::Block, StrategyKind::CostBalanced] {
            prop_assert_eq!(kind.assign(&costs, processes).unwrap(), kind.assign(&costs, processes).unwrap());
        }
    }
}
