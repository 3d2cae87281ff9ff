use emu_dist::partition;
use emu_dist::throughput::{estimate, predicted_eval_rate, predicted_eval_rate_with_costs};
use emu_kernel::CostModel;

#[test]
fn fifteen_processes_are_no_faster_than_eight() {
    let cost = CostModel::default();
    let eight = predicted_eval_rate(&partition(16, 8).unwrap(), &cost, 100);
    let fifteen = predicted_eval_rate(&partition(16, 15).unwrap(), &cost, 100);
    let sixteen = predicted_eval_rate(&partition(16, 16).unwrap(), &cost, 100);
    assert_eq!(eight, fifteen);
    assert!((sixteen / eight - 2.0).abs() < 1e-12);
}

#[test]
fn rate_is_bounded_by_the_busiest_rank() {
    let cost = CostModel::default();
    let p = partition(10, 3).unwrap();
    let rate = predicted_eval_rate(&p, &cost, 50);
    assert!((rate * 4.0 * cost.evaluation_cost(50) - 1.0).abs() < 1e-12);

    let summary = estimate(&p, &cost, 50);
    assert_eq!(summary.max_load, 4);
    assert!((summary.efficiency - 10.0 / 12.0).abs() < 1e-12);
    assert_eq!(summary.eval_rate, rate);
}

#[test]
fn doubling_samples_lowers_the_rate_sublinearly_in_cost() {
    let cost = CostModel::default();
    let p = partition(16, 8).unwrap();
    let ratio = predicted_eval_rate(&p, &cost, 500) / predicted_eval_rate(&p, &cost, 1000);
    assert!(ratio > 1.0 && ratio <= 3.0);
}

#[test]
fn explicit_costs_use_the_slowest_rank() {
    let p = partition(4, 2).unwrap();
    let rate = predicted_eval_rate_with_costs(&p, &[1.0, 2.0, 3.0, 4.0]);
    assert!((rate - 1.0 / 6.0).abs() < 1e-12);
    assert_eq!(predicted_eval_rate(&partition(0, 2).unwrap(), &CostModel::default(), 10), 0.0);
}
