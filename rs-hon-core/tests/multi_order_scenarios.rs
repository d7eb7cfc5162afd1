//! End-to-end scenarios: from path records to an estimated order.

use rs_hon_core::hypothesis::{chi2_survival, likelihood_ratio_test};
use rs_hon_core::io::{PathFormat, parse_statistics};
use rs_hon_core::{HigherOrderNetwork, MultiOrderModel, OrderSelection, PathStatistics};

const LONG_PATH: &str = "a,b,c,d,e,c,b,a,c,d,e,c,e,d,c,a";

fn statistics(records: &[(&str, u64)]) -> PathStatistics {
	let mut stats = PathStatistics::new();
	for (path, count) in records {
		stats.add_path(path, *count).unwrap();
	}
	stats
}

fn toy() -> PathStatistics {
	statistics(&[("a,c,d", 2), ("b,c,e", 2)])
}

fn long_path() -> (Vec<&'static str>, PathStatistics) {
	let path: Vec<&str> = LONG_PATH.split(',').collect();
	let mut stats = PathStatistics::new();
	stats.add(&path, 1).unwrap();
	(path, stats)
}

#[test]
fn toy_likelihoods_of_fixed_order_models() {
	let stats = toy();
	let first = HigherOrderNetwork::fitted(&stats, 1);
	let second = HigherOrderNetwork::fitted(&stats, 2);
	let second_null = HigherOrderNetwork::null(&stats, 2);

	let c = vec!["c".to_owned()];
	let d = vec!["d".to_owned()];
	let e = vec!["e".to_owned()];
	assert_eq!(first.transition_matrix().probability(&c, &d), 0.5);
	assert_eq!(first.transition_matrix().probability(&c, &e), 0.5);

	assert!((first.likelihood(&stats, false) - 0.0625).abs() < 1e-12);
	assert!((second.likelihood(&stats, false) - 1.0).abs() < 1e-12);
	assert!((second_null.likelihood(&stats, false) - 0.0625).abs() < 1e-12);
}

#[test]
fn toy_fixed_order_likelihood_ratio_test() {
	let stats = toy();
	let first = HigherOrderNetwork::fitted(&stats, 1);
	let second = HigherOrderNetwork::fitted(&stats, 2);

	let outcome = likelihood_ratio_test(
		first.log_likelihood(&stats),
		second.log_likelihood(&stats),
		first.degrees_of_freedom(),
		second.degrees_of_freedom(),
	);
	assert_eq!(outcome.dof(), 1);
	assert!((outcome.p_value() - 0.019).abs() < 1e-3);

	let scaled = stats.scale(10).unwrap();
	let scaled_outcome = likelihood_ratio_test(
		first.log_likelihood(&scaled),
		second.log_likelihood(&scaled),
		first.degrees_of_freedom(),
		second.degrees_of_freedom(),
	);
	assert!(scaled_outcome.p_value() < outcome.p_value());
	assert!((scaled_outcome.statistic() - 10.0 * outcome.statistic()).abs() < 1e-9);
}

#[test]
fn fixed_order_models_evaluate_different_sample_spaces() {
	let (path, stats) = long_path();
	let first = HigherOrderNetwork::fitted(&stats, 1);
	let second = HigherOrderNetwork::null(&stats, 2);
	let fifth = HigherOrderNetwork::null(&stats, 5);

	assert_eq!(path.len(), 16);
	assert_eq!(first.path_to_higher_order_nodes(&path)[1..].len(), 15);
	assert_eq!(second.path_to_higher_order_nodes(&path)[1..].len(), 14);
	assert_eq!(fifth.path_to_higher_order_nodes(&path)[1..].len(), 11);

	let likelihoods = [
		first.likelihood(&stats, false),
		second.likelihood(&stats, false),
		fifth.likelihood(&stats, false),
	];
	assert!(likelihoods[0] != likelihoods[1]);
	assert!(likelihoods[1] != likelihoods[2]);
}

#[test]
fn multi_order_likelihood_uses_the_same_sample_space_for_every_order() {
	let (path, stats) = long_path();
	let model = MultiOrderModel::build(&stats, 5);

	for max_order in 0..=5 {
		assert_eq!(model.evaluated_transitions(None, max_order), Ok(path.len() as u64));
		assert_eq!(MultiOrderModel::layer_schedule(path.len(), max_order).len(), path.len());
	}

	// more layers can only explain the fitted data better
	let mut previous = f64::NEG_INFINITY;
	for max_order in 0..=5 {
		let log_likelihood = model.likelihood(None, max_order, true).unwrap();
		assert!(log_likelihood.is_finite());
		assert!(log_likelihood >= previous - 1e-9);
		previous = log_likelihood;
	}
}

#[test]
fn multi_order_likelihood_matches_a_hand_computed_product() {
	let stats = statistics(&[("a,b,c,a,b,d", 1)]);
	let model = MultiOrderModel::build(&stats, 3);

	// P0(a) = 2/6, then a -> b, b -> c (1/2), c -> a, a -> b, b -> d (1/2)
	let first = model.log_likelihood(None, 1).unwrap();
	assert!((first - (1.0f64 / 12.0).ln()).abs() < 1e-12);

	// P0(a), a -> b, (a,b) -> c (1/2), then three deterministic third-order steps
	let third = model.log_likelihood(None, 3).unwrap();
	assert!((third - (1.0f64 / 6.0).ln()).abs() < 1e-12);

	assert_eq!(model.evaluated_transitions(None, 1), Ok(6));
	assert_eq!(model.evaluated_transitions(None, 3), Ok(6));
}

#[test]
fn first_order_paths_estimate_order_one() {
	let stats = statistics(&[("a,c,d", 5), ("a,c,e", 5), ("b,c,e", 5), ("b,c,d", 5)]);
	let model = MultiOrderModel::build(&stats, 2);
	assert_eq!(model.estimate_order(None, 0.05), Ok(1));
	assert_eq!(model.estimate_order(Some(&stats), 0.05), Ok(1));
}

#[test]
fn intervening_chain_requires_third_order() {
	let stats = statistics(&[("a,c,d,f", 5), ("b,c,d,g", 5)]);
	let model = MultiOrderModel::build(&stats, 3);

	// the second order cannot see past c -> d
	let second = model.likelihood_ratio_test(None, 1, 2).unwrap();
	assert_eq!(second.statistic(), 0.0);
	assert_eq!(second.p_value(), 1.0);

	let third = model.likelihood_ratio_test(None, 2, 3).unwrap();
	assert!(third.p_value() < 0.05);

	assert_eq!(model.estimate_order(None, 0.05), Ok(3));

	let mut selection = OrderSelection::default();
	selection.stop_at_first = true;
	assert_eq!(model.estimate_order_with(None, &selection), Ok(1));
}

#[test]
fn scaled_toy_rejects_first_order_in_the_multi_order_model() {
	let stats = toy().scale(10).unwrap();
	let model = MultiOrderModel::build(&stats, 2);
	let outcome = model.likelihood_ratio_test(None, 1, 2).unwrap();
	assert!(outcome.rejects(0.05));
	assert_eq!(model.estimate_order(None, 0.05), Ok(2));
}

#[test]
fn zero_dof_survival_is_a_step() {
	assert_eq!(chi2_survival(0.0, 0), 1.0);
	assert_eq!(chi2_survival(0.1, 0), 0.0);
}

#[test]
fn parsed_records_feed_the_model() {
	let records: Vec<String> = ["a,c,d,f,5", "b,c,d,g,5"].iter().map(|line| (*line).to_owned()).collect();
	let format = PathFormat { separator: ',', frequency: true };
	let stats = parse_statistics(&records, &format).unwrap();
	let model = MultiOrderModel::build(&stats, 3);
	assert_eq!(model.estimate_order(None, 0.05), Ok(3));
	assert_eq!(model.layer(3).map(HigherOrderNetwork::edge_count), Some(2));
}
