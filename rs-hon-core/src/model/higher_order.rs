use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use super::node::HigherOrderNode;
use super::state::State;
use super::transition::TransitionMatrix;
use crate::statistics::PathStatistics;

/// How the transition probabilities of a layer were obtained.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
	/// Maximum-likelihood fit of the order-k transitions.
	Fitted,
	/// First-order transitions projected into the order-k state space: the
	/// point of the order-k parameter space without genuine k-th order
	/// correlations.
	Null,
}

/// Weighted edge between two k-order nodes, as handed to layout consumers.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Edge {
	pub source: HigherOrderNode,
	pub target: HigherOrderNode,
	pub weight: f64,
	pub probability: f64,
}

/// Order-k Markov chain model of paths.
///
/// States are k-order nodes (length-k windows of paths). An edge `(u, v)`
/// links two states whose (k-1)-suffix and (k-1)-prefix agree; its weight
/// is the number of observed transitions (fitted) or the number a
/// first-order process would produce (null).
///
/// # Invariants
/// - Fitted: `P(u -> v) = w(u, v) / sum_v' w(u, v')`
/// - Rows without outgoing mass are all zero
/// - The model is immutable after [`build`](Self::build)
#[derive(Clone, Debug)]
pub struct HigherOrderNetwork {
	order: usize,
	kind: ModelKind,
	/// Every k-order node, including those without successors
	states: BTreeMap<HigherOrderNode, State>,
	matrix: TransitionMatrix,
	degrees_of_freedom: u64,
}

impl HigherOrderNetwork {
	/// Builds the order-`order` model of `statistics`.
	///
	/// With `null_model` the order-k transitions are projected from the
	/// first-order model. For `order <= 1` the first-order model is its own
	/// projection, so the flag has no effect there.
	pub fn build(statistics: &PathStatistics, order: usize, null_model: bool) -> Self {
		let (kind, states, degrees_of_freedom) = match order {
			0 => (ModelKind::Fitted, zero_order_states(statistics), zero_order_dof(statistics)),
			k if null_model && k >= 2 => {
				(ModelKind::Null, null_states(statistics, k), fitted_dof(statistics, k - 1))
			}
			k => (ModelKind::Fitted, fitted_states(statistics, k), fitted_dof(statistics, k)),
		};
		let matrix = TransitionMatrix::from_states(order, &states);

		debug!(
			"built {:?} order-{} network: {} nodes, {} edges, {} degrees of freedom",
			kind,
			order,
			states.len(),
			matrix.non_zero(),
			degrees_of_freedom
		);

		Self { order, kind, states, matrix, degrees_of_freedom }
	}

	/// Fitted order-k model.
	pub fn fitted(statistics: &PathStatistics, order: usize) -> Self {
		Self::build(statistics, order, false)
	}

	/// Null order-k model.
	pub fn null(statistics: &PathStatistics, order: usize) -> Self {
		Self::build(statistics, order, true)
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn kind(&self) -> ModelKind {
		self.kind
	}

	pub fn is_null_model(&self) -> bool {
		self.kind == ModelKind::Null
	}

	/// The row-stochastic transition matrix.
	pub fn transition_matrix(&self) -> &TransitionMatrix {
		&self.matrix
	}

	/// Number of free parameters of the model.
	///
	/// - order 0: number of distinct nodes minus one
	/// - fitted order k: sum, over the k-order nodes that are possible in the
	///   first-order topology, of (out-degree - 1) for nodes with successors
	/// - null order k: the value of the fitted order-(k-1) model, since the
	///   projection adds no parameter
	pub fn degrees_of_freedom(&self) -> u64 {
		self.degrees_of_freedom
	}

	/// All k-order nodes (for order 0, the start state and single nodes).
	pub fn nodes(&self) -> impl Iterator<Item = &HigherOrderNode> {
		self.states.keys()
	}

	pub fn node_count(&self) -> usize {
		self.states.len()
	}

	/// Every edge with positive weight.
	pub fn edges(&self) -> Vec<Edge> {
		let mut edges = Vec::with_capacity(self.matrix.non_zero());
		for state in self.states.values() {
			for ((next, weight), (_, probability)) in state.transitions().zip(state.probabilities()) {
				edges.push(Edge {
					source: state.key().clone(),
					target: self.target(state.key(), next),
					weight,
					probability,
				});
			}
		}
		edges
	}

	pub fn edge_count(&self) -> usize {
		self.matrix.non_zero()
	}

	/// The row of a given k-order node, if it is part of the model.
	pub fn state(&self, context: &[String]) -> Option<&State> {
		self.states.get(context)
	}

	/// Probability that `next` follows `context` in this model.
	///
	/// `context` must hold exactly `order` nodes (empty for order 0);
	/// anything else has probability 0.
	pub fn probability(&self, context: &[String], next: &str) -> f64 {
		if context.len() != self.order {
			return 0.0;
		}
		let Some(state) = self.states.get(context) else {
			return 0.0;
		};
		let target = self.target(state.key(), next);
		self.matrix.probability(context, target.nodes())
	}

	/// Maps a path to the sequence of k-order nodes it traverses.
	///
	/// For k >= 1 these are the `n - k + 1` windows of the path (none if the
	/// path is shorter than k). For order 0 every node is drawn from the
	/// start state, so the sequence is the `n` single-node states.
	pub fn path_to_higher_order_nodes<S: AsRef<str>>(&self, path: &[S]) -> Vec<HigherOrderNode> {
		if self.order == 0 {
			return path.iter().map(|node| HigherOrderNode::from_slice(&[node])).collect();
		}
		if path.len() < self.order {
			return Vec::new();
		}
		path.windows(self.order).map(HigherOrderNode::from_slice).collect()
	}

	/// Transitions this order evaluates on `path`, as `(from, to)` pairs.
	///
	/// `n - k` pairs for k >= 1, `n` pairs out of the start state for order 0.
	pub fn transitions<S: AsRef<str>>(&self, path: &[S]) -> Vec<(HigherOrderNode, HigherOrderNode)> {
		let nodes = self.path_to_higher_order_nodes(path);
		if self.order == 0 {
			return nodes.into_iter().map(|node| (HigherOrderNode::start(), node)).collect();
		}
		nodes.windows(2).map(|pair| (pair[0].clone(), pair[1].clone())).collect()
	}

	/// Log-likelihood of `statistics` under this model.
	///
	/// Every path contributes `count * sum(log P)` over the transitions this
	/// order can represent; paths too short for any transition contribute
	/// nothing. Returns `-inf` as soon as a transition has probability 0.
	pub fn log_likelihood(&self, statistics: &PathStatistics) -> f64 {
		let mut likelihood = 0.0;
		for (path, count) in statistics.sequences() {
			for (from, to) in self.transitions(path) {
				let probability = self.matrix.probability(from.nodes(), to.nodes());
				if probability <= 0.0 {
					debug!("order-{} model assigns probability 0 to {} -> {}", self.order, from, to);
					return f64::NEG_INFINITY;
				}
				likelihood += count as f64 * probability.ln();
			}
		}
		likelihood
	}

	/// Likelihood of `statistics`, as a log-likelihood when `log` is set.
	///
	/// Never fails: degenerate cases map to 0 (or `-inf`).
	pub fn likelihood(&self, statistics: &PathStatistics, log: bool) -> f64 {
		let log_likelihood = self.log_likelihood(statistics);
		if log { log_likelihood } else { log_likelihood.exp() }
	}

	fn target(&self, key: &HigherOrderNode, next: &str) -> HigherOrderNode {
		if self.order == 0 {
			HigherOrderNode::from_slice(&[next])
		} else {
			key.shifted(next)
		}
	}
}

/// Order 0: a start state pointing to every node with its occurrence count.
fn zero_order_states(statistics: &PathStatistics) -> BTreeMap<HigherOrderNode, State> {
	let mut states = BTreeMap::new();
	let mut start = State::new(HigherOrderNode::start());
	for (node, occurrences) in statistics.node_occurrences() {
		start.observe(occurrences);
		start.add_transition(node, occurrences as f64);

		let mut state = State::new(HigherOrderNode::from_slice(&[node]));
		state.observe(occurrences);
		states.insert(state.key().clone(), state);
	}
	states.insert(HigherOrderNode::start(), start);
	states
}

/// Order k >= 1: every length-k window is a state, every window followed by
/// a node adds the path count to that transition.
fn fitted_states(statistics: &PathStatistics, order: usize) -> BTreeMap<HigherOrderNode, State> {
	let mut states: BTreeMap<HigherOrderNode, State> = BTreeMap::new();
	for (path, count) in statistics.sequences() {
		if path.len() < order {
			continue;
		}
		for start in 0..=path.len() - order {
			let state = states
				.entry(HigherOrderNode::from_slice(&path[start..start + order]))
				.or_insert_with_key(|key| State::new(key.clone()));
			state.observe(count);
			if let Some(next) = path.get(start + order) {
				state.add_transition(next, count as f64);
			}
		}
	}
	states
}

/// Null model of order k >= 2: every walk of k nodes the first-order
/// topology allows is a state, continuing with the first-order
/// probabilities of its last node.
///
/// The weight of `u -> u.shifted(w)` is the number of times a first-order
/// process would traverse it: `E(u) * P1(last(u) -> w)`, where `E(u)` starts
/// at the outgoing weight of the first node and is multiplied by `P1` along
/// the walk. Occurrences are those of the window in the data (0 if unseen).
fn null_states(statistics: &PathStatistics, order: usize) -> BTreeMap<HigherOrderNode, State> {
	let first_order = fitted_states(statistics, 1);
	let windows = fitted_states(statistics, order);

	let mut walks: Vec<(Vec<String>, f64)> = first_order
		.values()
		.filter(|state| state.total_weight() > 0.0)
		.map(|state| (state.key().nodes().to_vec(), state.total_weight()))
		.collect();
	for _ in 1..order {
		let mut longer = Vec::new();
		for (walk, expected) in &walks {
			let Some(row) = last_row(&first_order, walk) else {
				continue;
			};
			for (next, probability) in row.probabilities() {
				let mut extended = walk.clone();
				extended.push(next.to_owned());
				longer.push((extended, expected * probability));
			}
		}
		walks = longer;
	}

	let mut states: BTreeMap<HigherOrderNode, State> = BTreeMap::new();
	for (walk, expected) in walks {
		let key = HigherOrderNode::new(walk);
		let mut state = State::new(key.clone());
		if let Some(window) = windows.get(key.nodes()) {
			state.observe(window.occurrences());
		}
		if let Some(row) = last_row(&first_order, key.nodes()) {
			for (next, probability) in row.probabilities() {
				state.add_transition(next, expected * probability);
			}
		}
		states.insert(key, state);
	}
	states
}

fn last_row<'a>(first_order: &'a BTreeMap<HigherOrderNode, State>, walk: &[String]) -> Option<&'a State> {
	let last = walk.last()?;
	first_order.get(std::slice::from_ref(last))
}

fn zero_order_dof(statistics: &PathStatistics) -> u64 {
	(statistics.nodes().len() as u64).saturating_sub(1)
}

/// Free parameters of a fitted order-k model over the first-order topology.
///
/// A k-order node is any walk of k nodes in the topology; it ends in some
/// node `v` and has as many possible successors as `v` has. The number of
/// such walks ending in `v` is obtained by propagating walk counts along
/// the edges `k - 1` times, so no walk is enumerated.
fn fitted_dof(statistics: &PathStatistics, order: usize) -> u64 {
	if order == 0 {
		return zero_order_dof(statistics);
	}
	let successors = statistics.successors();

	let mut walks: HashMap<&str, u64> = statistics.nodes().into_iter().map(|node| (node, 1)).collect();
	for _ in 1..order {
		let mut next: HashMap<&str, u64> = HashMap::with_capacity(walks.len());
		for (source, targets) in &successors {
			let count = walks.get(source).copied().unwrap_or(0);
			if count == 0 {
				continue;
			}
			for target in targets {
				let entry = next.entry(*target).or_insert(0);
				*entry = entry.saturating_add(count);
			}
		}
		walks = next;
	}

	successors
		.iter()
		.map(|(node, targets)| {
			let walks_ending_here = walks.get(node).copied().unwrap_or(0);
			walks_ending_here.saturating_mul(targets.len() as u64 - 1)
		})
		.fold(0u64, u64::saturating_add)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn toy() -> PathStatistics {
		let mut stats = PathStatistics::new();
		stats.add_path("a,c,d", 2).unwrap();
		stats.add_path("b,c,e", 2).unwrap();
		stats
	}

	fn strings(nodes: &[&str]) -> Vec<String> {
		nodes.iter().map(|node| (*node).to_owned()).collect()
	}

	#[test]
	fn first_order_splits_mass_at_the_junction() {
		let hon = HigherOrderNetwork::fitted(&toy(), 1);
		assert_eq!(hon.probability(&strings(&["c"]), "d"), 0.5);
		assert_eq!(hon.probability(&strings(&["c"]), "e"), 0.5);
		assert_eq!(hon.probability(&strings(&["a"]), "c"), 1.0);
		assert!((hon.likelihood(&toy(), false) - 0.0625).abs() < 1e-12);
	}

	#[test]
	fn second_order_is_deterministic_on_the_toy_paths() {
		let hon = HigherOrderNetwork::fitted(&toy(), 2);
		assert_eq!(hon.probability(&strings(&["a", "c"]), "d"), 1.0);
		assert_eq!(hon.probability(&strings(&["a", "c"]), "e"), 0.0);
		assert!((hon.likelihood(&toy(), false) - 1.0).abs() < 1e-12);
		assert_eq!(hon.likelihood(&toy(), true), 0.0);
	}

	#[test]
	fn second_order_null_matches_first_order() {
		let null = HigherOrderNetwork::null(&toy(), 2);
		assert_eq!(null.kind(), ModelKind::Null);
		assert_eq!(null.probability(&strings(&["a", "c"]), "e"), 0.5);
		assert!((null.likelihood(&toy(), false) - 0.0625).abs() < 1e-12);
	}

	#[test]
	fn degrees_of_freedom_count_possible_transitions() {
		let stats = toy();
		assert_eq!(HigherOrderNetwork::fitted(&stats, 0).degrees_of_freedom(), 4);
		assert_eq!(HigherOrderNetwork::fitted(&stats, 1).degrees_of_freedom(), 1);
		// (a,c) and (b,c) can each continue to d or e
		assert_eq!(HigherOrderNetwork::fitted(&stats, 2).degrees_of_freedom(), 2);
		assert_eq!(HigherOrderNetwork::null(&stats, 2).degrees_of_freedom(), 1);
	}

	#[test]
	fn null_dof_equals_lower_fitted_dof() {
		let mut stats = PathStatistics::new();
		stats.add_path("a,c,d,f", 5).unwrap();
		stats.add_path("b,c,d,g", 5).unwrap();
		for k in 2..=4 {
			assert_eq!(
				HigherOrderNetwork::null(&stats, k).degrees_of_freedom(),
				HigherOrderNetwork::fitted(&stats, k - 1).degrees_of_freedom()
			);
		}
		assert_eq!(HigherOrderNetwork::fitted(&stats, 3).degrees_of_freedom(), 2);
	}

	#[test]
	fn path_mapping_discards_the_prefix() {
		let path: Vec<&str> = "a,b,c,d,e,c,b,a,c,d,e,c,e,d,c,a".split(',').collect();
		let mut stats = PathStatistics::new();
		stats.add(&path, 1).unwrap();
		for (order, expected) in [(1, 15), (2, 14), (5, 11)] {
			let hon = HigherOrderNetwork::null(&stats, order);
			assert_eq!(hon.path_to_higher_order_nodes(&path).len() - 1, expected);
			assert_eq!(hon.transitions(&path).len(), expected);
		}
		let zero = HigherOrderNetwork::fitted(&stats, 0);
		assert_eq!(zero.transitions(&path).len(), path.len());
	}

	#[test]
	fn single_layer_likelihoods_differ_across_orders() {
		let path: Vec<&str> = "a,b,c,d,e,c,b,a,c,d,e,c,e,d,c,a".split(',').collect();
		let mut stats = PathStatistics::new();
		stats.add(&path, 1).unwrap();
		let first = HigherOrderNetwork::fitted(&stats, 1).log_likelihood(&stats);
		let second = HigherOrderNetwork::null(&stats, 2).log_likelihood(&stats);
		let fifth = HigherOrderNetwork::null(&stats, 5).log_likelihood(&stats);
		assert!(first < second);
		assert!(second < fifth);
	}

	#[test]
	fn short_paths_contribute_the_identity_factor() {
		let mut stats = PathStatistics::new();
		stats.add_path("a,b", 3).unwrap();
		let hon = HigherOrderNetwork::fitted(&stats, 3);
		assert_eq!(hon.node_count(), 0);
		assert_eq!(hon.log_likelihood(&stats), 0.0);
		assert_eq!(hon.likelihood(&stats, false), 1.0);
	}

	#[test]
	fn unseen_transitions_yield_zero_likelihood() {
		let hon = HigherOrderNetwork::fitted(&toy(), 2);
		let mut other = PathStatistics::new();
		other.add_path("a,c,e", 1).unwrap();
		assert_eq!(hon.log_likelihood(&other), f64::NEG_INFINITY);
		assert_eq!(hon.likelihood(&other, false), 0.0);
	}

	#[test]
	fn order_zero_uses_occurrence_frequencies() {
		let hon = HigherOrderNetwork::fitted(&toy(), 0);
		assert_eq!(hon.probability(&[], "c"), 4.0 / 12.0);
		assert_eq!(hon.probability(&[], "a"), 2.0 / 12.0);
		// start state plus five nodes
		assert_eq!(hon.node_count(), 6);
		assert_eq!(hon.edge_count(), 5);
	}

	#[test]
	fn edges_expose_weights_and_probabilities() {
		let hon = HigherOrderNetwork::fitted(&toy(), 1);
		let edges = hon.edges();
		assert_eq!(edges.len(), 4);
		let cd = edges
			.iter()
			.find(|edge| edge.source.nodes() == ["c"] && edge.target.nodes() == ["d"])
			.unwrap();
		assert_eq!(cd.weight, 2.0);
		assert_eq!(cd.probability, 0.5);
	}

	#[test]
	fn null_model_reaches_unobserved_contexts() {
		let null = HigherOrderNetwork::null(&toy(), 2);
		let fitted = HigherOrderNetwork::fitted(&toy(), 2);
		// crossed transitions such as (a,c) -> (c,e) only exist in the null model
		assert_eq!(null.edge_count(), 4);
		assert_eq!(fitted.edge_count(), 2);
		assert!(null.nodes().count() >= fitted.nodes().count());
	}

	#[test]
	fn null_model_covers_every_first_order_walk() {
		let mut stats = PathStatistics::new();
		stats.add_path("a,b", 1).unwrap();
		stats.add_path("b,c", 1).unwrap();
		stats.add_path("c,d", 1).unwrap();
		let mut chain = PathStatistics::new();
		chain.add_path("a,b,c,d", 1).unwrap();

		let first = HigherOrderNetwork::fitted(&stats, 1);
		let third = HigherOrderNetwork::null(&stats, 3);
		assert_eq!(first.log_likelihood(&chain), 0.0);
		assert_eq!(third.log_likelihood(&chain), first.log_likelihood(&chain));

		// (a,b,c) and (b,c,d) were never observed as windows
		assert_eq!(third.node_count(), 2);
		assert_eq!(third.edge_count(), 1);
		assert_eq!(third.probability(&strings(&["a", "b", "c"]), "d"), 1.0);
		assert_eq!(third.state(&strings(&["a", "b", "c"])).map(State::occurrences), Some(0));
	}

	#[test]
	fn null_edge_weights_follow_the_first_order_process() {
		let null = HigherOrderNetwork::null(&toy(), 2);
		let edge = null
			.edges()
			.into_iter()
			.find(|edge| edge.source.nodes() == ["a", "c"] && edge.target.nodes() == ["c", "e"])
			.unwrap();
		// a leaves twice, every a continues to c, c splits evenly
		assert_eq!(edge.weight, 1.0);
		assert_eq!(edge.probability, 0.5);
	}
}
