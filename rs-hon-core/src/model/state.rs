use std::collections::BTreeMap;

use rand::Rng;

use super::node::HigherOrderNode;

/// Represents one state (row) of a higher-order transition model.
///
/// A `State` corresponds to a k-order node (`key`) and stores every
/// outgoing transition, indexed by the underlying node that follows the
/// context. Weights are observed transition counts for fitted models and
/// projected expected counts for null models.
///
/// ## Responsibilities:
/// - Accumulate window occurrences and transition weights while fitting
/// - Turn weights into maximum-likelihood transition probabilities
/// - Sample the next node proportionally to the weights
///
/// ## Invariants
/// - All transitions leave the same `key`
/// - Every stored weight is strictly positive
#[derive(Clone, Debug)]
pub struct State {
	/// Context this row belongs to.
	key: HigherOrderNode,
	/// Weighted number of times `key` was observed as a window, whether or
	/// not a node followed it.
	occurrences: u64,
	/// Outgoing transitions indexed by the next underlying node.
	/// Example: { "d" => 2.0, "e" => 2.0 }
	transitions: BTreeMap<String, f64>,
}

impl State {
	/// Creates a new empty state for the given context.
	pub fn new(key: HigherOrderNode) -> Self {
		Self {
			key,
			occurrences: 0,
			transitions: BTreeMap::new(),
		}
	}

	pub fn key(&self) -> &HigherOrderNode {
		&self.key
	}

	pub fn occurrences(&self) -> u64 {
		self.occurrences
	}

	/// Records `count` observations of the context window.
	pub fn observe(&mut self, count: u64) {
		self.occurrences = self.occurrences.saturating_add(count);
	}

	/// Adds `weight` to the transition toward `next`.
	///
	/// Non-positive weights are ignored to keep the row free of empty entries.
	pub fn add_transition(&mut self, next: &str, weight: f64) {
		if weight <= 0.0 {
			return;
		}
		*self.transitions.entry(next.to_owned()).or_insert(0.0) += weight;
	}

	/// Sum of all outgoing weights.
	pub fn total_weight(&self) -> f64 {
		self.transitions.values().sum()
	}

	/// Number of distinct successors.
	pub fn out_degree(&self) -> usize {
		self.transitions.len()
	}

	/// Iterates over `(next node, weight)` pairs.
	pub fn transitions(&self) -> impl Iterator<Item = (&str, f64)> {
		self.transitions.iter().map(|(next, weight)| (next.as_str(), *weight))
	}

	/// Maximum-likelihood probabilities `weight / total` of every successor.
	///
	/// Empty for a row without outgoing mass.
	pub fn probabilities(&self) -> impl Iterator<Item = (&str, f64)> {
		let total = self.total_weight();
		self.transitions
			.iter()
			.filter(move |_| total > 0.0)
			.map(move |(next, weight)| (next.as_str(), weight / total))
	}

	/// Samples the next node proportionally to the transition weights.
	///
	/// This method performs:
	/// - an O(n) scan over the transitions
	/// - a cumulative subtraction to select a bucket
	///
	/// Returns `None` if the state has no outgoing mass.
	pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		let total = self.total_weight();
		if total <= 0.0 {
			return None;
		}

		let mut r = rng.random_range(0.0..total);

		let mut fallback: Option<&str> = None;
		for (next, weight) in &self.transitions {
			if r < *weight {
				return Some(next.as_str());
			}
			r -= weight;
			fallback = Some(next.as_str());
		}

		// Rounding can leave a tiny remainder past the last bucket
		fallback
	}
}
