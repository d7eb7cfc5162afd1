use std::collections::{BTreeMap, HashMap};

use log::trace;

use super::node::HigherOrderNode;
use super::state::State;

/// Sparse row-stochastic transition matrix indexed by k-order nodes.
///
/// Row `u` holds `P(u -> v)` for every successor `v` of `u`. A row whose
/// state has no outgoing mass is all zero: it contributes no free parameter
/// and any path reaching it gets probability zero.
#[derive(Clone, Debug, Default)]
pub struct TransitionMatrix {
	/// Row/column labels, sorted.
	nodes: Vec<HigherOrderNode>,
	/// Label -> row/column index.
	index: HashMap<HigherOrderNode, usize>,
	/// Per row, `(column, probability)` sorted by column.
	rows: Vec<Vec<(usize, f64)>>,
}

impl TransitionMatrix {
	/// Builds the matrix of an order-`order` model from its states.
	///
	/// For order 0 the only row with mass is the start state and its targets
	/// are single-node states; for higher orders the target of `u` followed
	/// by `x` is `u.shifted(x)`.
	pub(crate) fn from_states(order: usize, states: &BTreeMap<HigherOrderNode, State>) -> Self {
		let nodes: Vec<HigherOrderNode> = states.keys().cloned().collect();
		let index: HashMap<HigherOrderNode, usize> = nodes
			.iter()
			.enumerate()
			.map(|(i, node)| (node.clone(), i))
			.collect();

		let mut rows = vec![Vec::new(); nodes.len()];
		for (row, state) in states.values().enumerate() {
			for (next, probability) in state.probabilities() {
				let target = if order == 0 {
					HigherOrderNode::from_slice(&[next])
				} else {
					state.key().shifted(next)
				};
				match index.get(&target) {
					Some(column) => rows[row].push((*column, probability)),
					None => trace!("transition {} -> {} has no target state", state.key(), target),
				}
			}
			rows[row].sort_by_key(|(column, _)| *column);
		}

		Self { nodes, index, rows }
	}

	/// Number of rows (and columns).
	pub fn dim(&self) -> usize {
		self.nodes.len()
	}

	/// Row/column labels in index order.
	pub fn nodes(&self) -> &[HigherOrderNode] {
		&self.nodes
	}

	/// Index of a k-order node, if it is part of the model.
	pub fn index_of(&self, node: &[String]) -> Option<usize> {
		self.index.get(node).copied()
	}

	/// `P(from -> to)`, 0 for unknown states or missing transitions.
	pub fn probability(&self, from: &[String], to: &[String]) -> f64 {
		let (Some(row), Some(column)) = (self.index_of(from), self.index_of(to)) else {
			return 0.0;
		};
		self.get(row, column)
	}

	/// Entry at `(row, column)` by index.
	pub fn get(&self, row: usize, column: usize) -> f64 {
		self.rows
			.get(row)
			.and_then(|entries| {
				entries
					.binary_search_by_key(&column, |(c, _)| *c)
					.ok()
					.map(|position| entries[position].1)
			})
			.unwrap_or(0.0)
	}

	/// Non-zero entries of the row of `from`.
	pub fn row(&self, from: &[String]) -> impl Iterator<Item = (&HigherOrderNode, f64)> {
		self.index_of(from)
			.map(|row| self.rows[row].as_slice())
			.unwrap_or(&[])
			.iter()
			.map(|(column, probability)| (&self.nodes[*column], *probability))
	}

	/// Sum of the row of `from`: 1 for states with outgoing mass, 0 otherwise.
	pub fn row_sum(&self, from: &[String]) -> f64 {
		self.row(from).map(|(_, probability)| probability).sum()
	}

	/// Every non-zero entry as `(from, to, probability)`, row by row.
	pub fn entries(&self) -> impl Iterator<Item = (&HigherOrderNode, &HigherOrderNode, f64)> {
		self.rows.iter().enumerate().flat_map(move |(row, entries)| {
			entries
				.iter()
				.map(move |(column, probability)| (&self.nodes[row], &self.nodes[*column], *probability))
		})
	}

	/// Number of non-zero entries.
	pub fn non_zero(&self) -> usize {
		self.rows.iter().map(Vec::len).sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn node(nodes: &[&str]) -> HigherOrderNode {
		HigherOrderNode::from_slice(nodes)
	}

	fn first_order_states() -> BTreeMap<HigherOrderNode, State> {
		let mut states = BTreeMap::new();
		for name in ["a", "c", "d", "e"] {
			states.insert(node(&[name]), State::new(node(&[name])));
		}
		let c = states.get_mut(node(&["c"]).nodes()).unwrap();
		c.add_transition("d", 3.0);
		c.add_transition("e", 1.0);
		states.get_mut(node(&["a"]).nodes()).unwrap().add_transition("c", 2.0);
		states
	}

	#[test]
	fn rows_are_stochastic_or_empty() {
		let matrix = TransitionMatrix::from_states(1, &first_order_states());
		assert_eq!(matrix.dim(), 4);
		assert_eq!(matrix.non_zero(), 3);
		assert!((matrix.row_sum(node(&["c"]).nodes()) - 1.0).abs() < 1e-12);
		assert!((matrix.row_sum(node(&["a"]).nodes()) - 1.0).abs() < 1e-12);
		assert_eq!(matrix.row_sum(node(&["d"]).nodes()), 0.0);
	}

	#[test]
	fn probability_lookup_by_slices() {
		let matrix = TransitionMatrix::from_states(1, &first_order_states());
		assert_eq!(matrix.probability(node(&["c"]).nodes(), node(&["d"]).nodes()), 0.75);
		assert_eq!(matrix.probability(node(&["c"]).nodes(), node(&["a"]).nodes()), 0.0);
		assert_eq!(matrix.probability(node(&["z"]).nodes(), node(&["a"]).nodes()), 0.0);
	}

	#[test]
	fn order_zero_targets_single_node_states() {
		let mut states = BTreeMap::new();
		let mut start = State::new(HigherOrderNode::start());
		start.add_transition("a", 1.0);
		start.add_transition("b", 3.0);
		states.insert(HigherOrderNode::start(), start);
		states.insert(node(&["a"]), State::new(node(&["a"])));
		states.insert(node(&["b"]), State::new(node(&["b"])));

		let matrix = TransitionMatrix::from_states(0, &states);
		assert_eq!(matrix.probability(&[], node(&["b"]).nodes()), 0.75);
		assert_eq!(matrix.entries().count(), 2);
	}
}
