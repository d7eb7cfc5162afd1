//! Aggregated path statistics.
//!
//! A `PathStatistics` is a static multiset of observed node sequences.
//! It is filled once through [`PathStatistics::add`] (directly or by the
//! `io` loader) and then handed, read-only, to the models.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};

/// Observed paths with their multiplicities.
///
/// # Invariants
/// - Every stored sequence contains at least one node
/// - Every stored count is strictly positive (adding a zero count is a no-op)
/// - Iteration order is the lexicographic order of the sequences, so every
///   sum computed over the statistics is reproducible
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PathStatistics {
	/// Node sequence -> number of times it was observed
	paths: BTreeMap<Vec<String>, u64>,
}

impl PathStatistics {
	/// Creates empty statistics.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `count` observations of `sequence`.
	///
	/// Counts of an already known sequence are summed.
	///
	/// # Errors
	/// Returns `ModelError::EmptyPath` if `sequence` has no node.
	pub fn add<S: AsRef<str>>(&mut self, sequence: &[S], count: u64) -> ModelResult<()> {
		if sequence.is_empty() {
			return Err(ModelError::EmptyPath);
		}
		if count == 0 {
			return Ok(());
		}
		let key: Vec<String> = sequence.iter().map(|node| node.as_ref().to_owned()).collect();
		let entry = self.paths.entry(key).or_insert(0);
		*entry = entry.saturating_add(count);
		Ok(())
	}

	/// Adds a comma separated path such as `"a,c,d"`.
	///
	/// Surrounding whitespace of each node is trimmed, empty fields are ignored.
	pub fn add_path(&mut self, path: &str, count: u64) -> ModelResult<()> {
		let nodes: Vec<&str> = path
			.split(',')
			.map(str::trim)
			.filter(|node| !node.is_empty())
			.collect();
		self.add(&nodes, count)
	}

	/// Returns a copy where every count is multiplied by `factor`.
	///
	/// Maximum-likelihood transition estimates are unchanged by scaling,
	/// while log-likelihoods scale linearly. Useful to probe statistical power.
	///
	/// # Errors
	/// Returns `ModelError::InvalidScaleFactor` if `factor` is zero.
	pub fn scale(&self, factor: u64) -> ModelResult<Self> {
		let mut scaled = self.clone();
		scaled.scale_in_place(factor)?;
		Ok(scaled)
	}

	/// In-place variant of [`scale`](Self::scale).
	pub fn scale_in_place(&mut self, factor: u64) -> ModelResult<()> {
		if factor == 0 {
			return Err(ModelError::InvalidScaleFactor(factor));
		}
		for count in self.paths.values_mut() {
			*count = count.saturating_mul(factor);
		}
		Ok(())
	}

	/// Merges another statistics object into this one (counts are summed).
	pub fn merge(&mut self, other: &Self) {
		for (path, count) in &other.paths {
			let entry = self.paths.entry(path.clone()).or_insert(0);
			*entry = entry.saturating_add(*count);
		}
	}

	/// Total number of observed paths (sum of all counts).
	pub fn total_count(&self) -> u64 {
		self.paths.values().sum()
	}

	/// Iterates over `(sequence, count)` pairs in lexicographic order.
	pub fn sequences(&self) -> impl Iterator<Item = (&[String], u64)> {
		self.paths.iter().map(|(path, count)| (path.as_slice(), *count))
	}

	/// Count of a given sequence, 0 if it was never observed.
	pub fn count<S: AsRef<str>>(&self, sequence: &[S]) -> u64 {
		let key: Vec<String> = sequence.iter().map(|node| node.as_ref().to_owned()).collect();
		self.paths.get(&key).copied().unwrap_or(0)
	}

	/// Number of distinct sequences.
	pub fn len(&self) -> usize {
		self.paths.len()
	}

	pub fn is_empty(&self) -> bool {
		self.paths.is_empty()
	}

	/// All distinct nodes, sorted.
	pub fn nodes(&self) -> BTreeSet<&str> {
		self.paths
			.keys()
			.flat_map(|path| path.iter().map(String::as_str))
			.collect()
	}

	/// Weighted number of occurrences of each node, over every position of
	/// every path.
	pub fn node_occurrences(&self) -> BTreeMap<&str, u64> {
		let mut occurrences = BTreeMap::new();
		for (path, count) in &self.paths {
			for node in path {
				*occurrences.entry(node.as_str()).or_insert(0) += *count;
			}
		}
		occurrences
	}

	/// Weighted number of node-to-node transitions in the data.
	pub fn observed_transitions(&self) -> u64 {
		self.paths
			.iter()
			.map(|(path, count)| (path.len() as u64 - 1) * count)
			.sum()
	}

	/// Number of nodes of the longest observed sequence.
	pub fn max_path_length(&self) -> usize {
		self.paths.keys().map(Vec::len).max().unwrap_or(0)
	}

	/// First-order topology: every observed direct transition `u -> v`.
	pub(crate) fn successors(&self) -> BTreeMap<&str, BTreeSet<&str>> {
		let mut successors: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
		for path in self.paths.keys() {
			for pair in path.windows(2) {
				successors.entry(pair[0].as_str()).or_default().insert(pair[1].as_str());
			}
		}
		successors
	}
}
