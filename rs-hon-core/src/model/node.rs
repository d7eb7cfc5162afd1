use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A k-order node: a sequence of `k` underlying nodes used as a single
/// state of an order-k Markov chain.
///
/// The empty sequence is the start state of the order-0 model.
///
/// Ordering and hashing are those of the underlying slice, so maps keyed
/// by `HigherOrderNode` can be queried with a plain `&[String]`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HigherOrderNode(Vec<String>);

impl HigherOrderNode {
	pub fn new(nodes: Vec<String>) -> Self {
		Self(nodes)
	}

	/// The start state of the order-0 model.
	pub fn start() -> Self {
		Self(Vec::new())
	}

	pub fn from_slice<S: AsRef<str>>(nodes: &[S]) -> Self {
		Self(nodes.iter().map(|node| node.as_ref().to_owned()).collect())
	}

	/// Number of underlying nodes (the order this state belongs to).
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_start(&self) -> bool {
		self.0.is_empty()
	}

	pub fn nodes(&self) -> &[String] {
		&self.0
	}

	pub fn first(&self) -> Option<&str> {
		self.0.first().map(String::as_str)
	}

	pub fn last(&self) -> Option<&str> {
		self.0.last().map(String::as_str)
	}

	/// The state reached after observing `next`: the first node is dropped
	/// and `next` appended, so `(a, b).shifted(c) == (b, c)`.
	pub fn shifted(&self, next: &str) -> Self {
		let mut nodes: Vec<String> = self.0.iter().skip(1).cloned().collect();
		nodes.push(next.to_owned());
		Self(nodes)
	}
}

impl Borrow<[String]> for HigherOrderNode {
	fn borrow(&self) -> &[String] {
		&self.0
	}
}

impl fmt::Display for HigherOrderNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_start() {
			return write!(f, "start");
		}
		write!(f, "{}", self.0.join(","))
	}
}
