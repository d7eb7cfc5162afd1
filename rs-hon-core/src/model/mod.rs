//! Higher-order and multi-order Markov models of paths.
//!
//! This module provides:
//! - k-order nodes (`HigherOrderNode`), the states of an order-k model
//! - Transition rows (`State`) and sparse transition matrices (`TransitionMatrix`)
//! - Fixed-order models, fitted or null-projected (`HigherOrderNetwork`)
//! - The layered multi-order model and its order estimation (`MultiOrderModel`)

/// Order-k Markov chain model built from path statistics.
///
/// Handles window counting, the first-order null projection, likelihoods
/// and degrees of freedom of a single order.
pub mod higher_order;

/// Multi-order model composed of one `HigherOrderNetwork` per order.
///
/// Supports parallel construction, cross-order consistent likelihoods,
/// likelihood-ratio tests, order estimation and path sampling.
pub mod multi_order;

/// k-order node: a fixed-length sequence of underlying nodes.
pub mod node;

/// Configuration of the order estimation.
pub mod selection;

/// Internal representation of a single transition row.
///
/// Tracks outgoing weights and supports weighted random sampling.
pub mod state;

/// Sparse row-stochastic transition matrix.
pub mod transition;
