//! Multi-order models of paths on graphs.
//!
//! This crate decides which Markov order best describes a set of observed
//! paths. It provides:
//! - Aggregated path statistics
//! - Fixed-order (higher-order network) models, fitted or null-projected
//! - A multi-order model whose likelihood is consistent across orders
//! - Likelihood-ratio tests and order estimation
//! - Ingestion of path records from text files
//!
//! Rendering and presentation of the models are left to consumers: layers
//! expose their node and edge sets read-only.

/// Error types shared by the whole crate.
pub mod errors;

/// Path statistics (observed node sequences and their counts).
pub mod statistics;

/// Higher-order and multi-order models.
pub mod model;

/// Chi-square survival function and likelihood-ratio tests.
pub mod hypothesis;

/// Path-record ingestion (text parsing, binary cache, file helpers).
pub mod io;

pub use errors::{LoadError, ModelError, ModelResult};
pub use model::higher_order::{HigherOrderNetwork, ModelKind};
pub use model::multi_order::MultiOrderModel;
pub use model::node::HigherOrderNode;
pub use model::selection::OrderSelection;
pub use statistics::PathStatistics;
