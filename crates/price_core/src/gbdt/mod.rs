//! Gradient Boosted Decision Tree inference
//!
//! Ensembles are trained offline by `carprice-trainer` and persisted either as
//! bincode (the default `model.bin`) or as JSON for inspection.
//!
//! # Usage
//!
//! ```rust
//! use carprice_core::gbdt::{GbdtModel, Node, Tree};
//!
//! let tree = Tree::new(vec![
//!     Node::internal(0, 0, 0.5, 1, 2),
//!     Node::leaf(1, -0.25),
//!     Node::leaf(2, 0.25),
//! ]);
//! let model = GbdtModel::new(1, 12.0, 0.05, vec![tree]);
//!
//! assert_eq!(model.predict(&[0.1], None), 11.75);
//! ```

pub mod model;
pub mod tree;

pub use model::{GbdtModel, ModelError, MODEL_VERSION};
pub use tree::{Node, Tree};
