//! Artifact trees
//!
//! Owned trees of artifacts stored per association, the structural operations
//! extraction and composition are built from, and the sequence graphs that
//! keep sibling order for ordered nodes.

pub mod hasher;
pub mod node;
pub mod ops;
pub mod sequence;

pub use node::{Node, RootNode};
pub use ops::{check_consistency, extract_marked, map, merge, slice, update_artifact_references};
pub use sequence::{SequenceGraph, SequenceGraphs};
