//! wbs - Work Breakdown Structure Outline Engine
//!
//! This library maintains the hierarchical numbering of a project
//! schedule: dotted outline numbers like `1`, `1.2`, `2.3.1`, the
//! structural operations that reshape them, and the bookkeeping those
//! operations drag along.
//!
//! # Core Concepts
//!
//! - **Hierarchy Numbers**: Dotted outline identifiers encoding both
//!   depth and sibling position
//! - **Renumbering Plans**: Minimal batches of reassignments for
//!   indent, outdent, move, and drag operations
//! - **Predecessor Remapping**: Rewriting dependency references stored
//!   by hierarchy number when indent/outdent renumber their targets
//! - **Optimistic Coordination**: Instant local projection, atomic
//!   submission, rollback on failure
//! - **Ancestor Roll-ups**: Parent dates, duration, and weighted
//!   progress recomputed from children
//!
//! # Module Organization
//!
//! - `cache`: Project-scoped task cache backing the optimistic projection
//! - `config`: Configuration loading from TOML
//! - `coordinator`: End-to-end operation lifecycle and submission
//! - `error`: Error types and result aliases
//! - `events`: JSONL event output for host integrations
//! - `hierarchy`: The dotted hierarchy number type
//! - `oplog`: Operation log and undo support
//! - `remap`: Predecessor reference remapping
//! - `renumber`: Structural operation legality and renumbering plans
//! - `rollup`: Ancestor schedule and progress aggregation
//! - `store`: Persistence seam and in-memory store
//! - `task`: Task model and outline queries

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod oplog;
pub mod remap;
pub mod renumber;
pub mod rollup;
pub mod store;
pub mod task;

pub use error::{Error, Result};
