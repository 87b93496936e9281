//! # Typed Blocks - Type Inference for a Visual Block Editor
//!
//! A Hindley-Milner type checker for programs that are edited as a graph of
//! blocks rather than as text. Every block has typed ports; plugging an
//! output into an input is only allowed when the two types unify, and the
//! whole workspace is re-inferred as blocks are reshaped.
//!
//! ## Architecture Overview
//!
//! 1. **Types** (`types`) - Type terms, substitutions, unification, the
//!    type-variable registry, Algorithm W and XML serialization of types
//! 2. **Expressions** (`expr`) - The lambda calculus that inference runs on
//! 3. **Graph** (`graph`) - The block arena and the lowering of block trees
//!    into expressions
//! 4. **Workspace** (`workspace`) - Connect, disconnect and structural edits,
//!    whole-workspace inference, warnings and garbage collection
//!
//! ## Pipeline Flow
//!
//! ```text
//! Block Graph (graph::BlockGraph)
//!     ↓
//! [Lowering] → Expression (expr::Expression) + holes for unplugged inputs
//!     ↓
//! [Algorithm W] → Substitution + annotations keyed by block / port
//!     ↓
//! [Write-back] → port types, type parameters, warnings
//! ```
//!
//! ## Key Design Decisions
//!
//! ### Incremental Unification
//! Connecting two ports only unifies their two types and applies the
//! unifier to every port of every canvas. Full inference runs after edits
//! that can lose information: disconnection, deletion and structural changes.
//!
//! ### Shared Type Variables
//! Type variables are drawn from one registry per workspace. Names come from
//! a fixed pool of letters with display colours, falling back to numbered
//! names when the pool runs out, and unreferenced names are reclaimed by a
//! debounced mark-and-sweep collection.
//!
//! ### Holes
//! An unplugged input lowers to a variable tagged with its port. At the top
//! level the holes are abstracted, so `_ + 1` has type `Number -> Number`.
//!
//! ## Module Structure
//!
//! - [`types`] - Type representation and inference
//! - [`expr`] - Expression trees with block and port tags
//! - [`graph`] - Blocks, ports and lowering
//! - [`workspace`] - The editing surface
//! - [`config`] - TOML configuration
//!
//! ## Example
//!
//! ```no_run
//! use typed_blocks::workspace::Workspace;
//!
//! let mut ws = Workspace::new()?;
//! let plus = ws.add_operator("+")?;
//! let one = ws.add_number("1")?;
//! ws.connect_component(one, plus, "ARG1")?;
//! ws.infer_workspace()?;
//! # Ok::<(), typed_blocks::workspace::WorkspaceError>(())
//! ```

pub mod config;
pub mod expr;
pub mod graph;
pub mod types;
pub mod workspace;
