//! # Block Graph
//!
//! The program as the editor holds it: blocks with typed ports, where an
//! output port of one block may be plugged into an input port of another.
//!
//! ## Storage
//!
//! Blocks and connections live in two arenas and refer to each other by
//! [`BlockId`] and [`ConnectionId`]. Removing a block leaves a hole in the
//! arena so ids stay stable for the lifetime of the graph.
//!
//! ```text
//!   Block #2 (+)                      Block #5 (literal 20)
//!   ┌───────────────┐                 ┌──────────────┐
//!   │ ARG0  c3 ◄────┼─────────────────┼──── c9  out  │
//!   │ ARG1  c4      │                 └──────────────┘
//!   │ out   c2      │
//!   └───────────────┘
//! ```
//!
//! Each port optionally holds a [`Type`]; a plugged port holds the
//! [`ConnectionId`] of its peer in `target`, and the link is always
//! recorded on both ends.
//!
//! ## Shape
//!
//! Every output feeds at most one input, so the plugged blocks form a forest:
//! a *component* is the tree under one top-level block. Links that would
//! close a cycle are refused by [`BlockGraph::would_cycle`] before they are
//! made, and [`BlockGraph::check_acyclic`] re-validates before traversal.

pub mod build;
pub mod kind;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::types::{StructuralError, Substitution, Type};

pub use build::{BuildContext, BuiltExpression, ExpressionSource, build_expression};
pub use kind::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortKind {
    Output,
    Input(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub block: BlockId,
    pub kind: PortKind,
    pub ty: Option<Type>,
    pub target: Option<ConnectionId>,
}

impl Connection {
    pub fn is_output(&self) -> bool {
        self.kind == PortKind::Output
    }

    pub fn input_name(&self) -> Option<&str> {
        match &self.kind {
            PortKind::Input(name) => Some(name),
            PortKind::Output => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub output: Option<ConnectionId>,
    pub inputs: Vec<ConnectionId>,
    /// Named type parameters of generic blocks, e.g. a list's element type.
    pub type_params: BTreeMap<String, Type>,
    pub warning: Option<String>,
}

/// Port types for a freshly created or reset block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortLayout {
    pub output: Option<Type>,
    pub inputs: Vec<(String, Type)>,
    pub type_params: BTreeMap<String, Type>,
}

#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    blocks: Vec<Option<Block>>,
    connections: Vec<Option<Connection>>,
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_connection(&mut self, block: BlockId, kind: PortKind, ty: Type) -> ConnectionId {
        let id = ConnectionId(self.connections.len());
        self.connections.push(Some(Connection {
            id,
            block,
            kind,
            ty: Some(ty),
            target: None,
        }));
        id
    }

    pub fn add_block(&mut self, kind: BlockKind, layout: PortLayout) -> BlockId {
        let id = BlockId(self.blocks.len());
        let output = layout
            .output
            .map(|ty| self.new_connection(id, PortKind::Output, ty));
        let inputs = layout
            .inputs
            .into_iter()
            .map(|(name, ty)| self.new_connection(id, PortKind::Input(name), ty))
            .collect();
        self.blocks.push(Some(Block {
            id,
            kind,
            output,
            inputs,
            type_params: layout.type_params,
            warning: None,
        }));
        id
    }

    /// Removes a block and its ports, unplugging whatever was attached.
    pub fn remove_block(&mut self, id: BlockId) -> Result<Block, StructuralError> {
        let ports: Vec<ConnectionId> = {
            let block = self.block(id)?;
            block.output.iter().chain(block.inputs.iter()).copied().collect()
        };
        for port in ports {
            self.unlink(port)?;
            self.connections[port.0] = None;
        }
        self.blocks[id.0]
            .take()
            .ok_or(StructuralError::UnknownBlock(id))
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.get(id.0).is_some_and(Option::is_some)
    }

    pub fn block(&self, id: BlockId) -> Result<&Block, StructuralError> {
        self.blocks
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(StructuralError::UnknownBlock(id))
    }

    pub fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, StructuralError> {
        self.blocks
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(StructuralError::UnknownBlock(id))
    }

    pub fn connection(&self, id: ConnectionId) -> Result<&Connection, StructuralError> {
        self.connections
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(StructuralError::UnknownConnection(id))
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Result<&mut Connection, StructuralError> {
        self.connections
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(StructuralError::UnknownConnection(id))
    }

    /// Live blocks in id order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().flatten()
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks().map(|b| b.id).collect()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter().flatten()
    }

    pub fn port_type(&self, id: ConnectionId) -> Result<Option<&Type>, StructuralError> {
        Ok(self.connection(id)?.ty.as_ref())
    }

    pub fn set_port_type(&mut self, id: ConnectionId, ty: Type) -> Result<(), StructuralError> {
        self.connection_mut(id)?.ty = Some(ty);
        Ok(())
    }

    pub fn input_named(&self, block: BlockId, name: &str) -> Result<ConnectionId, StructuralError> {
        let block_ref = self.block(block)?;
        block_ref
            .inputs
            .iter()
            .copied()
            .find(|&c| {
                self.connection(c)
                    .is_ok_and(|conn| conn.input_name() == Some(name))
            })
            .ok_or_else(|| StructuralError::MalformedMutation {
                block,
                reason: format!("no input named `{}`", name),
            })
    }

    /// The block plugged into input `input`, if any.
    pub fn plugged_block(&self, input: ConnectionId) -> Result<Option<BlockId>, StructuralError> {
        match self.connection(input)?.target {
            Some(peer) => Ok(Some(self.connection(peer)?.block)),
            None => Ok(None),
        }
    }

    /// Blocks plugged into `block`'s inputs, in port order.
    pub fn children(&self, block: BlockId) -> Result<Vec<BlockId>, StructuralError> {
        let mut children = Vec::new();
        for &input in &self.block(block)?.inputs {
            if let Some(child) = self.plugged_block(input)? {
                children.push(child);
            }
        }
        Ok(children)
    }

    /// The block whose input `block`'s output is plugged into.
    pub fn parent(&self, block: BlockId) -> Result<Option<BlockId>, StructuralError> {
        match self.block(block)?.output {
            Some(output) => self.plugged_block(output),
            None => Ok(None),
        }
    }

    pub fn root_of(&self, block: BlockId) -> Result<BlockId, StructuralError> {
        let mut current = block;
        let mut seen = BTreeSet::new();
        while let Some(parent) = self.parent(current)? {
            if !seen.insert(current) {
                return Err(StructuralError::Cycle(current));
            }
            current = parent;
        }
        Ok(current)
    }

    /// Blocks that are not plugged into anything, in id order.
    pub fn top_blocks(&self) -> Vec<BlockId> {
        self.blocks()
            .filter(|b| matches!(self.parent(b.id), Ok(None)))
            .map(|b| b.id)
            .collect()
    }

    /// `block` and everything plugged beneath it.
    pub fn descendants(&self, block: BlockId) -> Result<BTreeSet<BlockId>, StructuralError> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![block];
        while let Some(current) = stack.pop() {
            if seen.insert(current) {
                stack.extend(self.children(current)?);
            }
        }
        Ok(seen)
    }

    /// All blocks reachable from `block` over plugged links in either direction.
    pub fn component(&self, block: BlockId) -> Result<BTreeSet<BlockId>, StructuralError> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![block];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            stack.extend(self.children(current)?);
            if let Some(parent) = self.parent(current)? {
                stack.push(parent);
            }
        }
        Ok(seen)
    }

    /// Depth-first walk below `root` that fails on the first block reached
    /// twice along one path.
    pub fn check_acyclic(&self, root: BlockId) -> Result<(), StructuralError> {
        fn visit(
            graph: &BlockGraph,
            block: BlockId,
            on_path: &mut BTreeSet<BlockId>,
            done: &mut BTreeSet<BlockId>,
        ) -> Result<(), StructuralError> {
            if done.contains(&block) {
                return Ok(());
            }
            if !on_path.insert(block) {
                return Err(StructuralError::Cycle(block));
            }
            for child in graph.children(block)? {
                visit(graph, child, on_path, done)?;
            }
            on_path.remove(&block);
            done.insert(block);
            Ok(())
        }

        visit(self, root, &mut BTreeSet::new(), &mut BTreeSet::new())
    }

    /// Whether plugging `output` into `input` would make a block its own descendant.
    pub fn would_cycle(&self, output: ConnectionId, input: ConnectionId) -> Result<bool, StructuralError> {
        let child = self.connection(output)?.block;
        let parent = self.connection(input)?.block;
        Ok(self.descendants(child)?.contains(&parent))
    }

    pub fn link(&mut self, a: ConnectionId, b: ConnectionId) -> Result<(), StructuralError> {
        self.connection(b)?;
        self.connection_mut(a)?.target = Some(b);
        self.connection_mut(b)?.target = Some(a);
        Ok(())
    }

    /// Unplugs `port`, returning the peer it was linked to.
    pub fn unlink(&mut self, port: ConnectionId) -> Result<Option<ConnectionId>, StructuralError> {
        let peer = self.connection_mut(port)?.target.take();
        if let Some(peer) = peer {
            if let Ok(peer_conn) = self.connection_mut(peer) {
                peer_conn.target = None;
            }
        }
        Ok(peer)
    }

    /// Plugged (output, input) pairs among `blocks`.
    pub fn links_within(&self, blocks: &BTreeSet<BlockId>) -> Vec<(ConnectionId, ConnectionId)> {
        self.connections()
            .filter(|c| !c.is_output() && blocks.contains(&c.block))
            .filter_map(|input| input.target.map(|output| (output, input.id)))
            .collect()
    }

    /// Applies `subst` to every port and type parameter of `blocks`,
    /// returning the blocks whose types changed.
    pub fn apply_substitution_to(
        &mut self,
        subst: &Substitution,
        blocks: &BTreeSet<BlockId>,
    ) -> BTreeSet<BlockId> {
        let mut changed = BTreeSet::new();
        if subst.is_empty() {
            return changed;
        }
        for conn in self.connections.iter_mut().flatten() {
            if !blocks.contains(&conn.block) {
                continue;
            }
            if let Some(ty) = &conn.ty {
                let updated = subst.apply(ty);
                if updated != *ty {
                    conn.ty = Some(updated);
                    changed.insert(conn.block);
                }
            }
        }
        for block in self.blocks.iter_mut().flatten() {
            if !blocks.contains(&block.id) {
                continue;
            }
            for ty in block.type_params.values_mut() {
                let updated = subst.apply(ty);
                if updated != *ty {
                    *ty = updated;
                    changed.insert(block.id);
                }
            }
        }
        changed
    }

    pub fn apply_substitution(&mut self, subst: &Substitution) -> BTreeSet<BlockId> {
        let all: BTreeSet<BlockId> = self.blocks().map(|b| b.id).collect();
        self.apply_substitution_to(subst, &all)
    }

    /// Every type held on a port or as a type parameter.
    pub fn types(&self) -> impl Iterator<Item = &Type> {
        self.connections()
            .filter_map(|c| c.ty.as_ref())
            .chain(self.blocks().flat_map(|b| b.type_params.values()))
    }

    /// Replaces `block`'s ports with `layout`. Ports whose name survives keep
    /// their id and link; dropped ports are unplugged and the blocks that
    /// were attached to them are returned.
    pub fn replace_ports(
        &mut self,
        block: BlockId,
        layout: PortLayout,
    ) -> Result<Vec<BlockId>, StructuralError> {
        let (old_output, old_inputs) = {
            let b = self.block(block)?;
            (b.output, b.inputs.clone())
        };

        let mut detached = Vec::new();
        let mut old_by_name: BTreeMap<String, ConnectionId> = BTreeMap::new();
        for id in old_inputs {
            if let Some(name) = self.connection(id)?.input_name() {
                old_by_name.insert(name.to_string(), id);
            }
        }

        let mut inputs = Vec::with_capacity(layout.inputs.len());
        for (name, ty) in layout.inputs {
            match old_by_name.remove(&name) {
                Some(id) => {
                    self.set_port_type(id, ty)?;
                    inputs.push(id);
                }
                None => inputs.push(self.new_connection(block, PortKind::Input(name), ty)),
            }
        }
        for (_, id) in old_by_name {
            if let Some(peer) = self.unlink(id)? {
                detached.push(self.connection(peer)?.block);
            }
            self.connections[id.0] = None;
        }

        let output = match (old_output, layout.output) {
            (Some(id), Some(ty)) => {
                self.set_port_type(id, ty)?;
                Some(id)
            }
            (None, Some(ty)) => Some(self.new_connection(block, PortKind::Output, ty)),
            (Some(id), None) => {
                if self.unlink(id)?.is_some() {
                    detached.push(block);
                }
                self.connections[id.0] = None;
                None
            }
            (None, None) => None,
        };

        let b = self.block_mut(block)?;
        b.inputs = inputs;
        b.output = output;
        b.type_params = layout.type_params;
        Ok(detached)
    }
}
