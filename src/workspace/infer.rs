//! Whole-workspace inference.
//!
//! Type declarations contribute constructors and eliminators to the global
//! environment. User functions are grouped into strongly connected
//! components of the call graph and inferred callees first, so that each
//! group sees its dependencies already generalized. Every remaining
//! top-level block is then inferred on its own against that environment,
//! and the inferred types are written back onto the ports.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use super::{Canvas, Workspace, WorkspaceError};
use crate::expr::Tag;
use crate::graph::*;
use crate::types::{
    Infer, Substitution, Type, TypeEnv, TypeError, TypeScheme, generalize, unify,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceReport {
    /// Number of top-level expressions that were inferred.
    pub roots: usize,
    pub warnings: Vec<(BlockId, String)>,
}

/// Where an inferred type is stored on a block.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Port(ConnectionId),
    Param(BlockId, String),
}

type CallGraph = BTreeMap<BlockId, BTreeSet<BlockId>>;

impl Workspace {
    /// Re-infers every top-level block of the main canvas.
    pub fn infer_workspace(&mut self) -> Result<InferenceReport, WorkspaceError> {
        let roots = self.main.top_blocks();
        self.infer_roots(&roots)
    }

    pub(super) fn infer_roots(&mut self, roots: &[BlockId]) -> Result<InferenceReport, WorkspaceError> {
        let mut stale = BTreeSet::new();
        for &root in roots {
            stale.extend(self.main.component(root)?);
        }
        for func in self.function_ids() {
            stale.extend(self.main.descendants(func)?);
        }
        for id in stale {
            self.main.block_mut(id)?.warning = None;
        }

        let env = self.global_env()?;

        let mut inferred = 0;
        for &root in roots {
            let kind = self.main.block(root)?.kind.clone();
            match kind {
                BlockKind::Function(_) | BlockKind::TypeDeclaration(_) => {}
                BlockKind::Statement(_) => {
                    let inputs = self.main.block(root)?.inputs.clone();
                    for input in inputs {
                        let Some(child) = self.main.plugged_block(input)? else {
                            continue;
                        };
                        let expected = self.main.port_type(input)?.cloned();
                        self.infer_root(&env, child, expected)?;
                        inferred += 1;
                    }
                }
                _ => {
                    self.infer_root(&env, root, None)?;
                    inferred += 1;
                }
            }
        }

        let warnings: Vec<(BlockId, String)> = self
            .main
            .blocks()
            .filter_map(|b| b.warning.clone().map(|w| (b.id, w)))
            .collect();
        info!(roots = inferred, warnings = warnings.len(), "inference finished");
        Ok(InferenceReport {
            roots: inferred,
            warnings,
        })
    }

    fn function_ids(&self) -> Vec<BlockId> {
        self.main
            .blocks()
            .filter(|b| b.kind.as_function().is_some())
            .map(|b| b.id)
            .collect()
    }

    /// Builtins, data constructors and eliminators, then user functions.
    fn global_env(&mut self) -> Result<TypeEnv, WorkspaceError> {
        let mut env = self.builtins.clone();
        let declarations: Vec<TypeDeclarationBlock> = self.declarations().cloned().collect();
        for decl in &declarations {
            for ctor in &decl.constructors {
                env.insert(ctor.name.clone(), decl.constructor_scheme(ctor));
            }
            env.insert(case_name(&decl.name), decl.case_scheme());
        }

        let mut by_name: BTreeMap<String, BlockId> = BTreeMap::new();
        for id in self.function_ids() {
            if let Some(func) = self.main.block(id)?.kind.as_function() {
                by_name.entry(func.name.clone()).or_insert(id);
            }
        }

        let mut calls = CallGraph::new();
        for &id in by_name.values() {
            let mut callees = BTreeSet::new();
            for block in self.main.descendants(id)? {
                if let Some(callee) = self.main.block(block)?.kind.operator_name() {
                    if let Some(&callee) = by_name.get(callee) {
                        callees.insert(callee);
                    }
                }
            }
            calls.insert(id, callees);
        }

        for group in call_groups(&calls) {
            self.infer_function_group(&mut env, &group)?;
        }
        Ok(env)
    }

    /// Infers a group of mutually recursive functions together. Each member
    /// is bound to a monomorphic placeholder while the group is inferred and
    /// generalized once all members are done. A member that fails is bound
    /// to `forall a. a` so its callers can still be checked.
    fn infer_function_group(&mut self, env: &mut TypeEnv, group: &[BlockId]) -> Result<(), WorkspaceError> {
        let mut members = Vec::with_capacity(group.len());
        for &id in group {
            if let Some(func) = self.main.block(id)?.kind.as_function() {
                members.push((id, func.name.clone()));
            }
        }

        let mut infer = Infer::new(&mut self.registry);
        let placeholders: Vec<Type> = members.iter().map(|_| infer.fresh_var()).collect();
        let group_env = env.extend_many(
            members
                .iter()
                .zip(&placeholders)
                .map(|((_, name), ty)| (name.clone(), TypeScheme::monomorphic(ty.clone()))),
        );

        let mut subst = Substitution::empty();
        let mut errors: Vec<(BlockId, TypeError)> = Vec::new();
        let mut failed = BTreeSet::new();
        for (i, &(id, _)) in members.iter().enumerate() {
            let built = match build_expression(&self.main, id) {
                Ok(built) => built,
                Err(err) => {
                    errors.push((id, err.into()));
                    failed.insert(i);
                    continue;
                }
            };
            let holes: Vec<(String, TypeScheme)> = built
                .holes
                .iter()
                .map(|(name, _)| (name.clone(), TypeScheme::monomorphic(infer.fresh_var())))
                .collect();
            let member_env = group_env.extend_many(holes).apply_subst(&subst);

            let mark = infer.annotation_count();
            let outcome = infer.infer_expr(&member_env, &built.expr).and_then(|(s, ty)| {
                let expected = s.apply(&subst.apply(&placeholders[i]));
                let u = unify(&ty, &expected)
                    .map_err(|err| TypeError::from_unify_error(err, Some(Tag::Block(id))))?;
                Ok(u.compose(&s.compose(&subst)))
            });
            match outcome {
                Ok(next) => subst = next,
                Err(err) => {
                    infer.truncate_annotations(mark);
                    failed.insert(i);
                    errors.push((id, err));
                }
            }
        }

        let annotations = infer.resolve_annotations(&subst);
        let schemes: Vec<TypeScheme> = placeholders
            .iter()
            .enumerate()
            .map(|(i, placeholder)| {
                if failed.contains(&i) {
                    let any = infer.registry().allocate();
                    TypeScheme::polymorphic(vec![any.clone()], Type::Var(any))
                } else {
                    generalize(&env.apply_subst(&subst), &subst.apply(placeholder))
                }
            })
            .collect();
        drop(infer);

        self.write_back(annotations)?;
        for ((_, name), scheme) in members.iter().zip(schemes) {
            debug!(function = %name, %scheme, "bound user function");
            env.insert(name.clone(), scheme);
        }
        for (id, err) in errors {
            self.warn_error(id, &err);
        }
        Ok(())
    }

    /// Infers the tree under `root`. Without an expected type, unplugged
    /// inputs become parameters of the result; with one, they are left as
    /// free placeholders and the result must match it.
    fn infer_root(&mut self, env: &TypeEnv, root: BlockId, expected: Option<Type>) -> Result<(), WorkspaceError> {
        let built = match build_expression(&self.main, root) {
            Ok(built) => built,
            Err(err) => {
                self.warn_error(root, &TypeError::from(err));
                return Ok(());
            }
        };

        let mut infer = Infer::new(&mut self.registry);
        let outcome = match expected {
            Some(expected) => {
                let holes: Vec<(String, TypeScheme)> = built
                    .holes
                    .iter()
                    .map(|(name, _)| (name.clone(), TypeScheme::monomorphic(infer.fresh_var())))
                    .collect();
                let env = env.extend_many(holes);
                infer.infer_expr(&env, &built.expr).and_then(|(s, ty)| {
                    let u = unify(&ty, &s.apply(&expected))
                        .map_err(|err| TypeError::from_unify_error(err, Some(Tag::Block(root))))?;
                    Ok(u.compose(&s))
                })
            }
            None => infer
                .infer_expr(env, &built.into_section())
                .map(|(s, _)| s),
        };

        match outcome {
            Ok(subst) => {
                let annotations = infer.resolve_annotations(&subst);
                drop(infer);
                self.write_back(annotations)
            }
            Err(err) => {
                drop(infer);
                self.warn_error(root, &err);
                Ok(())
            }
        }
    }

    fn slots_for(&self, tag: Tag, ty: Type, slots: &mut Vec<(Slot, Type)>) -> Result<(), WorkspaceError> {
        match tag {
            Tag::Connection(port) => {
                if self.main.connection(port).is_ok() {
                    slots.push((Slot::Port(port), ty));
                }
            }
            Tag::Block(id) => {
                let block = self.main.block(id)?;
                if let Some(output) = block.output {
                    slots.push((Slot::Port(output), ty));
                } else if let BlockKind::Function(func) = &block.kind {
                    let (args, ret) = ty.uncurry(func.params.len());
                    for (param, arg) in func.params.iter().zip(args) {
                        slots.push((Slot::Param(id, param.clone()), arg));
                    }
                    slots.push((Slot::Port(self.main.input_named(id, RETURN)?), ret));
                }
            }
        }
        Ok(())
    }

    fn slot_type(&self, slot: &Slot) -> Result<Option<Type>, WorkspaceError> {
        Ok(match slot {
            Slot::Port(port) => self.main.port_type(*port)?.cloned(),
            Slot::Param(block, name) => self.main.block(*block)?.type_params.get(name).cloned(),
        })
    }

    fn slot_block(&self, slot: &Slot) -> Result<BlockId, WorkspaceError> {
        Ok(match slot {
            Slot::Port(port) => self.main.connection(*port)?.block,
            Slot::Param(block, _) => *block,
        })
    }

    fn set_slot(&mut self, slot: &Slot, ty: Type) -> Result<(), WorkspaceError> {
        match slot {
            Slot::Port(port) => self.main.set_port_type(*port, ty)?,
            Slot::Param(block, name) => {
                self.main.block_mut(*block)?.type_params.insert(name.clone(), ty);
            }
        }
        Ok(())
    }

    /// Stores inferred types on the blocks they were inferred for.
    ///
    /// Fresh variables introduced by inference are renamed back to the
    /// variables the ports already held where the two agree, so an inference
    /// pass over an unchanged program leaves every port as it was. Type
    /// parameters of generic blocks follow along through the same renaming.
    fn write_back(&mut self, annotations: BTreeMap<Tag, Type>) -> Result<(), WorkspaceError> {
        let mut slots = Vec::with_capacity(annotations.len());
        for (tag, ty) in annotations {
            self.slots_for(tag, ty, &mut slots)?;
        }

        let mut members = BTreeSet::new();
        for (slot, _) in &slots {
            let block = self.slot_block(slot)?;
            if !members.contains(&block) {
                members.extend(self.main.component(block)?);
            }
        }

        // A plugged input takes its type from the output feeding it.
        let outputs: BTreeMap<ConnectionId, Type> = slots
            .iter()
            .filter_map(|(slot, ty)| match slot {
                Slot::Port(port) => Some((*port, ty.clone())),
                Slot::Param(..) => None,
            })
            .collect();
        for (output, input) in self.main.links_within(&members) {
            if let Some(ty) = outputs.get(&output) {
                slots.push((Slot::Port(input), ty.clone()));
            }
        }

        let mut refresh = Substitution::empty();
        for (slot, new) in &slots {
            let Some(old) = self.slot_type(slot)? else {
                continue;
            };
            match unify(&refresh.apply(new), &refresh.apply(&old)) {
                Ok(s) => refresh = s.compose(&refresh),
                Err(err) => debug!(?slot, %err, "overwriting stale port type"),
            }
        }

        self.main.apply_substitution_to(&refresh, &members);
        for (slot, new) in &slots {
            self.set_slot(slot, refresh.apply(new))?;
        }
        self.request_render(Canvas::Main, members);
        Ok(())
    }

    /// Attaches `err` as a warning to the block it was reported on, falling
    /// back to `root`.
    fn warn_error(&mut self, root: BlockId, err: &TypeError) {
        let target = match err.tag() {
            Some(Tag::Block(block)) if self.main.contains(block) => block,
            Some(Tag::Connection(port)) => self.main.connection(port).map_or(root, |c| c.block),
            _ => root,
        };
        warn!(block = %target, %err, "type error");
        let message = format!("{}: {}", self.config.warning, err);
        if let Ok(block) = self.main.block_mut(target) {
            block.warning = Some(message);
        }
        self.request_render(Canvas::Main, [target]);
    }
}

/// Tarjan's algorithm over the call graph. Components are emitted callees
/// first, which is the order they have to be inferred in.
fn call_groups(calls: &CallGraph) -> Vec<Vec<BlockId>> {
    struct Tarjan<'a> {
        calls: &'a CallGraph,
        index: usize,
        indices: BTreeMap<BlockId, usize>,
        low_link: BTreeMap<BlockId, usize>,
        stack: Vec<BlockId>,
        on_stack: BTreeSet<BlockId>,
        groups: Vec<Vec<BlockId>>,
    }

    impl Tarjan<'_> {
        fn visit(&mut self, v: BlockId) {
            self.indices.insert(v, self.index);
            self.low_link.insert(v, self.index);
            self.index += 1;
            self.stack.push(v);
            self.on_stack.insert(v);

            let callees = self.calls.get(&v).cloned().unwrap_or_default();
            for w in callees {
                if !self.indices.contains_key(&w) {
                    self.visit(w);
                    let low = self.low_link[&v].min(self.low_link[&w]);
                    self.low_link.insert(v, low);
                } else if self.on_stack.contains(&w) {
                    let low = self.low_link[&v].min(self.indices[&w]);
                    self.low_link.insert(v, low);
                }
            }

            if self.low_link[&v] == self.indices[&v] {
                let mut group = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.remove(&w);
                    group.push(w);
                    if w == v {
                        break;
                    }
                }
                group.sort();
                self.groups.push(group);
            }
        }
    }

    let mut tarjan = Tarjan {
        calls,
        index: 0,
        indices: BTreeMap::new(),
        low_link: BTreeMap::new(),
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        groups: Vec::new(),
    };
    for &node in calls.keys() {
        if !tarjan.indices.contains_key(&node) {
            tarjan.visit(node);
        }
    }
    tarjan.groups
}
