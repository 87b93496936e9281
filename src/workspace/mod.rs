//! # Workspace
//!
//! The editing surface the block UI talks to. A [`Workspace`] owns the main
//! canvas, the palette (flyout) canvas, the type-variable registry and the
//! garbage-collection schedule, and keeps every port type consistent as the
//! user edits.
//!
//! ## Edit Protocol
//!
//! ```text
//! connect        unify the two port types, refuse on failure, otherwise
//!                broadcast the substitution to every port of both canvases
//! disconnect     reset both halves to fresh variables, re-unify their links,
//!                re-infer the two components
//! structural     rewrite the block's ports, reset its component,
//!                re-infer the whole workspace
//! ```
//!
//! Every edit schedules a debounced garbage collection; the caller drives it
//! with [`Workspace::poll_gc`] or forces it with [`Workspace::run_gc`].
//!
//! Full inference lives in the `infer` submodule.

mod error;
mod infer;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::debug;

use crate::config::Config;
use crate::graph::*;
use crate::types::builtins::{builtin_env, statement_signatures};
use crate::types::{
    GcReport, GcScheduler, Substitution, Type, TypeEnv, TypeScheme, TypeVar, TypeVarRegistry,
    StructuralError, instantiate, unify,
};

pub use error::WorkspaceError;
pub use infer::InferenceReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Canvas {
    Main,
    Flyout,
}

pub struct Workspace {
    config: Config,
    main: BlockGraph,
    flyout: BlockGraph,
    registry: TypeVarRegistry,
    builtins: TypeEnv,
    statements: BTreeMap<String, Vec<Type>>,
    gc: GcScheduler,
    render_requests: BTreeSet<(Canvas, BlockId)>,
}

impl Workspace {
    pub fn new() -> Result<Self, WorkspaceError> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self, WorkspaceError> {
        Ok(Workspace {
            registry: TypeVarRegistry::with_fallback_colour(config.fallback_colour.clone()),
            gc: GcScheduler::new(config.gc_debounce()),
            builtins: builtin_env()?,
            statements: statement_signatures()?,
            main: BlockGraph::new(),
            flyout: BlockGraph::new(),
            render_requests: BTreeSet::new(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self, canvas: Canvas) -> &BlockGraph {
        match canvas {
            Canvas::Main => &self.main,
            Canvas::Flyout => &self.flyout,
        }
    }

    fn graph_mut(&mut self, canvas: Canvas) -> &mut BlockGraph {
        match canvas {
            Canvas::Main => &mut self.main,
            Canvas::Flyout => &mut self.flyout,
        }
    }

    pub fn main(&self) -> &BlockGraph {
        &self.main
    }

    pub fn flyout(&self) -> &BlockGraph {
        &self.flyout
    }

    pub fn registry(&self) -> &TypeVarRegistry {
        &self.registry
    }

    pub fn block(&self, id: BlockId) -> Result<&Block, WorkspaceError> {
        Ok(self.main.block(id)?)
    }

    pub fn warning(&self, id: BlockId) -> Option<&str> {
        self.main.block(id).ok().and_then(|b| b.warning.as_deref())
    }

    pub fn output_type(&self, id: BlockId) -> Result<Option<Type>, WorkspaceError> {
        match self.main.block(id)?.output {
            Some(output) => Ok(self.main.port_type(output)?.cloned()),
            None => Ok(None),
        }
    }

    pub fn input_type(&self, id: BlockId, port: &str) -> Result<Option<Type>, WorkspaceError> {
        let input = self.main.input_named(id, port)?;
        Ok(self.main.port_type(input)?.cloned())
    }

    pub fn type_param(&self, id: BlockId, name: &str) -> Result<Option<Type>, WorkspaceError> {
        Ok(self.main.block(id)?.type_params.get(name).cloned())
    }

    // Type variables

    pub fn allocate_type_variable(&mut self) -> TypeVar {
        self.registry.allocate()
    }

    fn fresh(&mut self) -> Type {
        Type::Var(self.registry.allocate())
    }

    pub fn trigger_garbage_collection(&mut self) {
        self.gc.schedule(Instant::now());
    }

    pub fn gc_pending(&self) -> bool {
        self.gc.is_pending()
    }

    /// Runs the scheduled collection if its deadline has passed.
    pub fn poll_gc(&mut self, now: Instant) -> Option<GcReport> {
        if self.gc.take_due(now) {
            Some(self.run_gc())
        } else {
            None
        }
    }

    /// Collects immediately, re-reading every type on both canvases.
    pub fn run_gc(&mut self) -> GcReport {
        self.gc.cancel();
        let roots = self.main.types().chain(self.flyout.types());
        self.registry.collect(roots)
    }

    pub fn take_render_requests(&mut self) -> Vec<(Canvas, BlockId)> {
        std::mem::take(&mut self.render_requests).into_iter().collect()
    }

    fn request_render(&mut self, canvas: Canvas, blocks: impl IntoIterator<Item = BlockId>) {
        self.render_requests
            .extend(blocks.into_iter().map(|b| (canvas, b)));
    }

    // Lookups

    fn declarations(&self) -> impl Iterator<Item = &TypeDeclarationBlock> {
        self.main.blocks().filter_map(|b| b.kind.as_declaration())
    }

    fn declaration(&self, name: &str) -> Result<&TypeDeclarationBlock, WorkspaceError> {
        self.declarations()
            .find(|d| d.name == name)
            .ok_or_else(|| WorkspaceError::UnknownDataType(name.to_string()))
    }

    fn function_named(&self, name: &str) -> Option<&FunctionBlock> {
        self.main
            .blocks()
            .filter_map(|b| b.kind.as_function())
            .find(|f| f.name == name)
    }

    /// Current signature of a user function, read off its parameter types
    /// and its `RETURN` port and quantified over every variable in it.
    fn function_signature(&self, name: &str) -> Result<Option<TypeScheme>, WorkspaceError> {
        let Some(block) = self
            .main
            .blocks()
            .find(|b| b.kind.as_function().is_some_and(|f| f.name == name))
        else {
            return Ok(None);
        };
        let Some(func) = block.kind.as_function() else {
            return Ok(None);
        };
        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            match block.type_params.get(param) {
                Some(ty) => params.push(ty.clone()),
                None => return Ok(None),
            }
        }
        let ret = self.main.input_named(block.id, RETURN)?;
        Ok(self
            .main
            .port_type(ret)?
            .map(|ret| TypeScheme::closed(Type::curried(params, ret.clone()))))
    }

    /// Scheme of a built-in operator or data constructor.
    fn operator_scheme(&self, name: &str) -> Option<TypeScheme> {
        if let Some(scheme) = self.builtins.lookup(name) {
            return Some(scheme.clone());
        }
        self.declarations().find_map(|decl| {
            decl.constructor(name)
                .map(|ctor| decl.constructor_scheme(ctor))
        })
    }

    // Block creation

    /// Port types for `kind`, instantiated with fresh variables.
    fn layout_for(&mut self, kind: &BlockKind) -> Result<PortLayout, WorkspaceError> {
        let mut layout = PortLayout::default();
        match kind {
            BlockKind::Literal(lit) => layout.output = Some(lit.ty.clone()),

            BlockKind::Operator(op) => {
                // A name that no longer resolves gets fresh ports; inference
                // reports it as unbound.
                let scheme = match self.operator_scheme(&op.name) {
                    Some(scheme) => Some(scheme),
                    None => self.function_signature(&op.name)?,
                };
                let ty = match scheme {
                    Some(scheme) => instantiate(&scheme, &mut self.registry),
                    None => self.fresh(),
                };
                let (mut args, mut result) = ty.uncurry(op.arity);
                if args.len() < op.arity {
                    while args.len() < op.arity {
                        args.push(self.fresh());
                    }
                    result = self.fresh();
                }
                layout.inputs = args
                    .into_iter()
                    .enumerate()
                    .map(|(i, ty)| (arg_port(i), ty))
                    .collect();
                layout.output = Some(result);
            }

            BlockKind::Variable(_) => layout.output = Some(self.fresh()),

            BlockKind::Lambda(_) => {
                let (param, body) = (self.fresh(), self.fresh());
                layout.inputs = vec![(BODY.to_string(), body.clone())];
                layout.output = Some(Type::func(param.clone(), body));
                layout.type_params.insert("param".to_string(), param);
            }

            BlockKind::Apply(_) => {
                let (arg, result) = (self.fresh(), self.fresh());
                layout.inputs = vec![
                    (FUNC.to_string(), Type::func(arg.clone(), result.clone())),
                    (ARG.to_string(), arg),
                ];
                layout.output = Some(result);
            }

            BlockKind::LocalLet(_) => {
                let (value, body) = (self.fresh(), self.fresh());
                layout.inputs = vec![
                    (VALUE.to_string(), value.clone()),
                    (BODY.to_string(), body.clone()),
                ];
                layout.output = Some(body);
                layout.type_params.insert("value".to_string(), value);
            }

            BlockKind::List(list) => {
                let element = self.fresh();
                layout.inputs = (0..list.items)
                    .map(|i| (item_port(i), element.clone()))
                    .collect();
                layout.output = Some(Type::list(element.clone()));
                layout.type_params.insert("element".to_string(), element);
            }

            BlockKind::Comprehension(comp) => {
                for var in &comp.vars {
                    let element = self.fresh();
                    layout
                        .inputs
                        .push((generator_port(var), Type::list(element.clone())));
                    layout.type_params.insert(var.clone(), element);
                }
                for i in 0..comp.guards {
                    layout.inputs.push((guard_port(i), Type::bool()));
                }
                let out = self.fresh();
                layout.inputs.push((DO.to_string(), out.clone()));
                layout.output = Some(Type::list(out));
            }

            BlockKind::Case(case) => {
                let scrutinee = match self.declaration(&case.type_name) {
                    Ok(decl) => {
                        let scheme = TypeScheme::closed(decl.result_type());
                        instantiate(&scheme, &mut self.registry)
                    }
                    Err(_) => self.fresh(),
                };
                let result = self.fresh();
                layout.inputs.push((SCRUTINEE.to_string(), scrutinee));
                for arm in &case.arms {
                    layout.inputs.push((arm_port(&arm.constructor), result.clone()));
                }
                layout.output = Some(result);
            }

            BlockKind::Function(func) => {
                for param in &func.params {
                    let ty = self.fresh();
                    layout.type_params.insert(param.clone(), ty);
                }
                let ret = self.fresh();
                layout.inputs.push((RETURN.to_string(), ret));
            }

            BlockKind::TypeDeclaration(_) => {}

            BlockKind::Statement(stmt) => {
                let slots = self
                    .statements
                    .get(&stmt.name)
                    .cloned()
                    .ok_or_else(|| WorkspaceError::UnknownStatement(stmt.name.clone()))?;
                for (i, slot) in slots.into_iter().enumerate() {
                    let ty = instantiate(&TypeScheme::closed(slot), &mut self.registry);
                    layout.inputs.push((arg_port(i), ty));
                }
            }
        }
        Ok(layout)
    }

    pub fn add_block(&mut self, canvas: Canvas, kind: BlockKind) -> Result<BlockId, WorkspaceError> {
        let layout = self.layout_for(&kind)?;
        debug!(?canvas, block = %kind, "adding block");
        let id = self.graph_mut(canvas).add_block(kind, layout);
        self.request_render(canvas, [id]);
        Ok(id)
    }

    pub fn add_literal(&mut self, value: impl Into<String>, ty: Type) -> Result<BlockId, WorkspaceError> {
        self.add_block(
            Canvas::Main,
            BlockKind::Literal(LiteralBlock {
                value: value.into(),
                ty,
            }),
        )
    }

    pub fn add_number(&mut self, value: impl Into<String>) -> Result<BlockId, WorkspaceError> {
        self.add_literal(value, Type::number())
    }

    /// A call of a built-in, a constructor or a user function, with one
    /// input per declared argument.
    pub fn add_operator(&mut self, name: &str) -> Result<BlockId, WorkspaceError> {
        let arity = match self.operator_scheme(name) {
            Some(scheme) => scheme.ty.arity(),
            None => match self.function_named(name) {
                Some(func) => func.params.len(),
                None => return Err(WorkspaceError::UnknownOperator(name.to_string())),
            },
        };
        self.add_block(
            Canvas::Main,
            BlockKind::Operator(OperatorBlock {
                name: name.to_string(),
                arity,
            }),
        )
    }

    pub fn add_variable(&mut self, name: &str) -> Result<BlockId, WorkspaceError> {
        self.add_block(
            Canvas::Main,
            BlockKind::Variable(VariableBlock {
                name: name.to_string(),
            }),
        )
    }

    pub fn add_lambda(&mut self, param: &str) -> Result<BlockId, WorkspaceError> {
        self.add_block(
            Canvas::Main,
            BlockKind::Lambda(LambdaBlock {
                param: param.to_string(),
            }),
        )
    }

    pub fn add_apply(&mut self) -> Result<BlockId, WorkspaceError> {
        self.add_block(Canvas::Main, BlockKind::Apply(ApplyBlock))
    }

    pub fn add_local_let(&mut self, name: &str) -> Result<BlockId, WorkspaceError> {
        self.add_block(
            Canvas::Main,
            BlockKind::LocalLet(LocalLetBlock {
                name: name.to_string(),
            }),
        )
    }

    pub fn add_list(&mut self, items: usize) -> Result<BlockId, WorkspaceError> {
        self.add_block(Canvas::Main, BlockKind::List(ListBlock { items }))
    }

    pub fn add_comprehension(&mut self, vars: &[&str], guards: usize) -> Result<BlockId, WorkspaceError> {
        self.add_block(
            Canvas::Main,
            BlockKind::Comprehension(ComprehensionBlock {
                vars: vars.iter().map(|v| v.to_string()).collect(),
                guards,
            }),
        )
    }

    /// A case block with one arm per constructor of `type_name`; each arm
    /// binds the constructor's fields under their declared names.
    pub fn add_case(&mut self, type_name: &str) -> Result<BlockId, WorkspaceError> {
        let arms = self
            .declaration(type_name)?
            .constructors
            .iter()
            .map(|ctor| CaseArm {
                constructor: ctor.name.clone(),
                binders: ctor.fields.iter().map(|f| f.name.clone()).collect(),
            })
            .collect();
        self.add_block(
            Canvas::Main,
            BlockKind::Case(CaseBlock {
                type_name: type_name.to_string(),
                arms,
            }),
        )
    }

    pub fn add_function(&mut self, name: &str, params: &[&str]) -> Result<BlockId, WorkspaceError> {
        self.add_block(
            Canvas::Main,
            BlockKind::Function(FunctionBlock {
                name: name.to_string(),
                params: params.iter().map(|p| p.to_string()).collect(),
            }),
        )
    }

    pub fn add_type_declaration(
        &mut self,
        name: &str,
        params: &[&str],
        constructors: Vec<ConstructorDef>,
    ) -> Result<BlockId, WorkspaceError> {
        self.add_block(
            Canvas::Main,
            BlockKind::TypeDeclaration(TypeDeclarationBlock {
                name: name.to_string(),
                params: params.iter().map(|p| p.to_string()).collect(),
                constructors,
            }),
        )
    }

    pub fn add_statement(&mut self, name: &str) -> Result<BlockId, WorkspaceError> {
        self.add_block(
            Canvas::Main,
            BlockKind::Statement(StatementBlock {
                name: name.to_string(),
            }),
        )
    }

    /// Deletes a block from the main canvas; the blocks it was plugged into
    /// or that were plugged into it are reset and re-inferred.
    pub fn remove_block(&mut self, id: BlockId) -> Result<(), WorkspaceError> {
        let mut neighbours = self.main.children(id)?;
        neighbours.extend(self.main.parent(id)?);
        self.main.remove_block(id)?;
        debug!(block = %id, "removed block");
        self.refresh_components(&neighbours)?;
        self.trigger_garbage_collection();
        Ok(())
    }

    // Connect and disconnect

    fn orient(&self, a: ConnectionId, b: ConnectionId) -> Result<(ConnectionId, ConnectionId), WorkspaceError> {
        let (ca, cb) = (self.main.connection(a)?, self.main.connection(b)?);
        match (ca.is_output(), cb.is_output()) {
            (true, false) => Ok((a, b)),
            (false, true) => Ok((b, a)),
            _ => Err(WorkspaceError::PortDirection(a, b)),
        }
    }

    /// Plugs an output port into an input port.
    ///
    /// The two port types are unified first; if that fails nothing changes
    /// and the incompatibility is returned. Otherwise the link is made and
    /// the unifier is applied to every port on both canvases, since a type
    /// variable may appear anywhere.
    pub fn connect(&mut self, a: ConnectionId, b: ConnectionId) -> Result<Substitution, WorkspaceError> {
        let (output, input) = self.orient(a, b)?;
        for port in [output, input] {
            if self.main.connection(port)?.target.is_some() {
                return Err(WorkspaceError::AlreadyConnected(port));
            }
        }
        let parent = self.main.connection(input)?.block;
        if self.main.would_cycle(output, input)? {
            return Err(StructuralError::Cycle(parent).into());
        }

        let out_ty = match self.main.port_type(output)?.cloned() {
            Some(ty) => ty,
            None => self.fresh(),
        };
        let in_ty = match self.main.port_type(input)?.cloned() {
            Some(ty) => ty,
            None => self.fresh(),
        };
        let subst = unify(&out_ty, &in_ty).map_err(|err| {
            debug!(%output, %input, %err, "connection refused");
            WorkspaceError::Incompatible(err)
        })?;

        self.main.link(output, input)?;
        self.main.set_port_type(output, out_ty)?;
        self.main.set_port_type(input, in_ty)?;
        let child = self.main.connection(output)?.block;
        debug!(%child, %parent, %subst, "connected");

        self.broadcast(&subst);
        self.request_render(Canvas::Main, [child, parent]);
        self.trigger_garbage_collection();
        Ok(subst)
    }

    /// Plugs `child`'s output into `parent`'s input named `port`.
    pub fn connect_component(
        &mut self,
        child: BlockId,
        parent: BlockId,
        port: &str,
    ) -> Result<Substitution, WorkspaceError> {
        let output = self
            .main
            .block(child)?
            .output
            .ok_or(StructuralError::NotAnExpression(child))?;
        let input = self.main.input_named(parent, port)?;
        self.connect(output, input)
    }

    /// Unplugs `child` from `parent` and re-types both halves from scratch.
    pub fn disconnect_component(&mut self, parent: BlockId, child: BlockId) -> Result<(), WorkspaceError> {
        let not_connected = WorkspaceError::NotConnected { parent, child };
        let output = self.main.block(child)?.output.ok_or(not_connected.clone())?;
        let input = self
            .main
            .connection(output)?
            .target
            .ok_or(not_connected.clone())?;
        if self.main.connection(input)?.block != parent {
            return Err(not_connected);
        }

        self.main.unlink(output)?;
        debug!(%parent, %child, "disconnected");
        self.refresh_components(&[parent, child])?;
        self.trigger_garbage_collection();
        Ok(())
    }

    fn broadcast(&mut self, subst: &Substitution) {
        let main = self.main.apply_substitution(subst);
        let flyout = self.flyout.apply_substitution(subst);
        self.request_render(Canvas::Main, main);
        self.request_render(Canvas::Flyout, flyout);
    }

    /// Gives every block in `members` fresh port types, then re-unifies the
    /// links among them. Returns blocks that lost their link along the way.
    fn reset_blocks(&mut self, members: &BTreeSet<BlockId>) -> Result<Vec<BlockId>, WorkspaceError> {
        let mut detached = Vec::new();
        for &id in members {
            let kind = self.main.block(id)?.kind.clone();
            let layout = self.layout_for(&kind)?;
            detached.extend(self.main.replace_ports(id, layout)?);
        }

        let mut subst = Substitution::empty();
        for (output, input) in self.main.links_within(members) {
            let (Some(out_ty), Some(in_ty)) = (
                self.main.port_type(output)?.cloned(),
                self.main.port_type(input)?.cloned(),
            ) else {
                continue;
            };
            match unify(&subst.apply(&out_ty), &subst.apply(&in_ty)) {
                Ok(s) => subst = s.compose(&subst),
                Err(err) => {
                    let block = self.main.connection(input)?.block;
                    debug!(%block, %err, "link no longer unifies after reset");
                }
            }
        }
        self.main.apply_substitution_to(&subst, members);
        self.request_render(Canvas::Main, members.iter().copied());
        Ok(detached)
    }

    fn components_of(&self, blocks: &[BlockId]) -> Result<BTreeSet<BlockId>, WorkspaceError> {
        let mut members = BTreeSet::new();
        for &block in blocks {
            if self.main.contains(block) && !members.contains(&block) {
                members.extend(self.main.component(block)?);
            }
        }
        Ok(members)
    }

    /// Resets the components containing `blocks` and re-infers just those.
    fn refresh_components(&mut self, blocks: &[BlockId]) -> Result<(), WorkspaceError> {
        let members = self.components_of(blocks)?;
        let detached = self.reset_blocks(&members)?;
        let mut roots = BTreeSet::new();
        for &block in members.iter().chain(detached.iter()) {
            if self.main.contains(block) {
                roots.insert(self.main.root_of(block)?);
            }
        }
        self.infer_roots(&roots.into_iter().collect::<Vec<_>>())?;
        Ok(())
    }

    // Structural edits

    fn edit_kind(
        &mut self,
        block: BlockId,
        edit: impl FnOnce(&mut BlockKind) -> Result<(), String>,
    ) -> Result<(), WorkspaceError> {
        let kind = &mut self.main.block_mut(block)?.kind;
        edit(kind).map_err(|reason| StructuralError::MalformedMutation { block, reason })?;
        Ok(())
    }

    /// Resets the components of `touched` (and of anything they shed), then
    /// re-infers the whole workspace.
    fn finish_structural_edit(&mut self, touched: &[BlockId]) -> Result<InferenceReport, WorkspaceError> {
        let members = self.components_of(touched)?;
        let detached = self.reset_blocks(&members)?;
        let shed = self.components_of(&detached)?;
        let shed: BTreeSet<BlockId> = shed.difference(&members).copied().collect();
        if !shed.is_empty() {
            self.reset_blocks(&shed)?;
        }
        let report = self.infer_workspace()?;
        self.trigger_garbage_collection();
        Ok(report)
    }

    fn callers_of(&self, function: &str) -> Vec<BlockId> {
        self.main
            .blocks()
            .filter(|b| b.kind.operator_name() == Some(function))
            .map(|b| b.id)
            .collect()
    }

    fn function_block(&self, block: BlockId) -> Result<FunctionBlock, WorkspaceError> {
        self.main
            .block(block)?
            .kind
            .as_function()
            .cloned()
            .ok_or_else(|| {
                StructuralError::MalformedMutation {
                    block,
                    reason: "not a function definition".to_string(),
                }
                .into()
            })
    }

    /// Variable blocks under `block` that refer to the binding of `name`
    /// visible at `block`. Inner binders of the same name hide their scope.
    fn uses_of(&self, block: BlockId, name: &str) -> Result<Vec<BlockId>, WorkspaceError> {
        let mut uses = Vec::new();
        let mut pending = vec![block];
        while let Some(id) = pending.pop() {
            let current = self.main.block(id)?;
            if let BlockKind::Variable(var) = &current.kind {
                if var.name == name {
                    uses.push(id);
                }
            }
            for &input in &current.inputs {
                let port = self.main.connection(input)?;
                if port.input_name().is_some_and(|p| current.kind.shadows(p, name)) {
                    continue;
                }
                pending.extend(self.main.plugged_block(input)?);
            }
        }
        Ok(uses)
    }

    /// Renames a parameter and every variable block in the body that refers to it.
    pub fn rename_parameter(&mut self, block: BlockId, old: &str, new: &str) -> Result<InferenceReport, WorkspaceError> {
        let func = self.function_block(block)?;
        if func.params.iter().any(|p| p == new) {
            return Err(StructuralError::MalformedMutation {
                block,
                reason: format!("parameter `{}` already exists", new),
            }
            .into());
        }
        let uses = self.uses_of(block, old)?;
        self.edit_kind(block, |kind| match kind {
            BlockKind::Function(f) => {
                let slot = f
                    .params
                    .iter_mut()
                    .find(|p| p.as_str() == old)
                    .ok_or_else(|| format!("no parameter `{}`", old))?;
                *slot = new.to_string();
                Ok(())
            }
            _ => Err("not a function definition".to_string()),
        })?;

        for id in uses {
            if let BlockKind::Variable(var) = &mut self.main.block_mut(id)?.kind {
                var.name = new.to_string();
            }
        }
        debug!(function = %func.name, %old, %new, "renamed parameter");
        self.finish_structural_edit(&[block])
    }

    /// Appends a parameter; every call of the function grows an input.
    pub fn add_parameter(&mut self, block: BlockId, name: &str) -> Result<InferenceReport, WorkspaceError> {
        let func = self.function_block(block)?;
        self.edit_kind(block, |kind| match kind {
            BlockKind::Function(f) if f.params.iter().any(|p| p == name) => {
                Err(format!("parameter `{}` already exists", name))
            }
            BlockKind::Function(f) => {
                f.params.push(name.to_string());
                Ok(())
            }
            _ => Err("not a function definition".to_string()),
        })?;

        let mut touched = vec![block];
        for caller in self.callers_of(&func.name) {
            self.edit_kind(caller, |kind| match kind {
                BlockKind::Operator(op) => {
                    op.arity += 1;
                    Ok(())
                }
                _ => Err("not a call".to_string()),
            })?;
            touched.push(caller);
        }
        self.finish_structural_edit(&touched)
    }

    /// Removes a parameter; the matching argument of every call is unplugged
    /// and later arguments move up one slot.
    pub fn remove_parameter(&mut self, block: BlockId, name: &str) -> Result<InferenceReport, WorkspaceError> {
        let func = self.function_block(block)?;
        let index = func
            .params
            .iter()
            .position(|p| p == name)
            .ok_or_else(|| StructuralError::MalformedMutation {
                block,
                reason: format!("no parameter `{}`", name),
            })?;
        // Every caller's argument ports are looked up before anything changes.
        let arity = func.params.len();
        let mut calls = Vec::new();
        for caller in self.callers_of(&func.name) {
            let inputs = (0..arity)
                .map(|i| self.main.input_named(caller, &arg_port(i)))
                .collect::<Result<Vec<_>, _>>()?;
            calls.push((caller, inputs));
        }

        self.edit_kind(block, |kind| match kind {
            BlockKind::Function(f) => {
                f.params.remove(index);
                Ok(())
            }
            _ => Err("not a function definition".to_string()),
        })?;

        let mut touched = vec![block];
        for (caller, inputs) in calls {
            let mut plugged = Vec::with_capacity(arity);
            for input in inputs {
                plugged.push(self.main.unlink(input)?);
            }
            let removed = plugged.remove(index);
            touched.extend(self.main_block_of(removed)?);

            self.edit_kind(caller, |kind| match kind {
                BlockKind::Operator(op) => {
                    op.arity -= 1;
                    Ok(())
                }
                _ => Err("not a call".to_string()),
            })?;
            let layout = {
                let kind = self.main.block(caller)?.kind.clone();
                self.layout_for(&kind)?
            };
            self.main.replace_ports(caller, layout)?;
            for (i, output) in plugged.into_iter().enumerate() {
                if let Some(output) = output {
                    let input = self.main.input_named(caller, &arg_port(i))?;
                    self.main.link(output, input)?;
                }
            }
            touched.push(caller);
        }
        self.finish_structural_edit(&touched)
    }

    fn main_block_of(&self, port: Option<ConnectionId>) -> Result<Option<BlockId>, WorkspaceError> {
        match port {
            Some(port) => Ok(Some(self.main.connection(port)?.block)),
            None => Ok(None),
        }
    }

    pub fn add_generator(&mut self, block: BlockId, var: &str) -> Result<InferenceReport, WorkspaceError> {
        self.edit_kind(block, |kind| match kind {
            BlockKind::Comprehension(c) if c.vars.iter().any(|v| v == var) => {
                Err(format!("generator `{}` already exists", var))
            }
            BlockKind::Comprehension(c) => {
                c.vars.push(var.to_string());
                Ok(())
            }
            _ => Err("not a list comprehension".to_string()),
        })?;
        self.finish_structural_edit(&[block])
    }

    pub fn remove_generator(&mut self, block: BlockId, var: &str) -> Result<InferenceReport, WorkspaceError> {
        self.edit_kind(block, |kind| match kind {
            BlockKind::Comprehension(c) => {
                let index = c
                    .vars
                    .iter()
                    .position(|v| v == var)
                    .ok_or_else(|| format!("no generator `{}`", var))?;
                c.vars.remove(index);
                Ok(())
            }
            _ => Err("not a list comprehension".to_string()),
        })?;
        self.finish_structural_edit(&[block])
    }

    pub fn add_guard(&mut self, block: BlockId) -> Result<InferenceReport, WorkspaceError> {
        self.edit_kind(block, |kind| match kind {
            BlockKind::Comprehension(c) => {
                c.guards += 1;
                Ok(())
            }
            _ => Err("not a list comprehension".to_string()),
        })?;
        self.finish_structural_edit(&[block])
    }

    /// Drops the last guard.
    pub fn remove_guard(&mut self, block: BlockId) -> Result<InferenceReport, WorkspaceError> {
        self.edit_kind(block, |kind| match kind {
            BlockKind::Comprehension(c) if c.guards == 0 => Err("no guard to remove".to_string()),
            BlockKind::Comprehension(c) => {
                c.guards -= 1;
                Ok(())
            }
            _ => Err("not a list comprehension".to_string()),
        })?;
        self.finish_structural_edit(&[block])
    }

    /// Resizes a list block; items beyond the new size are unplugged.
    pub fn set_list_items(&mut self, block: BlockId, items: usize) -> Result<InferenceReport, WorkspaceError> {
        self.edit_kind(block, |kind| match kind {
            BlockKind::List(list) => {
                list.items = items;
                Ok(())
            }
            _ => Err("not a list".to_string()),
        })?;
        self.finish_structural_edit(&[block])
    }
}
