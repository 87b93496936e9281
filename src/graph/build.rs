//! Lowering of a block tree into an [`Expression`].
//!
//! Each block variant knows how to express itself through
//! [`ExpressionSource`]; the [`BuildContext`] resolves input ports, either
//! to the expression of the plugged block or to a hole.
//!
//! A hole is an unplugged input. It becomes a variable named after its port
//! (`%c4`), tagged with the port so its inferred type can be written back.
//! Callers decide how holes are bound: [`BuiltExpression::into_section`]
//! abstracts over them so a partially filled block denotes a function,
//! while function bodies bind them in the environment instead.

use super::{BlockGraph, BlockId, ConnectionId};
use super::kind::*;
use crate::expr::{Expression, Tag};
use crate::types::StructuralError;
use crate::types::builtins::{BIND, CONS, GUARD, NIL, YIELD};

pub trait ExpressionSource {
    fn to_expression(
        &self,
        id: BlockId,
        ctx: &mut BuildContext<'_>,
    ) -> Result<Expression, StructuralError>;
}

pub struct BuildContext<'g> {
    graph: &'g BlockGraph,
    holes: Vec<(String, ConnectionId)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltExpression {
    pub expr: Expression,
    /// Unplugged inputs in the order they were reached.
    pub holes: Vec<(String, ConnectionId)>,
}

impl BuiltExpression {
    /// Abstracts over every hole, the first one outermost.
    pub fn into_section(self) -> Expression {
        Expression::abs_all(self.holes.into_iter().map(|(name, _)| name), self.expr)
    }
}

pub fn hole_name(port: ConnectionId) -> String {
    format!("%{}", port)
}

impl<'g> BuildContext<'g> {
    pub fn new(graph: &'g BlockGraph) -> Self {
        BuildContext {
            graph,
            holes: Vec::new(),
        }
    }

    pub fn graph(&self) -> &'g BlockGraph {
        self.graph
    }

    pub fn build(&mut self, block: BlockId) -> Result<Expression, StructuralError> {
        let graph = self.graph;
        graph.block(block)?.kind.to_expression(block, self)
    }

    pub fn input(&mut self, block: BlockId, port: &str) -> Result<Expression, StructuralError> {
        let conn = self.graph.input_named(block, port)?;
        match self.graph.plugged_block(conn)? {
            Some(child) => self.build(child),
            None => {
                let name = hole_name(conn);
                self.holes.push((name.clone(), conn));
                Ok(Expression::var(name).tagged(Tag::Connection(conn)))
            }
        }
    }
}

/// Lowers the tree below `root`, refusing cyclic graphs up front.
pub fn build_expression(graph: &BlockGraph, root: BlockId) -> Result<BuiltExpression, StructuralError> {
    graph.check_acyclic(root)?;
    let mut ctx = BuildContext::new(graph);
    let expr = ctx.build(root)?;
    Ok(BuiltExpression {
        expr,
        holes: ctx.holes,
    })
}

/// `func a1 ... an` with every application tagged by the block, so a failed
/// unification anywhere along the spine is reported on it.
fn apply_tagged(id: BlockId, func: Expression, args: Vec<Expression>) -> Expression {
    args.into_iter()
        .fold(func, |acc, arg| Expression::app(acc, arg).tagged(Tag::Block(id)))
}

impl ExpressionSource for BlockKind {
    fn to_expression(
        &self,
        id: BlockId,
        ctx: &mut BuildContext<'_>,
    ) -> Result<Expression, StructuralError> {
        match self {
            BlockKind::Literal(b) => b.to_expression(id, ctx),
            BlockKind::Operator(b) => b.to_expression(id, ctx),
            BlockKind::Variable(b) => b.to_expression(id, ctx),
            BlockKind::Lambda(b) => b.to_expression(id, ctx),
            BlockKind::Apply(b) => b.to_expression(id, ctx),
            BlockKind::LocalLet(b) => b.to_expression(id, ctx),
            BlockKind::List(b) => b.to_expression(id, ctx),
            BlockKind::Comprehension(b) => b.to_expression(id, ctx),
            BlockKind::Case(b) => b.to_expression(id, ctx),
            BlockKind::Function(b) => b.to_expression(id, ctx),
            BlockKind::TypeDeclaration(_) | BlockKind::Statement(_) => {
                Err(StructuralError::NotAnExpression(id))
            }
        }
    }
}

impl ExpressionSource for LiteralBlock {
    fn to_expression(&self, id: BlockId, _: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        Ok(Expression::lit(self.ty.clone()).tagged(Tag::Block(id)))
    }
}

impl ExpressionSource for OperatorBlock {
    fn to_expression(&self, id: BlockId, ctx: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        let args = (0..self.arity)
            .map(|i| ctx.input(id, &arg_port(i)))
            .collect::<Result<Vec<_>, _>>()?;
        if args.is_empty() {
            return Ok(Expression::var(self.name.clone()).tagged(Tag::Block(id)));
        }
        Ok(apply_tagged(id, Expression::var(self.name.clone()), args))
    }
}

impl ExpressionSource for VariableBlock {
    fn to_expression(&self, id: BlockId, _: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        Ok(Expression::var(self.name.clone()).tagged(Tag::Block(id)))
    }
}

impl ExpressionSource for LambdaBlock {
    fn to_expression(&self, id: BlockId, ctx: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        let body = ctx.input(id, BODY)?;
        Ok(Expression::abs(self.param.clone(), body).tagged(Tag::Block(id)))
    }
}

impl ExpressionSource for ApplyBlock {
    fn to_expression(&self, id: BlockId, ctx: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        let func = ctx.input(id, FUNC)?;
        let arg = ctx.input(id, ARG)?;
        Ok(apply_tagged(id, func, vec![arg]))
    }
}

impl ExpressionSource for LocalLetBlock {
    fn to_expression(&self, id: BlockId, ctx: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        let bound = ctx.input(id, VALUE)?;
        let body = ctx.input(id, BODY)?;
        Ok(Expression::let_in(self.name.clone(), bound, body).tagged(Tag::Block(id)))
    }
}

/// `[a, b]` becomes `: a (: b [])`.
impl ExpressionSource for ListBlock {
    fn to_expression(&self, id: BlockId, ctx: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        let items = (0..self.items)
            .map(|i| ctx.input(id, &item_port(i)))
            .collect::<Result<Vec<_>, _>>()?;
        let nil = Expression::var(NIL).tagged(Tag::Block(id));
        Ok(items.into_iter().rev().fold(nil, |acc, item| {
            apply_tagged(id, Expression::var(CONS), vec![item, acc])
        }))
    }
}

/// `[e | x <- xs, y <- ys, g]` becomes
/// `bind xs (\x -> bind ys (\y -> guard g (yield e)))`.
impl ExpressionSource for ComprehensionBlock {
    fn to_expression(&self, id: BlockId, ctx: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        let lists = self
            .vars
            .iter()
            .map(|var| ctx.input(id, &generator_port(var)))
            .collect::<Result<Vec<_>, _>>()?;
        let guards = (0..self.guards)
            .map(|i| ctx.input(id, &guard_port(i)))
            .collect::<Result<Vec<_>, _>>()?;
        let body = ctx.input(id, DO)?;

        let mut expr = apply_tagged(id, Expression::var(YIELD), vec![body]);
        for guard in guards.into_iter().rev() {
            expr = apply_tagged(id, Expression::var(GUARD), vec![guard, expr]);
        }
        for (var, list) in self.vars.iter().zip(lists).rev() {
            let continuation = Expression::abs(var.clone(), expr);
            expr = apply_tagged(id, Expression::var(BIND), vec![list, continuation]);
        }
        Ok(expr)
    }
}

/// Applies the data type's eliminator to the scrutinee and one function per
/// constructor, each binding that constructor's fields.
impl ExpressionSource for CaseBlock {
    fn to_expression(&self, id: BlockId, ctx: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        let mut args = vec![ctx.input(id, SCRUTINEE)?];
        for arm in &self.arms {
            let body = ctx.input(id, &arm_port(&arm.constructor))?;
            args.push(Expression::abs_all(arm.binders.iter().cloned(), body));
        }
        Ok(apply_tagged(id, Expression::var(case_name(&self.type_name)), args))
    }
}

impl ExpressionSource for FunctionBlock {
    fn to_expression(&self, id: BlockId, ctx: &mut BuildContext<'_>) -> Result<Expression, StructuralError> {
        let body = ctx.input(id, RETURN)?;
        if self.params.is_empty() {
            return Ok(body);
        }
        Ok(Expression::abs_all(self.params.iter().cloned(), body).tagged(Tag::Block(id)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::graph::PortLayout;
    use crate::types::Type;

    fn add(graph: &mut BlockGraph, kind: BlockKind, inputs: &[&str]) -> BlockId {
        let output = kind.has_output().then(|| Type::var("A"));
        graph.add_block(
            kind,
            PortLayout {
                output,
                inputs: inputs
                    .iter()
                    .map(|n| (n.to_string(), Type::var("A")))
                    .collect(),
                type_params: BTreeMap::new(),
            },
        )
    }

    fn plug(graph: &mut BlockGraph, child: BlockId, parent: BlockId, port: &str) {
        let output = graph.block(child).unwrap().output.unwrap();
        let input = graph.input_named(parent, port).unwrap();
        graph.link(output, input).unwrap();
    }

    fn number(graph: &mut BlockGraph, value: &str) -> BlockId {
        add(
            graph,
            BlockKind::Literal(LiteralBlock {
                value: value.to_string(),
                ty: Type::number(),
            }),
            &[],
        )
    }

    fn operator(graph: &mut BlockGraph, name: &str, arity: usize) -> BlockId {
        let ports: Vec<String> = (0..arity).map(arg_port).collect();
        let ports: Vec<&str> = ports.iter().map(String::as_str).collect();
        add(
            graph,
            BlockKind::Operator(OperatorBlock {
                name: name.to_string(),
                arity,
            }),
            &ports,
        )
    }

    #[test]
    fn test_operator_with_holes_becomes_section() {
        let mut graph = BlockGraph::new();
        let plus = operator(&mut graph, "+", 2);
        let one = number(&mut graph, "1");
        plug(&mut graph, one, plus, "ARG1");

        let built = build_expression(&graph, plus).unwrap();
        assert_eq!(built.holes.len(), 1);
        let hole = built.holes[0].0.clone();
        assert_eq!(built.expr.to_string(), format!("+ {} <Number>", hole));
        assert_eq!(built.expr.tag(), Some(Tag::Block(plus)));
        assert_eq!(
            built.into_section().to_string(),
            format!("\\{} -> + {} <Number>", hole, hole)
        );
    }

    #[test]
    fn test_hole_is_tagged_with_port() {
        let mut graph = BlockGraph::new();
        let negate = operator(&mut graph, "negate", 1);
        let built = build_expression(&graph, negate).unwrap();
        let port = graph.input_named(negate, "ARG0").unwrap();
        assert_eq!(built.holes, vec![(hole_name(port), port)]);
    }

    #[test]
    fn test_list_lowers_to_cons_chain() {
        let mut graph = BlockGraph::new();
        let list = add(
            &mut graph,
            BlockKind::List(ListBlock { items: 2 }),
            &["ITEM0", "ITEM1"],
        );
        let a = number(&mut graph, "1");
        let b = number(&mut graph, "2");
        plug(&mut graph, a, list, "ITEM0");
        plug(&mut graph, b, list, "ITEM1");

        let built = build_expression(&graph, list).unwrap();
        assert!(built.holes.is_empty());
        assert_eq!(built.expr.to_string(), ": <Number> (: <Number> [])");
    }

    #[test]
    fn test_comprehension_lowering() {
        let mut graph = BlockGraph::new();
        let comp = add(
            &mut graph,
            BlockKind::Comprehension(ComprehensionBlock {
                vars: vec!["x".to_string()],
                guards: 1,
            }),
            &["VAR_x", "GUARD0", "DO"],
        );
        let x = add(
            &mut graph,
            BlockKind::Variable(VariableBlock {
                name: "x".to_string(),
            }),
            &[],
        );
        plug(&mut graph, x, comp, "DO");

        let built = build_expression(&graph, comp).unwrap();
        let list_hole = hole_name(graph.input_named(comp, "VAR_x").unwrap());
        let guard_hole = hole_name(graph.input_named(comp, "GUARD0").unwrap());
        assert_eq!(
            built.expr.to_string(),
            format!(
                "bind {} (\\x -> guard {} (yield x))",
                list_hole, guard_hole
            )
        );
    }

    #[test]
    fn test_function_abstracts_parameters() {
        let mut graph = BlockGraph::new();
        let func = add(
            &mut graph,
            BlockKind::Function(FunctionBlock {
                name: "double".to_string(),
                params: vec!["n".to_string()],
            }),
            &[RETURN],
        );
        let plus = operator(&mut graph, "+", 2);
        let n1 = add(&mut graph, BlockKind::Variable(VariableBlock { name: "n".to_string() }), &[]);
        let n2 = add(&mut graph, BlockKind::Variable(VariableBlock { name: "n".to_string() }), &[]);
        plug(&mut graph, plus, func, RETURN);
        plug(&mut graph, n1, plus, "ARG0");
        plug(&mut graph, n2, plus, "ARG1");

        let built = build_expression(&graph, func).unwrap();
        assert_eq!(built.expr.to_string(), "\\n -> + n n");
    }

    #[test]
    fn test_statement_is_not_an_expression() {
        let mut graph = BlockGraph::new();
        let stmt = add(
            &mut graph,
            BlockKind::Statement(StatementBlock {
                name: "drawingOf".to_string(),
            }),
            &["ARG0"],
        );
        assert_eq!(
            build_expression(&graph, stmt),
            Err(StructuralError::NotAnExpression(stmt))
        );
    }

    #[test]
    fn test_cycle_rejected_before_traversal() {
        let mut graph = BlockGraph::new();
        let a = operator(&mut graph, "negate", 1);
        let b = operator(&mut graph, "negate", 1);
        plug(&mut graph, a, b, "ARG0");
        plug(&mut graph, b, a, "ARG0");
        assert!(matches!(
            build_expression(&graph, a),
            Err(StructuralError::Cycle(_))
        ));
    }
}
