//! # Expression Tree
//!
//! The small functional language that inference runs on. Blocks are lowered
//! into this tree by [`crate::graph::build`]; nothing else produces it.
//!
//! ```text
//! e ::= x                 Var
//!     | literal : T       Lit   (carries its concrete type)
//!     | e e               App
//!     | \x -> e           Abs
//!     | let x = e in e    Let
//! ```
//!
//! ## Tags
//!
//! Every node may carry a [`Tag`] naming the block or port it came from.
//! Inference records the type it finds for each tagged node so the
//! orchestrator can write it back; the tag never influences the result.

use std::fmt;

use crate::graph::{BlockId, ConnectionId};
use crate::types::Type;

/// Back-reference from an expression node to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Block(BlockId),
    Connection(ConnectionId),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Tag::Block(id) => write!(f, "{}", id),
            Tag::Connection(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Var {
        name: String,
        tag: Option<Tag>,
    },
    Lit {
        ty: Type,
        tag: Option<Tag>,
    },
    App {
        func: Box<Expression>,
        arg: Box<Expression>,
        tag: Option<Tag>,
    },
    Abs {
        param: String,
        body: Box<Expression>,
        tag: Option<Tag>,
    },
    Let {
        name: String,
        bound: Box<Expression>,
        body: Box<Expression>,
        tag: Option<Tag>,
    },
}

impl Expression {
    pub fn var(name: impl Into<String>) -> Self {
        Expression::Var {
            name: name.into(),
            tag: None,
        }
    }

    pub fn lit(ty: Type) -> Self {
        Expression::Lit { ty, tag: None }
    }

    pub fn app(func: Expression, arg: Expression) -> Self {
        Expression::App {
            func: Box::new(func),
            arg: Box::new(arg),
            tag: None,
        }
    }

    /// `f a1 a2 ... an` as left-nested applications.
    pub fn apply_all(func: Expression, args: impl IntoIterator<Item = Expression>) -> Self {
        args.into_iter().fold(func, Expression::app)
    }

    pub fn abs(param: impl Into<String>, body: Expression) -> Self {
        Expression::Abs {
            param: param.into(),
            body: Box::new(body),
            tag: None,
        }
    }

    /// `\p1 -> \p2 -> ... -> body`.
    pub fn abs_all(params: impl IntoIterator<Item = String>, body: Expression) -> Self {
        let params: Vec<String> = params.into_iter().collect();
        params
            .into_iter()
            .rev()
            .fold(body, |acc, param| Expression::abs(param, acc))
    }

    pub fn let_in(name: impl Into<String>, bound: Expression, body: Expression) -> Self {
        Expression::Let {
            name: name.into(),
            bound: Box::new(bound),
            body: Box::new(body),
            tag: None,
        }
    }

    pub fn tag(&self) -> Option<Tag> {
        match self {
            Expression::Var { tag, .. }
            | Expression::Lit { tag, .. }
            | Expression::App { tag, .. }
            | Expression::Abs { tag, .. }
            | Expression::Let { tag, .. } => *tag,
        }
    }

    pub fn tagged(mut self, new_tag: Tag) -> Self {
        match &mut self {
            Expression::Var { tag, .. }
            | Expression::Lit { tag, .. }
            | Expression::App { tag, .. }
            | Expression::Abs { tag, .. }
            | Expression::Let { tag, .. } => *tag = Some(new_tag),
        }
        self
    }

    fn is_atomic(&self) -> bool {
        matches!(self, Expression::Var { .. } | Expression::Lit { .. })
    }

    fn fmt_arg(&self) -> String {
        if self.is_atomic() {
            self.to_string()
        } else {
            format!("({})", self)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Var { name, .. } => write!(f, "{}", name),
            Expression::Lit { ty, .. } => write!(f, "<{}>", ty),
            Expression::App { func, arg, .. } => {
                let func_str = match func.as_ref() {
                    Expression::App { .. } => func.to_string(),
                    other => other.fmt_arg(),
                };
                write!(f, "{} {}", func_str, arg.fmt_arg())
            }
            Expression::Abs { param, body, .. } => write!(f, "\\{} -> {}", param, body),
            Expression::Let {
                name, bound, body, ..
            } => write!(f, "let {} = {} in {}", name, bound, body),
        }
    }
}
