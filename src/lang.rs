//! The core term language inference runs on.
//!
//! Only six forms survive lowering: variables, single-argument application,
//! single-parameter abstraction, let-binding, and the literal forms (numbers,
//! floating numbers and tuples). Everything else in the surface language is
//! expressed in terms of these; see [`lower`].

use crate::ast::{Ast, NodeId};

pub mod lower;

/// Functions every unit can refer to without declaring them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Builtin {
    /// `fix : ∀a. (a -> a) -> a`, the fixpoint of local recursive bindings.
    Fix,
    /// `assign : ∀a. a -> a -> ()`, the typing of assignments.
    Assign,
    /// `if : ∀a. Bool -> a -> a -> a`, conditionals with both branches.
    If,
    /// `while : ∀a. Bool -> a -> ()`, loops.
    While,
}

impl Builtin {
    pub const ALL: [Builtin; 4] =
        [Builtin::Fix, Builtin::Assign, Builtin::If, Builtin::While];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Fix => "fix",
            Builtin::Assign => "assign",
            Builtin::If => "if",
            Builtin::While => "while",
        }
    }
}

/// A variable of the core language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Var {
    /// The value declared by an AST node.
    Decl(NodeId),
    /// A binder introduced by lowering, unique within one lowered term.
    Synthetic(u32),
    Builtin(Builtin),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(Box<str>),
    Floating(Box<str>),
    /// The empty tuple is unit.
    Tuple(Box<[Term]>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(Var),
    App {
        arg: Box<Term>,
        func: Box<Term>,
        /// The call this application was lowered from.
        origin: Option<NodeId>,
    },
    Lambda {
        bind: Var,
        body: Box<Term>,
        /// The lambda or function this abstraction was lowered from.
        origin: Option<NodeId>,
    },
    Let {
        binder: Box<Term>,
        bind: Var,
        usage: Box<Term>,
    },
    Literal(Literal),
}

impl From<Var> for Term {
    fn from(value: Var) -> Self {
        Term::Var(value)
    }
}

impl Term {
    pub fn app(arg: Term, func: Term) -> Self {
        Term::App {
            arg: Box::new(arg),
            func: Box::new(func),
            origin: None,
        }
    }

    pub fn lambda(bind: Var, body: Term) -> Self {
        Term::Lambda {
            bind,
            body: Box::new(body),
            origin: None,
        }
    }

    pub fn let_in(binder: Term, bind: Var, usage: Term) -> Self {
        Term::Let {
            binder: Box::new(binder),
            bind,
            usage: Box::new(usage),
        }
    }

    pub fn number(text: impl Into<Box<str>>) -> Self {
        Term::Literal(Literal::Number(text.into()))
    }

    pub fn floating(text: impl Into<Box<str>>) -> Self {
        Term::Literal(Literal::Floating(text.into()))
    }

    pub fn tuple(items: impl IntoIterator<Item = Term>) -> Self {
        Term::Literal(Literal::Tuple(items.into_iter().collect()))
    }

    pub fn unit() -> Self {
        Term::tuple([])
    }

    /// Marks an application or abstraction as lowered from `node`. Other
    /// terms are returned unchanged.
    pub fn with_origin(mut self, node: NodeId) -> Self {
        match &mut self {
            Term::App { origin, .. } | Term::Lambda { origin, .. } => {
                *origin = Some(node);
            }
            _ => (),
        }
        self
    }

    pub fn display<'a>(&'a self, ast: &'a Ast) -> TermDisplay<'a> {
        TermDisplay { term: self, ast }
    }
}

/// Applies `func` to each argument in turn: `f(a, b)` becomes `(f a) b`.
/// Without arguments, `func` is applied to unit.
pub fn curry(args: impl IntoIterator<Item = Term>, func: Term) -> Term {
    let mut args = args.into_iter().peekable();

    if args.peek().is_none() {
        return Term::app(Term::unit(), func);
    }

    args.fold(func, |func, arg| Term::app(arg, func))
}

/// Abstracts `body` over each binder in turn: `[x, y]` gives `λx. λy. body`.
/// Without binders, `body` is returned unchanged.
pub fn uncurry(
    binds: impl IntoIterator<Item = Var, IntoIter: DoubleEndedIterator>,
    body: Term,
) -> Term {
    binds
        .into_iter()
        .rev()
        .fold(body, |body, bind| Term::lambda(bind, body))
}

pub struct TermDisplay<'a> {
    term: &'a Term,
    ast: &'a Ast,
}

impl TermDisplay<'_> {
    fn var(&self, f: &mut std::fmt::Formatter<'_>, var: &Var) -> std::fmt::Result {
        match var {
            Var::Decl(node) => {
                f.write_str(self.ast.name_of(*node).unwrap_or("<anonymous>"))
            }
            Var::Synthetic(index) => write!(f, "_{index}"),
            Var::Builtin(builtin) => f.write_str(builtin.name()),
        }
    }

    fn nested<'b>(&'b self, term: &'b Term) -> TermDisplay<'b> {
        TermDisplay {
            term,
            ast: self.ast,
        }
    }
}

impl std::fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.term {
            Term::Var(var) => self.var(f, var),
            Term::App { arg, func, .. } => {
                write!(f, "{}({})", self.nested(func), self.nested(arg))
            }
            Term::Lambda { bind, body, .. } => {
                f.write_str("λ")?;
                self.var(f, bind)?;
                write!(f, ". {}", self.nested(body))
            }
            Term::Let {
                binder,
                bind,
                usage,
            } => {
                f.write_str("let ")?;
                self.var(f, bind)?;
                write!(f, " = {} in {}", self.nested(binder), self.nested(usage))
            }
            Term::Literal(Literal::Number(text) | Literal::Floating(text)) => {
                f.write_str(text)
            }
            Term::Literal(Literal::Tuple(items)) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.nested(item))?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Term, Var, curry, uncurry};
    use crate::ast::AstBuilder;

    #[test]
    fn curry_keeps_argument_order() {
        let f = Term::Var(Var::Synthetic(0));
        let term = curry([Term::number("1"), Term::number("2")], f.clone());

        assert_eq!(
            term,
            Term::app(
                Term::number("2"),
                Term::app(Term::number("1"), f.clone())
            )
        );
        assert_eq!(curry([], f.clone()), Term::app(Term::unit(), f));
    }

    #[test]
    fn uncurry_nests_binders() {
        let body = Term::unit();
        let term = uncurry([Var::Synthetic(0), Var::Synthetic(1)], body.clone());

        assert_eq!(
            term,
            Term::lambda(
                Var::Synthetic(0),
                Term::lambda(Var::Synthetic(1), body.clone())
            )
        );
        assert_eq!(uncurry([], body.clone()), body);
    }

    #[test]
    fn display() {
        let mut b = AstBuilder::new();
        let x = b.param("x");
        let module = b.module("M", []);
        let ast = b.finish_file("test.kd", [module]);

        let id = Term::lambda(Var::Decl(x), Term::Var(Var::Decl(x)));
        let term = Term::let_in(
            id,
            Var::Synthetic(0),
            curry(
                [Term::number("1"), Term::floating("1.0")],
                Term::Var(Var::Synthetic(0)),
            ),
        );

        assert_eq!(
            term.display(&ast).to_string(),
            "let _0 = λx. x in _0(1)(1.0)"
        );
    }
}
