//! Lowering of resolved AST expressions into core [`Term`]s.
//!
//! # Blocks
//! A block becomes a chain of `let`s. Variables and block-level functions
//! bind their own declaration, other non-final items bind a fresh synthetic
//! variable, and the final expression is the value of the chain (unit when
//! the block ends in a declaration or is empty). A reference to a block
//! binding that the chain has not bound yet is a [`LowerError::UsedBeforeBinding`].
//!
//! # Recursion
//! A block-level binding that refers to itself is lowered through
//! [`Builtin::Fix`]: `val f = e` becomes `let f = fix (λf. e)`. When `e` is
//! not itself a function, every reference to `f` inside it is forced as
//! `f(())`, which only types if `f` is a function of unit, so a plain value
//! that depends on itself is rejected as an infinite type.
//!
//! # Assumptions
//! Alongside each term, lowering collects the types that declarations
//! already fix: annotated parameters and variables, struct fields and
//! constructors, enum entries, and the signatures of abstract and foreign
//! functions.

use std::collections::HashSet;

use thiserror::Error;

use super::{Builtin, Term, Var, curry, uncurry};
use crate::{
    ast::{Ast, NodeId, NodeKind},
    infer::assumptions::Assumptions,
    ty::{
        Type,
        nominal::{EvalError, Nominals},
        scheme::TypeScheme,
    },
    unique::VarSupply,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    #[error("reference {0} was not resolved")]
    Unresolved(NodeId),
    #[error("{kind} {referral} cannot be used as a value")]
    NotAValue {
        reference: NodeId,
        referral: NodeId,
        kind: &'static str,
    },
    #[error("{referral} is used at {reference} before it is bound")]
    UsedBeforeBinding { reference: NodeId, referral: NodeId },
    #[error("{kind} {node} is not an expression")]
    NotAnExpression { node: NodeId, kind: &'static str },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

type Result<T, E = LowerError> = std::result::Result<T, E>;

/// Lowers `expr` on its own, returning the assumptions it relies on.
pub fn lower(
    ast: &Ast,
    nominals: &mut Nominals,
    vars: &mut VarSupply,
    expr: NodeId,
) -> Result<(Assumptions, Term)> {
    let mut lowerer = Lowerer::new(ast, nominals, vars);
    let term = lowerer.lower_expression(expr)?;
    Ok((lowerer.finish(), term))
}

pub struct Lowerer<'a> {
    ast: &'a Ast,
    nominals: &'a mut Nominals,
    vars: &'a mut VarSupply,
    assumptions: Assumptions,
    /// Variables whose own initializer is being lowered.
    delayed: Vec<NodeId>,
    /// Block bindings the let chain has reached.
    bound: HashSet<NodeId>,
    next_synthetic: u32,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        ast: &'a Ast,
        nominals: &'a mut Nominals,
        vars: &'a mut VarSupply,
    ) -> Self {
        Self {
            ast,
            nominals,
            vars,
            assumptions: Assumptions::new(),
            delayed: Vec::new(),
            bound: HashSet::new(),
            next_synthetic: 0,
        }
    }

    /// Returns the assumptions collected so far.
    pub fn finish(self) -> Assumptions {
        self.assumptions
    }

    /// Lowers the function declaration `decl` to an abstraction over its
    /// parameters.
    pub fn lower_function(&mut self, decl: NodeId) -> Result<Term> {
        let ast = self.ast;
        match ast.kind(decl) {
            NodeKind::Function { params, body, .. } => {
                self.abstraction(decl, params, *body)
            }
            kind => Err(LowerError::NotAnExpression {
                node: decl,
                kind: kind.describe(),
            }),
        }
    }

    /// Returns the type a function declaration's annotations promise:
    /// `p1 -> ... -> pn -> r`, with fresh variables where an annotation is
    /// missing.
    pub fn signature(&mut self, decl: NodeId) -> Result<Type> {
        let ast = self.ast;
        let (params, returns) = match ast.kind(decl) {
            NodeKind::Function {
                params, returns, ..
            } => (params, *returns),
            kind => {
                return Err(LowerError::NotAnExpression {
                    node: decl,
                    kind: kind.describe(),
                });
            }
        };

        let inputs = params
            .iter()
            .map(|&param| self.parameter_type(param))
            .collect::<Result<Vec<_>>>()?;
        let output = self.nominals.eval_or_fresh(self.ast, self.vars, returns)?;
        Ok(Type::uncurry(inputs, output))
    }

    pub fn lower_expression(&mut self, node: NodeId) -> Result<Term> {
        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::Number(text) => Ok(Term::number(text.clone())),
            NodeKind::Floating(text) => Ok(Term::floating(text.clone())),
            NodeKind::Tuple(items) => Ok(Term::tuple(
                items
                    .iter()
                    .map(|&item| self.lower_expression(item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            NodeKind::Resolved { referral, .. } => {
                self.reference(node, *referral)
            }
            NodeKind::Reference(_) => Err(LowerError::Unresolved(node)),
            NodeKind::Call { callee, args } => {
                let func = self.lower_expression(*callee)?;
                let args = args
                    .iter()
                    .map(|&arg| self.lower_expression(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(curry(args, func).with_origin(node))
            }
            NodeKind::Lambda { params, body } => {
                self.abstraction(node, params, *body)
            }
            NodeKind::Block { items } => self.block(items),
            NodeKind::Assign { target, value } => {
                let target = self.lower_expression(*target)?;
                let value = self.lower_expression(*value)?;
                Ok(curry(
                    [target, value],
                    Term::Var(Var::Builtin(Builtin::Assign)),
                ))
            }
            NodeKind::While { condition, body } => {
                let condition = self.lower_expression(*condition)?;
                let body = self.lower_expression(*body)?;
                Ok(curry(
                    [condition, body],
                    Term::Var(Var::Builtin(Builtin::While)),
                ))
            }
            NodeKind::If {
                condition,
                body,
                elifs,
                otherwise,
            } => {
                let mut branches = vec![(*condition, *body)];
                branches.extend(elifs.iter().copied());

                let mut lowered = match otherwise {
                    Some(otherwise) => self.lower_expression(*otherwise)?,
                    None => Term::unit(),
                };
                for &(condition, body) in branches.iter().rev() {
                    let condition = self.lower_expression(condition)?;
                    let body = self.lower_expression(body)?;
                    lowered = curry(
                        [condition, body, lowered],
                        Term::Var(Var::Builtin(Builtin::If)),
                    );
                }
                Ok(lowered)
            }
            kind => Err(LowerError::NotAnExpression {
                node,
                kind: kind.describe(),
            }),
        }
    }

    fn abstraction(
        &mut self,
        origin: NodeId,
        params: &[NodeId],
        body: NodeId,
    ) -> Result<Term> {
        let ast = self.ast;
        let mut binds = Vec::with_capacity(params.len().max(1));

        for &param in params {
            if let NodeKind::Parameter { ty: Some(ty), .. } = ast.kind(param)
            {
                let ty = self.nominals.eval(self.ast, *ty)?;
                self.assumptions
                    .insert(Var::Decl(param), TypeScheme::mono(ty));
            }
            binds.push(Var::Decl(param));
        }

        if binds.is_empty() {
            binds.push(self.synthetic());
        }

        let body = self.lower_expression(body)?;
        Ok(uncurry(binds, body).with_origin(origin))
    }

    fn block(&mut self, items: &[NodeId]) -> Result<Term> {
        let ast = self.ast;
        let Some((&first, rest)) = items.split_first() else {
            return Ok(Term::unit());
        };

        match ast.kind(first) {
            NodeKind::Var { ty, value, .. } => {
                if let Some(ty) = ty {
                    let ty = self.nominals.eval(self.ast, *ty)?;
                    self.assumptions
                        .insert(Var::Decl(first), TypeScheme::mono(ty));
                }

                self.bound.insert(first);
                let binder = self.binding(first, *value)?;
                let usage = self.block(rest)?;
                Ok(Term::let_in(binder, Var::Decl(first), usage))
            }
            NodeKind::Function { .. } => {
                self.bound.insert(first);
                let function = self.lower_function(first)?;
                let binder = match self.refers_to(first, first) {
                    true => fix(first, function),
                    false => function,
                };
                let usage = self.block(rest)?;
                Ok(Term::let_in(binder, Var::Decl(first), usage))
            }
            _ if rest.is_empty() => self.lower_expression(first),
            _ => {
                let binder = self.lower_expression(first)?;
                let bind = self.synthetic();
                let usage = self.block(rest)?;
                Ok(Term::let_in(binder, bind, usage))
            }
        }
    }

    /// Lowers the initializer `value` of the variable `var`.
    fn binding(&mut self, var: NodeId, value: NodeId) -> Result<Term> {
        if !self.refers_to(value, var) {
            return self.lower_expression(value);
        }

        if matches!(self.ast.kind(value), NodeKind::Lambda { .. }) {
            let function = self.lower_expression(value)?;
            return Ok(fix(var, function));
        }

        self.delayed.push(var);
        let lowered = self.lower_expression(value);
        self.delayed.pop();
        Ok(fix(var, lowered?))
    }

    fn reference(&mut self, node: NodeId, referral: NodeId) -> Result<Term> {
        let ast = self.ast;
        let var = Var::Decl(referral);

        match ast.kind(referral) {
            NodeKind::Var { .. } | NodeKind::Function { .. } => {
                let in_block = ast.parent(referral).is_some_and(|owner| {
                    matches!(ast.kind(owner), NodeKind::Block { .. })
                });

                if in_block && !self.bound.contains(&referral) {
                    return Err(LowerError::UsedBeforeBinding {
                        reference: node,
                        referral,
                    });
                }
            }
            NodeKind::Parameter { .. } => {
                let owner = ast.parent(referral);
                let is_field = owner.is_some_and(|owner| {
                    matches!(ast.kind(owner), NodeKind::Struct { .. })
                });

                if is_field && !self.assumptions.contains(&var) {
                    let ty = match self.nominals.field(self.ast, self.vars, referral)? {
                        Some(ty) => ty,
                        None => Type::Var(self.vars.fresh()),
                    };
                    self.assumptions.insert(var, TypeScheme::mono(ty));
                }
            }
            NodeKind::Struct { .. } => {
                if !self.assumptions.contains(&var) {
                    let ty =
                        self.nominals.constructor(self.ast, self.vars, referral)?;
                    self.assumptions.insert(var, TypeScheme::mono(ty));
                }
            }
            NodeKind::EnumEntry { .. } => {
                if let Some(owner) = ast.parent(referral) {
                    let ty = Nominals::declared(self.ast, owner)?;
                    self.assumptions.insert(var, TypeScheme::mono(ty));
                }
            }
            NodeKind::AbstractFunction {
                params, returns, ..
            }
            | NodeKind::ForeignFunction {
                params, returns, ..
            } => {
                if !self.assumptions.contains(&var) {
                    let inputs = params
                        .iter()
                        .map(|&param| self.parameter_type(param))
                        .collect::<Result<Vec<_>>>()?;
                    let output = match returns {
                        Some(returns) => self.nominals.eval(self.ast, *returns)?,
                        None => Type::unit(),
                    };
                    let ty = Type::uncurry(inputs, output);
                    self.assumptions.insert(var, TypeScheme::closed(ty));
                }
            }
            kind => {
                return Err(LowerError::NotAValue {
                    reference: node,
                    referral,
                    kind: kind.describe(),
                });
            }
        }

        match self.delayed.contains(&referral) {
            true => Ok(Term::app(Term::unit(), Term::Var(var))),
            false => Ok(Term::Var(var)),
        }
    }

    fn parameter_type(&mut self, param: NodeId) -> Result<Type> {
        let ty = match self.ast.kind(param) {
            NodeKind::Parameter { ty, .. } => *ty,
            _ => None,
        };
        Ok(self.nominals.eval_or_fresh(self.ast, self.vars, ty)?)
    }

    fn synthetic(&mut self) -> Var {
        let var = Var::Synthetic(self.next_synthetic);
        self.next_synthetic += 1;
        var
    }

    /// Whether any reference below `node` (inclusive) resolves to `target`.
    fn refers_to(&self, node: NodeId, target: NodeId) -> bool {
        self.ast.walk_from(node).into_iter().any(|id| {
            matches!(
                self.ast.kind(id),
                NodeKind::Resolved { referral, .. } if *referral == target
            )
        })
    }
}

/// `fix (λbind. term)`
fn fix(bind: NodeId, term: Term) -> Term {
    Term::app(
        Term::lambda(Var::Decl(bind), term),
        Term::Var(Var::Builtin(Builtin::Fix)),
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{LowerError, Lowerer, lower};
    use crate::{
        ast::{Ast, AstBuilder, NodeId, NodeKind},
        lang::{Term, Var},
        resolve::Resolver,
        scope::ScopeTree,
        ty::{Type, nominal::Nominals},
        unique::VarSupply,
    };

    /// Resolves every reference and type reference in place.
    fn resolved(mut ast: Ast) -> Ast {
        let scopes = ScopeTree::build(&ast);
        let resolver = Resolver::new(&ast, &scopes);
        let values = resolver.resolve_all_references();
        let types = resolver.resolve_all_type_references();

        for (id, reference, result) in values {
            let referral = result.unwrap();
            ast.replace(id, NodeKind::Resolved { reference, referral });
        }
        for (id, reference, result) in types {
            let referral = result.unwrap();
            ast.replace(id, NodeKind::ResolvedType { reference, referral });
        }

        ast
    }

    fn lower_body(ast: &Ast, function: NodeId) -> String {
        let mut nominals = Nominals::new();
        let mut vars = VarSupply::new();
        let term = Lowerer::new(ast, &mut nominals, &mut vars)
            .lower_function(function)
            .unwrap();
        term.display(ast).to_string()
    }

    #[test]
    fn block_becomes_let_chain() {
        let mut b = AstBuilder::new();
        let x = b.param("x");
        let one = b.number("1");
        let a = b.var("a", one);
        let f = b.reference("f");
        let ra = b.reference("a");
        let call = b.call(f, [ra]);
        let rx = b.reference("x");
        let ra2 = b.reference("a");
        let result = b.tuple([rx, ra2]);
        let block = b.block([a, call, result]);
        let function = b.function("f", [x], block);
        let module = b.module("M", [function]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        assert_eq!(
            lower_body(&ast, function),
            "λx. let a = 1 in let _0 = f(a) in (x, a)"
        );
    }

    #[test]
    fn calls_curry_and_empty_params_take_unit() {
        let mut b = AstBuilder::new();
        let g = b.reference("g");
        let call = b.call(g, []);
        let main = b.function("main", [], call);
        let one = b.number("1");
        let g_fn = b.function("g", [], one);
        let module = b.module("M", [main, g_fn]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        assert_eq!(lower_body(&ast, main), "λ_0. g(())");
    }

    #[test]
    fn self_referential_value_is_delayed() {
        let mut b = AstBuilder::new();
        let r = b.reference("x");
        let x = b.var("x", r);
        let block = b.block([x]);
        let main = b.function("main", [], block);
        let module = b.module("M", [main]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        assert_eq!(
            lower_body(&ast, main),
            "λ_0. let x = fix(λx. x(())) in ()"
        );
    }

    #[test]
    fn local_recursive_function_uses_fix() {
        let mut b = AstBuilder::new();
        let n = b.param("n");
        let go = b.reference("go");
        let rn = b.reference("n");
        let call = b.call(go, [rn]);
        let go_fn = b.function("go", [n], call);
        let result = b.reference("go");
        let block = b.block([go_fn, result]);
        let main = b.function("main", [], block);
        let module = b.module("M", [main]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        assert_eq!(
            lower_body(&ast, main),
            "λ_0. let go = fix(λgo. λn. go(n)) in go"
        );
    }

    #[test]
    fn assignment_and_loops() {
        let mut b = AstBuilder::new();
        let zero = b.number("0");
        let i = b.mutable_var("i", zero);
        let target = b.reference("i");
        let one = b.number("1");
        let assign = b.assign(target, one);
        let cond = b.reference("i");
        let body = b.block([assign]);
        let loop_ = b.while_loop(cond, body);
        let block = b.block([i, loop_]);
        let main = b.function("main", [], block);
        let module = b.module("M", [main]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        assert_eq!(
            lower_body(&ast, main),
            "λ_0. let i = 0 in while(i)(assign(i)(1))"
        );
    }

    #[test]
    fn elifs_nest_into_the_else_branch() {
        // fun pick(c, d, x, y, z) => if c { x } elif d { y } else { z }
        let mut b = AstBuilder::new();
        let params = ["c", "d", "x", "y", "z"].map(|name| b.param(name));
        let [rc, rd, rx, ry, rz] = ["c", "d", "x", "y", "z"].map(|name| b.reference(name));
        let branch = b.if_expr(rc, rx, [(rd, ry)], Some(rz));
        let pick = b.function("pick", params, branch);
        let module = b.module("M", [pick]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        assert_eq!(
            lower_body(&ast, pick),
            "λc. λd. λx. λy. λz. if(c)(x)(if(d)(y)(z))"
        );
    }

    #[test]
    fn if_without_else_yields_unit() {
        let mut b = AstBuilder::new();
        let c = b.param("c");
        let rc = b.reference("c");
        let one = b.number("1");
        let branch = b.if_expr(rc, one, [], None);
        let f = b.function("f", [c], branch);
        let module = b.module("M", [f]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        assert_eq!(lower_body(&ast, f), "λc. if(c)(1)(())");
    }

    #[test]
    fn later_block_bindings_are_not_yet_bound() {
        // fun main() => { val a = g; fun g() => 1 }
        let mut b = AstBuilder::new();
        let rg = b.reference("g");
        let a = b.var("a", rg);
        let one = b.number("1");
        let g = b.function("g", [], one);
        let block = b.block([a, g]);
        let main = b.function("main", [], block);
        let module = b.module("M", [main]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        let mut nominals = Nominals::new();
        let mut vars = VarSupply::new();
        let result = Lowerer::new(&ast, &mut nominals, &mut vars).lower_function(main);
        assert_eq!(
            result,
            Err(LowerError::UsedBeforeBinding {
                reference: rg,
                referral: g,
            })
        );
    }

    #[test]
    fn annotations_become_assumptions() {
        let mut b = AstBuilder::new();
        let field_ty = b.type_ref("Point");
        let field = b.typed_param("next", field_ty);
        let point = b.structure("Point", [field], []);
        let ctor = b.reference("Point");
        let main = b.function("main", [], ctor);
        let module = b.module("M", [point, main]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        let mut nominals = Nominals::new();
        let mut vars = VarSupply::new();
        let (assumptions, term) =
            lower(&ast, &mut nominals, &mut vars, ctor).unwrap();

        assert_eq!(term, Term::Var(Var::Decl(point)));
        assert_eq!(
            assumptions
                .get(&Var::Decl(point))
                .unwrap()
                .body
                .display(&ast.interner)
                .to_string(),
            "Point -> Point"
        );
    }

    #[test]
    fn unresolved_references_are_reported() {
        let mut b = AstBuilder::new();
        let r = b.reference("nowhere");
        let main = b.function("main", [], r);
        let module = b.module("M", [main]);
        let ast = b.finish_file("test.kd", [module]);

        let mut nominals = Nominals::new();
        let mut vars = VarSupply::new();
        let result = Lowerer::new(&ast, &mut nominals, &mut vars).lower_function(main);
        assert_eq!(result, Err(LowerError::Unresolved(r)));
    }

    #[test]
    fn traits_are_not_values() {
        let mut b = AstBuilder::new();
        let show = b.trait_decl("Show", []);
        let r = b.reference("Show");
        let main = b.function("main", [], r);
        let module = b.module("M", [show, main]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        let mut nominals = Nominals::new();
        let mut vars = VarSupply::new();
        let result = lower(&ast, &mut nominals, &mut vars, r);
        assert_eq!(
            result.map(|(_, term)| term),
            Err(LowerError::NotAValue {
                reference: r,
                referral: show,
                kind: "trait",
            })
        );
    }

    #[test]
    fn signature_uses_annotations() {
        let mut b = AstBuilder::new();
        let x = b.param("x");
        let ret = b.tuple_type([]);
        let unit = b.tuple([]);
        let f = b.typed_function("f", [x], Some(ret), unit);
        let module = b.module("M", [f]);
        let ast = resolved(b.finish_file("test.kd", [module]));

        let mut nominals = Nominals::new();
        let mut vars = VarSupply::new();
        let signature = Lowerer::new(&ast, &mut nominals, &mut vars)
            .signature(f)
            .unwrap();
        assert!(matches!(signature, Type::Fn(_, ref out) if out.is_unit()));
        assert_eq!(signature.display(&ast.interner).to_string(), "a -> ()");
    }
}
