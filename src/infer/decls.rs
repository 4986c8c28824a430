//! Inference over the top-level functions of a unit.
//!
//! Functions declared directly in a module, struct or trait are grouped by
//! the strongly connected components of their reference graph and inferred
//! dependencies first. Members of one group see each other monomorphically
//! and are generalized together once the whole group is typed. A group whose
//! inference fails is reported once, and every group that uses it is skipped
//! with a note.
//!
//! What a group learns about the monomorphic variables of the unit, such as
//! the type of an unannotated struct field, is kept for the groups after it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::{algo::tarjan_scc, graph::DiGraph};

use super::{InferError, Inferencer, assumptions::Assumptions};
use crate::{
    ast::{Ast, NodeId, NodeKind},
    lang::{Term, Var, lower::{LowerError, Lowerer}},
    report::{Report, ReportMessage, ReportSink, UnrecoverableError},
    span::{Span, Spanned},
    ty::{Type, nominal::Nominals, scheme::TypeScheme, subst::Subst, unify::unify},
    unique::VarSupply,
};

/// Everything inference learned about a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferredTypes {
    /// The schemes of successfully typed top-level functions.
    pub declarations: BTreeMap<NodeId, TypeScheme>,
    /// The types of calls, lambdas and function declarations inside
    /// successfully typed functions.
    pub expressions: BTreeMap<NodeId, Type>,
}

impl InferredTypes {
    pub fn declaration(&self, decl: NodeId) -> Option<&TypeScheme> {
        self.declarations.get(&decl)
    }

    pub fn expression(&self, node: NodeId) -> Option<&Type> {
        self.expressions.get(&node)
    }
}

struct Lowered {
    term: Term,
    signature: Type,
    span: Span,
}

/// Infers every top-level function of `ast`.
///
/// User-facing failures are sent to `sink`; an internal failure stops
/// inference and is returned.
#[tracing::instrument(skip_all, fields(file = ast.file()))]
pub fn infer_declarations(
    ast: &Ast,
    vars: &mut VarSupply,
    sink: &mut impl ReportSink,
) -> Result<InferredTypes, UnrecoverableError> {
    let functions = top_level_functions(ast);
    let mut nominals = Nominals::new();
    let mut base = Assumptions::prelude(vars);
    let mut lowered = HashMap::with_capacity(functions.len());
    let mut failed = BTreeSet::new();

    for &function in &functions {
        let mut lowerer = Lowerer::new(ast, &mut nominals, vars);
        let result = lowerer
            .lower_function(function)
            .and_then(|term| Ok((term, lowerer.signature(function)?)));
        base.extend(
            lowerer
                .finish()
                .iter()
                .map(|(var, scheme)| (*var, scheme.clone())),
        );

        match result {
            Ok((term, signature)) => {
                let span = ast.span(function);
                lowered.insert(function, Lowered { term, signature, span });
            }
            Err(error) => {
                sink.report(lowering_report(ast, error)?);
                failed.insert(function);
            }
        }
    }

    let (graph, groups) = dependency_groups(ast, &functions);
    let mut inferred = InferredTypes::default();
    let mut solved = Subst::empty();

    for group in groups {
        let failed_dependency = group
            .iter()
            .flat_map(|member| graph.get(member).into_iter().flatten())
            .find(|dep| !group.contains(dep) && failed.contains(*dep));

        if let Some(&dep) = failed_dependency {
            for &member in &group {
                let name = ast.name_of(member).unwrap_or_default();
                tracing::debug!(name, dependency = %dep, "skipping declaration");
                sink.report(Report::new(
                    ast.file(),
                    [ast.span(member), ast.span(dep)],
                    ReportMessage::DependencyFailed(name.into()),
                ));
            }
            failed.extend(group);
            continue;
        }

        if group.iter().any(|member| failed.contains(member)) {
            failed.extend(group);
            continue;
        }

        let members: Vec<_> = group
            .iter()
            .filter_map(|member| Some((*member, lowered.get(member)?)))
            .collect();

        match infer_group(&base, &members, vars) {
            Ok(Typed {
                schemes,
                judgements,
                subst,
            }) => {
                base = base.substitute(&subst);
                solved = subst.compose(&solved);

                for (member, scheme) in schemes {
                    tracing::debug!(
                        name = ast.name_of(member).unwrap_or_default(),
                        scheme = %scheme.display(&ast.interner),
                        "inferred"
                    );
                    base.insert(Var::Decl(member), scheme.clone());
                    inferred.declarations.insert(member, scheme);
                }
                inferred.expressions.extend(judgements);
            }
            Err(error) => {
                sink.report(inference_report(ast, error)?);
                failed.extend(group);
            }
        }
    }

    for scheme in inferred.declarations.values_mut() {
        *scheme = scheme.substitute(&solved);
    }
    for ty in inferred.expressions.values_mut() {
        *ty = solved.apply(ty);
    }

    Ok(inferred)
}

struct Typed {
    schemes: Vec<(NodeId, TypeScheme)>,
    judgements: Vec<(NodeId, Type)>,
    subst: Subst,
}

/// Infers one strongly connected group against `base`. A failure is located
/// at the member being typed.
fn infer_group(
    base: &Assumptions,
    members: &[(NodeId, &Lowered)],
    vars: &mut VarSupply,
) -> Result<Typed, Spanned<InferError>> {
    let betas: Vec<_> = members
        .iter()
        .map(|(member, _)| (*member, Type::Var(vars.fresh())))
        .collect();
    let assumed = base.combine(
        &betas
            .iter()
            .map(|(member, beta)| (Var::Decl(*member), TypeScheme::mono(beta.clone())))
            .collect::<Assumptions>(),
    );

    let mut inferencer = Inferencer::new(vars);
    let mut subst = Subst::empty();

    for ((_, lowered), (_, beta)) in members.iter().zip(&betas) {
        let at = |error: InferError| lowered.span.with(error);

        let (s, ty) = inferencer
            .infer(&lowered.term, &assumed.substitute(&subst))
            .map_err(at)?;
        subst = s.compose(&subst);

        let s = unify(&subst.apply(beta), &subst.apply(&ty))
            .map_err(|error| at(error.into()))?;
        subst = s.compose(&subst);

        let s = unify(&subst.apply(&lowered.signature), &subst.apply(&ty))
            .map_err(|error| at(error.into()))?;
        subst = s.compose(&subst);
    }

    let context = base.substitute(&subst);
    let schemes = betas
        .iter()
        .map(|(member, beta)| (*member, context.generalize(&subst.apply(beta))))
        .collect();
    let judgements = inferencer
        .into_judgements()
        .into_iter()
        .map(|(node, ty)| (node, subst.apply(&ty)))
        .collect();

    Ok(Typed {
        schemes,
        judgements,
        subst,
    })
}

/// Functions declared directly in a module, struct or trait, in pre-order.
fn top_level_functions(ast: &Ast) -> Vec<NodeId> {
    ast.walk()
        .into_iter()
        .filter(|&id| matches!(ast.kind(id), NodeKind::Function { .. }))
        .filter(|&id| {
            ast.parent(id).is_some_and(|parent| {
                matches!(
                    ast.kind(parent),
                    NodeKind::Module { .. }
                        | NodeKind::Struct { .. }
                        | NodeKind::Trait { .. }
                )
            })
        })
        .collect()
}

/// Returns the functions each function refers to, and the strongly
/// connected groups of `functions` with dependencies first.
fn dependency_groups(
    ast: &Ast,
    functions: &[NodeId],
) -> (HashMap<NodeId, BTreeSet<NodeId>>, Vec<Vec<NodeId>>) {
    let mut graph = DiGraph::<NodeId, ()>::with_capacity(functions.len(), 0);
    let index: HashMap<_, _> = functions
        .iter()
        .map(|&function| (function, graph.add_node(function)))
        .collect();
    let mut uses = HashMap::with_capacity(functions.len());

    for &function in functions {
        let deps: BTreeSet<_> = ast
            .walk_from(function)
            .into_iter()
            .filter_map(|id| match ast.kind(id) {
                NodeKind::Resolved { referral, .. } => Some(*referral),
                _ => None,
            })
            .filter(|referral| index.contains_key(referral))
            .collect();

        for dep in &deps {
            graph.update_edge(index[&function], index[dep], ());
        }
        uses.insert(function, deps);
    }

    // tarjan_scc yields components in reverse topological order, which with
    // edges pointing at dependencies puts dependencies first.
    let groups = tarjan_scc(&graph)
        .into_iter()
        .map(|component| {
            let mut group: Vec<_> =
                component.into_iter().map(|node| graph[node]).collect();
            group.sort();
            group
        })
        .collect();

    (uses, groups)
}

fn lowering_report(ast: &Ast, error: LowerError) -> Result<Report, UnrecoverableError> {
    match &error {
        LowerError::NotAValue {
            reference,
            referral,
            kind,
        } => Ok(Report::new(
            ast.file(),
            [ast.span(*reference), ast.span(*referral)],
            ReportMessage::NotAValue {
                kind: *kind,
                name: ast.name_of(*referral).unwrap_or_default().into(),
            },
        )),
        LowerError::UsedBeforeBinding {
            reference,
            referral,
        } => Ok(Report::new(
            ast.file(),
            [ast.span(*reference), ast.span(*referral)],
            ReportMessage::UsedBeforeBinding(
                ast.name_of(*referral).unwrap_or_default().into(),
            ),
        )),
        LowerError::Unresolved(node) | LowerError::NotAnExpression { node, .. } => {
            Err(crash(ast, ast.span(*node), &error))
        }
        LowerError::Eval(eval) => Err(crash(ast, eval.span(), &error)),
    }
}

fn inference_report(
    ast: &Ast,
    error: Spanned<InferError>,
) -> Result<Report, UnrecoverableError> {
    let interner = &ast.interner;
    let message = match &*error {
        InferError::CannotUnify(expected, found) => ReportMessage::MismatchedTypes {
            expected: expected.display(interner).to_string().into(),
            found: found.display(interner).to_string().into(),
        },
        InferError::InfiniteType(var, ty) => ReportMessage::InfiniteType {
            var: var.to_string().into(),
            ty: ty.display(interner).to_string().into(),
        },
        InferError::UnknownVariable(_) => {
            return Err(crash(ast, error.span, &error.item));
        }
    };

    Ok(Report::new(ast.file(), [error.span], message))
}

fn crash(
    ast: &Ast,
    span: Span,
    error: &dyn std::error::Error,
) -> UnrecoverableError {
    Report::new(
        ast.file(),
        [span],
        ReportMessage::crash(error.to_string()),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{InferredTypes, infer_declarations};
    use crate::{
        ast::{Ast, AstBuilder, NodeKind},
        report::{Report, ReportMessage, Severity},
        resolve::Resolver,
        scope::ScopeTree,
        ty::Type,
        unique::VarSupply,
    };

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

    fn run(ast: &Ast) -> (InferredTypes, Vec<Report>) {
        let mut reports = Vec::new();
        let inferred =
            infer_declarations(ast, &mut VarSupply::new(), &mut reports).unwrap();
        (inferred, reports)
    }

    fn scheme_of(ast: &Ast, inferred: &InferredTypes, name: &str) -> String {
        let decl = ast.find_declaration(name).unwrap();
        inferred
            .declaration(decl)
            .unwrap()
            .display(&ast.interner)
            .to_string()
    }

    #[test]
    fn polymorphic_identity() {
        // fun id(x) => x
        // fun main() => { val a = id(1); val b = id(1.0); (a, b) }
        let mut b = AstBuilder::new();
        let x = b.param("x");
        let rx = b.reference("x");
        let id = b.function("id", [x], rx);

        let f1 = b.reference("id");
        let one = b.number("1");
        let call_number = b.call(f1, [one]);
        let va = b.var("a", call_number);
        let f2 = b.reference("id");
        let half = b.floating("1.0");
        let call_floating = b.call(f2, [half]);
        let vb = b.var("b", call_floating);
        let ra = b.reference("a");
        let rb = b.reference("b");
        let pair = b.tuple([ra, rb]);
        let body = b.block([va, vb, pair]);
        let main = b.function("main", [], body);

        let module = b.global_module("M", [main, id]);
        let ast = resolved(b.finish_file("main.kd", [module]));
        let (inferred, reports) = run(&ast);

        assert_eq!(reports, vec![]);
        assert_eq!(scheme_of(&ast, &inferred, "id"), "∀a. a -> a");
        assert_eq!(scheme_of(&ast, &inferred, "main"), "() -> (Number, Floating)");
        assert_eq!(inferred.expression(call_number), Some(&Type::NUMBER));
        assert_eq!(inferred.expression(call_floating), Some(&Type::FLOATING));
    }

    #[test]
    fn self_dependent_value_is_infinite() {
        // fun main() => { val x = x; x }
        let mut b = AstBuilder::new();
        let rx = b.reference("x");
        let x = b.var("x", rx);
        let rx2 = b.reference("x");
        let body = b.block([x, rx2]);
        let main = b.function("main", [], body);
        let module = b.global_module("M", [main]);
        let ast = resolved(b.finish_file("main.kd", [module]));

        let (inferred, reports) = run(&ast);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].severity, Severity::Error);
        assert!(matches!(
            reports[0].message,
            ReportMessage::InfiniteType { .. }
        ));
        assert_eq!(reports[0].points[0], ast.span(main));
        assert!(inferred.declarations.is_empty());
    }

    #[test]
    fn mutual_recursion_is_generalized_jointly() {
        // fun ping(n) => pong(n)
        // fun pong(n) => ping(n)
        let mut b = AstBuilder::new();
        let n1 = b.param("n");
        let rpong = b.reference("pong");
        let rn1 = b.reference("n");
        let call_pong = b.call(rpong, [rn1]);
        let ping = b.function("ping", [n1], call_pong);

        let n2 = b.param("n");
        let rping = b.reference("ping");
        let rn2 = b.reference("n");
        let call_ping = b.call(rping, [rn2]);
        let pong = b.function("pong", [n2], call_ping);

        let module = b.global_module("M", [ping, pong]);
        let ast = resolved(b.finish_file("main.kd", [module]));
        let (inferred, reports) = run(&ast);

        assert_eq!(reports, vec![]);
        assert_eq!(scheme_of(&ast, &inferred, "ping"), "∀a, b. a -> b");
        assert_eq!(scheme_of(&ast, &inferred, "pong"), "∀a, b. a -> b");
    }

    #[test]
    fn dependents_of_failed_declarations_are_skipped() {
        // fun bad() => 1(2)
        // fun user() => bad()
        // fun fine() => 1
        let mut b = AstBuilder::new();
        let one = b.number("1");
        let two = b.number("2");
        let wrong = b.call(one, [two]);
        let bad = b.function("bad", [], wrong);

        let rbad = b.reference("bad");
        let call_bad = b.call(rbad, []);
        let user = b.function("user", [], call_bad);

        let three = b.number("1");
        let fine = b.function("fine", [], three);

        let module = b.global_module("M", [bad, user, fine]);
        let ast = resolved(b.finish_file("main.kd", [module]));
        let (inferred, reports) = run(&ast);

        let codes: Vec<_> = reports.iter().map(|r| r.message.code()).collect();
        assert_eq!(codes, vec!["KTyE1", "KTyN1"]);
        assert_eq!(reports[1].severity, Severity::Note);
        assert_eq!(reports[1].points[0], ast.span(user));

        assert_eq!(inferred.declaration(bad), None);
        assert_eq!(inferred.declaration(user), None);
        assert_eq!(scheme_of(&ast, &inferred, "fine"), "() -> Number");
    }

    #[test]
    fn annotations_constrain_signatures() {
        // struct Point
        // fun origin(p: Point) => p
        // fun wrong(): Point => 1
        let mut b = AstBuilder::new();
        let point = b.structure("Point", [], []);

        let annotation = b.type_ref("Point");
        let p = b.typed_param("p", annotation);
        let rp = b.reference("p");
        let origin = b.function("origin", [p], rp);

        let returns = b.type_ref("Point");
        let one = b.number("1");
        let wrong = b.typed_function("wrong", [], Some(returns), one);

        let module = b.global_module("M", [point, origin, wrong]);
        let ast = resolved(b.finish_file("main.kd", [module]));
        let (inferred, reports) = run(&ast);

        assert_eq!(scheme_of(&ast, &inferred, "origin"), "Point -> Point");
        assert_eq!(inferred.declaration(wrong), None);
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].message,
            ReportMessage::MismatchedTypes {
                expected: "Point".into(),
                found: "Number".into(),
            }
        );
    }

    #[test]
    fn field_types_are_shared_between_groups() {
        // struct P(f) {
        //     fun a() => f(1)
        //     fun c() => (a(), f(1.0))
        // }
        let mut b = AstBuilder::new();
        let f = b.param("f");

        let rf = b.reference("f");
        let one = b.number("1");
        let call_number = b.call(rf, [one]);
        let a = b.function("a", [], call_number);

        let ra = b.reference("a");
        let call_a = b.call(ra, []);
        let rf = b.reference("f");
        let half = b.floating("1.0");
        let call_floating = b.call(rf, [half]);
        let pair = b.tuple([call_a, call_floating]);
        let c = b.function("c", [], pair);

        let p = b.structure("P", [f], [a, c]);
        let module = b.global_module("M", [p]);
        let ast = resolved(b.finish_file("main.kd", [module]));
        let (inferred, reports) = run(&ast);

        assert!(inferred.declaration(a).is_some());
        assert_eq!(inferred.declaration(c), None);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].points[0], ast.span(c));
        assert_eq!(
            reports[0].message,
            ReportMessage::MismatchedTypes {
                expected: "Number".into(),
                found: "Floating".into(),
            }
        );
    }

    #[test]
    fn conditions_are_booleans() {
        // fun choose(c, x, y) => if c { x } else { y }
        // fun spin() => while 1 { () }
        let mut b = AstBuilder::new();
        let c = b.param("c");
        let x = b.param("x");
        let y = b.param("y");
        let rc = b.reference("c");
        let rx = b.reference("x");
        let ry = b.reference("y");
        let branch = b.if_expr(rc, rx, [], Some(ry));
        let choose = b.function("choose", [c, x, y], branch);

        let one = b.number("1");
        let unit = b.tuple([]);
        let body = b.block([unit]);
        let loop_ = b.while_loop(one, body);
        let spin = b.function("spin", [], loop_);

        let module = b.global_module("M", [choose, spin]);
        let ast = resolved(b.finish_file("main.kd", [module]));
        let (inferred, reports) = run(&ast);

        assert_eq!(scheme_of(&ast, &inferred, "choose"), "∀a. Bool -> a -> a -> a");
        assert_eq!(inferred.declaration(spin), None);
        assert_eq!(
            reports.iter().map(|r| &r.message).collect::<Vec<_>>(),
            vec![&ReportMessage::MismatchedTypes {
                expected: "Bool".into(),
                found: "Number".into(),
            }]
        );
    }

    #[test]
    fn block_bindings_used_too_early_are_errors() {
        // fun main() => { val a = b; val b = 1; a }
        let mut b = AstBuilder::new();
        let rb = b.reference("b");
        let va = b.var("a", rb);
        let one = b.number("1");
        let vb = b.var("b", one);
        let ra = b.reference("a");
        let body = b.block([va, vb, ra]);
        let main = b.function("main", [], body);
        let module = b.global_module("M", [main]);
        let ast = resolved(b.finish_file("main.kd", [module]));
        let (inferred, reports) = run(&ast);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].severity, Severity::Error);
        assert_eq!(reports[0].message, ReportMessage::UsedBeforeBinding("b".into()));
        assert_eq!(&reports[0].points[..], &[ast.span(rb), ast.span(vb)]);
        assert!(inferred.declarations.is_empty());
    }

    #[test]
    fn traits_used_as_values_are_reported() {
        // trait Shape
        // fun main() => Shape
        let mut b = AstBuilder::new();
        let shape = b.trait_decl("Shape", []);
        let rshape = b.reference("Shape");
        let main = b.function("main", [], rshape);
        let module = b.global_module("M", [shape, main]);
        let ast = resolved(b.finish_file("main.kd", [module]));
        let (inferred, reports) = run(&ast);

        assert_eq!(
            reports[0].message,
            ReportMessage::NotAValue {
                kind: "trait",
                name: "Shape".into(),
            }
        );
        assert!(inferred.declarations.is_empty());
    }
}
