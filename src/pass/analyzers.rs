//! Checks that only read the tree and report.

use std::collections::HashMap;

use crate::{
    ast::{Ast, NodeId, NodeKind},
    report::{Report, ReportMessage, ReportSink, UnrecoverableError},
    symbol::Symbol,
};

/// Reports modules declared twice in one file, and a file whose only module
/// is not global.
pub fn module_uniqueness(ast: &Ast, sink: &mut impl ReportSink) {
    let NodeKind::File { modules } = ast.kind(ast.root()) else {
        return;
    };

    for (name, group) in same_named(ast, modules.iter().copied()) {
        sink.report(Report::new(
            ast.file(),
            group.iter().map(|&module| ast.span(module)),
            ReportMessage::DuplicatedModules(ast.symbol_str(name).into()),
        ));
    }

    if let [single] = &modules[..] {
        if let NodeKind::Module {
            name,
            global: false,
            ..
        } = ast.kind(*single)
        {
            sink.report(Report::new(
                ast.file(),
                [ast.span(*single)],
                ReportMessage::NonGlobalSingleModule(ast.symbol_str(*name).into()),
            ));
        }
    }
}

/// Reports declarations that share a name with a sibling in the same
/// module, struct, trait, enum, parameter list or block.
pub fn object_uniqueness(ast: &Ast, sink: &mut impl ReportSink) {
    for node in ast.walk() {
        let kind = ast.kind(node);

        match kind {
            NodeKind::Module { items, .. } => {
                report_duplicates(ast, sink, items.iter().copied(), false);
            }
            NodeKind::Struct {
                fields, members, ..
            } => {
                let declarations = fields.iter().chain(members.iter()).copied();
                report_duplicates(ast, sink, declarations, false);
            }
            NodeKind::Trait { members: items, .. }
            | NodeKind::Enum { entries: items, .. } => {
                report_duplicates(ast, sink, items.iter().copied(), false);
            }
            NodeKind::Block { items } => {
                let of_kind = |function: bool| {
                    items
                        .iter()
                        .copied()
                        .filter(move |&item| match ast.kind(item) {
                            NodeKind::Function { .. } => function,
                            NodeKind::Var { .. } => !function,
                            _ => false,
                        })
                };
                report_duplicates(ast, sink, of_kind(true), false);
                report_duplicates(ast, sink, of_kind(false), true);
            }
            _ => (),
        }

        if let Some(params) = kind.params() {
            report_duplicates(ast, sink, params.iter().copied(), false);
        }
    }
}

fn report_duplicates(
    ast: &Ast,
    sink: &mut impl ReportSink,
    declarations: impl IntoIterator<Item = NodeId>,
    variables: bool,
) {
    for (name, group) in same_named(ast, declarations) {
        let name = ast.symbol_str(name).into();
        let message = match variables {
            true => ReportMessage::DuplicatedVariable(name),
            false => ReportMessage::Duplicated(name),
        };

        sink.report(Report::new(
            ast.file(),
            group.iter().map(|&decl| ast.span(decl)),
            message,
        ));
    }
}

/// Groups `declarations` by name, keeping only names declared more than once,
/// in order of first declaration.
fn same_named(
    ast: &Ast,
    declarations: impl IntoIterator<Item = NodeId>,
) -> Vec<(Symbol, Vec<NodeId>)> {
    let mut groups: Vec<(Symbol, Vec<NodeId>)> = Vec::new();
    let mut index: HashMap<Symbol, usize> = HashMap::new();

    for decl in declarations {
        let Some(name) = ast.kind(decl).name() else {
            continue;
        };

        match index.get(&name) {
            Some(&i) => groups[i].1.push(decl),
            None => {
                index.insert(name, groups.len());
                groups.push((name, vec![decl]));
            }
        }
    }

    groups.retain(|(_, group)| group.len() > 1);
    groups
}

/// Reports assignments to anything but a mutable variable.
///
/// Every target must already be resolved; an unresolved one is an internal
/// error.
pub fn assignment_check(
    ast: &Ast,
    sink: &mut impl ReportSink,
) -> Result<(), UnrecoverableError> {
    for node in ast.walk() {
        let NodeKind::Assign { target, .. } = ast.kind(node) else {
            continue;
        };
        let target = *target;

        match ast.kind(target) {
            NodeKind::Resolved { referral, .. } => match ast.kind(*referral) {
                NodeKind::Var { mutable: true, .. } => (),
                NodeKind::Var { name, .. } => sink.report(Report::new(
                    ast.file(),
                    [ast.span(target), ast.span(*referral)],
                    ReportMessage::ImmutableVariable(ast.symbol_str(*name).into()),
                )),
                kind => {
                    let what = match ast.name_of(*referral) {
                        Some(name) => format!("{} `{name}`", kind.describe()),
                        None => kind.describe().to_string(),
                    };
                    sink.report(Report::new(
                        ast.file(),
                        [ast.span(target), ast.span(*referral)],
                        ReportMessage::ImmutableConstruct(what.into()),
                    ));
                }
            },
            NodeKind::Reference(_) => {
                return Err(Report::new(
                    ast.file(),
                    [ast.span(target)],
                    ReportMessage::crash("assignment target was not resolved"),
                )
                .into());
            }
            kind => sink.report(Report::new(
                ast.file(),
                [ast.span(target)],
                ReportMessage::ImmutableConstruct(kind.describe().into()),
            )),
        }
    }

    Ok(())
}
