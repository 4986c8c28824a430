//! The semantic passes and the pipeline that runs them over a unit.
//!
//! Passes run in the order [`schedule`] derives from their dependencies.
//! For one unit, each pass ends in a [`PassStatus`]:
//! - a pass with failing reports (or an unrecoverable error) has *failed*,
//!   and every pass depending on it is *skipped*;
//! - a pass named in [`SessionConfig::disabled_passes`] is *disabled*, and
//!   so is every pass depending on it;
//! - after a crash report, every pass that has not run yet is *aborted*.

use std::{fmt::Debug, hash::Hash};

use serde::{Deserialize, Serialize};

use crate::{
    ast::{Ast, NodeId, NodeKind, Reference},
    config::SessionConfig,
    graph::{Depended, schedule},
    infer::decls::{InferredTypes, infer_declarations},
    report::{
        Report, ReportCollector, ReportMessage, ReportSink, Severity,
        UnrecoverableError,
    },
    resolve::{ResolveError, Resolver},
    scope::ScopeTree,
    unique::VarSupply,
};

pub mod analyzers;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    ScopeTagging,
    ModuleUniqueness,
    ObjectUniqueness,
    ReferenceResolution,
    TypeReferenceResolution,
    AssignmentCheck,
    TypeInference,
}

impl Pass {
    pub const ALL: [Pass; 7] = [
        Pass::ScopeTagging,
        Pass::ModuleUniqueness,
        Pass::ObjectUniqueness,
        Pass::ReferenceResolution,
        Pass::TypeReferenceResolution,
        Pass::AssignmentCheck,
        Pass::TypeInference,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pass::ScopeTagging => "scope-tagging",
            Pass::ModuleUniqueness => "module-uniqueness",
            Pass::ObjectUniqueness => "object-uniqueness",
            Pass::ReferenceResolution => "reference-resolution",
            Pass::TypeReferenceResolution => "type-reference-resolution",
            Pass::AssignmentCheck => "assignment-check",
            Pass::TypeInference => "type-inference",
        }
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Depended for Pass {
    fn dependencies(&self) -> Vec<Self> {
        match self {
            Pass::ScopeTagging | Pass::ModuleUniqueness | Pass::ObjectUniqueness => {
                vec![]
            }
            Pass::ReferenceResolution | Pass::TypeReferenceResolution => {
                vec![Pass::ScopeTagging]
            }
            Pass::AssignmentCheck => vec![Pass::ReferenceResolution],
            Pass::TypeInference => {
                vec![Pass::ReferenceResolution, Pass::TypeReferenceResolution]
            }
        }
    }
}

/// One source file and everything the passes attach to it.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub ast: Ast,
    pub scopes: Option<ScopeTree>,
    pub inferred: Option<InferredTypes>,
    pub vars: VarSupply,
}

impl CompilationUnit {
    pub fn new(ast: Ast) -> Self {
        Self {
            ast,
            scopes: None,
            inferred: None,
            vars: VarSupply::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Succeeded,
    Failed,
    Skipped,
    Disabled,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub statuses: Vec<(Pass, PassStatus)>,
    pub reports: Vec<Report>,
}

impl UnitOutcome {
    pub fn status(&self, pass: Pass) -> Option<PassStatus> {
        self.statuses
            .iter()
            .find_map(|(p, status)| (*p == pass).then_some(*status))
    }

    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(Report::is_failure)
    }

    /// Whether a crash stopped the unit.
    pub fn crashed(&self) -> bool {
        self.reports.iter().any(|r| r.severity == Severity::Crash)
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    order: Vec<Pass>,
    config: SessionConfig,
}

impl Pipeline {
    /// Orders every pass after its dependencies. A dependency cycle is an
    /// internal error and comes back as a crash report.
    pub fn new(config: SessionConfig) -> Result<Self, UnrecoverableError> {
        let order = scheduled(Pass::ALL)?;
        Ok(Self { order, config })
    }

    pub fn order(&self) -> &[Pass] {
        &self.order
    }

    #[tracing::instrument(skip_all, fields(file = unit.ast.file()))]
    pub fn run(&self, unit: &mut CompilationUnit) -> UnitOutcome {
        let mut sink = ReportCollector::new(self.config.warnings_as_errors);
        let mut statuses: Vec<(Pass, PassStatus)> = Vec::with_capacity(self.order.len());
        let mut aborted = false;

        for &pass in &self.order {
            let dependencies: Vec<_> = pass
                .dependencies()
                .into_iter()
                .filter_map(|dep| {
                    statuses
                        .iter()
                        .find_map(|(p, status)| (*p == dep).then_some(*status))
                })
                .collect();

            let status = if aborted {
                PassStatus::Aborted
            } else if self.config.is_disabled(pass)
                || dependencies.contains(&PassStatus::Disabled)
            {
                PassStatus::Disabled
            } else if dependencies.iter().any(|s| *s != PassStatus::Succeeded) {
                tracing::warn!(%pass, "skipped after a failed dependency");
                PassStatus::Skipped
            } else {
                let checkpoint = sink.len();
                let result = run_pass(pass, unit, &mut sink);

                if let Err(UnrecoverableError(report)) = result {
                    sink.report(report);
                }

                aborted = sink.reports()[checkpoint..]
                    .iter()
                    .any(|r| r.severity == Severity::Crash);

                match sink.has_failures_since(checkpoint) {
                    true => PassStatus::Failed,
                    false => PassStatus::Succeeded,
                }
            };

            tracing::debug!(%pass, ?status, "pass finished");
            statuses.push((pass, status));
        }

        UnitOutcome {
            statuses,
            reports: sink.into_reports(),
        }
    }
}

fn scheduled<T>(items: impl IntoIterator<Item = T>) -> Result<Vec<T>, UnrecoverableError>
where
    T: Depended + Clone + Eq + Hash + Debug,
{
    match schedule(items) {
        Ok(layers) => Ok(layers.into_iter().flatten().collect()),
        Err(error) => {
            tracing::error!(%error, "cannot order passes");
            Err(Report::new(
                "<pipeline>",
                [],
                ReportMessage::crash(error.to_string()),
            )
            .into())
        }
    }
}

fn run_pass(
    pass: Pass,
    unit: &mut CompilationUnit,
    sink: &mut ReportCollector,
) -> Result<(), UnrecoverableError> {
    match pass {
        Pass::ScopeTagging => {
            unit.scopes = Some(ScopeTree::build(&unit.ast));
        }
        Pass::ModuleUniqueness => analyzers::module_uniqueness(&unit.ast, sink),
        Pass::ObjectUniqueness => analyzers::object_uniqueness(&unit.ast, sink),
        Pass::ReferenceResolution | Pass::TypeReferenceResolution => {
            resolve_references(pass, unit, sink)?;
        }
        Pass::AssignmentCheck => analyzers::assignment_check(&unit.ast, sink)?,
        Pass::TypeInference => {
            let inferred = infer_declarations(&unit.ast, &mut unit.vars, sink)?;
            unit.inferred = Some(inferred);
        }
    }

    Ok(())
}

/// Replaces every reference (or type reference) in the unit with its
/// resolved form, reporting those that cannot be resolved.
fn resolve_references(
    pass: Pass,
    unit: &mut CompilationUnit,
    sink: &mut impl ReportSink,
) -> Result<(), UnrecoverableError> {
    let Some(scopes) = &unit.scopes else {
        return Err(Report::new(
            unit.ast.file(),
            [unit.ast.span(unit.ast.root())],
            ReportMessage::crash("references resolved before scopes were built"),
        )
        .into());
    };

    let resolver = Resolver::new(&unit.ast, scopes);
    let results = match pass {
        Pass::TypeReferenceResolution => resolver.resolve_all_type_references(),
        _ => resolver.resolve_all_references(),
    };

    let mut resolved = 0;
    for (node, reference, result) in results {
        match result {
            Ok(referral) => {
                let kind = match pass {
                    Pass::TypeReferenceResolution => {
                        NodeKind::ResolvedType { reference, referral }
                    }
                    _ => NodeKind::Resolved { reference, referral },
                };
                unit.ast.replace(node, kind);
                resolved += 1;
            }
            Err(error) => sink.report(unresolved(&unit.ast, node, &reference, error)),
        }
    }

    tracing::debug!(%pass, resolved, "resolved references");
    Ok(())
}

fn unresolved(ast: &Ast, node: NodeId, reference: &Reference, error: ResolveError) -> Report {
    let name = qualified_name(ast, reference).into();

    match error {
        ResolveError::NotFound => Report::new(
            ast.file(),
            [ast.span(node)],
            ReportMessage::UndeclaredUsage(name),
        ),
        ResolveError::Multiple(candidates) => Report::new(
            ast.file(),
            std::iter::once(ast.span(node))
                .chain(candidates.iter().map(|&candidate| ast.span(candidate))),
            ReportMessage::UndefinedUsage(name),
        ),
    }
}

/// Renders `reference` as written: `x`, `A::B::x` or `::A::x`.
fn qualified_name(ast: &Ast, reference: &Reference) -> String {
    let mut rendered = String::new();

    if let Some(context) = &reference.context {
        if context.from_root {
            rendered.push_str("::");
        }
        for link in context.chain.iter() {
            rendered.push_str(ast.symbol_str(*link));
            rendered.push_str("::");
        }
    }

    rendered.push_str(ast.symbol_str(reference.name));
    rendered
}
