//! Positioned diagnostics produced by the semantic passes.
//!
//! # Severities
//! - [`Severity::Note`] and [`Severity::Warning`] never stop anything.
//! - [`Severity::Error`] marks the pass (or declaration) that produced it as
//!   failed; passes depending on it are skipped for the unit.
//! - [`Severity::Crash`] is an internal invariant violation and aborts the
//!   whole unit.

use thiserror::Error;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Crash,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Crash => "crash",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportMessage {
    #[error("file contains duplicated module `{0}`")]
    DuplicatedModules(Box<str>),
    #[error("module `{0}` is the only module in its file and should be global")]
    NonGlobalSingleModule(Box<str>),
    #[error("undeclared usage of `{0}`")]
    UndeclaredUsage(Box<str>),
    #[error("ambiguous usage of `{0}`: it matches several declarations")]
    UndefinedUsage(Box<str>),
    #[error("variable `{0}` is declared more than once in this block")]
    DuplicatedVariable(Box<str>),
    #[error("declaration `{0}` has duplicates")]
    Duplicated(Box<str>),
    #[error("cannot assign to {0}")]
    ImmutableConstruct(Box<str>),
    #[error("cannot reassign immutable variable `{0}`")]
    ImmutableVariable(Box<str>),
    #[error("{kind} `{name}` cannot be used as a value")]
    NotAValue { kind: &'static str, name: Box<str> },
    #[error("mismatched types: expected `{expected}`, found `{found}`")]
    MismatchedTypes { expected: Box<str>, found: Box<str> },
    #[error("infinite type: `{var}` occurs in `{ty}`")]
    InfiniteType { var: Box<str>, ty: Box<str> },
    #[error("`{0}` is used before it is bound")]
    UsedBeforeBinding(Box<str>),
    #[error("`{0}` was not typed because a declaration it uses failed")]
    DependencyFailed(Box<str>),
    #[error("internal compiler error: {0}")]
    Crash(Box<str>),
}

impl ReportMessage {
    /// The stable diagnostic code for this message.
    pub fn code(&self) -> &'static str {
        match self {
            ReportMessage::DuplicatedModules(_) => "KSeE1",
            ReportMessage::NonGlobalSingleModule(_) => "KSeW1",
            ReportMessage::UndeclaredUsage(_) => "KSeE3",
            ReportMessage::UndefinedUsage(_) => "KSeE4",
            ReportMessage::DuplicatedVariable(_) => "KSeE5",
            ReportMessage::Duplicated(_) => "KSeE6",
            ReportMessage::ImmutableConstruct(_) => "KSeE7",
            ReportMessage::ImmutableVariable(_) => "KSeE8",
            ReportMessage::NotAValue { .. } => "KSeE9",
            ReportMessage::MismatchedTypes { .. } => "KTyE1",
            ReportMessage::InfiniteType { .. } => "KTyE2",
            ReportMessage::UsedBeforeBinding(_) => "KTyE3",
            ReportMessage::DependencyFailed(_) => "KTyN1",
            ReportMessage::Crash(_) => "KCE1",
        }
    }

    /// The severity a report carrying this message starts with.
    pub fn severity(&self) -> Severity {
        match self {
            ReportMessage::DependencyFailed(_) => Severity::Note,
            ReportMessage::NonGlobalSingleModule(_) => Severity::Warning,
            ReportMessage::Crash(_) => Severity::Crash,
            _ => Severity::Error,
        }
    }

    pub fn crash(description: impl Into<Box<str>>) -> Self {
        ReportMessage::Crash(description.into())
    }
}

/// A message attached to one or more source positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub file: Box<str>,
    /// The first point is the primary position; the rest are related ones
    /// (e.g. every candidate of an ambiguous reference).
    pub points: Box<[Span]>,
    pub severity: Severity,
    pub message: ReportMessage,
}

impl Report {
    pub fn new(
        file: impl Into<Box<str>>,
        points: impl IntoIterator<Item = Span>,
        message: ReportMessage,
    ) -> Self {
        Self {
            file: file.into(),
            points: points.into_iter().collect(),
            severity: message.severity(),
            message,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file)?;

        if let Some(primary) = self.points.first() {
            write!(f, ":{primary}")?;
        }

        write!(
            f,
            " {}[{}]: {}",
            self.severity,
            self.message.code(),
            self.message
        )
    }
}

/// An error that stops the pass that raised it.
///
/// A [`Severity::Crash`] report additionally aborts the compilation unit.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct UnrecoverableError(pub Report);

impl From<Report> for UnrecoverableError {
    fn from(value: Report) -> Self {
        Self(value)
    }
}

/// Anything that accepts reports.
pub trait ReportSink {
    fn report(&mut self, report: Report);
}

impl ReportSink for Vec<Report> {
    fn report(&mut self, report: Report) {
        self.push(report);
    }
}

/// Accumulates the reports of one compilation unit in emission order.
#[derive(Debug, Default)]
pub struct ReportCollector {
    reports: Vec<Report>,
    warnings_as_errors: bool,
}

impl ReportSink for ReportCollector {
    fn report(&mut self, mut report: Report) {
        if self.warnings_as_errors && report.severity == Severity::Warning {
            report.severity = Severity::Error;
        }

        tracing::debug!(
            severity = %report.severity,
            code = report.message.code(),
            "{}",
            report.message
        );
        self.reports.push(report);
    }
}

impl ReportCollector {
    pub fn new(warnings_as_errors: bool) -> Self {
        Self {
            reports: Vec::new(),
            warnings_as_errors,
        }
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn into_reports(self) -> Vec<Report> {
        self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(Report::is_failure)
    }

    /// Whether any report from index `start` onwards is a failure.
    pub fn has_failures_since(&self, start: usize) -> bool {
        self.reports
            .get(start..)
            .is_some_and(|reports| reports.iter().any(Report::is_failure))
    }

    pub fn with_severity(
        &self,
        severity: Severity,
    ) -> impl Iterator<Item = &Report> + '_ {
        self.reports.iter().filter(move |r| r.severity == severity)
    }
}
