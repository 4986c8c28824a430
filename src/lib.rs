//! Semantic analysis for Kodept: scope resolution, lowering to a core
//! language, Hindley-Milner type inference, and the pass pipeline that runs
//! them over a compilation unit.

pub mod ast;
pub mod config;
pub mod graph;
pub mod infer;
pub mod lang;
pub mod pass;
pub mod report;
pub mod resolve;
pub mod scope;
pub mod span;
pub mod symbol;
pub mod ty;
pub mod unique;
