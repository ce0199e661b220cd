//! IPET model construction and symbolic Fourier-Motzkin elimination core for
//! a WCET/WCEC analyzer.
//!
//! A caller hands the [`orchestrator::Orchestrator`] a program-information
//! document (functions, blocks, relation graphs, flow facts, an SSTG) and
//! asks for one of three operations: `copy`, `simplify`, or `transform`
//! between bitcode and machine-code level. Internally, an [`ipet::model::IpetModel`]
//! (optionally composed across tasks by [`ipet::sstg::StateTransitionIpet`])
//! emits variables and constraints into an [`ilp::store::ConstraintStore`];
//! [`flowfacts::engine::FlowFactEngine`] adds user constraints and later
//! re-extracts them from whatever survives [`ilp::elimination::VariableElimination`].
//!
//! The crate is single-threaded and synchronous throughout: no async
//! runtime, no thread pool. All mutable state belongs to one builder
//! instance per analysis run and is discarded when that run ends.

pub mod config;
pub mod errors;
pub mod flowfacts;
pub mod ilp;
pub mod ipet;
pub mod orchestrator;
pub mod program;
pub mod shared;
pub mod transform;

pub use config::{AnalysisOptions, AnalysisStats};
pub use errors::{CoreError, Result};
pub use orchestrator::{Direction, Orchestrator};
