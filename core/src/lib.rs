#![deny(missing_docs)]
//! sc_core: building blocks for svcrec (recovery records, sc.exe output
//! parsing, change planning, reconcile sessions).

/// Configuration helpers (AppId, dirs, manifest loading and validation).
pub mod cfg;
/// Error taxonomy shared by the parser, planner, and runner.
pub mod error;
/// Tracing/log initialization helpers.
pub mod logx;
/// Recovery-configuration record types.
pub mod recovery;
/// Parsers for the textual reports of `sc.exe query` / `sc.exe qfailure`.
pub mod parse;
/// Observed-vs-desired diffing and `sc.exe failure` argument rendering.
pub mod plan;
/// Per-pass reconcile session driving query, diff, and update.
pub mod reconcile;
/// The native sc.exe invocation seam.
pub mod sc;
