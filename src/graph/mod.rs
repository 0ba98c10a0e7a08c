//! Index engine: scanning, caching, symbol index and call graph.
//!
//! Everything a [`snapshot::ProjectSnapshot`] is made of lives here. The
//! [`crate::analyzer`] drives these pieces through an indexing pass.

pub mod cache;
pub mod calls;
pub mod index;
pub mod scanner;
pub mod snapshot;
pub mod types;

pub use cache::{content_hash, CacheStore, Lookup, SCHEMA_VERSION};
pub use calls::{CallGraph, CallGraphStats, CallRelation, UnresolvedCall};
pub use index::{Hierarchy, Related, SymbolIndex};
pub use scanner::{FileScanner, ScanEntry};
pub use snapshot::ProjectSnapshot;
pub use types::{
    Access, BaseSpecifier, CallEdge, CallSite, Diagnostic, DiagnosticKind, Extraction, FileOrigin,
    FileRecord, FileStatus, IndexStats, Parameter, Signature, SkipReason, Symbol, SymbolId,
    SymbolKind,
};
