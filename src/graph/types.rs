//! Core types for the C++ index.
//!
//! Symbols, call edges and per-file records. Everything here is owned data:
//! frontends convert their syntax trees into these types immediately.
//!
//! These types are also the cache payload, so they avoid serde attributes
//! that a non-self-describing format cannot round-trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable symbol identifier (hex digest, see [`symbol_id`]).
pub type SymbolId = String;

/// The kind of a declared entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Struct,
    Function,
    /// Member function, including constructors and destructors.
    Method,
    Field,
    Enum,
    Namespace,
}

impl SymbolKind {
    pub fn is_class_like(self) -> bool {
        matches!(self, SymbolKind::Class | SymbolKind::Struct)
    }

    pub fn is_callable(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "class" => Some(SymbolKind::Class),
            "struct" => Some(SymbolKind::Struct),
            "function" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "field" => Some(SymbolKind::Field),
            "enum" => Some(SymbolKind::Enum),
            "namespace" => Some(SymbolKind::Namespace),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Class => write!(f, "class"),
            SymbolKind::Struct => write!(f, "struct"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Method => write!(f, "method"),
            SymbolKind::Field => write!(f, "field"),
            SymbolKind::Enum => write!(f, "enum"),
            SymbolKind::Namespace => write!(f, "namespace"),
        }
    }
}

/// Member or base access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl Access {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "public" => Some(Access::Public),
            "protected" => Some(Access::Protected),
            "private" => Some(Access::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => write!(f, "public"),
            Access::Protected => write!(f, "protected"),
            Access::Private => write!(f, "private"),
        }
    }
}

// ─── Symbols ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub type_spelling: String,
    /// Empty for unnamed parameters.
    pub name: String,
    pub has_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Empty for constructors and destructors.
    pub return_type: String,
    pub parameters: Vec<Parameter>,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_pure: bool,
    pub is_const: bool,
    pub is_static: bool,
}

impl Signature {
    pub fn parameter_types(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .map(|p| p.type_spelling.as_str())
            .collect()
    }

    /// `(int, const std::string&) const`
    pub fn parameter_list(&self) -> String {
        let mut out = format!("({})", self.parameter_types().join(", "));
        if self.is_const {
            out.push_str(" const");
        }
        out
    }

    /// Whether a call with `n` arguments fits this parameter list.
    pub fn accepts(&self, n: usize) -> bool {
        let required = self.parameters.iter().filter(|p| !p.has_default).count();
        required <= n && n <= self.parameters.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseSpecifier {
    /// Base name as written in the source.
    pub name: String,
    pub access: Access,
    pub is_virtual: bool,
}

/// One declared entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub kind: SymbolKind,
    pub name: String,
    pub qualified_name: String,
    /// Functions and methods only.
    pub signature: Option<Signature>,
    /// Path relative to the project root.
    pub file: PathBuf,
    /// 1-indexed.
    pub line_start: usize,
    pub line_end: usize,
    pub column: usize,
    /// Classes only, in declaration order.
    pub bases: Vec<BaseSpecifier>,
    /// Members only.
    pub access: Option<Access>,
    /// Qualified name of the owning class (methods and fields).
    pub parent: Option<String>,
    /// Declared type (fields only).
    pub type_name: Option<String>,
    /// False for prototypes and in-class declarations of out-of-line members.
    pub is_definition: bool,
}

impl Symbol {
    /// `void ns::A::f(int) const`
    pub fn display_signature(&self) -> String {
        match &self.signature {
            Some(sig) if sig.return_type.is_empty() => {
                format!("{}{}", self.qualified_name, sig.parameter_list())
            }
            Some(sig) => format!(
                "{} {}{}",
                sig.return_type,
                self.qualified_name,
                sig.parameter_list()
            ),
            None => self.qualified_name.clone(),
        }
    }

    /// Key used for overload identity: qualified name plus parameter types.
    pub fn overload_key(&self) -> (String, Vec<String>) {
        let params = self
            .signature
            .as_ref()
            .map(|s| s.parameter_types().iter().map(|t| t.to_string()).collect())
            .unwrap_or_default();
        (self.qualified_name.clone(), params)
    }
}

/// Deterministic id: identical content always yields identical ids.
pub fn symbol_id(
    file: &Path,
    kind: SymbolKind,
    qualified_name: &str,
    parameter_types: &[&str],
    line: usize,
    column: usize,
) -> SymbolId {
    let mut hasher = Sha256::new();
    hasher.update(file.to_string_lossy().as_bytes());
    hasher.update([0]);
    hasher.update(kind.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(qualified_name.as_bytes());
    hasher.update([0]);
    hasher.update(parameter_types.join(",").as_bytes());
    hasher.update([0]);
    hasher.update(format!("{line}:{column}").as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

// ─── Call Edges ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

/// A call from a function body, as seen by the extractor.
///
/// `callee_id` is set only when the frontend resolved the callee to a symbol
/// of the same file. Cross-file resolution happens in the call graph and is
/// never written back here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller_id: SymbolId,
    pub callee_id: Option<SymbolId>,
    /// Callee as written, or the referenced declaration's qualified name.
    pub callee_name: String,
    pub call_site: CallSite,
    pub arg_count: Option<usize>,
}

/// Output of one frontend run over one file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub symbols: Vec<Symbol>,
    pub edges: Vec<CallEdge>,
    pub syntax_errors: bool,
}

// ─── File Records ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TooLarge { size: u64, limit: u64 },
    ExcludedPattern { pattern: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooLarge { size, limit } => {
                write!(f, "file is {size} bytes, limit is {limit}")
            }
            SkipReason::ExcludedPattern { pattern } => write!(f, "matches exclude pattern '{pattern}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Parsed,
    Skipped(SkipReason),
    Failed(String),
}

/// Where a file lives relative to the project's own code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOrigin {
    Project,
    /// Under one of the configured dependency directories.
    Dependency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Relative to the project root.
    pub path: PathBuf,
    /// SHA-256 of the bytes the symbols were extracted from. Empty when skipped.
    pub content_hash: String,
    pub last_indexed_at: DateTime<Utc>,
    pub symbol_ids: Vec<SymbolId>,
    pub symbols: Vec<Symbol>,
    pub edges: Vec<CallEdge>,
    pub status: FileStatus,
    pub origin: FileOrigin,
    pub syntax_errors: bool,
}

impl FileRecord {
    pub fn parsed(path: PathBuf, content_hash: String, origin: FileOrigin, extraction: Extraction) -> Self {
        Self {
            path,
            content_hash,
            last_indexed_at: Utc::now(),
            symbol_ids: extraction.symbols.iter().map(|s| s.id.clone()).collect(),
            symbols: extraction.symbols,
            edges: extraction.edges,
            status: FileStatus::Parsed,
            origin,
            syntax_errors: extraction.syntax_errors,
        }
    }

    pub fn failed(path: PathBuf, content_hash: String, origin: FileOrigin, reason: String) -> Self {
        Self {
            path,
            content_hash,
            last_indexed_at: Utc::now(),
            symbol_ids: Vec::new(),
            symbols: Vec::new(),
            edges: Vec::new(),
            status: FileStatus::Failed(reason),
            origin,
            syntax_errors: false,
        }
    }

    pub fn skipped(path: PathBuf, origin: FileOrigin, reason: SkipReason) -> Self {
        Self {
            path,
            content_hash: String::new(),
            last_indexed_at: Utc::now(),
            symbol_ids: Vec::new(),
            symbols: Vec::new(),
            edges: Vec::new(),
            status: FileStatus::Skipped(reason),
            origin,
            syntax_errors: false,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.status == FileStatus::Parsed
    }
}

// ─── Diagnostics & Stats ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    ParseFailed,
    CacheCorrupt,
    Skipped,
    CyclicBase,
    Unreadable,
}

/// A per-file problem that did not stop the indexing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<PathBuf>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Counters for one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    /// Records carried over from the previous snapshot (same hash).
    pub files_reused: usize,
    pub cache_hits: usize,
    /// Files run through the frontend in this pass.
    pub files_extracted: usize,
    pub symbols: usize,
    pub classes: usize,
    pub functions: usize,
    pub call_edges: usize,
    pub unresolved_calls: usize,
    pub duration_ms: u64,
}
