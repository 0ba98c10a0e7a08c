//! Parser module: turns C++ source into owned symbol and call records.
//!
//! Frontends expose their syntax tree through the [`Cursor`] trait, and the
//! generic [`extractor`] walks any cursor tree. [`cpp::CppFrontend`] is the
//! tree-sitter backed frontend shipped with the crate.

pub mod cpp;
pub mod extractor;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::graph::types::{Access, Extraction};

pub use cpp::CppFrontend;
pub use extractor::extract;

/// What a cursor points at, in frontend-neutral terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    TranslationUnit,
    Namespace,
    ClassDecl,
    StructDecl,
    EnumDecl,
    FieldDecl,
    FunctionDecl,
    Method,
    Constructor,
    Destructor,
    ParmDecl,
    BaseSpecifier,
    CallExpr,
    /// Anything else. Traversal descends into it.
    Other,
}

impl CursorKind {
    pub fn is_function_like(self) -> bool {
        matches!(
            self,
            CursorKind::FunctionDecl
                | CursorKind::Method
                | CursorKind::Constructor
                | CursorKind::Destructor
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed.
    pub column: usize,
}

/// A position in a frontend's syntax tree.
///
/// Cursors are short-lived views. The extractor copies everything it needs
/// into owned records and never stores a cursor.
pub trait Cursor: Sized {
    fn kind(&self) -> CursorKind;

    /// Unqualified name. For calls, the callee name without qualification.
    fn spelling(&self) -> String;

    /// Fully qualified name. For calls, the callee as written.
    fn qualified_spelling(&self) -> String;

    fn location(&self) -> SourceLocation;

    fn end_line(&self) -> usize;

    /// Declared type of a field or parameter.
    fn type_spelling(&self) -> Option<String>;

    /// Return type of a function.
    fn result_type_spelling(&self) -> Option<String>;

    /// Children in source order.
    fn children(&self) -> Vec<Self>;

    /// The declaration a call or reference resolves to, when the frontend knows it.
    fn referenced(&self) -> Option<Self>;

    /// Access of a member or base specifier.
    fn access(&self) -> Option<Access>;

    /// Definitions have a body; prototypes and forward declarations do not.
    fn is_definition(&self) -> bool;

    /// Virtual function, or virtual base.
    fn is_virtual(&self) -> bool;

    fn is_override(&self) -> bool;

    fn is_pure(&self) -> bool;

    fn is_const(&self) -> bool;

    fn is_static(&self) -> bool;

    /// Whether a parameter declares a default argument.
    fn has_default(&self) -> bool {
        false
    }

    /// Argument count of a call expression.
    fn argument_count(&self) -> Option<usize>;

    /// Whether the tree under a translation unit contains syntax errors.
    fn has_syntax_errors(&self) -> bool {
        false
    }
}

/// Something that can turn one file's bytes into an [`Extraction`].
///
/// Implementations are shared across worker threads.
pub trait Frontend: Send + Sync {
    /// `path` is the root-relative path recorded on every symbol.
    fn extract(&self, path: &Path, source: &[u8]) -> Result<Extraction>;
}
