//! tree-sitter frontend for C++.
//!
//! Adapts the tree-sitter-cpp concrete syntax tree to the [`Cursor`]
//! interface. tree-sitter has no semantic information, so `referenced` is
//! always `None` and every call is left for cross-file resolution.

use std::path::Path;
use std::time::{Duration, Instant};

use tree_sitter::{Node, ParseOptions, ParseState, Parser, Point, Tree};
use tracing::debug;

use super::{extractor, Cursor, CursorKind, Frontend, SourceLocation};
use crate::error::{AnchorError, Result};
use crate::graph::types::{Access, Extraction};
use crate::names;

/// Parses C++ with tree-sitter-cpp under a per-file time budget.
#[derive(Debug, Clone)]
pub struct CppFrontend {
    timeout: Duration,
}

impl CppFrontend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Parse `source`, giving up once the time budget is spent.
    pub fn parse(&self, path: &Path, source: &[u8]) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .map_err(|e| AnchorError::ParseFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let start = Instant::now();
        let timeout = self.timeout;
        let mut over_budget = |_: &ParseState| start.elapsed() > timeout;
        let options = ParseOptions::new().progress_callback(&mut over_budget);

        let tree = parser.parse_with_options(
            &mut |byte: usize, _: Point| source.get(byte..).unwrap_or(&[]),
            None,
            Some(options),
        );

        match tree {
            Some(tree) => Ok(tree),
            None if start.elapsed() > timeout => Err(AnchorError::ParseTimeout {
                path: path.to_path_buf(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            None => Err(AnchorError::ParseFailed {
                path: path.to_path_buf(),
                reason: "parser produced no tree".to_string(),
            }),
        }
    }
}

impl Default for CppFrontend {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Frontend for CppFrontend {
    fn extract(&self, path: &Path, source: &[u8]) -> Result<Extraction> {
        let tree = self.parse(path, source)?;
        let root = TsCursor {
            node: tree.root_node(),
            role: Role::Plain,
            source,
            file: path,
        };
        let extraction = extractor::extract(path, &root);
        debug!(
            file = %path.display(),
            symbols = extraction.symbols.len(),
            calls = extraction.edges.len(),
            "extracted"
        );
        Ok(extraction)
    }
}

// ─── Cursor Adapter ─────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Role<'t> {
    Plain,
    /// One declarator of a `declaration` or `field_declaration`.
    Declarator(Node<'t>),
    /// One entry of a `base_class_clause`; `node` is the base name.
    Base {
        access: Option<Access>,
        is_virtual: bool,
    },
}

#[derive(Clone, Copy)]
pub struct TsCursor<'t> {
    node: Node<'t>,
    role: Role<'t>,
    source: &'t [u8],
    file: &'t Path,
}

impl<'t> TsCursor<'t> {
    fn plain(&self, node: Node<'t>) -> Self {
        Self {
            node,
            role: Role::Plain,
            ..*self
        }
    }

    fn text(&self, node: Node<'t>) -> String {
        let bytes = self.source.get(node.byte_range()).unwrap_or(&[]);
        squash(&String::from_utf8_lossy(bytes))
    }

    fn slice(&self, from: usize, to: usize) -> String {
        let bytes = self.source.get(from..to).unwrap_or(&[]);
        String::from_utf8_lossy(bytes).into_owned()
    }

    /// Turn a syntax node into zero or more cursors.
    ///
    /// Declarations fan out into one cursor per declarator, plus one for an
    /// inline class or enum definition used as their type.
    fn expand(&self, node: Node<'t>) -> Vec<Self> {
        match node.kind() {
            "declaration" | "field_declaration" => {
                let mut out = Vec::new();
                if let Some(ty) = node.child_by_field_name("type") {
                    if is_type_definition(ty) {
                        out.push(self.plain(ty));
                    }
                }
                for declarator in field_children(node, "declarator") {
                    out.push(Self {
                        node,
                        role: Role::Declarator(declarator),
                        ..*self
                    });
                }
                out
            }
            "access_specifier" | "comment" | "friend_declaration" | "template_parameter_list" => {
                Vec::new()
            }
            _ => vec![self.plain(node)],
        }
    }

    fn expand_all(&self, nodes: Vec<Node<'t>>) -> Vec<Self> {
        nodes.into_iter().flat_map(|n| self.expand(n)).collect()
    }

    /// The function declarator this cursor declares or defines, if any.
    fn function_declarator(&self) -> Option<Node<'t>> {
        match self.role {
            Role::Declarator(d) => function_declarator(d),
            Role::Plain if self.node.kind() == "function_definition" => self
                .node
                .child_by_field_name("declarator")
                .and_then(function_declarator),
            _ => None,
        }
    }

    /// Top-level declarator (outermost, possibly a pointer/reference wrapper).
    fn top_declarator(&self) -> Option<Node<'t>> {
        match self.role {
            Role::Declarator(d) => Some(d),
            Role::Plain => self.node.child_by_field_name("declarator"),
            Role::Base { .. } => None,
        }
    }

    fn function_kind(&self, fd: Node<'t>) -> CursorKind {
        let Some(name) = fd.child_by_field_name("declarator") else {
            return CursorKind::FunctionDecl;
        };
        if name.kind() == "destructor_name" {
            return if enclosing_class(self.node).is_some() {
                CursorKind::Destructor
            } else {
                CursorKind::FunctionDecl
            };
        }
        if let Some(class) = enclosing_class(self.node) {
            let class_name = class
                .child_by_field_name("name")
                .map(|n| names::normalize(&self.text(n)));
            let own = names::normalize(&self.text(name));
            return if class_name.as_deref() == Some(names::simple_name(&own)) {
                CursorKind::Constructor
            } else {
                CursorKind::Method
            };
        }
        if name.kind() == "qualified_identifier" {
            let qualified = names::normalize(&self.text(name));
            let parts = names::split_qualified(&qualified);
            return match parts.as_slice() {
                [.., last] if last.starts_with('~') => CursorKind::Destructor,
                [.., owner, last] if owner == last => CursorKind::Constructor,
                _ => CursorKind::Method,
            };
        }
        CursorKind::FunctionDecl
    }

    /// The node whose position identifies this cursor.
    fn name_node(&self) -> Option<Node<'t>> {
        if let Some(fd) = self.function_declarator() {
            return fd.child_by_field_name("declarator");
        }
        match self.role {
            Role::Declarator(d) => innermost_name(d),
            Role::Base { .. } => Some(self.node),
            Role::Plain => match self.node.kind() {
                "call_expression" => self.node.child_by_field_name("function"),
                "parameter_declaration"
                | "optional_parameter_declaration"
                | "variadic_parameter_declaration" => self
                    .node
                    .child_by_field_name("declarator")
                    .and_then(innermost_name),
                _ => self.node.child_by_field_name("name"),
            },
        }
    }

    /// Enclosing namespace and class names, outermost first.
    fn enclosing_scope(&self) -> String {
        let mut parts = Vec::new();
        let mut current = self.node.parent();
        while let Some(n) = current {
            if matches!(
                n.kind(),
                "namespace_definition" | "class_specifier" | "struct_specifier" | "union_specifier"
            ) {
                if let Some(name) = n.child_by_field_name("name") {
                    parts.push(names::normalize(&self.text(name)));
                }
            }
            current = n.parent();
        }
        parts.reverse();
        parts.retain(|p| !p.is_empty());
        parts.join("::")
    }

    /// Callee as written: `ns::f`, `obj.m()` → `m`, template arguments dropped.
    fn callee_written(&self) -> String {
        let Some(function) = self.node.child_by_field_name("function") else {
            return String::new();
        };
        match function.kind() {
            "identifier" | "qualified_identifier" | "template_function" => {
                names::normalize(&self.text(function))
            }
            "field_expression" => function
                .child_by_field_name("field")
                .map(|f| names::normalize(&self.text(f)))
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Identifier-like tokens written before `upto`, e.g. `virtual`, `static`.
    fn specifiers_before(&self, upto: Node<'t>) -> Vec<String> {
        tokens(&self.slice(self.node.start_byte(), upto.start_byte()))
    }

    /// Tokens after the parameter list: `const`, `override`, `noexcept`.
    fn qualifiers_after_parameters(&self) -> Vec<String> {
        let Some(fd) = self.function_declarator() else {
            return Vec::new();
        };
        let Some(params) = fd.child_by_field_name("parameters") else {
            return Vec::new();
        };
        tokens(&self.slice(params.end_byte(), fd.end_byte()))
    }

    /// Type of an owner node plus pointer/reference decorations from its declarator.
    fn decorated_type(&self, owner: Node<'t>, declarator: Option<Node<'t>>) -> Option<String> {
        let ty = owner.child_by_field_name("type")?;
        let mut out = String::new();
        for child in named_children(owner) {
            if child == ty {
                break;
            }
            if child.kind() == "type_qualifier" {
                out.push_str(&self.text(child));
                out.push(' ');
            }
        }
        out.push_str(&self.text(ty));

        let mut suffix = String::new();
        let mut current = declarator;
        while let Some(d) = current {
            match d.kind() {
                "pointer_declarator" => out.push('*'),
                "reference_declarator" => {
                    out.push_str(if self.text(d).starts_with("&&") { "&&" } else { "&" })
                }
                "array_declarator" => suffix.push_str("[]"),
                _ => {}
            }
            current = match d.kind() {
                "pointer_declarator"
                | "reference_declarator"
                | "array_declarator"
                | "init_declarator"
                | "attributed_declarator" => inner_declarator(d),
                _ => None,
            };
        }
        out.push_str(&suffix);
        Some(out.trim().to_string())
    }

    fn parameters(&self, fd: Node<'t>) -> Vec<Self> {
        let Some(list) = fd.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let params: Vec<Node<'t>> = named_children(list)
            .into_iter()
            .filter(|p| p.kind().ends_with("parameter_declaration"))
            .collect();
        // `f(void)` takes no parameters.
        if let [only] = params.as_slice() {
            let unnamed = only.child_by_field_name("declarator").is_none();
            let void = only
                .child_by_field_name("type")
                .is_some_and(|t| self.text(t) == "void");
            if unnamed && void {
                return Vec::new();
            }
        }
        params.into_iter().map(|p| self.plain(p)).collect()
    }

    fn bases(&self) -> Vec<Self> {
        let Some(clause) = all_children(self.node)
            .into_iter()
            .find(|c| c.kind() == "base_class_clause")
        else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut access = None;
        let mut is_virtual = false;
        for child in all_children(clause) {
            match child.kind() {
                "access_specifier" => access = Access::parse(&self.text(child)),
                "virtual" => is_virtual = true,
                "," => {
                    access = None;
                    is_virtual = false;
                }
                "comment" | "attribute_declaration" => {}
                _ if child.is_named() => {
                    out.push(Self {
                        node: child,
                        role: Role::Base { access, is_virtual },
                        ..*self
                    });
                    access = None;
                    is_virtual = false;
                }
                _ => {}
            }
        }
        out
    }
}

impl<'t> Cursor for TsCursor<'t> {
    fn kind(&self) -> CursorKind {
        match self.role {
            Role::Base { .. } => CursorKind::BaseSpecifier,
            Role::Declarator(_) => match self.function_declarator() {
                Some(fd) => self.function_kind(fd),
                None if self.node.kind() == "field_declaration" => CursorKind::FieldDecl,
                None => CursorKind::Other,
            },
            Role::Plain => match self.node.kind() {
                "translation_unit" => CursorKind::TranslationUnit,
                "namespace_definition" => CursorKind::Namespace,
                "class_specifier" => CursorKind::ClassDecl,
                "struct_specifier" | "union_specifier" => CursorKind::StructDecl,
                "enum_specifier" => CursorKind::EnumDecl,
                "function_definition" => match self.function_declarator() {
                    Some(fd) => self.function_kind(fd),
                    None => CursorKind::Other,
                },
                "parameter_declaration"
                | "optional_parameter_declaration"
                | "variadic_parameter_declaration" => CursorKind::ParmDecl,
                "call_expression" => CursorKind::CallExpr,
                _ => CursorKind::Other,
            },
        }
    }

    fn spelling(&self) -> String {
        match self.kind() {
            CursorKind::BaseSpecifier => names::normalize(&self.text(self.node)),
            CursorKind::CallExpr => names::simple_name(&self.callee_written()).to_string(),
            CursorKind::TranslationUnit | CursorKind::Other => String::new(),
            _ => self
                .name_node()
                .map(|n| names::simple_name(&names::normalize(&self.text(n))).to_string())
                .unwrap_or_default(),
        }
    }

    fn qualified_spelling(&self) -> String {
        match self.kind() {
            CursorKind::BaseSpecifier => names::normalize(&self.text(self.node)),
            CursorKind::CallExpr => self.callee_written(),
            CursorKind::ParmDecl => self.spelling(),
            CursorKind::TranslationUnit | CursorKind::Other => String::new(),
            _ => match self.name_node() {
                Some(name) => names::join(&self.enclosing_scope(), &names::normalize(&self.text(name))),
                None => String::new(),
            },
        }
    }

    fn location(&self) -> SourceLocation {
        let at = self.name_node().unwrap_or(self.node).start_position();
        SourceLocation {
            file: self.file.to_path_buf(),
            line: at.row + 1,
            column: at.column + 1,
        }
    }

    fn end_line(&self) -> usize {
        self.node.end_position().row + 1
    }

    fn type_spelling(&self) -> Option<String> {
        match self.kind() {
            CursorKind::FieldDecl => self.decorated_type(self.node, self.top_declarator()),
            CursorKind::ParmDecl => {
                self.decorated_type(self.node, self.node.child_by_field_name("declarator"))
            }
            _ => None,
        }
    }

    fn result_type_spelling(&self) -> Option<String> {
        if !self.kind().is_function_like() {
            return None;
        }
        self.decorated_type(self.node, self.top_declarator())
    }

    fn children(&self) -> Vec<Self> {
        match self.role {
            Role::Base { .. } => Vec::new(),
            Role::Declarator(d) => match function_declarator(d) {
                Some(fd) => self.parameters(fd),
                // Variables: initializers may contain calls.
                None => self.expand_all(named_children(d)),
            },
            Role::Plain => match self.node.kind() {
                "class_specifier" | "struct_specifier" | "union_specifier" => {
                    let mut out = self.bases();
                    if let Some(body) = self.node.child_by_field_name("body") {
                        out.extend(self.expand_all(named_children(body)));
                    }
                    out
                }
                "namespace_definition" => match self.node.child_by_field_name("body") {
                    Some(body) => self.expand_all(named_children(body)),
                    None => Vec::new(),
                },
                "function_definition" => {
                    let mut out = self
                        .function_declarator()
                        .map(|fd| self.parameters(fd))
                        .unwrap_or_default();
                    let ty = self.node.child_by_field_name("type");
                    let declarator = self.node.child_by_field_name("declarator");
                    let rest = named_children(self.node)
                        .into_iter()
                        .filter(|c| Some(*c) != ty && Some(*c) != declarator)
                        .collect();
                    out.extend(self.expand_all(rest));
                    out
                }
                "parameter_declaration"
                | "optional_parameter_declaration"
                | "variadic_parameter_declaration"
                | "enum_specifier" => Vec::new(),
                _ => self.expand_all(named_children(self.node)),
            },
        }
    }

    fn referenced(&self) -> Option<Self> {
        None
    }

    fn access(&self) -> Option<Access> {
        if let Role::Base { access, .. } = self.role {
            return access;
        }
        let mut member = self.node;
        while let Some(parent) = member.parent() {
            if matches!(parent.kind(), "template_declaration" | "field_declaration") {
                member = parent;
            } else {
                break;
            }
        }
        let list = member.parent().filter(|p| p.kind() == "field_declaration_list")?;
        let mut sibling = member.prev_named_sibling();
        while let Some(s) = sibling {
            if s.kind() == "access_specifier" {
                return Access::parse(&self.text(s));
            }
            sibling = s.prev_named_sibling();
        }
        let class = list.parent()?;
        Some(if class.kind() == "class_specifier" {
            Access::Private
        } else {
            Access::Public
        })
    }

    fn is_definition(&self) -> bool {
        match self.role {
            Role::Base { .. } => false,
            Role::Declarator(_) => self.function_declarator().is_none(),
            Role::Plain => match self.node.kind() {
                "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier" => {
                    self.node.child_by_field_name("body").is_some()
                }
                "namespace_definition" | "function_definition" => true,
                _ => false,
            },
        }
    }

    fn is_virtual(&self) -> bool {
        match self.role {
            Role::Base { is_virtual, .. } => is_virtual,
            _ => match self.top_declarator() {
                Some(d) if self.kind().is_function_like() => {
                    self.specifiers_before(d).iter().any(|t| t == "virtual")
                }
                _ => false,
            },
        }
    }

    fn is_override(&self) -> bool {
        self.qualifiers_after_parameters()
            .iter()
            .any(|t| t == "override" || t == "final")
    }

    fn is_pure(&self) -> bool {
        let Role::Declarator(d) = self.role else {
            return false;
        };
        if self.function_declarator().is_none() {
            return false;
        }
        let tail: String = self
            .slice(d.end_byte(), self.node.end_byte())
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        tail.starts_with("=0")
    }

    fn is_const(&self) -> bool {
        self.qualifiers_after_parameters().iter().any(|t| t == "const")
    }

    fn is_static(&self) -> bool {
        match self.top_declarator() {
            Some(d) => self.specifiers_before(d).iter().any(|t| t == "static"),
            None => false,
        }
    }

    fn has_default(&self) -> bool {
        self.node.kind() == "optional_parameter_declaration"
    }

    fn argument_count(&self) -> Option<usize> {
        if self.node.kind() != "call_expression" {
            return None;
        }
        let args = self.node.child_by_field_name("arguments")?;
        Some(
            named_children(args)
                .into_iter()
                .filter(|a| a.kind() != "comment")
                .count(),
        )
    }

    fn has_syntax_errors(&self) -> bool {
        self.node.has_error()
    }
}

// ─── Node Helpers ───────────────────────────────────────────────

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut walk = node.walk();
    node.named_children(&mut walk).collect()
}

fn all_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut walk = node.walk();
    node.children(&mut walk).collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut walk = node.walk();
    node.children_by_field_name(field, &mut walk).collect()
}

fn is_type_definition(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
    ) && node.child_by_field_name("body").is_some()
}

fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("declarator")
        .or_else(|| named_children(node).into_iter().last())
}

/// Unwrap pointer/reference wrappers down to a function declarator.
fn function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        match current.kind() {
            "function_declarator" => {
                // `void (*cb)(int)` declares a pointer, not a function.
                let inner = current.child_by_field_name("declarator")?;
                return (inner.kind() != "parenthesized_declarator").then_some(current);
            }
            "pointer_declarator" | "reference_declarator" | "attributed_declarator" => {
                current = inner_declarator(current)?;
            }
            _ => return None,
        }
    }
}

/// The identifier a declarator ultimately names.
fn innermost_name(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        match current.kind() {
            "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name"
            | "operator_name" | "template_function" | "type_identifier" => return Some(current),
            _ => current = inner_declarator(current)?,
        }
    }
}

/// Innermost class whose member list directly holds `node`.
fn enclosing_class(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.parent()?;
    while current.kind() == "template_declaration" {
        current = current.parent()?;
    }
    if current.kind() != "field_declaration_list" {
        return None;
    }
    current.parent()
}

fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{Symbol, SymbolKind};

    fn extract(source: &str) -> Extraction {
        CppFrontend::default()
            .extract(Path::new("src/shapes.cpp"), source.as_bytes())
            .unwrap()
    }

    fn find<'a>(out: &'a Extraction, qualified: &str, kind: SymbolKind) -> &'a Symbol {
        out.symbols
            .iter()
            .find(|s| s.qualified_name == qualified && s.kind == kind)
            .unwrap_or_else(|| panic!("missing {kind} {qualified}"))
    }

    const SHAPES: &str = r#"
namespace geo {

class Shape {
public:
    virtual double area() const = 0;
    virtual ~Shape() {}
};

class Circle : public Shape {
public:
    explicit Circle(double r) : r_(r) {}
    double area() const override { return square(r_) * 3.14; }
private:
    double r_;
};

}
"#;

    #[test]
    fn test_namespaced_classes() {
        let out = extract(SHAPES);
        find(&out, "geo", SymbolKind::Namespace);
        let shape = find(&out, "geo::Shape", SymbolKind::Class);
        assert!(shape.bases.is_empty());

        let circle = find(&out, "geo::Circle", SymbolKind::Class);
        assert_eq!(circle.bases.len(), 1);
        assert_eq!(circle.bases[0].name, "Shape");
        assert_eq!(circle.bases[0].access, Access::Public);
        assert_eq!(circle.file, Path::new("src/shapes.cpp"));
        assert!(!out.syntax_errors);
    }

    #[test]
    fn test_method_flags() {
        let out = extract(SHAPES);

        let pure = find(&out, "geo::Shape::area", SymbolKind::Method);
        let sig = pure.signature.as_ref().unwrap();
        assert!(sig.is_pure);
        assert!(sig.is_virtual);
        assert!(sig.is_const);
        assert!(!pure.is_definition);
        assert_eq!(pure.parent.as_deref(), Some("geo::Shape"));
        assert_eq!(pure.access, Some(Access::Public));

        let area = find(&out, "geo::Circle::area", SymbolKind::Method);
        let sig = area.signature.as_ref().unwrap();
        assert!(sig.is_override);
        assert!(sig.is_const);
        assert_eq!(sig.return_type, "double");
        assert!(area.is_definition);
    }

    #[test]
    fn test_constructor_and_field() {
        let out = extract(SHAPES);

        let ctor = find(&out, "geo::Circle::Circle", SymbolKind::Method);
        let sig = ctor.signature.as_ref().unwrap();
        assert_eq!(sig.return_type, "");
        assert_eq!(sig.parameter_types(), vec!["double"]);
        assert_eq!(sig.parameters[0].name, "r");

        let field = find(&out, "geo::Circle::r_", SymbolKind::Field);
        assert_eq!(field.access, Some(Access::Private));
        assert_eq!(field.type_name.as_deref(), Some("double"));
        assert_eq!(field.parent.as_deref(), Some("geo::Circle"));
    }

    #[test]
    fn test_calls_inside_method_body() {
        let out = extract(SHAPES);
        let area = find(&out, "geo::Circle::area", SymbolKind::Method);
        let callees: Vec<&str> = out
            .edges
            .iter()
            .filter(|e| e.caller_id == area.id)
            .map(|e| e.callee_name.as_str())
            .collect();
        assert_eq!(callees, vec!["square"]);
        assert!(out.edges.iter().all(|e| e.callee_id.is_none()));
    }

    #[test]
    fn test_out_of_line_definition() {
        let out = extract(
            r#"
class Widget {
public:
    void draw();
};

void Widget::draw() {
    helper(1, 2);
}

static int helper(int a, int b = 0) { return a + b; }
"#,
        );

        let draws: Vec<&Symbol> = out
            .symbols
            .iter()
            .filter(|s| s.qualified_name == "Widget::draw")
            .collect();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|s| s.kind == SymbolKind::Method));
        assert!(draws.iter().all(|s| s.parent.as_deref() == Some("Widget")));
        assert_eq!(draws.iter().filter(|s| s.is_definition).count(), 1);

        let helper = find(&out, "helper", SymbolKind::Function);
        let sig = helper.signature.as_ref().unwrap();
        assert!(sig.is_static);
        assert!(!sig.parameters[0].has_default);
        assert!(sig.parameters[1].has_default);

        let definition = draws.iter().find(|s| s.is_definition).unwrap();
        let edge = out
            .edges
            .iter()
            .find(|e| e.caller_id == definition.id)
            .unwrap();
        assert_eq!(edge.callee_name, "helper");
        assert_eq!(edge.arg_count, Some(2));
        assert_eq!(edge.call_site.line, 8);
    }

    #[test]
    fn test_forward_declarations_and_prototypes() {
        let out = extract("class Later;\nint proto(int value);\nvoid none(void);\n");
        assert!(out.symbols.iter().all(|s| s.name != "Later"));

        let proto = find(&out, "proto", SymbolKind::Function);
        assert!(!proto.is_definition);
        assert_eq!(
            proto.signature.as_ref().unwrap().parameter_types(),
            vec!["int"]
        );

        let none = find(&out, "none", SymbolKind::Function);
        assert!(none.signature.as_ref().unwrap().parameters.is_empty());
    }

    #[test]
    fn test_local_classes_are_not_indexed() {
        let out = extract(
            "void outer() {\n    struct Local { void g() {} int n; };\n    Local l;\n    l.g();\n}\nstruct Global { void g(); };\n",
        );
        let names: Vec<&str> = out.symbols.iter().map(|s| s.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["outer", "Global", "Global::g"]);
    }

    #[test]
    fn test_callee_spellings() {
        let out = extract(
            r#"
void run(Obj obj, Obj* ptr) {
    util::convert<int>(1);
    obj.process();
    ptr->reset();
}
"#,
        );
        let callees: Vec<&str> = out.edges.iter().map(|e| e.callee_name.as_str()).collect();
        assert_eq!(callees, vec!["util::convert", "process", "reset"]);
    }

    #[test]
    fn test_parameter_types_keep_qualifiers() {
        let out = extract("void greet(const std::string& name, int* count) {}\n");
        let greet = find(&out, "greet", SymbolKind::Function);
        assert_eq!(
            greet.signature.as_ref().unwrap().parameter_types(),
            vec!["const std::string&", "int*"]
        );
    }

    #[test]
    fn test_struct_members_default_public() {
        let out = extract("struct Point { int x; int y; };\n");
        find(&out, "Point", SymbolKind::Struct);
        let x = find(&out, "Point::x", SymbolKind::Field);
        assert_eq!(x.access, Some(Access::Public));
        find(&out, "Point::y", SymbolKind::Field);
    }

    #[test]
    fn test_syntax_errors_are_flagged_not_fatal() {
        let out = extract("class Broken { void f( };\nvoid ok() {}\n");
        assert!(out.syntax_errors);
    }

    #[test]
    fn test_empty_source() {
        let out = extract("");
        assert!(out.symbols.is_empty());
        assert!(out.edges.is_empty());
    }
}
