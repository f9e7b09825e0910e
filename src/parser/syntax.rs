//! Language parser adapters producing a normalized syntax tree.
//!
//! Each supported grammar gets a [`TreeSitterParser`] variant configured with
//! the node kinds that matter for chunking; extraction logic never branches
//! on language strings. Files in unsupported languages (and files a grammar
//! rejects) go through the heuristic splitter in [`super::fallback`], which
//! implements the same [`LanguageParser`] capability.

use std::collections::HashMap;

use tree_sitter::{Language as Grammar, Node, Parser};

use super::Language;
use crate::error::{EngineError, Result};

/// Normalized node type shared across all grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Module,
    Function,
    Class,
    Method,
    Import,
    Variable,
}

/// A node in the normalized tree. Line numbers are 1-based inclusive.
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub node_type: NodeType,
    pub name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub docstring: Option<String>,
    pub children: Vec<SyntaxNode>,
}

/// Capability implemented by every parser variant.
pub trait LanguageParser: Send + Sync {
    /// Parse source text into a normalized tree rooted at a `Module` node.
    fn parse(&self, source: &str) -> Result<SyntaxNode>;
}

/// Grammar node kinds that map onto normalized node types.
struct NodeRules {
    functions: &'static [&'static str],
    methods: &'static [&'static str],
    classes: &'static [&'static str],
    imports: &'static [&'static str],
    variables: &'static [&'static str],
}

static PYTHON_RULES: NodeRules = NodeRules {
    functions: &["function_definition"],
    methods: &[],
    classes: &["class_definition"],
    imports: &["import_statement", "import_from_statement", "future_import_statement"],
    variables: &["expression_statement"],
};

static JAVASCRIPT_RULES: NodeRules = NodeRules {
    functions: &["function_declaration", "generator_function_declaration"],
    methods: &["method_definition"],
    classes: &["class_declaration"],
    imports: &["import_statement"],
    variables: &["lexical_declaration", "variable_declaration"],
};

static TYPESCRIPT_RULES: NodeRules = NodeRules {
    functions: &["function_declaration", "generator_function_declaration"],
    methods: &["method_definition"],
    classes: &["class_declaration", "abstract_class_declaration", "interface_declaration", "enum_declaration"],
    imports: &["import_statement"],
    variables: &["lexical_declaration", "variable_declaration"],
};

static JAVA_RULES: NodeRules = NodeRules {
    functions: &[],
    methods: &["method_declaration", "constructor_declaration"],
    classes: &["class_declaration", "interface_declaration", "enum_declaration"],
    imports: &["import_declaration"],
    variables: &[],
};

static GO_RULES: NodeRules = NodeRules {
    functions: &["function_declaration"],
    methods: &["method_declaration"],
    classes: &["type_declaration"],
    imports: &["import_declaration"],
    variables: &["var_declaration", "const_declaration"],
};

static RUST_RULES: NodeRules = NodeRules {
    functions: &["function_item"],
    methods: &[],
    classes: &["struct_item", "enum_item", "trait_item", "impl_item", "union_item"],
    imports: &["use_declaration"],
    variables: &["const_item", "static_item"],
};

static CPP_RULES: NodeRules = NodeRules {
    functions: &["function_definition"],
    methods: &[],
    classes: &["class_specifier", "struct_specifier", "enum_specifier"],
    imports: &["preproc_include"],
    variables: &[],
};

static C_RULES: NodeRules = NodeRules {
    functions: &["function_definition"],
    methods: &[],
    classes: &["struct_specifier", "enum_specifier", "union_specifier"],
    imports: &["preproc_include"],
    variables: &[],
};

/// Tree-sitter backed parser for one grammar.
pub struct TreeSitterParser {
    language: Language,
    grammar: Grammar,
    rules: &'static NodeRules,
}

impl TreeSitterParser {
    fn new(language: Language, grammar: Grammar, rules: &'static NodeRules) -> Self {
        Self {
            language,
            grammar,
            rules,
        }
    }

    fn classify(&self, node: &Node) -> Option<NodeType> {
        let kind = node.kind();
        if self.rules.functions.contains(&kind) {
            return Some(NodeType::Function);
        }
        if self.rules.methods.contains(&kind) {
            return Some(NodeType::Method);
        }
        if self.rules.classes.contains(&kind) {
            return Some(NodeType::Class);
        }
        if self.rules.imports.contains(&kind) {
            return Some(NodeType::Import);
        }
        if self.rules.variables.contains(&kind) && self.is_variable(node) {
            return Some(NodeType::Variable);
        }
        None
    }

    /// Python module statements are all `expression_statement`s; only the
    /// ones wrapping an assignment count as variables.
    fn is_variable(&self, node: &Node) -> bool {
        if self.language != Language::Python {
            return true;
        }
        node.named_child(0)
            .map_or(false, |inner| inner.kind() == "assignment" || inner.kind() == "augmented_assignment")
    }

    fn collect(&self, node: Node, source: &str, out: &mut Vec<SyntaxNode>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match self.classify(&child) {
                Some(node_type) => {
                    let mut children = Vec::new();
                    if node_type == NodeType::Class {
                        self.collect(child, source, &mut children);
                    }
                    let name = match node_type {
                        NodeType::Import => None,
                        _ => self.node_name(child, source),
                    };
                    let docstring = match node_type {
                        NodeType::Function | NodeType::Class => self.docstring(child, source),
                        _ => None,
                    };
                    out.push(SyntaxNode {
                        node_type,
                        name,
                        start_line: child.start_position().row + 1,
                        end_line: child.end_position().row + 1,
                        docstring,
                        children,
                    });
                }
                // Climb through wrapper nodes (blocks, export statements,
                // decorated definitions) to reach the definitions inside.
                None => self.collect(child, source, out),
            }
        }
    }

    /// Resolve a definition's name: the grammar's `name` field when present,
    /// otherwise an identifier-like child up to two levels down (covers
    /// C/C++ declarators, Go type specs, Rust impl targets).
    fn node_name(&self, node: Node, source: &str) -> Option<String> {
        if let Some(name_node) = node.child_by_field_name("name") {
            return node_text(name_node, source);
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if is_identifier_kind(child.kind()) {
                return node_text(child, source);
            }
            let mut inner_cursor = child.walk();
            for grandchild in child.named_children(&mut inner_cursor) {
                if is_identifier_kind(grandchild.kind()) {
                    return node_text(grandchild, source);
                }
            }
        }

        None
    }

    /// Leading documentation: for Python, the first string statement of a
    /// definition body. Other grammars don't expose one here.
    fn docstring(&self, node: Node, source: &str) -> Option<String> {
        if self.language != Language::Python {
            return None;
        }
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let inner = first.named_child(0)?;
        if inner.kind() != "string" {
            return None;
        }
        let raw = node_text(inner, source)?;
        let trimmed = raw
            .trim_matches(|c| c == '"' || c == '\'')
            .trim()
            .to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

fn is_identifier_kind(kind: &str) -> bool {
    kind.contains("identifier") || kind == "name"
}

fn node_text(node: Node, source: &str) -> Option<String> {
    source
        .get(node.start_byte()..node.end_byte())
        .map(|s| s.to_string())
}

impl LanguageParser for TreeSitterParser {
    fn parse(&self, source: &str) -> Result<SyntaxNode> {
        let mut parser = Parser::new();
        parser
            .set_language(self.grammar)
            .map_err(|e| EngineError::Parse(format!("set_language failed: {e}")))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| EngineError::Parse("parser produced no tree".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(EngineError::Parse(format!(
                "syntax errors in {} source",
                self.language.as_str()
            )));
        }

        let mut children = Vec::new();
        self.collect(root, source, &mut children);

        Ok(SyntaxNode {
            node_type: NodeType::Module,
            name: None,
            start_line: 1,
            end_line: source.lines().count().max(1),
            docstring: None,
            children,
        })
    }
}

/// Registry of parser variants keyed by detected language.
pub struct ParserRegistry {
    parsers: HashMap<Language, TreeSitterParser>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        let mut parsers = HashMap::new();

        parsers.insert(
            Language::Python,
            TreeSitterParser::new(Language::Python, tree_sitter_python::language(), &PYTHON_RULES),
        );
        parsers.insert(
            Language::JavaScript,
            TreeSitterParser::new(
                Language::JavaScript,
                tree_sitter_javascript::language(),
                &JAVASCRIPT_RULES,
            ),
        );
        // The TSX grammar is a superset covering both .ts and .tsx.
        parsers.insert(
            Language::TypeScript,
            TreeSitterParser::new(
                Language::TypeScript,
                tree_sitter_typescript::language_tsx(),
                &TYPESCRIPT_RULES,
            ),
        );
        parsers.insert(
            Language::Java,
            TreeSitterParser::new(Language::Java, tree_sitter_java::language(), &JAVA_RULES),
        );
        parsers.insert(
            Language::Go,
            TreeSitterParser::new(Language::Go, tree_sitter_go::language(), &GO_RULES),
        );
        parsers.insert(
            Language::Rust,
            TreeSitterParser::new(Language::Rust, tree_sitter_rust::language(), &RUST_RULES),
        );
        parsers.insert(
            Language::Cpp,
            TreeSitterParser::new(Language::Cpp, tree_sitter_cpp::language(), &CPP_RULES),
        );
        parsers.insert(
            Language::C,
            TreeSitterParser::new(Language::C, tree_sitter_c::language(), &C_RULES),
        );

        Self { parsers }
    }

    /// The parser variant for a language; `None` for `Unknown`, which is
    /// handled by the heuristic splitter.
    pub fn get(&self, language: Language) -> Option<&TreeSitterParser> {
        self.parsers.get(&language)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(language: Language, source: &str) -> SyntaxNode {
        let registry = ParserRegistry::new();
        registry.get(language).unwrap().parse(source).unwrap()
    }

    #[test]
    fn test_parse_rust_function() {
        let tree = parse(
            Language::Rust,
            "fn hello_world() -> String {\n    \"hi\".to_string()\n}\n",
        );
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].node_type, NodeType::Function);
        assert_eq!(tree.children[0].name.as_deref(), Some("hello_world"));
        assert_eq!(tree.children[0].start_line, 1);
        assert_eq!(tree.children[0].end_line, 3);
    }

    #[test]
    fn test_parse_python_class_with_methods() {
        let source = "class Greeter:\n    \"\"\"Says hello.\"\"\"\n\n    def greet(self):\n        return 'hi'\n";
        let tree = parse(Language::Python, source);
        assert_eq!(tree.children.len(), 1);
        let class = &tree.children[0];
        assert_eq!(class.node_type, NodeType::Class);
        assert_eq!(class.name.as_deref(), Some("Greeter"));
        assert_eq!(class.docstring.as_deref(), Some("Says hello."));
        let methods: Vec<_> = class
            .children
            .iter()
            .filter(|c| c.node_type == NodeType::Function)
            .collect();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name.as_deref(), Some("greet"));
    }

    #[test]
    fn test_parse_python_module_assignment_is_variable() {
        let tree = parse(Language::Python, "LIMIT = 10\n\nprint(LIMIT)\n");
        let variables: Vec<_> = tree
            .children
            .iter()
            .filter(|c| c.node_type == NodeType::Variable)
            .collect();
        // `print(LIMIT)` is an expression statement but not an assignment.
        assert_eq!(variables.len(), 1);
    }

    #[test]
    fn test_parse_go_method_declaration() {
        let source = "package main\n\nfunc (s *Server) Start() error {\n\treturn nil\n}\n";
        let tree = parse(Language::Go, source);
        let methods: Vec<_> = tree
            .children
            .iter()
            .filter(|c| c.node_type == NodeType::Method)
            .collect();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name.as_deref(), Some("Start"));
    }

    #[test]
    fn test_parse_rejects_malformed_source() {
        let registry = ParserRegistry::new();
        let result = registry
            .get(Language::Python)
            .unwrap()
            .parse("def broken(:\n    pass\n");
        assert!(matches!(result, Err(EngineError::Parse(_))));
    }
}
