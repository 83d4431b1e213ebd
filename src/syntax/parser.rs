//! Tree-sitter parsing into owned syntax trees

use super::{Language, NodeId, Span, SyntaxNode, SyntaxTree};
use anyhow::{Context, Result};
use std::collections::HashSet;
use thiserror::Error;

/// Literal kinds kept as a single token so their inner text is never trivia
const ATOMIC_KINDS: &[&str] = &["string", "template_string", "regex", "jsx_text"];

/// Source text that is not syntactically well-formed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("parser produced no tree for {language} source")]
    NoTree { language: Language },
}

impl ParseError {
    /// 1-based line and column of the error, where known
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            ParseError::Syntax { line, column, .. } => Some((*line, *column)),
            ParseError::NoTree { .. } => None,
        }
    }
}

/// Parses source text into [`SyntaxTree`]s
pub struct SourceParser {
    parser: tree_sitter::Parser,
    language: Language,
}

impl SourceParser {
    /// Create a parser for one language
    pub fn new(language: Language) -> Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language.tree_sitter_language())
            .with_context(|| format!("Failed to set {} language", language))?;

        Ok(Self { parser, language })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Parse a source unit, rejecting trees that contain error or missing nodes
    pub fn parse(&mut self, source: &str) -> Result<SyntaxTree, ParseError> {
        let tree = self.parser.parse(source, None).ok_or(ParseError::NoTree {
            language: self.language,
        })?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(first_error(root, source));
        }

        Ok(TreeBuilder::new(source).build(root, self.language))
    }
}

/// Locate the first error or missing node in document order
fn first_error(root: tree_sitter::Node, source: &str) -> ParseError {
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let position = node.start_position();
            let message = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                let text = node.utf8_text(source.as_bytes()).unwrap_or("");
                let snippet: String = text.chars().take(24).collect();
                format!("unexpected `{}`", snippet.trim())
            };

            return ParseError::Syntax {
                message,
                line: position.row + 1,
                column: position.column + 1,
            };
        }

        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }

    let position = root.start_position();
    ParseError::Syntax {
        message: "malformed source".to_string(),
        line: position.row + 1,
        column: position.column + 1,
    }
}

/// Copies a tree-sitter tree into the arena, assigning trivia to the next token
struct TreeBuilder<'a> {
    source: &'a str,
    cursor: usize,
    nodes: Vec<SyntaxNode>,
    comments: usize,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: 0,
            nodes: Vec::new(),
            comments: 0,
        }
    }

    fn build(mut self, root: tree_sitter::Node, language: Language) -> SyntaxTree {
        let root_id = self.visit(root, None, None);
        let trailing = self.source.get(self.cursor..).unwrap_or("").to_string();

        SyntaxTree {
            language,
            nodes: self.nodes,
            root: root_id,
            trailing,
            line_count: self.source.lines().count(),
            comment_count: self.comments,
            spliced: HashSet::new(),
        }
    }

    fn visit(
        &mut self,
        node: tree_sitter::Node,
        field: Option<&'static str>,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let span = Span {
            start: node.start_byte(),
            end: node.end_byte(),
        };
        let is_leaf =
            parent.is_some() && (node.child_count() == 0 || ATOMIC_KINDS.contains(&node.kind()));

        let (text, leading) = if is_leaf {
            let leading = self.source.get(self.cursor..span.start).unwrap_or("");
            let text = self.source.get(span.start..span.end).unwrap_or("");
            self.cursor = self.cursor.max(span.end);
            (Some(text.to_string()), leading.to_string())
        } else {
            (None, String::new())
        };

        self.nodes.push(SyntaxNode {
            kind: node.kind(),
            field,
            named: node.is_named(),
            text,
            leading,
            span,
            parent,
            children: Vec::new(),
        });

        if !is_leaf {
            let mut cursor = node.walk();
            if cursor.goto_first_child() {
                loop {
                    let child = cursor.node();
                    if child.is_extra() {
                        // comments stay in the source gap and become trivia
                        if child.kind().contains("comment") {
                            self.comments += 1;
                        }
                    } else {
                        let child_id = self.visit(child, cursor.field_name(), Some(id));
                        self.nodes[id.0].children.push(child_id);
                    }

                    if !cursor.goto_next_sibling() {
                        break;
                    }
                }
            }
        }

        id
    }
}
