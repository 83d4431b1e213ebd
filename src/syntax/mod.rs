//! Owned syntax trees for JavaScript and TypeScript source units
//!
//! Tree-sitter trees borrow their source and cannot be edited structurally, so
//! every parse is copied into an arena of owned nodes:
//! - Nodes live in one `Vec` and refer to each other by [`NodeId`]
//! - Leaf tokens carry their text and the trivia (whitespace, comments) before them
//! - Top-level statements are inserted, replaced and removed by rewriting indices

mod parser;
mod render;

pub use parser::{ParseError, SourceParser};
pub use render::{Renderer, TokenRenderer};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            _ => None,
        }
    }

    /// Detect language from a file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the tree-sitter language for this language
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// Get the canonical file extension for this language
    pub fn extension(&self) -> &'static str {
        match self {
            Language::JavaScript => "js",
            Language::TypeScript => "ts",
            Language::Tsx => "tsx",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::JavaScript
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::JavaScript => write!(f, "javascript"),
            Language::TypeScript => write!(f, "typescript"),
            Language::Tsx => write!(f, "tsx"),
        }
    }
}

/// Index of a node inside a [`SyntaxTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Byte range of a node in the text it was parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A node in the arena
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    /// Grammar kind (`function_declaration`, `identifier`, `(`...)
    pub kind: &'static str,
    /// Field name under which the parent holds this node
    pub field: Option<&'static str>,
    /// Whether the grammar names this node (punctuation and keywords are unnamed)
    pub named: bool,
    /// Token text, present only on leaves
    pub text: Option<String>,
    /// Whitespace and comments preceding a leaf token
    pub leading: String,
    /// Source range, excluded from hashing
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl SyntaxNode {
    pub fn is_leaf(&self) -> bool {
        self.text.is_some()
    }
}

/// A subtree copied from another tree, with the id mapping of the copy
#[derive(Debug)]
pub struct Graft {
    pub root: NodeId,
    mapping: HashMap<NodeId, NodeId>,
}

impl Graft {
    /// Id in the destination tree of a node from the source tree
    pub fn mapped(&self, id: NodeId) -> Option<NodeId> {
        self.mapping.get(&id).copied()
    }
}

/// An owned, editable syntax tree for one source unit
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub(crate) language: Language,
    pub(crate) nodes: Vec<SyntaxNode>,
    pub(crate) root: NodeId,
    pub(crate) trailing: String,
    pub(crate) line_count: usize,
    pub(crate) comment_count: usize,
    pub(crate) spliced: HashSet<NodeId>,
}

impl SyntaxTree {
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena, including detached ones
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements().is_empty()
    }

    /// Get a node; panics on an id from another tree that is out of range
    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id.0)
    }

    /// Whitespace and comments after the last token
    pub fn trailing(&self) -> &str {
        &self.trailing
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn comment_count(&self) -> usize {
        self.comment_count
    }

    /// Top-level statements in order
    pub fn statements(&self) -> &[NodeId] {
        &self.nodes[self.root.0].children
    }

    /// Position of a top-level statement, if it is attached to the root
    pub fn statement_position(&self, stmt: NodeId) -> Option<usize> {
        self.statements().iter().position(|&s| s == stmt)
    }

    /// Whether a statement was spliced in after parsing
    pub fn is_spliced(&self, stmt: NodeId) -> bool {
        self.spliced.contains(&stmt)
    }

    /// First child held under the given field name
    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).field == Some(field))
    }

    /// First child of the given kind
    pub fn child_of_kind(&self, id: NodeId, kind: &str) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).kind == kind)
    }

    /// Named children in order
    pub fn named_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(move |&c| self.node(c).named)
    }

    /// Texts of the unnamed tokens directly under a node (keywords, operators)
    pub fn tokens(&self, id: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.node(id).children.iter().filter_map(move |&c| {
            let child = self.node(c);
            if child.named {
                None
            } else {
                child.text.as_deref()
            }
        })
    }

    /// Whether an unnamed token with this text sits directly under the node
    pub fn has_token(&self, id: NodeId, token: &str) -> bool {
        self.tokens(id).any(|t| t == token)
    }

    /// Text of a leaf node
    pub fn leaf_text(&self, id: NodeId) -> Option<&str> {
        self.node(id).text.as_deref()
    }

    /// Leaves of a subtree in document order
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current);
            if node.is_leaf() {
                out.push(current);
            } else {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Token text of a subtree, independent of its trivia
    ///
    /// Tokens are joined directly, with one space only where two word tokens
    /// would otherwise fuse (`typeof x`, `new Api`).
    pub fn normalized_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for leaf in self.leaves(id) {
            let text = self.node(leaf).text.as_deref().unwrap_or_default();
            let fuses = out.chars().next_back().is_some_and(is_word_char)
                && text.chars().next().is_some_and(is_word_char);
            if fuses {
                out.push(' ');
            }
            out.push_str(text);
        }
        out
    }

    /// Replace the text of a leaf, returning false for interior nodes
    pub fn set_leaf_text(&mut self, id: NodeId, text: &str) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(node) if node.is_leaf() => {
                node.text = Some(text.to_string());
                true
            }
            _ => false,
        }
    }

    /// Copy a subtree of another tree into this arena, detached
    pub fn graft(&mut self, source: &SyntaxTree, root: NodeId) -> Graft {
        let mut mapping = HashMap::new();
        let root = self.copy_node(source, root, None, &mut mapping);
        Graft { root, mapping }
    }

    fn copy_node(
        &mut self,
        source: &SyntaxTree,
        id: NodeId,
        parent: Option<NodeId>,
        mapping: &mut HashMap<NodeId, NodeId>,
    ) -> NodeId {
        let src = source.node(id);
        let new_id = NodeId(self.nodes.len());
        self.nodes.push(SyntaxNode {
            kind: src.kind,
            field: src.field,
            named: src.named,
            text: src.text.clone(),
            leading: src.leading.clone(),
            span: src.span,
            parent,
            children: Vec::with_capacity(src.children.len()),
        });
        mapping.insert(id, new_id);

        for &child in &src.children {
            let copied = self.copy_node(source, child, Some(new_id), mapping);
            self.nodes[new_id.0].children.push(copied);
        }

        new_id
    }

    /// Attach a statement at the given top-level position
    pub fn insert_statement(&mut self, index: usize, stmt: NodeId) {
        let root = self.root;
        let index = index.min(self.statements().len());
        self.nodes[stmt.0].parent = Some(root);
        self.nodes[root.0].children.insert(index, stmt);
        self.spliced.insert(stmt);
    }

    /// Attach a statement after the last one
    pub fn push_statement(&mut self, stmt: NodeId) {
        let end = self.statements().len();
        self.insert_statement(end, stmt);
    }

    /// Swap a top-level statement for another, keeping its position
    pub fn replace_statement(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(index) = self.statement_position(old) else {
            return false;
        };
        let root = self.root;
        self.nodes[old.0].parent = None;
        self.nodes[new.0].parent = Some(root);
        self.nodes[root.0].children[index] = new;
        self.spliced.insert(new);
        true
    }

    /// Swap an attached node for another under the same parent
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.get(old).and_then(|n| n.parent) else {
            return false;
        };
        if parent == self.root {
            return self.replace_statement(old, new);
        }
        let Some(index) = self.nodes[parent.0].children.iter().position(|&c| c == old) else {
            return false;
        };
        self.nodes[parent.0].children[index] = new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        true
    }

    /// Variable declaration of a top-level statement, bare or under `export`
    pub fn variable_declaration(&self, stmt: NodeId) -> Option<NodeId> {
        let is_declaration =
            |id: NodeId| matches!(self.node(id).kind, "lexical_declaration" | "variable_declaration");
        if is_declaration(stmt) {
            return Some(stmt);
        }
        if self.node(stmt).kind != "export_statement" {
            return None;
        }
        self.child_by_field(stmt, "declaration").filter(|&d| is_declaration(d))
    }

    /// Declarators of a variable declaration in order
    pub fn declarators(&self, declaration: NodeId) -> Vec<NodeId> {
        self.node(declaration)
            .children
            .iter()
            .copied()
            .filter(|&c| self.node(c).kind == "variable_declarator")
            .collect()
    }

    /// Keep only the listed declarators, re-joined with the declaration's commas
    pub fn retain_declarators(&mut self, declaration: NodeId, keep: &[NodeId]) {
        let children = std::mem::take(&mut self.nodes[declaration.0].children);
        let is_comma = |node: &SyntaxNode| !node.named && node.text.as_deref() == Some(",");
        let mut commas = children
            .iter()
            .copied()
            .filter(|&c| is_comma(self.node(c)))
            .collect::<Vec<_>>()
            .into_iter();

        let mut kept = Vec::with_capacity(children.len());
        let mut declared = 0;
        for child in children {
            let (comma, declarator) = {
                let node = self.node(child);
                (is_comma(node), node.kind == "variable_declarator")
            };
            if comma {
                self.nodes[child.0].parent = None;
                continue;
            }
            if declarator {
                if !keep.contains(&child) {
                    self.nodes[child.0].parent = None;
                    continue;
                }
                if declared > 0 {
                    if let Some(comma) = commas.next() {
                        self.nodes[comma.0].parent = Some(declaration);
                        kept.push(comma);
                    }
                }
                declared += 1;
            }
            kept.push(child);
        }

        self.nodes[declaration.0].children = kept;
    }

    /// Whether `id` is `ancestor` or lies below it
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.get(node).and_then(|n| n.parent);
        }
        false
    }

    /// Detach a top-level statement; its nodes stay in the arena unreachable
    pub fn remove_statement(&mut self, stmt: NodeId) -> bool {
        let Some(index) = self.statement_position(stmt) else {
            return false;
        };
        let root = self.root;
        self.nodes[root.0].children.remove(index);
        self.nodes[stmt.0].parent = None;
        if let Some(&next) = self.nodes[root.0].children.get(index) {
            // the neighbour lost the statement it was laid out after
            self.spliced.insert(next);
        }
        true
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
