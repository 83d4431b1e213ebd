//! Position-invariant content hashing

use crate::syntax::{NodeId, SyntaxTree};
use sha2::{Digest, Sha256};

/// Compute a stable hash for content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a subtree by its kinds, fields and token texts
///
/// Spans and trivia never enter the digest, so reformatting, moving or
/// re-commenting a declaration leaves its hash unchanged. The subtree root's
/// own field is ignored so a declaration hashes the same with or without an
/// enclosing `export`. A variable declarator also carries its declaration's
/// kind and keyword, so `const a = 1` and `let a = 1` hash apart.
pub fn subtree_hash(tree: &SyntaxTree, id: NodeId) -> String {
    let mut hasher = Sha256::new();
    if let Some(declaration) = enclosing_declaration(tree, id) {
        let node = tree.node(declaration);
        write_str(&mut hasher, node.kind);
        let keyword = node.children.first().and_then(|&c| tree.leaf_text(c));
        write_str(&mut hasher, keyword.unwrap_or_default());
    }
    feed(&mut hasher, tree, id, true);
    hex::encode(hasher.finalize())
}

fn enclosing_declaration(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    if tree.node(id).kind != "variable_declarator" {
        return None;
    }
    tree.node(id)
        .parent
        .filter(|&p| matches!(tree.node(p).kind, "lexical_declaration" | "variable_declaration"))
}

/// Length-prefixed canonical encoding of one node and its descendants
fn feed(hasher: &mut Sha256, tree: &SyntaxTree, id: NodeId, is_root: bool) {
    let node = tree.node(id);

    write_str(hasher, node.kind);
    match node.field.filter(|_| !is_root) {
        Some(field) => write_str(hasher, field),
        None => hasher.update([0u8]),
    }

    match &node.text {
        Some(text) => {
            hasher.update(b"T");
            write_str(hasher, text);
        }
        None => {
            hasher.update(b"N");
            hasher.update((node.children.len() as u64).to_le_bytes());
            for &child in &node.children {
                feed(hasher, tree, child, false);
            }
        }
    }
}

fn write_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
