//! Statement-level merge engine
//!
//! Top-level statements are the unit of splicing. One statement can host
//! several entities (`export function f` hosts an export and a function), so
//! every statement is placed, replaced or removed at most once per merge.
//! Declarators sharing one `const` are the exception: they are overwritten,
//! copied and added one by one so untouched neighbours stay as they are.

use super::{ConflictResolution, MergeError, MergePolicy, MergeResult, TreeSide};
use crate::diff::{ComparisonResult, Conflict, ConflictKind, Modification};
use crate::structure::{
    subtree_hash, EntityKind, EntityPayload, ExportForm, StructuralEntity, StructuralModel,
};
use crate::syntax::{NodeId, Renderer, SyntaxTree, TokenRenderer};
use std::collections::HashSet;

/// Declarations first so their name leaves are renamed before the exports
/// that share their statements are visited
const MODIFICATION_ORDER: [EntityKind; 5] = [
    EntityKind::FunctionLike,
    EntityKind::ClassLike,
    EntityKind::Variable,
    EntityKind::Export,
    EntityKind::Import,
];

/// A modification with both statements located
struct Located<'a> {
    kind: EntityKind,
    modification: &'a Modification,
    old_stmt: NodeId,
    new_stmt: NodeId,
}

/// Applies comparisons to existing trees
pub struct Merger<R: Renderer = TokenRenderer> {
    renderer: R,
}

impl Merger<TokenRenderer> {
    pub fn new() -> Self {
        Self {
            renderer: TokenRenderer,
        }
    }
}

impl Default for Merger<TokenRenderer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Renderer> Merger<R> {
    /// Create a merger with a custom renderer
    pub fn with_renderer(renderer: R) -> Self {
        Self { renderer }
    }

    /// Merge the new tree into a copy of the old one
    ///
    /// Failures are reported on the result; nothing is partially applied.
    pub fn merge(
        &self,
        old_model: &StructuralModel,
        old_tree: &SyntaxTree,
        new_tree: &SyntaxTree,
        comparison: &ComparisonResult,
        policy: &MergePolicy,
    ) -> MergeResult {
        match self.try_merge(old_model, old_tree, new_tree, comparison, policy) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Merge aborted: {}", e);
                MergeResult {
                    success: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    /// Merge, failing on the first entity that cannot be located
    pub fn try_merge(
        &self,
        old_model: &StructuralModel,
        old_tree: &SyntaxTree,
        new_tree: &SyntaxTree,
        comparison: &ComparisonResult,
        policy: &MergePolicy,
    ) -> Result<MergeResult, MergeError> {
        let mut warnings = Vec::new();
        let resolution = match &policy.conflict_resolution {
            ConflictResolution::Unrecognized(raw) => {
                tracing::warn!("Unrecognized conflict resolution `{}`, skipping modifications", raw);
                warnings.push(format!(
                    "Unrecognized conflict resolution `{}`; modified entities were left unchanged",
                    raw
                ));
                ConflictResolution::Skip
            }
            other => other.clone(),
        };

        // locate everything before touching the copy
        let mut modifications = Vec::new();
        for kind in MODIFICATION_ORDER {
            for modification in comparison.modifications.get(kind) {
                modifications.push(Located {
                    kind,
                    modification,
                    old_stmt: locate(old_tree, &modification.old, TreeSide::Old)?,
                    new_stmt: locate(new_tree, &modification.new, TreeSide::New)?,
                });
            }
        }

        let mut additions = Vec::new();
        for (_, entity) in comparison.additions.iter() {
            additions.push((entity, locate(new_tree, entity, TreeSide::New)?));
        }

        let mut deletions = Vec::new();
        if policy.remove_deleted {
            for (_, entity) in comparison.deletions.iter() {
                deletions.push(locate(old_tree, entity, TreeSide::Old)?);
            }
        }

        let plans: Vec<Overwrite> = match resolution {
            ConflictResolution::Overwrite => modifications
                .iter()
                .map(|located| overwrite_plan(old_model, old_tree, new_tree, &modifications, located))
                .collect(),
            _ => Vec::new(),
        };

        let mut tree = old_tree.clone();
        let mut handled_old: HashSet<NodeId> = HashSet::new();
        let mut merge_conflicts = Vec::new();

        let modified_new: HashSet<NodeId> = modifications.iter().map(|m| m.new_stmt).collect();
        // statements an overwrite brings over whole are not added again
        let replaced_new: HashSet<NodeId> = modifications
            .iter()
            .zip(&plans)
            .filter(|(_, plan)| **plan == Overwrite::Statement)
            .map(|(m, _)| m.new_stmt)
            .collect();

        self.splice_additions(
            &mut tree,
            old_model,
            old_tree,
            new_tree,
            &additions,
            |stmt| modified_new.contains(&stmt),
            |stmt| replaced_new.contains(&stmt),
            &mut handled_old,
        );

        match resolution {
            ConflictResolution::Overwrite => {
                let mut brought_over: HashSet<NodeId> = HashSet::new();
                for (located, plan) in modifications.iter().zip(&plans) {
                    match plan {
                        Overwrite::Statement => {
                            if !handled_old.insert(located.old_stmt) {
                                continue;
                            }
                            if brought_over.insert(located.new_stmt) {
                                let graft = tree.graft(new_tree, located.new_stmt);
                                tree.replace_statement(located.old_stmt, graft.root);
                            } else {
                                // the new statement already replaced a sibling
                                tree.remove_statement(located.old_stmt);
                            }
                        }
                        Overwrite::Node => {
                            let anchor_old = located.modification.old.anchor.node;
                            let graft = tree.graft(new_tree, located.modification.new.anchor.node);
                            tree.replace_node(anchor_old, graft.root);
                        }
                        Overwrite::Covered => continue,
                    }
                    tracing::debug!("Overwrote {} `{}`", located.kind, located.modification.key);
                }
            }
            ConflictResolution::Rename => {
                let mut copies = Copies::default();
                for located in &modifications {
                    if let Some(conflict) = self.rename(
                        &mut tree,
                        old_model,
                        old_tree,
                        new_tree,
                        comparison,
                        policy,
                        located,
                        &mut copies,
                        &mut handled_old,
                    ) {
                        merge_conflicts.push(conflict);
                    }
                }
            }
            ConflictResolution::Skip | ConflictResolution::Unrecognized(_) => {}
        }

        for stmt in deletions {
            if handled_old.contains(&stmt) || !all_hosted_deleted(old_model, comparison, stmt) {
                continue;
            }
            if tree.remove_statement(stmt) {
                handled_old.insert(stmt);
            }
        }

        // classifier findings not already reported as renames
        let mut conflicts: Vec<Conflict> = comparison
            .conflicts
            .iter()
            .filter(|c| {
                !merge_conflicts.iter().any(|m: &Conflict| {
                    m.kind == ConflictKind::Rename
                        && m.entity_kind == c.entity_kind
                        && m.entity_key == c.entity_key
                })
            })
            .cloned()
            .collect();
        conflicts.extend(merge_conflicts);

        let merged_source = self.renderer.render(&tree);
        Ok(MergeResult {
            success: true,
            merged_source: Some(merged_source),
            merged_tree: Some(tree),
            conflicts,
            warnings,
            error: None,
        })
    }

    /// Splice added statements, imports at the top and the rest at the end
    ///
    /// A statement that also hosts modified or already present declarations
    /// is cut down to its added declarators, or skipped when none remain. An
    /// export that merely wraps an unchanged declaration replaces the bare one.
    #[allow(clippy::too_many_arguments)]
    fn splice_additions(
        &self,
        tree: &mut SyntaxTree,
        old_model: &StructuralModel,
        old_tree: &SyntaxTree,
        new_tree: &SyntaxTree,
        additions: &[(&StructuralEntity, NodeId)],
        is_modified: impl Fn(NodeId) -> bool,
        is_replaced: impl Fn(NodeId) -> bool,
        handled_old: &mut HashSet<NodeId>,
    ) {
        let added_nodes: HashSet<NodeId> = additions.iter().map(|(e, _)| e.anchor.node).collect();
        let mut statements: Vec<NodeId> = Vec::new();
        for &(_, stmt) in additions {
            if !statements.contains(&stmt) {
                statements.push(stmt);
            }
        }
        statements.sort_by_key(|&stmt| new_tree.statement_position(stmt));

        let mut count = 0;
        let mut imports = 0;
        for stmt in statements {
            if is_replaced(stmt) {
                continue;
            }

            let wrapped = additions
                .iter()
                .find(|(e, s)| *s == stmt && e.kind() == EntityKind::Export)
                .and_then(|(export, _)| wrapped_declaration(old_model, old_tree, export))
                .filter(|host| !handled_old.contains(host) && tree.statement_position(*host).is_some());

            let graft = match new_tree.variable_declaration(stmt) {
                Some(declaration) => {
                    let declarators = new_tree.declarators(declaration);
                    let added: Vec<NodeId> = declarators
                        .iter()
                        .copied()
                        .filter(|d| added_nodes.contains(d))
                        .collect();
                    if added.is_empty() {
                        if let Some(host) = wrapped.filter(|_| !is_modified(stmt)) {
                            self.export_in_place(tree, new_tree, stmt, host, handled_old);
                        }
                        continue;
                    }
                    let graft = tree.graft(new_tree, stmt);
                    if added.len() < declarators.len() {
                        let keep: Vec<NodeId> = added.iter().filter_map(|&d| graft.mapped(d)).collect();
                        if let Some(copy) = graft.mapped(declaration) {
                            tree.retain_declarators(copy, &keep);
                        }
                    }
                    graft
                }
                None if is_modified(stmt) => continue,
                None => {
                    if let Some(host) = wrapped {
                        self.export_in_place(tree, new_tree, stmt, host, handled_old);
                        continue;
                    }
                    if declares_existing(old_model, additions, stmt) {
                        tracing::debug!("Skipped export of a declaration that is already present");
                        continue;
                    }
                    tree.graft(new_tree, stmt)
                }
            };

            if new_tree.node(stmt).kind == "import_statement" {
                tree.insert_statement(imports, graft.root);
                imports += 1;
            } else {
                tree.push_statement(graft.root);
            }
            count += 1;
        }

        tracing::debug!("Spliced {} added statements", count);
    }

    /// Replace a bare declaration with the export statement wrapping it
    fn export_in_place(
        &self,
        tree: &mut SyntaxTree,
        new_tree: &SyntaxTree,
        stmt: NodeId,
        host: NodeId,
        handled_old: &mut HashSet<NodeId>,
    ) {
        let graft = tree.graft(new_tree, stmt);
        if tree.replace_statement(host, graft.root) {
            handled_old.insert(host);
            tracing::debug!("Exported an existing declaration in place");
        }
    }

    /// Append a renamed copy of the new declaration next to the kept old one
    #[allow(clippy::too_many_arguments)]
    fn rename(
        &self,
        tree: &mut SyntaxTree,
        old_model: &StructuralModel,
        old_tree: &SyntaxTree,
        new_tree: &SyntaxTree,
        comparison: &ComparisonResult,
        policy: &MergePolicy,
        located: &Located<'_>,
        copies: &mut Copies,
        handled_old: &mut HashSet<NodeId>,
    ) -> Option<Conflict> {
        let modification = located.modification;
        let new = &modification.new;

        // an export follows the rename of the declaration it wraps
        if copies.statements.contains(&located.new_stmt) && wraps_declaration(new) {
            return None;
        }

        // one copy per declarator, or per statement for other declarations
        let declarator = enclosing_declarator(new_tree, new.anchor.node, located.new_stmt);
        let unit = declarator.unwrap_or(located.new_stmt);
        if copies.units.contains(&unit) {
            return None;
        }

        let name_leaf = new
            .anchor
            .name
            .and_then(|leaf| new_tree.leaf_text(leaf).map(|text| (leaf, text)));
        let Some((name_leaf, name)) = name_leaf else {
            return Some(Conflict {
                kind: ConflictKind::Modification,
                entity_kind: located.kind,
                entity_key: modification.key.clone(),
                reason: format!(
                    "{} has no declared name to rename; kept the existing version",
                    located.kind
                ),
                old: modification.old.clone(),
                new: new.clone(),
                renamed_to: None,
            });
        };

        copies.units.insert(unit);
        copies.statements.insert(located.new_stmt);
        let renamed = format!("{}{}", name, policy.rename_suffix);

        let graft = match declarator {
            Some(declarator) => {
                let graft = tree.graft(new_tree, located.new_stmt);
                let declaration = new_tree
                    .variable_declaration(located.new_stmt)
                    .and_then(|d| graft.mapped(d));
                if let (Some(declaration), Some(copy)) = (declaration, graft.mapped(declarator)) {
                    tree.retain_declarators(declaration, &[copy]);
                }
                graft
            }
            // a second default export would not parse
            None if is_default_export(new_tree, located.new_stmt) => {
                tree.graft(new_tree, new.anchor.node)
            }
            None => tree.graft(new_tree, located.new_stmt),
        };
        if let Some(copy) = graft.mapped(name_leaf) {
            tree.set_leaf_text(copy, &renamed);
        }

        // refresh a copy left by an earlier merge instead of stacking another
        let previous = old_model
            .find(located.kind, &renamed)
            .and_then(|e| locate(old_tree, e, TreeSide::Old).ok())
            .filter(|stmt| !handled_old.contains(stmt))
            .filter(|&stmt| {
                old_model
                    .iter()
                    .filter(|e| e.anchor.statement == stmt && e.key.is_some())
                    .all(|e| e.key.as_deref() == Some(renamed.as_str()))
            });
        match previous {
            Some(stmt) if tree.statement_position(stmt).is_some() => {
                tree.replace_statement(stmt, graft.root);
                handled_old.insert(stmt);
            }
            _ => tree.push_statement(graft.root),
        }

        tracing::debug!("Kept {} `{}`, added `{}`", located.kind, modification.key, renamed);

        let reason = comparison
            .conflict_for(located.kind, &modification.key)
            .map(|c| c.reason.clone())
            .unwrap_or_else(|| "Content changed".to_string());

        Some(Conflict {
            kind: ConflictKind::Rename,
            entity_kind: located.kind,
            entity_key: modification.key.clone(),
            reason,
            old: modification.old.clone(),
            new: new.clone(),
            renamed_to: Some(renamed),
        })
    }
}

/// How an overwrite applies one modification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overwrite {
    /// Replace the whole old statement
    Statement,
    /// Replace only the entity's node inside the old statement
    Node,
    /// Handled by another modification of the same statement
    Covered,
}

/// Renamed copies made so far, by declarator or statement and by new statement
#[derive(Default)]
struct Copies {
    units: HashSet<NodeId>,
    statements: HashSet<NodeId>,
}

/// Decide how to overwrite one modification
///
/// A statement is swapped whole only when the modifications moving from it to
/// the same new statement account for every declaration on both sides.
/// Otherwise each modified node is swapped on its own so unmodified siblings
/// such as the `b` in `const a = 1, b = 2` survive.
fn overwrite_plan(
    old_model: &StructuralModel,
    old_tree: &SyntaxTree,
    new_tree: &SyntaxTree,
    all: &[Located<'_>],
    located: &Located<'_>,
) -> Overwrite {
    let group: Vec<&Located<'_>> = all
        .iter()
        .filter(|o| o.old_stmt == located.old_stmt && o.new_stmt == located.new_stmt)
        .collect();
    let old_nodes: Vec<NodeId> = group.iter().map(|o| o.modification.old.anchor.node).collect();
    let new_nodes: Vec<NodeId> = group.iter().map(|o| o.modification.new.anchor.node).collect();
    let related = |tree: &SyntaxTree, nodes: &[NodeId], node: NodeId| {
        nodes
            .iter()
            .any(|&n| tree.is_within(node, n) || tree.is_within(n, node))
    };

    let old_siblings = old_model
        .iter()
        .filter(|e| e.anchor.statement == located.old_stmt && e.key.is_some())
        .any(|e| !related(old_tree, &old_nodes, e.anchor.node));
    let new_siblings = new_tree
        .variable_declaration(located.new_stmt)
        .map(|d| new_tree.declarators(d))
        .unwrap_or_default()
        .into_iter()
        .any(|d| !related(new_tree, &new_nodes, d));
    if !old_siblings && !new_siblings {
        return Overwrite::Statement;
    }

    let node = located.modification.old.anchor.node;
    let enclosed = old_nodes
        .iter()
        .any(|&n| n != node && old_tree.is_within(node, n));
    if node == located.old_stmt || enclosed {
        Overwrite::Covered
    } else {
        Overwrite::Node
    }
}

/// Declarator of a top-level variable statement that holds `node`
fn enclosing_declarator(tree: &SyntaxTree, node: NodeId, stmt: NodeId) -> Option<NodeId> {
    let declaration = tree.variable_declaration(stmt)?;
    let mut current = node;
    loop {
        let parent = tree.node(current).parent?;
        if parent == declaration {
            return (tree.node(current).kind == "variable_declarator").then_some(current);
        }
        current = parent;
    }
}

fn is_default_export(tree: &SyntaxTree, stmt: NodeId) -> bool {
    tree.node(stmt).kind == "export_statement" && tree.has_token(stmt, "default")
}

/// Whether an export entity wraps a declaration rather than listing names
fn wraps_declaration(entity: &StructuralEntity) -> bool {
    matches!(&entity.payload, EntityPayload::Export(info) if info.declaration.is_some())
}

/// Bare old statement that declares exactly what an added export declares
fn wrapped_declaration(
    old_model: &StructuralModel,
    old_tree: &SyntaxTree,
    export: &StructuralEntity,
) -> Option<NodeId> {
    let EntityPayload::Export(info) = &export.payload else {
        return None;
    };
    if info.form != ExportForm::Declaration {
        return None;
    }
    let declared = info.declaration.as_ref()?;

    let mut host = None;
    for name in &declared.names {
        let stmt = old_model.find(declared.kind, name)?.anchor.statement;
        if host.is_some_and(|h| h != stmt) {
            return None;
        }
        host = Some(stmt);
    }
    let host = host?;
    if old_tree.node(host).kind == "export_statement" {
        return None;
    }

    let declares_only_these = old_model
        .iter()
        .filter(|e| e.anchor.statement == host)
        .all(|e| e.key.as_deref().is_some_and(|k| declared.names.iter().any(|n| n == k)));
    declares_only_these.then_some(host)
}

/// Whether an added export statement re-declares a name the old tree has
fn declares_existing(
    old_model: &StructuralModel,
    additions: &[(&StructuralEntity, NodeId)],
    stmt: NodeId,
) -> bool {
    additions
        .iter()
        .filter(|(_, s)| *s == stmt)
        .filter_map(|(e, _)| match &e.payload {
            EntityPayload::Export(info) => info.declaration.as_ref(),
            _ => None,
        })
        .any(|declared| declared.names.iter().any(|n| old_model.find(declared.kind, n).is_some()))
}

/// Find the top-level statement hosting an entity, checking it still matches
fn locate(
    tree: &SyntaxTree,
    entity: &StructuralEntity,
    side: TreeSide,
) -> Result<NodeId, MergeError> {
    let kind = entity.kind();
    let key = || entity.display_key().to_string();
    let anchor = entity.anchor;

    if tree.get(anchor.node).is_none() || tree.get(anchor.statement).is_none() {
        return Err(MergeError::SubtreeNotFound {
            kind,
            key: key(),
            side,
        });
    }

    let found = subtree_hash(tree, anchor.node);
    if found != entity.content_hash {
        return Err(MergeError::StaleModel {
            kind,
            key: key(),
            side,
            expected: entity.content_hash.clone(),
            found,
        });
    }

    if tree.statement_position(anchor.statement).is_none() {
        return Err(MergeError::NotTopLevel {
            kind,
            key: key(),
            side,
        });
    }

    Ok(anchor.statement)
}

/// Whether every keyed entity hosted by a statement was deleted
fn all_hosted_deleted(model: &StructuralModel, comparison: &ComparisonResult, stmt: NodeId) -> bool {
    model
        .iter()
        .filter(|e| e.anchor.statement == stmt)
        .all(|hosted| match hosted.key.as_deref() {
            Some(key) => comparison
                .deletions
                .get(hosted.kind())
                .iter()
                .any(|d| d.key.as_deref() == Some(key)),
            None => true,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::StructureDiffer;
    use crate::structure::{ParsedUnit, StructureExtractor};
    use crate::syntax::Language;

    fn unit(source: &str) -> ParsedUnit {
        StructureExtractor::new(Language::JavaScript)
            .unwrap()
            .parse_unit(source)
            .unwrap()
    }

    fn merge(old: &str, new: &str, policy: MergePolicy) -> MergeResult {
        let old = unit(old);
        let new = unit(new);
        let comparison = StructureDiffer::new().diff(&old.model, &new.model);
        Merger::new().merge(&old.model, &old.tree, &new.tree, &comparison, &policy)
    }

    fn policy(resolution: ConflictResolution) -> MergePolicy {
        MergePolicy::new(resolution)
    }

    #[test]
    fn test_additions_keep_order() {
        let result = merge(
            "import a from 'a';\nfunction f() {}\n",
            "import a from 'a';\nimport b from 'b';\nfunction f() {}\nfunction g() {}\nfunction h() {}\n",
            MergePolicy::default(),
        );

        assert!(result.success);
        assert_eq!(
            result.merged_source.as_deref(),
            Some("import b from 'b';\nimport a from 'a';\nfunction f() {}\nfunction g() {}\nfunction h() {}\n")
        );
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_rename_keeps_both_versions() {
        let result = merge(
            "function f(a) { return a; }\n",
            "function f(a, b) { return a + b; }\n",
            policy(ConflictResolution::Rename),
        );

        assert_eq!(
            result.merged_source.as_deref(),
            Some("function f(a) { return a; }\nfunction f_v2(a, b) { return a + b; }\n")
        );
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.kind, ConflictKind::Rename);
        assert_eq!(conflict.renamed_to.as_deref(), Some("f_v2"));
        assert!(conflict.reason.contains("Parameter count"));
    }

    #[test]
    fn test_rename_body_change_is_still_reported() {
        let result = merge(
            "function f(a) { return a; }\n",
            "function f(a) { return a * 2; }\n",
            policy(ConflictResolution::Rename),
        );

        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::Rename);
        assert!(result.merged_source.unwrap().contains("function f_v2(a)"));
    }

    #[test]
    fn test_rename_exported_declaration_once() {
        let result = merge(
            "export function f(a) {}\n",
            "export function f(a, b) {}\n",
            policy(ConflictResolution::Rename),
        );
        let merged = result.merged_source.unwrap();

        assert_eq!(merged.matches("f_v2").count(), 1);
        assert!(merged.contains("export function f(a) {}"));
        assert!(merged.contains("export function f_v2(a, b) {}"));
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn test_rename_refreshes_previous_copy() {
        let result = merge(
            "function f(a) {}\nfunction f_v2(a, b) {}\n",
            "function f(a, b, c) {}\n",
            policy(ConflictResolution::Rename),
        );

        assert_eq!(
            result.merged_source.as_deref(),
            Some("function f(a) {}\nfunction f_v2(a, b, c) {}\n")
        );
    }

    #[test]
    fn test_rename_custom_suffix() {
        let mut policy = policy(ConflictResolution::Rename);
        policy.rename_suffix = "Next".to_string();
        let result = merge("const x = 1;\n", "const x = 2;\n", policy);

        assert_eq!(
            result.merged_source.as_deref(),
            Some("const x = 1;\nconst xNext = 2;\n")
        );
    }

    #[test]
    fn test_unnamed_entities_are_not_renamed() {
        let old = "import { a } from 'x';\n";
        let result = merge(old, "import { a } from \"x\";\n", policy(ConflictResolution::Rename));

        assert_eq!(result.merged_source.as_deref(), Some(old));
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::Modification);
        assert_eq!(result.conflicts[0].entity_kind, EntityKind::Import);
    }

    #[test]
    fn test_overwrite_replaces_in_place() {
        let result = merge(
            "const before = 0;\nfunction f(a) { return a; }\nconst after = 1;\n",
            "function f(a, b) { return a + b; }\n",
            policy(ConflictResolution::Overwrite),
        );

        assert_eq!(
            result.merged_source.as_deref(),
            Some("const before = 0;\nfunction f(a, b) { return a + b; }\nconst after = 1;\n")
        );
        // the classifier finding is still reported
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::Modification);
    }

    #[test]
    fn test_overwrite_exported_declaration_once() {
        let result = merge(
            "export const load = (id) => get(id);\n",
            "export const load = (id, opts) => get(id, opts);\n",
            policy(ConflictResolution::Overwrite),
        );
        assert_eq!(
            result.merged_source.as_deref(),
            Some("export const load = (id, opts) => get(id, opts);\n")
        );
    }

    #[test]
    fn test_overwrite_keeps_unmodified_declarators() {
        let result = merge(
            "const a = 1, b = 2;\n",
            "const a = 5;\nconst b = 2;\n",
            policy(ConflictResolution::Overwrite),
        );
        assert_eq!(result.merged_source.as_deref(), Some("const a = 5, b = 2;\n"));

        let result = merge(
            "const a = 1, b = 2;\n",
            "const a = 5, b = 2, c = 3;\n",
            policy(ConflictResolution::Overwrite),
        );
        assert_eq!(
            result.merged_source.as_deref(),
            Some("const a = 5, b = 2;\nconst c = 3;\n")
        );
    }

    #[test]
    fn test_overwrite_declaration_keyword() {
        let result = merge(
            "export const a = 1;\nconst b = 2;\n",
            "export let a = 1;\nconst b = 2;\n",
            policy(ConflictResolution::Overwrite),
        );
        assert_eq!(
            result.merged_source.as_deref(),
            Some("export let a = 1;\nconst b = 2;\n")
        );
    }

    #[test]
    fn test_rename_copies_only_modified_declarator() {
        let result = merge(
            "const a = 1, b = 2;\n",
            "const a = 3, b = 2;\n",
            policy(ConflictResolution::Rename),
        );

        assert_eq!(
            result.merged_source.as_deref(),
            Some("const a = 1, b = 2;\nconst a_v2 = 3;\n")
        );
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].renamed_to.as_deref(), Some("a_v2"));
    }

    #[test]
    fn test_rename_default_export_copies_declaration() {
        let result = merge(
            "export default function f(a) { return a; }\n",
            "export default function f(a, b) { return a + b; }\n",
            policy(ConflictResolution::Rename),
        );
        let merged = result.merged_source.unwrap();

        assert_eq!(
            merged,
            "export default function f(a) { return a; }\nfunction f_v2(a, b) { return a + b; }\n"
        );
        assert_eq!(merged.matches("export default").count(), 1);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].renamed_to.as_deref(), Some("f_v2"));
    }

    #[test]
    fn test_added_declarator_is_split_off() {
        let result = merge(
            "const a = 1;\n",
            "const a = 1, d = 2;\n",
            MergePolicy::default(),
        );
        assert_eq!(
            result.merged_source.as_deref(),
            Some("const a = 1;\nconst d = 2;\n")
        );
    }

    #[test]
    fn test_export_added_to_unchanged_declaration() {
        let result = merge(
            "function f(a) {}\nfunction g() {}\n",
            "export function f(a) {}\nfunction g() {}\n",
            MergePolicy::default(),
        );
        assert_eq!(
            result.merged_source.as_deref(),
            Some("export function f(a) {}\nfunction g() {}\n")
        );

        let result = merge("const a = 1;\n", "export const a = 1;\n", MergePolicy::default());
        assert_eq!(result.merged_source.as_deref(), Some("export const a = 1;\n"));
    }

    #[test]
    fn test_skip_does_not_duplicate_rewrapped_declaration() {
        let old = "function f(a) {}\n";
        for resolution in [
            ConflictResolution::Skip,
            "merge-smart".parse().unwrap(),
        ] {
            let result = merge(old, "export function f(a, b) {}\n", policy(resolution));
            assert!(result.success);
            assert_eq!(result.merged_source.as_deref(), Some(old));
        }
    }

    #[test]
    fn test_skip_keeps_old() {
        let old = "function f(a) {}\n";
        let result = merge(old, "function f(a, b) {}\n", policy(ConflictResolution::Skip));
        assert_eq!(result.merged_source.as_deref(), Some(old));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unrecognized_policy_falls_back_to_skip() {
        let old = "function f(a) {}\n";
        let result = merge(
            old,
            "function f(a, b) {}\nfunction g() {}\n",
            policy("merge-smart".parse().unwrap()),
        );

        assert!(result.success);
        assert_eq!(
            result.merged_source.as_deref(),
            Some("function f(a) {}\nfunction g() {}\n")
        );
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("merge-smart"));
    }

    #[test]
    fn test_deletions_retained_by_default() {
        let old = "function f() {}\nfunction legacy() {}\n";
        let result = merge(old, "function f() {}\n", MergePolicy::default());
        assert_eq!(result.merged_source.as_deref(), Some(old));
    }

    #[test]
    fn test_remove_deleted() {
        let result = merge(
            "function f() {}\nfunction legacy() {}\n",
            "function f() {}\n",
            MergePolicy::default().remove_deleted(true),
        );
        assert_eq!(result.merged_source.as_deref(), Some("function f() {}\n"));
    }

    #[test]
    fn test_remove_deleted_keeps_shared_statements() {
        let old = "const a = 1, b = 2;\n";
        let result = merge(old, "const a = 1;\n", MergePolicy::default().remove_deleted(true));
        assert_eq!(result.merged_source.as_deref(), Some(old));
    }

    #[test]
    fn test_stale_model_aborts() {
        let old = unit("function f(a) {}\n");
        let new = unit("function f(a, b) {}\n");
        let comparison = StructureDiffer::new().diff(&old.model, &new.model);
        let drifted = unit("function f(x) {}\n");

        let result = Merger::new().merge(
            &old.model,
            &drifted.tree,
            &new.tree,
            &comparison,
            &MergePolicy::default(),
        );

        assert!(!result.success);
        assert!(result.merged_source.is_none());
        assert!(result.error.unwrap().contains("does not match"));
    }
}
