//! Structural extraction from parsed source units
//!
//! Walks the top-level statements of a tree once. Nested and local
//! declarations, and statements that declare nothing, are ignored.

use super::{
    subtree_hash, ByKind, ClassInfo, DeclarationKind, DeclaredItem, EntityKind, EntityPayload,
    ExportBinding, ExportForm, ExportInfo, FunctionForm, FunctionInfo, ImportBinding, ImportForm,
    ImportInfo, MethodInfo, MethodKind, Param, ParamModifier, StructuralEntity, StructuralModel,
    SubtreeRef, TypeForm, VariableInfo,
};
use crate::syntax::{Language, NodeId, ParseError, SourceParser, SyntaxTree};
use anyhow::Result;

const FUNCTION_VALUE_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

const CLASS_VALUE_KINDS: &[&str] = &["class"];

/// A parsed source unit together with its structural model
#[derive(Debug, Clone)]
pub struct ParsedUnit {
    pub tree: SyntaxTree,
    pub model: StructuralModel,
}

/// Parses source text and extracts its structural model
pub struct StructureExtractor {
    parser: SourceParser,
}

impl StructureExtractor {
    /// Create an extractor for one language
    pub fn new(language: Language) -> Result<Self> {
        Ok(Self {
            parser: SourceParser::new(language)?,
        })
    }

    pub fn language(&self) -> Language {
        self.parser.language()
    }

    /// Extract the structural model of a source text
    pub fn extract(&mut self, source: &str) -> Result<StructuralModel, ParseError> {
        Ok(self.parse_unit(source)?.model)
    }

    /// Parse a source text, keeping the tree for merging
    pub fn parse_unit(&mut self, source: &str) -> Result<ParsedUnit, ParseError> {
        let tree = self.parser.parse(source)?;
        let model = extract_model(&tree);
        Ok(ParsedUnit { tree, model })
    }
}

/// Build the structural model of an already parsed tree
pub fn extract_model(tree: &SyntaxTree) -> StructuralModel {
    let mut collector = Collector {
        tree,
        entities: ByKind::default(),
    };

    for &stmt in tree.statements() {
        collector.statement(stmt);
    }

    StructuralModel::new(collector.entities, tree.line_count(), tree.comment_count())
}

struct Collector<'a> {
    tree: &'a SyntaxTree,
    entities: ByKind<StructuralEntity>,
}

impl<'a> Collector<'a> {
    fn statement(&mut self, stmt: NodeId) {
        match self.tree.node(stmt).kind {
            "import_statement" => self.import(stmt),
            "export_statement" => self.export(stmt),
            _ => {
                self.declaration(stmt, stmt);
            }
        }
    }

    fn push(
        &mut self,
        stmt: NodeId,
        node: NodeId,
        name: Option<(String, NodeId)>,
        key: Option<String>,
        payload: EntityPayload,
    ) {
        let (name, name_node) = match name {
            Some((name, id)) => (Some(name), Some(id)),
            None => (None, None),
        };

        let entity = StructuralEntity {
            name,
            key,
            content_hash: subtree_hash(self.tree, node),
            span: self.tree.node(node).span,
            anchor: SubtreeRef {
                statement: stmt,
                node,
                name: name_node,
            },
            payload,
        };

        self.entities.get_mut(entity.kind()).push(entity);
    }

    /// Text of the leaf under a field, with the leaf id
    fn field_name(&self, node: NodeId, field: &str) -> Option<(String, NodeId)> {
        let id = self.tree.child_by_field(node, field)?;
        let text = self.tree.leaf_text(id)?;
        Some((text.to_string(), id))
    }

    /// Extract a declaration statement, returning what it declares
    fn declaration(&mut self, stmt: NodeId, node: NodeId) -> Option<DeclaredItem> {
        match self.tree.node(node).kind {
            "function_declaration" | "generator_function_declaration" => {
                let name = self.field_name(node, "name");
                let names = name.iter().map(|(n, _)| n.clone()).collect();
                self.function(stmt, node, name);
                Some(DeclaredItem {
                    kind: EntityKind::FunctionLike,
                    names,
                })
            }
            "class_declaration"
            | "abstract_class_declaration"
            | "interface_declaration"
            | "type_alias_declaration"
            | "enum_declaration" => {
                let name = self.field_name(node, "name");
                let names = name.iter().map(|(n, _)| n.clone()).collect();
                self.class(stmt, node, name);
                Some(DeclaredItem {
                    kind: EntityKind::ClassLike,
                    names,
                })
            }
            "lexical_declaration" | "variable_declaration" => Some(DeclaredItem {
                kind: EntityKind::Variable,
                names: self.variables(stmt, node),
            }),
            _ => None,
        }
    }

    fn function(&mut self, stmt: NodeId, node: NodeId, name: Option<(String, NodeId)>) {
        let tree = self.tree;
        let kind = tree.node(node).kind;

        let form = match kind {
            "arrow_function" => FunctionForm::Arrow,
            "function_declaration" | "generator_function_declaration" => {
                FunctionForm::Declaration
            }
            _ => FunctionForm::Expression,
        };

        let params = if let Some(single) = tree.child_by_field(node, "parameter") {
            vec![self.param(single)]
        } else {
            tree.child_by_field(node, "parameters")
                .map(|list| {
                    tree.named_children(list)
                        .filter(|&p| tree.node(p).kind != "decorator")
                        .map(|p| self.param(p))
                        .collect()
                })
                .unwrap_or_default()
        };

        let info = FunctionInfo {
            form,
            params,
            is_async: tree.has_token(node, "async"),
            is_generator: kind.contains("generator") || tree.has_token(node, "*"),
        };

        let key = name.as_ref().map(|(n, _)| n.clone());
        self.push(stmt, node, name, key, EntityPayload::FunctionLike(info));
    }

    fn param(&self, node: NodeId) -> Param {
        let tree = self.tree;
        let simple = |name: String, modifier| Param {
            name,
            modifier,
            default_value: None,
        };

        match tree.node(node).kind {
            "identifier" => simple(tree.normalized_text(node), ParamModifier::Simple),
            "rest_pattern" => {
                let target = tree.named_children(node).next().unwrap_or(node);
                simple(tree.normalized_text(target), ParamModifier::Rest)
            }
            "assignment_pattern" => {
                let left = tree.child_by_field(node, "left");
                let right = tree.child_by_field(node, "right");
                let mut param = left
                    .map(|l| self.param(l))
                    .unwrap_or_else(|| simple(tree.normalized_text(node), ParamModifier::Complex));
                if param.modifier == ParamModifier::Simple {
                    param.modifier = ParamModifier::Default;
                }
                param.default_value = right.map(|r| tree.normalized_text(r));
                param
            }
            "required_parameter" | "optional_parameter" => {
                let mut param = tree
                    .child_by_field(node, "pattern")
                    .map(|p| self.param(p))
                    .unwrap_or_else(|| simple(tree.normalized_text(node), ParamModifier::Complex));
                if let Some(value) = tree.child_by_field(node, "value") {
                    if param.modifier == ParamModifier::Simple {
                        param.modifier = ParamModifier::Default;
                    }
                    param.default_value = Some(tree.normalized_text(value));
                }
                param
            }
            _ => simple(tree.normalized_text(node), ParamModifier::Complex),
        }
    }

    fn class(&mut self, stmt: NodeId, node: NodeId, name: Option<(String, NodeId)>) {
        let tree = self.tree;

        let form = match tree.node(node).kind {
            "interface_declaration" => TypeForm::Interface,
            "type_alias_declaration" => TypeForm::TypeAlias,
            "enum_declaration" => TypeForm::Enum,
            _ => TypeForm::Class,
        };

        let superclass = tree
            .child_of_kind(node, "class_heritage")
            .or_else(|| tree.child_of_kind(node, "extends_type_clause"))
            .and_then(|heritage| {
                // TypeScript nests the expression in an `extends_clause`
                match tree.child_of_kind(heritage, "extends_clause") {
                    Some(clause) => tree.named_children(clause).next(),
                    None if tree.child_of_kind(heritage, "implements_clause").is_some() => None,
                    None => tree.named_children(heritage).next(),
                }
            })
            .map(|expr| tree.normalized_text(expr));

        let methods = tree
            .child_by_field(node, "body")
            .map(|body| {
                tree.named_children(body)
                    .filter(|&m| {
                        matches!(
                            tree.node(m).kind,
                            "method_definition" | "method_signature" | "abstract_method_signature"
                        )
                    })
                    .filter_map(|m| self.method(m))
                    .collect()
            })
            .unwrap_or_default();

        let info = ClassInfo {
            form,
            superclass,
            methods,
        };

        let key = name.as_ref().map(|(n, _)| n.clone());
        self.push(stmt, node, name, key, EntityPayload::ClassLike(info));
    }

    fn method(&self, node: NodeId) -> Option<MethodInfo> {
        let tree = self.tree;
        let name = tree.normalized_text(tree.child_by_field(node, "name")?);
        let tokens: Vec<&str> = tree.tokens(node).collect();

        // `static get` may arrive as a single token
        let is_static = tokens.iter().any(|t| t.starts_with("static"));
        let kind = if name == "constructor" {
            MethodKind::Constructor
        } else if tokens.iter().any(|t| t.trim_end().ends_with("get")) {
            MethodKind::Get
        } else if tokens.contains(&"set") {
            MethodKind::Set
        } else {
            MethodKind::Method
        };

        Some(MethodInfo {
            name,
            kind,
            is_static,
            is_async: tokens.contains(&"async"),
        })
    }

    /// Extract each identifier-named declarator, returning the declared names
    fn variables(&mut self, stmt: NodeId, node: NodeId) -> Vec<String> {
        let tree = self.tree;
        let declaration = match tree.node(node).children.first().and_then(|&c| tree.leaf_text(c)) {
            Some("const") => DeclarationKind::Const,
            Some("var") => DeclarationKind::Var,
            _ => DeclarationKind::Let,
        };

        let mut names = Vec::new();
        let declarators: Vec<NodeId> = tree
            .named_children(node)
            .filter(|&d| tree.node(d).kind == "variable_declarator")
            .collect();

        for declarator in declarators {
            let Some(name_id) = tree.child_by_field(declarator, "name") else {
                continue;
            };
            if tree.node(name_id).kind != "identifier" {
                continue;
            }
            let Some(name) = tree.leaf_text(name_id).map(str::to_string) else {
                continue;
            };

            let value = tree.child_by_field(declarator, "value");
            let info = VariableInfo {
                declaration,
                has_init: value.is_some(),
            };
            self.push(
                stmt,
                declarator,
                Some((name.clone(), name_id)),
                Some(name.clone()),
                EntityPayload::Variable(info),
            );

            if let Some(value) = value {
                if FUNCTION_VALUE_KINDS.contains(&tree.node(value).kind) {
                    self.function(stmt, value, Some((name.clone(), name_id)));
                }
            }

            names.push(name);
        }

        names
    }

    fn import(&mut self, stmt: NodeId) {
        let tree = self.tree;
        let source = tree
            .child_by_field(stmt, "source")
            .map(|s| unquote(&tree.normalized_text(s)))
            .unwrap_or_default();

        let mut bindings = Vec::new();
        if let Some(clause) = tree.child_of_kind(stmt, "import_clause") {
            for part in tree.named_children(clause) {
                match tree.node(part).kind {
                    "identifier" => bindings.push(ImportBinding {
                        local: tree.normalized_text(part),
                        imported: None,
                        form: ImportForm::Default,
                    }),
                    "namespace_import" => {
                        if let Some(local) = tree.named_children(part).next() {
                            bindings.push(ImportBinding {
                                local: tree.normalized_text(local),
                                imported: None,
                                form: ImportForm::Namespace,
                            });
                        }
                    }
                    "named_imports" => {
                        for specifier in tree.named_children(part) {
                            let Some(imported) = tree.child_by_field(specifier, "name") else {
                                continue;
                            };
                            let imported = unquote(&tree.normalized_text(imported));
                            let local = tree
                                .child_by_field(specifier, "alias")
                                .map(|a| tree.normalized_text(a))
                                .unwrap_or_else(|| imported.clone());
                            bindings.push(ImportBinding {
                                local,
                                imported: Some(imported),
                                form: ImportForm::Named,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        let locals: Vec<&str> = bindings.iter().map(|b| b.local.as_str()).collect();
        let key = format!("{}-{}", source, locals.join(","));

        self.push(
            stmt,
            stmt,
            None,
            Some(key),
            EntityPayload::Import(ImportInfo { source, bindings }),
        );
    }

    fn export(&mut self, stmt: NodeId) {
        let tree = self.tree;
        let is_default = tree.has_token(stmt, "default");
        let source = tree
            .child_by_field(stmt, "source")
            .map(|s| unquote(&tree.normalized_text(s)));

        let mut info = ExportInfo {
            form: if is_default {
                ExportForm::Default
            } else {
                ExportForm::Declaration
            },
            declaration: None,
            specifiers: Vec::new(),
            source: source.clone(),
        };
        let mut name_leaf = None;

        let key = if let Some(decl) = tree.child_by_field(stmt, "declaration") {
            info.declaration = self.declaration(stmt, decl);
            let names = info
                .declaration
                .as_ref()
                .map(|d| d.names.clone())
                .unwrap_or_default();
            if is_default {
                "default".to_string()
            } else {
                // a lone declaration shares its name leaf with the export
                if names.len() == 1 {
                    name_leaf = self.last_name_node(stmt);
                }
                names.join(",")
            }
        } else if let Some(value) = tree.child_by_field(stmt, "value") {
            let kind = tree.node(value).kind;
            if FUNCTION_VALUE_KINDS.contains(&kind) {
                let name = self.field_name(value, "name");
                self.function(stmt, value, name);
            } else if CLASS_VALUE_KINDS.contains(&kind) {
                let name = self.field_name(value, "name");
                self.class(stmt, value, name);
            }
            "default".to_string()
        } else if let Some(clause) = tree.child_of_kind(stmt, "export_clause") {
            info.form = ExportForm::Clause;
            for specifier in tree.named_children(clause) {
                let Some(local) = tree.child_by_field(specifier, "name") else {
                    continue;
                };
                let local = unquote(&tree.normalized_text(local));
                let exported = tree
                    .child_by_field(specifier, "alias")
                    .map(|a| unquote(&tree.normalized_text(a)))
                    .unwrap_or_else(|| local.clone());
                info.specifiers.push(ExportBinding { local, exported });
            }
            let exported: Vec<&str> = info.specifiers.iter().map(|s| s.exported.as_str()).collect();
            exported.join(",")
        } else if let Some(namespace) = tree.child_of_kind(stmt, "namespace_export") {
            info.form = ExportForm::Clause;
            let exported = tree
                .named_children(namespace)
                .next()
                .map(|n| unquote(&tree.normalized_text(n)))
                .unwrap_or_default();
            info.specifiers.push(ExportBinding {
                local: "*".to_string(),
                exported: exported.clone(),
            });
            exported
        } else if tree.has_token(stmt, "*") {
            info.form = ExportForm::Star;
            format!("*:{}", source.unwrap_or_default())
        } else {
            // TypeScript `export = x` and similar
            info.form = ExportForm::Clause;
            tree.normalized_text(stmt)
        };

        let key = Some(key).filter(|k| !k.is_empty());
        let entity = StructuralEntity {
            name: key.clone(),
            key,
            content_hash: subtree_hash(tree, stmt),
            span: tree.node(stmt).span,
            anchor: SubtreeRef {
                statement: stmt,
                node: stmt,
                name: name_leaf,
            },
            payload: EntityPayload::Export(info),
        };
        self.entities.exports.push(entity);
    }

    /// Name leaf of the most recent entity hosted by a statement
    fn last_name_node(&self, stmt: NodeId) -> Option<NodeId> {
        [EntityKind::FunctionLike, EntityKind::ClassLike, EntityKind::Variable]
            .into_iter()
            .filter_map(|k| self.entities.get(k).last())
            .filter(|e| e.anchor.statement == stmt)
            .find_map(|e| e.anchor.name)
    }
}

fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && matches!(first, b'\'' | b'"' | b'`') {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> StructuralModel {
        StructureExtractor::new(Language::JavaScript)
            .unwrap()
            .extract(source)
            .unwrap()
    }

    fn keys(model: &StructuralModel, kind: EntityKind) -> Vec<String> {
        model
            .entities(kind)
            .iter()
            .map(|e| e.display_key().to_string())
            .collect()
    }

    #[test]
    fn test_extract_imports() {
        let model = extract(
            "import React, { useState as state, useEffect } from 'react';\nimport * as api from \"./api\";\nimport './side-effect';\n",
        );
        let imports = model.entities(EntityKind::Import);

        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].key.as_deref(), Some("react-React,state,useEffect"));
        let EntityPayload::Import(info) = &imports[0].payload else {
            panic!("expected import payload");
        };
        assert_eq!(info.source, "react");
        assert_eq!(info.bindings[0].form, ImportForm::Default);
        assert_eq!(info.bindings[1].local, "state");
        assert_eq!(info.bindings[1].imported.as_deref(), Some("useState"));

        assert_eq!(imports[1].key.as_deref(), Some("./api-api"));
        assert_eq!(imports[2].key.as_deref(), Some("./side-effect-"));
    }

    #[test]
    fn test_extract_functions_and_params() {
        let model = extract(
            "export async function getUser(id, opts = {}, ...rest) {}\nconst fetchAll = async ({ page }) => {};\nfunction* ids() {}\n",
        );
        let functions = model.entities(EntityKind::FunctionLike);
        assert_eq!(keys(&model, EntityKind::FunctionLike), vec!["getUser", "fetchAll", "ids"]);

        let get_user = functions[0].as_function().unwrap();
        assert!(get_user.is_async);
        assert_eq!(get_user.form, FunctionForm::Declaration);
        let modifiers: Vec<_> = get_user.params.iter().map(|p| p.modifier).collect();
        assert_eq!(
            modifiers,
            vec![ParamModifier::Simple, ParamModifier::Default, ParamModifier::Rest]
        );
        assert_eq!(get_user.params[1].name, "opts");
        assert_eq!(get_user.params[1].default_value.as_deref(), Some("{}"));
        assert_eq!(get_user.params[2].name, "rest");

        let fetch_all = functions[1].as_function().unwrap();
        assert_eq!(fetch_all.form, FunctionForm::Arrow);
        assert_eq!(fetch_all.params[0].modifier, ParamModifier::Complex);
        assert_eq!(fetch_all.params[0].name, "{page}");

        assert!(functions[2].as_function().unwrap().is_generator);
    }

    #[test]
    fn test_bound_function_is_also_a_variable() {
        let model = extract("export const load = (id) => fetch(id);\nlet count;\n");
        assert_eq!(keys(&model, EntityKind::Variable), vec!["load", "count"]);
        assert_eq!(keys(&model, EntityKind::FunctionLike), vec!["load"]);
        assert_eq!(keys(&model, EntityKind::Export), vec!["load"]);

        let count = &model.entities(EntityKind::Variable)[1];
        assert_eq!(
            count.payload,
            EntityPayload::Variable(VariableInfo {
                declaration: DeclarationKind::Let,
                has_init: false,
            })
        );
    }

    #[test]
    fn test_extract_classes() {
        let model = extract(
            "class Api extends Base {\n  constructor() { super(); }\n  static async create() {}\n  get url() {}\n  set url(v) {}\n}\n",
        );
        let class = model.entities(EntityKind::ClassLike)[0].as_class().unwrap();

        assert_eq!(class.superclass.as_deref(), Some("Base"));
        let kinds: Vec<_> = class.methods.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MethodKind::Constructor, MethodKind::Method, MethodKind::Get, MethodKind::Set]
        );
        assert!(class.methods[1].is_static);
        assert!(class.methods[1].is_async);
    }

    #[test]
    fn test_extract_exports() {
        let model = extract(
            "export { a, b as c };\nexport * from './all';\nexport * as ns from './ns';\nexport default function () {}\n",
        );
        assert_eq!(
            keys(&model, EntityKind::Export),
            vec!["a,c", "*:./all", "ns", "default"]
        );

        // anonymous default functions carry no key
        let functions = model.entities(EntityKind::FunctionLike);
        assert_eq!(functions.len(), 1);
        assert!(functions[0].key.is_none());
        assert!(functions[0].name.is_none());
    }

    #[test]
    fn test_nested_declarations_are_ignored() {
        let model = extract("function outer() {\n  function inner() {}\n  const local = 1;\n}\nif (x) { var y = 2; }\n");
        assert_eq!(keys(&model, EntityKind::FunctionLike), vec!["outer"]);
        assert!(model.entities(EntityKind::Variable).is_empty());
    }

    #[test]
    fn test_keys_stable_across_reformatting() {
        let a = extract("export function f(a,b){return a}\nconst x=1");
        let b = extract("\n\n// comment\nexport function f( a, b ) {\n  return a\n}\n\nconst x = 1\n");

        for kind in EntityKind::ALL {
            let left: Vec<_> = a.entities(kind).iter().map(|e| (&e.key, &e.content_hash)).collect();
            let right: Vec<_> = b.entities(kind).iter().map(|e| (&e.key, &e.content_hash)).collect();
            assert_eq!(left, right, "{} differ", kind);
        }
    }

    #[test]
    fn test_anchor_points_into_tree() {
        let mut extractor = StructureExtractor::new(Language::JavaScript).unwrap();
        let unit = extractor.parse_unit("export function f(a) {}\n").unwrap();
        let func = &unit.model.entities(EntityKind::FunctionLike)[0];

        assert_eq!(func.anchor.statement, unit.tree.statements()[0]);
        assert_eq!(unit.tree.leaf_text(func.anchor.name.unwrap()), Some("f"));
        assert_eq!(subtree_hash(&unit.tree, func.anchor.node), func.content_hash);

        let export = &unit.model.entities(EntityKind::Export)[0];
        assert_eq!(export.anchor.name, func.anchor.name);
    }

    #[test]
    fn test_typescript_declarations() {
        let mut extractor = StructureExtractor::new(Language::TypeScript).unwrap();
        let model = extractor
            .extract(
                "export interface User extends Base { id: number }\ntype Id = string;\nenum Role { Admin }\nexport function load(id: number, opt?: string, limit: number = 10): User { return null as any; }\n",
            )
            .unwrap();

        assert_eq!(keys(&model, EntityKind::ClassLike), vec!["User", "Id", "Role"]);
        let forms: Vec<_> = model
            .entities(EntityKind::ClassLike)
            .iter()
            .map(|e| e.as_class().unwrap().form)
            .collect();
        assert_eq!(forms, vec![TypeForm::Interface, TypeForm::TypeAlias, TypeForm::Enum]);

        let load = model.entities(EntityKind::FunctionLike)[0].as_function().unwrap();
        let names: Vec<_> = load.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "opt", "limit"]);
        assert_eq!(load.params[2].modifier, ParamModifier::Default);
        assert_eq!(load.params[2].default_value.as_deref(), Some("10"));
    }

    #[test]
    fn test_metadata_counts() {
        let model = extract("// one\nimport a from 'a';\nfunction f() {}\nconst b = 2;\n");
        let meta = model.metadata();
        assert_eq!(meta.total_lines, 4);
        assert_eq!(meta.total_comments, 1);
        assert_eq!(meta.total_imports, 1);
        assert_eq!(meta.total_functions, 1);
        assert_eq!(meta.total_variables, 1);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'react'"), "react");
        assert_eq!(unquote("\"./api\""), "./api");
        assert_eq!(unquote("plain"), "plain");
    }
}
