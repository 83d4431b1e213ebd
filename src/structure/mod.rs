//! Structural model of a source unit
//!
//! A source unit is reduced to a flat list of its top-level declarations:
//! - Imports and exports
//! - Function-like declarations (including functions bound to variables)
//! - Class-like declarations (classes, and in TypeScript interfaces, type aliases, enums)
//! - Top-level variables
//!
//! Every entity carries a stable identity key and a position-invariant content hash.

mod extractor;
mod hasher;

pub use extractor::{extract_model, ParsedUnit, StructureExtractor};
pub use hasher::{content_hash, subtree_hash};

use crate::syntax::{NodeId, Span};
use serde::{Deserialize, Serialize};

/// Kind of a structural entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Import,
    Export,
    FunctionLike,
    ClassLike,
    Variable,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Import,
        EntityKind::Export,
        EntityKind::FunctionLike,
        EntityKind::ClassLike,
        EntityKind::Variable,
    ];

    /// Name of the per-kind collection (`imports`, `functions`...)
    pub fn collection_name(&self) -> &'static str {
        match self {
            EntityKind::Import => "imports",
            EntityKind::Export => "exports",
            EntityKind::FunctionLike => "functions",
            EntityKind::ClassLike => "classes",
            EntityKind::Variable => "variables",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Import => write!(f, "import"),
            EntityKind::Export => write!(f, "export"),
            EntityKind::FunctionLike => write!(f, "function"),
            EntityKind::ClassLike => write!(f, "class"),
            EntityKind::Variable => write!(f, "variable"),
        }
    }
}

/// One collection per entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByKind<T> {
    pub imports: Vec<T>,
    pub exports: Vec<T>,
    pub functions: Vec<T>,
    pub classes: Vec<T>,
    pub variables: Vec<T>,
}

impl<T> Default for ByKind<T> {
    fn default() -> Self {
        Self {
            imports: Vec::new(),
            exports: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            variables: Vec::new(),
        }
    }
}

impl<T> ByKind<T> {
    pub fn get(&self, kind: EntityKind) -> &[T] {
        match kind {
            EntityKind::Import => &self.imports,
            EntityKind::Export => &self.exports,
            EntityKind::FunctionLike => &self.functions,
            EntityKind::ClassLike => &self.classes,
            EntityKind::Variable => &self.variables,
        }
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut Vec<T> {
        match kind {
            EntityKind::Import => &mut self.imports,
            EntityKind::Export => &mut self.exports,
            EntityKind::FunctionLike => &mut self.functions,
            EntityKind::ClassLike => &mut self.classes,
            EntityKind::Variable => &mut self.variables,
        }
    }

    /// Total number of items across all kinds
    pub fn total(&self) -> usize {
        EntityKind::ALL.iter().map(|&k| self.get(k).len()).sum()
    }

    /// All items, tagged with their kind, in kind order
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &T)> {
        EntityKind::ALL
            .into_iter()
            .flat_map(move |k| self.get(k).iter().map(move |item| (k, item)))
    }
}

/// Where an entity lives in the tree it was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeRef {
    /// Top-level statement hosting the entity
    pub statement: NodeId,
    /// Node whose subtree the content hash covers
    pub node: NodeId,
    /// Leaf holding the declared identifier
    pub name: Option<NodeId>,
}

/// A top-level declaration with its identity and content hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralEntity {
    /// Declared name; `None` for anonymous forms
    pub name: Option<String>,
    /// Identity key; `None` excludes the entity from diffing
    pub key: Option<String>,
    /// Position-invariant hash of the entity's subtree
    pub content_hash: String,
    /// Source range, excluded from hashing
    pub span: Span,
    pub anchor: SubtreeRef,
    pub payload: EntityPayload,
}

impl StructuralEntity {
    pub fn kind(&self) -> EntityKind {
        match self.payload {
            EntityPayload::Import(_) => EntityKind::Import,
            EntityPayload::Export(_) => EntityKind::Export,
            EntityPayload::FunctionLike(_) => EntityKind::FunctionLike,
            EntityPayload::ClassLike(_) => EntityKind::ClassLike,
            EntityPayload::Variable(_) => EntityKind::Variable,
        }
    }

    /// Key for messages, falling back to a placeholder for anonymous entities
    pub fn display_key(&self) -> &str {
        self.key.as_deref().unwrap_or("<anonymous>")
    }

    pub fn as_function(&self) -> Option<&FunctionInfo> {
        match &self.payload {
            EntityPayload::FunctionLike(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassInfo> {
        match &self.payload {
            EntityPayload::ClassLike(info) => Some(info),
            _ => None,
        }
    }
}

/// Kind-specific details of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPayload {
    Import(ImportInfo),
    Export(ExportInfo),
    FunctionLike(FunctionInfo),
    ClassLike(ClassInfo),
    Variable(VariableInfo),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Module specifier without quotes
    pub source: String,
    pub bindings: Vec<ImportBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    pub local: String,
    /// Name in the imported module, for named imports
    pub imported: Option<String>,
    pub form: ImportForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportForm {
    Default,
    Namespace,
    Named,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub form: ExportForm,
    /// Declaration wrapped by the export
    pub declaration: Option<DeclaredItem>,
    pub specifiers: Vec<ExportBinding>,
    /// Module re-exported from
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportForm {
    /// `export function f() {}`
    Declaration,
    /// `export { a as b }`, optionally `from '...'`
    Clause,
    /// `export * from '...'`
    Star,
    /// `export default ...`
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredItem {
    pub kind: EntityKind,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBinding {
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub form: FunctionForm,
    pub params: Vec<Param>,
    pub is_async: bool,
    pub is_generator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionForm {
    Declaration,
    Expression,
    Arrow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Identifier, or normalised pattern text for complex parameters
    pub name: String,
    pub modifier: ParamModifier,
    /// Normalised default-value text
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamModifier {
    Simple,
    Default,
    Rest,
    Complex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub form: TypeForm,
    pub superclass: Option<String>,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeForm {
    Class,
    Interface,
    TypeAlias,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    pub kind: MethodKind,
    pub is_static: bool,
    pub is_async: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Constructor,
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub declaration: DeclarationKind,
    pub has_init: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Const,
    Let,
    Var,
}

/// Aggregate facts about a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub total_lines: usize,
    pub total_comments: usize,
    pub total_imports: usize,
    pub total_exports: usize,
    pub total_functions: usize,
    pub total_classes: usize,
    pub total_variables: usize,
}

/// Summary statistics for reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub imports: usize,
    pub exports: usize,
    pub functions: usize,
    pub classes: usize,
    pub variables: usize,
    pub comments: usize,
    pub total_lines: usize,
    pub complexity: u64,
}

/// The structural model of one parse of one source unit
///
/// Immutable once built; transformations produce new models or trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralModel {
    entities: ByKind<StructuralEntity>,
    metadata: ModelMetadata,
}

impl StructuralModel {
    pub(crate) fn new(
        entities: ByKind<StructuralEntity>,
        total_lines: usize,
        total_comments: usize,
    ) -> Self {
        let metadata = ModelMetadata {
            total_lines,
            total_comments,
            total_imports: entities.imports.len(),
            total_exports: entities.exports.len(),
            total_functions: entities.functions.len(),
            total_classes: entities.classes.len(),
            total_variables: entities.variables.len(),
        };

        Self { entities, metadata }
    }

    pub fn entities(&self, kind: EntityKind) -> &[StructuralEntity] {
        self.entities.get(kind)
    }

    /// All entities in kind order
    pub fn iter(&self) -> impl Iterator<Item = &StructuralEntity> {
        self.entities.iter().map(|(_, e)| e)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Find an entity by kind and identity key
    pub fn find(&self, kind: EntityKind, key: &str) -> Option<&StructuralEntity> {
        self.entities(kind)
            .iter()
            .rev()
            .find(|e| e.key.as_deref() == Some(key))
    }

    /// Counts and a rough complexity score
    pub fn stats(&self) -> AnalysisStats {
        // score in halves so half-points per parameter stay integral
        let mut halves: u64 = 0;
        for func in self.entities.functions.iter().filter_map(|e| e.as_function()) {
            halves += 2;
            halves += func.params.len() as u64;
            if func.is_async {
                halves += 2;
            }
            if func.is_generator {
                halves += 2;
            }
        }
        for class in self.entities.classes.iter().filter_map(|e| e.as_class()) {
            halves += 4;
            halves += 2 * class.methods.len() as u64;
        }

        AnalysisStats {
            imports: self.metadata.total_imports,
            exports: self.metadata.total_exports,
            functions: self.metadata.total_functions,
            classes: self.metadata.total_classes,
            variables: self.metadata.total_variables,
            comments: self.metadata.total_comments,
            total_lines: self.metadata.total_lines,
            complexity: (halves + 1) / 2,
        }
    }
}
