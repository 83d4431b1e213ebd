//! Conflict classification rules
//!
//! A rule inspects one modification pair and says whether the change is
//! risky. Only the parameter signature rule is enabled by default; the others
//! are opt-in through [`ClassifierSettings`].

use super::{Conflict, ConflictKind};
use crate::structure::{EntityKind, StructuralEntity};
use serde::{Deserialize, Serialize};

/// Trait for conflict rules
pub trait ConflictRule: Send + Sync {
    /// Rule name
    fn name(&self) -> &str;

    /// Reason the change is risky, or `None` when it is safe
    fn check(&self, old: &StructuralEntity, new: &StructuralEntity) -> Option<String>;
}

/// Optional rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Flag changed default values of positional parameters
    pub check_default_values: bool,
    /// Flag changed superclasses
    pub check_superclass: bool,
}

/// Ordered collection of conflict rules; the first rule that fires wins
pub struct ConflictClassifier {
    rules: Vec<Box<dyn ConflictRule>>,
}

impl ConflictClassifier {
    /// Create the minimal classifier (parameter signatures only)
    pub fn new() -> Self {
        Self::from_settings(&ClassifierSettings::default())
    }

    /// Create a classifier with the optional rules enabled by settings
    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        let mut rules: Vec<Box<dyn ConflictRule>> = vec![Box::new(ParameterSignatureRule)];
        if settings.check_default_values {
            rules.push(Box::new(DefaultValueRule));
        }
        if settings.check_superclass {
            rules.push(Box::new(SuperclassRule));
        }
        Self { rules }
    }

    /// Add a custom rule after the configured ones
    pub fn with_rule(mut self, rule: Box<dyn ConflictRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Names of the active rules in evaluation order
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Classify a modification pair
    pub fn classify(&self, old: &StructuralEntity, new: &StructuralEntity) -> Option<Conflict> {
        let reason = self.rules.iter().find_map(|rule| rule.check(old, new))?;

        Some(Conflict {
            kind: ConflictKind::Modification,
            entity_kind: new.kind(),
            entity_key: new.display_key().to_string(),
            reason,
            old: old.clone(),
            new: new.clone(),
            renamed_to: None,
        })
    }
}

impl Default for ConflictClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameter count or positional parameter names changed
pub struct ParameterSignatureRule;

impl ConflictRule for ParameterSignatureRule {
    fn name(&self) -> &str {
        "parameter_signature"
    }

    fn check(&self, old: &StructuralEntity, new: &StructuralEntity) -> Option<String> {
        let (old_fn, new_fn) = (old.as_function()?, new.as_function()?);

        if old_fn.params.len() != new_fn.params.len() {
            return Some(format!(
                "Parameter count changed from {} to {}",
                old_fn.params.len(),
                new_fn.params.len()
            ));
        }

        old_fn
            .params
            .iter()
            .zip(&new_fn.params)
            .enumerate()
            .find(|(_, (o, n))| o.name != n.name)
            .map(|(i, (o, n))| {
                format!(
                    "Parameter {} renamed from `{}` to `{}`",
                    i + 1,
                    o.name,
                    n.name
                )
            })
    }
}

/// Default value of a positional parameter changed
pub struct DefaultValueRule;

impl ConflictRule for DefaultValueRule {
    fn name(&self) -> &str {
        "default_value"
    }

    fn check(&self, old: &StructuralEntity, new: &StructuralEntity) -> Option<String> {
        let (old_fn, new_fn) = (old.as_function()?, new.as_function()?);

        old_fn
            .params
            .iter()
            .zip(&new_fn.params)
            .find(|(o, n)| o.default_value != n.default_value)
            .map(|(o, n)| {
                format!(
                    "Default value of `{}` changed from {} to {}",
                    n.name,
                    o.default_value.as_deref().unwrap_or("none"),
                    n.default_value.as_deref().unwrap_or("none")
                )
            })
    }
}

/// Superclass of a class-like declaration changed
pub struct SuperclassRule;

impl ConflictRule for SuperclassRule {
    fn name(&self) -> &str {
        "superclass"
    }

    fn check(&self, old: &StructuralEntity, new: &StructuralEntity) -> Option<String> {
        if old.kind() != EntityKind::ClassLike {
            return None;
        }
        let (old_class, new_class) = (old.as_class()?, new.as_class()?);

        if old_class.superclass == new_class.superclass {
            return None;
        }

        Some(format!(
            "Superclass changed from {} to {}",
            old_class.superclass.as_deref().unwrap_or("none"),
            new_class.superclass.as_deref().unwrap_or("none")
        ))
    }
}
