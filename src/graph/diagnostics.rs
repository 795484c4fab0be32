//! Diagnostics
//!
//! Non-fatal findings collected during a resolution pass. Fatal problems are
//! [`ResolveError`](crate::error::ResolveError)s instead; everything here lets
//! the pass continue with a well-defined answer.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Superclass reference did not resolve; treated as no inheritance
    DanglingSuperclass,
    /// Enum attribute reference did not resolve
    DanglingEnumeration,
    /// Explicit owner annotation disagrees with the derived ownership
    OwnershipOverride,
    /// Both sides declare ManyToMany towards each other
    DuplicateManyToMany,
    /// Same attribute name declared twice on one entity
    DuplicateAttribute,
    /// Relation targets an entity from an external library
    ImportedRelationTarget,
    /// Modules reference each other mutually
    ModuleCycle,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DanglingSuperclass => "W101",
            Self::DanglingEnumeration => "W102",
            Self::OwnershipOverride => "W103",
            Self::DuplicateManyToMany => "W104",
            Self::DuplicateAttribute => "W105",
            Self::ImportedRelationTarget => "I201",
            Self::ModuleCycle => "I202",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::DanglingSuperclass
            | Self::DanglingEnumeration
            | Self::OwnershipOverride
            | Self::DuplicateManyToMany
            | Self::DuplicateAttribute => Severity::Warning,

            Self::ImportedRelationTarget | Self::ModuleCycle => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Qualified name of the entity or module the finding is about
    pub subject: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (related entities, relation names)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.subject
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from a resolution pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    pub fn dangling_superclass(&mut self, entity: &str, superclass: &str) {
        self.push(DiagnosticItem::new(
            entity,
            DiagnosticCode::DanglingSuperclass,
            format!("superclass '{}' not found; treating entity as a root", superclass),
        ));
    }

    pub fn dangling_enumeration(&mut self, entity: &str, attribute: &str, enumeration: &str) {
        self.push(DiagnosticItem::new(
            entity,
            DiagnosticCode::DanglingEnumeration,
            format!("enumeration '{}' of attribute '{}' not found", enumeration, attribute),
        ));
    }

    pub fn ownership_override(&mut self, entity: &str, relation: &str, annotated: bool, derived: bool) {
        self.push(
            DiagnosticItem::new(
                entity,
                DiagnosticCode::OwnershipOverride,
                format!(
                    "relation '{}' is annotated owner={} but derives owner={}; using the derived value",
                    relation, annotated, derived
                ),
            )
            .with_context(format!("relation: {}", relation)),
        );
    }

    pub fn duplicate_many_to_many(&mut self, a: &str, b: &str) {
        self.push(
            DiagnosticItem::new(
                a,
                DiagnosticCode::DuplicateManyToMany,
                format!(
                    "'{}' and '{}' both declare ManyToMany towards each other; two join tables will be emitted",
                    a, b
                ),
            )
            .with_context(format!("other side: {}", b)),
        );
    }

    pub fn duplicate_attribute(&mut self, entity: &str, attribute: &str) {
        self.push(DiagnosticItem::new(
            entity,
            DiagnosticCode::DuplicateAttribute,
            format!("attribute '{}' declared more than once", attribute),
        ));
    }

    pub fn imported_relation_target(&mut self, entity: &str, relation: &str, target: &str) {
        self.push(DiagnosticItem::new(
            entity,
            DiagnosticCode::ImportedRelationTarget,
            format!(
                "relation '{}' targets imported entity '{}'; only this side is resolved",
                relation, target
            ),
        ));
    }

    pub fn module_cycle(&mut self, modules: &[String]) {
        let subject = modules.first().cloned().unwrap_or_default();
        let mut item = DiagnosticItem::new(
            subject,
            DiagnosticCode::ModuleCycle,
            format!("modules reference each other: {}", modules.join(", ")),
        );
        for module in modules {
            item = item.with_context(format!("module: {}", module));
        }
        self.push(item);
    }

    pub fn items(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.severity() == Severity::Warning)
            .count()
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_code() {
        assert_eq!(DiagnosticCode::DanglingSuperclass.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::ModuleCycle.severity(), Severity::Info);
    }

    #[test]
    fn test_display_includes_context() {
        let mut d = Diagnostics::new();
        d.duplicate_many_to_many("school.Student", "school.Course");
        let text = d.items()[0].to_string();
        assert!(text.starts_with("[W104] warning:"));
        assert!(text.contains("other side: school.Course"));
        assert_eq!(d.warning_count(), 1);
    }
}
