//! Domain models for modules, procedures, and edit outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared kind of a code container inside a document's project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// Standard module (`.bas`).
    Standard,
    /// Class module (`.cls`).
    Class,
    /// Form code-behind.
    Form,
    /// Document code-behind (reports, workbook/sheet objects).
    Document,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Standard => "standard",
            ComponentKind::Class => "class",
            ComponentKind::Form => "form",
            ComponentKind::Document => "document",
        }
    }

    /// File extension used when the module text is exported.
    pub fn extension(&self) -> &'static str {
        match self {
            ComponentKind::Standard => "bas",
            _ => "cls",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Procedure kind as the host reports it. `Proc` covers both subroutines and functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostProcKind {
    Proc,
    Let,
    Set,
    Get,
}

/// Precise procedure kind after first-line refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcedureKind {
    Sub,
    Function,
    PropertyGet,
    PropertyLet,
    PropertySet,
}

impl ProcedureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureKind::Sub => "sub",
            ProcedureKind::Function => "function",
            ProcedureKind::PropertyGet => "property-get",
            ProcedureKind::PropertyLet => "property-let",
            ProcedureKind::PropertySet => "property-set",
        }
    }
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared visibility of a procedure. Unqualified procedures are public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Friend,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Friend => "friend",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, contiguous line range inside a module's line buffer.
///
/// Procedures are views: they are recomputed from the host on every query and never stored
/// across a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub kind: ProcedureKind,
    pub visibility: Visibility,
    pub start_line: usize,
    pub line_count: usize,
}

impl Procedure {
    /// Last line (inclusive) covered by the procedure.
    pub fn end_line(&self) -> usize {
        self.start_line + self.line_count.saturating_sub(1)
    }
}

/// Summary of one code container in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub kind: ComponentKind,
    pub line_count: usize,
}

/// Which branch a write-procedure call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Replaced,
    Added,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Replaced => "replaced",
            Disposition::Added => "added",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive comparison of module and procedure names, folding every script's letters.
pub fn names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Folded form of a name, for sets keyed the way [`names_match`] compares.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_line_is_inclusive() {
        let proc = Procedure {
            name: "P1".into(),
            kind: ProcedureKind::Sub,
            visibility: Visibility::Public,
            start_line: 6,
            line_count: 5,
        };
        assert_eq!(proc.end_line(), 10);
    }

    #[test]
    fn names_fold_beyond_ascii() {
        assert!(names_match("Utils", "UTILS"));
        assert!(names_match("Ärger", "ärger"));
        assert!(names_match("Größe", "GRÖßE"));
        assert!(names_match("集計", "集計"));
        assert!(!names_match("Ärger", "Arger"));
        assert_eq!(name_key("ÄRGER"), name_key("ärger"));
    }
}
