//! Project namespace resolution.
//!
//! Every backend isolates projects in some named container: a payload value,
//! a class, a table, a file stem. Each has its own naming rules, but the
//! derivation is shared: apply the prefix, lower-case if required, drop
//! disallowed characters, fix the first character, cut to the maximum
//! length, trim the tail to the end class, pad to the minimum length.
//!
//! Distinct project IDs can sanitize to the same namespace (`"a.b"` and
//! `"ab"` under SQL rules). Such collisions are not detected; a debug log is
//! written whenever sanitization changed the input.

use assetvec_config::{IndexConfig, IndexKind};
use tracing::debug;

/// How the first character of a namespace must look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRule {
    /// No constraint
    Any,
    /// ASCII letter or digit, else `lead` is prepended
    Alphanumeric { lead: &'static str },
    /// ASCII letter or `_`, else `lead` is prepended
    LetterOrUnderscore { lead: &'static str },
    /// ASCII upper-case letter; a lower-case first letter is upper-cased,
    /// anything else gets `lead` prepended
    Uppercase { lead: &'static str },
}

/// Which characters may end a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndRule {
    Any,
    Alphanumeric,
}

/// Naming constraints of one backend's isolation unit.
#[derive(Debug, Clone, Copy)]
pub struct NamespaceRules {
    /// Joins prefix and project ID
    pub separator: &'static str,
    /// Lower-case before filtering
    pub lowercase: bool,
    /// Characters kept by the filter step
    pub allowed: fn(char) -> bool,
    pub start: StartRule,
    pub end: EndRule,
    pub min_len: usize,
    pub max_len: usize,
}

fn sql_identifier_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

fn class_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn payload_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn file_stem_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-')
}

/// Qdrant `namespace` payload value.
pub const QDRANT_NAMESPACE: NamespaceRules = NamespaceRules {
    separator: "_",
    lowercase: false,
    allowed: payload_char,
    start: StartRule::Any,
    end: EndRule::Any,
    min_len: 1,
    max_len: 255,
};

/// Weaviate class name, `^[A-Z][_0-9A-Za-z]*$`.
pub const WEAVIATE_CLASS: NamespaceRules = NamespaceRules {
    separator: "_",
    lowercase: false,
    allowed: class_name_char,
    start: StartRule::Uppercase { lead: "C" },
    end: EndRule::Any,
    min_len: 1,
    max_len: 255,
};

/// sqlite-vec virtual table name.
pub const SQLITE_COLLECTION: NamespaceRules = NamespaceRules {
    separator: "_",
    lowercase: true,
    allowed: sql_identifier_char,
    start: StartRule::LetterOrUnderscore { lead: "t_" },
    end: EndRule::Any,
    min_len: 1,
    max_len: 63,
};

/// PostgreSQL table name (identifiers are cut at 63 bytes).
pub const POSTGRES_TABLE: NamespaceRules = NamespaceRules {
    separator: "_",
    lowercase: true,
    allowed: sql_identifier_char,
    start: StartRule::LetterOrUnderscore { lead: "t_" },
    end: EndRule::Any,
    min_len: 1,
    max_len: 63,
};

/// Flat index file stem.
pub const FLAT_FILE: NamespaceRules = NamespaceRules {
    separator: "_",
    lowercase: true,
    allowed: file_stem_char,
    start: StartRule::Alphanumeric { lead: "p" },
    end: EndRule::Alphanumeric,
    min_len: 1,
    max_len: 200,
};

/// Derives backend namespaces from project IDs.
#[derive(Debug, Clone)]
pub struct NamespaceResolver {
    prefix: String,
    rules: NamespaceRules,
}

impl NamespaceResolver {
    pub fn new(prefix: impl Into<String>, rules: NamespaceRules) -> Self {
        Self {
            prefix: prefix.into(),
            rules,
        }
    }

    /// Resolver a backend kind uses under `config`.
    ///
    /// `None` for the in-process index, which keys by raw project ID.
    pub fn for_kind(config: &IndexConfig, kind: IndexKind) -> Option<Self> {
        match kind {
            IndexKind::InProcess => None,
            IndexKind::Qdrant => Some(Self::new(
                &config.qdrant.namespace_prefix,
                QDRANT_NAMESPACE,
            )),
            IndexKind::Weaviate => Some(Self::new(
                &config.weaviate.class_prefix,
                WEAVIATE_CLASS,
            )),
            IndexKind::SqliteVec => Some(Self::new(
                &config.sqlite.collection_prefix,
                SQLITE_COLLECTION,
            )),
            IndexKind::Pgvector => Some(Self::new(
                &config.postgres.table_prefix,
                POSTGRES_TABLE,
            )),
            IndexKind::Flat => Some(Self::new(&config.flat.file_prefix, FLAT_FILE)),
        }
    }

    /// Prefixed project ID before any sanitization.
    fn prefixed(&self, project_id: &str) -> String {
        if self.prefix.is_empty() {
            project_id.to_string()
        } else {
            format!("{}{}{}", self.prefix, self.rules.separator, project_id)
        }
    }

    /// Whether `resolve` has to alter the prefixed project ID.
    pub fn is_sanitized(&self, project_id: &str) -> bool {
        self.resolve(project_id) != self.prefixed(project_id)
    }

    /// Namespace for `project_id`. Deterministic for a given prefix and rules.
    pub fn resolve(&self, project_id: &str) -> String {
        let rules = &self.rules;
        let raw = self.prefixed(project_id);

        let cased = if rules.lowercase {
            raw.to_lowercase()
        } else {
            raw.clone()
        };

        let mut name: String = cased.chars().filter(|c| (rules.allowed)(*c)).collect();

        match rules.start {
            StartRule::Any => {}
            StartRule::Alphanumeric { lead } => {
                if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                    name.insert_str(0, lead);
                }
            }
            StartRule::LetterOrUnderscore { lead } => {
                if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                    name.insert_str(0, lead);
                }
            }
            StartRule::Uppercase { lead } => match name.chars().next() {
                Some(c) if c.is_ascii_uppercase() => {}
                Some(c) if c.is_ascii_lowercase() => {
                    name.replace_range(..1, &c.to_ascii_uppercase().to_string());
                }
                _ => name.insert_str(0, lead),
            },
        }

        // Every allowed character is ASCII, so byte and char lengths agree
        name.truncate(rules.max_len);

        if rules.end == EndRule::Alphanumeric {
            while name.ends_with(|c: char| !c.is_ascii_alphanumeric()) {
                name.pop();
            }
        }

        while name.len() < rules.min_len {
            name.push('0');
        }

        if name != raw {
            debug!(
                "Namespace for project '{}' sanitized: '{}' -> '{}'",
                project_id, raw, name
            );
        }

        name
    }
}
