//! Reserved field names
//!
//! Field names that collide with identifiers the engine keeps for itself
//! (language keywords, `model_*`, `__dunder__` names) are stored under a
//! prefixed internal key while a record is processed. The mapping is undone
//! before the record leaves the validator. Error paths are built from the
//! declared names and never carry an internal key.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Prefix for internal keys of reserved field names
pub const RESERVED_PREFIX: &str = "__rsv_";

const KEYWORDS: [&str; 51] = [
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// True when `name` must not be used as an internal key as-is.
pub fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name)
        || name.starts_with("model_")
        || (name.len() > 4 && name.starts_with("__") && name.ends_with("__"))
        || name.starts_with(RESERVED_PREFIX)
}

/// Two-way mapping between user field names and internal keys for one
/// object scope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameTable {
    to_internal: HashMap<String, String>,
    to_external: HashMap<String, String>,
}

impl NameTable {
    /// Build the table for the field names declared in one scope.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let names: Vec<&str> = names.into_iter().collect();
        let mut table = NameTable::default();

        for name in names.iter().copied().filter(|n| is_reserved(n)) {
            let mut internal = format!("{}{}", RESERVED_PREFIX, name);
            while names.contains(&internal.as_str()) || table.to_external.contains_key(&internal) {
                internal.insert_str(0, RESERVED_PREFIX);
            }
            table.to_internal.insert(name.to_string(), internal.clone());
            table.to_external.insert(internal, name.to_string());
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.to_internal.is_empty()
    }

    /// Internal key for a declared field name
    pub fn internal<'a>(&'a self, name: &'a str) -> &'a str {
        self.to_internal.get(name).map_or(name, String::as_str)
    }

    /// Internal key for an input key. Undeclared keys that happen to equal an
    /// internal key are escaped so they survive the round trip verbatim.
    pub fn encode_key(&self, key: &str) -> String {
        if let Some(internal) = self.to_internal.get(key) {
            internal.clone()
        } else if self.to_external.contains_key(key) {
            format!("{}{}", RESERVED_PREFIX, key)
        } else {
            key.to_string()
        }
    }

    /// Inverse of `encode_key`
    pub fn decode_key(&self, key: &str) -> String {
        if let Some(external) = self.to_external.get(key) {
            return external.clone();
        }
        match key.strip_prefix(RESERVED_PREFIX) {
            Some(escaped) if self.to_external.contains_key(escaped) => escaped.to_string(),
            _ => key.to_string(),
        }
    }

    pub fn encode_map(&self, map: Map<String, Value>) -> Map<String, Value> {
        if self.is_empty() {
            return map;
        }
        map.into_iter().map(|(k, v)| (self.encode_key(&k), v)).collect()
    }

    pub fn decode_map(&self, map: Map<String, Value>) -> Map<String, Value> {
        if self.is_empty() {
            return map;
        }
        map.into_iter().map(|(k, v)| (self.decode_key(&k), v)).collect()
    }
}
