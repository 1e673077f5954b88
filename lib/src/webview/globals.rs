// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Injected page globals
//!
//! Configuration reaches the WebView page as `window.<name> = "<value>";`
//! statements run before content loads. Only allow-listed names with
//! string values are accepted, and every value is emitted as an escaped
//! string literal.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::transport::js_string_literal;

/// Global carrying the application id
pub const APP_ID_GLOBAL: &str = "crossmintAppId";

/// Injected globals errors
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GlobalsError {
    #[error("Global '{0}' is not in the allow-list")]
    UnknownGlobal(String),

    #[error("Global '{0}' must be a string")]
    NotAString(String),

    #[error("Invalid global name '{0}'")]
    InvalidName(String),
}

/// Allow-list of injectable globals
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalsSchema {
    allowed: BTreeSet<String>,
}

impl Default for GlobalsSchema {
    fn default() -> Self {
        Self {
            allowed: [APP_ID_GLOBAL.to_string()].into_iter().collect(),
        }
    }
}

impl GlobalsSchema {
    /// Build a schema from global names, each must be a plain identifier
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, GlobalsError> {
        let mut allowed = BTreeSet::new();

        for n in names {
            let n = n.as_ref();
            if !is_identifier(n) {
                return Err(GlobalsError::InvalidName(n.to_string()));
            }
            allowed.insert(n.to_string());
        }

        Ok(Self { allowed })
    }

    /// Check whether a global name is allowed
    pub fn allows(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }

    /// Validate `globals` and render the assignment script.
    ///
    /// Any violation rejects the whole set, no partial script is returned.
    pub fn script(&self, globals: &Map<String, Value>) -> Result<String, GlobalsError> {
        let mut lines = Vec::with_capacity(globals.len());

        for (name, value) in globals {
            if !self.allows(name) {
                return Err(GlobalsError::UnknownGlobal(name.clone()));
            }

            let Some(v) = value.as_str() else {
                return Err(GlobalsError::NotAString(name.clone()));
            };

            lines.push(format!("window.{name} = {};", js_string_literal(v)));
        }

        Ok(lines.join("\n"))
    }
}

/// Check a string is a plain JavaScript identifier
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => (),
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
