//! Language record.

use super::LanguageId;
use serde::{Deserialize, Serialize};

/// Named language with an explicit, user-controlled position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: Option<LanguageId>,
    pub name: String,
    pub order_number: i64,
}

impl Language {
    pub fn new(name: impl Into<String>, order_number: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            order_number,
        }
    }
}
