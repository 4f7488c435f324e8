use std::fmt;

use serde::{Deserialize, Serialize};

use super::category::Category;

/// Account role. Responder roles share their key with the category they serve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Policia,
    Bomberos,
    DefensaCivil,
    #[default]
    Ciudadano,
}

impl Role {
    /// The category this role responds to, `None` for citizens.
    pub fn category(&self) -> Option<Category> {
        match self {
            Role::Policia => Some(Category::Policia),
            Role::Bomberos => Some(Category::Bomberos),
            Role::DefensaCivil => Some(Category::DefensaCivil),
            Role::Ciudadano => None,
        }
    }

    pub fn is_responder(&self) -> bool {
        self.category().is_some()
    }

    pub fn responds_to(&self, category: Category) -> bool {
        self.category() == Some(category)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ciudadano => "Ciudadano",
            other => other.category().map(|c| c.as_str()).unwrap_or_default(),
        }
    }
}

impl From<Category> for Role {
    fn from(category: Category) -> Self {
        match category {
            Category::Policia => Role::Policia,
            Category::Bomberos => Role::Bomberos,
            Category::DefensaCivil => Role::DefensaCivil,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
