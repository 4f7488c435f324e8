use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Responder domain an alert is addressed to. Doubles as routing key and
/// display value, so the serialized form is the stable key (`"Policia"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Policia,
    Bomberos,
    DefensaCivil,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 3] = [Category::Policia, Category::Bomberos, Category::DefensaCivil];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Policia => "Policia",
            Category::Bomberos => "Bomberos",
            Category::DefensaCivil => "DefensaCivil",
        }
    }

    /// Human-readable label used in push titles.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Policia => "Policía",
            Category::Bomberos => "Bomberos",
            Category::DefensaCivil => "Defensa Civil",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
