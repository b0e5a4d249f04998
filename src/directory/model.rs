//! Official program records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A known official (government) program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub sector: String,
    /// Government tier, e.g. "Federal".
    #[serde(default)]
    pub level: String,
    pub agency: String,
    /// Canonical URL or bare domain.
    pub link: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Program {
    pub fn new(
        name: impl Into<String>,
        sector: impl Into<String>,
        agency: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            sector: sector.into(),
            level: "Federal".to_string(),
            agency: agency.into(),
            link: link.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
