use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An entry in the clinic's service catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicService {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form text such as "45 minutes" or "1.5 hours".
    pub duration: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl ClinicService {
    pub fn new(name: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            duration: duration.into(),
            is_active: true,
        }
    }
}
