use serde::{Deserialize, Serialize};

/// Name/value metadata pair attached to a packet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProperty {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl UserProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// User properties as they go on the wire.
///
/// Entries with an empty name are form rows the user never filled in and
/// are dropped; everything else is kept in order, duplicates included.
pub fn effective_user_properties(properties: &[UserProperty]) -> Vec<(String, String)> {
    properties
        .iter()
        .filter(|p| !p.name.is_empty())
        .map(|p| (p.name.clone(), p.value.clone()))
        .collect()
}
