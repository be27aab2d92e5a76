use std::fmt;

use serde::Serialize;

/// Non-fatal finding recorded while resolving a config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A key outside the section's allow-list; the value was dropped.
    UnknownOption { section: String, key: String },
    /// An instance section past `vm_nb`; the section was skipped.
    InstanceLimitExceeded { section: String, limit: u32 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOption { section, key } => {
                write!(f, "[{section}] unknown option {key:?} ignored")
            }
            Self::InstanceLimitExceeded { section, limit } => {
                write!(f, "[{section}] skipped: instance limit vm_nb={limit} reached")
            }
        }
    }
}
