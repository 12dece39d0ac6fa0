//! Warehouse platform selection.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Warehouse platform the server is connected to.
///
/// The platform drives the tokenizer dialect used for write detection, the
/// catalog SQL issued by the schema tools, identifier quoting, and which
/// platform-only tools are offered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Snowflake,
    Clickzetta,
}

impl Platform {
    /// Human-readable product name used in tool descriptions.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Snowflake => "Snowflake database",
            Self::Clickzetta => "Clickzetta workspace/database",
        }
    }

    /// Quote an identifier the way the platform expects.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::Snowflake => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::Clickzetta => format!("`{}`", ident.replace('`', "``")),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snowflake => write!(f, "snowflake"),
            Self::Clickzetta => write!(f, "clickzetta"),
        }
    }
}
