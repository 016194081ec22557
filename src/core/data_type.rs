use serde::{Deserialize, Serialize};

/// Column type as inferred from loaded data. Mixed columns degrade to Text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Real,
    Text,
    Boolean,
}
