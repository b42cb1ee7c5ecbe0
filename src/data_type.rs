use serde::{Deserialize, Serialize};

/// Represents the supported data types in the dataset schema.
/// These types define the structure of columns and the expected format of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// A 64-bit signed integer.
    Int,
    /// An exact decimal number, used for every monetary amount.
    Decimal,
    /// A variable-length UTF-8 character string.
    Text,
    /// A calendar date without time zone.
    Date,
}
