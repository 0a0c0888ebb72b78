pub mod aliases;
pub mod columns;
pub mod validator;

pub use aliases::AliasTable;
pub use columns::{canonicalize_column, ColumnSchema, ColumnType};
pub use validator::{validate, ColumnMapping, ValidationResult};
