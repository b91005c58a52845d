pub mod error;
pub mod text2sql;

pub use error::Text2SqlError;
pub use text2sql::{
    FormatDecision, GeneratedSql, OutputFormat, Plan, Text2SqlAgent, Text2SqlConfig,
};
