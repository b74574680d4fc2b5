pub mod sql;
pub use sql::{ListTablesTool, QuerySqlTool, TableInfoTool};
