use crate::core::db::SqlDatabase;
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};
use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json;

// Tool output beyond this many characters is cut off so a large result
// set doesn't blow up the context window
const MAX_OUTPUT_CHARS: usize = 4000;

fn truncate(out: String) -> String {
    if out.chars().count() <= MAX_OUTPUT_CHARS {
        return out;
    }
    let mut truncated: String = out.chars().take(MAX_OUTPUT_CHARS).collect();
    truncated.push_str("... (truncated)");
    truncated
}

#[derive(Serialize)]
pub struct NoProps {}

#[derive(Serialize)]
pub struct ListTablesTool {
    pub r#type: ToolType,
    pub function: Function<NoProps>,
    #[serde(skip)]
    db: SqlDatabase,
}

#[async_trait]
impl ToolCall for ListTablesTool {
    async fn call(&self, _args: &str) -> Result<String, Error> {
        let tables = self.db.table_names().await?;
        Ok(tables.join(", "))
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl ListTablesTool {
    pub fn new(db: &SqlDatabase) -> Self {
        let function = Function {
            name: String::from("sql_db_list_tables"),
            description: String::from(
                "Returns a comma-separated list of tables in the database. Use this first to see what tables exist.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: NoProps {},
                required: vec![],
                additional_properties: false,
            },
            strict: true,
        };
        Self {
            r#type: ToolType::Function,
            function,
            db: db.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct TableInfoProps {
    pub table_names: Property,
}

#[derive(Deserialize)]
pub struct TableInfoArgs {
    pub table_names: String,
}

#[derive(Serialize)]
pub struct TableInfoTool {
    pub r#type: ToolType,
    pub function: Function<TableInfoProps>,
    #[serde(skip)]
    db: SqlDatabase,
}

#[async_trait]
impl ToolCall for TableInfoTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: TableInfoArgs = serde_json::from_str(args)
            .map_err(|e| anyhow!("Invalid arguments for {}: {}", self.function.name, e))?;
        let tables: Vec<String> = fn_args
            .table_names
            .split(',')
            .map(|t| t.trim().trim_matches('`').trim_matches('"').to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let info = self.db.table_info(&tables).await?;
        Ok(truncate(info))
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl TableInfoTool {
    pub fn new(db: &SqlDatabase) -> Self {
        let function = Function {
            name: String::from("sql_db_schema"),
            description: String::from(
                "Returns the schema and sample rows for the given tables. Only use this when you need to understand a table's structure. Be sure the tables exist by calling sql_db_list_tables first.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: TableInfoProps {
                    table_names: Property {
                        r#type: String::from("string"),
                        description: String::from(
                            "A comma-separated list of table names, e.g. `students, courses`.",
                        ),
                        r#enum: None,
                    },
                },
                required: vec![String::from("table_names")],
                additional_properties: false,
            },
            strict: true,
        };
        Self {
            r#type: ToolType::Function,
            function,
            db: db.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct QuerySqlProps {
    pub query: Property,
}

#[derive(Deserialize)]
pub struct QuerySqlArgs {
    pub query: String,
}

#[derive(Serialize)]
pub struct QuerySqlTool {
    pub r#type: ToolType,
    pub function: Function<QuerySqlProps>,
    #[serde(skip)]
    db: SqlDatabase,
}

#[async_trait]
impl ToolCall for QuerySqlTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: QuerySqlArgs = serde_json::from_str(args)
            .map_err(|e| anyhow!("Invalid arguments for {}: {}", self.function.name, e))?;
        let rows = self.db.run(&fn_args.query).await?;
        Ok(truncate(rows.to_tuples()))
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl QuerySqlTool {
    pub fn new(db: &SqlDatabase) -> Self {
        let function = Function {
            name: String::from("sql_db_query"),
            description: String::from(
                "Executes a detailed and correct SQL query and returns the result. If the query is not correct an error message is returned; rewrite the query, check it, and try again. If you get an error about an unknown column, use sql_db_schema to look up the correct table fields.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: QuerySqlProps {
                    query: Property {
                        r#type: String::from("string"),
                        description: String::from("The SQL query to run."),
                        r#enum: None,
                    },
                },
                required: vec![String::from("query")],
                additional_properties: false,
            },
            strict: true,
        };
        Self {
            r#type: ToolType::Function,
            function,
            db: db.clone(),
        }
    }
}
