use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ai::responder::{Language, Provider};
use crate::core::db::DbBackend;

pub mod ask;
mod repl;
pub mod serve;
pub mod sql;
pub mod summarize;

#[derive(Subcommand)]
enum Command {
    /// Chat with a SQL database in plain language
    Sql {
        #[arg(long, value_enum, default_value = "mysql")]
        backend: DbBackend,
        /// MySQL host and port
        #[arg(long, default_value = "localhost:3306")]
        host: String,
        /// MySQL user
        #[arg(long, default_value = "root")]
        user: String,
        /// MySQL password, falls back to $MYSQL_PASSWORD
        #[arg(long)]
        password: Option<String>,
        /// MySQL database name
        #[arg(long)]
        database: Option<String>,
        /// Path to a SQLite database file
        #[arg(long)]
        sqlite_path: Option<String>,
        /// Groq API key, falls back to $GROQ_API_KEY
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Summarize a web page or Wikipedia article
    Summarize {
        #[arg(long)]
        url: String,
        #[arg(long, value_enum, default_value = "english")]
        language: Language,
        /// Groq API key, falls back to $GROQ_API_KEY
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Start a question and answer chat session
    Ask {
        #[arg(long, value_enum, default_value = "groq")]
        provider: Provider,
        /// Model name, defaults to the provider's first model
        #[arg(long)]
        model: Option<String>,
        #[arg(long, default_value = "0.7")]
        temperature: f32,
        #[arg(long, default_value = "150")]
        max_tokens: u32,
        /// Provider API key, falls back to $GROQ_API_KEY or
        /// $HUGGINGFACE_API_KEY
        #[arg(long)]
        api_key: Option<String>,
        /// Print answers as they are generated (Groq only)
        #[arg(long, action, default_value = "false")]
        stream: bool,
    },
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // The server sets up its own logging
    if !matches!(args.command, Some(Command::Serve { .. }) | None) {
        init_tracing();
    }

    // Handle each sub command
    match args.command {
        Some(Command::Sql {
            backend,
            host,
            user,
            password,
            database,
            sqlite_path,
            api_key,
        }) => {
            let fields = sql::SqlArgs {
                backend,
                host,
                user,
                password,
                database,
                sqlite_path,
                api_key,
            };
            sql::run(fields).await?;
        }
        Some(Command::Summarize {
            url,
            language,
            api_key,
        }) => {
            summarize::run(url, language, api_key).await?;
        }
        Some(Command::Ask {
            provider,
            model,
            temperature,
            max_tokens,
            api_key,
            stream,
        }) => {
            let args = ask::AskArgs {
                provider,
                model,
                temperature,
                max_tokens,
                api_key,
                stream,
            };
            ask::run(args).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        None => {}
    }

    Ok(())
}
