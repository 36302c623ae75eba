use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string (the database must host the AGE extension
    /// for graph scoring to contribute; everything degrades without it).
    pub database_url: String,

    /// Logical name of the AGE graph.
    pub graph_name: String,

    /// Connection pool size.
    pub max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            graph_name: env::var("GRAPH_NAME").unwrap_or_else(|_| "medmatch_graph".to_string()),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DB_MAX_CONNECTIONS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
