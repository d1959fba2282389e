//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use crate::db::MySqlDatabase;
use crate::http_server::HttpServer;
use crate::route::{Engine, EngineBuilder};

use super::args::{Cli, Command};
use super::config::AppConfig;
use super::errors::{CliError, CliResult};

/// Parse arguments, set up logging, dispatch
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    crate::observability::init_tracing(cli.log.as_deref());
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(&config, port),
        Command::Check { config } => check(&config),
    }
}

fn engine_builder(config: &AppConfig) -> EngineBuilder {
    Engine::builder()
        .config(config.engine)
        .declarations(config.paths.clone())
}

/// Build the engine without a database and print its routes
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    let engine = engine_builder(&config).build()?;
    for line in route_listing(&engine) {
        println!("{}", line);
    }
    println!("{} route(s) OK", engine.route_count());
    Ok(())
}

/// One "METHOD /path" line per route
pub fn route_listing(engine: &Engine) -> Vec<String> {
    engine
        .route_keys()
        .into_iter()
        .map(|(method, path)| format!("{:<7} {}", method.as_str(), path))
        .collect()
}

/// Connect to the database and serve until Ctrl-C
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = AppConfig::load(config_path)?;
    if let Some(port) = port {
        if port == 0 {
            return Err(CliError::config_error("--port must be > 0"));
        }
        config.server.port = port;
    }
    let db_config = config.require_database()?.clone();

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let database = MySqlDatabase::connect(&db_config.url, db_config.max_connections).await?;
        let engine = engine_builder(&config).database(Arc::new(database)).build()?;
        tracing::info!(routes = engine.route_count(), "engine ready");

        // bind and accept failures surface as ACTIONAPI_IO_ERROR
        HttpServer::new(Arc::new(engine), config.server.clone())
            .start()
            .await?;
        Ok::<(), CliError>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_check_lists_declared_routes() {
        let file = write_config(
            r#"{"paths": {
                "GET,POST /orders": "SELECT * FROM orders",
                "DELETE /orders/item": {"query": "DELETE FROM orders WHERE id = ?", "params": "id"}
            }}"#,
        );
        check(file.path()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        let engine = engine_builder(&config).build().unwrap();
        assert_eq!(
            route_listing(&engine),
            vec![
                "GET     /orders",
                "POST    /orders",
                "DELETE  /orders/item",
            ]
        );
    }

    #[test]
    fn test_check_reports_bad_declaration() {
        let file = write_config(r#"{"paths": {"GET /x": {"func": "not_registered"}}}"#);
        let err = check(file.path()).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::RouteError);
    }

    #[test]
    fn test_serve_requires_database() {
        let file = write_config("{}");
        let err = serve(file.path(), None).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }
}
