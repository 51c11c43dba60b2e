use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, AppState, SharedState};
use super::db::{SqliteStore, StoreHandle};
use super::hooks::{ActivityLogHook, HookRegistry};
use super::registry;
use super::service::GatewayOptions;
use crate::config::DocgateConfig;

/// Configuration for the gateway server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub schema_file: Option<PathBuf>,
    pub cors_permissive: bool,
    pub options: GatewayOptions,
    pub default_user: String,
    pub activity_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_config(&DocgateConfig::default())
    }
}

impl ServerConfig {
    pub fn from_config(config: &DocgateConfig) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            db_path: config.store.db_path.clone(),
            schema_file: config.store.schema_file.clone(),
            cors_permissive: config.server.cors_permissive,
            options: config.gateway_options(),
            default_user: config.context.default_user.clone(),
            activity_log: config.hooks.activity_log,
        }
    }
}

/// Open (creating if needed) the store at `config.db_path` and register the
/// schema file's record types into it.
pub fn open_store(config: &ServerConfig) -> Result<SqliteStore> {
    if let Some(parent) = config.db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let store = SqliteStore::new(&config.db_path).context("Failed to initialize document store")?;
    if let Some(ref schema_file) = config.schema_file {
        let schemas = registry::load_schema_file(schema_file)?;
        registry::register_all(&store, &schemas)?;
    }
    Ok(store)
}

pub fn build_state(config: &ServerConfig, store: SqliteStore) -> SharedState {
    let mut hooks = HookRegistry::new();
    if config.activity_log {
        hooks.register("*", Arc::new(ActivityLogHook));
    }
    Arc::new(AppState {
        store: StoreHandle::new(store),
        options: Arc::new(config.options.clone()),
        hooks: Arc::new(hooks),
        default_user: config.default_user.clone(),
    })
}

/// Build the full application router with request tracing.
pub fn build_router(state: SharedState, cors_permissive: bool) -> Router {
    let mut app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Start the gateway server and serve until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let store = open_store(&config)?;
    let state = build_state(&config, store);
    let app = build_router(state, config.cors_permissive);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(
        addr = %local_addr,
        db_path = %config.db_path.display(),
        "docgate listening on http://{}",
        local_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SCHEMAS: &str = r#"
- name: Customer
  title_field: customer_name
  fields:
    - fieldname: customer_name
      fieldtype: Data
- name: Lead
  autoname: "LEAD-.####"
  fields:
    - fieldname: lead_name
      fieldtype: Data
      reqd: 1
    - fieldname: customer
      fieldtype: Link
      options: Customer
"#;

    fn test_config(dir: &TempDir) -> ServerConfig {
        let schema_file = dir.path().join("types.yaml");
        std::fs::write(&schema_file, SCHEMAS).unwrap();
        ServerConfig {
            db_path: dir.path().join("data").join("docgate.db"),
            schema_file: Some(schema_file),
            ..ServerConfig::default()
        }
    }

    fn test_router(dir: &TempDir) -> Router {
        let config = test_config(dir);
        let store = open_store(&config).unwrap();
        build_router(build_state(&config, store), false)
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("docgate.db"));
        assert!(config.schema_file.is_none());
        assert!(!config.cors_permissive);
        assert!(config.activity_log);
    }

    #[test]
    fn test_open_store_registers_schema_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let store = open_store(&config).unwrap();
        assert!(config.db_path.exists());
        use crate::gateway::store::DocumentStore;
        assert!(store.get_schema("Lead").unwrap().is_some());
    }

    #[test]
    fn test_build_state_registers_activity_hook() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        let state = build_state(&config, open_store(&config).unwrap());
        assert_eq!(state.hooks.len(), 1);

        config.activity_log = false;
        let state = build_state(&config, SqliteStore::new_in_memory().unwrap());
        assert!(state.hooks.is_empty());
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let dir = TempDir::new().unwrap();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = test_router(&dir).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_insert_then_list_via_full_router() {
        let dir = TempDir::new().unwrap();
        let app = test_router(&dir);

        let create = Request::builder()
            .method("POST")
            .uri("/api/resource/Customer")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"customer_name": "Acme"}).to_string()))
            .unwrap();
        let resp = app.clone().oneshot(create).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let customer = body_json(resp).await["data"]["data"]["name"]
            .as_str()
            .unwrap()
            .to_string();

        let create = Request::builder()
            .method("POST")
            .uri("/api/resource/Lead")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"lead_name": "First", "customer": customer}).to_string(),
            ))
            .unwrap();
        let resp = app.clone().oneshot(create).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["data"]["name"], "LEAD-0001");

        let list = Request::builder()
            .uri("/api/method/list_data?doctype=Lead&fields=%5B%22lead_name%22%2C%22customer%22%5D")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(list).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["counts"], 1);
        assert_eq!(body["data"]["data"][0]["customer_data"]["customer_name"], "Acme");
    }

    #[tokio::test]
    async fn test_permissive_cors_layer() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let app = build_router(build_state(&config, open_store(&config).unwrap()), true);
        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
