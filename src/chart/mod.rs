mod assets;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, response::Html, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::snapshot::{ColumnEntry, Snapshot, SnapshotError};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 60967;

pub struct ChartConfig {
    pub map_name: String,
    pub language: String,
    pub snapshot: Snapshot,
    pub host: String,
    pub port: u16,
}

/// One language column prepared for colouring.
#[derive(Clone, Debug, Serialize)]
pub struct ChartData {
    pub map: String,
    pub language: String,
    pub min: f64,
    pub max: f64,
    pub regions: Vec<ColumnEntry>,
}

impl ChartData {
    pub fn from_snapshot(
        map: &str,
        snapshot: &Snapshot,
        language: &str,
    ) -> Result<Self, SnapshotError> {
        let regions = snapshot.column(language)?;
        let (min, max) = regions
            .iter()
            .filter_map(|entry| entry.value)
            .fold(None, |range: Option<(f64, f64)>, value| match range {
                Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
                None => Some((value, value)),
            })
            .unwrap_or((0.0, 0.0));
        Ok(Self {
            map: map.to_string(),
            language: language.to_string(),
            min,
            max,
            regions,
        })
    }
}

/// Serves the chart page until Ctrl+C. Fails before binding when the
/// language is not a snapshot column.
pub async fn serve(config: ChartConfig) -> Result<()> {
    let ChartConfig {
        map_name,
        language,
        snapshot,
        host,
        port,
    } = config;

    let data = Arc::new(ChartData::from_snapshot(&map_name, &snapshot, &language)?);

    let router = Router::new()
        .route("/", get(index))
        .route("/api/column", get(column))
        .with_state(data);

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind chart server on {host}:{port}"))?;
    info!(%host, port, %language, "chart server listening");
    println!("Chart for '{language}' live at http://{host}:{port} (Ctrl+C to stop)");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down chart server");
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn column(State(data): State<Arc<ChartData>>) -> Json<ChartData> {
    Json(data.as_ref().clone())
}
