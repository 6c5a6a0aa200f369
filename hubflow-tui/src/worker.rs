//! Background worker thread: all HTTP calls run here.
//!
//! Communication with the TUI main thread is via `mpsc` channels, so a slow
//! or unreachable API never blocks drawing.

use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;

use hubflow_core::domain::AllocationRow;
use hubflow_runner::DistributionParams;

/// Commands sent from the TUI to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    FetchDistribution {
        api_url: String,
        params: DistributionParams,
    },
    Shutdown,
}

/// Responses sent from the worker back to the TUI.
#[derive(Debug, Clone)]
pub enum WorkerResponse {
    Distribution {
        rows: Vec<AllocationRow>,
        elapsed_ms: u64,
        params: DistributionParams,
    },
    Error {
        message: String,
        context: String,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The API answered with its `{"error": ...}` body.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin blocking client for the allocation API.
pub struct ApiClient {
    client: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hubflow-tui/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// `GET {api_url}/distribution` with the params as query string.
    pub fn distribution(
        &self,
        api_url: &str,
        params: &DistributionParams,
    ) -> Result<Vec<AllocationRow>, FetchError> {
        let url = format!("{}/distribution", api_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .map_err(|e| FetchError::Unreachable {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().map_err(|e| FetchError::Decode(e.to_string()))?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Spawn the background worker thread.
pub fn spawn_worker(
    rx: Receiver<WorkerCommand>,
    tx: Sender<WorkerResponse>,
) -> io::Result<JoinHandle<()>> {
    let client = ApiClient::new(Duration::from_secs(30))
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    thread::Builder::new()
        .name("hubflow-worker".into())
        .spawn(move || worker_loop(client, rx, tx))
}

fn worker_loop(client: ApiClient, rx: Receiver<WorkerCommand>, tx: Sender<WorkerResponse>) {
    loop {
        match rx.recv() {
            Ok(WorkerCommand::Shutdown) | Err(_) => break,
            Ok(WorkerCommand::FetchDistribution { api_url, params }) => {
                let resp = handle_fetch(&client, &api_url, params);
                if tx.send(resp).is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!("worker stopped");
}

fn handle_fetch(client: &ApiClient, api_url: &str, params: DistributionParams) -> WorkerResponse {
    let started = Instant::now();
    match client.distribution(api_url, &params) {
        Ok(rows) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            tracing::info!(rows = rows.len(), elapsed_ms, "distribution fetched");
            WorkerResponse::Distribution {
                rows,
                elapsed_ms,
                params,
            }
        }
        Err(e) => WorkerResponse::Error {
            message: e.to_string(),
            context: format!("GET {api_url}/distribution"),
        },
    }
}
