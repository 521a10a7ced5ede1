//! Sync command: run one session against a server.

use reqwest::blocking::Client;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use swipetax_log::{FileStore, LocalRecords, MutationLog};
use swipetax_protocol::DeviceId;
use swipetax_sync::{
    HttpClient, HttpRemote, HttpResponse, StaticCredential, SyncConfig, SyncEngine,
};
use uuid::Uuid;

/// HTTP client backed by reqwest.
struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }
}

impl HttpClient for ReqwestClient {
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<HttpResponse, String> {
        let mut request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .timeout(timeout)
            .body(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

/// Runs one sync session and prints the report.
pub fn run(
    dir: &Path,
    base_url: &str,
    device_id: Option<&str>,
    token: Option<String>,
    format: &str,
) -> Result<(), Box<dyn Error>> {
    let device_id = match device_id {
        Some(raw) => DeviceId::from_uuid(Uuid::parse_str(raw)?),
        None => {
            let generated = DeviceId::generate();
            tracing::warn!(%generated, "no --device-id given, using an ephemeral one");
            generated
        }
    };

    let log = Arc::new(MutationLog::open(Box::new(FileStore::open(
        &super::mutations_path(dir),
    )?))?);
    let records = Arc::new(LocalRecords::open(Box::new(FileStore::open(
        &super::records_path(dir),
    )?))?);

    let config = SyncConfig::new(device_id);
    let credentials: Arc<StaticCredential> = Arc::new(match token {
        Some(token) => StaticCredential::new(token),
        None => StaticCredential::anonymous(),
    });
    let remote = HttpRemote::new(
        base_url,
        ReqwestClient::new()?,
        credentials,
        config.push_timeout,
    );

    let engine = SyncEngine::new(config, remote, log, records);
    engine.set_online(true);
    let report = engine.sync();

    match format {
        "json" => {
            let value = serde_json::json!({
                "outcome": format!("{:?}", report.outcome),
                "pushed": report.pushed,
                "pulled": report.pulled,
                "conflicts_resolved": report.conflicts_resolved,
                "push_failures": report.push_failures,
                "error": report.error,
                "duration_ms": report.duration.as_millis(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            println!("Outcome: {:?}", report.outcome);
            println!("Pushed: {}", report.pushed);
            println!("Pulled: {}", report.pulled);
            println!("Conflicts resolved: {}", report.conflicts_resolved);
            if report.push_failures > 0 {
                println!("Push failures: {}", report.push_failures);
            }
            if let Some(error) = &report.error {
                println!("Error: {error}");
            }
            println!("Duration: {:?}", report.duration);
        }
    }

    if report.succeeded() {
        Ok(())
    } else {
        Err(report
            .error
            .unwrap_or_else(|| "sync did not complete".to_string())
            .into())
    }
}
