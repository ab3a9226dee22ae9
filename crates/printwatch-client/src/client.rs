//! HTTP client for the Moonraker API
//!
//! The controller endpoint is read from a watch channel each time a request
//! is built, so host/port changes take effect on the next request.

use printwatch_core::moonraker::{GCODE_SCRIPT_PATH, OBJECTS_QUERY_PATH, PRINTER_INFO_PATH};
use printwatch_core::{PrinterInfo, StatusQuery};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Default timeout for reads and waited commands
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for fire-and-forget commands
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Controller returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Where the controller's HTTP API lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEndpoint {
    pub host: String,
    pub port: u16,
}

impl ControllerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }
}

/// Read operations the poll scheduler needs from a controller
#[allow(async_fn_in_trait)]
pub trait ControllerApi {
    /// `GET /printer/info`
    async fn printer_info(&self) -> Result<PrinterInfo, ClientError>;

    /// `GET /printer/objects/query` for every object the reconciler merges
    async fn query_status(&self) -> Result<StatusQuery, ClientError>;
}

/// Moonraker client
#[derive(Clone)]
pub struct ControllerClient {
    http: reqwest::Client,
    endpoint: watch::Receiver<ControllerEndpoint>,
    command_timeout: Duration,
}

impl ControllerClient {
    /// Create a client with the default timeouts
    pub fn new(endpoint: watch::Receiver<ControllerEndpoint>) -> Result<Self, ClientError> {
        Self::with_timeouts(endpoint, DEFAULT_REQUEST_TIMEOUT, DEFAULT_COMMAND_TIMEOUT)
    }

    pub fn with_timeouts(
        endpoint: watch::Receiver<ControllerEndpoint>,
        request_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            http,
            endpoint,
            command_timeout,
        })
    }

    /// Endpoint requests are currently sent to
    pub fn endpoint(&self) -> ControllerEndpoint {
        self.endpoint.borrow().clone()
    }

    fn url(&self, path: &str) -> String {
        self.endpoint.borrow().url(path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response)
    }

    /// Run a G-code script on the controller
    ///
    /// With `wait == false` the request uses the short command timeout and the
    /// response body is ignored. With `wait == true` it uses the client's
    /// default timeout and waits for the controller to finish the script.
    ///
    /// Failures are logged here; callers that do not care can drop the result.
    pub async fn send_command(&self, wait: bool, command: &str) -> Result<(), ClientError> {
        let url = self.url(GCODE_SCRIPT_PATH);
        let mut request = self.http.get(&url).query(&[("script", command)]);
        if !wait {
            request = request.timeout(self.command_timeout);
        }

        let result = Self::dispatch(request, wait).await;
        match &result {
            Ok(()) => debug!(command = %command, wait, "Sent G-code"),
            Err(e) => warn!(command = %command, wait, error = %e, "Failed to send G-code"),
        }
        result
    }

    async fn dispatch(request: reqwest::RequestBuilder, wait: bool) -> Result<(), ClientError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        if wait {
            response.bytes().await?;
        }
        Ok(())
    }
}

impl ControllerApi for ControllerClient {
    async fn printer_info(&self) -> Result<PrinterInfo, ClientError> {
        let body = self.get(PRINTER_INFO_PATH).await?.bytes().await?;
        Ok(PrinterInfo::from_response(&body)?)
    }

    async fn query_status(&self) -> Result<StatusQuery, ClientError> {
        let body = self.get(OBJECTS_QUERY_PATH).await?.bytes().await?;
        Ok(StatusQuery::from_response(&body)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::extract::{Query, RawQuery};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    pub const READY_INFO: &str =
        r#"{"result": {"state": "ready", "state_message": "Printer is ready", "hostname": "voron"}}"#;

    pub const PRINTING_STATUS: &str = r#"{"result": {"eventtime": 100.0, "status": {
        "extruder": {"temperature": 214.9, "target": 215.0, "can_extrude": true},
        "heater_bed": {"temperature": 60.1, "target": 60.0},
        "toolhead": {"position": [120.0, 95.5, 3.2, 812.0], "homed_axes": "xyz"},
        "gcode_move": {"absolute_coordinates": true},
        "virtual_sdcard": {"progress": 0.25},
        "print_stats": {"filename": "benchy.gcode", "print_duration": 600.0,
                        "filament_used": 1520.4, "state": "printing"}
    }}}"#;

    /// Requests seen by a mock controller
    #[derive(Clone, Default)]
    pub struct Seen {
        pub scripts: Arc<Mutex<Vec<String>>>,
        pub queries: Arc<Mutex<Vec<String>>>,
    }

    /// Serve a fake Moonraker on an ephemeral local port
    pub async fn spawn_mock(
        info: (StatusCode, &'static str),
        status: (StatusCode, &'static str),
    ) -> (SocketAddr, Seen) {
        let seen = Seen::default();
        let scripts = seen.scripts.clone();
        let queries = seen.queries.clone();

        let app = Router::new()
            .route("/printer/info", get(move || async move { info }))
            .route(
                "/printer/objects/query",
                get(move |RawQuery(query): RawQuery| async move {
                    queries.lock().unwrap().push(query.unwrap_or_default());
                    status
                }),
            )
            .route(
                "/printer/gcode/script",
                get(move |Query(params): Query<HashMap<String, String>>| async move {
                    scripts
                        .lock()
                        .unwrap()
                        .push(params.get("script").cloned().unwrap_or_default());
                    (StatusCode::OK, r#"{"result": "ok"}"#)
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, seen)
    }

    pub fn client_for(addr: SocketAddr) -> (watch::Sender<ControllerEndpoint>, ControllerClient) {
        let (tx, rx) = watch::channel(ControllerEndpoint::new("127.0.0.1", addr.port()));
        (tx, ControllerClient::new(rx).unwrap())
    }

    /// A local port with nothing listening on it
    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = ControllerEndpoint::new("printer.local", 7125);
        assert_eq!(
            endpoint.url(PRINTER_INFO_PATH),
            "http://printer.local:7125/printer/info"
        );
    }

    #[tokio::test]
    async fn test_printer_info() {
        let (addr, _) = spawn_mock((StatusCode::OK, READY_INFO), (StatusCode::OK, "{}")).await;
        let (_tx, client) = client_for(addr);

        let info = client.printer_info().await.unwrap();
        assert_eq!(info.state, "ready");
        assert_eq!(info.state_message, "Printer is ready");
    }

    #[tokio::test]
    async fn test_query_status_requests_all_objects() {
        let (addr, seen) =
            spawn_mock((StatusCode::OK, READY_INFO), (StatusCode::OK, PRINTING_STATUS)).await;
        let (_tx, client) = client_for(addr);

        let query = client.query_status().await.unwrap();
        assert_eq!(query.status.print_stats.unwrap().state.as_deref(), Some("printing"));
        assert_eq!(
            seen.queries.lock().unwrap().as_slice(),
            ["extruder&heater_bed&toolhead&gcode_move&virtual_sdcard&print_stats"]
        );
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let (addr, _) = spawn_mock(
            (StatusCode::SERVICE_UNAVAILABLE, r#"{"error": "Klippy Disconnected"}"#),
            (StatusCode::OK, "{}"),
        )
        .await;
        let (_tx, client) = client_for(addr);

        match client.printer_info().await {
            Err(ClientError::Status(code)) => assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE),
            other => panic!("expected status error, got {:?}", other.map(|i| i.state)),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (addr, _) = spawn_mock(
            (StatusCode::OK, r#"{"result": {"state": "ready"}}"#),
            (StatusCode::OK, "not json"),
        )
        .await;
        let (_tx, client) = client_for(addr);

        assert!(matches!(client.printer_info().await, Err(ClientError::Decode(_))));
        assert!(matches!(client.query_status().await, Err(ClientError::Decode(_))));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let port = closed_port().await;
        let (_tx, rx) = watch::channel(ControllerEndpoint::new("127.0.0.1", port));
        let client = ControllerClient::new(rx).unwrap();

        assert!(matches!(client.printer_info().await, Err(ClientError::Transport(_))));
        assert!(client.send_command(false, "G28").await.is_err());
    }

    #[tokio::test]
    async fn test_send_command_encodes_script() {
        let (addr, seen) = spawn_mock((StatusCode::OK, READY_INFO), (StatusCode::OK, "{}")).await;
        let (_tx, client) = client_for(addr);

        client.send_command(true, "G28").await.unwrap();
        client.send_command(true, "M117 50% & done").await.unwrap();
        client.send_command(false, "SET_HEATER_TEMPERATURE HEATER=extruder TARGET=200").await.unwrap();

        assert_eq!(
            seen.scripts.lock().unwrap().as_slice(),
            [
                "G28",
                "M117 50% & done",
                "SET_HEATER_TEMPERATURE HEATER=extruder TARGET=200"
            ]
        );
    }

    #[tokio::test]
    async fn test_send_command_timeouts() {
        assert!(DEFAULT_COMMAND_TIMEOUT < DEFAULT_REQUEST_TIMEOUT);

        // Controller that takes a while to run every script
        let app = Router::new().route(
            "/printer/gcode/script",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(800)).await;
                (StatusCode::OK, r#"{"result": "ok"}"#)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (_tx, rx) = watch::channel(ControllerEndpoint::new("127.0.0.1", addr.port()));
        let client = ControllerClient::with_timeouts(
            rx,
            Duration::from_secs(5),
            Duration::from_millis(200),
        )
        .unwrap();

        let start = std::time::Instant::now();
        match client.send_command(false, "G28").await {
            Err(ClientError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_millis(800));

        let start = std::time::Instant::now();
        client.send_command(true, "G28").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_endpoint_read_per_request() {
        let port = closed_port().await;
        let (tx, rx) = watch::channel(ControllerEndpoint::new("127.0.0.1", port));
        let client = ControllerClient::new(rx).unwrap();
        assert!(client.printer_info().await.is_err());

        let (addr, _) = spawn_mock((StatusCode::OK, READY_INFO), (StatusCode::OK, "{}")).await;
        tx.send_replace(ControllerEndpoint::new("127.0.0.1", addr.port()));

        assert_eq!(client.endpoint().port, addr.port());
        assert!(client.printer_info().await.is_ok());
    }
}
