// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP JSON-RPC probe client
//!
//! This module provides the `reqwest`-backed implementation of the [`RpcProbe`] trait. Every
//! request carries its own deadline; the client keeps no per-endpoint state.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use reqwest::{Client, StatusCode};
use rpc_client::{
    CapabilityProbe, ErrorClassifier, ForwardResponse, JsonRpcRequest, JsonRpcResponse,
    ProbeError, RpcErrorClass, RpcProbe,
};
use serde::Serialize;
use serde_json::{Value, json};
use shared_types::Endpoint;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::{
    config::ResolverConfig,
    error::{ResolverError, ResolverResult},
    metrics,
};

/// Method used by the availability probe
pub const AVAILABILITY_METHOD: &str = "eth_blockNumber";

/// Configuration for the HTTP probe client
#[derive(Debug, Clone)]
pub struct HttpProbeConfig {
    /// Deadline for probes and plain calls
    pub request_timeout: Duration,
    /// Deadline for forwarded client requests
    pub proxy_timeout: Duration,
    /// HTTP user agent
    pub user_agent: String,
}

impl From<&ResolverConfig> for HttpProbeConfig {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            proxy_timeout: config.proxy_timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// JSON-RPC over HTTP POST
#[derive(Debug)]
pub struct HttpProbeClient {
    client: Client,
    config: HttpProbeConfig,
    classifier: ErrorClassifier,
    next_id: AtomicU64,
}

impl HttpProbeClient {
    /// Create a new probe client
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Config` if the HTTP client cannot be created.
    pub fn new(config: HttpProbeConfig, classifier: ErrorClassifier) -> ResolverResult<Self> {
        let client = Client::builder()
            .timeout(config.proxy_timeout.max(config.request_timeout))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ResolverError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            classifier,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a probe client from resolver settings
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Config` if the phrase list or HTTP client is invalid.
    pub fn from_config(config: &ResolverConfig) -> ResolverResult<Self> {
        Self::new(HttpProbeConfig::from(config), config.classifier()?)
    }

    /// Current settings
    pub fn config(&self) -> &HttpProbeConfig {
        &self.config
    }

    /// POST a JSON body and read the whole response within `deadline`
    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: &B,
        deadline: Duration,
    ) -> Result<(StatusCode, String), ProbeError> {
        let exchange = async {
            let response = self
                .client
                .post(endpoint.as_str())
                .header("accept", "application/json")
                .json(body)
                .send()
                .await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        timeout(deadline, exchange)
            .await
            .map_err(|_| timeout_error(deadline))?
            .map_err(|e| {
                if e.is_timeout() {
                    timeout_error(deadline)
                } else {
                    ProbeError::Http {
                        message: e.to_string(),
                    }
                }
            })
    }

    /// Send a JSON-RPC request with the probe deadline
    async fn rpc(
        &self,
        endpoint: &Endpoint,
        method: &str,
        params: Value,
    ) -> Result<JsonRpcResponse, ProbeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        trace!(endpoint = %endpoint, method, id, "sending JSON-RPC request");

        let (status, text) = self
            .post(endpoint, &request, self.config.request_timeout)
            .await?;
        parse_rpc_response(status, &text)
    }

    async fn availability(&self, endpoint: &Endpoint) -> Result<String, ProbeError> {
        let response = self.rpc(endpoint, AVAILABILITY_METHOD, json!([])).await?;
        if let Some(error) = response.error {
            return Err(ProbeError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .hex_result()
            .map(ToString::to_string)
            .ok_or_else(|| ProbeError::InvalidResponse {
                message: format!("{AVAILABILITY_METHOD} did not return a hex quantity"),
            })
    }

    async fn capability(
        &self,
        endpoint: &Endpoint,
        probe: &CapabilityProbe,
    ) -> Result<(), ProbeError> {
        let response = self
            .rpc(endpoint, probe.method(), probe.params().clone())
            .await?;

        if let Some(error) = response.error {
            return match self.classifier.classify(&error.message) {
                RpcErrorClass::Unsupported => Err(ProbeError::MethodUnsupported {
                    method: probe.method().to_string(),
                    message: error.message,
                }),
                RpcErrorClass::Rejected => {
                    debug!(
                        endpoint = %endpoint,
                        method = probe.method(),
                        code = error.code,
                        message = %error.message,
                        "probe payload rejected, method is served"
                    );
                    Ok(())
                }
            };
        }

        if probe.expects_quantity() && response.hex_result().is_none() {
            return Err(ProbeError::InvalidResponse {
                message: format!("{} did not return a hex quantity", probe.method()),
            });
        }
        Ok(())
    }

    async fn plain_call(
        &self,
        endpoint: &Endpoint,
        method: &str,
        params: Value,
    ) -> Result<Value, ProbeError> {
        let response = self.rpc(endpoint, method, params).await?;
        if let Some(error) = response.error {
            return Err(ProbeError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response.result.ok_or_else(|| ProbeError::InvalidResponse {
            message: format!("{method} returned no result"),
        })
    }

    async fn forward_body(
        &self,
        endpoint: &Endpoint,
        body: &Value,
    ) -> Result<ForwardResponse, ProbeError> {
        let (status, text) = self
            .post(endpoint, body, self.config.proxy_timeout)
            .await?;
        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
            });
        }
        let body = serde_json::from_str(&text).map_err(|e| ProbeError::InvalidResponse {
            message: format!("upstream body is not JSON: {e}"),
        })?;
        Ok(ForwardResponse {
            status: status.as_u16(),
            body,
        })
    }
}

impl RpcProbe for HttpProbeClient {
    async fn check_availability(&self, endpoint: &Endpoint) -> Result<String, ProbeError> {
        let started = Instant::now();
        let result = self.availability(endpoint).await;
        observe("availability", &result, started);
        result
    }

    async fn check_capability(
        &self,
        endpoint: &Endpoint,
        probe: &CapabilityProbe,
    ) -> Result<(), ProbeError> {
        let started = Instant::now();
        let result = self.capability(endpoint, probe).await;
        observe("capability", &result, started);
        result
    }

    async fn call(
        &self,
        endpoint: &Endpoint,
        method: &str,
        params: Value,
    ) -> Result<Value, ProbeError> {
        let started = Instant::now();
        let result = self.plain_call(endpoint, method, params).await;
        observe("call", &result, started);
        result
    }

    async fn forward(
        &self,
        endpoint: &Endpoint,
        body: &Value,
    ) -> Result<ForwardResponse, ProbeError> {
        let started = Instant::now();
        let result = self.forward_body(endpoint, body).await;
        observe("forward", &result, started);
        result
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Decode a JSON-RPC answer, reading error objects from non-success responses too
fn parse_rpc_response(status: StatusCode, text: &str) -> Result<JsonRpcResponse, ProbeError> {
    match serde_json::from_str::<JsonRpcResponse>(text) {
        Ok(response) if status.is_success() || response.error.is_some() => Ok(response),
        Ok(_) => Err(ProbeError::Status {
            status: status.as_u16(),
        }),
        Err(_) if !status.is_success() => Err(ProbeError::Status {
            status: status.as_u16(),
        }),
        Err(e) => Err(ProbeError::InvalidResponse {
            message: format!("malformed JSON-RPC response: {e}"),
        }),
    }
}

fn timeout_error(deadline: Duration) -> ProbeError {
    ProbeError::Timeout {
        timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
    }
}

fn observe<T>(kind: &str, result: &Result<T, ProbeError>, started: Instant) {
    let label = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::observe_probe_duration(kind, label, started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_error_from_failed_status() {
        let response = parse_rpc_response(
            StatusCode::BAD_REQUEST,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        assert_eq!(response.error.unwrap().message, "Method not found");
    }

    #[test]
    fn parse_failed_status_without_error_object() {
        assert_eq!(
            parse_rpc_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            Err(ProbeError::Status { status: 502 })
        );
        assert_eq!(
            parse_rpc_response(StatusCode::SERVICE_UNAVAILABLE, r#"{"result":"0x1"}"#),
            Err(ProbeError::Status { status: 503 })
        );
    }

    #[test]
    fn parse_malformed_success_body() {
        assert!(matches!(
            parse_rpc_response(StatusCode::OK, "not json"),
            Err(ProbeError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn timeout_error_reports_milliseconds() {
        assert_eq!(
            timeout_error(Duration::from_secs(5)),
            ProbeError::Timeout { timeout_ms: 5000 }
        );
    }

    #[test]
    fn client_from_testing_config() {
        let client = HttpProbeClient::from_config(&ResolverConfig::for_testing()).unwrap();
        assert_eq!(client.name(), "http");
        assert_eq!(client.config().proxy_timeout, Duration::from_secs(2));
    }
}
