use crate::adapters::{RequestData, ResponseData, gzip_decompress};
use crate::config::ClientConfig;
use crate::core::breaker::CircuitBreaker;
use crate::core::errors::BidderError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Execution seam under the bidder client. Production uses reqwest;
/// tests swap in scripted transports so auction timing and failure
/// behavior is exercised without sockets
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, anyhow::Error>;
}

pub struct TransportRequest {
    pub method: reqwest::Method,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

pub struct TransportResponse {
    pub status: u16,
    pub content_encoding: Option<String>,
    pub body: Bytes,
}

/// Production transport over a shared connection pool. One pool per
/// partner host, no redirects, no retries; retrying into a bidder
/// that already priced an auction double counts their spend
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(cfg: &ClientConfig) -> Result<Self, anyhow::Error> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(cfg.connect_timeout)
            .pool_max_idle_per_host(cfg.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .tcp_keepalive(Some(Duration::from_secs(20)))
            .tcp_nodelay(true)
            .referer(false)
            .redirect(reqwest::redirect::Policy::none())
            // transfer decoding is handled above the transport so
            // body caps apply to the compressed stream
            .gzip(false)
            .deflate(false)
            .hickory_dns(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, anyhow::Error> {
        let mut headers = HeaderMap::with_capacity(request.headers.len());

        for (key, value) in &request.headers {
            let key: HeaderName = key.parse()?;
            let value = HeaderValue::from_str(value)?;
            headers.insert(key, value);
        }

        let response = self
            .client
            .request(request.method, &request.uri)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_encoding = response
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            content_encoding,
            body,
        })
    }
}

/// Everything the dispatcher needs to know about one finished
/// callout. `response` present means the adapter should parse it
pub struct CalloutOutcome {
    pub response: Option<ResponseData>,
    pub http_status: Option<u16>,
    pub error: Option<BidderError>,
    pub timed_out: bool,
    pub latency: Duration,
}

impl CalloutOutcome {
    fn failed(error: BidderError, timed_out: bool, latency: Duration) -> Self {
        Self {
            response: None,
            http_status: None,
            error: Some(error),
            timed_out,
            latency,
        }
    }
}

/// Executes adapter produced callouts with the deadline, breaker,
/// size cap, and transfer encoding policy applied uniformly across
/// every partner
pub struct BidderClient {
    transport: Arc<dyn Transport>,
    breaker: Arc<dyn CircuitBreaker>,
    cfg: ClientConfig,
    safety_margin: Duration,
}

impl BidderClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        breaker: Arc<dyn CircuitBreaker>,
        cfg: ClientConfig,
        safety_margin: Duration,
    ) -> Self {
        Self {
            transport,
            breaker,
            cfg,
            safety_margin,
        }
    }

    fn decode_body(&self, response: TransportResponse) -> Result<ResponseData, BidderError> {
        if response.body.len() > self.cfg.max_response_body_compressed {
            return Err(BidderError::bad_server_response(format!(
                "response body {} bytes exceeds wire cap",
                response.body.len()
            )));
        }

        let gzipped = response
            .content_encoding
            .as_deref()
            .map(|enc| enc.eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);

        let body = if gzipped {
            let inflated = gzip_decompress(&response.body, self.cfg.max_response_body)
                .map_err(|e| BidderError::bad_server_response(e.to_string()))?;

            Bytes::from(inflated)
        } else {
            if response.body.len() > self.cfg.max_response_body {
                return Err(BidderError::bad_server_response(format!(
                    "response body {} bytes exceeds cap",
                    response.body.len()
                )));
            }

            response.body
        };

        Ok(ResponseData {
            status: response.status,
            body,
        })
    }

    /// Issue one callout inside the auction deadline.
    ///
    /// # Behavior
    /// * Open circuit: synthetic transport error, no wire activity
    /// * Budget is `min(remaining auction time, bidder tmax)` minus
    ///   the safety margin; an exhausted budget records a timeout
    ///   without dispatching
    /// * Network/timeout feed the breaker a failure; any status
    ///   below 500 feeds a success
    pub async fn send(
        &self,
        bidder: &str,
        data: &RequestData,
        auction_deadline: tokio::time::Instant,
        bidder_tmax: Duration,
    ) -> CalloutOutcome {
        if !self.breaker.allow(bidder) {
            debug!("Circuit open for {}, skipping callout", bidder);

            return CalloutOutcome::failed(
                BidderError::transport("circuit open"),
                false,
                Duration::ZERO,
            );
        }

        if data.body.len() > self.cfg.max_request_body {
            return CalloutOutcome::failed(
                BidderError::bad_input(format!(
                    "request body {} bytes exceeds cap",
                    data.body.len()
                )),
                false,
                Duration::ZERO,
            );
        }

        let now = tokio::time::Instant::now();
        let remaining = auction_deadline.saturating_duration_since(now);
        let budget = remaining.min(bidder_tmax).saturating_sub(self.safety_margin);

        if budget.is_zero() {
            return CalloutOutcome::failed(BidderError::timeout(), true, Duration::ZERO);
        }

        let mut headers: Vec<(String, String)> = data
            .headers
            .iter()
            .map(|h| (h.key.to_string(), h.value.clone()))
            .collect();

        if !data.has_header("accept-encoding") {
            headers.push(("accept-encoding".to_string(), "gzip".to_string()));
        }

        let request = TransportRequest {
            method: data.method.clone(),
            uri: data.uri.clone(),
            headers,
            body: data.body.clone(),
        };

        let started = tokio::time::Instant::now();
        let result = tokio::time::timeout(budget, self.transport.execute(request)).await;
        let latency = started.elapsed();

        match result {
            Err(_elapsed) => {
                trace!("Callout to {} timed out after {:?}", bidder, latency);
                self.breaker.record_result(bidder, false);

                CalloutOutcome::failed(BidderError::timeout(), true, latency)
            }
            Ok(Err(e)) => {
                self.breaker.record_result(bidder, false);

                CalloutOutcome::failed(
                    BidderError::transport(format!("{:#}", e)),
                    false,
                    latency,
                )
            }
            Ok(Ok(response)) => {
                let status = response.status;
                self.breaker.record_result(bidder, status < 500);

                match self.decode_body(response) {
                    Ok(decoded) => CalloutOutcome {
                        response: Some(decoded),
                        http_status: Some(status),
                        error: None,
                        timed_out: false,
                        latency,
                    },
                    Err(e) => CalloutOutcome {
                        response: None,
                        http_status: Some(status),
                        error: Some(e),
                        timed_out: false,
                        latency,
                    },
                }
            }
        }
    }
}
