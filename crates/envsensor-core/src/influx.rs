//! InfluxDB 1.x sink over HTTP.
//!
//! Points are written with the line protocol to `/write` at second
//! precision. Connection failures and 5xx answers are retryable; any other
//! rejection is not, since resending the same batch cannot succeed.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{FieldValue, Point};
use crate::traits::Sink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    /// Host name or full base URL (`https://influx.local`).
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8086,
            username: None,
            password: None,
            database: "envsensor".to_string(),
        }
    }
}

impl InfluxConfig {
    /// Base URL of the server, without a trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

pub struct InfluxSink {
    client: Client,
    base_url: String,
    config: InfluxConfig,
}

impl std::fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSink")
            .field("base_url", &self.base_url)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl InfluxSink {
    pub fn new(config: InfluxConfig) -> Result<Self> {
        if config.database.trim().is_empty() {
            return Err(Error::invalid_config("influxdb database must not be empty"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::sink(format!("building HTTP client: {e}"), false))?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(format!("{}{}", self.base_url, path));
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_deref()),
            None => builder,
        }
    }

    /// Create the target database if it does not exist.
    pub async fn ensure_database(&self) -> Result<()> {
        let database = self.config.database.replace('"', "\\\"");
        let statement = format!("CREATE DATABASE \"{database}\"");
        let response = self
            .request("/query")
            .query(&[("q", statement.as_str())])
            .send()
            .await
            .map_err(|e| unreachable_error(&self.base_url, e))?;
        check_status(response).await?;
        info!(database = %self.config.database, "influxdb database ready");
        Ok(())
    }
}

#[async_trait]
impl Sink for InfluxSink {
    async fn write_batch(&self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let body = line_protocol(points);
        let response = self
            .request("/write")
            .query(&[("db", self.config.database.as_str()), ("precision", "s")])
            .body(body)
            .send()
            .await
            .map_err(|e| unreachable_error(&self.base_url, e))?;
        check_status(response).await?;
        debug!(points = points.len(), "influxdb write accepted");
        Ok(())
    }
}

fn unreachable_error(url: &str, source: reqwest::Error) -> Error {
    Error::sink(format!("influxdb at {url} not reachable: {source}"), true)
}

async fn check_status(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::sink(
        format!("influxdb answered {}: {}", status, body.trim()),
        is_retryable_status(status),
    ))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Render points as InfluxDB line protocol, one line per point.
pub fn line_protocol(points: &[Point]) -> String {
    let mut out = String::new();
    for point in points {
        out.push_str(&escape(&point.measurement, &[',', ' ']));
        for (key, value) in &point.tags {
            let _ = write!(
                out,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }
        let mut first = true;
        for (key, value) in &point.fields {
            out.push(if first { ' ' } else { ',' });
            first = false;
            let key = escape(key, &[',', '=', ' ']);
            let _ = match value {
                FieldValue::Float(v) => write!(out, "{key}={v}"),
                FieldValue::Integer(v) => write!(out, "{key}={v}i"),
            };
        }
        let _ = writeln!(out, " {}", point.time.unix_timestamp());
    }
    out
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
