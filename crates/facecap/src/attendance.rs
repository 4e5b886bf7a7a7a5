//! Attendance data client.
//!
//! The attendance backend exposes a single endpoint, `POST /datos_csv`,
//! returning the day's recognition log. The response is a JSON object with
//! one empty-string key wrapping `{ success, registros }`; each registro
//! carries split time/date fields that this module folds into display
//! strings, matching how the dashboard consumed them. One call, no retry,
//! no pagination, no auth.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::config::AttendanceConfig;
use crate::error::{Error, Result};

/// One attendance entry, ready for display or export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    /// Backend-assigned record id.
    pub id: i64,
    /// Person's name, whitespace-trimmed.
    pub name: String,
    /// National id / document number.
    pub document_id: String,
    /// Entry time, `HH:MM:SS`.
    pub time: String,
    /// Entry date, `D/M/YYYY`.
    pub date: String,
    /// Department the person belongs to.
    pub department: String,
}

/// The whole response body: a single empty-string key wraps the payload.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "")]
    payload: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    success: bool,
    #[serde(default)]
    registros: Vec<WireRecord>,
}

/// A registro as the backend emits it.
#[derive(Debug, Deserialize)]
struct WireRecord {
    id: i64,
    nombre: String,
    #[serde(deserialize_with = "string_or_number")]
    cedula: String,
    hora: u32,
    minutos: u32,
    segundos: u32,
    dia: u32,
    mes: u32,
    #[serde(rename = "año")]
    anio: i32,
    departamento: String,
}

/// The backend is loose about numeric vs string ids; accept either.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

impl From<WireRecord> for AttendanceRecord {
    fn from(wire: WireRecord) -> Self {
        Self {
            id: wire.id,
            name: wire.nombre.trim().to_string(),
            document_id: wire.cedula,
            time: format!("{:02}:{:02}:{:02}", wire.hora, wire.minutos, wire.segundos),
            date: format!("{}/{}/{}", wire.dia, wire.mes, wire.anio),
            department: wire.departamento,
        }
    }
}

/// Decode a response body into attendance records.
///
/// # Errors
///
/// Returns a decode error if the body is not the expected envelope or the
/// payload reports `success == false`.
pub fn decode_response(body: &str) -> Result<Vec<AttendanceRecord>> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|err| Error::attendance_decode(err.to_string()))?;

    if !envelope.payload.success {
        return Err(Error::attendance_decode("endpoint reported success = false"));
    }

    Ok(envelope
        .payload
        .registros
        .into_iter()
        .map(AttendanceRecord::from)
        .collect())
}

/// Client for the attendance endpoint.
#[derive(Debug, Clone)]
pub struct AttendanceClient {
    base_url: String,
    http: reqwest::Client,
}

impl AttendanceClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &AttendanceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// The endpoint URL this client posts to.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/datos_csv", self.base_url)
    }

    /// Fetch today's attendance records.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success HTTP status,
    /// or an unexpected response body.
    pub async fn fetch_records(&self) -> Result<Vec<AttendanceRecord>> {
        let url = self.endpoint();
        debug!(%url, "fetching attendance records");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .body("")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::AttendanceStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let records = decode_response(&body)?;
        info!(count = records.len(), "attendance records fetched");
        Ok(records)
    }
}
