//! Typed client for the appointment resource API.
//!
//! The server keeps wall-clock times without an offset. They are read as local time and written
//! back the same way, so what the user sees is what the server stored.

use crate::api::{ApiEnvelope, REQUEST_FAILED};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "wire_time")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "wire_time")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
}

/// Fields for a new appointment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(serialize_with = "wire_time::serialize")]
    pub start_time: DateTime<Utc>,
    #[serde(serialize_with = "wire_time::serialize")]
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Partial update; only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "wire_time::serialize_option"
    )]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "wire_time::serialize_option"
    )]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    #[serde(with = "wire_time")]
    pub start: DateTime<Utc>,
    #[serde(with = "wire_time")]
    pub end: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Serialize)]
struct AvailabilityRequest {
    date: String,
    duration: u32,
}

mod wire_time {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Local wall-clock time without an offset, as the server stores it.
    pub fn format(t: &DateTime<Utc>) -> String {
        t.with_timezone(&Local)
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string()
    }

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(t))
    }

    pub fn serialize_option<S: Serializer>(
        t: &Option<DateTime<Utc>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => serialize(t, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time: {}", raw)))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Some(t.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| {
                // A time skipped by a DST jump has no local reading; take it as UTC.
                Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|| naive.and_utc())
            })
    }
}

pub struct AppointmentsClient {
    base_url: String,
    client: reqwest::Client,
}

impl AppointmentsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode the envelope whatever the status; error statuses carry `{success: false, error}`.
    async fn envelope<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> CoreResult<ApiEnvelope<T>> {
        let res = request.send().await?;
        let status = res.status();
        match res.json::<ApiEnvelope<T>>().await {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => {
                Err(CoreError::Api(REQUEST_FAILED.to_string()))
            }
            Err(e) => Err(CoreError::Http(e)),
        }
    }

    /// Scheduled appointments, optionally bounded by start/end.
    pub async fn list(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CoreResult<Vec<Appointment>> {
        let mut query = Vec::new();
        if let Some(start) = start {
            query.push(("start", wire_time::format(&start)));
        }
        if let Some(end) = end {
            query.push(("end", wire_time::format(&end)));
        }
        debug!(?start, ?end, "listing appointments");
        self.envelope(self.client.get(self.url("/appointments")).query(&query))
            .await?
            .into_data()
    }

    pub async fn create(&self, draft: &AppointmentDraft) -> CoreResult<Appointment> {
        self.envelope(self.client.post(self.url("/appointments")).json(draft))
            .await?
            .into_data()
    }

    pub async fn update(&self, id: &str, patch: &AppointmentPatch) -> CoreResult<Appointment> {
        self.envelope(
            self.client
                .put(self.url(&format!("/appointments/{}", id)))
                .json(patch),
        )
        .await?
        .into_data()
    }

    /// Cancel by id. Returns the server's confirmation text.
    pub async fn cancel(&self, id: &str) -> CoreResult<Option<String>> {
        self.envelope::<serde_json::Value>(
            self.client.delete(self.url(&format!("/appointments/{}", id))),
        )
        .await?
        .into_message()
    }

    /// Free slots of `duration_minutes` on `date` (the server works 9:00–18:00).
    pub async fn check_availability(
        &self,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> CoreResult<Vec<AvailabilitySlot>> {
        let body = AvailabilityRequest {
            date: date.format("%Y-%m-%dT00:00:00").to_string(),
            duration: duration_minutes,
        };
        self.envelope(self.client.post(self.url("/availability")).json(&body))
            .await?
            .into_data()
    }

    /// `GET /health` (not enveloped).
    pub async fn health(&self) -> CoreResult<HealthStatus> {
        let res = self
            .client
            .get(self.url("/health"))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Local, Timelike};

    #[test]
    fn server_times_are_local_wall_clock() {
        let t = wire_time::parse("2025-03-04T09:30:00").unwrap();
        let local = t.with_timezone(&Local);
        assert_eq!((local.hour(), local.minute()), (9, 30));
        assert_eq!(wire_time::format(&t), "2025-03-04T09:30:00");

        let t = wire_time::parse("2025-03-04T09:30:00.250000").unwrap();
        assert_eq!(t.timestamp_subsec_millis(), 250);
        assert!(wire_time::parse("2025-03-04T10:00:00Z").is_some());
        assert!(wire_time::parse("tomorrow").is_none());
    }

    #[test]
    fn appointment_uses_camel_case_and_ignores_extra_columns() {
        let json = r#"{
            "id": "a1", "title": "Dentist", "description": "",
            "startTime": "2025-03-04T09:30:00", "endTime": "2025-03-04T10:30:00",
            "start_time": "Tue, 04 Mar 2025 09:30:00 GMT",
            "attendees": ["sam"], "location": "Main St", "status": "scheduled"
        }"#;
        let appt: Appointment = serde_json::from_str(json).unwrap();
        assert_eq!(appt.title, "Dentist");
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.attendees, vec!["sam"]);
        assert_eq!((appt.end_time - appt.start_time).num_minutes(), 60);
    }

    #[test]
    fn drafts_and_patches_write_wall_clock_times() {
        let start = wire_time::parse("2025-06-02T14:00:00").unwrap();
        let draft = AppointmentDraft {
            title: "Dentist".into(),
            description: None,
            start_time: start,
            end_time: start + chrono::Duration::hours(1),
            attendees: Vec::new(),
            location: None,
        };
        let sent = serde_json::to_value(&draft).unwrap();
        assert_eq!(sent["startTime"], "2025-06-02T14:00:00");
        assert_eq!(sent["endTime"], "2025-06-02T15:00:00");

        let patch = AppointmentPatch {
            start_time: Some(start),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"startTime": "2025-06-02T14:00:00"})
        );
    }

    #[test]
    fn patch_sends_only_set_fields() {
        let patch = AppointmentPatch {
            title: Some("Moved".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"title": "Moved"})
        );
    }
}
