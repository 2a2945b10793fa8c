// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod error;

pub use error::{ApiError, ApiResult};

use pointsgo_app::{AvailabilityChange, Flight, FlightId, NewFlight, ProgramUpdate};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

const FLIGHTS_PATH: [&str; 2] = ["api", "flights"];

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = parse_base_url(base_url)?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::BuildClient)?;
        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET /api/flights/all`
    pub fn list_flights(&self) -> ApiResult<Vec<Flight>> {
        let url = self.endpoint(&["all"])?;
        let response = self.send("list flights", self.http.get(url))?;
        let body = response.text().map_err(|source| self.connection_error(source))?;
        let flights: Vec<Flight> =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                what: "flight list",
                source,
            })?;
        tracing::debug!(count = flights.len(), "loaded flights");
        Ok(flights)
    }

    /// `POST /api/flights/create`
    pub fn create_flight(&self, flight: &NewFlight) -> ApiResult<()> {
        let url = self.endpoint(&["create"])?;
        self.send("create flight", self.http.post(url).json(flight))?;
        Ok(())
    }

    /// `PATCH /api/flights/update-program/{id}`
    pub fn update_program(&self, id: &FlightId, program: &str) -> ApiResult<()> {
        let url = self.endpoint(&["update-program", id.as_str()])?;
        let body = ProgramUpdate {
            program: program.to_owned(),
        };
        self.send("update program", self.http.patch(url).json(&body))?;
        Ok(())
    }

    /// `PATCH /api/flights/update-availability/{id}`
    pub fn update_availability(&self, id: &FlightId, change: &AvailabilityChange) -> ApiResult<()> {
        let url = self.endpoint(&["update-availability", id.as_str()])?;
        self.send(
            "update availability",
            self.http.patch(url).json(&change.to_body()),
        )?;
        Ok(())
    }

    /// `DELETE /api/flights/delete/{id}`
    pub fn delete_flight(&self, id: &FlightId) -> ApiResult<()> {
        let url = self.endpoint(&["delete", id.as_str()])?;
        self.send("delete flight", self.http.delete(url))?;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "url cannot carry a path".to_owned(),
            })?
            .pop_if_empty()
            .extend(FLIGHTS_PATH)
            .extend(segments);
        Ok(url)
    }

    fn send(&self, action: &'static str, request: RequestBuilder) -> ApiResult<Response> {
        tracing::debug!(action, "sending request");
        let response = request
            .send()
            .map_err(|source| self.connection_error(source))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn connection_error(&self, source: reqwest::Error) -> ApiError {
        ApiError::Connection {
            base_url: self.base_url().to_owned(),
            source,
        }
    }
}

fn parse_base_url(raw: &str) -> ApiResult<Url> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| ApiError::InvalidBaseUrl {
        url: trimmed.to_owned(),
        reason: reason.to_owned(),
    };
    if trimmed.is_empty() {
        return Err(invalid("must not be empty"));
    }
    let url = Url::parse(trimmed).map_err(|error| invalid(&error.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment"));
    }
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> ApiError {
    let status = status.as_u16();
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.message.or(parsed.error)
        && !message.trim().is_empty()
    {
        return ApiError::Status {
            status,
            message: message.trim().to_owned(),
        };
    }

    let body = body.trim();
    let message = if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        body.to_owned()
    } else {
        format!("request failed with status {status}")
    };
    ApiError::Status { status, message }
}
