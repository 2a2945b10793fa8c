// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use pointsgo_app::{AvailabilityEntry, CabinClass, Flight, FlightId};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use time::macros::{date, datetime};
use time::{Date, OffsetDateTime};
use tiny_http::{Header, Method, Request, Response, Server};

const ROUTES: [(&str, &str); 6] = [
    ("AA", "JFK-LAX"),
    ("UA", "SFO-EWR"),
    ("DL", "ATL-JFK"),
    ("B6", "BOS-FLL"),
    ("AS", "SEA-ANC"),
    ("AC", "YYZ-YVR"),
];

pub fn fixture_datetime() -> OffsetDateTime {
    datetime!(2024-05-30 08:15 UTC)
}

/// Stable "today" for tests that need the picker's past-date rule.
pub fn fixture_today() -> Date {
    date!(2024-06-01)
}

pub fn sample_flight(id: &str, airline: &str, origin: &str, destination: &str) -> Flight {
    Flight {
        id: FlightId::new(id),
        airline: airline.to_owned(),
        origin: origin.to_owned(),
        destination: destination.to_owned(),
        last_updated: None,
        program: None,
        availability: None,
    }
}

/// One flight per fixture route, ids `1..=6`, with program and timestamp set.
pub fn fleet() -> Vec<Flight> {
    ROUTES
        .iter()
        .enumerate()
        .map(|(index, &(airline, route))| {
            let (origin, destination) = route.split_once('-').unwrap_or((route, route));
            let mut flight = sample_flight(&(index + 1).to_string(), airline, origin, destination);
            flight.last_updated = Some(fixture_datetime());
            flight.program = pointsgo_app::DEFAULT_PROGRAMS
                .iter()
                .find(|program| program.starts_with(airline))
                .map(|program| (*program).to_owned());
            flight
        })
        .collect()
}

pub fn with_availability(
    mut flight: Flight,
    iso_day: &str,
    economy: Option<bool>,
    business: Option<bool>,
) -> Flight {
    flight.availability.get_or_insert_default().insert(
        iso_day.to_owned(),
        AvailabilityEntry {
            economy,
            business,
            entry_id: None,
        },
    );
    flight
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body)
            .map_err(|error| anyhow!("request body is not JSON: {error}"))
    }
}

#[derive(Debug, Default)]
struct BackendState {
    flights: Vec<Flight>,
    requests: Vec<RecordedRequest>,
    failure: Option<(u16, String)>,
    next_id: u64,
}

/// In-process stand-in for the flights backend. Serves the five flight
/// endpoints from memory and records every request it sees.
pub struct MockBackend {
    base_url: String,
    server: Arc<Server>,
    state: Arc<Mutex<BackendState>>,
    handle: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub fn start(flights: Vec<Flight>) -> Result<Self> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|error| anyhow!("start mock backend: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());
        let next_id = flights.len() as u64 + 1;
        let server = Arc::new(server);
        let state = Arc::new(Mutex::new(BackendState {
            flights,
            next_id,
            ..BackendState::default()
        }));

        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                while let Ok(request) = server.recv() {
                    handle_request(&state, request);
                }
            })
        };

        Ok(Self {
            base_url,
            server,
            state,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn flights(&self) -> Vec<Flight> {
        lock(&self.state).flights.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.state).requests.last().cloned()
    }

    /// Answers the next request with `status` and `body` instead of routing it.
    pub fn fail_next(&self, status: u16, body: &str) {
        lock(&self.state).failure = Some((status, body.to_owned()));
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn lock(state: &Mutex<BackendState>) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn handle_request(state: &Mutex<BackendState>, mut request: Request) {
    let mut body = String::new();
    let _ = std::io::Read::read_to_string(request.as_reader(), &mut body);
    let method = request.method().clone();
    let url = request.url().to_owned();

    let (status, payload) = {
        let mut state = lock(state);
        state.requests.push(RecordedRequest {
            method: method.as_str().to_owned(),
            url: url.clone(),
            body: body.clone(),
        });
        match state.failure.take() {
            Some(failure) => failure,
            None => route(&mut state, &method, &url, &body),
        }
    };

    let mut response = Response::from_string(payload).with_status_code(status);
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response = response.with_header(header);
    }
    let _ = request.respond(response);
}

fn route(state: &mut BackendState, method: &Method, url: &str, body: &str) -> (u16, String) {
    let path = url.split('?').next().unwrap_or(url);
    let Some(rest) = path.strip_prefix("/api/flights/") else {
        return not_found();
    };
    let (action, id) = match rest.split_once('/') {
        Some((action, id)) => (action, Some(FlightId::new(id))),
        None => (rest, None),
    };

    match (method, action, id) {
        (Method::Get, "all", None) => match serde_json::to_string(&state.flights) {
            Ok(json) => (200, json),
            Err(error) => (500, error_body(&error.to_string())),
        },
        (Method::Post, "create", None) => create(state, body),
        (Method::Patch, "update-program", Some(id)) => update_program(state, &id, body),
        (Method::Patch, "update-availability", Some(id)) => update_availability(state, &id, body),
        (Method::Delete, "delete", Some(id)) => {
            let before = state.flights.len();
            state.flights.retain(|flight| flight.id != id);
            if state.flights.len() == before {
                return not_found();
            }
            (200, r#"{"deleted":true}"#.to_owned())
        }
        _ => not_found(),
    }
}

fn create(state: &mut BackendState, body: &str) -> (u16, String) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (400, error_body("body must be JSON"));
    };
    let field = |name: &str| value.get(name).and_then(Value::as_str).unwrap_or_default();
    let id = state.next_id.to_string();
    state.next_id += 1;
    let flight = sample_flight(&id, field("airline"), field("origin"), field("destination"));
    let json = serde_json::to_string(&flight).unwrap_or_default();
    state.flights.push(flight);
    (201, json)
}

fn update_program(state: &mut BackendState, id: &FlightId, body: &str) -> (u16, String) {
    let Some(flight) = state.flights.iter_mut().find(|flight| &flight.id == id) else {
        return not_found();
    };
    let program = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("program").and_then(Value::as_str).map(str::to_owned));
    let Some(program) = program else {
        return (400, error_body("program is required"));
    };
    flight.program = Some(program);
    flight.last_updated = Some(fixture_datetime());
    (200, r#"{"updated":true}"#.to_owned())
}

fn update_availability(state: &mut BackendState, id: &FlightId, body: &str) -> (u16, String) {
    let Some(flight) = state.flights.iter_mut().find(|flight| &flight.id == id) else {
        return not_found();
    };
    let Ok(Value::Object(days)) = serde_json::from_str::<Value>(body) else {
        return (400, error_body("body must be an object of dates"));
    };
    let availability = flight.availability.get_or_insert_default();
    for (day, classes) in days {
        let Value::Object(classes) = classes else {
            return (400, error_body("each date maps to an object of classes"));
        };
        let entry = availability.entry(day).or_default();
        for (class, value) in classes {
            let flag = value.as_bool();
            match CabinClass::parse(&class) {
                Some(CabinClass::Economy) => entry.economy = flag,
                Some(CabinClass::Business) => entry.business = flag,
                None => return (400, error_body("unknown class")),
            }
        }
    }
    flight.last_updated = Some(fixture_datetime());
    (200, r#"{"updated":true}"#.to_owned())
}

fn not_found() -> (u16, String) {
    (404, error_body("not found"))
}

fn error_body(message: &str) -> String {
    serde_json::json!({ "message": message }).to_string()
}
