// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use pointsgo_api::Client;
use pointsgo_app::{AvailabilityChange, Flight, FlightId, NewFlight, QueryCache, QueryKey};

pub struct HttpRuntime {
    client: Client,
    cache: QueryCache<Vec<Flight>>,
}

impl HttpRuntime {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: QueryCache::new(),
        }
    }
}

impl pointsgo_tui::AppRuntime for HttpRuntime {
    fn load_flights(&mut self) -> Result<Vec<Flight>> {
        let client = &self.client;
        tracing::debug!(
            query = QueryKey::Flights.name(),
            refetch = self.cache.is_stale(QueryKey::Flights),
            "loading flights"
        );
        let flights = self
            .cache
            .fetch(QueryKey::Flights, || Ok(client.list_flights()?))?;
        Ok(flights.clone())
    }

    fn invalidate_flights(&mut self) {
        tracing::debug!(query = QueryKey::Flights.name(), "invalidating query");
        self.cache.invalidate(QueryKey::Flights);
    }

    fn create_flight(&mut self, flight: &NewFlight) -> Result<()> {
        self.client.create_flight(flight)?;
        self.invalidate_flights();
        Ok(())
    }

    fn delete_flight(&mut self, id: &FlightId) -> Result<()> {
        self.client.delete_flight(id)?;
        self.invalidate_flights();
        Ok(())
    }

    fn update_program(&mut self, id: &FlightId, program: &str) -> Result<()> {
        self.client.update_program(id, program)?;
        self.invalidate_flights();
        Ok(())
    }

    fn update_availability(&mut self, id: &FlightId, change: &AvailabilityChange) -> Result<()> {
        self.client.update_availability(id, change)?;
        self.invalidate_flights();
        Ok(())
    }
}
