// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::NewFlight;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlightField {
    #[default]
    Airline,
    Origin,
    Destination,
}

impl FlightField {
    pub const ALL: [Self; 3] = [Self::Airline, Self::Origin, Self::Destination];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Airline => "Airline",
            Self::Origin => "Origin",
            Self::Destination => "Destination",
        }
    }

    pub const fn max_chars(self) -> usize {
        match self {
            Self::Airline => 2,
            Self::Origin | Self::Destination => 3,
        }
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|field| *field == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        let index = Self::ALL.iter().position(|field| *field == self).unwrap_or(0);
        Self::ALL[(index + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    Required,
    TooLong { max: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightFormInput {
    pub airline: String,
    pub origin: String,
    pub destination: String,
}

impl FlightFormInput {
    pub fn field(&self, field: FlightField) -> &str {
        match field {
            FlightField::Airline => &self.airline,
            FlightField::Origin => &self.origin,
            FlightField::Destination => &self.destination,
        }
    }

    pub fn field_mut(&mut self, field: FlightField) -> &mut String {
        match field {
            FlightField::Airline => &mut self.airline,
            FlightField::Origin => &mut self.origin,
            FlightField::Destination => &mut self.destination,
        }
    }

    pub fn field_error(&self, field: FlightField) -> Option<FieldError> {
        let value = self.field(field).trim();
        if value.is_empty() {
            return Some(FieldError::Required);
        }
        let max = field.max_chars();
        if value.chars().count() > max {
            return Some(FieldError::TooLong { max });
        }
        None
    }

    pub fn field_errors(&self) -> Vec<(FlightField, FieldError)> {
        FlightField::ALL
            .into_iter()
            .filter_map(|field| self.field_error(field).map(|error| (field, error)))
            .collect()
    }

    /// Trimmed request body, or the first field problem.
    pub fn validate(&self) -> Result<NewFlight> {
        if let Some((field, error)) = self.field_errors().into_iter().next() {
            let name = field.label().to_lowercase();
            match error {
                FieldError::Required => {
                    bail!("{name} is required -- enter a code and retry")
                }
                FieldError::TooLong { max } => {
                    bail!("{name} must be at most {max} characters")
                }
            }
        }
        Ok(NewFlight {
            airline: self.airline.trim().to_owned(),
            origin: self.origin.trim().to_owned(),
            destination: self.destination.trim().to_owned(),
        })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
