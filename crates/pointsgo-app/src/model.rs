// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::ids::*;

pub const DEFAULT_PROGRAMS: [&str; 6] = [
    "AA:AAdvantage",
    "AC:Aeroplan",
    "AS:Mileage Plan",
    "B6:TrueBlue",
    "DL:SkyMiles",
    "UA:MileagePlus",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CabinClass {
    Economy,
    Business,
}

impl CabinClass {
    pub const ALL: [Self; 2] = [Self::Economy, Self::Business];

    /// Field name the backend stores for this class. The business spelling
    /// is the backend's own and must be kept on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Economy => "economy",
            Self::Business => "buisness",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Economy => "Economy",
            Self::Business => "Business",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "economy" => Some(Self::Economy),
            "buisness" | "business" => Some(Self::Business),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatStatus {
    Available,
    Unavailable,
    Unknown,
}

impl SeatStatus {
    pub const fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Available,
            Some(false) => Self::Unavailable,
            None => Self::Unknown,
        }
    }

    pub const fn as_flag(self) -> Option<bool> {
        match self {
            Self::Available => Some(true),
            Self::Unavailable => Some(false),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityEntry {
    #[serde(default)]
    pub economy: Option<bool>,
    #[serde(default, rename = "buisness", alias = "business")]
    pub business: Option<bool>,
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<AvailabilityEntryId>,
}

impl AvailabilityEntry {
    pub const fn flag(&self, class: CabinClass) -> Option<bool> {
        match class {
            CabinClass::Economy => self.economy,
            CabinClass::Business => self.business,
        }
    }

    pub const fn status(&self, class: CabinClass) -> SeatStatus {
        SeatStatus::from_flag(self.flag(class))
    }
}

/// Keyed by ISO day (`YYYY-MM-DD`). Keys the backend stored in any other
/// shape are kept but never match a displayed day.
pub type AvailabilityMap = BTreeMap<String, AvailabilityEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    #[serde(rename = "_id")]
    pub id: FlightId,
    #[serde(default)]
    pub airline: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(
        default,
        rename = "lastUpdated",
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<AvailabilityMap>,
}

impl Flight {
    pub fn seat_status(&self, iso_day: &str, class: CabinClass) -> SeatStatus {
        self.availability
            .as_ref()
            .and_then(|map| map.get(iso_day))
            .map_or(SeatStatus::Unknown, |entry| entry.status(class))
    }

    pub fn program_label(&self) -> &str {
        program_label(self.program.as_deref())
    }
}

/// Display name of a `<code>:<name>` program tag.
pub fn program_label(program: Option<&str>) -> &str {
    match program.map(str::trim) {
        None | Some("") => "N/A",
        Some(tag) => match tag.split_once(':') {
            Some((_, name)) if !name.trim().is_empty() => name.trim(),
            _ => tag,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFlight {
    pub airline: String,
    pub origin: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramUpdate {
    pub program: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}
