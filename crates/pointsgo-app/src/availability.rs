// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::{Map, Value};
use time::Date;

use crate::{CabinClass, DateRange, DaySequence, DayWindow, Flight, iso_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityMark {
    Available,
    Unavailable,
}

impl AvailabilityMark {
    pub const fn flag(self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Marking a cell with the value it already holds clears it; anything else
/// sets it.
pub fn toggled_value(current: Option<bool>, mark: AvailabilityMark) -> Option<bool> {
    let flag = mark.flag();
    if current == Some(flag) { None } else { Some(flag) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityChange {
    pub date: Date,
    pub class: CabinClass,
    pub value: Option<bool>,
}

impl AvailabilityChange {
    pub fn for_cell(flight: &Flight, date: Date, class: CabinClass, mark: AvailabilityMark) -> Self {
        let current = flight.seat_status(&iso_day(date), class).as_flag();
        Self {
            date,
            class,
            value: toggled_value(current, mark),
        }
    }

    pub fn iso_date(&self) -> String {
        iso_day(self.date)
    }

    /// `{"<iso date>": {"<class>": true|false|null}}`
    pub fn to_body(&self) -> Value {
        let mut cell = Map::new();
        cell.insert(
            self.class.as_str().to_owned(),
            self.value.map_or(Value::Null, Value::Bool),
        );
        let mut body = Map::new();
        body.insert(self.iso_date(), Value::Object(cell));
        Value::Object(body)
    }
}

/// Per-row grid view: picked range, its days, the visible window and the
/// cell cursor (day offset within the window, class row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridState {
    range: Option<DateRange>,
    days: DaySequence,
    window: DayWindow,
    cursor_day: usize,
    cursor_class: CabinClass,
}

impl Default for GridState {
    fn default() -> Self {
        Self {
            range: None,
            days: DaySequence::default(),
            window: DayWindow::default(),
            cursor_day: 0,
            cursor_class: CabinClass::Economy,
        }
    }
}

impl GridState {
    pub fn range(&self) -> Option<DateRange> {
        self.range
    }

    pub fn days(&self) -> &DaySequence {
        &self.days
    }

    pub fn window(&self) -> DayWindow {
        self.window
    }

    /// Replaces the picked dates. Anything but a start and end leaves the
    /// grid without a range or days.
    pub fn set_selection(&mut self, selection: &[Date]) {
        self.range = DateRange::from_selection(selection);
        self.days = DaySequence::expand(selection);
        self.window.reset();
        self.cursor_day = 0;
    }

    pub fn clear_range(&mut self) {
        *self = Self {
            cursor_class: self.cursor_class,
            ..Self::default()
        };
    }

    pub fn visible_days(&self) -> &[Date] {
        self.days.window(self.window)
    }

    pub fn can_previous_window(&self) -> bool {
        self.window.can_previous()
    }

    pub fn can_next_window(&self) -> bool {
        self.window.can_next(self.days.len())
    }

    pub fn next_window(&mut self) -> bool {
        let moved = self.window.next(self.days.len());
        self.clamp_cursor();
        moved
    }

    pub fn previous_window(&mut self) -> bool {
        let moved = self.window.previous();
        self.clamp_cursor();
        moved
    }

    pub fn cursor(&self) -> (usize, CabinClass) {
        (self.cursor_day, self.cursor_class)
    }

    pub fn cursor_date(&self) -> Option<Date> {
        self.visible_days().get(self.cursor_day).copied()
    }

    pub fn move_day(&mut self, delta: isize) {
        let visible = self.visible_days().len();
        if visible == 0 {
            self.cursor_day = 0;
            return;
        }
        let next = self.cursor_day as isize + delta;
        self.cursor_day = next.clamp(0, visible as isize - 1) as usize;
    }

    pub fn toggle_class(&mut self) {
        self.cursor_class = match self.cursor_class {
            CabinClass::Economy => CabinClass::Business,
            CabinClass::Business => CabinClass::Economy,
        };
    }

    pub fn set_class(&mut self, class: CabinClass) {
        self.cursor_class = class;
    }

    /// The update a mark at the cursor would send, if the cursor is on a day.
    pub fn change_at_cursor(&self, flight: &Flight, mark: AvailabilityMark) -> Option<AvailabilityChange> {
        self.cursor_date()
            .map(|date| AvailabilityChange::for_cell(flight, date, self.cursor_class, mark))
    }

    fn clamp_cursor(&mut self) {
        let visible = self.visible_days().len();
        self.cursor_day = self.cursor_day.min(visible.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::{AvailabilityChange, AvailabilityMark, GridState, toggled_value};
    use crate::{AvailabilityEntry, AvailabilityMap, CabinClass, DateRange, Flight, FlightId};
    use anyhow::Result;
    use time::{Date, Month};

    fn day(value: u8) -> Date {
        Date::from_calendar_date(2024, Month::June, value).expect("valid test date")
    }

    fn flight_with(entries: &[(&str, AvailabilityEntry)]) -> Flight {
        let availability: AvailabilityMap = entries
            .iter()
            .map(|(key, entry)| ((*key).to_owned(), entry.clone()))
            .collect();
        Flight {
            id: FlightId::new("1"),
            airline: "AA".to_owned(),
            origin: "JFK".to_owned(),
            destination: "LAX".to_owned(),
            last_updated: None,
            program: None,
            availability: Some(availability),
        }
    }

    #[test]
    fn toggle_rules_cover_every_state() {
        use AvailabilityMark::{Available, Unavailable};
        assert_eq!(toggled_value(Some(true), Available), None);
        assert_eq!(toggled_value(Some(false), Available), Some(true));
        assert_eq!(toggled_value(None, Available), Some(true));
        assert_eq!(toggled_value(Some(false), Unavailable), None);
        assert_eq!(toggled_value(Some(true), Unavailable), Some(false));
        assert_eq!(toggled_value(None, Unavailable), Some(false));
    }

    #[test]
    fn available_on_available_cell_sends_null() -> Result<()> {
        let flight = flight_with(&[(
            "2024-06-01",
            AvailabilityEntry {
                economy: Some(true),
                business: Some(false),
                entry_id: None,
            },
        )]);
        let change =
            AvailabilityChange::for_cell(&flight, day(1), CabinClass::Economy, AvailabilityMark::Available);
        assert_eq!(change.value, None);
        assert_eq!(
            change.to_body(),
            serde_json::json!({"2024-06-01": {"economy": null}})
        );
        Ok(())
    }

    #[test]
    fn available_on_unset_cell_sends_true() {
        let flight = flight_with(&[]);
        let change =
            AvailabilityChange::for_cell(&flight, day(1), CabinClass::Economy, AvailabilityMark::Available);
        assert_eq!(
            change.to_body(),
            serde_json::json!({"2024-06-01": {"economy": true}})
        );
    }

    #[test]
    fn business_change_uses_backend_field_name() {
        let flight = flight_with(&[]);
        let change = AvailabilityChange::for_cell(
            &flight,
            day(2),
            CabinClass::Business,
            AvailabilityMark::Unavailable,
        );
        assert_eq!(
            change.to_body(),
            serde_json::json!({"2024-06-02": {"buisness": false}})
        );
    }

    #[test]
    fn set_selection_resets_window_and_cursor() {
        let mut grid = GridState::default();
        assert!(grid.visible_days().is_empty());
        assert!(grid.cursor_date().is_none());

        grid.set_selection(&[day(1), day(20)]);
        assert!(grid.next_window());
        grid.move_day(3);
        assert_eq!(grid.cursor_date(), Some(day(11)));

        grid.set_selection(&[day(1), day(3)]);
        assert_eq!(grid.window().start(), 0);
        assert_eq!(grid.visible_days().len(), 3);
        assert_eq!(grid.cursor_date(), Some(day(1)));
    }

    #[test]
    fn malformed_selection_clears_grid() {
        let mut grid = GridState::default();
        grid.set_selection(&[day(1), day(5)]);
        assert_eq!(
            grid.range(),
            Some(DateRange {
                start: day(1),
                end: day(5),
            })
        );
        assert_eq!(grid.days().len(), 5);

        grid.set_selection(&[day(3)]);
        assert_eq!(grid.range(), None);
        assert!(grid.days().is_empty());
        assert!(grid.visible_days().is_empty());
        assert!(grid.cursor_date().is_none());

        grid.set_selection(&[day(1), day(2), day(3)]);
        assert_eq!(grid.range(), None);
        assert!(grid.days().is_empty());
    }

    #[test]
    fn cursor_clamps_to_shorter_last_window() {
        let mut grid = GridState::default();
        grid.set_selection(&[day(1), day(9)]);
        grid.move_day(6);
        assert!(grid.next_window());
        assert_eq!(grid.cursor_date(), Some(day(9)));
        assert!(!grid.can_next_window());
        assert!(grid.previous_window());
        assert!(!grid.can_previous_window());
    }

    #[test]
    fn change_at_cursor_targets_selected_class() {
        let flight = flight_with(&[(
            "2024-06-01",
            AvailabilityEntry {
                economy: None,
                business: Some(false),
                entry_id: None,
            },
        )]);
        let mut grid = GridState::default();
        assert!(
            grid.change_at_cursor(&flight, AvailabilityMark::Available)
                .is_none()
        );
        grid.set_selection(&[day(1), day(2)]);
        grid.toggle_class();
        let change = grid
            .change_at_cursor(&flight, AvailabilityMark::Unavailable)
            .expect("cursor on a day");
        assert_eq!(change.class, CabinClass::Business);
        assert_eq!(change.value, None);
    }
}
