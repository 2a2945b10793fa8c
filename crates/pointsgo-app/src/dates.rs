// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::ops::Range;
use time::Date;
use time::macros::format_description;

pub const WINDOW_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    /// Exactly two picked dates form a range; any other selection is empty.
    pub fn from_selection(selection: &[Date]) -> Option<Self> {
        match selection {
            [start, end] => Some(Self {
                start: *start,
                end: *end,
            }),
            _ => None,
        }
    }

    pub fn not_before(self, today: Date) -> Result<Self> {
        if self.start < today || self.end < today {
            bail!("dates before {today} are disabled -- pick today or later");
        }
        Ok(self)
    }

    pub fn day_count(self) -> usize {
        if self.end < self.start {
            return 0;
        }
        let whole_days = (self.end - self.start).whole_days();
        usize::try_from(whole_days).map_or(0, |days| days + 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySequence {
    days: Vec<Date>,
}

impl DaySequence {
    pub fn expand(selection: &[Date]) -> Self {
        DateRange::from_selection(selection)
            .map(Self::from_range)
            .unwrap_or_default()
    }

    pub fn from_range(range: DateRange) -> Self {
        let count = range.day_count();
        let mut days = Vec::with_capacity(count);
        let mut current = Some(range.start);
        while days.len() < count {
            let Some(day) = current else {
                break;
            };
            days.push(day);
            current = day.next_day();
        }
        Self { days }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> &[Date] {
        &self.days
    }

    pub fn window(&self, window: DayWindow) -> &[Date] {
        &self.days[window.bounds(self.days.len())]
    }
}

pub fn iso_day(date: Date) -> String {
    date.to_string()
}

/// `Jun 1` style label used above grid columns.
pub fn day_label(date: Date) -> String {
    date.format(&format_description!("[month repr:short] [day padding:none]"))
        .unwrap_or_else(|_| iso_day(date))
}

/// `Jun 01, 2024` style label used in the table.
pub fn long_day_label(date: Date) -> String {
    date.format(&format_description!("[month repr:short] [day], [year]"))
        .unwrap_or_else(|_| iso_day(date))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayWindow {
    start: usize,
}

impl DayWindow {
    pub const fn start(self) -> usize {
        self.start
    }

    pub fn bounds(self, len: usize) -> Range<usize> {
        let start = self.start.min(len);
        start..start.saturating_add(WINDOW_DAYS).min(len)
    }

    pub const fn can_previous(self) -> bool {
        self.start > 0
    }

    pub const fn can_next(self, len: usize) -> bool {
        self.start + WINDOW_DAYS < len
    }

    pub fn next(&mut self, len: usize) -> bool {
        if !self.can_next(len) {
            return false;
        }
        self.start += WINDOW_DAYS;
        true
    }

    pub fn previous(&mut self) -> bool {
        if !self.can_previous() {
            return false;
        }
        self.start = self.start.saturating_sub(WINDOW_DAYS);
        true
    }

    pub fn reset(&mut self) {
        self.start = 0;
    }
}
