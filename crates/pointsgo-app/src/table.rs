// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use time::format_description::well_known::Rfc3339;

use crate::{Flight, FlightId, SortDirection, fuzzy_matches, long_day_label};

pub const PAGE_SIZES: [usize; 5] = [10, 20, 30, 40, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnId {
    Origin,
    Destination,
    Airline,
    LastUpdated,
    Program,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Origin,
    Destination,
    Airline,
    LastUpdated,
    Program,
    FlightId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Substring,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub id: ColumnId,
    pub label: &'static str,
    pub accessor: Accessor,
    pub comparator: Option<Comparator>,
    pub filter: Option<FilterKind>,
    pub global_filter: bool,
}

pub const COLUMNS: [ColumnSpec; 6] = [
    ColumnSpec {
        id: ColumnId::Origin,
        label: "Origin",
        accessor: Accessor::Origin,
        comparator: Some(Comparator::Text),
        filter: Some(FilterKind::Substring),
        global_filter: true,
    },
    ColumnSpec {
        id: ColumnId::Destination,
        label: "Destination",
        accessor: Accessor::Destination,
        comparator: Some(Comparator::Text),
        filter: Some(FilterKind::Substring),
        global_filter: true,
    },
    ColumnSpec {
        id: ColumnId::Airline,
        label: "Airline",
        accessor: Accessor::Airline,
        comparator: Some(Comparator::Text),
        filter: Some(FilterKind::Fuzzy),
        global_filter: true,
    },
    ColumnSpec {
        id: ColumnId::LastUpdated,
        label: "Last Updated",
        accessor: Accessor::LastUpdated,
        comparator: None,
        filter: None,
        global_filter: true,
    },
    ColumnSpec {
        id: ColumnId::Program,
        label: "Program",
        accessor: Accessor::Program,
        comparator: None,
        filter: None,
        global_filter: true,
    },
    ColumnSpec {
        id: ColumnId::Action,
        label: "",
        accessor: Accessor::FlightId,
        comparator: None,
        filter: None,
        global_filter: true,
    },
];

impl ColumnId {
    pub const ALL: [Self; 6] = [
        Self::Origin,
        Self::Destination,
        Self::Airline,
        Self::LastUpdated,
        Self::Program,
        Self::Action,
    ];

    pub fn spec(self) -> &'static ColumnSpec {
        &COLUMNS[self as usize]
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn can_sort(self) -> bool {
        self.spec().comparator.is_some()
    }

    pub fn can_filter(self) -> bool {
        self.spec().filter.is_some()
    }
}

impl Accessor {
    pub fn text(self, flight: &Flight) -> Cow<'_, str> {
        match self {
            Self::Origin => Cow::Borrowed(&flight.origin),
            Self::Destination => Cow::Borrowed(&flight.destination),
            Self::Airline => Cow::Borrowed(&flight.airline),
            Self::LastUpdated => flight
                .last_updated
                .map_or(Cow::Borrowed(""), |at| Cow::Owned(long_day_label(at.date()))),
            Self::Program => Cow::Borrowed(flight.program_label()),
            Self::FlightId => Cow::Borrowed(flight.id.as_str()),
        }
    }

    /// Value as the backend sends it: the ISO timestamp and the full
    /// program tag rather than their display forms.
    pub fn raw(self, flight: &Flight) -> Cow<'_, str> {
        match self {
            Self::LastUpdated => flight.last_updated.map_or(Cow::Borrowed(""), |at| {
                Cow::Owned(at.format(&Rfc3339).unwrap_or_default())
            }),
            Self::Program => Cow::Borrowed(flight.program.as_deref().unwrap_or("")),
            other => other.text(flight),
        }
    }
}

impl FilterKind {
    pub fn matches(self, value: &str, query: &str) -> bool {
        match self {
            Self::Substring => value.to_lowercase().contains(&query.to_lowercase()),
            Self::Fuzzy => fuzzy_matches(value, query),
        }
    }
}

impl Comparator {
    pub fn compare(self, left: &str, right: &str) -> Ordering {
        match self {
            Self::Text => left.to_lowercase().cmp(&right.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: ColumnId,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePage<'a> {
    pub rows: Vec<&'a Flight>,
    pub page_index: usize,
    pub page_count: usize,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightTableState {
    column_filters: BTreeMap<ColumnId, String>,
    global_filter: String,
    sort: Option<SortSpec>,
    page_index: usize,
    page_size: usize,
    expanded: BTreeSet<FlightId>,
}

impl Default for FlightTableState {
    fn default() -> Self {
        Self {
            column_filters: BTreeMap::new(),
            global_filter: String::new(),
            sort: None,
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            expanded: BTreeSet::new(),
        }
    }
}

impl FlightTableState {
    pub fn with_page_size(page_size: usize) -> Result<Self> {
        let mut state = Self::default();
        state.set_page_size(page_size)?;
        Ok(state)
    }

    pub fn column_filter(&self, column: ColumnId) -> Option<&str> {
        self.column_filters.get(&column).map(String::as_str)
    }

    pub fn set_column_filter(&mut self, column: ColumnId, value: &str) -> Result<()> {
        if !column.can_filter() {
            bail!("{} column has no filter", column.label());
        }
        if value.is_empty() {
            self.column_filters.remove(&column);
        } else {
            self.column_filters.insert(column, value.to_owned());
        }
        self.page_index = 0;
        Ok(())
    }

    pub fn global_filter(&self) -> &str {
        &self.global_filter
    }

    pub fn set_global_filter(&mut self, value: &str) {
        value.clone_into(&mut self.global_filter);
        self.page_index = 0;
    }

    pub fn has_filters(&self) -> bool {
        !self.column_filters.is_empty() || !self.global_filter.is_empty()
    }

    pub fn sort(&self) -> Option<SortSpec> {
        self.sort
    }

    /// Cycles a column through asc, desc, unsorted. Sorting one column
    /// replaces any other column's sort.
    pub fn toggle_sort(&mut self, column: ColumnId) -> Result<Option<SortDirection>> {
        if !column.can_sort() {
            bail!("{} column is not sortable", column.label());
        }
        let next = match self.sort {
            Some(SortSpec {
                column: current,
                direction: SortDirection::Asc,
            }) if current == column => Some(SortDirection::Desc),
            Some(SortSpec {
                column: current,
                direction: SortDirection::Desc,
            }) if current == column => None,
            _ => Some(SortDirection::Asc),
        };
        self.sort = next.map(|direction| SortSpec { column, direction });
        self.page_index = 0;
        Ok(next)
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.page_index = 0;
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if !PAGE_SIZES.contains(&page_size) {
            bail!("page size {page_size} is not one of {PAGE_SIZES:?}");
        }
        self.page_size = page_size;
        self.page_index = 0;
        Ok(())
    }

    pub fn cycle_page_size(&mut self, delta: isize) -> usize {
        let current = PAGE_SIZES
            .iter()
            .position(|size| *size == self.page_size)
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(PAGE_SIZES.len() as isize) as usize;
        self.page_size = PAGE_SIZES[next];
        self.page_index = 0;
        self.page_size
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_count(&self, row_count: usize) -> usize {
        row_count.div_ceil(self.page_size).max(1)
    }

    pub fn set_page_index(&mut self, index: usize, row_count: usize) {
        self.page_index = index.min(self.page_count(row_count) - 1);
    }

    /// 1-based page number as typed by the operator.
    pub fn go_to_page(&mut self, page_number: usize, row_count: usize) {
        self.set_page_index(page_number.saturating_sub(1), row_count);
    }

    pub fn can_previous_page(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next_page(&self, row_count: usize) -> bool {
        self.page_index + 1 < self.page_count(row_count)
    }

    pub fn first_page(&mut self) {
        self.page_index = 0;
    }

    pub fn previous_page(&mut self) -> bool {
        if !self.can_previous_page() {
            return false;
        }
        self.page_index -= 1;
        true
    }

    pub fn next_page(&mut self, row_count: usize) -> bool {
        if !self.can_next_page(row_count) {
            return false;
        }
        self.page_index += 1;
        true
    }

    pub fn last_page(&mut self, row_count: usize) {
        self.page_index = self.page_count(row_count) - 1;
    }

    pub fn clamp_page(&mut self, row_count: usize) {
        self.set_page_index(self.page_index, row_count);
    }

    pub fn is_expanded(&self, id: &FlightId) -> bool {
        self.expanded.contains(id)
    }

    pub fn expanded(&self) -> &BTreeSet<FlightId> {
        &self.expanded
    }

    pub fn toggle_expanded(&mut self, id: &FlightId) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.clone());
            true
        }
    }

    /// Drops expansion for rows that no longer exist; returns the dropped ids.
    pub fn prune_expanded(&mut self, flights: &[Flight]) -> Vec<FlightId> {
        let live: BTreeSet<&FlightId> = flights.iter().map(|flight| &flight.id).collect();
        let gone: Vec<FlightId> = self
            .expanded
            .iter()
            .filter(|id| !live.contains(id))
            .cloned()
            .collect();
        for id in &gone {
            self.expanded.remove(id);
        }
        gone
    }

    pub fn row_matches(&self, flight: &Flight) -> bool {
        let columns_pass = self.column_filters.iter().all(|(column, query)| {
            let spec = column.spec();
            spec.filter
                .is_none_or(|filter| filter.matches(&spec.accessor.text(flight), query))
        });
        if !columns_pass {
            return false;
        }
        if self.global_filter.is_empty() {
            return true;
        }
        COLUMNS
            .iter()
            .filter(|spec| spec.global_filter)
            .any(|spec| fuzzy_matches(&spec.accessor.raw(flight), &self.global_filter))
    }

    /// Filtered and sorted rows across all pages. Ties keep fetch order.
    pub fn rows<'a>(&self, flights: &'a [Flight]) -> Vec<&'a Flight> {
        let mut rows: Vec<&Flight> = flights
            .iter()
            .filter(|flight| self.row_matches(flight))
            .collect();
        if let Some(sort) = self.sort
            && let Some(comparator) = sort.column.spec().comparator
        {
            let accessor = sort.column.spec().accessor;
            rows.sort_by(|left, right| {
                let ordering = comparator.compare(&accessor.text(left), &accessor.text(right));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        rows
    }

    pub fn page<'a>(&self, flights: &'a [Flight]) -> TablePage<'a> {
        let rows = self.rows(flights);
        let total_rows = rows.len();
        let page_count = self.page_count(total_rows);
        let page_index = self.page_index.min(page_count - 1);
        let rows = rows
            .into_iter()
            .skip(page_index * self.page_size)
            .take(self.page_size)
            .collect();
        TablePage {
            rows,
            page_index,
            page_count,
            total_rows,
        }
    }
}
