// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{ColumnId, FlightId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    Global,
    Column(ColumnId),
}

impl FilterTarget {
    pub fn label(self) -> &'static str {
        match self {
            Self::Global => "search",
            Self::Column(column) => column.label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Grid,
    Form,
    FilterInput(FilterTarget),
    PageInput,
    DatePicker,
    ProgramPicker,
}

impl AppMode {
    pub fn badge(self) -> &'static str {
        match self {
            Self::Nav => "NAV",
            Self::Grid => "GRID",
            Self::Form => "FORM",
            Self::FilterInput(_) => "FILTER",
            Self::PageInput => "PAGE",
            Self::DatePicker => "DATES",
            Self::ProgramPicker => "PROGRAM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub delete_target: Option<FlightId>,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            delete_target: None,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    ExitToNav,
    EnterGrid,
    OpenForm,
    OpenFilterInput(FilterTarget),
    OpenPageInput,
    OpenDatePicker,
    OpenProgramPicker,
    OpenDeleteDialog(FlightId),
    CloseDeleteDialog,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    DeleteDialogOpened(FlightId),
    DeleteDialogClosed,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn delete_dialog_open(&self) -> bool {
        self.delete_target.is_some()
    }

    /// While the delete dialog is open only status and dialog commands apply.
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        if self.delete_dialog_open()
            && !matches!(
                command,
                AppCommand::CloseDeleteDialog | AppCommand::SetStatus(_) | AppCommand::ClearStatus
            )
        {
            return Vec::new();
        }

        match command {
            AppCommand::ExitToNav => self.change_mode(AppMode::Nav),
            AppCommand::EnterGrid => self.change_mode(AppMode::Grid),
            AppCommand::OpenForm => self.change_mode(AppMode::Form),
            AppCommand::OpenFilterInput(target) => self.change_mode(AppMode::FilterInput(target)),
            AppCommand::OpenPageInput => self.change_mode(AppMode::PageInput),
            AppCommand::OpenDatePicker => self.change_mode(AppMode::DatePicker),
            AppCommand::OpenProgramPicker => self.change_mode(AppMode::ProgramPicker),
            AppCommand::OpenDeleteDialog(id) => {
                self.delete_target = Some(id.clone());
                vec![AppEvent::DeleteDialogOpened(id)]
            }
            AppCommand::CloseDeleteDialog => {
                if self.delete_target.take().is_none() {
                    return Vec::new();
                }
                vec![AppEvent::DeleteDialogClosed]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn change_mode(&mut self, mode: AppMode) -> Vec<AppEvent> {
        if self.mode == mode {
            return Vec::new();
        }
        self.mode = mode;
        vec![AppEvent::ModeChanged(mode)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
