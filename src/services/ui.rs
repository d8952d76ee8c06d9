//! # UI State
//!
//! The wait-screen counter and the error pane. Both are dumb on purpose:
//! the overlay shows while at least one operation is pending (nested
//! show/hide pairs count up and down), and errors render deduplicated by
//! application code so three failing container reloads do not print the
//! same message three times.

use std::cell::Cell;

use log::warn;

use crate::api::{ApiError, ErrorEntry};
use crate::dom::{Element, Page};

pub const WAIT_OVERLAY_SELECTOR: &str = "#wait-overlay";
pub const ERROR_PANE_SELECTOR: &str = "#error-pane";

pub struct UiState {
    page: Page,
    waiting: Cell<u32>,
}

impl UiState {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            waiting: Cell::new(0),
        }
    }

    pub fn waiting_depth(&self) -> u32 {
        self.waiting.get()
    }

    pub fn show_waiting(&self) {
        self.waiting.set(self.waiting.get() + 1);
        for node in self.page.select(WAIT_OVERLAY_SELECTOR) {
            self.page.show(node);
        }
    }

    /// Balances one `show_waiting`. The overlay stays up until the last
    /// pending operation hides it.
    pub fn hide_waiting(&self) {
        let depth = self.waiting.get();
        if depth == 0 {
            warn!("hide_waiting without a matching show_waiting");
            return;
        }
        self.waiting.set(depth - 1);
        if depth == 1 {
            for node in self.page.select(WAIT_OVERLAY_SELECTOR) {
                self.page.hide(node);
            }
        }
    }

    /// Reset the counter and drop the overlay no matter how many shows
    /// are outstanding. For error paths.
    pub fn force_hide_waiting(&self) {
        self.waiting.set(0);
        for node in self.page.select(WAIT_OVERLAY_SELECTOR) {
            self.page.hide(node);
        }
    }

    /// Render `entries` into the error pane, one line per distinct
    /// application code (first message per code wins).
    pub fn print_errors(&self, entries: &[ErrorEntry]) {
        let mut seen = Vec::new();
        let mut lines = Vec::new();
        for entry in entries {
            if seen.contains(&entry.code) {
                continue;
            }
            seen.push(entry.code);
            lines.push(
                Element::new("li")
                    .class("error-message")
                    .attr("data-error-code", &entry.code.to_string())
                    .text(&entry.message),
            );
        }
        if lines.is_empty() {
            return;
        }
        for pane in self.page.select(ERROR_PANE_SELECTOR) {
            self.page.replace_children(pane, lines.clone());
            self.page.show(pane);
        }
    }

    /// One-stop handler for a failed call: anything the backend said goes
    /// to the pane, transport problems become a single generic line.
    pub fn print_api_error(&self, err: &ApiError) {
        match err {
            ApiError::Api { messages, .. } => self.print_errors(messages),
            other => self.print_errors(&[ErrorEntry {
                code: 0,
                message: other.to_string(),
                detail: serde_json::Value::Null,
            }]),
        }
    }

    pub fn clear_errors(&self) {
        for pane in self.page.select(ERROR_PANE_SELECTOR) {
            self.page.replace_children(pane, Vec::new());
            self.page.hide(pane);
        }
    }
}
