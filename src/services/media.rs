//! # Media Breakpoints
//!
//! Maps the viewport width onto the four layout breakpoints and fires a
//! document event whenever an update crosses one. Width changes
//! themselves come in through the `resize` document event; this service
//! only interprets them.

use std::cell::Cell;

use log::debug;
use serde_json::json;

use crate::dom::Page;

/// Fired on the document when an update lands in a different breakpoint.
pub const EVENT_SIZE_CHANGE: &str = "size-change";

pub const BREAK_SM: u32 = 768;
pub const BREAK_MD: u32 = 992;
pub const BREAK_LG: u32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Breakpoint {
    Xs,
    Sm,
    Md,
    Lg,
}

impl Breakpoint {
    pub fn from_width(width: u32) -> Self {
        match width {
            w if w >= BREAK_LG => Breakpoint::Lg,
            w if w >= BREAK_MD => Breakpoint::Md,
            w if w >= BREAK_SM => Breakpoint::Sm,
            _ => Breakpoint::Xs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Breakpoint::Xs => "xs",
            Breakpoint::Sm => "sm",
            Breakpoint::Md => "md",
            Breakpoint::Lg => "lg",
        }
    }
}

pub struct Media {
    page: Page,
    current: Cell<Breakpoint>,
}

impl Media {
    pub fn new(page: Page) -> Self {
        let current = Breakpoint::from_width(page.viewport_width());
        Self {
            page,
            current: Cell::new(current),
        }
    }

    pub fn current(&self) -> Breakpoint {
        self.current.get()
    }

    /// Re-read the viewport width. Fires `size-change` only when the
    /// breakpoint actually moved.
    pub fn update(&self) {
        let next = Breakpoint::from_width(self.page.viewport_width());
        let prev = self.current.replace(next);
        if prev != next {
            debug!("breakpoint {} -> {}", prev.as_str(), next.as_str());
            self.page.document_trigger(
                EVENT_SIZE_CHANGE,
                json!({"from": prev.as_str(), "to": next.as_str()}),
            );
        }
    }
}
