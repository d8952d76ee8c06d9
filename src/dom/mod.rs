//! # DOM Collaborator
//!
//! An in-memory stand-in for the browser document: an element arena with
//! selector matching, event handlers, and the handful of page-level fields
//! the framework cares about (location hash, viewport width).
//!
//! There is no HTML parsing here. Documents are assembled through the
//! [`Element`] builder, and server-delivered fragments arrive as JSON
//! trees (see [`Element::from_json`]).

pub mod document;
pub mod forms;
pub mod selector;

pub use document::{Element, Event, EventHandler, FragmentError, NodeId, Page};
pub use selector::{Selector, SelectorError};
