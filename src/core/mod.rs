//! # Core Framework
//!
//! The framework proper: component registry, directive registry, global
//! store, navigator, actions, configuration. It knows nothing about any
//! specific backend and touches the document only through the `dom`
//! handle.
//!
//! ```text
//!                  ┌───────────────────────────────┐
//!                  │            CORE               │
//!                  │  (this module)                │
//!                  │                               │
//!                  │  • Shopfront (context)        │
//!                  │  • ComponentRegistry (DI)     │
//!                  │  • DirectiveRegistry (bind)   │
//!                  │  • GlobalStore (write-once)   │
//!                  │  • Navigator (checkout steps) │
//!                  │  • Action / ActionQueue       │
//!                  └───────────────┬───────────────┘
//!                                  │
//!              ┌───────────────────┼───────────────────┐
//!              ▼                   ▼                   ▼
//!       ┌────────────┐      ┌────────────┐      ┌────────────┐
//!       │    dom     │      │    api     │      │  services  │
//!       │ (document) │      │ (REST I/O) │      │ (features) │
//!       └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`framework`]: The `Shopfront` handle with explicit context, no ambient globals
//! - [`registry`]: Factory/service recipes, memoized compilation
//! - [`directive`]: Selector-to-behavior binding with idempotent passes
//! - [`globals`]: Write-once shared values
//! - [`navigator`]: The checkout step machine
//! - [`action`]: The `Action` enum, everything the page wants done

pub mod action;
pub mod config;
pub mod directive;
pub mod framework;
pub mod globals;
pub mod navigator;
pub mod registry;
