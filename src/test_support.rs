//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::rc::Rc;

use crate::api::FixtureTransport;
use crate::core::framework::Shopfront;
use crate::dom::Page;
use crate::{directives, services, shell};

/// A fully wired demo framework on the canned document, backed by the
/// fixture transport. The transport handle is returned for seeding and
/// request inspection.
pub fn fixture_framework() -> (Shopfront, Rc<FixtureTransport>) {
    let transport = Rc::new(FixtureTransport::new());
    let shopfront = shell::bootstrap(shell::demo_document(), transport.clone());
    (shopfront, transport)
}

/// A framework on a caller-built page, standard services and directives
/// registered and bound.
pub fn framework_on(page: Page) -> (Shopfront, Rc<FixtureTransport>) {
    let transport = Rc::new(FixtureTransport::new());
    let shopfront = Shopfront::new(page);
    services::register_all(&shopfront, transport.clone());
    directives::register_defaults(&shopfront);
    shopfront.bind_directives(None);
    (shopfront, transport)
}
