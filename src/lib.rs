//! Shopfront library exports for testing

use clap::ValueEnum;

pub mod api;
pub mod core;
pub mod directives;
pub mod dom;
pub mod services;
pub mod shell;

#[cfg(test)]
pub mod test_support;

/// Backend transport selection, mirrored by the `--transport` flag.
#[derive(Clone, Debug, Default, ValueEnum)]
pub enum TransportKind {
    #[default]
    Fixture,
    Http,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Fixture => "fixture",
            TransportKind::Http => "http",
        }
    }
}
