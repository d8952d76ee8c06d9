//! # In-Flight Gate
//!
//! Per-resource mutation discipline. A service acquires the resource name
//! before a mutating request and holds the guard across the await; a
//! second mutation for the same resource in that window comes back as
//! [`ApiError::Busy`] instead of racing the first one to the backend.
//! Double-clicked buttons stop being a data-corruption feature.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use log::debug;

use super::transport::ApiError;

#[derive(Default, Clone)]
pub struct InflightGate {
    busy: Rc<RefCell<HashSet<String>>>,
}

impl InflightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `resource` until the returned guard drops.
    pub fn try_acquire(&self, resource: &str) -> Result<InflightGuard, ApiError> {
        let mut busy = self.busy.borrow_mut();
        if !busy.insert(resource.to_string()) {
            debug!("rejecting overlapping mutation on {resource:?}");
            return Err(ApiError::Busy {
                resource: resource.to_string(),
            });
        }
        Ok(InflightGuard {
            busy: self.busy.clone(),
            resource: resource.to_string(),
        })
    }

    pub fn is_busy(&self, resource: &str) -> bool {
        self.busy.borrow().contains(resource)
    }
}

/// RAII release. Holding the guard across the request's await is the
/// whole point.
#[derive(Debug)]
pub struct InflightGuard {
    busy: Rc<RefCell<HashSet<String>>>,
    resource: String,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.busy.borrow_mut().remove(&self.resource);
    }
}
