//! # Checkout Hub
//!
//! The shared owner of the checkout document. Features never patch the
//! document locally: they hit an endpoint, get the authoritative document
//! back, and hand it to the hub. The hub stamps every accepted document
//! with a revision; a response that was awaited while someone else moved
//! the revision is stale and gets dropped instead of clobbering newer
//! state.
//!
//! The hub also owns container reloads: fetch fresh markup, swap it into
//! every element carrying the matching `data-shop-reload` key, then
//! re-bind directives for just those subtrees.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::cms::Cms;
use crate::api::types::CheckoutDoc;
use crate::api::{ApiClient, ApiError, ApiResponse};
use crate::core::framework::FrameworkRef;
use crate::dom::{Element, Page};

/// Attribute naming a replaceable container.
pub const ATTR_RELOAD: &str = "data-shop-reload";

pub struct CheckoutHub {
    api: Rc<ApiClient>,
    cms: Rc<Cms>,
    page: Page,
    framework: FrameworkRef,
    doc: RefCell<CheckoutDoc>,
    revision: Cell<u64>,
    loaded_at: Cell<Option<DateTime<Utc>>>,
}

impl CheckoutHub {
    pub fn new(api: Rc<ApiClient>, cms: Rc<Cms>, page: Page, framework: FrameworkRef) -> Self {
        Self {
            api,
            cms,
            page,
            framework,
            doc: RefCell::new(CheckoutDoc::default()),
            revision: Cell::new(0),
            loaded_at: Cell::new(None),
        }
    }

    pub fn doc(&self) -> CheckoutDoc {
        self.doc.borrow().clone()
    }

    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// True when no document has been loaded yet or the snapshot is older
    /// than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.loaded_at.get() {
            None => true,
            Some(at) => Utc::now() - at > max_age,
        }
    }

    /// Replace the document and advance the revision.
    pub fn set_doc(&self, doc: CheckoutDoc) {
        *self.doc.borrow_mut() = doc;
        self.revision.set(self.revision.get() + 1);
        self.loaded_at.set(Some(Utc::now()));
    }

    /// Apply a response carrying a document, but only if the revision is
    /// still the one the caller captured before awaiting. Returns whether
    /// the document was accepted.
    pub fn apply_response(&self, taken: u64, response: &ApiResponse) -> Result<bool, ApiError> {
        if self.revision.get() != taken {
            warn!(
                "dropping stale checkout response (revision {} moved to {})",
                taken,
                self.revision.get()
            );
            return Ok(false);
        }
        let doc: CheckoutDoc = response.parse()?;
        self.set_doc(doc);
        Ok(true)
    }

    pub async fn load(&self) -> Result<(), ApiError> {
        let taken = self.revision.get();
        let response = self.api.get("/rest/checkout").await?;
        self.apply_response(taken, &response)?;
        Ok(())
    }

    /// Push the current document to the backend and adopt its answer.
    pub async fn save(&self) -> Result<(), ApiError> {
        let taken = self.revision.get();
        let body = serde_json::to_value(self.doc())
            .map_err(|e| ApiError::Payload(e.to_string()))?;
        let response = self.api.put("/rest/checkout", &body).await?;
        self.apply_response(taken, &response)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Container reloads
    // -----------------------------------------------------------------

    /// Reload one named checkout container into every element marked
    /// `data-shop-reload="<name>"`.
    pub async fn reload_container(&self, name: &str) -> Result<(), ApiError> {
        let taken = self.revision.get();
        let fragments = self.cms.container("checkout", name).await?;
        self.swap_in(name, taken, fragments);
        Ok(())
    }

    pub async fn reload_item_container(&self, name: &str) -> Result<(), ApiError> {
        let taken = self.revision.get();
        let fragments = self.cms.container("item", name).await?;
        self.swap_in(name, taken, fragments);
        Ok(())
    }

    /// Fetch a category view and swap it into the container keyed `key`.
    pub async fn reload_category_content(
        &self,
        category_id: u64,
        key: &str,
    ) -> Result<(), ApiError> {
        let taken = self.revision.get();
        let fragments = self.cms.category_content(category_id).await?;
        self.swap_in(key, taken, fragments);
        Ok(())
    }

    /// Reload several containers concurrently. Individual failures are
    /// logged and do not stop the rest.
    pub async fn reload_many(&self, names: &[&str]) {
        let results =
            futures::future::join_all(names.iter().map(|name| self.reload_container(name)))
                .await;
        for (name, result) in names.iter().zip(results) {
            if let Err(err) = result {
                warn!("reloading container {name:?} failed: {err}");
            }
        }
    }

    fn swap_in(&self, key: &str, taken: u64, fragments: Vec<Element>) {
        if self.revision.get() != taken {
            warn!("dropping stale reload for container {key:?}");
            return;
        }
        let selector = format!("[{ATTR_RELOAD}=\"{key}\"]");
        let containers = self.page.select(&selector);
        if containers.is_empty() {
            debug!("no container marked {key:?} in the document");
            return;
        }
        for container in containers {
            self.page.replace_children(container, fragments.clone());
        }
        match self.framework.upgrade() {
            Some(fw) => fw.bind_directives(Some(&selector)),
            None => warn!("framework is gone, skipping rebind for {key:?}"),
        }
    }
}

// =====================================================================
// Tests
// =====================================================================
