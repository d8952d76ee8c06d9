//! # Form Validation
//!
//! Walks the controls marked `data-shop-validate` inside a form, checks
//! each against its declared kind, and keeps the `has-error` classes in
//! sync so styling follows. Checkbox and radio groups validate as a
//! whole (checked count within `data-validate-min`/`-max`); everything
//! else validates per control.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde_json::json;

use crate::dom::{NodeId, Page};

pub const ATTR_VALIDATE: &str = "data-shop-validate";
pub const ATTR_EXPECTED_VALUE: &str = "data-validate-value";
pub const ATTR_GROUP_MIN: &str = "data-validate-min";
pub const ATTR_GROUP_MAX: &str = "data-validate-max";
pub const CLASS_HAS_ERROR: &str = "has-error";
/// Fired on the document when a validation pass fails.
pub const EVENT_VALIDATION_FAILED: &str = "validation-failed";

lazy_static! {
    static ref MAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("mail pattern is valid");
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub failing: Vec<NodeId>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.failing.is_empty()
    }
}

pub struct Validation {
    page: Page,
}

impl Validation {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Validate every marked control under `form`. Classes are updated
    /// for passing and failing controls alike; a failing pass fires
    /// [`EVENT_VALIDATION_FAILED`] on the document.
    pub fn validate(&self, form: NodeId) -> ValidationReport {
        let controls = self
            .page
            .select_within(form, &format!("[{ATTR_VALIDATE}]"));

        // Checkbox/radio groups are judged once, by name.
        let mut groups: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        let mut singles = Vec::new();
        for control in controls {
            let kind = self.page.attr(control, "type").unwrap_or_default();
            let name = self.page.attr(control, "name").unwrap_or_default();
            if matches!(kind.as_str(), "checkbox" | "radio") && !name.is_empty() {
                groups.entry(name).or_default().push(control);
            } else {
                singles.push(control);
            }
        }

        let mut failing = Vec::new();
        for control in singles {
            let ok = self.check_single(control);
            self.mark(control, ok);
            if !ok {
                failing.push(control);
            }
        }
        for members in groups.values() {
            let ok = self.check_group(members);
            for &control in members {
                self.mark(control, ok);
            }
            if !ok {
                failing.extend(members.iter().copied());
            }
        }

        if !failing.is_empty() {
            debug!("validation failed for {} control(s)", failing.len());
            let nodes: Vec<u64> = failing.iter().map(|n| n.0 as u64).collect();
            self.page
                .document_trigger(EVENT_VALIDATION_FAILED, json!({ "nodes": nodes }));
        }
        ValidationReport { failing }
    }

    fn check_single(&self, control: NodeId) -> bool {
        let value = self.page.value(control);
        if self.page.tag(control) == "select" {
            return !value.is_empty() && value != "-1";
        }
        let kind = self
            .page
            .attr(control, ATTR_VALIDATE)
            .unwrap_or_default();
        match kind.as_str() {
            "" | "text" => !value.trim().is_empty(),
            "mail" => MAIL_RE.is_match(value.trim()),
            "number" => value.trim().parse::<f64>().is_ok(),
            "value" => {
                let expected = self
                    .page
                    .attr(control, ATTR_EXPECTED_VALUE)
                    .unwrap_or_default();
                value == expected
            }
            "none" => true,
            other => {
                warn!("unknown validation kind {other:?}, treating as none");
                true
            }
        }
    }

    fn check_group(&self, members: &[NodeId]) -> bool {
        let checked = members
            .iter()
            .filter(|&&control| self.page.checked(control))
            .count();
        let min = self.group_bound(members, ATTR_GROUP_MIN).unwrap_or(1);
        let max = self.group_bound(members, ATTR_GROUP_MAX).unwrap_or(usize::MAX);
        checked >= min && checked <= max
    }

    /// First parsable bound attribute found on any group member.
    fn group_bound(&self, members: &[NodeId], attr: &str) -> Option<usize> {
        members
            .iter()
            .find_map(|&control| self.page.attr(control, attr))
            .and_then(|raw| raw.parse().ok())
    }

    fn mark(&self, control: NodeId, ok: bool) {
        let wrapper = self.page.closest(control, ".form-group");
        if ok {
            self.page.remove_class(control, CLASS_HAS_ERROR);
            if let Some(wrapper) = wrapper {
                self.page.remove_class(wrapper, CLASS_HAS_ERROR);
            }
        } else {
            self.page.add_class(control, CLASS_HAS_ERROR);
            if let Some(wrapper) = wrapper {
                self.page.add_class(wrapper, CLASS_HAS_ERROR);
            }
        }
    }
}

// =====================================================================
// Tests
// =====================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;
    use std::cell::Cell;
    use std::rc::Rc;

    fn form_with(controls: Vec<Element>) -> (Validation, Page, NodeId) {
        let page = Page::new();
        let form = page.append(page.root(), Element::new("form").children(controls));
        (Validation::new(page.clone()), page, form)
    }

    fn text_input(name: &str, kind: &str, value: &str) -> Element {
        Element::new("input")
            .attr("type", "text")
            .attr("name", name)
            .attr(ATTR_VALIDATE, kind)
            .value(value)
    }

    #[test]
    fn test_text_and_mail_kinds() {
        let (validation, _page, form) = form_with(vec![
            text_input("town", "text", "Kassel"),
            text_input("email", "mail", "not-an-address"),
        ]);
        let report = validation.validate(form);
        assert_eq!(report.failing.len(), 1);

        let (validation, _page, form) = form_with(vec![
            text_input("email", "mail", " anna@example.com "),
            text_input("zip", "number", "34117"),
        ]);
        assert!(validation.validate(form).passed());
    }

    #[test]
    fn test_blank_text_fails_and_recovers() {
        let (validation, page, form) = form_with(vec![text_input("town", "text", "   ")]);
        let control = page.select("input")[0];
        assert!(!validation.validate(form).passed());
        assert!(page.has_class(control, CLASS_HAS_ERROR));

        page.set_value(control, "Kassel");
        assert!(validation.validate(form).passed());
        assert!(!page.has_class(control, CLASS_HAS_ERROR));
    }

    #[test]
    fn test_value_kind_matches_expected() {
        let (validation, _page, form) = form_with(vec![
            text_input("confirm", "value", "DELETE").attr(ATTR_EXPECTED_VALUE, "DELETE"),
        ]);
        assert!(validation.validate(form).passed());

        let (validation, _page, form) = form_with(vec![
            text_input("confirm", "value", "delete").attr(ATTR_EXPECTED_VALUE, "DELETE"),
        ]);
        assert!(!validation.validate(form).passed());
    }

    #[test]
    fn test_select_rejects_placeholder_values() {
        for (value, expect) in [("", false), ("-1", false), ("2", true)] {
            let (validation, _page, form) = form_with(vec![
                Element::new("select")
                    .attr("name", "salutation")
                    .attr(ATTR_VALIDATE, "text")
                    .value(value),
            ]);
            assert_eq!(validation.validate(form).passed(), expect, "value {value:?}");
        }
    }

    #[test]
    fn test_checkbox_group_bounds() {
        let checkbox = |name: &str, checked: bool| {
            Element::new("input")
                .attr("type", "checkbox")
                .attr("name", name)
                .attr(ATTR_VALIDATE, "none")
                .checked(checked)
        };
        // Default minimum of one checked member.
        let (validation, _page, form) =
            form_with(vec![checkbox("terms", false), checkbox("privacy", false)]);
        let report = validation.validate(form);
        assert_eq!(report.failing.len(), 2);

        // Explicit bounds: exactly two of three.
        let (validation, _page, form) = form_with(vec![
            checkbox("extras", true).attr(ATTR_GROUP_MIN, "2").attr(ATTR_GROUP_MAX, "2"),
            checkbox("extras", true),
            checkbox("extras", true),
        ]);
        assert!(!validation.validate(form).passed());
    }

    #[test]
    fn test_wrapper_gets_error_class() {
        let page = Page::new();
        let form = page.append(
            page.root(),
            Element::new("form").child(
                Element::new("div")
                    .class("form-group")
                    .child(text_input("town", "text", "")),
            ),
        );
        let validation = Validation::new(page.clone());
        validation.validate(form);
        assert!(page.has_class(page.select(".form-group")[0], CLASS_HAS_ERROR));
    }

    #[test]
    fn test_failed_pass_fires_document_event_with_nodes() {
        let (validation, page, form) = form_with(vec![text_input("town", "text", "")]);
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        page.document_on(
            EVENT_VALIDATION_FAILED,
            Rc::new(move |ev, _| {
                assert_eq!(ev.detail["nodes"].as_array().map(Vec::len), Some(1));
                counter.set(counter.get() + 1);
            }),
        );
        let report = validation.validate(form);
        assert_eq!(fired.get(), 1);
        // The event names the same control the report does.
        let town = page.select("input[name=\"town\"]")[0];
        assert_eq!(report.failing, vec![town]);
    }
}
