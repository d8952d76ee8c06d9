//! # Form Serialization
//!
//! Turns the named controls inside a form element into a nested JSON
//! value. Bracketed names build objects (`customer[address][town]`),
//! checkboxes sharing a name collect into an array, and unchecked
//! checkboxes and radios contribute nothing, mirroring what a browser
//! would submit.

use serde_json::{Map, Value};

use super::document::{NodeId, Page};

/// Serialize every named, enabled control under `form` (inputs, selects,
/// textareas) into one JSON object.
pub fn form_values(page: &Page, form: NodeId) -> Value {
    let mut root = Map::new();
    for control in page.select_within(form, "input, select, textarea") {
        let Some(name) = page.attr(control, "name") else {
            continue;
        };
        if name.is_empty() || !page.enabled(control) {
            continue;
        }
        let kind = page.attr(control, "type").unwrap_or_default();
        match kind.as_str() {
            "checkbox" => {
                if !page.checked(control) {
                    continue;
                }
                let value = checkbox_value(page, control);
                push_checkbox(&mut root, &name, value);
            }
            "radio" => {
                if !page.checked(control) {
                    continue;
                }
                insert_path(&mut root, &name, Value::String(page.value(control)));
            }
            _ => {
                insert_path(&mut root, &name, Value::String(page.value(control)));
            }
        }
    }
    Value::Object(root)
}

fn checkbox_value(page: &Page, control: NodeId) -> Value {
    let value = page.value(control);
    if value.is_empty() {
        Value::String("on".to_string())
    } else {
        Value::String(value)
    }
}

/// Split `customer[address][town]` into `["customer", "address", "town"]`.
/// A malformed name (unbalanced bracket) is kept whole as one segment.
fn split_path(name: &str) -> Vec<String> {
    let Some(open) = name.find('[') else {
        return vec![name.to_string()];
    };
    let mut segments = vec![name[..open].to_string()];
    let mut rest = &name[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return vec![name.to_string()];
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return vec![name.to_string()];
    }
    segments
}

fn insert_path(root: &mut Map<String, Value>, name: &str, value: Value) {
    let segments = split_path(name);
    insert_segments(root, &segments, value);
}

fn insert_segments(map: &mut Map<String, Value>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                // A scalar already claimed this segment; the nested write
                // wins, matching last-writer-wins for flat names.
                *entry = Value::Object(Map::new());
            }
            if let Some(obj) = entry.as_object_mut() {
                insert_segments(obj, rest, value);
            }
        }
    }
}

/// Checkboxes with a shared name accumulate: scalar on first sight, array
/// from the second on.
fn push_checkbox(root: &mut Map<String, Value>, name: &str, value: Value) {
    let segments = split_path(name);
    push_checkbox_segments(root, &segments, value);
}

fn push_checkbox_segments(map: &mut Map<String, Value>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [last] => match map.get_mut(last.as_str()) {
            None => {
                map.insert(last.clone(), value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        },
        [head, rest @ ..] => {
            let entry = map
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Some(obj) = entry.as_object_mut() {
                push_checkbox_segments(obj, rest, value);
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
    use crate::dom::document::Element;
    use serde_json::json;

    fn form_page(controls: Vec<Element>) -> (Page, NodeId) {
        let page = Page::new();
        let form = page.append(page.root(), Element::new("form").children(controls));
        (page, form)
    }

    fn input(name: &str, value: &str) -> Element {
        Element::new("input")
            .attr("type", "text")
            .attr("name", name)
            .value(value)
    }

    fn checkbox(name: &str, value: &str, checked: bool) -> Element {
        Element::new("input")
            .attr("type", "checkbox")
            .attr("name", name)
            .value(value)
            .checked(checked)
    }

    #[test]
    fn test_flat_and_nested_names() {
        let (page, form) = form_page(vec![
            input("quantity", "2"),
            input("customer[address][town]", "Kassel"),
            input("customer[address][zip]", "34117"),
        ]);
        let values = form_values(&page, form);
        assert_eq!(
            values,
            json!({
                "quantity": "2",
                "customer": {"address": {"town": "Kassel", "zip": "34117"}}
            })
        );
    }

    #[test]
    fn test_checkbox_groups_collect_arrays() {
        let (page, form) = form_page(vec![
            checkbox("extras", "gift-wrap", true),
            checkbox("extras", "express", true),
            checkbox("extras", "insurance", false),
            checkbox("terms", "", true),
        ]);
        let values = form_values(&page, form);
        assert_eq!(values["extras"], json!(["gift-wrap", "express"]));
        assert_eq!(values["terms"], json!("on"));
    }

    #[test]
    fn test_radio_contributes_only_checked() {
        let (page, form) = form_page(vec![
            Element::new("input")
                .attr("type", "radio")
                .attr("name", "shipping")
                .value("standard"),
            Element::new("input")
                .attr("type", "radio")
                .attr("name", "shipping")
                .value("express")
                .checked(true),
        ]);
        let values = form_values(&page, form);
        assert_eq!(values["shipping"], json!("express"));
    }

    #[test]
    fn test_select_and_unnamed_controls() {
        let (page, form) = form_page(vec![
            Element::new("select").attr("name", "salutation").value("mr"),
            Element::new("input").value("ignored"),
        ]);
        let values = form_values(&page, form);
        assert_eq!(values, json!({"salutation": "mr"}));
    }

    #[test]
    fn test_disabled_controls_are_skipped() {
        let (page, form) = form_page(vec![input("kept", "1"), input("dropped", "2")]);
        let dropped = page.select("input[name=\"dropped\"]")[0];
        page.set_enabled(dropped, false);
        let values = form_values(&page, form);
        assert_eq!(values, json!({"kept": "1"}));
    }

    #[test]
    fn test_malformed_bracket_name_stays_flat() {
        let (page, form) = form_page(vec![input("broken[path", "x")]);
        let values = form_values(&page, form);
        assert_eq!(values, json!({"broken[path": "x"}));
    }
}
