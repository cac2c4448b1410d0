//! Form field access over the in-memory document.

use serde_json::Value;
use shared::protocol::{Payload, RESERVED_FIELDS};
use tracing::warn;

use crate::dom::{Document, Element, NodeId};

const SKIPPED_INPUT_TYPES: [&str; 5] = ["submit", "button", "reset", "file", "image"];

fn is_field(el: &Element) -> bool {
    matches!(el.tag(), "input" | "select" | "textarea")
}

fn input_type(el: &Element) -> String {
    el.attr("type").unwrap_or("text").to_ascii_lowercase()
}

fn fields(doc: &Document, scope: NodeId) -> Vec<NodeId> {
    doc.find_all(scope, |el| is_field(el) && !el.has_attr("disabled"))
}

/// Current value of a single control, as a browser would submit it.
/// `None` for unchecked checkboxes and radios.
pub fn field_value(doc: &Document, node: NodeId) -> Option<String> {
    let el = doc.element(node)?;
    match el.tag() {
        "textarea" => Some(doc.text_content(node)),
        "select" => {
            let options = doc.find_all(node, |o| o.tag() == "option");
            let chosen = options
                .iter()
                .copied()
                .find(|o| doc.has_attr(*o, "selected"))
                .or_else(|| options.first().copied())?;
            Some(option_value(doc, chosen))
        }
        _ => match input_type(el).as_str() {
            "checkbox" | "radio" => el
                .has_attr("checked")
                .then(|| el.attr("value").unwrap_or("on").to_string()),
            _ => Some(el.attr("value").unwrap_or_default().to_string()),
        },
    }
}

fn option_value(doc: &Document, option: NodeId) -> String {
    match doc.attr(option, "value") {
        Some(value) => value.to_string(),
        None => doc.text_content(option).trim().to_string(),
    }
}

/// Serializes the named, enabled controls under `form`.
///
/// Names ending in `[]` and multi-selects collect into arrays; any other
/// repeated name keeps its last value. Fields named like the request
/// envelope's own keys are left out.
pub fn serialize(doc: &Document, form: NodeId) -> Payload {
    let mut payload = Payload::new();
    for node in fields(doc, form) {
        let Some(el) = doc.element(node) else {
            continue;
        };
        let Some(name) = el.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        if el.tag() == "input" && SKIPPED_INPUT_TYPES.contains(&input_type(el).as_str()) {
            continue;
        }
        if RESERVED_FIELDS.contains(&name.trim_end_matches("[]")) {
            warn!(field = name, "form field uses a reserved request name; skipped");
            continue;
        }

        if el.tag() == "select" && el.has_attr("multiple") {
            let selected: Vec<Value> = doc
                .find_all(node, |o| o.tag() == "option" && o.has_attr("selected"))
                .into_iter()
                .map(|o| Value::String(option_value(doc, o)))
                .collect();
            payload.insert(name.trim_end_matches("[]").to_string(), Value::Array(selected));
            continue;
        }

        let Some(value) = field_value(doc, node) else {
            continue;
        };
        match name.strip_suffix("[]") {
            Some(base) => {
                let entry = payload
                    .entry(base.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(values) = entry {
                    values.push(Value::String(value));
                }
            }
            None => {
                payload.insert(name.to_string(), Value::String(value));
            }
        }
    }
    payload
}

/// Required controls under `form` that are empty, in document order.
pub fn invalid_fields(doc: &Document, form: NodeId) -> Vec<NodeId> {
    let all = fields(doc, form);
    all.iter()
        .copied()
        .filter(|node| doc.has_attr(*node, "required"))
        .filter(|node| {
            let Some(el) = doc.element(*node) else {
                return false;
            };
            if el.tag() == "input" && input_type(el) == "radio" {
                let name = el.attr("name").unwrap_or_default();
                return !all.iter().any(|other| {
                    doc.attr(*other, "name") == Some(name) && doc.has_attr(*other, "checked")
                });
            }
            field_value(doc, *node).map_or(true, |value| value.trim().is_empty())
        })
        .collect()
}

/// Sets the control named `name` under `scope`. Returns false when no such
/// control exists. Checkboxes treat `""`, `"0"` and `"false"` as unchecked.
pub fn set_field(doc: &mut Document, scope: NodeId, name: &str, value: &str) -> bool {
    let Some(node) = doc.find(scope, |el| is_field(el) && el.attr("name") == Some(name)) else {
        return false;
    };
    let Some(el) = doc.element(node) else {
        return false;
    };
    match el.tag() {
        "textarea" => doc.set_text(node, value),
        "select" => {
            let options = doc.find_all(node, |o| o.tag() == "option");
            for option in options {
                let matches = option_value(doc, option) == value;
                doc.set_bool_attr(option, "selected", matches);
            }
        }
        _ => match input_type(el).as_str() {
            "checkbox" => {
                let on = !matches!(value, "" | "0" | "false");
                doc.set_bool_attr(node, "checked", on);
            }
            "radio" => {
                let radios = doc.find_all(scope, |r| {
                    r.tag() == "input" && r.attr("name") == Some(name)
                });
                for radio in radios {
                    let on = doc.attr(radio, "value") == Some(value);
                    doc.set_bool_attr(radio, "checked", on);
                }
            }
            _ => doc.set_attr(node, "value", value),
        },
    }
    true
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
