//! Deep structural comparison of JSON and XML documents.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

/// How strictly two JSON documents are compared.
///
/// - `Strict`: no extra fields, array order significant
/// - `Lenient`: extra fields on the actual side allowed, array order ignored
/// - `NonExtensible`: no extra fields, array order ignored (the default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JsonCompareMode {
    Strict,
    Lenient,
    #[default]
    NonExtensible,
}

impl JsonCompareMode {
    fn allows_extra_fields(self) -> bool {
        matches!(self, JsonCompareMode::Lenient)
    }

    fn strict_array_order(self) -> bool {
        matches!(self, JsonCompareMode::Strict)
    }
}

impl fmt::Display for JsonCompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonCompareMode::Strict => "STRICT",
            JsonCompareMode::Lenient => "LENIENT",
            JsonCompareMode::NonExtensible => "NON_EXTENSIBLE",
        };
        f.write_str(name)
    }
}

/// Compare `actual` against `expected`.
///
/// Object field order never matters and numbers compare by value, so `0`
/// equals `0.0`.
pub fn json_equals(expected: &Value, actual: &Value, mode: JsonCompareMode) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => numbers_equal(e, a),
        (Value::Object(e), Value::Object(a)) => {
            if !mode.allows_extra_fields() && e.len() != a.len() {
                return false;
            }
            e.iter().all(|(key, expected_value)| {
                a.get(key)
                    .is_some_and(|actual_value| json_equals(expected_value, actual_value, mode))
            })
        }
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                return false;
            }
            if mode.strict_array_order() {
                e.iter().zip(a).all(|(x, y)| json_equals(x, y, mode))
            } else {
                let mut used = vec![false; a.len()];
                assign_unordered(e, a, &mut used, mode)
            }
        }
        (e, a) => e == a,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

// Backtracking assignment of expected elements onto unused actual elements.
fn assign_unordered(
    expected: &[Value],
    actual: &[Value],
    used: &mut [bool],
    mode: JsonCompareMode,
) -> bool {
    let Some((first, rest)) = expected.split_first() else {
        return true;
    };
    for (i, candidate) in actual.iter().enumerate() {
        if used[i] || !json_equals(first, candidate, mode) {
            continue;
        }
        used[i] = true;
        if assign_unordered(rest, actual, used, mode) {
            return true;
        }
        used[i] = false;
    }
    false
}

/// Whitespace-normalised XML tree used for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum XmlNode {
    Element {
        namespace: Option<String>,
        name: String,
        attributes: BTreeMap<(Option<String>, String), String>,
        children: Vec<XmlNode>,
    },
    Text(String),
}

/// Parse an XML document into a normalised tree, or `None` if it is not
/// well-formed.
pub(crate) fn parse_xml(text: &str) -> Option<XmlNode> {
    let package = parser::parse(text).ok()?;
    let document = package.as_document();
    let root_element = document
        .root()
        .children()
        .into_iter()
        .find_map(|child| match child {
            ChildOfRoot::Element(element) => Some(element),
            _ => None,
        })?;
    Some(normalise(root_element))
}

fn normalise(element: Element<'_>) -> XmlNode {
    let name = element.name();
    let attributes = element
        .attributes()
        .into_iter()
        .map(|attribute| {
            let attr_name = attribute.name();
            (
                (
                    attr_name.namespace_uri().map(str::to_string),
                    attr_name.local_part().to_string(),
                ),
                attribute.value().to_string(),
            )
        })
        .collect();

    let mut children = Vec::new();
    let mut pending_text = String::new();
    for child in element.children() {
        match child {
            ChildOfElement::Element(nested) => {
                flush_text(&mut pending_text, &mut children);
                children.push(normalise(nested));
            }
            ChildOfElement::Text(text) => pending_text.push_str(text.text()),
            _ => {}
        }
    }
    flush_text(&mut pending_text, &mut children);

    XmlNode::Element {
        namespace: name.namespace_uri().map(str::to_string),
        name: name.local_part().to_string(),
        attributes,
        children,
    }
}

// Whitespace-only runs are insignificant; other text is trimmed.
fn flush_text(pending: &mut String, children: &mut Vec<XmlNode>) {
    let trimmed = pending.trim();
    if !trimmed.is_empty() {
        children.push(XmlNode::Text(trimmed.to_string()));
    }
    pending.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(json_equals(
            &json!({"x": 0}),
            &json!({"x": 0.0}),
            JsonCompareMode::NonExtensible
        ));
        assert!(!json_equals(
            &json!({"x": 1}),
            &json!({"x": 1.5}),
            JsonCompareMode::NonExtensible
        ));
    }

    #[test]
    fn test_extra_fields_depend_on_mode() {
        let expected = json!({"x": 0});
        let actual = json!({"x": 0, "y": 1});
        assert!(!json_equals(&expected, &actual, JsonCompareMode::NonExtensible));
        assert!(!json_equals(&expected, &actual, JsonCompareMode::Strict));
        assert!(json_equals(&expected, &actual, JsonCompareMode::Lenient));
    }

    #[test]
    fn test_array_order() {
        let expected = json!([1, {"a": 2}, 3]);
        let shuffled = json!([3, 1, {"a": 2}]);
        assert!(json_equals(&expected, &shuffled, JsonCompareMode::NonExtensible));
        assert!(json_equals(&expected, &shuffled, JsonCompareMode::Lenient));
        assert!(!json_equals(&expected, &shuffled, JsonCompareMode::Strict));
        assert!(!json_equals(&json!([1, 1]), &json!([1, 2]), JsonCompareMode::Lenient));
    }

    #[test]
    fn test_unordered_assignment_backtracks() {
        // The first expected element matches both actual objects in lenient
        // mode; a greedy pick of the first one would strand the second.
        let expected = json!([{"a": 1}, {"a": 1, "b": 2}]);
        let actual = json!([{"a": 1, "b": 2}, {"a": 1}]);
        assert!(json_equals(&expected, &actual, JsonCompareMode::Lenient));
    }

    #[test]
    fn test_compare_mode_wire_names() {
        let mode: JsonCompareMode = serde_json::from_str("\"LENIENT\"").unwrap();
        assert_eq!(mode, JsonCompareMode::Lenient);
        let mode: JsonCompareMode = serde_json::from_str("\"NON_EXTENSIBLE\"").unwrap();
        assert_eq!(mode, JsonCompareMode::NonExtensible);
        assert_eq!(JsonCompareMode::default().to_string(), "NON_EXTENSIBLE");
    }

    #[test]
    fn test_xml_ignores_insignificant_whitespace() {
        let compact = parse_xml("<order><id>7</id><item sku=\"a\">pen</item></order>").unwrap();
        let pretty = parse_xml(
            "<order>\n  <id> 7 </id>\n  <item sku=\"a\">\n    pen\n  </item>\n</order>",
        )
        .unwrap();
        assert_eq!(compact, pretty);
    }

    #[test]
    fn test_xml_detects_differences() {
        let a = parse_xml("<order><id>7</id></order>").unwrap();
        let b = parse_xml("<order><id>8</id></order>").unwrap();
        let c = parse_xml("<order id=\"7\"/>").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(parse_xml("not xml").is_none());
    }
}
