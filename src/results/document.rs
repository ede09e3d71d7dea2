//! Report document tree
//!
//! A minimal element tree: name, ordered attributes, optional text and
//! child elements. Serialises to indented XML or to JSON.

use serde_json::{json, Map, Value};
use std::fmt::Write;

/// One element of a report document
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<ReportNode>,
}

impl ReportNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: ReportNode) -> Self {
        self.children.push(child);
        self
    }

    /// Set an attribute, replacing any existing value for `key`
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, child: ReportNode) {
        self.children.push(child);
    }

    pub fn child(&self, name: &str) -> Option<&ReportNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ReportNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Render as an indented XML document with declaration
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        self.write_xml(&mut out, 0);
        out
    }

    fn write_xml(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        write!(out, "{indent}<{}", self.name).unwrap();
        for (key, value) in &self.attributes {
            write!(out, " {}=\"{}\"", key, escape_xml(value)).unwrap();
        }

        match (&self.text, self.children.is_empty()) {
            (None, true) => out.push_str(" />\n"),
            (Some(text), true) => {
                writeln!(out, ">{}</{}>", escape_xml(text), self.name).unwrap();
            }
            (text, false) => {
                out.push_str(">\n");
                if let Some(text) = text {
                    writeln!(out, "{indent}  {}", escape_xml(text)).unwrap();
                }
                for child in &self.children {
                    child.write_xml(out, depth + 1);
                }
                writeln!(out, "{indent}</{}>", self.name).unwrap();
            }
        }
    }

    /// Render as a JSON value
    pub fn to_json(&self) -> Value {
        let attributes: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let mut node = json!({ "name": self.name });
        if !attributes.is_empty() {
            node["attributes"] = Value::Object(attributes);
        }
        if let Some(text) = &self.text {
            node["text"] = Value::String(text.clone());
        }
        if !self.children.is_empty() {
            node["children"] = Value::Array(self.children.iter().map(|c| c.to_json()).collect());
        }
        node
    }
}

/// Escape text for use in XML content and attribute values
pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            c if (c as u32) < 0x20 => {}
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attr_replaces() {
        let mut node = ReportNode::new("assembly").with_attr("total", 1);
        node.set_attr("total", 2);
        node.set_attr("failed", 0);

        assert_eq!(node.attr("total"), Some("2"));
        assert_eq!(node.attributes.len(), 2);
    }

    #[test]
    fn test_to_xml() {
        let doc = ReportNode::new("assemblies").with_child(
            ReportNode::new("assembly")
                .with_attr("name", "a<b>")
                .with_child(ReportNode::new("message").with_text("x & y"))
                .with_child(ReportNode::new("empty")),
        );

        let xml = doc.to_xml();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<assembly name=\"a&lt;b&gt;\">"));
        assert!(xml.contains("    <message>x &amp; y</message>"));
        assert!(xml.contains("    <empty />"));
        assert!(xml.trim_end().ends_with("</assemblies>"));
    }

    #[test]
    fn test_to_json() {
        let node = ReportNode::new("test")
            .with_attr("result", "Pass")
            .with_child(ReportNode::new("output").with_text("hi"));

        let json = node.to_json();
        assert_eq!(json["name"], "test");
        assert_eq!(json["attributes"]["result"], "Pass");
        assert_eq!(json["children"][0]["text"], "hi");
    }

    #[test]
    fn test_escape_control_characters() {
        assert_eq!(escape_xml("a\u{1}b\nc"), "ab&#10;c");
    }
}
