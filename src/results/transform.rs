//! Named report transforms
//!
//! Each transform renders the aggregate `assemblies` document into the
//! bytes of one output artifact.

use std::fmt::Write;

use super::document::escape_xml;
use super::ReportNode;
use crate::error::RunnerError;

/// Transform identifiers accepted by [`transform_by_name`]
pub const TRANSFORM_NAMES: &[&str] = &["xml", "xmlv1", "html", "json", "csv"];

const ROOT: &str = "assemblies";

/// Pure rendering of a report document
pub trait ReportTransform: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, document: &ReportNode) -> Result<Vec<u8>, RunnerError>;
}

/// Look up a built-in transform by identifier
pub fn transform_by_name(name: &str) -> Result<Box<dyn ReportTransform>, RunnerError> {
    match name.to_lowercase().as_str() {
        "xml" => Ok(Box::new(NativeXml)),
        "xmlv1" | "xml-v1" => Ok(Box::new(LegacyXml)),
        "html" => Ok(Box::new(HtmlReport)),
        "json" => Ok(Box::new(JsonReport)),
        "csv" => Ok(Box::new(CsvReport)),
        _ => Err(RunnerError::UnknownTransform(format!(
            "{} (available: {})",
            name,
            TRANSFORM_NAMES.join(", ")
        ))),
    }
}

fn transform_error(name: &str, reason: impl ToString) -> RunnerError {
    RunnerError::Transform {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn expect_root(transform: &str, document: &ReportNode) -> Result<(), RunnerError> {
    if document.name == ROOT {
        Ok(())
    } else {
        Err(transform_error(
            transform,
            format!("expected <{ROOT}> root, found <{}>", document.name),
        ))
    }
}

fn attr_or<'a>(node: &'a ReportNode, key: &str, default: &'a str) -> &'a str {
    node.attr(key).unwrap_or(default)
}

fn attr_u32(node: &ReportNode, key: &str) -> u32 {
    node.attr(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn attr_f64(node: &ReportNode, key: &str) -> f64 {
    node.attr(key).and_then(|v| v.parse().ok()).unwrap_or(0.0)
}

/// Native document, serialised as-is
struct NativeXml;

impl ReportTransform for NativeXml {
    fn name(&self) -> &str {
        "xml"
    }

    fn render(&self, document: &ReportNode) -> Result<Vec<u8>, RunnerError> {
        expect_root(self.name(), document)?;
        Ok(document.to_xml().into_bytes())
    }
}

/// Legacy schema: collections become classes and attribute names are
/// camel-cased
struct LegacyXml;

impl LegacyXml {
    fn assembly(assembly: &ReportNode) -> ReportNode {
        let mut node = ReportNode::new("assembly");
        for (key, legacy) in [
            ("name", "name"),
            ("config-file", "configFile"),
            ("run-date", "run-date"),
            ("run-time", "run-time"),
            ("time", "time"),
            ("total", "total"),
            ("passed", "passed"),
            ("failed", "failed"),
            ("skipped", "skipped"),
            ("environment", "environment"),
            ("test-framework", "test-framework"),
        ] {
            if let Some(value) = assembly.attr(key) {
                node.set_attr(legacy, value);
            }
        }

        for child in &assembly.children {
            match child.name.as_str() {
                "collection" => node.push(Self::class(child)),
                _ => node.push(child.clone()),
            }
        }
        node
    }

    fn class(collection: &ReportNode) -> ReportNode {
        let mut class = ReportNode::new("class");
        for key in ["name", "time", "total", "passed", "failed", "skipped"] {
            if let Some(value) = collection.attr(key) {
                class.set_attr(key, value);
            }
        }

        for test in collection.children_named("test") {
            let mut node = ReportNode::new("test");
            for key in ["name", "type", "method", "result", "time"] {
                if let Some(value) = test.attr(key) {
                    node.set_attr(key, value);
                }
            }

            for child in &test.children {
                match (child.name.as_str(), &child.text) {
                    ("reason", Some(reason)) => node.push(
                        ReportNode::new("reason")
                            .with_child(ReportNode::new("message").with_text(reason.clone())),
                    ),
                    ("failure", _) => {
                        let mut failure = child.clone();
                        failure.set_attr("exception-type", "Failure");
                        node.push(failure);
                    }
                    _ => node.push(child.clone()),
                }
            }
            class.push(node);
        }
        class
    }
}

impl ReportTransform for LegacyXml {
    fn name(&self) -> &str {
        "xmlv1"
    }

    fn render(&self, document: &ReportNode) -> Result<Vec<u8>, RunnerError> {
        expect_root(self.name(), document)?;

        let mut legacy = ReportNode::new(ROOT);
        for assembly in document.children_named("assembly") {
            legacy.push(Self::assembly(assembly));
        }
        Ok(legacy.to_xml().into_bytes())
    }
}

/// Standalone HTML page
struct HtmlReport;

impl HtmlReport {
    fn write_assembly(output: &mut String, assembly: &ReportNode) {
        writeln!(
            output,
            r#"
        <h2>{}</h2>
        <p>Total: {}, Failed: {}, Skipped: {}, Time: {}s</p>"#,
            escape_xml(attr_or(assembly, "name", "(unknown)")),
            attr_u32(assembly, "total"),
            attr_u32(assembly, "failed"),
            attr_u32(assembly, "skipped"),
            attr_or(assembly, "time", "0.000")
        )
        .unwrap();

        if let Some(errors) = assembly.child("errors") {
            for error in errors.children_named("error") {
                writeln!(
                    output,
                    r#"        <p class="fail">{}</p>"#,
                    escape_xml(
                        error
                            .child("message")
                            .and_then(|m| m.text.as_deref())
                            .unwrap_or_default()
                    )
                )
                .unwrap();
            }
        }

        writeln!(
            output,
            r#"        <table>
            <tr>
                <th>Collection</th>
                <th>Test</th>
                <th>Result</th>
                <th>Time</th>
                <th>Details</th>
            </tr>"#
        )
        .unwrap();

        for collection in assembly.children_named("collection") {
            for test in collection.children_named("test") {
                let result = attr_or(test, "result", "");
                let class = match result {
                    "Pass" => "pass",
                    "Fail" => "fail",
                    _ => "skip",
                };
                let details = test
                    .child("failure")
                    .and_then(|f| f.child("message"))
                    .or_else(|| test.child("reason"))
                    .and_then(|n| n.text.as_deref())
                    .unwrap_or("");

                writeln!(
                    output,
                    r#"            <tr>
                <td>{}</td>
                <td>{}</td>
                <td class="{}">{}</td>
                <td>{}s</td>
                <td><pre>{}</pre></td>
            </tr>"#,
                    escape_xml(attr_or(collection, "name", "")),
                    escape_xml(attr_or(test, "name", "")),
                    class,
                    result,
                    attr_or(test, "time", "0.000"),
                    escape_xml(details)
                )
                .unwrap();
            }
        }

        writeln!(output, "        </table>").unwrap();
    }
}

impl ReportTransform for HtmlReport {
    fn name(&self) -> &str {
        "html"
    }

    fn render(&self, document: &ReportNode) -> Result<Vec<u8>, RunnerError> {
        expect_root(self.name(), document)?;

        let assemblies: Vec<&ReportNode> = document.children_named("assembly").collect();
        let total: u32 = assemblies.iter().map(|a| attr_u32(a, "total")).sum();
        let failed: u32 = assemblies.iter().map(|a| attr_u32(a, "failed")).sum();
        let skipped: u32 = assemblies.iter().map(|a| attr_u32(a, "skipped")).sum();
        let time: f64 = assemblies.iter().map(|a| attr_f64(a, "time")).sum();

        let mut output = String::new();
        writeln!(
            output,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Test Results</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; background: #f5f5f5; }}
        .container {{ max-width: 1200px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; border-bottom: 2px solid #007bff; padding-bottom: 10px; }}
        h2 {{ color: #555; margin-top: 30px; }}
        table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}
        th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid #ddd; vertical-align: top; }}
        th {{ background: #007bff; color: white; }}
        pre {{ margin: 0; white-space: pre-wrap; }}
        .pass {{ color: #28a745; font-weight: bold; }}
        .fail {{ color: #dc3545; font-weight: bold; }}
        .skip {{ color: #d39e00; font-weight: bold; }}
        .stat-card {{ display: inline-block; background: #f8f9fa; padding: 20px; margin: 10px; border-radius: 8px; min-width: 150px; text-align: center; }}
        .stat-value {{ font-size: 24px; font-weight: bold; color: #007bff; }}
        .stat-label {{ color: #666; font-size: 14px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Test Results</h1>
        <div class="stat-card"><div class="stat-value">{}</div><div class="stat-label">Assemblies</div></div>
        <div class="stat-card"><div class="stat-value">{}</div><div class="stat-label">Total</div></div>
        <div class="stat-card"><div class="stat-value">{}</div><div class="stat-label">Failed</div></div>
        <div class="stat-card"><div class="stat-value">{}</div><div class="stat-label">Skipped</div></div>
        <div class="stat-card"><div class="stat-value">{:.3}s</div><div class="stat-label">Time</div></div>"#,
            assemblies.len(),
            total,
            failed,
            skipped,
            time
        )
        .unwrap();

        for assembly in assemblies {
            Self::write_assembly(&mut output, assembly);
        }

        writeln!(
            output,
            r#"    </div>
</body>
</html>"#
        )
        .unwrap();

        Ok(output.into_bytes())
    }
}

/// JSON rendering of the document tree
struct JsonReport;

impl ReportTransform for JsonReport {
    fn name(&self) -> &str {
        "json"
    }

    fn render(&self, document: &ReportNode) -> Result<Vec<u8>, RunnerError> {
        expect_root(self.name(), document)?;
        serde_json::to_vec_pretty(&document.to_json()).map_err(|e| transform_error(self.name(), e))
    }
}

/// One CSV row per test
struct CsvReport;

impl ReportTransform for CsvReport {
    fn name(&self) -> &str {
        "csv"
    }

    fn render(&self, document: &ReportNode) -> Result<Vec<u8>, RunnerError> {
        expect_root(self.name(), document)?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["assembly", "collection", "test", "result", "time", "message"])
            .map_err(|e| transform_error(self.name(), e))?;

        for assembly in document.children_named("assembly") {
            for collection in assembly.children_named("collection") {
                for test in collection.children_named("test") {
                    let message = test
                        .child("failure")
                        .and_then(|f| f.child("message"))
                        .or_else(|| test.child("reason"))
                        .and_then(|n| n.text.as_deref())
                        .unwrap_or("");

                    writer
                        .write_record([
                            attr_or(assembly, "name", ""),
                            attr_or(collection, "name", ""),
                            attr_or(test, "name", ""),
                            attr_or(test, "result", ""),
                            attr_or(test, "time", ""),
                            message,
                        ])
                        .map_err(|e| transform_error(self.name(), e))?;
                }
            }
        }

        writer
            .into_inner()
            .map_err(|e| transform_error(self.name(), e))
    }
}
