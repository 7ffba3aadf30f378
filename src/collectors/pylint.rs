use super::tool::{parse_error, ExternalTool};
use super::CollectorContext;
use crate::errors::Result;
use crate::evidence::{Draft, EvidenceDraft, Finding, FindingCategory, Severity};
use serde::Deserialize;
use std::time::Duration;

/// Pylint in JSON output mode.
pub struct Pylint;

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    path: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(rename = "message-id", default)]
    message_id: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    obj: Option<String>,
}

impl ExternalTool for Pylint {
    fn tool_name(&self) -> &'static str {
        "pylint"
    }

    fn executable(&self) -> &'static str {
        "pylint"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(180)
    }

    fn args(&self, _ctx: &CollectorContext) -> Result<Vec<String>> {
        Ok(["--output-format=json", "--recursive=y", "."]
            .map(String::from)
            .to_vec())
    }

    /// Pylint's exit status is a bit mask of message categories (1-31);
    /// 32 means a usage error.
    fn accepts_exit(&self, code: i32) -> bool {
        (0..32).contains(&code)
    }

    fn parse(&self, stdout: &str, ctx: &CollectorContext) -> Result<Vec<EvidenceDraft>> {
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let messages: Vec<Message> =
            serde_json::from_str(stdout).map_err(|e| parse_error(self.tool_name(), e))?;

        Ok(messages
            .into_iter()
            .map(|m| {
                let finding = Finding {
                    component: ctx.component_path(&m.path),
                    line: m.line,
                    column: m.column,
                    severity: Severity::from_label(m.kind.as_deref().unwrap_or("warning")),
                    category: FindingCategory::Quality,
                    code: m.symbol.or(m.message_id),
                    message: m.message,
                    confidence: 0.8,
                };
                let mut draft = Draft::new(self.tool_name(), finding)
                    .with_tag("lint")
                    .with_tag("pylint");
                if let Some(obj) = m.obj.filter(|o| !o.is_empty()) {
                    draft = draft.with_metadata("obj", obj);
                }
                draft.into()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectorsConfig;

    #[test]
    fn maps_message_types_onto_severity() {
        let ctx = CollectorContext::new("/repo", CollectorsConfig::default());
        let output = r#"[
            {"type": "error", "module": "app", "obj": "load", "line": 3, "column": 0,
             "path": "app/io.py", "symbol": "no-member", "message": "no member",
             "message-id": "E1101"},
            {"type": "convention", "module": "app", "obj": "", "line": 1, "column": 0,
             "path": "app/io.py", "symbol": "missing-module-docstring",
             "message": "Missing module docstring", "message-id": "C0114"}
        ]"#;

        let drafts = Pylint.parse(output, &ctx).unwrap();
        let findings: Vec<_> = drafts
            .iter()
            .map(|d| match d {
                EvidenceDraft::Finding(f) => f,
                _ => panic!("expected finding"),
            })
            .collect();

        assert_eq!(findings[0].body.severity, Severity::High);
        assert_eq!(findings[0].body.code.as_deref(), Some("no-member"));
        assert_eq!(findings[0].metadata["obj"], "load");
        assert_eq!(findings[1].body.severity, Severity::Low);
        assert!(!findings[1].metadata.contains_key("obj"));
        assert!(findings
            .iter()
            .all(|f| f.body.category == FindingCategory::Quality));
    }

    #[test]
    fn usage_error_exit_is_rejected() {
        assert!(Pylint.accepts_exit(0));
        assert!(Pylint.accepts_exit(30));
        assert!(!Pylint.accepts_exit(32));
    }

    #[test]
    fn object_payload_is_a_parse_error() {
        let ctx = CollectorContext::new("/repo", CollectorsConfig::default());
        assert!(Pylint.parse("{\"not\": \"a list\"}", &ctx).is_err());
    }
}
