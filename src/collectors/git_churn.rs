//! Per-file change history from `git log --numstat`.

use super::tool::{parse_error, ExternalTool};
use super::CollectorContext;
use crate::config::directory_ancestors;
use crate::errors::{Error, Result};
use crate::evidence::{Churn, Draft, EvidenceDraft};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

const COMMIT_PREFIX: &str = "commit:";

pub struct GitChurn;

#[derive(Debug, Default)]
struct FileHistory {
    commits: BTreeSet<String>,
    authors: BTreeSet<String>,
    added: u64,
    removed: u64,
    last_commit_at: Option<DateTime<Utc>>,
}

struct CommitHeader {
    hash: String,
    author: String,
    date: Option<DateTime<Utc>>,
}

fn parse_header(line: &str) -> Option<CommitHeader> {
    let rest = line.strip_prefix(COMMIT_PREFIX)?;
    let mut fields = rest.split('\t');
    let hash = fields.next()?.to_string();
    let author = fields.next().unwrap_or_default().to_string();
    let date = fields
        .next()
        .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
        .map(|d| d.with_timezone(&Utc));
    Some(CommitHeader { hash, author, date })
}

/// `added<TAB>removed<TAB>path`; binary files report `-` for both counts.
fn parse_numstat(line: &str) -> Option<(u64, u64, &str)> {
    let mut fields = line.splitn(3, '\t');
    let added = fields.next()?;
    let removed = fields.next()?;
    let path = fields.next()?.trim();
    if path.is_empty() {
        return None;
    }
    let count = |field: &str| -> Option<u64> {
        if field == "-" {
            Some(0)
        } else {
            field.parse().ok()
        }
    };
    Some((count(added)?, count(removed)?, path))
}

/// Aggregate a `git log` stream into per-file churn bodies.
pub fn parse_log(output: &str, window_days: u32, root: &Path) -> Result<Vec<Churn>> {
    let mut files: BTreeMap<String, FileHistory> = BTreeMap::new();
    let mut current: Option<CommitHeader> = None;

    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(COMMIT_PREFIX) {
            current = Some(
                parse_header(line)
                    .ok_or_else(|| parse_error("git-churn", format!("bad header {:?}", line)))?,
            );
            continue;
        }
        let Some(commit) = &current else {
            return Err(parse_error(
                "git-churn",
                format!("numstat line before any commit: {:?}", line),
            ));
        };
        let Some((added, removed, path)) = parse_numstat(line) else {
            log::debug!("git-churn: ignoring line {:?}", line);
            continue;
        };

        let history = files
            .entry(super::normalize_component(root, path))
            .or_default();
        history.commits.insert(commit.hash.clone());
        if !commit.author.is_empty() {
            history.authors.insert(commit.author.clone());
        }
        history.added += added;
        history.removed += removed;
        if let Some(date) = commit.date {
            history.last_commit_at = Some(history.last_commit_at.map_or(date, |d| d.max(date)));
        }
    }

    Ok(files
        .into_iter()
        .map(|(component, history)| Churn {
            component,
            commits: history.commits.len() as u32,
            lines_added: history.added,
            lines_removed: history.removed,
            contributors: history.authors.len() as u32,
            window_days,
            last_commit_at: history.last_commit_at,
        })
        .collect())
}

fn is_git_work_tree(target: &Path) -> bool {
    let start = target
        .canonicalize()
        .unwrap_or_else(|_| target.to_path_buf());
    directory_ancestors(start, 64).any(|dir| dir.join(".git").exists())
}

impl ExternalTool for GitChurn {
    fn tool_name(&self) -> &'static str {
        "git-churn"
    }

    fn executable(&self) -> &'static str {
        "git"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    fn artifact_extension(&self) -> &'static str {
        "log"
    }

    fn args(&self, ctx: &CollectorContext) -> Result<Vec<String>> {
        if !is_git_work_tree(&ctx.target) {
            return Err(Error::ToolUnavailable {
                tool: self.tool_name().to_string(),
                message: format!("{} is not inside a git repository", ctx.target.display()),
            });
        }
        Ok(vec![
            "log".to_string(),
            format!("--since={} days ago", ctx.config.churn_window_days),
            "--pretty=format:commit:%H%x09%an%x09%aI".to_string(),
            "--numstat".to_string(),
            "--no-renames".to_string(),
            "--relative".to_string(),
        ])
    }

    fn accepts_exit(&self, code: i32) -> bool {
        code == 0
    }

    fn parse(&self, stdout: &str, ctx: &CollectorContext) -> Result<Vec<EvidenceDraft>> {
        Ok(parse_log(stdout, ctx.config.churn_window_days, &ctx.target)?
            .into_iter()
            .map(|churn| {
                Draft::new(self.tool_name(), churn)
                    .with_tag("churn")
                    .into()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectorsConfig;
    use pretty_assertions::assert_eq;

    const LOG: &str = "commit:aaa111\tAda\t2025-10-20T10:00:00+00:00\n\
                       12\t3\tsrc/app.py\n\
                       1\t0\tREADME.md\n\
                       \n\
                       commit:bbb222\tGrace\t2025-10-22T08:30:00+02:00\n\
                       5\t5\tsrc/app.py\n\
                       -\t-\tassets/logo.png\n";

    #[test]
    fn aggregates_commits_lines_and_authors_per_file() {
        let churn = parse_log(LOG, 90, Path::new("/repo")).unwrap();
        let app = churn.iter().find(|c| c.component == "src/app.py").unwrap();

        assert_eq!(app.commits, 2);
        assert_eq!(app.lines_added, 17);
        assert_eq!(app.lines_removed, 8);
        assert_eq!(app.contributors, 2);
        assert_eq!(app.window_days, 90);
        assert_eq!(
            app.last_commit_at.unwrap().to_rfc3339(),
            "2025-10-22T06:30:00+00:00"
        );

        let logo = churn.iter().find(|c| c.component == "assets/logo.png").unwrap();
        assert_eq!(logo.lines_changed(), 0);
        assert_eq!(logo.commits, 1);
    }

    #[test]
    fn output_is_sorted_by_component() {
        let churn = parse_log(LOG, 30, Path::new("/repo")).unwrap();
        let names: Vec<_> = churn.iter().map(|c| c.component.as_str()).collect();
        assert_eq!(names, vec!["README.md", "assets/logo.png", "src/app.py"]);
    }

    #[test]
    fn empty_history_yields_nothing() {
        assert!(parse_log("", 90, Path::new("/repo")).unwrap().is_empty());
    }

    #[test]
    fn stray_numstat_line_is_a_parse_error() {
        assert!(parse_log("3\t1\tsrc/a.py\n", 90, Path::new("/repo")).is_err());
    }

    #[test]
    fn non_repository_target_is_not_found() {
        let temp = tempfile::TempDir::new().unwrap();
        let ctx = CollectorContext::new(temp.path(), CollectorsConfig::default());
        assert!(matches!(
            GitChurn.args(&ctx),
            Err(Error::ToolUnavailable { .. })
        ));
    }
}
