//! Line coverage from an existing Cobertura XML or LCOV report.
//!
//! Nothing is executed: the collector reads the first report listed in
//! `collectors.coverage_reports` that exists under the target.

use super::tool::parse_error;
use super::{normalize_component, Artifact, Collector, CollectorContext, CollectorResult};
use crate::errors::Result;
use crate::evidence::{Coverage, Draft, EvidenceDraft};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

const NAME: &str = "coverage";

pub struct CoverageCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Cobertura,
    Lcov,
}

impl ReportFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("xml") => Self::Cobertura,
            _ => Self::Lcov,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Cobertura => "cobertura",
            Self::Lcov => "lcov",
        }
    }
}

/// Per-file line hits, deduplicated by line number.
type LineHits = BTreeMap<String, BTreeMap<u32, bool>>;

fn record_line(files: &mut LineHits, file: &str, line: u32, hit: bool) {
    let slot = files
        .entry(file.to_string())
        .or_default()
        .entry(line)
        .or_insert(false);
    *slot |= hit;
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    match element.try_get_attribute(key) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|v| Some(v.into_owned()))
            .map_err(|e| parse_error(NAME, e)),
        Ok(None) => Ok(None),
        Err(e) => Err(parse_error(NAME, e)),
    }
}

/// Parse Cobertura XML into `(component, covered, total)` triples.
pub fn parse_cobertura(xml: &str, root: &Path) -> Result<Vec<(String, u64, u64)>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sources: Vec<String> = Vec::new();
    let mut in_source = false;
    let mut current_file: Option<String> = None;
    let mut files = LineHits::new();
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(|e| parse_error(NAME, e))? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"coverage" => saw_root = true,
                b"source" => in_source = true,
                b"class" => {
                    current_file = attribute(&e, b"filename")?;
                    if let Some(file) = &current_file {
                        files.entry(file.clone()).or_default();
                    }
                }
                b"line" => {
                    if let Some(file) = &current_file {
                        let number = attribute(&e, b"number")?.and_then(|n| n.parse().ok());
                        let hits: u64 = attribute(&e, b"hits")?
                            .and_then(|h| h.parse().ok())
                            .unwrap_or(0);
                        if let Some(number) = number {
                            record_line(&mut files, file, number, hits > 0);
                        }
                    }
                }
                _ => {}
            },
            Event::Text(text) if in_source => {
                let value = text.unescape().map_err(|e| parse_error(NAME, e))?;
                sources.push(value.trim().to_string());
            }
            Event::End(e) => match e.name().as_ref() {
                b"source" => in_source = false,
                b"class" => current_file = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(parse_error(NAME, "missing <coverage> root element"));
    }

    // Filenames are relative to the first <source> that is not the target
    // itself; resolve them so components line up with other collectors.
    let base = sources
        .iter()
        .find(|s| !s.is_empty() && s.as_str() != ".")
        .map(Path::new);

    Ok(files
        .into_iter()
        .map(|(file, lines)| {
            let path = match base {
                Some(base) if Path::new(&file).is_relative() => {
                    base.join(&file).to_string_lossy().into_owned()
                }
                _ => file,
            };
            let total = lines.len() as u64;
            let covered = lines.values().filter(|hit| **hit).count() as u64;
            (normalize_component(root, &path), covered, total)
        })
        .collect())
}

/// Parse an LCOV tracefile into `(component, covered, total)` triples.
pub fn parse_lcov(contents: &[u8], root: &Path) -> Result<Vec<(String, u64, u64)>> {
    use lcov::{Reader, Record};

    let mut files = LineHits::new();
    // LF/LH summaries for files that carry no DA lines
    let mut summaries: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    let mut current: Option<String> = None;

    for record in Reader::new(contents) {
        match record.map_err(|e| parse_error(NAME, e))? {
            Record::SourceFile { path } => {
                current = Some(normalize_component(root, &path.to_string_lossy()));
            }
            Record::LineData { line, count, .. } => {
                if let Some(file) = &current {
                    record_line(&mut files, file, line, count > 0);
                }
            }
            Record::LinesFound { found } => {
                if let Some(file) = &current {
                    summaries.entry(file.clone()).or_default().1 = found.into();
                }
            }
            Record::LinesHit { hit } => {
                if let Some(file) = &current {
                    summaries.entry(file.clone()).or_default().0 = hit.into();
                }
            }
            Record::EndOfRecord => current = None,
            _ => {}
        }
    }

    let mut result: BTreeMap<String, (u64, u64)> = files
        .into_iter()
        .map(|(file, lines)| {
            let covered = lines.values().filter(|hit| **hit).count() as u64;
            (file, (covered, lines.len() as u64))
        })
        .collect();
    for (file, summary) in summaries {
        result.entry(file).or_insert(summary);
    }

    Ok(result
        .into_iter()
        .map(|(file, (covered, total))| (file, covered, total))
        .collect())
}

impl CoverageCollector {
    fn locate(ctx: &CollectorContext) -> Option<(String, std::path::PathBuf)> {
        ctx.config
            .coverage_reports
            .iter()
            .map(|name| (name.clone(), ctx.target.join(name)))
            .find(|(_, path)| path.is_file())
    }

    fn collect(&self, ctx: &CollectorContext) -> CollectorResult {
        let Some((name, path)) = Self::locate(ctx) else {
            return CollectorResult::not_found(
                NAME,
                format!(
                    "no coverage report found (looked for {})",
                    ctx.config.coverage_reports.join(", ")
                ),
            );
        };

        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) => {
                return CollectorResult::new(NAME, super::CollectorStatus::Failed)
                    .with_message(format!("cannot read {}: {}", path.display(), e));
            }
        };

        let format = ReportFormat::for_path(&path);
        let artifact_name = match format {
            ReportFormat::Cobertura => "coverage.xml",
            ReportFormat::Lcov => "coverage.info",
        };
        let artifact = Artifact::new(artifact_name, contents.clone());

        let parsed = match format {
            ReportFormat::Cobertura => {
                parse_cobertura(&String::from_utf8_lossy(&contents), &ctx.target)
            }
            ReportFormat::Lcov => parse_lcov(&contents, &ctx.target),
        };

        match parsed {
            Ok(files) => {
                log::debug!("coverage: {} files from {}", files.len(), name);
                let drafts: Vec<EvidenceDraft> = files
                    .into_iter()
                    .map(|(component, covered, total)| {
                        Draft::new(NAME, Coverage::new(component, covered, total))
                            .with_tag("line")
                            .with_metadata("report", name.clone())
                            .with_metadata("format", format.as_str())
                            .into()
                    })
                    .collect();
                CollectorResult::ok(NAME, drafts).with_artifact(artifact)
            }
            Err(e) => {
                log::warn!("{}", e);
                CollectorResult::new(NAME, super::CollectorStatus::ParseError)
                    .with_message(e.to_string())
                    .with_artifact(artifact)
            }
        }
    }
}

impl Collector for CoverageCollector {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&self, ctx: &CollectorContext) -> CollectorResult {
        let started = Instant::now();
        let mut result = self.collect(ctx);
        result.duration = started.elapsed();
        result
    }
}
