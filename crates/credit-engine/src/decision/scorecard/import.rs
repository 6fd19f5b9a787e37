use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Bin, Characteristic, ConfigurationIssue, Scorecard, ScorecardImportError};

/// Characteristics and base score recovered from a tabular scorecard sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedScorecard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_score: Option<f64>,
    pub characteristics: Vec<Characteristic>,
    /// Non-blocking findings, such as notes that were ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConfigurationIssue>,
}

impl ImportedScorecard {
    /// Replace the characteristics (and base score, when the sheet has one) of `scorecard`.
    pub fn apply_to(&self, scorecard: &Scorecard) -> Scorecard {
        let mut updated = scorecard.clone();
        if let Some(base) = self.base_score {
            updated.base_score = base;
        }
        updated.characteristics = self.characteristics.clone();
        updated
    }
}

/// Reads the `Characteristic,Attribute,Points,Notes` sheet layout.
///
/// A `BASE SCORE` row sets the base score. A non-empty characteristic cell starts a new
/// group, either as `CODE: Name` or free text, and blank rows between groups are skipped.
/// Bin types are inferred from the attribute label. Unreadable rows are reported with the
/// other row errors.
pub struct TabularScorecardImporter;

impl TabularScorecardImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ImportedScorecard, ScorecardImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<ImportedScorecard, ScorecardImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        let (Some(characteristic_col), Some(attribute_col), Some(points_col)) =
            (column("Characteristic"), column("Attribute"), column("Points"))
        else {
            return Err(ScorecardImportError::Invalid(vec![ConfigurationIssue::error(
                Some(1),
                "header must contain Characteristic, Attribute and Points columns",
            )]));
        };

        let mut sheet = SheetBuilder::default();

        for record in csv_reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    let line = err.position().map(|position| position.line() as usize);
                    let fatal = matches!(err.kind(), csv::ErrorKind::Io(_));
                    sheet.unreadable(line, &err);
                    if fatal {
                        break;
                    }
                    continue;
                }
            };
            // Blank separators carry no meaning; a characteristic cell starts the next group.
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let line = record
                .position()
                .map_or(0, |position| position.line() as usize);
            let cell = |index: usize| record.get(index).unwrap_or("").trim();
            sheet.row(
                line,
                cell(characteristic_col),
                cell(attribute_col),
                cell(points_col),
            );
        }

        sheet.finish()
    }
}

#[derive(Debug)]
struct GroupDraft {
    line: usize,
    characteristic: Characteristic,
}

#[derive(Debug, Default)]
struct SheetBuilder {
    base_score: Option<f64>,
    current: Option<GroupDraft>,
    characteristics: Vec<Characteristic>,
    errors: Vec<ConfigurationIssue>,
    warnings: Vec<ConfigurationIssue>,
}

impl SheetBuilder {
    fn row(&mut self, line: usize, characteristic: &str, attribute: &str, points: &str) {
        if characteristic.eq_ignore_ascii_case("base score") {
            match points.parse::<f64>() {
                Ok(base) => self.base_score = Some(base),
                Err(_) => self
                    .errors
                    .push(ConfigurationIssue::error(Some(line), format!("base score '{points}' is not a number"))),
            }
            return;
        }

        if !characteristic.is_empty() {
            self.close_group();
            self.current = Some(GroupDraft {
                line,
                characteristic: group_header(characteristic),
            });
        }

        if attribute.is_empty() && points.is_empty() {
            return;
        }

        let Some(group) = self.current.as_mut() else {
            self.errors.push(ConfigurationIssue::error(
                Some(line),
                format!("attribute '{attribute}' appears before any characteristic"),
            ));
            return;
        };

        if attribute.is_empty() {
            self.errors
                .push(ConfigurationIssue::error(Some(line), "attribute label is empty"));
            return;
        }

        let Ok(points) = points.parse::<f64>() else {
            self.errors.push(ConfigurationIssue::error(
                Some(line),
                format!("points '{points}' for attribute '{attribute}' is not a number"),
            ));
            return;
        };

        let bin = infer_bin(attribute, points);
        if matches!(bin.matcher, super::BinMatcher::Default)
            && group.characteristic.default_bin().is_some()
        {
            self.warnings.push(ConfigurationIssue::warning(
                Some(line),
                format!(
                    "{}: second default bin '{attribute}' is never used",
                    group.characteristic.code
                ),
            ));
        }
        group.characteristic.bins.push(bin);
    }

    fn unreadable(&mut self, line: Option<usize>, err: &csv::Error) {
        let message = match err.kind() {
            csv::ErrorKind::Utf8 { .. } => "row is not valid UTF-8".to_string(),
            _ => format!("row could not be read: {err}"),
        };
        self.errors.push(ConfigurationIssue::error(line, message));
    }

    fn close_group(&mut self) {
        let Some(group) = self.current.take() else {
            return;
        };
        if group.characteristic.bins.is_empty() {
            self.errors.push(ConfigurationIssue::error(
                Some(group.line),
                format!("characteristic {} has no attributes", group.characteristic.code),
            ));
            return;
        }
        self.characteristics.push(group.characteristic);
    }

    fn finish(mut self) -> Result<ImportedScorecard, ScorecardImportError> {
        self.close_group();

        if self.characteristics.is_empty() && self.errors.is_empty() {
            self.errors
                .push(ConfigurationIssue::error(None, "sheet contains no characteristics"));
        }

        if !self.errors.is_empty() {
            warn!(errors = self.errors.len(), "tabular scorecard import rejected");
            return Err(ScorecardImportError::Invalid(self.errors));
        }

        Ok(ImportedScorecard {
            base_score: self.base_score,
            characteristics: self.characteristics,
            warnings: self.warnings,
        })
    }
}

fn group_header(text: &str) -> Characteristic {
    match text.split_once(':') {
        Some((code, name)) if !code.trim().is_empty() && !name.trim().is_empty() => {
            let name = name.trim();
            Characteristic::new(&code.trim().to_ascii_uppercase(), name, &slugify(name))
        }
        _ => {
            let slug = slugify(text);
            Characteristic::new(&slug.to_ascii_uppercase(), text, &slug)
        }
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

struct LabelPatterns {
    span: Regex,
    open_top: Regex,
    below: Regex,
    at_least: Regex,
}

fn label_patterns() -> &'static LabelPatterns {
    static PATTERNS: OnceLock<LabelPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| LabelPatterns {
        span: Regex::new(r"^(-?\d+(?:\.\d+)?)\s*-\s*(-?\d+(?:\.\d+)?)$").expect("span pattern"),
        open_top: Regex::new(r"^(-?\d+(?:\.\d+)?)\s*\+$").expect("open-top pattern"),
        below: Regex::new(r"^<\s*(-?\d+(?:\.\d+)?)$").expect("below pattern"),
        at_least: Regex::new(r"^>=\s*(-?\d+(?:\.\d+)?)$").expect("at-least pattern"),
    })
}

/// Infer the bin type from an attribute label.
///
/// `18-34` is the integer span `[18, 35)`; decimal spans keep their upper bound as given.
fn infer_bin(label: &str, points: f64) -> Bin {
    let lowered = label.to_ascii_lowercase();
    if ["missing", "other", "default"]
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return Bin::fallback(label, points);
    }

    let patterns = label_patterns();
    if let Some(caps) = patterns.span.captures(label) {
        if let (Ok(low), Ok(high)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) {
            let integral = !caps[1].contains('.') && !caps[2].contains('.');
            let max = if integral { high + 1.0 } else { high };
            return Bin::range(label, Some(low), Some(max), points);
        }
    }
    if let Some(caps) = patterns.open_top.captures(label) {
        if let Ok(low) = caps[1].parse::<f64>() {
            return Bin::range(label, Some(low), None, points);
        }
    }
    if let Some(caps) = patterns.at_least.captures(label) {
        if let Ok(low) = caps[1].parse::<f64>() {
            return Bin::range(label, Some(low), None, points);
        }
    }
    if let Some(caps) = patterns.below.captures(label) {
        if let Ok(high) = caps[1].parse::<f64>() {
            return Bin::range(label, None, Some(high), points);
        }
    }

    Bin::category(label, label, points)
}
