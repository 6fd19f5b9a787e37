//! Readable scoring-script rendering of a scorecard and its parser.
//!
//! ```text
//! # Scorecard: Retail Personal Loan
//! # Base Score: 536
//! # Score Range: 300 - 850
//!
//! # Characteristic: AGE | Age
//! # Field: age | Weight: 1
//! if age >= 18 and age < 35:
//!     score += -16  # 18-34
//! elif age >= 35:
//!     score += 12  # 35+
//! else:
//!     score += 0  # Missing
//! # End: AGE
//! ```
//!
//! Emitted points are already multiplied by the characteristic weight; the parser divides
//! them back out.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Bin, BinMatcher, Characteristic, ConfigurationIssue, Scorecard};

const NUMBER: &str = r"-?\d+(?:\.\d+)?";

/// Result of parsing a scoring script. Only usable when `errors` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedScript {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub base_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub characteristics: Vec<Characteristic>,
    pub errors: Vec<ConfigurationIssue>,
}

impl ParsedScript {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Replace the score range and characteristics of `scorecard` with the parsed ones.
    pub fn apply_to(&self, scorecard: &Scorecard) -> Result<Scorecard, Vec<ConfigurationIssue>> {
        if !self.is_valid() {
            return Err(self.errors.clone());
        }

        let mut updated = scorecard.clone();
        updated.base_score = self.base_score;
        updated.min_score = self.min_score;
        updated.max_score = self.max_score;
        updated.characteristics = self.characteristics.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        Ok(updated)
    }
}

/// Render a scorecard as a scoring script.
///
/// Characteristics without bins always score zero and are left out, so the script parses
/// back to an equivalent scorecard.
pub fn generate_script(scorecard: &Scorecard) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Scorecard: {}", scorecard.name);
    let _ = writeln!(out, "# Base Score: {}", scorecard.base_score);
    let _ = writeln!(
        out,
        "# Score Range: {} - {}",
        scorecard.min_score, scorecard.max_score
    );

    for characteristic in scorecard
        .characteristics
        .iter()
        .filter(|characteristic| !characteristic.bins.is_empty())
    {
        out.push('\n');
        render_characteristic(&mut out, characteristic);
    }

    out
}

fn render_characteristic(out: &mut String, characteristic: &Characteristic) {
    let field = &characteristic.field;
    let weight = characteristic.weight_multiplier;
    let _ = writeln!(
        out,
        "# Characteristic: {} | {}",
        characteristic.code, characteristic.name
    );
    let inactive = if characteristic.is_active {
        ""
    } else {
        " | Inactive"
    };
    let _ = writeln!(out, "# Field: {field} | Weight: {weight}{inactive}");

    let mut ranges: Vec<&Bin> = characteristic
        .bins
        .iter()
        .filter(|bin| matches!(bin.matcher, BinMatcher::Range { .. }))
        .collect();
    ranges.sort_by(|a, b| lower_bound(a).total_cmp(&lower_bound(b)));
    let categories = characteristic
        .bins
        .iter()
        .filter(|bin| matches!(bin.matcher, BinMatcher::Category { .. }));
    let fallback = characteristic.default_bin();

    for (index, bin) in ranges.into_iter().chain(categories).enumerate() {
        let keyword = if index == 0 { "if" } else { "elif" };
        let condition = match &bin.matcher {
            BinMatcher::Range { min, max } => match (min, max) {
                (Some(min), Some(max)) => format!("{field} >= {min} and {field} < {max}"),
                (Some(min), None) => format!("{field} >= {min}"),
                (None, Some(max)) => format!("{field} < {max}"),
                (None, None) => format!("{field} is_number"),
            },
            BinMatcher::Category { value } => format!("{field} == \"{}\"", escape(value)),
            BinMatcher::Default => unreachable!("default bins are emitted last"),
        };
        let _ = writeln!(out, "{keyword} {condition}:");
        render_assignment(out, bin, weight);
    }

    if let Some(bin) = fallback {
        let _ = writeln!(out, "else:");
        render_assignment(out, bin, weight);
    }

    let _ = writeln!(out, "# End: {}", characteristic.code);
}

fn render_assignment(out: &mut String, bin: &Bin, weight: f64) {
    let _ = writeln!(out, "    score += {}  # {}", bin.points * weight, bin.label);
}

fn lower_bound(bin: &Bin) -> f64 {
    match bin.matcher {
        BinMatcher::Range { min, .. } => min.unwrap_or(f64::NEG_INFINITY),
        _ => f64::NEG_INFINITY,
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Range {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    Category {
        field: String,
        value: String,
    },
}

impl Condition {
    fn field(&self) -> &str {
        match self {
            Condition::Range { field, .. } | Condition::Category { field, .. } => field,
        }
    }
}

/// One classified script line.
#[derive(Debug, Clone, PartialEq)]
enum ScriptLine {
    ScorecardName(String),
    BaseScore(f64),
    ScoreRange(f64, f64),
    CharacteristicHeader { code: String, name: String },
    FieldWeight { field: String, weight: f64, active: bool },
    Branch(Condition),
    Else,
    Assignment { points: f64, label: Option<String> },
    End(String),
    Comment,
    Blank,
    Unrecognized(String),
}

struct Patterns {
    name: Regex,
    base: Regex,
    range: Regex,
    header: Regex,
    field_weight: Regex,
    end: Regex,
    branch: Regex,
    else_line: Regex,
    assignment: Regex,
    bounded: Regex,
    lower: Regex,
    upper: Regex,
    any_number: Regex,
    category: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |pattern: String| Regex::new(&pattern).expect("script pattern compiles");
        Patterns {
            name: build(r"^#\s*Scorecard:\s*(.*)$".to_string()),
            base: build(format!(r"^#\s*Base Score:\s*({NUMBER})$")),
            range: build(format!(r"^#\s*Score Range:\s*({NUMBER})\s*-\s*({NUMBER})$")),
            header: build(r"^#\s*Characteristic:\s*(\S+)\s*\|\s*(.*)$".to_string()),
            field_weight: build(format!(
                r"^#\s*Field:\s*(\w+)\s*\|\s*Weight:\s*({NUMBER})\s*(\|\s*Inactive)?$"
            )),
            end: build(r"^#\s*End:\s*(\S+)$".to_string()),
            branch: build(r"^(?:if|elif)\s+(.+):$".to_string()),
            else_line: build(r"^else\s*:$".to_string()),
            assignment: build(format!(r"^score\s*\+=\s*({NUMBER})(?:\s*#\s?(.*))?$")),
            bounded: build(format!(
                r"^(\w+)\s*>=\s*({NUMBER})\s+and\s+(\w+)\s*<\s*({NUMBER})$"
            )),
            lower: build(format!(r"^(\w+)\s*>=\s*({NUMBER})$")),
            upper: build(format!(r"^(\w+)\s*<\s*({NUMBER})$")),
            any_number: build(r"^(\w+)\s+is_number$".to_string()),
            category: build(r#"^(\w+)\s*==\s*"((?:[^"\\]|\\.)*)"$"#.to_string()),
        }
    })
}

fn number(raw: &str) -> f64 {
    raw.parse().unwrap_or(f64::NAN)
}

fn classify(line: &str) -> ScriptLine {
    let p = patterns();
    let line = line.trim();

    if line.is_empty() {
        return ScriptLine::Blank;
    }
    if let Some(caps) = p.base.captures(line) {
        return ScriptLine::BaseScore(number(&caps[1]));
    }
    if let Some(caps) = p.range.captures(line) {
        return ScriptLine::ScoreRange(number(&caps[1]), number(&caps[2]));
    }
    if let Some(caps) = p.name.captures(line) {
        return ScriptLine::ScorecardName(caps[1].trim().to_string());
    }
    if let Some(caps) = p.header.captures(line) {
        return ScriptLine::CharacteristicHeader {
            code: caps[1].to_string(),
            name: caps[2].trim().to_string(),
        };
    }
    if let Some(caps) = p.field_weight.captures(line) {
        return ScriptLine::FieldWeight {
            field: caps[1].to_string(),
            weight: number(&caps[2]),
            active: caps.get(3).is_none(),
        };
    }
    if let Some(caps) = p.end.captures(line) {
        return ScriptLine::End(caps[1].to_string());
    }
    if line.starts_with('#') {
        return ScriptLine::Comment;
    }
    if p.else_line.is_match(line) {
        return ScriptLine::Else;
    }
    if let Some(caps) = p.assignment.captures(line) {
        return ScriptLine::Assignment {
            points: number(&caps[1]),
            label: caps.get(2).map(|label| label.as_str().trim().to_string()),
        };
    }
    if let Some(caps) = p.branch.captures(line) {
        if let Some(condition) = classify_condition(caps[1].trim()) {
            return ScriptLine::Branch(condition);
        }
    }

    ScriptLine::Unrecognized(line.to_string())
}

fn classify_condition(condition: &str) -> Option<Condition> {
    let p = patterns();

    if let Some(caps) = p.bounded.captures(condition) {
        if caps[1] != caps[3] {
            return None;
        }
        return Some(Condition::Range {
            field: caps[1].to_string(),
            min: Some(number(&caps[2])),
            max: Some(number(&caps[4])),
        });
    }
    if let Some(caps) = p.lower.captures(condition) {
        return Some(Condition::Range {
            field: caps[1].to_string(),
            min: Some(number(&caps[2])),
            max: None,
        });
    }
    if let Some(caps) = p.upper.captures(condition) {
        return Some(Condition::Range {
            field: caps[1].to_string(),
            min: None,
            max: Some(number(&caps[2])),
        });
    }
    if let Some(caps) = p.any_number.captures(condition) {
        return Some(Condition::Range {
            field: caps[1].to_string(),
            min: None,
            max: None,
        });
    }
    if let Some(caps) = p.category.captures(condition) {
        return Some(Condition::Category {
            field: caps[1].to_string(),
            value: unescape(&caps[2]),
        });
    }
    None
}

/// Bin under construction: its match data is known, its points are not yet.
#[derive(Debug)]
struct PendingBin {
    line: usize,
    matcher: BinMatcher,
}

#[derive(Debug)]
struct CharacteristicDraft {
    line: usize,
    code: String,
    name: String,
    field: Option<String>,
    weight: f64,
    active: bool,
    bins: Vec<Bin>,
}

#[derive(Debug)]
enum ParseState {
    Preamble,
    InCharacteristic(CharacteristicDraft),
    AwaitingPoints(CharacteristicDraft, PendingBin),
}

struct ScriptParser {
    name: Option<String>,
    base_score: Option<f64>,
    range: Option<(f64, f64)>,
    characteristics: Vec<Characteristic>,
    errors: Vec<ConfigurationIssue>,
}

impl ScriptParser {
    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(ConfigurationIssue::error(Some(line), message));
    }

    fn finish(&mut self, draft: CharacteristicDraft) {
        let Some(field) = draft.field else {
            self.error(
                draft.line,
                format!("characteristic {} has no field", draft.code),
            );
            return;
        };
        if draft.bins.is_empty() {
            self.error(draft.line, format!("characteristic {} has no bins", draft.code));
            return;
        }
        self.characteristics.push(Characteristic {
            code: draft.code,
            name: draft.name,
            field,
            weight_multiplier: draft.weight,
            is_active: draft.active,
            bins: draft.bins,
        });
    }

    /// Close whatever is open; a branch without its assignment is an error.
    fn close(&mut self, state: ParseState) {
        match state {
            ParseState::Preamble => {}
            ParseState::InCharacteristic(draft) => self.finish(draft),
            ParseState::AwaitingPoints(draft, pending) => {
                self.error(pending.line, "branch has no score assignment");
                self.finish(draft);
            }
        }
    }

    fn step(&mut self, state: ParseState, number: usize, line: ScriptLine) -> ParseState {
        match (state, line) {
            (state, ScriptLine::Blank | ScriptLine::Comment) => state,
            (state, ScriptLine::ScorecardName(name)) => {
                self.name = Some(name);
                state
            }
            (state, ScriptLine::BaseScore(value)) => {
                self.base_score = Some(value);
                state
            }
            (state, ScriptLine::ScoreRange(min, max)) => {
                if min > max {
                    self.error(number, format!("score range {min} - {max} is inverted"));
                }
                self.range = Some((min, max));
                state
            }
            (state, ScriptLine::CharacteristicHeader { code, name }) => {
                self.close(state);
                ParseState::InCharacteristic(CharacteristicDraft {
                    line: number,
                    code,
                    name,
                    field: None,
                    weight: 1.0,
                    active: true,
                    bins: Vec::new(),
                })
            }
            (
                ParseState::InCharacteristic(mut draft),
                ScriptLine::FieldWeight {
                    field,
                    weight,
                    active,
                },
            ) => {
                if weight == 0.0 || !weight.is_finite() {
                    self.error(number, format!("weight {weight} must be a non-zero number"));
                } else {
                    draft.weight = weight;
                }
                draft.field = Some(field);
                draft.active = active;
                ParseState::InCharacteristic(draft)
            }
            (state, ScriptLine::FieldWeight { .. }) => {
                self.error(number, "field/weight line outside a characteristic header");
                state
            }
            (ParseState::InCharacteristic(mut draft), ScriptLine::Branch(condition)) => {
                match draft.field.as_deref() {
                    Some(field) if field != condition.field() => {
                        self.error(
                            number,
                            format!(
                                "condition on '{}' inside characteristic {} scoring '{}'",
                                condition.field(),
                                draft.code,
                                field
                            ),
                        );
                    }
                    Some(_) => {}
                    None => draft.field = Some(condition.field().to_string()),
                }
                let matcher = match condition {
                    Condition::Range { min, max, .. } => BinMatcher::Range { min, max },
                    Condition::Category { value, .. } => BinMatcher::Category { value },
                };
                ParseState::AwaitingPoints(
                    draft,
                    PendingBin {
                        line: number,
                        matcher,
                    },
                )
            }
            (ParseState::InCharacteristic(draft), ScriptLine::Else) => ParseState::AwaitingPoints(
                draft,
                PendingBin {
                    line: number,
                    matcher: BinMatcher::Default,
                },
            ),
            (ParseState::AwaitingPoints(draft, pending), ScriptLine::Branch(_) | ScriptLine::Else) => {
                self.error(pending.line, "branch has no score assignment");
                self.error(number, "unexpected branch before previous assignment");
                ParseState::InCharacteristic(draft)
            }
            (ParseState::Preamble, ScriptLine::Branch(_) | ScriptLine::Else) => {
                self.error(number, "branch outside a characteristic");
                ParseState::Preamble
            }
            (ParseState::AwaitingPoints(mut draft, pending), ScriptLine::Assignment { points, label }) => {
                let raw = round_points(points / draft.weight);
                let label = label.unwrap_or_else(|| default_label(&pending.matcher));
                draft.bins.push(Bin {
                    label,
                    points: raw,
                    matcher: pending.matcher,
                });
                ParseState::InCharacteristic(draft)
            }
            (state, ScriptLine::Assignment { .. }) => {
                self.error(number, "score assignment without a branch");
                state
            }
            (state, ScriptLine::End(code)) => {
                if let ParseState::InCharacteristic(draft) | ParseState::AwaitingPoints(draft, _) =
                    &state
                {
                    if draft.code != code {
                        self.error(
                            number,
                            format!("end marker {code} closes characteristic {}", draft.code),
                        );
                    }
                } else {
                    self.error(number, format!("end marker {code} without a characteristic"));
                }
                self.close(state);
                ParseState::Preamble
            }
            (state, ScriptLine::Unrecognized(text)) => {
                self.error(number, format!("unrecognized line: {text}"));
                state
            }
        }
    }
}

fn round_points(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn default_label(matcher: &BinMatcher) -> String {
    match matcher {
        BinMatcher::Range { min, max } => match (min, max) {
            (Some(min), Some(max)) => format!("{min}-{max}"),
            (Some(min), None) => format!("{min}+"),
            (None, Some(max)) => format!("< {max}"),
            (None, None) => "any".to_string(),
        },
        BinMatcher::Category { value } => value.clone(),
        BinMatcher::Default => "default".to_string(),
    }
}

/// Parse a scoring script. Every problem is collected; nothing is silently dropped.
pub fn parse_script(text: &str) -> ParsedScript {
    let mut parser = ScriptParser {
        name: None,
        base_score: None,
        range: None,
        characteristics: Vec::new(),
        errors: Vec::new(),
    };

    let mut state = ParseState::Preamble;
    for (index, line) in text.lines().enumerate() {
        state = parser.step(state, index + 1, classify(line));
    }
    parser.close(state);

    if parser.base_score.is_none() {
        parser
            .errors
            .push(ConfigurationIssue::error(None, "missing '# Base Score:' header"));
    }
    if parser.range.is_none() {
        parser
            .errors
            .push(ConfigurationIssue::error(None, "missing '# Score Range:' header"));
    }

    let (min_score, max_score) = parser.range.unwrap_or((0.0, 0.0));
    ParsedScript {
        name: parser.name,
        base_score: parser.base_score.unwrap_or(0.0),
        min_score,
        max_score,
        characteristics: parser.characteristics,
        errors: parser.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_line_kind() {
        assert_eq!(classify("# Base Score: 536"), ScriptLine::BaseScore(536.0));
        assert_eq!(
            classify("# Score Range: 300 - 850"),
            ScriptLine::ScoreRange(300.0, 850.0)
        );
        assert_eq!(classify("   "), ScriptLine::Blank);
        assert_eq!(classify("# free comment"), ScriptLine::Comment);
        assert_eq!(classify("else:"), ScriptLine::Else);
        assert_eq!(
            classify("    score += -16  # 18-34"),
            ScriptLine::Assignment {
                points: -16.0,
                label: Some("18-34".to_string())
            }
        );
        assert_eq!(
            classify("if age >= 18 and age < 35:"),
            ScriptLine::Branch(Condition::Range {
                field: "age".to_string(),
                min: Some(18.0),
                max: Some(35.0)
            })
        );
        assert_eq!(
            classify(r#"elif occupation == "Sales \"Lead\"":"#),
            ScriptLine::Branch(Condition::Category {
                field: "occupation".to_string(),
                value: "Sales \"Lead\"".to_string()
            })
        );
        assert!(matches!(
            classify("while true:"),
            ScriptLine::Unrecognized(_)
        ));
    }

    #[test]
    fn mixed_field_bounds_are_rejected() {
        assert!(classify_condition("age >= 18 and income < 35").is_none());
    }

    #[test]
    fn weighted_points_are_divided_back_out() {
        let script = "# Base Score: 500\n# Score Range: 0 - 1000\n\
# Characteristic: INC | Income\n# Field: monthly_income | Weight: 2\n\
if monthly_income >= 50000:\n    score += 30  # 50000+\n# End: INC\n";

        let parsed = parse_script(script);

        assert!(parsed.is_valid(), "{:?}", parsed.errors);
        assert_eq!(parsed.characteristics[0].weight_multiplier, 2.0);
        assert_eq!(parsed.characteristics[0].bins[0].points, 15.0);
    }

    #[test]
    fn structural_errors_are_collected_with_line_numbers() {
        let script = "# Base Score: 500\n# Score Range: 0 - 1000\n\
if age >= 18:\n    score += 5\n\
# Characteristic: AGE | Age\n# Field: age | Weight: 1\n\
if age >= 18:\nelif age < 18:\n    score += 1  # young\nscore = 12\n";

        let parsed = parse_script(script);

        assert!(!parsed.is_valid());
        let lines: Vec<Option<usize>> = parsed.errors.iter().map(|issue| issue.line).collect();
        assert!(lines.contains(&Some(3)), "branch outside characteristic: {lines:?}");
        assert!(lines.contains(&Some(4)), "orphan assignment: {lines:?}");
        assert!(lines.contains(&Some(7)), "branch without assignment: {lines:?}");
        assert!(lines.contains(&Some(10)), "unrecognized line: {lines:?}");
    }

    #[test]
    fn missing_headers_are_reported() {
        let parsed = parse_script("# Characteristic: X | X\n# Field: x | Weight: 1\nelse:\n    score += 1\n");
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.characteristics.len(), 1);
    }
}
