//! Shaping of generated text into response fields.
//!
//! Model output is free text, but the prompts ask for a numbered list, so
//! the answer is split on top-level `1.` .. `4.` markers and each item is
//! mapped to a named field. Anything unparseable stays available as the raw
//! analysis text.

use serde::Serialize;

/// Interaction severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    None,
    Low,
    Moderate,
    High,
    Contraindicated,
}

impl Severity {
    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "none" => Some(Severity::None),
            "low" | "minor" => Some(Severity::Low),
            "moderate" => Some(Severity::Moderate),
            "high" | "major" | "severe" => Some(Severity::High),
            "contraindicated" => Some(Severity::Contraindicated),
            _ => None,
        }
    }
}

/// Sections of a two-drug interaction answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionSections {
    pub severity: Option<String>,
    pub mechanism: Option<String>,
    pub monitoring: Option<String>,
    pub alternatives: Option<String>,
}

/// Sections of a patient-case answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaseSections {
    pub interactions: Option<String>,
    pub risk_assessment: Option<String>,
    pub monitoring: Option<String>,
    pub priority_actions: Option<String>,
}

/// Coarse risk bucket for a patient case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskEstimate {
    /// 0.0 to 10.0, one decimal.
    pub score: f64,
    pub level: RiskLevel,
}

/// Split `text` into its top-level numbered items.
///
/// An item starts at a line whose marker is the next expected number, so
/// nested lists restarting at `1.` stay inside their parent item.
pub fn numbered_sections(text: &str) -> Vec<(u32, String)> {
    let mut sections: Vec<(u32, Vec<&str>)> = Vec::new();

    for line in text.lines() {
        let expected = sections.last().map_or(1, |(n, _)| n + 1);
        match split_marker(line) {
            Some((n, rest)) if n == expected => sections.push((n, vec![rest])),
            _ => {
                if let Some((_, body)) = sections.last_mut() {
                    body.push(line.trim());
                }
            }
        }
    }

    sections
        .into_iter()
        .map(|(n, body)| (n, strip_label(&body.join("\n")).trim().to_string()))
        .collect()
}

/// Longest heading treated as a label, long enough for the prompt's own
/// headings with their option lists.
const MAX_LABEL_CHARS: usize = 120;

/// Parse `"1. rest"`, `"1) rest"`, `"**1.** rest"` or `"### 1. rest"`.
fn split_marker(line: &str) -> Option<(u32, &str)> {
    let trimmed = line.trim_start().trim_start_matches(['#', '*', ' ']);
    let digits = trimmed.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 || digits > 2 {
        return None;
    }
    let rest = &trimmed[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    // "1.5 mg" is a dose, not a marker.
    if !(rest.is_empty() || rest.starts_with([' ', '\t', '*'])) {
        return None;
    }
    let n = trimmed[..digits].parse().ok()?;
    Some((n, rest.trim().trim_start_matches('*').trim()))
}

/// Drop a leading `Heading:` label the model tends to repeat from the prompt.
fn strip_label(body: &str) -> &str {
    let first_line = body.lines().next().unwrap_or("");
    match first_line.find(':') {
        Some(i) if i <= MAX_LABEL_CHARS && !first_line[..i].contains('.') => {
            body[i + 1..].trim_start_matches('*')
        }
        _ => body,
    }
}

fn section(sections: &[(u32, String)], n: u32) -> Option<String> {
    sections
        .iter()
        .find(|(k, body)| *k == n && !body.is_empty())
        .map(|(_, body)| body.clone())
}

/// Map a two-drug answer onto named fields.
pub fn interaction_sections(text: &str) -> InteractionSections {
    let sections = numbered_sections(text);
    InteractionSections {
        severity: section(&sections, 1),
        mechanism: section(&sections, 2),
        monitoring: section(&sections, 3),
        alternatives: section(&sections, 4),
    }
}

/// Map a patient-case answer onto named fields.
pub fn case_sections(text: &str) -> CaseSections {
    let sections = numbered_sections(text);
    CaseSections {
        interactions: section(&sections, 1),
        risk_assessment: section(&sections, 2),
        monitoring: section(&sections, 3),
        priority_actions: section(&sections, 4),
    }
}

/// The first severity label stated in `text`, if any.
///
/// Option lists such as `(None/Low/Moderate)` echoed from the prompt are
/// skipped.
pub fn extract_severity(text: &str) -> Option<Severity> {
    without_option_lists(text)
        .split(|c: char| !c.is_ascii_alphabetic())
        .find_map(Severity::from_word)
}

/// Remove parenthesised groups that contain a `/`.
fn without_option_lists(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        let Some(len) = rest[open..].find(')') else {
            break;
        };
        let group = &rest[open..=open + len];
        out.push_str(&rest[..open]);
        if !group.contains('/') {
            out.push_str(group);
        }
        rest = &rest[open + len + 1..];
    }
    out.push_str(rest);
    out
}

/// Polypharmacy/age heuristic: `medications * 1.5 + age / 10 - 5`, clamped
/// to 0..=10.
pub fn estimate_risk(medication_count: usize, age: u32) -> RiskEstimate {
    let raw = medication_count as f64 * 1.5 + f64::from(age) / 10.0 - 5.0;
    let score = raw.clamp(0.0, 10.0);
    let level = if score < 4.0 {
        RiskLevel::Low
    } else if score < 7.0 {
        RiskLevel::Moderate
    } else {
        RiskLevel::High
    };
    RiskEstimate {
        score: (score * 10.0).round() / 10.0,
        level,
    }
}
