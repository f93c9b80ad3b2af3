//! Total coercion of untrusted model output into [`ClassificationResult`].
//!
//! Every field may be missing, mistyped, out of range or oversized. Each
//! rule below picks a fallback instead of failing, so the output always
//! satisfies the result schema.
use chrono::{DateTime, Utc};

use super::model::{
    Bant, COMPANY_CONTEXT_MAX_CHARS, COMPETITORS, ClassificationResult, ClosedSet,
    DEFAULT_CONFIDENCE, EVIDENCE, FALLBACK_SUMMARY, FIT_REASONS, INDUSTRY_MAX_CHARS,
    INTERACTION_EVIDENCE_MAX_CHARS, InteractionUnit, InteractionVolume, ListBound, NEXT_STEPS,
    NextStep, OBJECTIONS, Objection, PAIN_POINTS, RISKS, SCHEMA_VERSION, SIGNALS,
    SUMMARY_MAX_CHARS, Signals, StatusQuo, USE_CASES,
};
use super::untrusted::{Untrusted, UntrustedPayload};
use crate::util::text::truncate_chars;

const DAILY_TOKENS: &[&str] = &["daily", "day", "día", "dia", "diario"];
const WEEKLY_TOKENS: &[&str] = &["week", "semana", "semanal"];
const MONTHLY_TOKENS: &[&str] = &["month", "mes", "mensual"];

/// Maps any decoded value onto a fully populated, bounded result.
#[must_use]
pub fn normalize(payload: &UntrustedPayload) -> ClassificationResult {
    let root = payload.view();

    ClassificationResult {
        version: SCHEMA_VERSION.to_string(),
        summary: root
            .field("summary")
            .text()
            .map_or_else(|| FALLBACK_SUMMARY.to_string(), |s| truncate_chars(s, SUMMARY_MAX_CHARS)),
        industry: optional_text(root.field("industry"), INDUSTRY_MAX_CHARS),
        company_context: optional_text(root.field("company_context"), COMPANY_CONTEXT_MAX_CHARS),
        deal_stage: pick(root.field("deal_stage")),
        intent_level: pick(root.field("intent_level")),
        fit_score: normalize_fit_score(root.field("fit_score")),
        fit_reasons: text_list(root.field("fit_reasons"), FIT_REASONS),
        risk_level: pick(root.field("risk_level")),
        risks: text_list(root.field("risks"), RISKS),
        use_cases: text_list(root.field("use_cases"), USE_CASES),
        pain_points: text_list(root.field("pain_points"), PAIN_POINTS),
        priority_pain: pick(root.field("priority_pain")),
        objections: objections(root.field("objections")),
        objection_severity: pick(root.field("objection_severity")),
        competitors_mentioned: text_list(root.field("competitors_mentioned"), COMPETITORS),
        status_quo: status_quo(root.field("status_quo")),
        bant: bant(root.field("bant")),
        interaction_volume: interaction_volume(root.field("interaction_volume")),
        next_steps: next_steps(root.field("next_steps")),
        signals: Signals {
            positive: text_list(root.field("signals").field("positive"), SIGNALS),
            negative: text_list(root.field("signals").field("negative"), SIGNALS),
        },
        confidence: normalize_confidence(root.field("confidence")),
        evidence: text_list(root.field("evidence"), EVIDENCE),
    }
}

/// Fit score in `[0, 100]`; values `<= 1` are read as fractions.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn normalize_fit_score(value: Untrusted<'_>) -> u8 {
    let Some(raw) = value.number() else {
        return 0;
    };
    let scaled = if raw <= 1.0 { raw * 100.0 } else { raw };
    // clamped to [0, 100] before the cast
    scaled.clamp(0.0, 100.0).round() as u8
}

/// Confidence in `[0, 1]`; values `> 1` are read as percentages.
#[must_use]
fn normalize_confidence(value: Untrusted<'_>) -> f64 {
    let Some(raw) = value.number() else {
        return DEFAULT_CONFIDENCE;
    };
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

/// Classifies free-text units ("per day", "semanal", "/month", ...).
#[must_use]
fn normalize_unit(raw: Option<&str>) -> InteractionUnit {
    let Some(raw) = raw else {
        return InteractionUnit::Unknown;
    };
    let lowered = raw.trim().to_lowercase();
    if let Some(exact) = InteractionUnit::parse(&lowered) {
        return exact;
    }

    let matches = |tokens: &[&str]| tokens.iter().any(|token| lowered.contains(token));
    if matches(DAILY_TOKENS) {
        InteractionUnit::Daily
    } else if matches(WEEKLY_TOKENS) {
        InteractionUnit::Weekly
    } else if matches(MONTHLY_TOKENS) {
        InteractionUnit::Monthly
    } else {
        InteractionUnit::Unknown
    }
}

fn pick<T: ClosedSet>(value: Untrusted<'_>) -> T {
    value.text().and_then(T::parse).unwrap_or_default()
}

fn status_quo(value: Untrusted<'_>) -> StatusQuo {
    match value.boolean() {
        Some(true) => StatusQuo::True,
        Some(false) => StatusQuo::False,
        None => pick(value),
    }
}

fn optional_text(value: Untrusted<'_>, max_chars: usize) -> Option<String> {
    value.text().map(|s| truncate_chars(s, max_chars))
}

fn text_list(value: Untrusted<'_>, bound: ListBound) -> Vec<String> {
    value
        .items()
        .filter_map(Untrusted::text)
        .take(bound.max_items)
        .map(|s| truncate_chars(s, bound.max_chars))
        .collect()
}

fn objections(value: Untrusted<'_>) -> Vec<Objection> {
    value
        .items()
        .filter_map(|entry| {
            // an objection without evidence carries no information
            let evidence = entry.field("evidence").text()?;
            Some(Objection {
                kind: pick(entry.field("type")),
                evidence: truncate_chars(evidence, OBJECTIONS.max_chars),
            })
        })
        .take(OBJECTIONS.max_items)
        .collect()
}

fn next_steps(value: Untrusted<'_>) -> Vec<NextStep> {
    value
        .items()
        .filter_map(|entry| {
            let description = entry.field("description").text()?;
            Some(NextStep {
                description: truncate_chars(description, NEXT_STEPS.max_chars),
                date: entry.field("date").text().and_then(parse_date_time),
            })
        })
        .take(NEXT_STEPS.max_items)
        .collect()
}

fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn bant(value: Untrusted<'_>) -> Bant {
    Bant {
        budget: pick(value.field("budget")),
        authority: pick(value.field("authority")),
        timeline: pick(value.field("timeline")),
        need: pick(value.field("need")),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn interaction_volume(value: Untrusted<'_>) -> InteractionVolume {
    let count = value
        .field("value")
        .number()
        .map(f64::round)
        .filter(|v| *v >= 1.0 && *v <= f64::from(u32::MAX))
        // range checked above
        .map(|v| v as u32);

    InteractionVolume {
        value: count,
        unit: normalize_unit(value.field("unit").text()),
        evidence: optional_text(value.field("evidence"), INTERACTION_EVIDENCE_MAX_CHARS),
    }
}
