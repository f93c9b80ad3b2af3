//! Schema of a persisted [`ClassificationResult`].
use once_cell::sync::Lazy;
use serde_json::{Value, json};

use super::{ValidationResult, validate_json};
use crate::classification::{
    BantAuthority, BantBudget, BantNeed, BantTimeline, COMPANY_CONTEXT_MAX_CHARS, COMPETITORS,
    ClassificationResult, ClosedSet, DealStage, EVIDENCE, FIT_REASONS, INDUSTRY_MAX_CHARS,
    INTERACTION_EVIDENCE_MAX_CHARS, InteractionUnit, Level, ListBound, NEXT_STEPS, OBJECTIONS,
    ObjectionType, PAIN_POINTS, RISKS, SCHEMA_VERSION, SIGNALS, SUMMARY_MAX_CHARS, StatusQuo,
    USE_CASES,
};

fn enum_of<T: ClosedSet>() -> Value {
    let names: Vec<&str> = T::ALL.iter().map(|member| member.as_str()).collect();
    json!({ "type": "string", "enum": names })
}

fn string_list(bound: ListBound) -> Value {
    json!({
        "type": "array",
        "maxItems": bound.max_items,
        "items": { "type": "string", "minLength": 1, "maxLength": bound.max_chars }
    })
}

pub static CLASSIFICATION_RESULT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Classification Result",
        "type": "object",
        "additionalProperties": false,
        "required": [
            "version", "summary", "industry", "company_context", "deal_stage",
            "intent_level", "fit_score", "fit_reasons", "risk_level", "risks",
            "use_cases", "pain_points", "priority_pain", "objections",
            "objection_severity", "competitors_mentioned", "status_quo", "bant",
            "interaction_volume", "next_steps", "signals", "confidence", "evidence"
        ],
        "properties": {
            "version": { "const": SCHEMA_VERSION },
            "summary": { "type": "string", "minLength": 1, "maxLength": SUMMARY_MAX_CHARS },
            "industry": { "type": ["string", "null"], "maxLength": INDUSTRY_MAX_CHARS },
            "company_context": { "type": ["string", "null"], "maxLength": COMPANY_CONTEXT_MAX_CHARS },
            "deal_stage": enum_of::<DealStage>(),
            "intent_level": enum_of::<Level>(),
            "fit_score": { "type": "integer", "minimum": 0, "maximum": 100 },
            "fit_reasons": string_list(FIT_REASONS),
            "risk_level": enum_of::<Level>(),
            "risks": string_list(RISKS),
            "use_cases": string_list(USE_CASES),
            "pain_points": string_list(PAIN_POINTS),
            "priority_pain": enum_of::<Level>(),
            "objections": {
                "type": "array",
                "maxItems": OBJECTIONS.max_items,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["type", "evidence"],
                    "properties": {
                        "type": enum_of::<ObjectionType>(),
                        "evidence": { "type": "string", "minLength": 1, "maxLength": OBJECTIONS.max_chars }
                    }
                }
            },
            "objection_severity": enum_of::<Level>(),
            "competitors_mentioned": string_list(COMPETITORS),
            "status_quo": enum_of::<StatusQuo>(),
            "bant": {
                "type": "object",
                "additionalProperties": false,
                "required": ["budget", "authority", "timeline", "need"],
                "properties": {
                    "budget": enum_of::<BantBudget>(),
                    "authority": enum_of::<BantAuthority>(),
                    "timeline": enum_of::<BantTimeline>(),
                    "need": enum_of::<BantNeed>()
                }
            },
            "interaction_volume": {
                "type": "object",
                "additionalProperties": false,
                "required": ["value", "unit", "evidence"],
                "properties": {
                    "value": { "type": ["integer", "null"], "minimum": 1 },
                    "unit": enum_of::<InteractionUnit>(),
                    "evidence": { "type": ["string", "null"], "maxLength": INTERACTION_EVIDENCE_MAX_CHARS }
                }
            },
            "next_steps": {
                "type": "array",
                "maxItems": NEXT_STEPS.max_items,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["description", "date"],
                    "properties": {
                        "description": { "type": "string", "minLength": 1, "maxLength": NEXT_STEPS.max_chars },
                        "date": { "type": ["string", "null"], "format": "date-time" }
                    }
                }
            },
            "signals": {
                "type": "object",
                "additionalProperties": false,
                "required": ["positive", "negative"],
                "properties": {
                    "positive": string_list(SIGNALS),
                    "negative": string_list(SIGNALS)
                }
            },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "evidence": string_list(EVIDENCE)
        }
    })
});

/// Validates a normalized result before it is persisted.
#[must_use]
pub fn validate_result(result: &ClassificationResult) -> ValidationResult {
    match serde_json::to_value(result) {
        Ok(instance) => validate_json(&CLASSIFICATION_RESULT_SCHEMA, &instance),
        Err(e) => ValidationResult::invalid(vec![format!("result is not serializable: {e}")]),
    }
}
