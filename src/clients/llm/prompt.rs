//! Instruction sent with every transcript.
use std::fmt::Write as _;

use crate::classification::{
    BantAuthority, BantBudget, BantNeed, BantTimeline, ClosedSet, DealStage, Level,
    ObjectionType, SCHEMA_VERSION, StatusQuo,
};

pub const SYSTEM_PROMPT: &str =
    "Respond ONLY with a valid JSON object. Do not include any additional text.";

const ROOT_KEYS: &str = "version, summary, industry, company_context, deal_stage, intent_level, \
fit_score, fit_reasons, risk_level, risks, use_cases, pain_points, priority_pain, objections, \
objection_severity, competitors_mentioned, status_quo, bant, interaction_volume, next_steps, \
signals, confidence, evidence";

fn choices<T: ClosedSet>() -> String {
    T::ALL
        .iter()
        .map(|member| format!("\"{}\"", member.as_str()))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Builds the user message for `transcript`.
#[must_use]
pub fn build_classification_prompt(transcript: &str) -> String {
    let mut prompt = String::with_capacity(transcript.len() + 2_048);
    prompt.push_str("Return ONLY valid JSON (no markdown).\n\nFollow these constraints strictly:\n");

    let enums = [
        ("deal_stage", choices::<DealStage>()),
        ("intent_level", choices::<Level>()),
        ("risk_level", choices::<Level>()),
        ("priority_pain", choices::<Level>()),
        ("objection_severity", choices::<Level>()),
        ("status_quo", choices::<StatusQuo>()),
        ("bant.budget", choices::<BantBudget>()),
        ("bant.authority", choices::<BantAuthority>()),
        ("bant.timeline", choices::<BantTimeline>()),
        ("bant.need", choices::<BantNeed>()),
        ("objections[].type", choices::<ObjectionType>()),
    ];
    let _ = writeln!(prompt, "- version: \"{SCHEMA_VERSION}\"");
    for (key, allowed) in enums {
        let _ = writeln!(prompt, "- {key}: {allowed}");
    }

    prompt.push_str(
        "\nRequired types:\n\
- fit_score: number between 0 and 100 (use 0 if unknown)\n\
- confidence: number between 0 and 1 (use 0.5 if unknown)\n\
- interaction_volume: { value: number, unit: string, evidence: string | null }\n\
- objections: array of { type: string, evidence: string }\n\
- next_steps: array of { description: string, date: ISO 8601 date-time string | null }\n\
- signals: { positive: string[], negative: string[] }\n\
- fit_reasons, risks, use_cases, pain_points, competitors_mentioned, evidence: string[]\n\
\nWhen information is missing:\n\
- use \"unknown\" for enums\n\
- use [] for arrays\n\
- use null only where allowed (industry, company_context, interaction_volume.evidence, next_steps[].date)\n",
    );

    let _ = write!(
        prompt,
        "\nReturn EXACTLY these root keys:\n{ROOT_KEYS}.\n\nTranscript:\n\"\"\"\n{transcript}\n\"\"\"\n"
    );
    prompt
}
