//! Turning raw model output into a bounded, enum-safe classification.
//!
//! The flow is always `extract_object` → [`normalize`]: the extractor
//! recovers one JSON object from whatever text the model produced, and the
//! normalizer coerces that untrusted object into a [`ClassificationResult`]
//! without ever failing.

mod extract;
mod model;
mod normalize;
mod untrusted;

pub use extract::{ExtractError, extract_object};
pub use model::{
    Bant, BantAuthority, BantBudget, BantNeed, BantTimeline, ClassificationResult, ClosedSet,
    DealStage, InteractionUnit, InteractionVolume, Level, NextStep, Objection, ObjectionType,
    SCHEMA_VERSION, Signals, StatusQuo,
};
pub(crate) use model::{
    COMPANY_CONTEXT_MAX_CHARS, COMPETITORS, EVIDENCE, FIT_REASONS, INDUSTRY_MAX_CHARS,
    INTERACTION_EVIDENCE_MAX_CHARS, ListBound, NEXT_STEPS, OBJECTIONS, PAIN_POINTS, RISKS,
    SIGNALS, SUMMARY_MAX_CHARS, USE_CASES,
};
pub use normalize::normalize;
pub use untrusted::{Untrusted, UntrustedPayload};
