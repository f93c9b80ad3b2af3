//! Output schema of one classification.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: &str = "v1";
pub const FALLBACK_SUMMARY: &str = "no summary available";
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

pub const SUMMARY_MAX_CHARS: usize = 400;
pub const INDUSTRY_MAX_CHARS: usize = 80;
pub const COMPANY_CONTEXT_MAX_CHARS: usize = 240;
pub const INTERACTION_EVIDENCE_MAX_CHARS: usize = 240;

/// Item-count and per-item length caps of one list field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListBound {
    pub max_items: usize,
    pub max_chars: usize,
}

impl ListBound {
    const fn new(max_items: usize, max_chars: usize) -> Self {
        Self {
            max_items,
            max_chars,
        }
    }
}

pub const FIT_REASONS: ListBound = ListBound::new(8, 120);
pub const RISKS: ListBound = ListBound::new(8, 120);
pub const USE_CASES: ListBound = ListBound::new(8, 80);
pub const PAIN_POINTS: ListBound = ListBound::new(10, 120);
pub const COMPETITORS: ListBound = ListBound::new(6, 80);
pub const SIGNALS: ListBound = ListBound::new(10, 120);
pub const EVIDENCE: ListBound = ListBound::new(10, 240);
/// `max_chars` applies to the objection evidence.
pub const OBJECTIONS: ListBound = ListBound::new(8, 240);
/// `max_chars` applies to the step description.
pub const NEXT_STEPS: ListBound = ListBound::new(6, 240);

/// A closed vocabulary with a designated fallback member.
pub trait ClosedSet: Sized + Copy + Default + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// Exact match after trimming; anything else is rejected.
    fn parse(raw: &str) -> Option<Self>;
}

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, fallback = $fallback:ident,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl ClosedSet for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            fn parse(raw: &str) -> Option<Self> {
                match raw.trim() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$fallback
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_set!(
    DealStage, fallback = Unknown, {
        Discovery => "discovery",
        Qualification => "qualification",
        Proposal => "proposal",
        Negotiation => "negotiation",
        ClosedWon => "closed_won",
        ClosedLost => "closed_lost",
        Unknown => "unknown",
    }
);

closed_set!(
    /// Shared scale for intent, risk, pain priority and objection severity.
    Level, fallback = Unknown, {
        High => "high",
        Medium => "medium",
        Low => "low",
        Unknown => "unknown",
    }
);

closed_set!(
    StatusQuo, fallback = Unknown, {
        True => "true",
        False => "false",
        Unknown => "unknown",
    }
);

closed_set!(
    BantBudget, fallback = Unknown, {
        Confirmed => "confirmed",
        Unconfirmed => "unconfirmed",
        Absent => "none",
        Unknown => "unknown",
    }
);

closed_set!(
    BantAuthority, fallback = Unknown, {
        DecisionMakerPresent => "decision_maker_present",
        InfluencerPresent => "influencer_present",
        NotPresent => "not_present",
        Unknown => "unknown",
    }
);

closed_set!(
    BantTimeline, fallback = Unknown, {
        ThisMonth => "this_month",
        ThisQuarter => "this_quarter",
        ThisYear => "this_year",
        Unknown => "unknown",
    }
);

closed_set!(
    BantNeed, fallback = Unknown, {
        Clear => "clear",
        Vague => "vague",
        Absent => "none",
        Unknown => "unknown",
    }
);

closed_set!(
    InteractionUnit, fallback = Unknown, {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
        Unknown => "unknown",
    }
);

closed_set!(
    ObjectionType, fallback = Other, {
        Price => "price",
        Timing => "timing",
        Authority => "authority",
        Need => "need",
        Competition => "competition",
        Security => "security",
        Integration => "integration",
        BudgetFreeze => "budget_freeze",
        Other => "other",
    }
);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bant {
    pub budget: BantBudget,
    pub authority: BantAuthority,
    pub timeline: BantTimeline,
    pub need: BantNeed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionVolume {
    /// Positive count of interactions per `unit`.
    pub value: Option<u32>,
    pub unit: InteractionUnit,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objection {
    #[serde(rename = "type")]
    pub kind: ObjectionType,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStep {
    pub description: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

/// Normalized classification of one queue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub version: String,
    pub summary: String,
    pub industry: Option<String>,
    pub company_context: Option<String>,
    pub deal_stage: DealStage,
    pub intent_level: Level,
    pub fit_score: u8,
    pub fit_reasons: Vec<String>,
    pub risk_level: Level,
    pub risks: Vec<String>,
    pub use_cases: Vec<String>,
    pub pain_points: Vec<String>,
    pub priority_pain: Level,
    pub objections: Vec<Objection>,
    pub objection_severity: Level,
    pub competitors_mentioned: Vec<String>,
    pub status_quo: StatusQuo,
    pub bant: Bant,
    pub interaction_volume: InteractionVolume,
    pub next_steps: Vec<NextStep>,
    pub signals: Signals,
    pub confidence: f64,
    pub evidence: Vec<String>,
}
