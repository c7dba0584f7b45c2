//! Judgment payload and output-contract validation.
//!
//! The gateway hands back an untyped JSON payload; nothing about it is
//! trusted. `validate` applies the fixed contract in order and either
//! produces a `ValidatedJudgment` with real enums and clamped scores, or a
//! skip reason. Out-of-range numbers are corrected, not rejected; unknown
//! enum values are rejected, not corrected.

use serde::{Deserialize, Serialize};

/// Trading signal classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Avoid,
    Watch,
}

impl SignalKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "AVOID" => Some(Self::Avoid),
            "WATCH" => Some(Self::Watch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Avoid => "AVOID",
            Self::Watch => "WATCH",
        }
    }

    /// The only conflicting pair is (BUY, SELL). WATCH and AVOID never
    /// conflict with anything.
    pub fn conflicting_kind(&self) -> Option<SignalKind> {
        match self {
            Self::Buy => Some(Self::Sell),
            Self::Sell => Some(Self::Buy),
            Self::Avoid | Self::Watch => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Asx,
    Us,
    Crypto,
    Commodity,
}

impl Market {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASX" => Some(Self::Asx),
            "US" => Some(Self::Us),
            "CRYPTO" => Some(Self::Crypto),
            "COMMODITY" => Some(Self::Commodity),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asx => "ASX",
            Self::Us => "US",
            Self::Crypto => "CRYPTO",
            Self::Commodity => "COMMODITY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PumpRisk {
    Low,
    Medium,
    High,
}

impl PumpRisk {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Raw judgment exactly as the reasoning service returns it. Every field is
/// defaulted so a partial payload still deserializes; validation decides what
/// is actually usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJudgment {
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub signal: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub impact: f64,
    #[serde(default)]
    pub pump_dump_risk: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub signal_logic: String,
    #[serde(default = "default_relevant")]
    pub relevant: bool,
    #[serde(default)]
    pub skip_reason: String,
}

fn default_relevant() -> bool {
    true
}

/// Judgment that survived the output contract. Enums are real, scores are
/// in range, tickers are non-empty and capped at 4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedJudgment {
    pub kind: SignalKind,
    pub market: Market,
    pub tickers: Vec<String>,
    pub confidence: f64,
    pub impact: f64,
    pub pump_dump_risk: PumpRisk,
    pub summary: String,
    pub reasoning: String,
    pub signal_logic: String,
}

/// Outcome of validating one raw judgment.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(Box<ValidatedJudgment>),
    /// Judgment dropped; the reason is logged, nothing is persisted.
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotRelevant,
    InvalidSignal(String),
    InvalidMarket(String),
    NoTickers,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRelevant => write!(f, "not relevant"),
            Self::InvalidSignal(s) => write!(f, "invalid signal '{s}'"),
            Self::InvalidMarket(m) => write!(f, "invalid market '{m}'"),
            Self::NoTickers => write!(f, "no tickers extracted"),
        }
    }
}

/// Maximum number of tickers stored per signal; extras are silently dropped.
pub const MAX_TICKERS: usize = 4;

/// Apply the output contract, in order: relevance, signal kind, market,
/// tickers, then numeric clamping.
pub fn validate(raw: &RawJudgment) -> Validation {
    if !raw.relevant {
        return Validation::Skip(SkipReason::NotRelevant);
    }

    let Some(kind) = SignalKind::parse(&raw.signal) else {
        tracing::warn!(signal = %raw.signal, "judgment rejected: unknown signal kind");
        return Validation::Skip(SkipReason::InvalidSignal(raw.signal.clone()));
    };

    let Some(market) = Market::parse(&raw.market) else {
        tracing::warn!(market = %raw.market, "judgment rejected: unknown market");
        return Validation::Skip(SkipReason::InvalidMarket(raw.market.clone()));
    };

    let mut tickers: Vec<String> = raw
        .tickers
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tickers.is_empty() {
        return Validation::Skip(SkipReason::NoTickers);
    }
    tickers.truncate(MAX_TICKERS);

    let pump_dump_risk = raw
        .pump_dump_risk
        .as_deref()
        .and_then(PumpRisk::parse)
        .unwrap_or(PumpRisk::Low);

    Validation::Valid(Box::new(ValidatedJudgment {
        kind,
        market,
        tickers,
        confidence: raw.confidence.clamp(0.0, 1.0),
        impact: raw.impact.clamp(-1.0, 1.0),
        pump_dump_risk,
        summary: raw.summary.clone(),
        reasoning: raw.reasoning.clone(),
        signal_logic: raw.signal_logic.clone(),
    }))
}
