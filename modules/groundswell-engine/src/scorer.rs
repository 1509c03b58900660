//! Vigor scoring — pure conversion of an activity payload into a
//! bounded 0–100 contribution amount.
//!
//! Validation is a distinct pre-scoring step: it checks the kind string
//! and the required sub-metrics (present, numeric, non-negative) and
//! produces a typed `ScoreInput`. Scoring itself never fails: each
//! metric is normalized against its cap, combined by fixed weights that
//! sum to 1.0 per kind, scaled to 0–100, rounded, and clamped.

use serde_json::Value;

use groundswell_common::{ContributionKind, GroundswellError};

// Per-kind metric caps.
const PHYSICAL_DURATION_CAP: f64 = 60.0;
const PHYSICAL_INTENSITY_CAP: f64 = 10.0;
const VOICE_DURATION_CAP: f64 = 120.0;
const VOICE_CLARITY_CAP: f64 = 100.0;
const STATEMENT_WORDS_CAP: f64 = 500.0;
const STATEMENT_ORIGINALITY_CAP: f64 = 100.0;
const OUTREACH_PEOPLE_CAP: f64 = 50.0;
const OUTREACH_HOURS_CAP: f64 = 10.0;

/// Fallback tone score for unrecognized labels.
const NEUTRAL_TONE_SCORE: f64 = 50.0;

/// Validated, typed scoring input.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreInput {
    PhysicalActivity {
        duration_minutes: f64,
        intensity: f64,
    },
    VoiceRecording {
        duration_seconds: f64,
        clarity: f64,
    },
    WrittenStatement {
        word_count: f64,
        originality: f64,
        tone_score: f64,
    },
    CommunityOutreach {
        people_reached: f64,
        hours_spent: f64,
    },
}

/// Validate a raw activity payload against its declared kind.
///
/// Rejects unknown kind strings and missing/non-numeric/negative
/// sub-metrics before scoring is ever invoked.
pub fn validate(kind: &str, payload: &Value) -> Result<(ContributionKind, ScoreInput), GroundswellError> {
    let kind = ContributionKind::parse(kind)
        .ok_or_else(|| GroundswellError::Validation(format!("unknown contribution kind: {kind}")))?;

    let input = match kind {
        ContributionKind::PhysicalActivity => ScoreInput::PhysicalActivity {
            duration_minutes: required_metric(payload, "duration_minutes")?,
            intensity: required_metric(payload, "intensity")?,
        },
        ContributionKind::VoiceRecording => ScoreInput::VoiceRecording {
            duration_seconds: required_metric(payload, "duration_seconds")?,
            clarity: required_metric(payload, "clarity")?,
        },
        ContributionKind::WrittenStatement => ScoreInput::WrittenStatement {
            word_count: required_metric(payload, "word_count")?,
            originality: required_metric(payload, "originality")?,
            tone_score: tone_score(required_label(payload, "emotional_tone")?),
        },
        ContributionKind::CommunityOutreach => ScoreInput::CommunityOutreach {
            people_reached: required_metric(payload, "people_reached")?,
            hours_spent: required_metric(payload, "hours_spent")?,
        },
    };

    Ok((kind, input))
}

/// Score a validated input. Pure; always lands in [0, 100].
pub fn score(input: &ScoreInput) -> u32 {
    let weighted = match input {
        ScoreInput::PhysicalActivity {
            duration_minutes,
            intensity,
        } => {
            0.6 * normalize(*duration_minutes, PHYSICAL_DURATION_CAP)
                + 0.4 * normalize(*intensity, PHYSICAL_INTENSITY_CAP)
        }
        ScoreInput::VoiceRecording {
            duration_seconds,
            clarity,
        } => {
            0.5 * normalize(*duration_seconds, VOICE_DURATION_CAP)
                + 0.5 * normalize(*clarity, VOICE_CLARITY_CAP)
        }
        ScoreInput::WrittenStatement {
            word_count,
            originality,
            tone_score,
        } => {
            0.5 * normalize(*word_count, STATEMENT_WORDS_CAP)
                + 0.2 * normalize(*originality, STATEMENT_ORIGINALITY_CAP)
                + 0.3 * normalize(*tone_score, 100.0)
        }
        ScoreInput::CommunityOutreach {
            people_reached,
            hours_spent,
        } => {
            0.7 * normalize(*people_reached, OUTREACH_PEOPLE_CAP)
                + 0.3 * normalize(*hours_spent, OUTREACH_HOURS_CAP)
        }
    };

    ((weighted * 100.0).round() as i64).clamp(0, 100) as u32
}

/// Map an emotional tone label to its fixed score. Unrecognized labels
/// fall back to the neutral midpoint.
pub fn tone_score(label: &str) -> f64 {
    match label {
        "passionate" => 90.0,
        "determined" => 80.0,
        "hopeful" => 75.0,
        "angry" => 70.0,
        "concerned" => 60.0,
        "neutral" => 50.0,
        _ => NEUTRAL_TONE_SCORE,
    }
}

fn normalize(value: f64, cap: f64) -> f64 {
    (value / cap).clamp(0.0, 1.0)
}

fn required_metric(payload: &Value, field: &str) -> Result<f64, GroundswellError> {
    let value = payload
        .get(field)
        .ok_or_else(|| GroundswellError::Validation(format!("missing required field: {field}")))?;
    let number = value
        .as_f64()
        .ok_or_else(|| GroundswellError::Validation(format!("field {field} must be a number")))?;
    if number < 0.0 || !number.is_finite() {
        return Err(GroundswellError::Validation(format!(
            "field {field} must be non-negative, got {number}"
        )));
    }
    Ok(number)
}

fn required_label<'a>(payload: &'a Value, field: &str) -> Result<&'a str, GroundswellError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GroundswellError::Validation(format!("missing required field: {field}")))
}
