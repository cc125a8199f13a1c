//! Mood check-in submissions
//!
//! Submissions arrive loosely shaped from the client. They are validated and
//! converted into an immutable [`CheckIn`] before the rate limiter is consulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_range, ValidationError};
use crate::types::{ActivityEntry, CheckIn, Mood, UserId};

/// Maximum length of free-text notes
pub const MAX_NOTES_LEN: usize = 2000;

/// Mood as submitted by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Check-in as submitted by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckInSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<MoodSubmission>,
    #[serde(default)]
    pub activities: Vec<ActivityEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Only honoured when importing historical check-ins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CheckInSubmission {
    /// Convenience constructor for a mood-only submission
    pub fn with_mood(score: i64) -> Self {
        Self {
            mood: Some(MoodSubmission {
                score: Some(score),
                label: None,
                description: None,
            }),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mood = self
            .mood
            .as_ref()
            .ok_or_else(|| ValidationError::MissingField("mood".to_string()))?;
        let score = mood
            .score
            .ok_or_else(|| ValidationError::MissingField("mood.score".to_string()))?;
        check_range("mood.score", score as f64, 1.0, 5.0)?;

        for (idx, activity) in self.activities.iter().enumerate() {
            if activity.activity_type.trim().is_empty() {
                return Err(ValidationError::MissingField(format!(
                    "activities[{}].type",
                    idx
                )));
            }
        }

        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                return Err(ValidationError::TooLong {
                    field: "notes".to_string(),
                    max: MAX_NOTES_LEN,
                });
            }
        }

        Ok(())
    }

    /// Validate and build the immutable check-in record
    pub fn into_check_in(
        self,
        user_id: impl Into<UserId>,
        timestamp: DateTime<Utc>,
    ) -> Result<CheckIn, ValidationError> {
        self.validate()?;

        // validate() guarantees mood and a 1-5 score
        let mood = self.mood.unwrap_or_default();
        let score = mood.score.unwrap_or(1).clamp(1, 5) as u8;
        let label = mood
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| default_mood_label(score).to_string());

        Ok(CheckIn {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            timestamp,
            mood: Mood {
                score,
                label,
                description: mood.description,
            },
            activities: self.activities,
            notes: self.notes,
        })
    }
}

fn default_mood_label(score: u8) -> &'static str {
    match score {
        1 => "very low",
        2 => "low",
        3 => "okay",
        4 => "good",
        _ => "great",
    }
}
