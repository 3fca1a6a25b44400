// src/models/learner.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Curriculum framework a learner is assessed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "Common Core")]
    CommonCore,
    #[serde(rename = "IB")]
    Ib,
    #[serde(rename = "Cambridge")]
    Cambridge,
    #[serde(rename = "National Curriculum")]
    NationalCurriculum,
}

impl Framework {
    pub const ALL: [Framework; 4] = [
        Framework::CommonCore,
        Framework::Ib,
        Framework::Cambridge,
        Framework::NationalCurriculum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::CommonCore => "Common Core",
            Framework::Ib => "IB",
            Framework::Cambridge => "Cambridge",
            Framework::NationalCurriculum => "National Curriculum",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Framework::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown curriculum framework '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

/// A lesson time window, "HH:MM" to "HH:MM".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSegment {
    pub start: String,
    pub end: String,
}

/// Weekly lesson schedule. Days are numbered 1 (Monday) to 7 (Sunday).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub active_7_days: bool,
    #[serde(default)]
    pub selected_days: Vec<u8>,
    #[serde(default)]
    pub time_segments: Vec<TimeSegment>,
}

impl Schedule {
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.selected_days.iter().any(|d| !(1..=7).contains(d)) {
            return Err(ValidationError::new("day_out_of_range"));
        }
        for segment in &self.time_segments {
            let start = chrono::NaiveTime::parse_from_str(&segment.start, "%H:%M")
                .map_err(|_| ValidationError::new("invalid_time"))?;
            let end = chrono::NaiveTime::parse_from_str(&segment.end, "%H:%M")
                .map_err(|_| ValidationError::new("invalid_time"))?;
            if end <= start {
                return Err(ValidationError::new("segment_ends_before_start"));
            }
        }
        Ok(())
    }
}

/// The end user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learner {
    /// Opaque id issued by the identity provider.
    pub id: String,
    pub name: String,
    pub age: i32,
    pub grade: i32,
    pub framework: Framework,
    pub theme: Theme,
    pub parent_email: Option<String>,
    pub offline_mode: bool,
    pub schedule: Schedule,
}

impl Learner {
    pub fn age_group(&self) -> &'static str {
        if self.age <= 8 { "6-8" } else { "9-12" }
    }
}

/// DTO for the profile-setup flow.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileSetupRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters."))]
    pub name: String,
    #[validate(range(min = 3, max = 18, message = "Age must be between 3 and 18."))]
    pub age: i32,
    #[validate(email(message = "Parent email is not a valid address."))]
    pub parent_email: Option<String>,
    pub framework: Framework,
    /// Starting grade. Falls back to identity metadata, then grade 1.
    #[validate(range(min = 0, max = 12))]
    pub grade: Option<i32>,
    #[serde(default)]
    pub terms_accepted: bool,
}

/// DTO for the settings page. Absent fields stay unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct SettingsUpdate {
    pub theme: Option<Theme>,
    pub offline_mode: Option<bool>,
    #[validate(custom(function = validate_schedule))]
    pub schedule: Option<Schedule>,
}

fn validate_schedule(schedule: &Schedule) -> Result<(), ValidationError> {
    schedule.check()
}

impl SettingsUpdate {
    pub fn apply(self, settings: &mut Settings) {
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        if let Some(offline_mode) = self.offline_mode {
            settings.offline_mode = offline_mode;
        }
        if let Some(mut schedule) = self.schedule {
            if schedule.active_7_days {
                schedule.selected_days = (1..=7).collect();
            }
            settings.schedule = schedule;
        }
    }
}

/// The learner-editable settings. Writes touch these columns only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub theme: Theme,
    pub offline_mode: bool,
    pub schedule: Schedule,
}

impl From<&Learner> for Settings {
    fn from(learner: &Learner) -> Self {
        Self {
            theme: learner.theme,
            offline_mode: learner.offline_mode,
            schedule: learner.schedule.clone(),
        }
    }
}
