use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::datetime::{date_serde, format_time, time_serde};
use crate::error::TaskError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,

    #[serde(deserialize_with = "deserialize_text")]
    pub text: String,

    #[serde(with = "date_serde")]
    pub date: NaiveDate,

    #[serde(
        default,
        with = "time_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<NaiveTime>,

    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Builds a fresh, not yet completed task. Callers are expected to
    /// have validated `text`.
    pub fn new(text: String, date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            text,
            date,
            time,
            completed: false,
        }
    }

    pub fn hour(&self) -> Option<u32> {
        self.time.map(|time| time.hour())
    }

    /// `HH:MM`, or `--:--` for a task without a time.
    pub fn time_label(&self) -> String {
        self.time
            .map(format_time)
            .unwrap_or_else(|| "--:--".to_string())
    }

    pub fn short_id(&self) -> String {
        self.uuid.simple().to_string()[..8].to_string()
    }
}

/// Trims task text, rejecting text that is empty once trimmed.
pub fn validate_text(raw: &str) -> Result<String, TaskError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TaskError::validation("task text is required"));
    }
    Ok(trimmed.to_string())
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    validate_text(&raw).map_err(serde::de::Error::custom)
}

/// Field replacements applied by an edit. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub date: Option<String>,
    pub time: TimePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TimePatch {
    #[default]
    Keep,
    Set(String),
    Clear,
}

impl TaskPatch {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn time(mut self, time: impl Into<String>) -> Self {
        self.time = TimePatch::Set(time.into());
        self
    }

    pub fn clear_time(mut self) -> Self {
        self.time = TimePatch::Clear;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.date.is_none() && self.time == TimePatch::Keep
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::{Task, TaskPatch, TimePatch};

    fn sample() -> Task {
        Task::new(
            "Standup".to_string(),
            NaiveDate::from_ymd_opt(2024, 6, 10).expect("date"),
            NaiveTime::from_hms_opt(9, 0, 0),
        )
    }

    #[test]
    fn serializes_to_flat_record() {
        let task = sample();
        let value = serde_json::to_value(&task).expect("serialize");
        assert_eq!(value["text"], "Standup");
        assert_eq!(value["date"], "2024-06-10");
        assert_eq!(value["time"], "09:00");
        assert_eq!(value["completed"], false);
        assert_eq!(value["uuid"], task.uuid.to_string());
    }

    #[test]
    fn omits_missing_time() {
        let mut task = sample();
        task.time = None;
        let raw = serde_json::to_string(&task).expect("serialize");
        assert!(!raw.contains("\"time\""));
        let back: Task = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back, task);
    }

    #[test]
    fn legacy_record_without_uuid_gets_one() {
        let raw = r#"{"text":"Gym","date":"2024-06-11","time":"18:30","completed":true}"#;
        let task: Task = serde_json::from_str(raw).expect("deserialize legacy");
        assert_eq!(task.text, "Gym");
        assert!(task.completed);
        assert_eq!(task.time_label(), "18:30");
        assert!(!task.uuid.is_nil());
    }

    #[test]
    fn rejects_bad_date_on_load() {
        let raw = r#"{"text":"Gym","date":"2024-02-30"}"#;
        assert!(serde_json::from_str::<Task>(raw).is_err());
    }

    #[test]
    fn text_is_trimmed_and_required_on_load() {
        let blank = r#"{"text":"   ","date":"2024-06-10"}"#;
        assert!(serde_json::from_str::<Task>(blank).is_err());

        let padded = r#"{"text":"  Gym \t","date":"2024-06-10"}"#;
        let task: Task = serde_json::from_str(padded).expect("deserialize");
        assert_eq!(task.text, "Gym");
    }

    #[test]
    fn empty_time_string_loads_as_absent() {
        let raw = r#"{"text":"Read","date":"2024-06-11","time":""}"#;
        let task: Task = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(task.time, None);
        assert_eq!(task.time_label(), "--:--");
    }

    #[test]
    fn patch_builder_tracks_fields() {
        assert!(TaskPatch::default().is_empty());
        let patch = TaskPatch::default().text("Retro").clear_time();
        assert_eq!(patch.text.as_deref(), Some("Retro"));
        assert_eq!(patch.time, TimePatch::Clear);
        assert!(!patch.is_empty());
    }
}
