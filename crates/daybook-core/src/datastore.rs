use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::datetime::{parse_date, parse_time};
use crate::navigation::ViewState;
use crate::store::TaskPersistence;
use crate::task::{Task, validate_text};

/// File-backed persistence: one task per line in `tasks.data`, the
/// current calendar view in `view.data`.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub view_path: PathBuf,
}

/// A record from the browser dashboard's exported task array.
#[derive(Debug, Deserialize)]
struct LegacyTask {
    #[serde(default)]
    text: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    completed: bool,
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub tasks: Vec<Task>,
    pub skipped: usize,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let view_path = data_dir.join("view.data");

        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            view = %view_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            view_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }

    /// The persisted view, if one was saved and still parses.
    #[tracing::instrument(skip(self))]
    pub fn load_view_state(&self) -> Option<ViewState> {
        let raw = match fs::read_to_string(&self.view_path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(error = %err, "no saved view state");
                return None;
            }
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str(trimmed) {
            Ok(view) => Some(view),
            Err(err) => {
                warn!(file = %self.view_path.display(), error = %err, "ignoring unreadable view state");
                None
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn save_view_state(&self, view: &ViewState) {
        let result = serde_json::to_string(view)
            .map_err(anyhow::Error::from)
            .and_then(|payload| write_atomic(&self.view_path, payload.as_bytes()));
        if let Err(err) = result {
            error!(file = %self.view_path.display(), error = %err, "failed to save view state");
        }
    }

    /// Parses the JSON array exported by the browser dashboard. Records
    /// with empty text or a bad date/time are skipped.
    #[tracing::instrument(skip(raw))]
    pub fn import_json_array(raw: &str) -> anyhow::Result<ImportOutcome> {
        let records: Vec<LegacyTask> =
            serde_json::from_str(raw).context("import payload is not a JSON array of tasks")?;

        let mut outcome = ImportOutcome::default();
        for (idx, record) in records.into_iter().enumerate() {
            match legacy_to_task(record) {
                Ok(task) => outcome.tasks.push(task),
                Err(err) => {
                    warn!(index = idx, error = %err, "skipping invalid import record");
                    outcome.skipped += 1;
                }
            }
        }

        info!(
            imported = outcome.tasks.len(),
            skipped = outcome.skipped,
            "parsed import payload"
        );
        Ok(outcome)
    }

    pub fn export_json_array(tasks: &[Task]) -> anyhow::Result<String> {
        serde_json::to_string_pretty(tasks).context("failed to serialize tasks")
    }
}

impl TaskPersistence for DataStore {
    fn load(&self) -> Vec<Task> {
        match self.load_tasks() {
            Ok(tasks) => tasks,
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "starting with an empty task list");
                Vec::new()
            }
        }
    }

    fn save(&self, tasks: &[Task]) {
        if let Err(err) = self.save_tasks(tasks) {
            let message = format!("{err:#}");
            error!(error = %message, count = tasks.len(), "tasks were not saved");
        }
    }
}

fn legacy_to_task(record: LegacyTask) -> anyhow::Result<Task> {
    let text = validate_text(&record.text)?;
    let date = parse_date(&record.date)?;
    let time = match record.time.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(raw) => Some(parse_time(raw)?),
    };

    let mut task = Task::new(text, date, time);
    task.completed = record.completed;
    Ok(task)
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    let mut skipped = 0_usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Task>(trimmed) {
            Ok(task) => out.push(task),
            Err(err) => {
                warn!(file = %path.display(), line = idx + 1, error = %err, "skipping unreadable task line");
                skipped += 1;
            }
        }
    }

    debug!(count = out.len(), skipped, "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let mut payload = Vec::new();
    for task in tasks {
        serde_json::to_writer(&mut payload, task)?;
        payload.push(b'\n');
    }
    write_atomic(path, &payload)
}

fn write_atomic(path: &Path, payload: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(payload)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{NaiveDate, NaiveTime};
    use tempfile::tempdir;

    use super::DataStore;
    use crate::calendar::ViewMode;
    use crate::navigation::ViewState;
    use crate::store::TaskPersistence;
    use crate::task::Task;

    #[test]
    fn unreadable_lines_are_skipped_on_load() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        fs::write(
            &store.tasks_path,
            concat!(
                "{not json\n",
                "{\"text\":\"   \",\"date\":\"2024-06-10\"}\n",
                "{\"text\":\"Standup\",\"date\":\"2024-06-10\",\"time\":\"09:00\"}\n",
                "{\"text\":\"Bad date\",\"date\":\"2024-13-01\"}\n",
            ),
        )
        .expect("write tasks");

        let loaded = store.load_tasks().expect("load tasks");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "Standup");
        assert_eq!(store.load(), loaded);
    }

    #[test]
    fn missing_task_file_loads_as_empty() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        fs::remove_file(&store.tasks_path).expect("remove tasks file");

        assert!(store.load_tasks().is_err());
        assert!(store.load().is_empty());
    }

    #[test]
    fn task_collection_round_trips_through_file() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let day = NaiveDate::from_ymd_opt(2024, 6, 10).expect("date");
        let nine = NaiveTime::from_hms_opt(9, 0, 0).expect("time");

        let mut done = Task::new("Standup".to_string(), day, Some(nine));
        done.completed = true;
        let original = vec![
            Task::new("Read".to_string(), day.succ_opt().expect("date"), None),
            done,
            Task::new("Standup".to_string(), day, Some(nine)),
            Task::new("Dentist".to_string(), day, NaiveTime::from_hms_opt(16, 30, 0)),
            Task::new("Read".to_string(), day.succ_opt().expect("date"), None),
        ];

        store.save_tasks(&original).expect("save tasks");
        assert_eq!(store.load_tasks().expect("load tasks"), original);

        store.save_tasks(&[]).expect("save empty");
        assert_eq!(store.load_tasks().expect("load tasks"), Vec::<Task>::new());
    }

    #[test]
    fn save_into_missing_directory_is_swallowed() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let tasks_path = store.tasks_path.clone();
        fs::remove_dir_all(temp.path()).expect("remove data dir");

        store.save(&[]);
        assert!(!tasks_path.exists());
    }

    #[test]
    fn view_state_round_trips_and_tolerates_garbage() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        assert_eq!(store.load_view_state(), None);

        let view = ViewState {
            mode: ViewMode::Monthly,
            selected: NaiveDate::from_ymd_opt(2024, 2, 29).expect("date"),
        };
        store.save_view_state(&view);
        assert_eq!(store.load_view_state(), Some(view));

        fs::write(&store.view_path, "[]").expect("write garbage");
        assert_eq!(store.load_view_state(), None);
    }

    #[test]
    fn import_skips_invalid_records() {
        let raw = r#"[
            {"text":"Standup","date":"2024-06-10","time":"09:00","completed":false},
            {"text":"  ","date":"2024-06-10","time":"10:00","completed":false},
            {"text":"Bad day","date":"2024-06-31","completed":false},
            {"text":"Anytime","date":"2024-06-11","time":"","completed":true}
        ]"#;

        let outcome = DataStore::import_json_array(raw).expect("import");
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.tasks.len(), 2);
        assert_eq!(outcome.tasks[0].text, "Standup");
        assert_eq!(outcome.tasks[1].time, None);
        assert!(outcome.tasks[1].completed);
        assert_ne!(outcome.tasks[0].uuid, outcome.tasks[1].uuid);

        assert!(DataStore::import_json_array("{}").is_err());
    }
}
