use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::calendar::day_tasks;
use crate::datetime::{add_days, parse_date, parse_time};
use crate::error::TaskError;
use crate::task::{Task, TaskPatch, TimePatch, validate_text};

/// Persistence collaborator for the task collection.
///
/// Both operations are best effort: `load` degrades to an empty
/// collection and `save` reports its own failures instead of returning
/// them.
pub trait TaskPersistence {
    fn load(&self) -> Vec<Task>;
    fn save(&self, tasks: &[Task]);
}

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    saved: RefCell<Vec<Task>>,
    saves: Cell<usize>,
}

impl MemoryBackend {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            saved: RefCell::new(tasks),
            saves: Cell::new(0),
        }
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.saved.borrow().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl TaskPersistence for MemoryBackend {
    fn load(&self) -> Vec<Task> {
        self.snapshot()
    }

    fn save(&self, tasks: &[Task]) {
        *self.saved.borrow_mut() = tasks.to_vec();
        self.saves.set(self.saves.get() + 1);
    }
}

impl<P: TaskPersistence + ?Sized> TaskPersistence for &P {
    fn load(&self) -> Vec<Task> {
        (**self).load()
    }

    fn save(&self, tasks: &[Task]) {
        (**self).save(tasks)
    }
}

/// The canonical task collection.
///
/// Insertion order is kept as-is; every listing derives its own display
/// order. Each successful mutation is handed to the backend.
#[derive(Debug)]
pub struct TaskStore<P: TaskPersistence = MemoryBackend> {
    tasks: Vec<Task>,
    backend: P,
}

impl Default for TaskStore<MemoryBackend> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl TaskStore<MemoryBackend> {
    pub fn in_memory() -> Self {
        Self {
            tasks: Vec::new(),
            backend: MemoryBackend::default(),
        }
    }
}

impl<P: TaskPersistence> TaskStore<P> {
    #[tracing::instrument(skip(backend))]
    pub fn open(backend: P) -> Self {
        let tasks = backend.load();
        info!(count = tasks.len(), "opened task store");
        Self { tasks, backend }
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, uuid: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.uuid == uuid)
    }

    /// Resolves a UUID prefix (hyphens optional) to exactly one task.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<&Task, TaskError> {
        let needle = prefix.trim().replace('-', "").to_ascii_lowercase();
        if needle.is_empty() {
            return Err(TaskError::validation("empty task reference"));
        }

        let mut matches = self
            .tasks
            .iter()
            .filter(|task| task.uuid.simple().to_string().starts_with(&needle));
        let first = matches
            .next()
            .ok_or_else(|| TaskError::not_found(prefix.trim()))?;
        if matches.next().is_some() {
            return Err(TaskError::validation(format!(
                "task reference '{}' is ambiguous",
                prefix.trim()
            )));
        }
        Ok(first)
    }

    #[tracing::instrument(skip(self))]
    pub fn add_task(
        &mut self,
        text: &str,
        date: &str,
        time: Option<&str>,
    ) -> Result<Task, TaskError> {
        let text = validate_text(text)?;
        let date = parse_date(date)?;
        let time = time.map(parse_time).transpose()?;

        let task = Task::new(text, date, time);
        self.tasks.push(task.clone());
        debug!(uuid = %task.uuid, count = self.tasks.len(), "task added");
        self.persist();
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn edit_task(&mut self, uuid: Uuid, patch: TaskPatch) -> Result<Task, TaskError> {
        let idx = self.position(uuid)?;

        let text = patch.text.as_deref().map(validate_text).transpose()?;
        let date = patch.date.as_deref().map(parse_date).transpose()?;
        let time = match &patch.time {
            TimePatch::Keep => None,
            TimePatch::Set(raw) => Some(Some(parse_time(raw)?)),
            TimePatch::Clear => Some(None),
        };

        let task = &mut self.tasks[idx];
        if let Some(text) = text {
            task.text = text;
        }
        if let Some(date) = date {
            task.date = date;
        }
        if let Some(time) = time {
            task.time = time;
        }
        let updated = task.clone();

        debug!(index = idx, "task edited");
        self.persist();
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_complete(&mut self, uuid: Uuid) -> Result<Task, TaskError> {
        let idx = self.position(uuid)?;
        let completed = !self.tasks[idx].completed;
        self.set_completed_at(idx, completed)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_completed(&mut self, uuid: Uuid, completed: bool) -> Result<Task, TaskError> {
        let idx = self.position(uuid)?;
        self.set_completed_at(idx, completed)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_task(&mut self, uuid: Uuid) -> Result<Task, TaskError> {
        let idx = self.position(uuid)?;
        let removed = self.tasks.remove(idx);
        debug!(count = self.tasks.len(), "task deleted");
        self.persist();
        Ok(removed)
    }

    /// Appends already-built tasks, e.g. from an import.
    #[tracing::instrument(skip(self, tasks))]
    pub fn extend(&mut self, tasks: Vec<Task>) -> usize {
        let added = tasks.len();
        if added == 0 {
            return 0;
        }
        self.tasks.extend(tasks);
        info!(added, count = self.tasks.len(), "tasks appended");
        self.persist();
        added
    }

    pub fn tasks_on(&self, date: NaiveDate) -> Vec<&Task> {
        day_tasks(&self.tasks, date)
    }

    /// Tasks for every day in `start..=end`, days without tasks included.
    pub fn tasks_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, Vec<&Task>>, TaskError> {
        if start > end {
            return Err(TaskError::validation(format!(
                "range start {start} is after end {end}"
            )));
        }

        let mut out = BTreeMap::new();
        let mut day = start;
        loop {
            out.insert(day, Vec::new());
            let next = add_days(day, 1);
            if day == end || next == day {
                break;
            }
            day = next;
        }

        for task in self
            .tasks
            .iter()
            .filter(|task| task.date >= start && task.date <= end)
        {
            if let Some(bucket) = out.get_mut(&task.date) {
                bucket.push(task);
            }
        }
        for bucket in out.values_mut() {
            crate::calendar::sort_for_display(bucket);
        }

        Ok(out)
    }

    fn position(&self, uuid: Uuid) -> Result<usize, TaskError> {
        self.tasks
            .iter()
            .position(|task| task.uuid == uuid)
            .ok_or_else(|| TaskError::not_found(uuid.to_string()))
    }

    fn set_completed_at(&mut self, idx: usize, completed: bool) -> Result<Task, TaskError> {
        self.tasks[idx].completed = completed;
        let updated = self.tasks[idx].clone();
        debug!(completed, "task completion set");
        self.persist();
        Ok(updated)
    }

    fn persist(&self) {
        self.backend.save(&self.tasks);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use uuid::Uuid;

    use super::{MemoryBackend, TaskPersistence, TaskStore};
    use crate::error::TaskError;
    use crate::task::{Task, TaskPatch};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn texts(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn add_then_query_returns_single_pending_task() {
        let mut store = TaskStore::in_memory();
        let task = store
            .add_task("  Standup ", "2024-06-10", Some("09:00"))
            .expect("add task");

        let on_day = store.tasks_on(ymd(2024, 6, 10));
        assert_eq!(on_day.len(), 1);
        assert_eq!(on_day[0].text, "Standup");
        assert_eq!(on_day[0].time, NaiveTime::from_hms_opt(9, 0, 0));
        assert!(!on_day[0].completed);
        assert_eq!(on_day[0].uuid, task.uuid);
    }

    #[test]
    fn standup_lifecycle() {
        let mut store = TaskStore::in_memory();
        let day = ymd(2024, 6, 10);
        let task = store
            .add_task("Standup", "2024-06-10", Some("09:00"))
            .expect("add task");

        let toggled = store.toggle_complete(task.uuid).expect("toggle");
        assert!(toggled.completed);
        assert!(store.tasks_on(day)[0].completed);

        store.delete_task(task.uuid).expect("delete");
        assert!(store.tasks_on(day).is_empty());
        assert_eq!(store.backend().save_count(), 3);
    }

    #[test]
    fn add_rejects_invalid_input_without_saving() {
        let mut store = TaskStore::in_memory();

        for (text, date, time) in [
            ("   ", "2024-06-10", None),
            ("Gym", "2024-02-30", None),
            ("Gym", "tomorrow", None),
            ("Gym", "2024-06-10", Some("25:00")),
        ] {
            let err = store.add_task(text, date, time).expect_err("rejected");
            assert!(matches!(err, TaskError::Validation(_)));
        }
        assert!(store.is_empty());
        assert_eq!(store.backend().save_count(), 0);
    }

    #[test]
    fn identical_tasks_keep_distinct_identity() {
        let mut store = TaskStore::in_memory();
        let first = store
            .add_task("Water plants", "2024-06-10", None)
            .expect("first");
        let second = store
            .add_task("Water plants", "2024-06-10", None)
            .expect("second");
        assert_ne!(first.uuid, second.uuid);

        store.toggle_complete(second.uuid).expect("toggle second");
        let on_day = store.tasks_on(ymd(2024, 6, 10));
        assert!(!on_day[0].completed);
        assert!(on_day[1].completed);

        store.delete_task(first.uuid).expect("delete first");
        assert_eq!(store.len(), 1);
        assert_eq!(store.tasks()[0].uuid, second.uuid);
    }

    #[test]
    fn edit_replaces_fields_in_place() {
        let mut store = TaskStore::in_memory();
        let a = store.add_task("A", "2024-06-10", Some("09:00")).expect("a");
        let b = store.add_task("B", "2024-06-10", Some("10:00")).expect("b");
        let c = store.add_task("C", "2024-06-10", None).expect("c");

        let edited = store
            .edit_task(b.uuid, TaskPatch::default().text("B2").date("2024-06-12").clear_time())
            .expect("edit");
        assert_eq!(edited.text, "B2");
        assert_eq!(edited.date, ymd(2024, 6, 12));
        assert_eq!(edited.time, None);
        assert_eq!(edited.uuid, b.uuid);

        let order = store.tasks().iter().map(|t| t.uuid).collect::<Vec<_>>();
        assert_eq!(order, vec![a.uuid, b.uuid, c.uuid]);

        let retimed = store
            .edit_task(c.uuid, TaskPatch::default().time("07:30"))
            .expect("retime");
        assert_eq!(retimed.text, "C");
        assert_eq!(retimed.time, NaiveTime::from_hms_opt(7, 30, 0));
    }

    #[test]
    fn edit_validates_before_touching_state() {
        let mut store = TaskStore::in_memory();
        let task = store.add_task("A", "2024-06-10", None).expect("add");
        let saves = store.backend().save_count();

        let err = store
            .edit_task(task.uuid, TaskPatch::default().text("New").date("not-a-date"))
            .expect_err("bad date");
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(store.tasks()[0].text, "A");
        assert_eq!(store.backend().save_count(), saves);

        let err = store
            .edit_task(task.uuid, TaskPatch::default().text(" "))
            .expect_err("empty text");
        assert!(matches!(err, TaskError::Validation(_)));
    }

    #[test]
    fn missing_targets_report_not_found() {
        let mut store = TaskStore::in_memory();
        store.add_task("A", "2024-06-10", None).expect("add");
        let ghost = Uuid::new_v4();

        assert!(store.toggle_complete(ghost).expect_err("toggle").is_not_found());
        assert!(store.delete_task(ghost).expect_err("delete").is_not_found());
        assert!(store
            .edit_task(ghost, TaskPatch::default().text("x"))
            .expect_err("edit")
            .is_not_found());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn toggle_flips_back_and_forth() {
        let mut store = TaskStore::in_memory();
        let task = store.add_task("A", "2024-06-10", None).expect("add");
        assert!(store.toggle_complete(task.uuid).expect("on").completed);
        assert!(!store.toggle_complete(task.uuid).expect("off").completed);
        assert!(store.set_completed(task.uuid, true).expect("set").completed);
        assert!(store.set_completed(task.uuid, true).expect("again").completed);
    }

    #[test]
    fn tasks_on_orders_by_time_for_any_insertion_order() {
        let inputs = [
            ("none", None),
            ("noon", Some("12:00")),
            ("dawn", Some("05:45")),
            ("tea", Some("16:00")),
            ("none2", None),
        ];
        let expected = vec!["dawn", "noon", "tea"];

        for shift in 0..inputs.len() {
            let mut rotated = inputs.to_vec();
            rotated.rotate_left(shift);
            let mut store = TaskStore::in_memory();
            for (text, time) in &rotated {
                store.add_task(text, "2024-06-10", *time).expect("add");
            }
            let got = texts(&store.tasks_on(ymd(2024, 6, 10)));
            assert_eq!(got[..3].to_vec(), expected);

            let inserted_timeless = rotated
                .iter()
                .filter(|(_, time)| time.is_none())
                .map(|(text, _)| *text)
                .collect::<Vec<_>>();
            assert_eq!(got[3..].to_vec(), inserted_timeless, "shift {shift}");
        }
    }

    #[test]
    fn range_buckets_every_day_inclusive() {
        let mut store = TaskStore::in_memory();
        store.add_task("before", "2024-06-09", None).expect("add");
        store.add_task("late", "2024-06-10", Some("18:00")).expect("add");
        store.add_task("early", "2024-06-10", Some("08:00")).expect("add");
        store.add_task("last", "2024-06-12", None).expect("add");
        store.add_task("after", "2024-06-13", None).expect("add");

        let range = store
            .tasks_for_range(ymd(2024, 6, 10), ymd(2024, 6, 12))
            .expect("range");
        assert_eq!(range.len(), 3);
        assert_eq!(texts(&range[&ymd(2024, 6, 10)]), vec!["early", "late"]);
        assert!(range[&ymd(2024, 6, 11)].is_empty());
        assert_eq!(texts(&range[&ymd(2024, 6, 12)]), vec!["last"]);

        let err = store
            .tasks_for_range(ymd(2024, 6, 12), ymd(2024, 6, 10))
            .expect_err("reversed");
        assert!(matches!(err, TaskError::Validation(_)));
    }

    #[test]
    fn prefix_lookup_requires_unique_match() {
        let mut store = TaskStore::in_memory();
        let task = store.add_task("A", "2024-06-10", None).expect("add");
        let full = task.uuid.to_string();

        assert_eq!(
            store.find_by_prefix(&full[..8]).expect("prefix").uuid,
            task.uuid
        );
        assert_eq!(store.find_by_prefix(&full).expect("full").uuid, task.uuid);
        assert!(store.find_by_prefix("").is_err());

        let other = if full.starts_with('0') { "f" } else { "0" };
        assert!(store.find_by_prefix(other).expect_err("missing").is_not_found());
    }

    #[test]
    fn open_loads_existing_snapshot() {
        let backend = MemoryBackend::with_tasks(vec![Task::new(
            "Loaded".to_string(),
            ymd(2024, 1, 1),
            None,
        )]);
        let mut store = TaskStore::open(&backend);
        assert_eq!(store.len(), 1);

        store.add_task("More", "2024-01-02", None).expect("add");
        assert_eq!(backend.snapshot().len(), 2);
        assert_eq!(backend.save_count(), 1);
        assert_eq!(backend.load().len(), 2);
    }
}
