use chrono::NaiveDateTime;

use crate::clock::{Clock, Greeting};
use crate::store::{TaskPersistence, TaskStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayEntry {
    pub time: String,
    pub text: String,
    pub completed: bool,
}

/// Everything the overview screen shows, computed at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub greeting: String,
    pub clock_time: String,
    pub clock_date: String,
    pub today: Vec<TodayEntry>,
}

impl Dashboard {
    pub fn build<P: TaskPersistence>(
        store: &TaskStore<P>,
        clock: &impl Clock,
        name: Option<&str>,
    ) -> Self {
        let now = clock.now();
        Self::at(store, now, name)
    }

    fn at<P: TaskPersistence>(store: &TaskStore<P>, now: NaiveDateTime, name: Option<&str>) -> Self {
        let today = store
            .tasks_on(now.date())
            .into_iter()
            .map(|task| TodayEntry {
                time: task.time_label(),
                text: task.text.clone(),
                completed: task.completed,
            })
            .collect();

        Self {
            greeting: Greeting::at(now).for_name(name),
            clock_time: now.format("%H:%M:%S").to_string(),
            clock_date: now.format("%A, %B %-d, %Y").to_string(),
            today,
        }
    }
}
