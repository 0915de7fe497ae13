use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::{self, CalendarView, ViewMode, WEEK_START};
use crate::clock::Clock;
use crate::datetime::{
    add_days, date_serde, first_day_of_month, last_day_of_month, shift_months, start_of_week,
};
use crate::error::TaskError;
use crate::task::Task;

/// Largest number of periods a single navigation step may cover.
pub const MAX_STEPS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

impl Direction {
    fn sign(self) -> i64 {
        match self {
            Self::Prev => -1,
            Self::Next => 1,
        }
    }
}

/// Which calendar view is showing and the date it is anchored on.
///
/// Month steps clamp the day of month, so `Next` followed by `Prev`
/// does not always return to the starting date (Jan 31 -> Feb 29 ->
/// Jan 29).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub mode: ViewMode,
    #[serde(with = "date_serde")]
    pub selected: NaiveDate,
}

impl ViewState {
    pub fn new(selected: NaiveDate) -> Self {
        Self {
            mode: ViewMode::default(),
            selected,
        }
    }

    pub fn starting_at(clock: &impl Clock) -> Self {
        Self::new(clock.today())
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        debug!(from = self.mode.as_key(), to = mode.as_key(), "view mode changed");
        self.mode = mode;
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        debug!(%date, "date selected");
        self.selected = date;
    }

    pub fn advance(&mut self, direction: Direction) -> Result<NaiveDate, TaskError> {
        self.advance_by(direction, 1)
    }

    /// Moves `steps` periods of the current mode. The selected date is
    /// left alone when the move is rejected.
    pub fn advance_by(&mut self, direction: Direction, steps: u32) -> Result<NaiveDate, TaskError> {
        if steps > MAX_STEPS {
            return Err(TaskError::validation(format!(
                "cannot move more than {MAX_STEPS} periods at once, got {steps}"
            )));
        }
        if steps == 0 {
            return Ok(self.selected);
        }

        let offset = i64::from(steps) * direction.sign();
        let target = match self.mode {
            ViewMode::Daily => self.selected.checked_add_signed(Duration::days(offset)),
            ViewMode::Weekly => self.selected.checked_add_signed(Duration::weeks(offset)),
            ViewMode::Monthly => i32::try_from(offset)
                .ok()
                .map(|months| shift_months(self.selected, months))
                .filter(|target| *target != self.selected),
        };
        let target = target.ok_or_else(|| {
            TaskError::validation(format!(
                "moving {offset} {} periods from {} leaves the supported date range",
                self.mode.as_key(),
                self.selected
            ))
        })?;

        self.select_date(target);
        Ok(target)
    }

    /// Inclusive date range covered by the current view.
    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        match self.mode {
            ViewMode::Daily => (self.selected, self.selected),
            ViewMode::Weekly => {
                let start = start_of_week(self.selected, WEEK_START);
                (start, add_days(start, 6))
            }
            ViewMode::Monthly => {
                let (year, month) = (self.selected.year(), self.selected.month());
                (first_day_of_month(year, month), last_day_of_month(year, month))
            }
        }
    }

    pub fn title(&self) -> String {
        match self.mode {
            ViewMode::Daily => format!("Daily View: {}", self.selected.format("%b %-d")),
            ViewMode::Weekly => {
                let (start, end) = self.window();
                format!("{} - {}", start.format("%b %-d"), end.format("%b %-d"))
            }
            ViewMode::Monthly => self.selected.format("%B %Y").to_string(),
        }
    }

    pub fn project<'a>(&self, tasks: &'a [Task]) -> CalendarView<'a> {
        calendar::project(tasks, self.mode, self.selected)
    }
}
