//! Pure projections of a task collection onto calendar grids.
//!
//! Nothing here is cached: every grid is rebuilt from the full task
//! slice and borrows the tasks it places.

use std::cmp::Ordering;

use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  add_days,
  days_in_month,
  first_day_of_month,
  start_of_week
};
use crate::task::Task;

/// First hour row of the daily and weekly grids.
pub const DAY_START_HOUR: u32 = 8;
/// Last hour row (inclusive). Tasks outside the range are not placed.
pub const DAY_END_HOUR: u32 = 19;
pub const MAX_MONTH_WEEKS: usize = 6;
pub const WEEK_START: Weekday =
  Weekday::Sun;
pub const WEEKDAY_LABELS: [&str; 7] = [
  "Sun", "Mon", "Tue", "Wed", "Thu",
  "Fri", "Sat"
];

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  Daily,
  #[default]
  Weekly,
  Monthly
}

impl ViewMode {
  pub fn all() -> [Self; 3] {
    [
      Self::Daily,
      Self::Weekly,
      Self::Monthly
    ]
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Daily => "daily",
      | Self::Weekly => "weekly",
      | Self::Monthly => "monthly"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Daily => "Daily",
      | Self::Weekly => "Weekly",
      | Self::Monthly => "Monthly"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "daily" | "day" => {
        Some(Self::Daily)
      }
      | "weekly" | "week" => {
        Some(Self::Weekly)
      }
      | "monthly" | "month" => {
        Some(Self::Monthly)
      }
      | _ => None
    }
  }
}

/// Display order: by time ascending, tasks without a time last.
/// Equal keys compare equal so a stable sort keeps insertion order.
pub fn display_order(
  a: &Task,
  b: &Task
) -> Ordering {
  match (a.time, b.time) {
    | (Some(x), Some(y)) => x.cmp(&y),
    | (Some(_), None) => Ordering::Less,
    | (None, Some(_)) => {
      Ordering::Greater
    }
    | (None, None) => Ordering::Equal
  }
}

pub fn sort_for_display(
  tasks: &mut [&Task]
) {
  tasks.sort_by(|a, b| {
    display_order(a, b)
  });
}

/// All tasks dated `day`, in display order.
pub fn day_tasks(
  tasks: &[Task],
  day: NaiveDate
) -> Vec<&Task> {
  let mut out = tasks
    .iter()
    .filter(|task| task.date == day)
    .collect::<Vec<_>>();
  sort_for_display(&mut out);
  out
}

pub fn hour_rows()
-> impl Iterator<Item = u32> {
  DAY_START_HOUR..=DAY_END_HOUR
}

#[derive(Debug, Clone)]
pub struct HourRow<'a> {
  pub hour:  u32,
  /// One cell per grid column.
  pub cells: Vec<Vec<&'a Task>>
}

#[derive(Debug, Clone)]
pub struct HourGrid<'a> {
  pub days: Vec<NaiveDate>,
  pub rows: Vec<HourRow<'a>>
}

impl<'a> HourGrid<'a> {
  pub fn cell(
    &self,
    column: usize,
    hour: u32
  ) -> &[&'a Task] {
    self
      .rows
      .iter()
      .find(|row| row.hour == hour)
      .and_then(|row| {
        row.cells.get(column)
      })
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn tasks(
    &self
  ) -> impl Iterator<Item = &'a Task> + '_
  {
    self.rows.iter().flat_map(|row| {
      row
        .cells
        .iter()
        .flat_map(|cell| {
          cell.iter().copied()
        })
    })
  }

  pub fn task_count(&self) -> usize {
    self.tasks().count()
  }
}

#[derive(Debug, Clone)]
pub struct MonthCell<'a> {
  pub date:  NaiveDate,
  pub tasks: Vec<&'a Task>
}

#[derive(Debug, Clone)]
pub struct MonthGrid<'a> {
  pub year:  i32,
  pub month: u32,
  /// Sunday-first weeks; `None` pads days outside the month.
  pub weeks: Vec<[Option<MonthCell<'a>>; 7]>
}

impl<'a> MonthGrid<'a> {
  pub fn days(
    &self
  ) -> impl Iterator<Item = &MonthCell<'a>>
  {
    self
      .weeks
      .iter()
      .flat_map(|week| week.iter())
      .flatten()
  }

  /// Row and column of `date`, if it belongs to this month.
  pub fn position_of(
    &self,
    date: NaiveDate
  ) -> Option<(usize, usize)> {
    self.weeks.iter().enumerate().find_map(
      |(row, week)| {
        week
          .iter()
          .position(|cell| {
            cell.as_ref().is_some_and(
              |cell| cell.date == date
            )
          })
          .map(|col| (row, col))
      }
    )
  }

  pub fn cell(
    &self,
    date: NaiveDate
  ) -> Option<&MonthCell<'a>> {
    self
      .days()
      .find(|cell| cell.date == date)
  }
}

#[derive(Debug, Clone)]
pub enum CalendarView<'a> {
  Daily(HourGrid<'a>),
  Weekly(HourGrid<'a>),
  Monthly(MonthGrid<'a>)
}

impl CalendarView<'_> {
  pub fn mode(&self) -> ViewMode {
    match self {
      | Self::Daily(_) => ViewMode::Daily,
      | Self::Weekly(_) => {
        ViewMode::Weekly
      }
      | Self::Monthly(_) => {
        ViewMode::Monthly
      }
    }
  }
}

fn hour_grid(
  tasks: &[Task],
  days: Vec<NaiveDate>
) -> HourGrid<'_> {
  let rows = hour_rows()
    .map(|hour| {
      let cells = days
        .iter()
        .map(|day| {
          let mut cell = tasks
            .iter()
            .filter(|task| {
              task.date == *day
                && task.hour()
                  == Some(hour)
            })
            .collect::<Vec<_>>();
          sort_for_display(&mut cell);
          cell
        })
        .collect();
      HourRow { hour, cells }
    })
    .collect();

  HourGrid { days, rows }
}

pub fn daily_grid(
  tasks: &[Task],
  day: NaiveDate
) -> HourGrid<'_> {
  hour_grid(tasks, vec![day])
}

pub fn week_days(
  reference: NaiveDate
) -> Vec<NaiveDate> {
  let start =
    start_of_week(reference, WEEK_START);
  (0_i64..7_i64)
    .map(|offset| add_days(start, offset))
    .collect()
}

pub fn weekly_grid(
  tasks: &[Task],
  reference: NaiveDate
) -> HourGrid<'_> {
  hour_grid(tasks, week_days(reference))
}

pub fn monthly_grid(
  tasks: &[Task],
  reference: NaiveDate
) -> MonthGrid<'_> {
  let year = reference.year();
  let month = reference.month();
  let first =
    first_day_of_month(year, month);
  let total =
    i64::from(days_in_month(year, month));
  let lead = i64::from(
    first.weekday().num_days_from_sunday()
  );

  let mut weeks = Vec::new();
  let mut day_num = 1 - lead;
  for _ in 0..MAX_MONTH_WEEKS {
    let week_first = day_num;
    let week: [Option<MonthCell<'_>>; 7] =
      std::array::from_fn(|col| {
      let n = week_first + col as i64;
      (1..=total).contains(&n).then(|| {
        let date =
          add_days(first, n - 1);
        MonthCell {
          date,
          tasks: day_tasks(tasks, date)
        }
      })
    });
    weeks.push(week);
    day_num += 7;
    if day_num > total {
      break;
    }
  }

  MonthGrid { year, month, weeks }
}

pub fn project(
  tasks: &[Task],
  mode: ViewMode,
  reference: NaiveDate
) -> CalendarView<'_> {
  tracing::debug!(
    total_tasks = tasks.len(),
    mode = mode.as_key(),
    %reference,
    "projecting calendar view"
  );
  match mode {
    | ViewMode::Daily => {
      CalendarView::Daily(daily_grid(
        tasks, reference
      ))
    }
    | ViewMode::Weekly => {
      CalendarView::Weekly(weekly_grid(
        tasks, reference
      ))
    }
    | ViewMode::Monthly => {
      CalendarView::Monthly(
        monthly_grid(tasks, reference)
      )
    }
  }
}
