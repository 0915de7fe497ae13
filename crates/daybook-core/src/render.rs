use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarView, HourGrid, MonthGrid, WEEKDAY_LABELS};
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::navigation::ViewState;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_day(&self, date: NaiveDate, tasks: &[&Task]) -> anyhow::Result<()> {
        self.write_day(io::stdout().lock(), date, tasks)
    }

    #[tracing::instrument(skip(self, days))]
    pub fn print_range(&self, days: &BTreeMap<NaiveDate, Vec<&Task>>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for (date, tasks) in days {
            self.write_day(&mut out, *date, tasks)?;
            writeln!(out)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, view, calendar))]
    pub fn print_view(&self, view: &ViewState, calendar: &CalendarView<'_>) -> anyhow::Result<()> {
        self.write_view(io::stdout().lock(), view, calendar)
    }

    #[tracing::instrument(skip(self, board))]
    pub fn print_dashboard(&self, board: &Dashboard) -> anyhow::Result<()> {
        self.write_dashboard(io::stdout().lock(), board)
    }

    pub fn write_day<W: Write>(
        &self,
        mut out: W,
        date: NaiveDate,
        tasks: &[&Task],
    ) -> anyhow::Result<()> {
        writeln!(out, "Tasks for {}", date.format("%B %-d, %Y"))?;
        if tasks.is_empty() {
            writeln!(out, "No tasks for this date.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "ID".to_string(),
            "Time".to_string(),
            "Task".to_string(),
        ];
        let rows = tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    task.short_id(),
                    task.time_label(),
                    self.task_text(task),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        view: &ViewState,
        calendar: &CalendarView<'_>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&view.title(), "1"))?;
        writeln!(out)?;
        match calendar {
            CalendarView::Daily(grid) | CalendarView::Weekly(grid) => {
                self.write_hour_grid(out, grid, view.selected)
            }
            CalendarView::Monthly(grid) => self.write_month_grid(out, grid, view.selected),
        }
    }

    fn write_hour_grid<W: Write>(
        &self,
        out: W,
        grid: &HourGrid<'_>,
        selected: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut headers = vec!["Time".to_string()];
        headers.extend(grid.days.iter().map(|day| {
            let label = day.format("%a %b %-d").to_string();
            if *day == selected {
                format!("[{label}]")
            } else {
                label
            }
        }));

        let rows = grid
            .rows
            .iter()
            .map(|row| {
                let mut cells = vec![format!("{:02}:00", row.hour)];
                cells.extend(row.cells.iter().map(|cell| {
                    cell.iter()
                        .map(|task| self.task_text(task))
                        .collect::<Vec<_>>()
                        .join(", ")
                }));
                cells
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn write_month_grid<W: Write>(
        &self,
        out: W,
        grid: &MonthGrid<'_>,
        selected: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = WEEKDAY_LABELS.iter().map(|label| label.to_string()).collect();

        let rows = grid
            .weeks
            .iter()
            .map(|week| {
                week.iter()
                    .map(|cell| match cell {
                        None => String::new(),
                        Some(cell) => {
                            let mut label = cell.date.day().to_string();
                            let open = cell.tasks.iter().filter(|t| !t.completed).count();
                            if !cell.tasks.is_empty() {
                                label = format!("{label} ({open}/{})", cell.tasks.len());
                            }
                            if cell.date == selected {
                                label = self.paint(&format!("*{label}"), "1");
                            }
                            label
                        }
                    })
                    .collect()
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_dashboard<W: Write>(&self, mut out: W, board: &Dashboard) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&board.greeting, "1"))?;
        writeln!(out, "{}  {}", board.clock_time, board.clock_date)?;
        writeln!(out)?;
        writeln!(out, "Today's Tasks")?;
        if board.today.is_empty() {
            writeln!(out, "No tasks for today")?;
            return Ok(());
        }
        for entry in &board.today {
            let text = if entry.completed {
                self.paint(&format!("{} (done)", entry.text), "2")
            } else {
                entry.text.clone()
            };
            writeln!(out, "  {}  {}", entry.time, text)?;
        }
        Ok(())
    }

    fn task_text(&self, task: &Task) -> String {
        if task.completed {
            self.paint(&format!("[x] {}", task.text), "2")
        } else {
            format!("[ ] {}", task.text)
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
