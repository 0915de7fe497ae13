use std::fs;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cli::Command;
use crate::clock::Clock;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::datastore::DataStore;
use crate::datetime::parse_date_input;
use crate::error::TaskError;
use crate::navigation::{Direction, ViewState};
use crate::render::Renderer;
use crate::store::{TaskPersistence, TaskStore};
use crate::task::TaskPatch;

const MIN_PREFIX_LEN: usize = 4;

/// Maps `default.command` onto a subcommand when none was given.
pub fn default_command(cfg: &Config) -> anyhow::Result<Command> {
    let name = cfg
        .get("default.command")
        .unwrap_or_else(|| "dashboard".to_string());
    match name.trim() {
        "dashboard" => Ok(Command::Dashboard),
        "show" => Ok(Command::Show),
        "list" => Ok(Command::List { date: None }),
        "today" => Ok(Command::Today),
        other => Err(anyhow!("unsupported default.command: {other}")),
    }
}

#[instrument(skip(datastore, cfg, renderer, command, clock))]
pub fn dispatch(
    datastore: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    clock: &impl Clock,
) -> anyhow::Result<()> {
    let mut store = TaskStore::open(datastore);
    let mut view = datastore
        .load_view_state()
        .unwrap_or_else(|| ViewState::starting_at(clock));

    debug!(
        command = ?command,
        mode = view.mode.as_key(),
        selected = %view.selected,
        tasks = store.len(),
        "dispatching command"
    );

    match command {
        Command::Dashboard => cmd_dashboard(&store, cfg, renderer, clock),
        Command::Add { text, date, time } => {
            cmd_add(&mut store, cfg, &view, &text.join(" "), date, time, clock)
        }
        Command::Edit {
            reference,
            text,
            date,
            time,
            clear_time,
        } => {
            let mut patch = TaskPatch::default();
            if let Some(text) = text {
                patch = patch.text(text);
            }
            if let Some(date) = date {
                patch = patch.date(resolve_date_arg(&date, clock)?);
            }
            if let Some(time) = time {
                patch = patch.time(time);
            }
            if clear_time {
                patch = patch.clear_time();
            }
            cmd_edit(&mut store, &view, &reference, patch)
        }
        Command::Done(target) => cmd_set_completed(&mut store, &view, &target.reference, Some(true)),
        Command::Undone(target) => {
            cmd_set_completed(&mut store, &view, &target.reference, Some(false))
        }
        Command::Toggle(target) => cmd_set_completed(&mut store, &view, &target.reference, None),
        Command::Delete(target) => cmd_delete(&mut store, &view, &target.reference),
        Command::List { date } => {
            let date = match date {
                Some(raw) => parse_date_input(&raw, clock.today())?,
                None => view.selected,
            };
            renderer.print_day(date, &store.tasks_on(date))
        }
        Command::Range { start, end } => cmd_range(&store, renderer, &start, &end, clock),
        Command::Show => renderer.print_view(&view, &view.project(store.tasks())),
        Command::View { mode } => {
            view.set_mode(mode);
            finish_navigation(datastore, &store, renderer, &view)
        }
        Command::Select { date } => {
            view.select_date(parse_date_input(&date, clock.today())?);
            finish_navigation(datastore, &store, renderer, &view)
        }
        Command::Today => {
            view.select_date(clock.today());
            finish_navigation(datastore, &store, renderer, &view)
        }
        Command::Prev { steps } => {
            view.advance_by(Direction::Prev, steps)?;
            finish_navigation(datastore, &store, renderer, &view)
        }
        Command::Next { steps } => {
            view.advance_by(Direction::Next, steps)?;
            finish_navigation(datastore, &store, renderer, &view)
        }
        Command::Import { path } => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            cmd_import(&mut store, &raw)
        }
        Command::Export => cmd_export(&store),
    }
}

/// Resolves a list position on the selected date, or a task id prefix.
pub fn resolve_reference<P: TaskPersistence>(
    store: &TaskStore<P>,
    view: &ViewState,
    reference: &str,
) -> Result<Uuid, TaskError> {
    let reference = reference.trim();

    if let Ok(position) = reference.parse::<usize>() {
        let day = store.tasks_on(view.selected);
        if let Some(task) = position.checked_sub(1).and_then(|idx| day.get(idx)) {
            return Ok(task.uuid);
        }
        if reference.len() < MIN_PREFIX_LEN {
            return Err(TaskError::not_found(format!(
                "no task #{position} on {}",
                view.selected
            )));
        }
    }

    if reference.replace('-', "").len() < MIN_PREFIX_LEN {
        return Err(TaskError::validation(format!(
            "task reference '{reference}' must be a list number or at least {MIN_PREFIX_LEN} id characters"
        )));
    }

    store.find_by_prefix(reference).map(|task| task.uuid)
}

fn resolve_date_arg(raw: &str, clock: &impl Clock) -> anyhow::Result<String> {
    let date = parse_date_input(raw, clock.today())?;
    Ok(date.format("%Y-%m-%d").to_string())
}

#[instrument(skip(store, cfg, renderer, clock))]
fn cmd_dashboard<P: TaskPersistence>(
    store: &TaskStore<P>,
    cfg: &Config,
    renderer: &Renderer,
    clock: &impl Clock,
) -> anyhow::Result<()> {
    info!("command dashboard");
    let name = cfg.user_name();
    let board = Dashboard::build(store, clock, name.as_deref());
    renderer.print_dashboard(&board)
}

#[instrument(skip(store, cfg, view, text, clock))]
fn cmd_add<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    cfg: &Config,
    view: &ViewState,
    text: &str,
    date: Option<String>,
    time: Option<String>,
    clock: &impl Clock,
) -> anyhow::Result<()> {
    info!("command add");

    let date = match date {
        Some(raw) => resolve_date_arg(&raw, clock)?,
        None => view.selected.format("%Y-%m-%d").to_string(),
    };
    let time = time.or_else(|| cfg.default_time());

    let task = store.add_task(text, &date, time.as_deref())?;
    println!("Created task {} on {} at {}.", task.short_id(), task.date, task.time_label());
    Ok(())
}

#[instrument(skip(store, view, patch))]
fn cmd_edit<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    view: &ViewState,
    reference: &str,
    patch: TaskPatch,
) -> anyhow::Result<()> {
    info!("command edit");

    if patch.is_empty() {
        return Err(anyhow!("nothing to change; pass --text, --date, --time or --clear-time"));
    }
    let uuid = resolve_reference(store, view, reference)?;
    let task = store.edit_task(uuid, patch)?;
    println!("Modified task {}.", task.short_id());
    Ok(())
}

#[instrument(skip(store, view))]
fn cmd_set_completed<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    view: &ViewState,
    reference: &str,
    completed: Option<bool>,
) -> anyhow::Result<()> {
    info!("command done/undone/toggle");

    let uuid = resolve_reference(store, view, reference)?;
    let task = match completed {
        Some(flag) => store.set_completed(uuid, flag)?,
        None => store.toggle_complete(uuid)?,
    };

    let state = if task.completed { "completed" } else { "pending" };
    println!("Task {} is {state}.", task.short_id());
    Ok(())
}

#[instrument(skip(store, view))]
fn cmd_delete<P: TaskPersistence>(
    store: &mut TaskStore<P>,
    view: &ViewState,
    reference: &str,
) -> anyhow::Result<()> {
    info!("command delete");

    let uuid = resolve_reference(store, view, reference)?;
    let removed = store.delete_task(uuid)?;
    println!("Deleted task {} ({}).", removed.short_id(), removed.text);
    Ok(())
}

#[instrument(skip(store, renderer, clock))]
fn cmd_range<P: TaskPersistence>(
    store: &TaskStore<P>,
    renderer: &Renderer,
    start: &str,
    end: &str,
    clock: &impl Clock,
) -> anyhow::Result<()> {
    info!("command range");

    let today = clock.today();
    let start = parse_date_input(start, today)?;
    let end = parse_date_input(end, today)?;
    let days = store.tasks_for_range(start, end)?;
    renderer.print_range(&days)
}

fn finish_navigation<P: TaskPersistence>(
    datastore: &DataStore,
    store: &TaskStore<P>,
    renderer: &Renderer,
    view: &ViewState,
) -> anyhow::Result<()> {
    datastore.save_view_state(view);
    renderer.print_view(view, &view.project(store.tasks()))
}

#[instrument(skip(store, raw))]
fn cmd_import<P: TaskPersistence>(store: &mut TaskStore<P>, raw: &str) -> anyhow::Result<()> {
    info!("command import");

    let outcome = DataStore::import_json_array(raw)?;
    let added = store.extend(outcome.tasks);
    println!("Imported {added} task(s), skipped {}.", outcome.skipped);
    Ok(())
}

#[instrument(skip(store))]
fn cmd_export<P: TaskPersistence>(store: &TaskStore<P>) -> anyhow::Result<()> {
    info!("command export");
    println!("{}", DataStore::export_json_array(store.tasks())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{default_command, resolve_reference};
    use crate::calendar::ViewMode;
    use crate::cli::Command;
    use crate::config::Config;
    use crate::navigation::ViewState;
    use crate::store::TaskStore;

    fn view_on(day: u32) -> ViewState {
        ViewState {
            mode: ViewMode::Daily,
            selected: NaiveDate::from_ymd_opt(2024, 6, day).expect("date"),
        }
    }

    #[test]
    fn numeric_reference_follows_display_order() {
        let mut store = TaskStore::in_memory();
        let late = store.add_task("Late", "2024-06-10", Some("15:00")).expect("add");
        let early = store.add_task("Early", "2024-06-10", Some("08:30")).expect("add");
        store.add_task("Elsewhere", "2024-06-11", Some("07:00")).expect("add");

        let view = view_on(10);
        assert_eq!(resolve_reference(&store, &view, "1").expect("ref"), early.uuid);
        assert_eq!(resolve_reference(&store, &view, "2").expect("ref"), late.uuid);
        assert!(resolve_reference(&store, &view, "3").expect_err("missing").is_not_found());
        assert!(resolve_reference(&store, &view, "0").expect_err("missing").is_not_found());
    }

    #[test]
    fn prefix_reference_needs_four_characters() {
        let mut store = TaskStore::in_memory();
        let task = store.add_task("Standup", "2024-06-10", None).expect("add");
        let id = task.uuid.simple().to_string();

        let view = view_on(1);
        assert_eq!(resolve_reference(&store, &view, &id[..6]).expect("ref"), task.uuid);
        assert!(!resolve_reference(&store, &view, "ab").expect_err("short").is_not_found());
    }

    #[test]
    fn default_command_comes_from_config() {
        let mut cfg = Config::defaults();
        assert!(matches!(default_command(&cfg).expect("cmd"), Command::Dashboard));

        cfg.apply_overrides(vec![("default.command".to_string(), "show".to_string())]);
        assert!(matches!(default_command(&cfg).expect("cmd"), Command::Show));

        cfg.apply_overrides(vec![("default.command".to_string(), "burndown".to_string())]);
        assert!(default_command(&cfg).is_err());
    }
}
