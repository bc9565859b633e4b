//! Task command handlers.

use anyhow::{Context, Result, bail};
use ntm_core::api::types::{Task, TaskDraft, TaskExecution, TaskId, TaskPatch};
use ntm_core::app::App;

use crate::cli::ScheduleArgs;

pub async fn list(app: &App) -> Result<()> {
    let tasks = app
        .tasks()
        .fetch_tasks()
        .await
        .context("Failed to load tasks")?;
    if tasks.is_empty() {
        println!("No tasks found.");
    } else {
        for task in &tasks {
            println!("{}", format_task_line(task));
        }
    }
    Ok(())
}

pub async fn show(app: &App, id: TaskId) -> Result<()> {
    let task = app
        .tasks()
        .get_task(id)
        .await
        .with_context(|| format!("Failed to load task {id}"))?;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}

pub async fn create(
    app: &App,
    name: String,
    prompt: String,
    expert_mode: bool,
    schedule: ScheduleArgs,
) -> Result<()> {
    let Some(frequency) = schedule.frequency else {
        bail!("--frequency is required to create a task");
    };
    let Some(scheduled_time) = schedule.time else {
        bail!("--time is required to create a task");
    };

    let draft = TaskDraft {
        name,
        frequency,
        scheduled_time,
        scheduled_date: schedule.date,
        day_of_week: schedule.day_of_week,
        day_of_month: schedule.day_of_month,
        prompt,
        expert_mode,
        timezone: schedule.timezone,
    };
    let task = app
        .tasks()
        .create_task(&draft)
        .await
        .context("Failed to create task")?;

    println!("{}", format_task_line(&task));
    app.toasts().success("Task created");
    Ok(())
}

pub fn patch_from_args(
    name: Option<String>,
    prompt: Option<String>,
    expert_mode: Option<bool>,
    is_active: Option<bool>,
    schedule: ScheduleArgs,
) -> TaskPatch {
    TaskPatch {
        name,
        frequency: schedule.frequency,
        scheduled_time: schedule.time,
        scheduled_date: schedule.date,
        day_of_week: schedule.day_of_week,
        day_of_month: schedule.day_of_month,
        prompt,
        expert_mode,
        is_active,
        timezone: schedule.timezone,
    }
}

pub async fn update(app: &App, id: TaskId, patch: &TaskPatch) -> Result<()> {
    if patch.is_empty() {
        bail!("Nothing to update; pass at least one field to change");
    }
    let task = app
        .tasks()
        .update_task(id, patch)
        .await
        .with_context(|| format!("Failed to update task {id}"))?;

    println!("{}", format_task_line(&task));
    app.toasts().success("Task updated");
    Ok(())
}

pub async fn delete(app: &App, id: TaskId) -> Result<()> {
    let message = app
        .tasks()
        .delete_task(id)
        .await
        .with_context(|| format!("Failed to delete task {id}"))?;
    app.toasts().success(message.message);
    Ok(())
}

pub async fn toggle(app: &App, id: TaskId) -> Result<()> {
    let task = app
        .tasks()
        .toggle_task(id)
        .await
        .with_context(|| format!("Failed to toggle task {id}"))?;

    let state = if task.is_active() { "enabled" } else { "disabled" };
    app.toasts()
        .success(format!("Task {} {state}", task.name().unwrap_or("(unnamed)")));
    Ok(())
}

pub async fn test(app: &App, id: TaskId) -> Result<()> {
    app.toasts()
        .info(format!("Running task {id}, this can take a few minutes..."));
    let message = app
        .tasks()
        .test_task(id)
        .await
        .with_context(|| format!("Failed to run task {id}"))?;

    if message.success {
        app.toasts().success(message.message);
    } else {
        app.toasts().error(message.message);
    }
    Ok(())
}

pub async fn runs(app: &App, id: TaskId, limit: Option<u32>) -> Result<()> {
    let limit = limit.unwrap_or(app.config().api.executions_limit);
    let runs = app
        .tasks()
        .executions(id, limit)
        .await
        .with_context(|| format!("Failed to load runs of task {id}"))?;
    if runs.is_empty() {
        println!("No runs found.");
    } else {
        for run in &runs {
            println!("{}", format_run_line(run));
        }
    }
    Ok(())
}

fn format_task_line(task: &Task) -> String {
    let state = if task.is_active() { "on " } else { "off" };
    let frequency = task
        .frequency()
        .map_or_else(|| "-".to_string(), |f| f.to_string());
    format!(
        "{:>4}  {state}  {frequency:<7}  {:<5}  {}",
        task.id,
        task.scheduled_time().unwrap_or("-"),
        task.name().unwrap_or("(unnamed)"),
    )
}

fn format_run_line(run: &TaskExecution) -> String {
    let when = run.executed_at.map_or_else(
        || "-".to_string(),
        |at| at.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    let detail = run
        .error_message
        .as_deref()
        .or(run.result.as_deref())
        .unwrap_or("");
    let detail = detail.lines().next().unwrap_or("");
    format!("{when}  {:<7}  {detail}", run.status)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_format_task_line() {
        let task: Task = serde_json::from_value(json!({
            "id": 12,
            "name": "Morning digest",
            "frequency": "daily",
            "scheduled_time": "08:00",
            "is_active": true
        }))
        .unwrap();
        assert_eq!(
            format_task_line(&task),
            "  12  on   daily    08:00  Morning digest"
        );
    }

    #[test]
    fn test_format_task_line_tolerates_sparse_task() {
        let task: Task = serde_json::from_value(json!({ "id": 5, "title": "X", "enabled": false }))
            .unwrap();
        assert_eq!(format_task_line(&task), "   5  off  -        -      X");
    }

    #[test]
    fn test_format_run_line_prefers_error() {
        let run: TaskExecution = serde_json::from_value(json!({
            "id": 1,
            "task_id": 3,
            "executed_at": "2025-01-02T08:00:01",
            "result": "partial\noutput",
            "status": "failed",
            "error_message": "upstream timeout"
        }))
        .unwrap();
        assert_eq!(
            format_run_line(&run),
            "2025-01-02 08:00:01  failed   upstream timeout"
        );
    }

    #[test]
    fn test_patch_from_args_empty() {
        let patch = patch_from_args(None, None, None, None, ScheduleArgs::default());
        assert!(patch.is_empty());

        let patch = patch_from_args(None, None, None, Some(false), ScheduleArgs::default());
        assert_eq!(patch.is_active, Some(false));
    }
}
