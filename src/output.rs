use crate::model::Task;

const RULE: &str = "=======================================";

/// Render tasks as a fixed-width table framed by rules.
pub fn format_task_list(tasks: &[Task]) -> String {
    let id_width = tasks
        .iter()
        .map(|t| t.id.to_string().len())
        .max()
        .unwrap_or(0)
        .max(2);

    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    out.push_str("              Todo List\n");
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "{:<id_width$} | {:<10} | {:<8} | {:<19} | {:<10} | {}\n",
        "id", "status", "priority", "due", "tag", "task"
    ));
    for task in tasks {
        out.push_str(&format!(
            "{:<id_width$} | {:<10} | {:<8} | {:<19} | {:<10} | {}\n",
            task.id,
            task.status.as_str(),
            task.priority.as_str(),
            task.due.as_deref().unwrap_or(""),
            task.tag.as_deref().unwrap_or(""),
            task.text
        ));
    }
    if tasks.is_empty() {
        out.push_str("(no tasks)\n");
    }
    out.push_str(RULE);
    out.push('\n');
    out
}

/// Notification body listing one task per line.
pub fn format_reminder(tasks: &[Task]) -> String {
    let mut out = String::from("Your tasks:\n");
    for task in tasks {
        out.push_str(&task.text);
        out.push('\n');
    }
    out
}
