use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::cancel::PendingCancellation;
use crate::config::Settings;
use crate::controller::TaskListController;
use crate::datetime::format_timestamp;
use crate::sort::SortColumn;
use crate::task::{TaskStatus, TaskSummary};

/// What the table needs to draw one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub uuid: String,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_selected: bool,
    pub is_error_visible: bool,
    pub error_message: Option<String>,
}

impl RowView {
    pub fn new(
        task: &TaskSummary,
        is_selected: bool,
        banner: Option<PendingCancellation>,
    ) -> Self {
        let banner = banner.filter(|b| b.visible);
        Self {
            uuid: task.uuid.clone(),
            status: task.status,
            submitted_at: task.submitted_at,
            updated_at: task.updated_at,
            is_selected,
            is_error_visible: banner.is_some(),
            error_message: banner.map(|b| b.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    timezone: Option<Tz>,
}

impl Renderer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            color: settings.color,
            timezone: settings.timezone,
        }
    }

    #[tracing::instrument(skip(self, controller))]
    pub fn print_task_list(&self, controller: &TaskListController) -> anyhow::Result<()> {
        let color = self.color && io::stdout().is_terminal();
        let out = io::stdout().lock();
        self.write_task_list(out, controller, color)
    }

    pub fn write_task_list<W: Write>(
        &self,
        mut out: W,
        controller: &TaskListController,
        color: bool,
    ) -> anyhow::Result<()> {
        if let Some(message) = controller.validation_message() {
            writeln!(out, "{}", paint(&message, "33", color))?;
        }

        if controller.page().is_none() {
            match controller.last_error() {
                Some(err) => writeln!(out, "{}", paint(&format!("error: {err}"), "31", color))?,
                None => writeln!(out, "loading tasks...")?,
            }
            return Ok(());
        }

        let order = controller.criteria().order;
        let arrow = |column: SortColumn| {
            let indicator = controller.sort_indicator(column);
            let text = format!("({})", indicator.arrow());
            if indicator.active {
                paint(&text, "1;34", color)
            } else {
                paint(&text, "2", color)
            }
        };

        let headers = vec![
            "[ ]".to_string(),
            format!("Name/UUID {}", arrow(SortColumn::Uuid)),
            "Status".to_string(),
            format!("Submission time {}", arrow(SortColumn::SubmittedAt)),
            "Update time".to_string(),
            "Actions".to_string(),
        ];

        let mut rows = Vec::new();
        for row in controller.rows() {
            let check = if row.is_selected { "[x]" } else { "[ ]" }.to_string();
            if let Some(message) = row.error_message.as_ref().filter(|_| row.is_error_visible) {
                rows.push(TableRow::Banner(check, paint(message, "31", color)));
                continue;
            }
            rows.push(TableRow::Cells(vec![
                check,
                row.uuid.clone(),
                paint(row.status.label(), status_color(row.status), color),
                format_timestamp(row.submitted_at, self.timezone.as_ref()),
                format_timestamp(row.updated_at, self.timezone.as_ref()),
                if row.status.is_terminal() { "-" } else { "Cancel" }.to_string(),
            ]));
        }

        write_table(&mut out, headers, rows)?;

        if let Some(notice) = controller.empty_notice() {
            writeln!(out, "{}", paint(&notice, "33", color))?;
        }

        if let (Some(page), Some(last)) = (controller.page(), controller.last_page()) {
            writeln!(
                out,
                "page {}/{} ({} tasks, order {})",
                controller.criteria().page + 1,
                last + 1,
                page.count,
                order
            )?;
        }

        let selected = controller.selection();
        if !selected.is_empty() {
            writeln!(out, "{} selected", selected.len())?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&self, task: &TaskSummary) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "uuid       {}", task.uuid)?;
        writeln!(out, "status     {}", task.status)?;
        writeln!(
            out,
            "submitted  {}",
            format_timestamp(task.submitted_at, self.timezone.as_ref())
        )?;
        writeln!(
            out,
            "updated    {}",
            format_timestamp(task.updated_at, self.timezone.as_ref())
        )?;

        Ok(())
    }
}

enum TableRow {
    Cells(Vec<String>),
    /// Checkbox plus a message spanning the remaining columns.
    Banner(String, String),
}

fn status_color(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Running => "34",
        TaskStatus::Completed => "32",
        TaskStatus::Error | TaskStatus::Rejected => "31",
        TaskStatus::Canceled => "90",
        TaskStatus::Submitted | TaskStatus::Approved | TaskStatus::Scheduled => "33",
    }
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<TableRow>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(visible_width(header));
    }

    for row in &rows {
        match row {
            TableRow::Cells(cells) => {
                for (idx, cell) in cells.iter().enumerate() {
                    widths[idx] = widths[idx].max(visible_width(cell));
                }
            }
            TableRow::Banner(check, _) => {
                widths[0] = widths[0].max(visible_width(check));
            }
        }
    }

    write_cells(&mut writer, &headers, &widths)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        match row {
            TableRow::Cells(cells) => write_cells(&mut writer, &cells, &widths)?,
            TableRow::Banner(check, message) => {
                let padding = widths[0].saturating_sub(visible_width(&check));
                writeln!(writer, "{check}{} {message}", " ".repeat(padding))?;
            }
        }
    }

    Ok(())
}

fn write_cells<W: Write>(writer: &mut W, cells: &[String], widths: &[usize]) -> io::Result<()> {
    for (cell, width) in cells.iter().zip(widths) {
        let padding = width.saturating_sub(visible_width(cell));
        write!(writer, "{}{} ", cell, " ".repeat(padding))?;
    }
    writeln!(writer)
}

fn visible_width(s: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(s).as_str())
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::{Renderer, paint, strip_ansi, visible_width};
    use crate::auth::Credential;
    use crate::config::Settings;
    use crate::controller::TaskListController;
    use crate::criteria::{Criteria, CriteriaStore};
    use crate::source::{CancelResponse, SourceError, TaskCanceller, TaskSource};
    use crate::task::{TaskPage, TaskStatus, TaskSummary};

    struct Fixed(TaskPage);

    #[async_trait]
    impl TaskSource for Fixed {
        async fn fetch(&self, _criteria: &Criteria) -> Result<TaskPage, SourceError> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl TaskCanceller for Fixed {
        async fn cancel(
            &self,
            _uuid: &str,
            _credential: &Credential,
        ) -> Result<CancelResponse, SourceError> {
            Ok(CancelResponse { ok: true, status: 202 })
        }
    }

    fn task(uuid: &str, status: TaskStatus) -> TaskSummary {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 4, 5).single().expect("time");
        TaskSummary {
            uuid: uuid.to_string(),
            status,
            submitted_at: at,
            updated_at: at,
        }
    }

    fn render(controller: &TaskListController) -> String {
        let renderer = Renderer::new(&Settings {
            timezone: Some(chrono_tz::Europe::Athens),
            ..Settings::default()
        });
        let mut out = Vec::new();
        renderer
            .write_task_list(&mut out, controller, false)
            .expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[tokio::test]
    async fn lists_rows_with_page_line() {
        let fixed = Arc::new(Fixed(TaskPage {
            count: 12,
            results: vec![
                task("run-1", TaskStatus::Running),
                task("done-1", TaskStatus::Completed),
            ],
        }));
        let controller = TaskListController::new(
            fixed.clone(),
            fixed,
            CriteriaStore::new(Criteria::default()),
            Credential::new("k"),
            &Settings::default(),
        );

        assert_eq!(render(&controller), "loading tasks...\n");

        controller.refresh().await.expect("fetch");
        controller.toggle_selection("run-1");
        let text = render(&controller);

        assert!(text.contains("Submission time (Z-A)"));
        assert!(text.contains("1/15/2024, 12:04:05 PM"));
        let run_line = text.lines().find(|l| l.contains("run-1")).expect("row");
        assert!(run_line.starts_with("[x]"));
        assert!(run_line.trim_end().ends_with("Cancel"));
        let done_line = text.lines().find(|l| l.contains("done-1")).expect("row");
        assert!(done_line.trim_end().ends_with('-'));
        assert!(text.contains("page 1/2 (12 tasks, order -submitted_at)"));
        assert!(text.contains("1 selected"));
    }

    #[test]
    fn width_ignores_escape_codes() {
        let painted = paint("RUNNING", "34", true);
        assert_eq!(strip_ansi(&painted), "RUNNING");
        assert_eq!(visible_width(&painted), 7);
        assert_eq!(paint("x", "31", false), "x");
    }
}
