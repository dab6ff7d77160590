//! Terminal output for the `plansync` binary.

use std::fmt::Display;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};
use plansync::notify::{Notice, NoticeLevel, Notifier};

const SPINNER_TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum ColorChoice {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

/// Styles for each kind of output. The default styles emit no escapes.
#[derive(Clone, Copy, Default)]
struct Styles {
    heading: Style,
    label: Style,
    marker: Style,
    ok: Style,
    alert: Style,
    failure: Style,
}

impl Styles {
    fn colored() -> Self {
        Self {
            heading: Style::new().fg(Color::Cyan).bold(),
            label: Style::new().fg(Color::LightBlue).bold(),
            marker: Style::new().fg(Color::LightBlue),
            ok: Style::new().fg(Color::LightGreen).bold(),
            alert: Style::new().fg(Color::Yellow).bold(),
            failure: Style::new().fg(Color::Red).bold(),
        }
    }
}

/// Prefixes `message` with a styled icon unless output is quiet.
fn tagged(quiet: bool, icon: &str, style: Style, message: &str) -> String {
    if quiet {
        message.to_string()
    } else {
        format!("{} {message}", style.paint(icon))
    }
}

pub struct Ui {
    styles: Styles,
    quiet: bool,
}

impl Ui {
    pub fn new(color: ColorChoice, quiet: bool) -> Self {
        let colored = !quiet
            && match color {
                ColorChoice::Always => true,
                ColorChoice::Never => false,
                ColorChoice::Auto => std::io::stdout().is_terminal(),
            };

        #[cfg(windows)]
        if colored {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        let styles = if colored {
            Styles::colored()
        } else {
            Styles::default()
        };
        Self { styles, quiet }
    }

    /// Notifier that reports on stderr with this UI's styles.
    pub fn notifier(&self) -> UiNotifier {
        UiNotifier {
            styles: self.styles,
            quiet: self.quiet,
        }
    }

    /// Right-aligned `key: value` block; skipped when `rows` is empty.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        if rows.is_empty() {
            return;
        }

        self.heading(title);
        let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in rows {
            println!("  {} {value}", self.styles.label.paint(format!("{key:>width$}:")));
        }
    }

    /// Numbered list; `marked` entries get a trailing `*`.
    pub fn ordered_list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        self.heading(title);
        let mut empty = true;
        for (idx, (entry, marked)) in entries.into_iter().enumerate() {
            empty = false;
            let marker = if marked { " *" } else { "" };
            println!(
                "  {} {entry}{marker}",
                self.styles.marker.paint(format!("{:>2}.", idx + 1))
            );
        }
        if empty {
            println!("  (none)");
        }
    }

    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.heading(title);
        let mut empty = true;
        for entry in entries {
            empty = false;
            println!("  {} {entry}", self.styles.marker.paint("-"));
        }
        if empty {
            println!("  (none)");
        }
    }

    pub fn table(&self, title: &str, headers: &[String], rows: &[Vec<String>]) {
        self.heading(title);
        let widths = column_widths(headers, rows);
        println!("  {}", self.styles.label.paint(pad_row(headers, &widths)));
        let rule: Vec<String> = widths.iter().map(|width| "─".repeat(*width)).collect();
        println!("  {}", rule.join("─┼─"));
        for row in rows {
            println!("  {}", pad_row(row, &widths));
        }
    }

    pub fn info(&self, message: &str) {
        println!("{}", tagged(self.quiet, "ℹ", Style::default(), message));
    }

    pub fn success(&self, message: &str) {
        println!("{}", tagged(self.quiet, "✔", self.styles.ok, message));
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{}", tagged(self.quiet, "!", self.styles.alert, message));
    }

    /// Starts a spinner for a planner round trip. Quiet output shows none.
    pub fn task(&self, label: impl Into<String>) -> Task {
        let label = label.into();
        let spinner = (!self.quiet).then(|| {
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars(SPINNER_TICKS);
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(style);
            spinner.set_message(label.clone());
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        });
        Task {
            label,
            started: Instant::now(),
            spinner,
            done: false,
        }
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else {
            println!("{}", self.styles.heading.paint(format!("▸ {title}")));
        }
    }
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(idx) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }
    widths
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" │ ")
}

/// Reports notices on stderr.
pub struct UiNotifier {
    styles: Styles,
    quiet: bool,
}

impl Notifier for UiNotifier {
    fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice");
        let line = match notice.level {
            NoticeLevel::Info if self.quiet => return,
            NoticeLevel::Info => tagged(false, "ℹ", Style::default(), &notice.message),
            NoticeLevel::Warning => tagged(self.quiet, "!", self.styles.alert, &notice.message),
            NoticeLevel::Error => tagged(self.quiet, "✖", self.styles.failure, &notice.message),
        };
        eprintln!("{line}");
    }
}

/// Running planner call. Dropping it unfinished reports an interruption.
pub struct Task {
    label: String,
    started: Instant,
    spinner: Option<ProgressBar>,
    done: bool,
}

impl Task {
    pub fn finish(mut self) -> Duration {
        self.done = true;
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        self.started.elapsed()
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let message = format!(
            "{} interrupted after {}",
            self.label,
            format_duration(self.started.elapsed())
        );
        match self.spinner.take() {
            Some(spinner) => spinner.abandon_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
