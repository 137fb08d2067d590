//! Colored output helpers for CLI
//!
//! Every printer has a plain-text fallback for `--no-color` and non-TTY use.

use crate::types::{Stage, TaskStatus};
use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy)]
enum Tone {
    Ok,
    Info,
    Warn,
    Fail,
}

impl Tone {
    fn tag(self) -> &'static str {
        match self {
            Tone::Ok => "OK",
            Tone::Info => "INFO",
            Tone::Warn => "WARN",
            Tone::Fail => "ERROR",
        }
    }
}

/// Terminal printer for the `delve` commands.
pub struct Output {
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n   {}\n",
                "delve".bright_cyan().bold(),
                version.dimmed(),
                "supervised multi-agent deep research".bright_white()
            );
        } else {
            println!(
                "\n   delve {}\n   supervised multi-agent deep research\n",
                version
            );
        }
    }

    /// One status line: a colored marker or a bracketed tag, then the message.
    fn status(&self, tone: Tone, message: &str) {
        let line = if self.colored {
            let marker = match tone {
                Tone::Ok => "✓".green().bold().to_string(),
                Tone::Info => "•".blue().to_string(),
                Tone::Warn => "⚠".yellow().bold().to_string(),
                Tone::Fail => "✗".red().bold().to_string(),
            };
            let body = match tone {
                Tone::Ok => message.green().to_string(),
                Tone::Info => message.to_string(),
                Tone::Warn => message.yellow().to_string(),
                Tone::Fail => message.red().to_string(),
            };
            format!("  {} {}", marker, body)
        } else {
            format!("  [{}] {}", tone.tag(), message)
        };
        match tone {
            Tone::Fail => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }

    pub fn success(&self, message: &str) {
        self.status(Tone::Ok, message);
    }

    pub fn info(&self, message: &str) {
        self.status(Tone::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.status(Tone::Warn, message);
    }

    /// Goes to stderr.
    pub fn error(&self, message: &str) {
        self.status(Tone::Fail, message);
    }

    /// A scaffolded file, e.g. `created("config", "delve.toml")`.
    pub fn created(&self, kind: &str, path: &str) {
        let detail = format!("{} {}", kind, path);
        if self.colored {
            println!("  {} {}", "+".green().bold(), detail.bright_white());
        } else {
            println!("  [CREATED] {}", detail);
        }
    }

    pub fn skipped(&self, path: &str, reason: &str) {
        let detail = format!("{} ({})", path, reason);
        if self.colored {
            println!("  {} {}", "-".yellow(), detail.dimmed());
        } else {
            println!("  [SKIPPED] {}", detail);
        }
    }

    pub fn header(&self, title: &str) {
        match self.colored {
            true => println!("\n  {}", title.bright_white().bold().underline()),
            false => println!("\n  == {} ==", title),
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        match self.colored {
            true => println!("    {:<24}{}", format!("{}:", key).dimmed(), value),
            false => println!("    {:<24}{}", format!("{}:", key), value),
        }
    }

    pub fn list_item(&self, item: &str) {
        match self.colored {
            true => println!("    {} {}", "·".blue(), item),
            false => println!("    - {}", item),
        }
    }

    pub fn hint(&self, message: &str) {
        match self.colored {
            true => println!("\n  {}", message.dimmed().italic()),
            false => println!("\n  {}", message),
        }
    }

    /// A shell command the user can copy.
    pub fn command(&self, cmd: &str) {
        let line = format!("$ {}", cmd);
        match self.colored {
            true => println!("      {}", line.bright_cyan()),
            false => println!("      {}", line),
        }
    }

    pub fn complete(&self, message: &str) {
        match self.colored {
            true => println!("\n  {}", message.bright_green().bold()),
            false => println!("\n  {}", message),
        }
    }

    /// A clarifying question from the model
    pub fn question(&self, question: &str) {
        if self.colored {
            println!("\n  {} {}", "?".bright_yellow().bold(), question.bright_white());
        } else {
            println!("\n  [?] {}", question);
        }
    }

    /// The final report, printed unindented so it stays valid markdown.
    pub fn report(&self, report: &str) {
        println!();
        println!("{}", report);
        println!();
    }

    pub fn stage(&self, stage: Stage) {
        let label = stage.to_string();
        if self.colored {
            let styled = match stage {
                Stage::Done => label.green().bold().to_string(),
                Stage::Failed => label.red().bold().to_string(),
                Stage::AwaitingUser => label.yellow().bold().to_string(),
                _ => label.cyan().to_string(),
            };
            println!("    {}: {}", "stage".dimmed(), styled);
        } else {
            println!("    stage: {}", label);
        }
    }

    /// One dispatched research task with its status
    pub fn task(&self, status: TaskStatus, topic: &str) {
        let (mark, plain) = match status {
            TaskStatus::Succeeded => ("✓", "OK"),
            TaskStatus::Failed => ("✗", "FAILED"),
            TaskStatus::Running => ("…", "RUNNING"),
            TaskStatus::Pending => ("○", "PENDING"),
        };
        if self.colored {
            let mark = match status {
                TaskStatus::Succeeded => mark.green().to_string(),
                TaskStatus::Failed => mark.red().to_string(),
                _ => mark.yellow().to_string(),
            };
            println!("    {} {}", mark, topic);
        } else {
            println!("    [{}] {}", plain, topic);
        }
    }
}
