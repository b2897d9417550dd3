//! Interactive session: pick a photo source, watch the result panel.
//!
//! Launch with `medcheck interactive` (or plain `medcheck`).
//! Type `/help` for available commands, Tab for completion.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};

use crate::acquire::ImageSource;
use crate::analyzer::VisionAnalyzer;
use crate::checker::MedicineChecker;
use crate::panel::{ResultPanel, LIGHTING_HINT};

/// Available session commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/gallery", "Analyze an existing photo: /gallery <path>"),
    ("/camera", "Take a photo with the camera and analyze it"),
    ("/show", "Show the last result again"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit"),
];

/// Session helper for tab completion.
struct SessionHelper {
    files: FilenameCompleter,
}

impl Completer for SessionHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<12} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        if input.starts_with("/gallery ") || input.starts_with("1 ") {
            return self.files.complete(line, pos, ctx);
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for SessionHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for SessionHelper {}
impl Validator for SessionHelper {}
impl Helper for SessionHelper {}

/// Busy indicator shown while a check runs.
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg} \x1b[90m{elapsed}\x1b[0m")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// A parsed line of input.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Check(ImageSource),
    Show,
    Clear,
    Help,
    Exit,
    Usage(&'static str),
    Unknown(String),
    Nothing,
}

fn parse_line(line: &str) -> Action {
    let line = line.trim();
    if line.is_empty() {
        return Action::Nothing;
    }

    let mut parts = line.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();

    match cmd.strip_prefix('/').unwrap_or(cmd) {
        "gallery" | "g" | "1" => {
            if args.is_empty() {
                Action::Usage("Usage: /gallery <path to photo>")
            } else {
                Action::Check(ImageSource::gallery(unquote(args)))
            }
        }
        "camera" | "c" | "2" => Action::Check(ImageSource::Camera),
        "show" => Action::Show,
        "clear" | "cls" => Action::Clear,
        "help" | "h" | "?" | "" => Action::Help,
        "exit" | "quit" | "q" => Action::Exit,
        _ if std::path::Path::new(unquote(line)).is_file() => {
            Action::Check(ImageSource::gallery(unquote(line)))
        }
        other => Action::Unknown(other.to_string()),
    }
}

/// Strips one layer of matching quotes, as pasted from a file manager.
fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Run the interactive session.
pub async fn run<A: VisionAnalyzer>(checker: &MedicineChecker<A>) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mmedcheck v{}\x1b[0m \x1b[90m- medicine package summaries via {}\x1b[0m",
        env!("CARGO_PKG_VERSION"),
        checker.analyzer().name()
    );
    eprintln!();
    print_menu();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<SessionHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(SessionHelper {
        files: FilenameCompleter::new(),
    }));

    let hist_path = dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("medcheck")
        .join("history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut panel = ResultPanel::new();
    print_panel(&panel);
    let prompt = " \x1b[36mmedcheck>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => match parse_line(&line) {
                Action::Nothing => {}
                Action::Check(source) => {
                    if !panel.begin() {
                        continue;
                    }
                    let bar = spinner(match source {
                        ImageSource::Camera => "Taking photo and analyzing...",
                        ImageSource::Gallery { .. } => "Analyzing photo...",
                    });
                    let result = tokio::select! {
                        result = checker.check(&source) => Some(result),
                        _ = tokio::signal::ctrl_c() => None,
                    };
                    bar.finish_and_clear();
                    match result {
                        Some(result) => {
                            panel.finish(&result);
                            print_panel(&panel);
                        }
                        None => {
                            panel.cancel();
                            eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Check interrupted.");
                        }
                    }
                }
                Action::Show => print_panel(&panel),
                Action::Clear => eprint!("\x1b[2J\x1b[H"),
                Action::Help => print_menu(),
                Action::Exit => {
                    eprintln!("  Goodbye!");
                    break;
                }
                Action::Usage(usage) => eprintln!("  {usage}"),
                Action::Unknown(cmd) => {
                    eprintln!("  Unknown command '{cmd}'. Type /help for commands.");
                }
            },
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    if let Some(parent) = hist_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn print_menu() {
    eprintln!("  Photo source:");
    eprintln!("    \x1b[1m1\x1b[0m  Choose from gallery   \x1b[90m(/gallery <path>, Tab completes files)\x1b[0m");
    eprintln!("    \x1b[1m2\x1b[0m  Take with camera      \x1b[90m(/camera)\x1b[0m");
    eprintln!();
    for (cmd, desc) in COMMANDS.iter().skip(2) {
        eprintln!("    {cmd:<10} {desc}");
    }
    eprintln!();
    eprintln!("  \x1b[90m{LIGHTING_HINT}\x1b[0m");
    eprintln!();
}

fn print_panel(panel: &ResultPanel) {
    eprintln!();
    eprintln!("  \x1b[1mResult:\x1b[0m");
    println!();
    for line in panel.text().lines() {
        println!("  {line}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("   "), Action::Nothing);
        assert_eq!(parse_line("/camera"), Action::Check(ImageSource::Camera));
        assert_eq!(parse_line("2"), Action::Check(ImageSource::Camera));
        assert_eq!(
            parse_line("/gallery box.jpg"),
            Action::Check(ImageSource::gallery("box.jpg"))
        );
        assert_eq!(
            parse_line("1 \"my photos/box.jpg\""),
            Action::Check(ImageSource::gallery("my photos/box.jpg"))
        );
        assert!(matches!(parse_line("/gallery"), Action::Usage(_)));
        assert_eq!(parse_line("/"), Action::Help);
        assert_eq!(parse_line("/exit"), Action::Exit);
        assert_eq!(parse_line("/frobnicate"), Action::Unknown("frobnicate".into()));
    }

    #[test]
    fn test_bare_existing_path_is_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.png");
        std::fs::write(&path, b"png").unwrap();
        let line = path.display().to_string();
        assert_eq!(parse_line(&line), Action::Check(ImageSource::gallery(&path)));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'a b'"), "a b");
        assert_eq!(unquote("\"a\""), "a");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("plain"), "plain");
    }
}
