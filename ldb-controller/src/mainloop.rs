//! Controller main loop (spec.md §4.7).
//!
//! Accepts exactly one debuggee, then alternates between waiting for a
//! `BR`/`QT` and driving an interactive prompt that validates commands
//! locally (`h`/`f`/`asd`/`ls`/`q`) or forwards everything else on the wire.

use std::io::{self, Write};
use std::net::{TcpListener, TcpStream};

use ldb_wire::message::{self, AgentMessage};

use crate::attach;
use crate::cli::Cli;
use crate::render;
use crate::source_view::SourceView;
use crate::spawn;

/// Commands the hook state machine treats as resume commands (spec.md §4.4)
/// — once forwarded, the controller goes back to waiting for the next
/// `BR`/`QT` instead of reading an `OK`/`ER` response.
fn is_resume_command(cmd: &str) -> bool {
    matches!(cmd, "s" | "n" | "o" | "r" | "c" | "f")
}

/// Commands handled entirely in the controller, never forwarded (spec.md
/// §4.7 step 2).
fn is_local_command(cmd: &str) -> bool {
    matches!(cmd, "h" | "f" | "asd" | "ls" | "q" | "quit")
}

/// Commands whose first argument is an optional stack level defaulted from
/// the controller's "current frame" setting (spec.md §4.7 step 3).
fn takes_default_level(cmd: &str) -> bool {
    matches!(cmd, "ll" | "lu" | "lg")
}

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let listener = TcpListener::bind((cli.addr.as_str(), cli.port))?;
    log::info!("ldb: listening on {}:{}", cli.addr, cli.port);

    if cli.is_attach() {
        let pid = cli.pid.expect("is_attach implies pid is set");
        log::info!("ldb: signaling debuggee pid {pid} to attach");
        attach::signal_attach(pid)?;
    } else if !cli.program.is_empty() {
        spawn::spawn_debuggee(&cli.program, cli.port)?;
    }

    let (sock, peer) = listener.accept()?;
    log::info!("ldb: debuggee connected from {peer}");

    session_loop(sock, cli.source.clone())
}

fn session_loop(mut sock: TcpStream, source_path: Vec<String>) -> anyhow::Result<()> {
    let mut view = SourceView::new(source_path);
    let mut default_level: usize = 1;

    loop {
        let payload = message::read_frame(&mut sock)?;
        match AgentMessage::parse(&payload)? {
            AgentMessage::Quit => {
                println!("Debuggee session ended.");
                return Ok(());
            }
            AgentMessage::Break {
                basename,
                line,
                pid,
                fullpath,
            } => {
                log::debug!("ldb: break at {basename}:{line} (pid {pid})");
                view.on_break(&basename, line);
                show_break_location(&view, line, &fullpath);
            }
            other => {
                anyhow::bail!("unexpected message while waiting for BR/QT: {other:?}");
            }
        }

        if !prompt_until_resume(&mut sock, &mut view, &mut default_level)? {
            return Ok(());
        }
    }
}

fn show_break_location(view: &SourceView, line: u32, fullpath: &str) {
    let basename = view.current_file.as_deref().unwrap_or(fullpath);
    let path = view.resolve(basename, fullpath);
    match SourceView::render(&path, line, 10) {
        Ok(text) => print!("{text}"),
        Err(_) => println!("-> {basename}:{line}"),
    }
}

/// Drive the prompt until a resume command is forwarded. Returns `false` if
/// the user asked to quit the controller entirely.
fn prompt_until_resume(
    sock: &mut TcpStream,
    view: &mut SourceView,
    default_level: &mut usize,
) -> anyhow::Result<bool> {
    loop {
        print!("(ldb) ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(false);
        }
        let tokens = match message::tokenize(line.trim()) {
            Ok(t) => t,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        let Some(cmd) = tokens.first().cloned() else {
            continue;
        };

        if is_local_command(&cmd) {
            match handle_local_command(&tokens, view, default_level) {
                LocalOutcome::Continue => continue,
                LocalOutcome::QuitController => return Ok(false),
            }
        }

        let tokens = if takes_default_level(&cmd) && tokens.len() < 2 {
            let mut t = tokens;
            t.push(default_level.to_string());
            t
        } else {
            tokens
        };

        let line = message::join(&tokens);
        message::write_frame(sock, line.as_bytes())?;

        if is_resume_command(&cmd) {
            return Ok(true);
        }

        let payload = message::read_frame(sock)?;
        match AgentMessage::parse(&payload)? {
            AgentMessage::Ok(body) => render_reply(&cmd, &body),
            AgentMessage::Err(msg) => println!("error: {msg}"),
            other => println!("unexpected reply: {other:?}"),
        }
    }
}

enum LocalOutcome {
    Continue,
    QuitController,
}

fn handle_local_command(
    tokens: &[String],
    view: &mut SourceView,
    default_level: &mut usize,
) -> LocalOutcome {
    match tokens[0].as_str() {
        "h" => {
            print_help();
        }
        "f" => {
            if let Some(level) = tokens.get(1).and_then(|s| s.parse::<usize>().ok()) {
                *default_level = level;
            }
            println!("current frame level: {default_level}");
        }
        "asd" => {
            if let Some(dir) = tokens.get(1) {
                view.add_source_dir(dir.clone());
            } else {
                println!("usage: asd <dir>");
            }
        }
        "ls" => handle_ls(tokens, view),
        "q" | "quit" => return LocalOutcome::QuitController,
        _ => unreachable!("is_local_command gate"),
    }
    LocalOutcome::Continue
}

fn handle_ls(tokens: &[String], view: &SourceView) {
    let file = tokens
        .get(1)
        .cloned()
        .or_else(|| view.current_file.clone());
    let Some(file) = file else {
        println!("no current file; use `ls <file>`");
        return;
    };
    let line = tokens
        .get(2)
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(view.current_line);
    let count = tokens
        .get(3)
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(10);
    let path = view.resolve(&file, &file);
    match SourceView::render(&path, line, count) {
        Ok(text) => print!("{text}"),
        Err(e) => println!("cannot read {file}: {e}"),
    }
}

fn render_reply(cmd: &str, body: &str) {
    let rendered = match cmd {
        "ll" | "lu" | "lg" => render::render_list(body),
        "ps" | "bt" => render::render_stack(body),
        "lb" => render::render_breakpoints(body),
        "w" => render::render_watch(body),
        _ => body.to_string(),
    };
    print!("{rendered}");
}

fn print_help() {
    println!(
        "commands: s n o r/c ll[L] lu[L] lg[L] w ps/bt sb/b db en dis lb m h f asd ls q"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_commands_match_hook_mode_selectors() {
        for c in ["s", "n", "o", "r", "c", "f"] {
            assert!(is_resume_command(c));
        }
        assert!(!is_resume_command("ll"));
    }

    #[test]
    fn local_commands_are_never_forwarded() {
        for c in ["h", "f", "asd", "ls", "q", "quit"] {
            assert!(is_local_command(c));
        }
        assert!(!is_local_command("sb"));
    }

    #[test]
    fn default_level_commands() {
        assert!(takes_default_level("ll"));
        assert!(takes_default_level("lu"));
        assert!(takes_default_level("lg"));
        assert!(!takes_default_level("w"));
    }
}
