//! Interactive task shell.
//!
//! Reads commands from stdin, one per line. Task numbers are 1-based and
//! refer to the active list as last printed by `list`.
//!
//! Voice runs happen in the background: `rec` starts a recording, a second
//! `rec` stops it and hands the artifact to the pipeline while the shell
//! keeps accepting commands.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::core::{Orchestrator, PipelineOutcome};
use crate::domain::TaskSnapshot;
use crate::ingest::RecorderState;

const HELP: &str = "\
Commands:
  add <text>    Add a task
  toggle <n>    Mark task n done / not done
  delete <n>    Delete task n
  rec           Start recording, or stop and extract tasks
  list          Show active tasks
  history       Show archived tasks
  clear         Clear history
  help          Show this help
  quit          Exit";

/// One parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(String),
    Toggle(usize),
    Delete(usize),
    Record,
    List,
    History,
    Clear,
    Help,
    Quit,
    Empty,
}

/// Parse one input line. Returns a message for malformed input.
pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Ok(ShellCommand::Empty),
        "add" | "a" => Ok(ShellCommand::Add(rest.to_string())),
        "toggle" | "t" | "done" => parse_index(rest).map(ShellCommand::Toggle),
        "delete" | "del" | "d" | "rm" => parse_index(rest).map(ShellCommand::Delete),
        "rec" | "r" | "record" => Ok(ShellCommand::Record),
        "list" | "ls" | "l" => Ok(ShellCommand::List),
        "history" | "h" => Ok(ShellCommand::History),
        "clear" => Ok(ShellCommand::Clear),
        "help" | "?" => Ok(ShellCommand::Help),
        "quit" | "exit" | "q" => Ok(ShellCommand::Quit),
        other => Err(format!("Unknown command: {} (try `help`)", other)),
    }
}

/// Parse a 1-based task number into a 0-based index
fn parse_index(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("Expected a task number, got `{}`", arg)),
    }
}

fn print_active(snapshot: &TaskSnapshot) {
    if snapshot.active.is_empty() {
        println!("No tasks");
        return;
    }
    for (i, task) in snapshot.active.iter().enumerate() {
        let mark = if task.completed { "x" } else { " " };
        println!("{:>3}. [{}] {}", i + 1, mark, task.text);
    }
}

fn print_history(snapshot: &TaskSnapshot) {
    if snapshot.history.is_empty() {
        println!("History is empty");
        return;
    }
    for task in &snapshot.history {
        println!("  ✓ {}", task.text);
    }
}

/// Run the shell until `quit` or end of input
pub async fn run(orchestrator: Orchestrator) -> Result<()> {
    let orchestrator = Arc::new(orchestrator);

    if let Err(e) = orchestrator.check_recording_available().await {
        warn!(error = %e, "Voice input disabled; typed tasks still work");
    }

    let mut updates = orchestrator.tasks().subscribe();
    let mut seen_history = updates.borrow_and_update().history.len();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("taskman shell. Type `help` for commands.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(ShellCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = handle(&orchestrator, command).await {
                            eprintln!("Error: {}", e);
                        }
                    }
                    Err(msg) => eprintln!("{}", msg),
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                let history_len = snapshot.history.len();
                if history_len > seen_history {
                    if let Some(task) = snapshot.history.first() {
                        println!("Archived: {}", task.text);
                    }
                }
                seen_history = history_len;
            }
        }
    }

    debug!("Shell exited");
    Ok(())
}

async fn handle(orchestrator: &Arc<Orchestrator>, command: ShellCommand) -> Result<()> {
    let tasks = orchestrator.tasks();
    match command {
        ShellCommand::Add(text) => {
            orchestrator.add_text_task(&text).await?;
            print_active(&tasks.snapshot().await?);
        }
        ShellCommand::Toggle(index) => match tasks.toggle_at(index).await? {
            Some(_) => print_active(&tasks.snapshot().await?),
            None => eprintln!("No task {}", index + 1),
        },
        ShellCommand::Delete(index) => match tasks.delete_at(index).await? {
            Some(task) => println!("Deleted: {}", task.text),
            None => eprintln!("No task {}", index + 1),
        },
        ShellCommand::Record => record(orchestrator).await?,
        ShellCommand::List => print_active(&tasks.snapshot().await?),
        ShellCommand::History => print_history(&tasks.snapshot().await?),
        ShellCommand::Clear => {
            let removed = tasks.clear_history().await?;
            println!("Cleared {} archived task(s)", removed);
        }
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Empty | ShellCommand::Quit => {}
    }
    Ok(())
}

async fn record(orchestrator: &Arc<Orchestrator>) -> Result<()> {
    if orchestrator.recorder_state().await == RecorderState::Idle {
        if orchestrator.is_processing() {
            println!("Still processing the last recording");
            return Ok(());
        }
        orchestrator.start_recording().await?;
        println!("Listening... (`rec` again to stop)");
        return Ok(());
    }

    let elapsed = orchestrator.recording_elapsed().await;
    println!("Processing {:.1}s of audio...", elapsed.as_secs_f64());
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        match orchestrator.stop_and_process().await {
            Ok(PipelineOutcome::Completed { added, .. }) if !added.is_empty() => {
                if let Ok(snapshot) = orchestrator.tasks().snapshot().await {
                    println!("Added {} task(s)", added.len());
                    print_active(&snapshot);
                }
            }
            Ok(_) => println!("No tasks heard"),
            Err(e) => eprintln!("Error: {}", e),
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_keeps_text() {
        assert_eq!(
            parse_command("add   Buy milk "),
            Ok(ShellCommand::Add("Buy milk".to_string()))
        );
        assert_eq!(parse_command("add"), Ok(ShellCommand::Add(String::new())));
    }

    #[test]
    fn test_parse_indexes_are_one_based() {
        assert_eq!(parse_command("toggle 1"), Ok(ShellCommand::Toggle(0)));
        assert_eq!(parse_command("delete 3"), Ok(ShellCommand::Delete(2)));
        assert!(parse_command("toggle 0").is_err());
        assert!(parse_command("delete x").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("REC"), Ok(ShellCommand::Record));
        assert_eq!(parse_command("list"), Ok(ShellCommand::List));
        assert_eq!(parse_command("history"), Ok(ShellCommand::History));
        assert_eq!(parse_command("clear"), Ok(ShellCommand::Clear));
        assert_eq!(parse_command("quit"), Ok(ShellCommand::Quit));
        assert_eq!(parse_command("   "), Ok(ShellCommand::Empty));
        assert!(parse_command("frobnicate").is_err());
    }
}
