pub mod command;
pub mod parse;

use std::io::stdout;
use std::path::PathBuf;

use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};

use crate::disk::{FileDisk, DEFAULT_BLOCK_COUNT};
use crate::fs::{FileSystem, FsError};
use crate::shell::{command::execute_command, parse::parse_command};

const DISK_PATH: &str = "disk.img";

pub fn start_shell() {
    print_banner();

    let disk = match FileDisk::open(DISK_PATH, DEFAULT_BLOCK_COUNT) {
        Ok(disk) => disk,
        Err(e) => {
            println!("{} cannot open {}: {}", "Error:".red().bold(), DISK_PATH, e);
            return;
        }
    };
    let mut fs = FileSystem::new(disk);

    // A fresh image has no superblock yet; anything else is a bug worth
    // surfacing before the prompt appears.
    match fs.mount() {
        Ok(()) => println!("{}", "Volume mounted.".green()),
        Err(FsError::InvalidMagic) => println!(
            "{}",
            "No filesystem on this image. Run 'format' then 'mount'.".yellow()
        ),
        Err(e) => println!("{} {}", "Error:".red().bold(), e),
    }
    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".simplefs_history");

    let mut line_editor = Reedline::create();
    if let Ok(history) = reedline::FileBackedHistory::with_file(100, history_path) {
        line_editor = line_editor.with_history(Box::new(history));
    }

    let commands = vec![
        "help", "format", "mount", "debug", "create", "delete", "getsize", "cat", "copyin",
        "copyout", "defrag", "exit",
    ];
    let commands: Vec<String> = commands.into_iter().map(String::from).collect();
    let completer = reedline::DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic(format!(
            "{}@{}",
            whoami::username().green().bold(),
            whoami::hostname().cyan().bold()
        )),
        DefaultPromptSegment::Basic("SimpleFS".bright_blue().bold().to_string()),
    );

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut fs) {
                            println!("{} {}", "Error:".red().bold(), e);
                        }
                        if matches!(cmd, command::Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "Unknown command. Type 'help' for the command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => break,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "Goodbye!".bright_yellow());
}

fn print_banner() {
    let mut stdout = stdout();
    let _ = execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print("SimpleFS — simulated inode filesystem\n"),
        ResetColor
    );
}
