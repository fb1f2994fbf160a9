use anyhow::{Context, Result};
use crossbeam::channel::Sender;
use recorder::SessionCommand;
use std::{
    io::{self, BufRead},
    thread::{self, JoinHandle},
};

/// Keyboard input of the recording session, one command per line.
pub fn parse_command(line: &str) -> Option<SessionCommand> {
    match line.trim().to_lowercase().as_str() {
        "" | "r" => Some(SessionCommand::ToggleRecording),
        "q" => Some(SessionCommand::Quit),
        _ => None,
    }
}

/// Forwards parsed stdin lines until EOF or until the receiver is gone.
pub fn spawn_stdin_reader<T, F>(sender: Sender<T>, parse: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(&str) -> Option<T> + Send + 'static,
{
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };

            match parse(&line) {
                Some(command) => {
                    if sender.send(command).is_err() {
                        break;
                    }
                }
                None => println!("Unknown command `{}`", line.trim()),
            }
        }

        log::debug!("exit stdin reader thread");
    })
}

pub fn quit_on_ctrlc<F>(on_quit: F) -> Result<()>
where
    F: Fn() + Send + 'static,
{
    ctrlc::set_handler(move || {
        log::info!("Ctrl-C received");
        on_quit();
    })
    .with_context(|| "set Ctrl-C handler failed")
}
