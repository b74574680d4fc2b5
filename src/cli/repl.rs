use std::io::Write;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::ai::chat::models::{Speaker, TranscriptEntry};
use crate::ai::responder::{Request, Responder};
use crate::core::Session;

const HELP: &str = "Commands: /clear resets the conversation, /history shows it, /quit exits";

fn print_entry(entry: &TranscriptEntry) {
    match entry.role {
        Speaker::User => println!(">>> {}", entry.content),
        Speaker::Assistant => println!("{}\n", entry.content),
    }
}

/// Output a responder sends while it works on a request.
pub enum Progress {
    /// The answer itself, piece by piece
    Answer(mpsc::UnboundedReceiver<String>),
    /// Steps taken before answering, e.g. tool calls
    Steps(mpsc::UnboundedReceiver<String>),
}

impl Progress {
    fn is_answer(&self) -> bool {
        matches!(self, Progress::Answer(_))
    }

    async fn next(&mut self) -> Option<String> {
        match self {
            Progress::Answer(rx) | Progress::Steps(rx) => rx.recv().await,
        }
    }

    /// Shows whatever arrived after the request finished.
    fn drain(&mut self) {
        let answer = self.is_answer();
        let rx = match self {
            Progress::Answer(rx) | Progress::Steps(rx) => rx,
        };
        while let Ok(piece) = rx.try_recv() {
            show(answer, &piece);
        }
    }
}

fn show(answer: bool, piece: &str) {
    if answer {
        print!("{}", piece);
        let _ = std::io::stdout().flush();
    } else {
        let step = piece.lines().take(5).collect::<Vec<_>>().join("\n    ");
        println!("  > {}", step);
    }
}

async fn next_piece(progress: &mut Option<Progress>) -> Option<String> {
    match progress {
        Some(p) => p.next().await,
        None => std::future::pending().await,
    }
}

/// Interactive loop over a session. Progress is printed while each
/// request runs; when it carries the answer only failures are printed
/// at the end.
pub async fn run<R: Responder>(
    mut session: Session<R>,
    mut progress: Option<Progress>,
) -> Result<()> {
    let live = progress.as_ref().is_some_and(Progress::is_answer);

    if let Some(msg) = session.validation().message() {
        println!("{}", msg);
        return Ok(());
    }

    let mut rl = DefaultEditor::new()?;
    println!("{}", HELP);
    print_entry(&session.transcript()[0]);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    "/clear" => {
                        session.clear();
                        print_entry(&session.transcript()[0]);
                        continue;
                    }
                    "/history" => {
                        session.transcript().iter().for_each(print_entry);
                        continue;
                    }
                    "/quit" | "/exit" => break,
                    _ => {}
                }

                let submit = session.submit(Request::new(line));
                tokio::pin!(submit);
                let result = loop {
                    tokio::select! {
                        result = &mut submit => break result,
                        Some(piece) = next_piece(&mut progress) => show(live, &piece),
                    }
                };
                if let Some(p) = progress.as_mut() {
                    p.drain();
                }

                match result {
                    Ok(entry) if live && !entry.error => println!("\n"),
                    Ok(entry) => print_entry(entry),
                    // Nothing was recorded, e.g. the database is unreachable
                    Err(e) => println!("{}\n", e),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
