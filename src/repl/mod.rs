//! Interactive REPL
//!
//! Plain lines are sent as prompts and the reply is streamed to stdout.
//! Slash commands manage attachments and the session.

mod colors;
mod commands;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use std::path::Path;

use superchat::chat::content::{ContentItem, Role};
use superchat::chat::provider::ProviderKind;
use superchat::chat::{ChatService, SessionState};

use colors::ansi::*;
use commands::Command;

pub fn print_banner(service: &ChatService, kind: ProviderKind) {
    let params = service.params();
    println!();
    println!("{}{}  superchat {}{}", BOLD, MAGENTA, env!("CARGO_PKG_VERSION"), RESET);
    println!("{}", colors::separator(50));
    println!("{}Model{}        {} ({})", DIM, RESET, params.model(), kind.as_str());
    println!("{}Temperature{}  {}", DIM, RESET, params.temperature());
    println!("{}Max tokens{}   {}", DIM, RESET, params.max_tokens());
    println!("{}", colors::dim("Type /help for commands"));
    println!();
}

pub struct Repl {
    editor: DefaultEditor,
    service: ChatService,
    session: SessionState,
    models: Vec<&'static str>,
}

impl Repl {
    pub fn new(service: ChatService, session: SessionState, models: Vec<&'static str>) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            service,
            session,
            models,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            let line = match self.editor.readline(">>> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() && !self.session.speech_pending() {
                continue;
            }
            let _ = self.editor.add_history_entry(trimmed);

            match Command::parse(trimmed) {
                Some(Command::Quit) => break,
                Some(command) => self.handle(command).await,
                None => self.send(trimmed).await,
            }
        }

        // Staged files are removed with the session; remote files are left for /reset
        println!("{}", colors::dim("Goodbye."));
        Ok(())
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Attach(path) => self.attach(&path).await,
            Command::Speech(path) => self.speech(&path).await,
            Command::Reset => {
                let report = self.service.reset(&mut self.session).await;
                println!(
                    "{}",
                    colors::success(&format!(
                        "Cleared {} turns, deleted {} remote files",
                        report.turns_cleared, report.remote_deleted
                    ))
                );
                if report.remote_failed > 0 {
                    println!(
                        "{}",
                        colors::warning(&format!("{} remote files could not be deleted", report.remote_failed))
                    );
                }
            }
            Command::Models => {
                for model in &self.models {
                    let marker = if *model == self.service.params().model() { "*" } else { " " };
                    println!(" {} {}", marker, model);
                }
            }
            Command::History => self.print_history(),
            Command::Help => commands::print_help(),
            Command::MissingArgument(usage) => println!("Usage: {}", usage),
            Command::Unknown(name) => println!("Unknown command: {} (try /help)", name),
            Command::Quit => {}
        }
    }

    async fn attach(&mut self, path: &Path) {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("{}", colors::error(&format!("{}: {}", path.display(), e)));
                return;
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.service.add_upload(&mut self.session, bytes, "", &file_name).await {
            Ok(kind) => println!("{}", colors::success(&format!("Added {} {}", kind, file_name))),
            Err(e) => println!("{}", colors::error(&e.to_string())),
        }
    }

    async fn speech(&mut self, path: &Path) {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("{}", colors::error(&format!("{}: {}", path.display(), e)));
                return;
            }
        };

        match self.service.add_speech(&mut self.session, bytes).await {
            Ok(true) => println!("{}", colors::success("Recording added; press Enter to send")),
            Ok(false) => println!("{}", colors::dim("Same recording as before, ignored")),
            Err(e) => println!("{}", colors::error(&e.to_string())),
        }
    }

    async fn send(&mut self, prompt: &str) {
        let mut reply = match self.service.send(&mut self.session, prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                println!("{}", colors::error(&e.to_string()));
                return;
            }
        };

        let mut stdout = io::stdout();
        loop {
            match reply.next_fragment().await {
                Ok(Some(fragment)) => {
                    print!("{}", fragment);
                    let _ = stdout.flush();
                }
                Ok(None) => break,
                Err(e) => {
                    println!();
                    println!("{}", colors::error(&e.to_string()));
                    return;
                }
            }
        }
        println!();
        println!();
    }

    fn print_history(&self) {
        let history = self.session.history();
        if history.is_empty() {
            println!("{}", colors::dim("(empty)"));
            return;
        }

        for turn in history.all() {
            let label = match turn.role {
                Role::User => format!("{}you{}", BOLD, RESET),
                Role::Assistant => format!("{}{}assistant{}", BOLD, MAGENTA, RESET),
            };
            for item in turn.displayable() {
                println!("{}: {}", label, describe(item));
            }
        }
    }
}

fn describe(item: &ContentItem) -> String {
    match item {
        ContentItem::Text { body } => body.clone(),
        ContentItem::Image { bytes, mime } => colors::dim(&format!("[image {} {} bytes]", mime, bytes.len())),
        ContentItem::Video(a) => colors::dim(&format!("[video {}]", a.id)),
        ContentItem::Audio(a) => colors::dim(&format!("[audio {}]", a.id)),
        ContentItem::SpeechInput(a) => colors::dim(&format!("[recording {}]", a.id)),
        ContentItem::Pdf(a) => colors::dim(&format!("[pdf {}]", a.id)),
        ContentItem::DocxText { .. } => colors::dim("[document]"),
    }
}
