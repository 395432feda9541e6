//! Line-oriented presentation shell: header, example shortcuts, commands and
//! the blocking ask/render loop.

use chrono::Local;
use colored::*;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::UiConfig;
use crate::display::format_block;
use crate::error::{AnalystError, Result};
use crate::models::{ContentItem, Message, Rating};
use crate::render::{Block, Renderer};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Question(String),
    AskExample(usize),
    AskSuggestion(usize),
    Examples,
    Feedback {
        answer: Option<usize>,
        rating: Rating,
        comment: String,
    },
    History,
    Raw(usize),
    Clear,
    Help,
    Quit,
    Invalid(String),
}

fn parse_number(arg: Option<&str>, usage: &str) -> std::result::Result<usize, String> {
    arg.and_then(|a| a.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("Usage: {usage}"))
}

/// Parse one line of user input.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Question(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let result = match name.as_str() {
        "quit" | "exit" | "q" => Ok(Command::Quit),
        "help" | "?" => Ok(Command::Help),
        "examples" => Ok(Command::Examples),
        "history" => Ok(Command::History),
        "clear" => Ok(Command::Clear),
        "ask" => parse_number(parts.next(), "/ask <example number>").map(Command::AskExample),
        "suggest" => {
            parse_number(parts.next(), "/suggest <suggestion number>").map(Command::AskSuggestion)
        }
        "raw" => parse_number(parts.next(), "/raw <answer number>").map(Command::Raw),
        "feedback" => {
            let usage = "/feedback [<answer number>] great|better|wrong [comment]";
            let mut next = parts.next();
            let answer = match next.map(str::parse::<usize>) {
                Some(Ok(n)) => {
                    next = parts.next();
                    Some(n)
                }
                _ => None,
            };
            match next.map(str::parse::<Rating>) {
                Some(Ok(rating)) => Ok(Command::Feedback {
                    answer,
                    rating,
                    comment: parts.collect::<Vec<_>>().join(" "),
                }),
                Some(Err(e)) => Err(format!("{e}\nUsage: {usage}")),
                None => Err(format!("Usage: {usage}")),
            }
        }
        n if n.chars().all(|c| c.is_ascii_digit()) && !n.is_empty() => {
            parse_number(Some(n), "/<example number>").map(Command::AskExample)
        }
        other => Err(format!("Unknown command '/{other}'. Type /help for commands.")),
    };
    result.unwrap_or_else(Command::Invalid)
}

/// `[14:03:27] analyst` line printed above each replayed message.
fn history_stamp(message: &Message) -> String {
    let local = message.created_at.with_timezone(&Local);
    format!("[{}] {}", local.format("%H:%M:%S"), message.role)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<W: Write> {
    session: Session,
    renderer: Renderer,
    ui: UiConfig,
    out: W,
}

impl<W: Write> Shell<W> {
    pub fn new(session: Session, renderer: Renderer, ui: UiConfig, out: W) -> Self {
        Self {
            session,
            renderer,
            ui,
            out,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn say(&mut self, text: impl AsRef<str>) -> Result<()> {
        writeln!(self.out, "{}", text.as_ref())?;
        Ok(())
    }

    pub fn print_header(&mut self) -> Result<()> {
        let title = self.ui.title.bold().to_string();
        let subtitle = self.ui.subtitle.clone();
        self.say(title)?;
        self.say(subtitle)?;
        self.say("─".repeat(60))?;
        self.print_examples()?;
        self.say("─".repeat(60))?;
        let tip = self.ui.tip.dimmed().to_string();
        self.say(tip)?;
        self.say("Type /help for commands.".dimmed().to_string())
    }

    fn print_examples(&mut self) -> Result<()> {
        self.say("💡 Suggested Questions".bold().to_string())?;
        let lines: Vec<String> = self
            .ui
            .example_questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("  [/{}] {}", i + 1, q))
            .collect();
        for line in lines {
            self.say(line)?;
        }
        Ok(())
    }

    fn print_help(&mut self) -> Result<()> {
        self.say(
            "Commands:\n  <question>                 ask the analyst\n  /<n>, /ask <n>             ask example question n\n  /suggest <n>               ask suggestion n from the last answer\n  /examples                  list example questions\n  /feedback [<n>] great|better|wrong [comment]\n                             rate the latest (or n-th) answer\n  /history                   replay the conversation\n  /raw <n>                   show raw content of answer n\n  /clear                     start a new conversation\n  /quit                      leave",
        )
    }

    /// Print a block as soon as the renderer produces it.
    async fn render_message(&mut self, index: usize) -> Result<()> {
        let Some(message) = self.session.store().all().get(index) else {
            return Ok(());
        };
        let feedback = message
            .request_id
            .as_deref()
            .and_then(|id| self.session.store().feedback_for(id));
        let max_rows = self.ui.max_table_rows;
        let out = &mut self.out;
        let mut write_error = None;
        self.renderer
            .render_into(message, feedback, |block: Block| {
                if write_error.is_none() {
                    if let Err(e) = writeln!(out, "{}", format_block(&block, max_rows)) {
                        write_error = Some(e);
                    }
                }
            })
            .await;
        if let Some(e) = write_error {
            return Err(e.into());
        }
        self.flush_notifications()
    }

    fn flush_notifications(&mut self) -> Result<()> {
        for notification in self.session.drain_notifications() {
            self.say(notification.text().red().bold().to_string())?;
        }
        Ok(())
    }

    async fn ask(&mut self, question: String, echo: bool) -> Result<()> {
        if let Err(e) = self.session.queue_question(&question) {
            return self.say(e.to_string().yellow().to_string());
        }
        if echo {
            self.say(format_block(&Block::Question(question), 0))?;
        }
        self.say("Waiting for Analyst's response...".dimmed().to_string())?;
        self.out.flush().ok();

        if self.session.resolve_turn().await.is_some() {
            let index = self.session.store().len() - 1;
            self.render_message(index).await?;
        }
        Ok(())
    }

    fn latest_suggestion(&self, number: usize) -> Option<String> {
        let answer = self.session.store().answers().last()?.1;
        answer.content.iter().find_map(|item| match item {
            ContentItem::Suggestions { suggestions } => suggestions.get(number - 1).cloned(),
            _ => None,
        })
    }

    async fn feedback(
        &mut self,
        answer: Option<usize>,
        rating: Rating,
        comment: String,
    ) -> Result<()> {
        let target = match answer {
            Some(n) => self.session.store().answer(n),
            None => self.session.store().latest_rateable(),
        };
        let Some(request_id) = target.and_then(|m| m.request_id.clone()) else {
            return self.say("No answer to rate.".yellow().to_string());
        };

        let outcome = self
            .session
            .submit_feedback(&request_id, rating, &comment)
            .await
            .map(|record| record.error.clone());
        match outcome {
            Ok(None) => self.say(
                format!("✅ Feedback submitted ({})", rating.label())
                    .green()
                    .to_string(),
            ),
            Ok(Some(error)) => self.say(error.red().to_string()),
            Err(e) => self.say(e.to_string().yellow().to_string()),
        }
    }

    /// Handle one line of input.
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match parse_command(line) {
            Command::Empty => {}
            Command::Quit => return Ok(Flow::Quit),
            Command::Help => self.print_help()?,
            Command::Examples => self.print_examples()?,
            Command::Question(question) => self.ask(question, false).await?,
            Command::AskExample(n) => match self.ui.example_questions.get(n - 1).cloned() {
                Some(question) => self.ask(question, true).await?,
                None => self.say(format!("No example question {n}.").yellow().to_string())?,
            },
            Command::AskSuggestion(n) => match self.latest_suggestion(n) {
                Some(question) => self.ask(question, true).await?,
                None => self.say(
                    format!("No suggestion {n} in the last answer.")
                        .yellow()
                        .to_string(),
                )?,
            },
            Command::Feedback {
                answer,
                rating,
                comment,
            } => self.feedback(answer, rating, comment).await?,
            Command::History => {
                if self.session.store().is_empty() {
                    self.say("No messages yet.".dimmed().to_string())?;
                }
                for index in 0..self.session.store().len() {
                    if let Some(message) = self.session.store().all().get(index) {
                        let stamp = history_stamp(message).dimmed().to_string();
                        self.say(stamp)?;
                    }
                    self.render_message(index).await?;
                }
            }
            Command::Raw(n) => match self.session.store().answer(n) {
                Some(message) => {
                    let raw = serde_json::to_string_pretty(&message.content).map_err(|e| {
                        AnalystError::Decode(format!("Failed to encode content: {e}"))
                    })?;
                    let request = format!(
                        "Request ID: {}",
                        message.request_id.as_deref().unwrap_or("-")
                    );
                    self.say(request)?;
                    self.say(raw)?;
                }
                None => self.say(format!("No answer {n}.").yellow().to_string())?,
            },
            Command::Clear => {
                self.session.reset();
                self.say("Started a new conversation.".dimmed().to_string())?;
            }
            Command::Invalid(message) => self.say(message.yellow().to_string())?,
        }
        Ok(Flow::Continue)
    }

    /// Read lines until end of input or `/quit`. One question is processed at
    /// a time; the next line is read only after the answer is rendered.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        self.print_header()?;
        let mut lines = input.lines();
        loop {
            let prompt = format!("{} ", format!("{} ›", self.ui.input_prompt).bold());
            write!(self.out, "{prompt}")?;
            self.out.flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            if self.handle_line(&line).await? == Flow::Quit {
                break;
            }
        }
        tracing::info!(
            session = %self.session.id(),
            messages = self.session.store().len(),
            "Session ended"
        );
        Ok(())
    }
}
