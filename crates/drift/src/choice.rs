//! Create-vs-rename decisions.
//!
//! When an object exists only in code and another of the same kind exists
//! only in the database, drift cannot tell a rename from a drop followed by a
//! create. A [`Disambiguate`] strategy answers the question.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, Write};

use owo_colors::OwoColorize;

/// Kind of object a choice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Schema,
    Enum,
    Domain,
    Table,
    Column,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Schema => write!(f, "schema"),
            ObjectKind::Enum => write!(f, "enum"),
            ObjectKind::Domain => write!(f, "domain"),
            ObjectKind::Table => write!(f, "table"),
            ObjectKind::Column => write!(f, "column"),
        }
    }
}

/// Answer to a create-vs-rename question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Create,
    /// Rename from the candidate at this position.
    RenameFrom(usize),
}

/// Why no answer came back.
#[derive(Debug, thiserror::Error)]
pub enum Abort {
    /// No answer can or will be given.
    #[error("no answer given")]
    Declined,
    #[error("could not ask: {0}")]
    Io(#[from] std::io::Error),
}

/// A strategy for the questions drift cannot answer alone.
pub trait Disambiguate: Send {
    /// `name` exists only in code; `candidates` exist only in the database.
    fn choose(&mut self, kind: ObjectKind, name: &str, candidates: &[String])
    -> Result<Choice, Abort>;

    /// No cast turns `from` into `to`: may the column be dropped and added
    /// again, losing its data?
    fn confirm_recreate(
        &mut self,
        table: &str,
        column: &str,
        from: &str,
        to: &str,
    ) -> Result<(), Abort>;
}

/// Never answers. Used when nobody is there to ask, e.g. during verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl Disambiguate for NonInteractive {
    fn choose(&mut self, kind: ObjectKind, name: &str, _: &[String]) -> Result<Choice, Abort> {
        tracing::debug!(%kind, name, "refusing to choose without a human");
        Err(Abort::Declined)
    }

    fn confirm_recreate(&mut self, table: &str, column: &str, _: &str, _: &str) -> Result<(), Abort> {
        tracing::debug!(table, column, "refusing to recreate without a human");
        Err(Abort::Declined)
    }
}

/// A pre-recorded answer for [`Scripted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Create,
    /// Rename from the candidate with this name.
    RenameFrom(String),
    Recreate,
    Abort,
}

/// Replays recorded answers in order. Aborts once they run out.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    answers: VecDeque<Answer>,
}

impl Scripted {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    /// Whether every recorded answer was consumed.
    pub fn is_exhausted(&self) -> bool {
        self.answers.is_empty()
    }
}

impl Disambiguate for Scripted {
    fn choose(&mut self, _: ObjectKind, _: &str, candidates: &[String]) -> Result<Choice, Abort> {
        match self.answers.pop_front() {
            Some(Answer::Create) => Ok(Choice::Create),
            Some(Answer::RenameFrom(from)) => candidates
                .iter()
                .position(|c| *c == from)
                .map(Choice::RenameFrom)
                .ok_or(Abort::Declined),
            _ => Err(Abort::Declined),
        }
    }

    fn confirm_recreate(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<(), Abort> {
        match self.answers.pop_front() {
            Some(Answer::Recreate) => Ok(()),
            _ => Err(Abort::Declined),
        }
    }
}

/// Asks on the terminal with a numbered menu.
pub struct Interactive<R, W> {
    input: R,
    output: W,
}

impl Interactive<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    /// Read answers from stdin, print questions to stderr.
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> Interactive<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// `None` at end of input.
    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead + Send, W: Write + Send> Disambiguate for Interactive<R, W> {
    fn choose(
        &mut self,
        kind: ObjectKind,
        name: &str,
        candidates: &[String],
    ) -> Result<Choice, Abort> {
        loop {
            writeln!(
                self.output,
                "{} {} {} is new in code. Is it created, or renamed from an existing {kind}?",
                "?".yellow().bold(),
                kind,
                name.bold()
            )?;
            writeln!(self.output, "  {} create {}", "0)".cyan(), name)?;
            for (i, candidate) in candidates.iter().enumerate() {
                writeln!(
                    self.output,
                    "  {} rename {} {} {}",
                    format!("{})", i + 1).cyan(),
                    candidate.dimmed(),
                    "->".dimmed(),
                    name
                )?;
            }
            write!(self.output, "{} ", ">".cyan())?;
            self.output.flush()?;

            let line = self.read_line()?.ok_or(Abort::Declined)?;
            if line.eq_ignore_ascii_case("q") {
                return Err(Abort::Declined);
            }
            match line.parse::<usize>() {
                Ok(0) => return Ok(Choice::Create),
                Ok(n) if n <= candidates.len() => return Ok(Choice::RenameFrom(n - 1)),
                _ => {
                    let hint = "Pick a number from the list, or q to abort.";
                    writeln!(self.output, "{}", hint.red())?;
                }
            }
        }
    }

    fn confirm_recreate(
        &mut self,
        table: &str,
        column: &str,
        from: &str,
        to: &str,
    ) -> Result<(), Abort> {
        writeln!(
            self.output,
            "{} {}.{} cannot be cast from {} to {}.",
            "!".red().bold(),
            table,
            column.bold(),
            from,
            to
        )?;
        write!(
            self.output,
            "Drop and recreate it? All data in the column is lost. [y/N] "
        )?;
        self.output.flush()?;

        match self.read_line()? {
            Some(answer) if answer.eq_ignore_ascii_case("y") => Ok(()),
            _ => Err(Abort::Declined),
        }
    }
}
