//! Line-oriented operator I/O.

use std::io::{BufRead, Write};

use tabled::{settings::Style, Table, Tabled};

use crate::error::{Error, Result};

/// A parsed menu selection.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MenuChoice {
    Back,
    Quit,
    /// Zero-based index into the listed entries.
    Index(usize),
}

/// Parse a 1-based selection among `max` entries.
pub fn parse_choice(input: &str, max: usize) -> Result<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n - 1),
        _ => Err(Error::InvalidChoice),
    }
}

/// `b`/`B` and `q`/`Q` are reserved; anything else must be an index.
pub fn parse_menu_choice(input: &str, max: usize) -> Result<MenuChoice> {
    match input.trim() {
        "b" | "B" => Ok(MenuChoice::Back),
        "q" | "Q" => Ok(MenuChoice::Quit),
        other => parse_choice(other, max).map(MenuChoice::Index),
    }
}

pub trait Console {
    /// Next input line, trimmed. End of input is `Error::InputClosed`.
    fn read_line(&mut self) -> Result<String>;

    fn write_str(&mut self, text: &str) -> Result<()>;

    fn println(&mut self, text: &str) -> Result<()> {
        self.write_str(text)?;
        self.write_str("\n")
    }

    /// Print `label` without a newline and read the answer.
    fn prompt(&mut self, label: &str) -> Result<String> {
        self.write_str(label)?;
        self.read_line()
    }

    fn read_menu_choice(&mut self, max: usize) -> Result<MenuChoice> {
        let line = self.read_line()?;
        parse_menu_choice(&line, max)
    }

    /// Integer answer; an empty line picks `default`.
    fn prompt_u64(&mut self, label: &str, default: u64) -> Result<u64> {
        let line = self.prompt(label)?;
        if line.is_empty() {
            return Ok(default);
        }
        line.parse().map_err(|_| Error::InvalidInput)
    }

    fn print_table<T: Tabled>(&mut self, rows: Vec<T>) -> Result<()> {
        let mut table = Table::new(rows);
        table.with(Style::blank());
        self.println(&table.to_string())
    }
}

/// Console over any reader/writer pair; stdin/stdout in the binary,
/// in-memory buffers in tests.
pub struct LineConsole<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Console for LineConsole<R, W> {
    fn read_line(&mut self) -> Result<String> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::InputClosed);
        }
        Ok(line.trim().to_string())
    }

    fn write_str(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes())?;
        Ok(())
    }
}
