//! Framed report presenter

use super::{ErrorPresenter, PresentedError};
use crate::config::constants;
use crate::environment::Environment;
use crate::error::PresentError;
use crate::sync::lock;
use std::io::{self, Stderr, Write};
use std::sync::{Mutex, PoisonError};

const INNER_WIDTH: usize = 64;

/// Writes a boxed report with the backtrace below it
pub struct PrettyPresenter<W: Write + Send = Stderr> {
    output: Mutex<W>,
}

impl PrettyPresenter<Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> PrettyPresenter<W> {
    pub fn new(output: W) -> Self {
        Self {
            output: Mutex::new(output),
        }
    }

    pub fn into_output(self) -> W {
        self.output
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn rule(left: char, right: char) -> String {
    format!("{}{}{}", left, "═".repeat(INNER_WIDTH), right)
}

fn row(text: &str) -> String {
    // long values overflow the frame rather than being cut
    format!("║ {:<width$} ║", text, width = INNER_WIDTH - 2)
}

fn render_report(error: &PresentedError) -> Vec<String> {
    let mut lines = vec![
        rule('╔', '╗'),
        row(&format!("{} ({})", error.label.to_uppercase(), error.code.title())),
        rule('╠', '╣'),
        row(&format!("Location: {}", error.location())),
        row(&format!("Message:  {}", error.message)),
        row(&format!("Code:     {}", error.code)),
    ];

    if !error.trace.is_empty() {
        lines.push(rule('╠', '╣'));
        lines.push(row("Backtrace:"));
        lines.push(rule('╚', '╝'));
        for (index, frame) in error.trace.iter().enumerate() {
            lines.push(format!("{:>4}: {}", index, frame.qualified_name()));
            if let (Some(file), Some(line)) = (&frame.file, frame.line) {
                lines.push(format!("          at {}:{}", file, line));
            }
        }
    } else {
        lines.push(rule('╚', '╝'));
    }

    lines
}

fn render_friendly() -> Vec<String> {
    vec![
        rule('╔', '╗'),
        row("Something went wrong"),
        rule('╠', '╣'),
        row(constants::FRIENDLY_ERROR_MESSAGE),
        rule('╚', '╝'),
    ]
}

impl<W: Write + Send> ErrorPresenter for PrettyPresenter<W> {
    fn present(
        &self,
        error: &PresentedError,
        environment: &dyn Environment,
    ) -> Result<(), PresentError> {
        let lines = if environment.is_live() {
            render_friendly()
        } else {
            render_report(error)
        };

        let mut output = lock(&self.output);
        for line in lines {
            writeln!(output, "{}", line)?;
        }
        output.flush()?;
        Ok(())
    }
}
