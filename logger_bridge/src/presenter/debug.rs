//! Plain text presenter

use super::{ErrorPresenter, PresentedError};
use crate::config::constants;
use crate::environment::Environment;
use crate::error::PresentError;
use crate::sync::lock;
use std::io::{self, Stderr, Write};
use std::sync::{Mutex, PoisonError};

/// Writes one plain line per error
pub struct DebugPresenter<W: Write + Send = Stderr> {
    output: Mutex<W>,
}

impl DebugPresenter<Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl Default for DebugPresenter<Stderr> {
    fn default() -> Self {
        Self::stderr()
    }
}

impl<W: Write + Send> DebugPresenter<W> {
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

impl<W: Write + Send> ErrorPresenter for DebugPresenter<W> {
    fn present(
        &self,
        error: &PresentedError,
        environment: &dyn Environment,
    ) -> Result<(), PresentError> {
        let mut output = lock(&self.output);

        if environment.is_live() {
            writeln!(output, "{}", constants::FRIENDLY_ERROR_MESSAGE)?;
        } else {
            writeln!(
                output,
                "{}: {} in {} on line {} [{} {}]",
                error.label,
                error.message,
                if error.file.is_empty() { "unknown file" } else { error.file.as_str() },
                error.line,
                error.code.title(),
                error.code
            )?;
        }

        output.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::ErrorCode;
    use crate::environment::StaticEnvironment;

    fn sample() -> PresentedError {
        PresentedError::new(
            ErrorCode::USER_WARNING,
            "disk almost full",
            "storage.rs",
            42,
            "Warning",
        )
    }

    #[test]
    fn test_detail_when_not_live() {
        let presenter = DebugPresenter::new(Vec::new());
        presenter.present(&sample(), &StaticEnvironment::dev()).unwrap();

        let output = String::from_utf8(presenter.into_output()).unwrap();
        assert_eq!(
            output,
            "Warning: disk almost full in storage.rs on line 42 [User warning 512]\n"
        );
    }

    #[test]
    fn test_friendly_when_live() {
        let presenter = DebugPresenter::new(Vec::new());
        presenter.present(&sample(), &StaticEnvironment::live()).unwrap();

        let output = String::from_utf8(presenter.into_output()).unwrap();
        assert!(output.contains(constants::FRIENDLY_ERROR_MESSAGE));
        assert!(!output.contains("disk almost full"));
        assert!(!output.contains("storage.rs"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_surfaces() {
        let presenter = DebugPresenter::new(BrokenPipe);
        let result = presenter.present(&sample(), &StaticEnvironment::dev());
        assert!(matches!(result, Err(PresentError::Io(_))));
    }
}
