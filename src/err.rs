//! Error handling utilities shared across the crate.
//!
//! Every user-facing error in this crate ([`LexErr`], [`AsmErr`], [`SimErr`], etc.)
//! implements the [`Error`] trait, which extends [`std::error::Error`]
//! with an optional help message describing how the error could be resolved.
//!
//! [`LexErr`]: crate::parse::lex::LexErr
//! [`AsmErr`]: crate::asm::AsmErr
//! [`SimErr`]: crate::sim::SimErr

use std::borrow::Cow;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// The source line (1-indexed) this error is associated with, if any.
    fn line(&self) -> Option<usize> {
        None
    }

    /// A hint on how the user could fix this error, if one applies.
    fn help(&self) -> Option<Cow<str>> {
        None
    }
}

/// Formats an error (and its help message, if present) into a
/// human-readable report, suitable for printing to stderr.
pub fn report(err: &dyn Error) -> String {
    let mut out = match err.line() {
        Some(line) => format!("error (line {line}): {err}"),
        None => format!("error: {err}"),
    };
    if let Some(help) = err.help() {
        out.push_str("\n  help: ");
        out.push_str(&help);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{report, Error};

    #[derive(Debug)]
    struct Oops;
    impl std::fmt::Display for Oops {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("something broke")
        }
    }
    impl std::error::Error for Oops {}
    impl Error for Oops {
        fn line(&self) -> Option<usize> {
            Some(3)
        }
        fn help(&self) -> Option<std::borrow::Cow<str>> {
            Some("don't".into())
        }
    }

    #[test]
    fn test_report() {
        assert_eq!(report(&Oops), "error (line 3): something broke\n  help: don't");
    }
}
