use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::result::ZipError;

use crate::value::ParseError;

/// `sysexits.h` codes reported by the CLI.
pub const EX_USAGE:   u8 = 64;
pub const EX_DATAERR: u8 = 65;
pub const EX_IOERR:   u8 = 74;

/// Everything that can abort a determinizer run.  All variants are fatal.
#[derive(Error, Debug)]
pub enum DeterminizeError {
    #[error("invalid arguments: {0}")]
    Argument(String),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archive error on {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("I/O error while copying entry {entry}: {source}")]
    Entry {
        entry: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed payload in entry {entry}: {source}")]
    Parse {
        entry: String,
        #[source]
        source: ParseError,
    },
}

impl DeterminizeError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        DeterminizeError::Io { path: path.to_owned(), source }
    }

    pub(crate) fn archive(path: &Path, source: ZipError) -> Self {
        DeterminizeError::Archive { path: path.to_owned(), source }
    }

    pub(crate) fn entry(entry: &str, source: io::Error) -> Self {
        DeterminizeError::Entry { entry: entry.to_owned(), source }
    }

    pub(crate) fn parse(entry: &str, source: ParseError) -> Self {
        DeterminizeError::Parse { entry: entry.to_owned(), source }
    }

    /// Process exit status for this failure.  Success is always 0.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeterminizeError::Argument(_) => EX_USAGE,
            DeterminizeError::Io { .. }
            | DeterminizeError::Archive { .. }
            | DeterminizeError::Entry { .. } => EX_IOERR,
            DeterminizeError::Parse { .. } => EX_DATAERR,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, DeterminizeError::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_class() {
        let io = DeterminizeError::io(Path::new("in.jar"), io::Error::from(io::ErrorKind::NotFound));
        let parse = DeterminizeError::parse("a.refmap.json", ParseError::NotAnObject("array"));
        let arg = DeterminizeError::Argument("expected 2 arguments".into());

        assert_eq!(io.exit_code(), EX_IOERR);
        assert_eq!(parse.exit_code(), EX_DATAERR);
        assert_eq!(arg.exit_code(), EX_USAGE);
        assert!(parse.is_parse());
        assert!(!io.is_parse());
    }

    #[test]
    fn messages_name_the_culprit() {
        let io = DeterminizeError::io(Path::new("build/libs/app.jar"), io::Error::from(io::ErrorKind::NotFound));
        assert!(io.to_string().contains("build/libs/app.jar"));

        let parse = DeterminizeError::parse("mixins.refmap.json", ParseError::NotAnObject("string"));
        let msg = parse.to_string();
        assert!(msg.contains("mixins.refmap.json"));
        assert!(msg.contains("string"));
    }
}
