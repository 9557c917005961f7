use std::fmt;

/// Error types rooted in the tape machinery itself rather than the input.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InternalError {
    /// A scope-stack entry carried a return code the machine does not know.
    TapeError,
}

/// The kinds of errors the parser can produce.
#[derive(Debug)]
pub enum ErrorType {
    /// The host CPU lacks the instruction-set extensions stage 1 requires.
    UnsupportedCpu,
    /// The input ended inside a document.
    Eof,
    /// Generic grammar violation at a structural byte.
    Syntax,
    /// An object wanted a `"` key.
    ExpectedObjectKey,
    /// An object key was not followed by `:`.
    ExpectedObjectColon,
    /// An object member was not followed by `,` or `}`.
    ExpectedObjectCommaOrEnd,
    /// An array element was not followed by `,` or `]`.
    ExpectedArrayCommaOrEnd,
    /// Bytes remained after the root document.
    TrailingCharacters,
    /// A numeric literal violated the JSON number grammar.
    InvalidNumber,
    /// A number other than `0` started with a `0` digit.
    LeadingZero,
    /// `e`/`E` was not followed by at least one digit.
    InvalidExponent,
    /// The bytes at a `t` structural were not the `true` atom.
    TrueAtom,
    /// The bytes at an `f` structural were not the `false` atom.
    FalseAtom,
    /// The bytes at an `n` structural were not the `null` atom.
    NullAtom,
    /// A string literal ran past the end of the input.
    UnterminatedString,
    /// A `\` escape named a character JSON does not allow.
    InvalidEscape,
    /// A `\u` escape did not form a valid Unicode scalar value.
    InvalidUnicodeEscape,
    /// A high surrogate was not followed by a low surrogate (or vice versa).
    InvalidSurrogatePair,
    /// A raw control byte (< 0x20) appeared inside a string.
    ControlCharacterInString,
    /// The input was not valid UTF-8.
    InvalidUtf8,
    /// An internal invariant was violated.
    InternalError(InternalError),
    /// An I/O error from the streaming driver's reader.
    Io(std::io::Error),
    /// Clean end of a newline-delimited stream. Terminal, not a failure.
    EndOfInput,
}

impl PartialEq for ErrorType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::InternalError(a), Self::InternalError(b)) => a == b,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// A parse error: what went wrong, and where in the input it went wrong.
#[derive(Debug, PartialEq)]
pub struct Error {
    /// Byte offset of the structural character being handled.
    index: usize,
    /// The character at that offset.
    character: char,
    /// What kind of error occurred.
    error: ErrorType,
}

impl Error {
    pub(crate) fn new_c(index: usize, character: char, error: ErrorType) -> Self {
        Self {
            index,
            character,
            error,
        }
    }

    pub(crate) fn generic(error: ErrorType) -> Self {
        Self {
            index: 0,
            character: '💩',
            error,
        }
    }

    /// The kind of error that occurred.
    #[must_use]
    pub fn error_type(&self) -> &ErrorType {
        &self.error
    }

    /// Byte offset the error was detected at.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} at character {} ('{}')",
            self.error, self.index, self.character
        )
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::generic(ErrorType::Io(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
