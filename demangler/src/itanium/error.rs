//! Custom `Error` and `Result` types for the Itanium demangler.

use std::fmt;

/// Errors that can occur while demangling a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The mangled name was empty, or an output buffer was supplied without
    /// somewhere to report its length.
    InvalidArguments,

    /// The mangled symbol ends abruptly.
    UnexpectedEnd,

    /// The mangled symbol is not well-formed.
    UnexpectedText,

    /// Found a back reference that is out-of-bounds of the substitution
    /// table.
    BadBackReference,

    /// Found a reference to a template arg that is either out-of-bounds, or in
    /// a context without template args.
    BadTemplateArgReference,

    /// A template parameter was referenced before its argument list and the
    /// argument list never showed up.
    UnresolvedForwardReference,

    /// The same node was about to be registered twice as a substitution
    /// candidate.
    DuplicateSubstitution,

    /// An overflow would occur when parsing an integer in a mangled symbol.
    Overflow,

    /// Encountered too much recursion when demangling symbol.
    TooMuchRecursion,

    /// The mangled symbol, or its demangled form, exceeds the configured
    /// length limit.
    TooLong,

    /// The output buffer could not be allocated.
    AllocationFailure,
}

/// Coarse outcome classes reported to callers that only care why a name was
/// not demangled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    InvalidArguments,
    InvalidMangledName,
    AllocationFailure,
}

impl Error {
    pub fn status(&self) -> Status {
        match *self {
            Error::InvalidArguments => Status::InvalidArguments,
            Error::AllocationFailure => Status::AllocationFailure,
            Error::UnexpectedEnd
            | Error::UnexpectedText
            | Error::BadBackReference
            | Error::BadTemplateArgReference
            | Error::UnresolvedForwardReference
            | Error::DuplicateSubstitution
            | Error::Overflow
            | Error::TooMuchRecursion
            | Error::TooLong => Status::InvalidMangledName,
        }
    }
}

#[test]
fn size_of_error() {
    assert_eq!(
        std::mem::size_of::<Error>(),
        1,
        "We should keep the size of our Error type in check"
    );
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidArguments => write!(f, "empty mangled name or missing length slot"),
            Error::UnexpectedEnd => write!(f, "mangled symbol ends abruptly"),
            Error::UnexpectedText => write!(f, "mangled symbol is not well-formed"),
            Error::BadBackReference => {
                write!(
                    f,
                    "back reference that is out-of-bounds of the substitution table"
                )
            }
            Error::BadTemplateArgReference => write!(
                f,
                "reference to a template arg that is either out-of-bounds, or in a context \
                 without template args"
            ),
            Error::UnresolvedForwardReference => {
                write!(f, "forward template arg reference was never resolved")
            }
            Error::DuplicateSubstitution => {
                write!(f, "node registered twice in the substitution table")
            }
            Error::Overflow => write!(
                f,
                "an overflow would occur when parsing an integer in a mangled symbol"
            ),
            Error::TooMuchRecursion => {
                write!(f, "encountered too much recursion when demangling symbol")
            }
            Error::TooLong => write!(f, "symbol exceeds the configured length limit"),
            Error::AllocationFailure => write!(f, "failed to allocate the output buffer"),
        }
    }
}

impl std::error::Error for Error {}

/// A demangling result of `T` or an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
