//! Symbol demangler for Itanium C++ ABI names found in symbol tables.
//!
//! Demangling never fails the caller: a name that isn't a mangled encoding,
//! or that doesn't parse, comes back as it went in. The `try_` variants say
//! why a name was left alone.

use std::borrow::Cow;
use std::fmt;

pub mod itanium;
pub mod normalize;

pub use itanium::{Demangler, Error, Options, Status};
pub use normalize::normalize;

/// Symbols with a raw type code above this are never rewritten.
pub const MAX_ELIGIBLE_TYPE_CODE: u8 = 40;

/// Why a name was returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declined {
    /// The name doesn't start with the Itanium `_Z` marker.
    NotMangledEncoding,
    /// The name has the marker but doesn't parse.
    InvalidMangledName(Error),
    /// The symbol's raw type code excludes it from demangling.
    NotEligible,
}

impl fmt::Display for Declined {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Declined::NotMangledEncoding => f.write_str("not a mangled encoding"),
            Declined::InvalidMangledName(err) => write!(f, "invalid mangled name: {err}"),
            Declined::NotEligible => f.write_str("symbol type is not eligible"),
        }
    }
}

impl std::error::Error for Declined {}

/// Demangle `candidate`, or say why it was left alone.
pub fn try_demangle(demangler: &mut Demangler, candidate: &str) -> Result<String, Declined> {
    if !itanium::is_itanium_encoding(candidate) {
        return Err(Declined::NotMangledEncoding);
    }

    let err = match demangler.demangle(candidate) {
        Ok(demangled) => return Ok(demangled),
        Err(err) => err,
    };

    if err.status() == Status::AllocationFailure {
        log::strong!("[demangler] out of memory while demangling '{candidate}'");
        std::process::abort();
    }

    if demangler.options().trace_failures {
        log::trace!("[demangler] declined '{candidate}': {err}");
    }

    Err(Declined::InvalidMangledName(err))
}

/// Demangle `candidate`, returning it unchanged when it can't be.
pub fn demangle<'a>(demangler: &mut Demangler, candidate: &'a str) -> Cow<'a, str> {
    match try_demangle(demangler, candidate) {
        Ok(demangled) => Cow::Owned(demangled),
        Err(_) => Cow::Borrowed(candidate),
    }
}

/// Normalize a raw symbol table name according to its type code, then
/// demangle it.
pub fn try_demangle_symbol(
    demangler: &mut Demangler,
    name: &str,
    type_code: u8,
) -> Result<String, Declined> {
    if type_code > MAX_ELIGIBLE_TYPE_CODE {
        return Err(Declined::NotEligible);
    }

    try_demangle(demangler, normalize(name, type_code))
}

/// Like [`try_demangle_symbol`], falling back to the normalized name, or the
/// raw name for ineligible symbols.
pub fn demangle_symbol<'a>(demangler: &mut Demangler, name: &'a str, type_code: u8) -> Cow<'a, str> {
    if type_code > MAX_ELIGIBLE_TYPE_CODE {
        return Cow::Borrowed(name);
    }

    demangle(demangler, normalize(name, type_code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{N_FUN, N_GSYM, N_SECT};

    #[test]
    fn declines_plain_names() {
        let mut demangler = Demangler::new();

        assert_eq!(demangle(&mut demangler, "main"), "main");
        assert_eq!(demangle(&mut demangler, "_main"), "_main");
        assert_eq!(demangle(&mut demangler, ""), "");
        assert_eq!(demangle(&mut demangler, "foo(int)"), "foo(int)");
        assert_eq!(
            try_demangle(&mut demangler, "_____Z3fooi"),
            Err(Declined::NotMangledEncoding)
        );
    }

    #[test]
    fn declines_broken_encodings() {
        let mut demangler = Demangler::new();

        assert_eq!(demangle(&mut demangler, "_Z3foo"), "_Z3foo");
        assert_eq!(demangle(&mut demangler, "_Z1fS5_"), "_Z1fS5_");
        assert_eq!(
            try_demangle(&mut demangler, "_Z1fS5_"),
            Err(Declined::InvalidMangledName(Error::BadBackReference))
        );
    }

    #[test]
    fn demangles_encodings() {
        let mut demangler = Demangler::new();

        assert_eq!(demangle(&mut demangler, "_Z3fooi"), "foo(int)");
        assert_eq!(demangle(&mut demangler, "__Z3fooi"), "foo(int)");
        assert!(matches!(demangle(&mut demangler, "_Z3fooi"), Cow::Owned(_)));
    }

    #[test]
    fn symbols_are_normalized_first() {
        let mut demangler = Demangler::new();

        assert_eq!(demangle_symbol(&mut demangler, "_ZSt4cout:G", N_GSYM), "std::cout");
        assert_eq!(demangle_symbol(&mut demangler, "_Z3foov:F", N_FUN), "foo()");
        assert_eq!(
            demangle_symbol(&mut demangler, "_GLOBAL__I__Z3foov", N_SECT),
            "foo()"
        );

        // a declined name still loses its decoration
        assert_eq!(demangle_symbol(&mut demangler, "counter:G", N_GSYM), "counter");
    }

    #[test]
    fn ineligible_symbols_pass_through() {
        let mut demangler = Demangler::new();

        assert_eq!(demangle_symbol(&mut demangler, "_Z3fooi", 41), "_Z3fooi");
        assert_eq!(
            try_demangle_symbol(&mut demangler, "_Z3fooi", 0xff),
            Err(Declined::NotEligible)
        );
        assert_eq!(demangle_symbol(&mut demangler, "_Z3fooi", 0x0f), "foo(int)");
    }
}
