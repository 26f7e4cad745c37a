//! Itanium C++ ABI demangler.
//!
//! A [`Demangler`] owns everything a single parse needs (node arena,
//! substitution table, forward template references) and reuses it across
//! calls. It is not shared between threads; give every worker its own.

mod arena;
mod ast;
mod error;
mod index_str;
mod parse;
mod render;
mod subs;
mod tests;

pub use error::{Error, Result, Status};

use parse::{ParseContext, Parser, Workspace};
use render::Renderer;

/// Limits applied to every call of a [`Demangler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Nesting limit for parse routines and for rendering.
    pub max_recursion: u32,
    /// Longer inputs are rejected with [`Error::TooLong`] before parsing.
    pub max_symbol_len: usize,
    /// Longer demangled forms are rejected with [`Error::TooLong`].
    pub max_output_len: usize,
    /// Trace every rejected name and the reason to the log.
    pub trace_failures: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_recursion: 128,
            max_symbol_len: 64 * 1024,
            max_output_len: 1024 * 1024,
            trace_failures: false,
        }
    }
}

/// Whether `name` begins with one to four underscores followed by `Z`.
pub fn is_itanium_encoding(name: &str) -> bool {
    let underscores = name.bytes().take_while(|&b| b == b'_').count();
    (1..=4).contains(&underscores) && name.as_bytes().get(underscores) == Some(&b'Z')
}

#[derive(Debug)]
pub struct Demangler {
    ctx: ParseContext,
    ws: Workspace,
    options: Options,
}

impl Default for Demangler {
    fn default() -> Self {
        Self::new()
    }
}

impl Demangler {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            ctx: ParseContext::new(options.max_recursion),
            ws: Workspace::default(),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Demangle `mangled` into a new string.
    pub fn demangle(&mut self, mangled: &str) -> Result<String> {
        let mut buf = String::new();
        let mut len = 0;
        self.demangle_to(mangled, Some(&mut buf), Some(&mut len))?;
        Ok(buf)
    }

    /// Demangle `mangled`, replacing the contents of `buf` with the result and
    /// storing its length in `len`.
    ///
    /// Either output may be omitted, except that a buffer must come with
    /// somewhere to report its length. Per-call storage is reset before
    /// returning, whatever the outcome.
    pub fn demangle_to(
        &mut self,
        mangled: &str,
        buf: Option<&mut String>,
        len: Option<&mut usize>,
    ) -> Result<()> {
        if mangled.is_empty() || (buf.is_some() && len.is_none()) {
            return Err(Error::InvalidArguments);
        }

        if mangled.len() > self.options.max_symbol_len {
            return Err(Error::TooLong);
        }

        let result = self.parse_and_render(mangled.as_bytes());
        self.reset();
        let out = result?;

        if let Some(len) = len {
            *len = out.len();
        }

        if let Some(buf) = buf {
            buf.clear();
            buf.try_reserve(out.len())
                .map_err(|_| Error::AllocationFailure)?;
            buf.push_str(&out);
        }

        Ok(())
    }

    /// Drop every node and table entry from the last call, keeping a bounded
    /// amount of capacity for the next one.
    pub fn reset(&mut self) {
        self.ws.reset();
    }

    fn parse_and_render(&mut self, input: &[u8]) -> Result<String> {
        let root = Parser::new(input, &self.ctx, &mut self.ws).parse()?;

        let mut out = Vec::new();
        out.try_reserve(input.len() * 2)
            .map_err(|_| Error::AllocationFailure)?;

        Renderer::new(
            input,
            &self.ws.arena,
            &mut out,
            self.options.max_recursion,
            self.options.max_output_len,
        )
        .print(root)?;

        if out.len() > self.options.max_output_len {
            return Err(Error::TooLong);
        }

        // source names are sliced by byte length, which may split a character
        Ok(match String::from_utf8(out) {
            Ok(out) => out,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }
}
