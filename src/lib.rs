//! Symbol table demangling for Mach-O images.
//!
//! [`Symbols::parse`] reads the raw `nlist` entries of a thin or universal
//! image, [`demangle_all`] turns each of them into its display name and
//! [`analyze`] summarizes a table.

use std::borrow::Cow;
use std::fmt;

use config::Config;
use demangler::Demangler;
use rustc_hash::FxHashMap;

pub mod helper;
pub mod macho;

pub use macho::Symbols;

bitflags::bitflags! {
    /// Bit fields of an `nlist` entry's `n_type`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NlistFlags: u8 {
        /// Any of these bits set means the entry is a debugger stab.
        const STAB = 0xe0;
        /// Private external.
        const PEXT = 0x10;
        /// Mask for the symbol kind.
        const TYPE = 0x0e;
        /// External.
        const EXT = 0x01;
    }
}

/// One entry of a symbol table, as stored in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSymbolRecord<'data> {
    pub name: &'data str,
    /// Raw `n_type` byte.
    pub type_code: u8,
    pub address: u64,
}

impl RawSymbolRecord<'_> {
    pub fn flags(&self) -> NlistFlags {
        NlistFlags::from_bits_retain(self.type_code)
    }

    pub fn is_stab(&self) -> bool {
        self.flags().intersects(NlistFlags::STAB)
    }

    pub fn is_external(&self) -> bool {
        !self.is_stab() && self.flags().contains(NlistFlags::EXT)
    }
}

#[derive(Debug)]
pub enum Error {
    Object(object::Error),
    UnsupportedFormat(object::FileKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Object(err) => write!(f, "failed to parse object: {err}"),
            Error::UnsupportedFormat(kind) => write!(f, "unsupported binary format: {kind:?}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<object::Error> for Error {
    fn from(err: object::Error) -> Self {
        Error::Object(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Display name of a single record.
pub fn demangle_symbol<'data>(
    demangler: &mut Demangler,
    record: &RawSymbolRecord<'data>,
) -> Cow<'data, str> {
    demangler::demangle_symbol(demangler, record.name, record.type_code)
}

/// Display names of `records` in order, using the process-wide configuration.
pub fn demangle_all(records: &[RawSymbolRecord]) -> Vec<String> {
    demangle_all_with(records, &config::CONFIG)
}

pub fn demangle_all_with(records: &[RawSymbolRecord], config: &Config) -> Vec<String> {
    let options = config.demangler.options();
    let mut names = Vec::new();

    let workers = helper::parallel_compute(
        records,
        &mut names,
        config.pipeline.worker_threads,
        config.pipeline.parallel_threshold,
        || Demangler::with_options(options),
        |demangler, record| demangle_symbol(demangler, record).into_owned(),
    );

    let rewritten = records.iter().zip(&names).filter(|(r, name)| r.name != name.as_str()).count();
    log::notify!(
        "[machsym::demangle_all] Rewrote {rewritten} of {} symbols on {workers} thread(s).",
        records.len()
    );

    names
}

/// Summary of a symbol table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub symbols: usize,
    pub external: usize,
    pub stabs: usize,
    /// Records whose name is a valid mangled encoding.
    pub demangled: usize,
    /// Occurrences of every raw `n_type` seen.
    pub type_codes: FxHashMap<u8, usize>,
}

pub fn analyze(records: &[RawSymbolRecord]) -> Analysis {
    analyze_with(records, &config::CONFIG)
}

pub fn analyze_with(records: &[RawSymbolRecord], config: &Config) -> Analysis {
    let options = config.demangler.options();
    let mut demangled = Vec::new();

    helper::parallel_compute(
        records,
        &mut demangled,
        config.pipeline.worker_threads,
        config.pipeline.parallel_threshold,
        || Demangler::with_options(options),
        |demangler, record| {
            demangler::try_demangle_symbol(demangler, record.name, record.type_code).is_ok()
        },
    );

    let mut analysis = Analysis {
        symbols: records.len(),
        demangled: demangled.iter().filter(|&&ok| ok).count(),
        ..Analysis::default()
    };

    for record in records {
        analysis.external += record.is_external() as usize;
        analysis.stabs += record.is_stab() as usize;
        *analysis.type_codes.entry(record.type_code).or_insert(0) += 1;
    }

    log::notify!(
        "[machsym::analyze] {} symbols, {} external, {} demangled, {} distinct types.",
        analysis.symbols,
        analysis.external,
        analysis.demangled,
        analysis.type_codes.len()
    );

    analysis
}

#[cfg(test)]
mod tests {
    use super::macho::testdata::image;
    use super::*;

    fn record(name: &str, type_code: u8) -> RawSymbolRecord {
        RawSymbolRecord { name, type_code, address: 0 }
    }

    fn config(worker_threads: usize, parallel_threshold: usize) -> Config {
        let mut config = Config::default();
        config.pipeline.worker_threads = worker_threads;
        config.pipeline.parallel_threshold = parallel_threshold;
        config
    }

    #[test]
    fn flags() {
        let sect_ext = record("_main", 0x0f);
        assert!(sect_ext.is_external());
        assert!(!sect_ext.is_stab());
        assert_eq!(sect_ext.flags() & NlistFlags::TYPE, NlistFlags::TYPE);

        let gsym = record("_ZSt4cout:G", 0x20);
        assert!(gsym.is_stab());
        assert!(!gsym.is_external());

        let private = record("_helper", 0x1e);
        assert!(private.flags().contains(NlistFlags::PEXT));
        assert!(!private.is_external());
    }

    #[test]
    fn single_records() {
        let mut demangler = Demangler::new();

        assert_eq!(demangle_symbol(&mut demangler, &record("_Z3fooi", 0x0f)), "foo(int)");
        assert_eq!(demangle_symbol(&mut demangler, &record("_ZSt4cout:G", 0x20)), "std::cout");
        assert_eq!(demangle_symbol(&mut demangler, &record("_Z3fooi", 0x64)), "_Z3fooi");
        assert!(matches!(
            demangle_symbol(&mut demangler, &record("_main", 0x0f)),
            Cow::Borrowed("_main")
        ));
    }

    #[test]
    fn image_to_display_names() {
        let data = image(
            true,
            &[
                (b"_Z3fooi", 0x0f, 0x1000),
                (b"_ZSt4cout:G", 0x20, 0),
                (b"_GLOBAL__I__Z3barv", 0x0e, 0x1100),
                (b"_Z3bazv:F", 0x24, 0x1200),
                (b"_ZTV1A:V", 0x28, 0),
                (b"_main", 0x0f, 0x2000),
                (b"_Z3foo", 0x0f, 0x3000),
                (b"_Z3fooi", 0x64, 0),
            ],
        );
        let symbols = Symbols::parse(&data).unwrap();

        assert_eq!(
            demangle_all_with(symbols.records(), &config(1, 512)),
            [
                "foo(int)",
                "std::cout",
                "bar()",
                "baz()",
                "vtable for A",
                "_main",
                "_Z3foo",
                "_Z3fooi",
            ]
        );
    }

    #[test]
    fn parallel_batches_match_sequential() {
        let names: Vec<String> = (0..2_000)
            .map(|n| match n % 4 {
                0 => format!("_Z{}f{n}v", 1 + n.to_string().len()),
                1 => "_ZNSt6vectorIiSaIiEE9push_backERKi".to_string(),
                2 => format!("_sym{n}"),
                _ => "_Z1fS5_".to_string(),
            })
            .collect();
        let records: Vec<RawSymbolRecord> = names.iter().map(|n| record(n, 0x0f)).collect();

        let sequential = demangle_all_with(&records, &config(1, 512));
        let parallel = demangle_all_with(&records, &config(4, 0));

        assert_eq!(sequential, parallel);
        assert_eq!(sequential[0], "f0()");
        assert_eq!(sequential[1], "std::vector<int, std::allocator<int> >::push_back(int const&)");
        assert_eq!(sequential[2], "_sym2");
        assert_eq!(sequential[3], "_Z1fS5_");
    }

    #[test]
    fn analysis_counts() {
        let records = [
            record("_Z3fooi", 0x0f),
            record("_ZSt4cout:G", 0x20),
            record("_main", 0x0f),
            record("_Z3foo", 0x0e),
            record("_Z3fooi", 0x64),
            record("_start", 0x01),
        ];

        let analysis = analyze_with(&records, &config(1, 512));

        assert_eq!(analysis.symbols, 6);
        assert_eq!(analysis.external, 3);
        assert_eq!(analysis.stabs, 2);
        assert_eq!(analysis.demangled, 2);
        assert_eq!(analysis.type_codes.len(), 5);
        assert_eq!(analysis.type_codes[&0x0f], 2);
        assert_eq!(analysis.type_codes.get(&0x02), None);
    }

    #[test]
    fn empty_tables() {
        assert!(demangle_all_with(&[], &Config::default()).is_empty());
        assert_eq!(analyze_with(&[], &Config::default()), Analysis::default());
    }
}
