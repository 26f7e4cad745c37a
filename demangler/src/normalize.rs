//! Stripping of compiler-generated decorations from Mach-O symbol names.
//!
//! Which decoration may be present depends on the symbol's raw `n_type` code.
//! Stab entries carry a `:<letter>` descriptor after the name, and static
//! initializer and finalizer routines carry a `_GLOBAL__` prefix.

use super::MAX_ELIGIBLE_TYPE_CODE;

/// `N_ABS`
pub const N_ABS: u8 = 0x02;
/// `N_SECT`
pub const N_SECT: u8 = 0x0e;
/// `N_GSYM`, global symbol stab.
pub const N_GSYM: u8 = 0x20;
/// `N_FUN`, procedure stab.
pub const N_FUN: u8 = 0x24;
/// `N_STSYM`, static symbol stab.
pub const N_STSYM: u8 = 0x26;
/// `N_LCSYM`, `.lcomm` symbol stab.
pub const N_LCSYM: u8 = 0x28;

const GLOBAL_CTOR_DTOR_PREFIXES: [&str; 2] = ["_GLOBAL__I_", "_GLOBAL__D_"];
const GLOBAL_INIT_PREFIX: &str = "_GLOBAL__I";

const GLOBAL_SYMBOL_SUFFIXES: [&str; 1] = [":G"];
const FUNCTION_SUFFIXES: [&str; 2] = [":F", ":f"];
const STATIC_SUFFIXES: [&str; 2] = [":S", ":V"];

fn strip_any_prefix<'a>(name: &'a str, prefixes: &[&str]) -> &'a str {
    prefixes
        .iter()
        .find_map(|prefix| name.strip_prefix(*prefix))
        .unwrap_or(name)
}

fn strip_any_suffix<'a>(name: &'a str, suffixes: &[&str]) -> &'a str {
    suffixes
        .iter()
        .find_map(|suffix| name.strip_suffix(*suffix))
        .unwrap_or(name)
}

/// Strip the decoration that `type_code` implies, if present.
///
/// The result is always a subslice of `name`. Codes above
/// [`MAX_ELIGIBLE_TYPE_CODE`] and codes without a rule leave `name` untouched.
pub fn normalize(name: &str, type_code: u8) -> &str {
    if type_code > MAX_ELIGIBLE_TYPE_CODE {
        return name;
    }

    match type_code {
        N_ABS | N_SECT => strip_any_prefix(name, &GLOBAL_CTOR_DTOR_PREFIXES),
        N_GSYM => strip_any_suffix(name, &GLOBAL_SYMBOL_SUFFIXES),
        N_FUN => {
            let name = name.strip_prefix(GLOBAL_INIT_PREFIX).unwrap_or(name);
            strip_any_suffix(name, &FUNCTION_SUFFIXES)
        }
        N_STSYM | N_LCSYM => strip_any_suffix(name, &STATIC_SUFFIXES),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_ctor_dtor_prefix() {
        assert_eq!(normalize("_GLOBAL__I__Z3foov", N_ABS), "_Z3foov");
        assert_eq!(normalize("_GLOBAL__D__Z3foov", N_SECT), "_Z3foov");
        assert_eq!(normalize("_GLOBAL__X__Z3foov", N_SECT), "_GLOBAL__X__Z3foov");
        assert_eq!(normalize("_Z3foov:G", N_SECT), "_Z3foov:G");
    }

    #[test]
    fn global_symbol_suffix() {
        assert_eq!(normalize("_ZSt4cout:G", N_GSYM), "_ZSt4cout");
        assert_eq!(normalize("_ZSt4cout:F", N_GSYM), "_ZSt4cout:F");
        assert_eq!(normalize(":G", N_GSYM), "");
    }

    #[test]
    fn function_prefix_and_suffix_are_independent() {
        assert_eq!(normalize("_Z3foov:F", N_FUN), "_Z3foov");
        assert_eq!(normalize("_Z3foov:f", N_FUN), "_Z3foov");
        assert_eq!(normalize("_GLOBAL__I_Z3foov", N_FUN), "_Z3foov");
        assert_eq!(normalize("_GLOBAL__I_Z3foov:F", N_FUN), "_Z3foov");
        assert_eq!(normalize("_GLOBAL__I", N_FUN), "");
    }

    #[test]
    fn static_suffixes() {
        assert_eq!(normalize("_ZL5countS:S", N_STSYM), "_ZL5countS");
        assert_eq!(normalize("_ZTV1A:V", N_LCSYM), "_ZTV1A");
        assert_eq!(normalize("_ZTV1A:G", N_LCSYM), "_ZTV1A:G");
    }

    #[test]
    fn other_codes_are_identity() {
        for code in (0..=u8::MAX).filter(|c| ![2, 14, 32, 36, 38, 40].contains(c)) {
            assert_eq!(normalize("_GLOBAL__I__Z3foov:F", code), "_GLOBAL__I__Z3foov:F");
        }
    }

    #[test]
    fn short_names_are_safe() {
        for code in [N_ABS, N_SECT, N_GSYM, N_FUN, N_STSYM, N_LCSYM] {
            assert_eq!(normalize("", code), "");
            assert_eq!(normalize(":", code), ":");
            assert_eq!(normalize("_", code), "_");
        }
    }
}
