//! Property-based tests for the demangling facade and name normalizer.

use proptest::prelude::*;

use demangler::itanium::is_itanium_encoding;
use demangler::{demangle, normalize, try_demangle, Declined, Demangler};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(5000))]

    /// Arbitrary input always terminates without panicking.
    #[test]
    fn demangle_never_panics(s in ".*") {
        let mut demangler = Demangler::new();
        let _ = demangle(&mut demangler, &s);
    }

    /// Anything after the `_Z` marker is handled gracefully.
    #[test]
    fn itanium_prefix_never_panics(suffix in "[a-zA-Z0-9_.]*") {
        let mut demangler = Demangler::new();
        let mangled = format!("_Z{suffix}");
        let _ = demangle(&mut demangler, &mangled);
    }

    /// Grammar-shaped noise exercises back references and templates.
    #[test]
    fn grammar_noise_never_panics(body in "[NESTIJLXDpPRKOFvicdA0-9_]{0,48}") {
        let mut demangler = Demangler::new();
        let mangled = format!("_Z1f{body}");
        let _ = demangle(&mut demangler, &mangled);
    }

    /// Names without the marker come back exactly as they went in.
    #[test]
    fn non_encodings_are_identity(s in ".*") {
        prop_assume!(!is_itanium_encoding(&s));

        let mut demangler = Demangler::new();
        prop_assert_eq!(demangle(&mut demangler, &s), s.as_str());
        prop_assert_eq!(try_demangle(&mut demangler, &s), Err(Declined::NotMangledEncoding));
    }

    /// Output only depends on the input, not on what was demangled before.
    #[test]
    fn demangle_is_deterministic(first in ".*", second in "_Z[a-zA-Z0-9_]*") {
        let mut fresh = Demangler::new();
        let expected = demangle(&mut fresh, &second).into_owned();

        let mut reused = Demangler::new();
        let _ = demangle(&mut reused, &first);
        prop_assert_eq!(demangle(&mut reused, &second), expected);
    }

    /// Codes without a decoration rule never change the name.
    #[test]
    fn normalize_identity_outside_rule_table(s in ".*", code in any::<u8>()) {
        prop_assume!(![2u8, 14, 32, 36, 38, 40].contains(&code));
        prop_assert_eq!(normalize(&s, code), s.as_str());
    }

    /// Normalizing only ever removes a prefix and a suffix.
    #[test]
    fn normalize_returns_a_substring(s in ".*", code in any::<u8>()) {
        let normalized = normalize(&s, code);
        prop_assert!(s.contains(normalized));
        prop_assert!(s.len() - normalized.len() <= 12);
    }
}
