//! Fuzz target for identifier and literal quoting.
//!
//! Every quoted form must decode back to the exact input and contain no
//! unescaped delimiter.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tenantry_core::{quote_ident, quote_literal};
use tenantry_testing::{unquote_ident, unquote_literal};

fuzz_target!(|name: String| {
    if name.contains('\0') {
        return;
    }

    let ident = quote_ident(&name);
    assert!(ident.starts_with('"') && ident.ends_with('"'));
    assert_eq!(unquote_ident(&ident).as_deref(), Some(name.as_str()));

    let literal = quote_literal(&name);
    assert!(literal.starts_with('\'') && literal.ends_with('\''));
    assert_eq!(unquote_literal(&literal).as_deref(), Some(name.as_str()));
});
