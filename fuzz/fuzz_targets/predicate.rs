//! Fuzz target for the `where_clause` grammar.
//!
//! Any input either parses into a predicate whose compiled SQL holds no
//! quote, statement separator or comment, or is rejected. It never panics.

#![no_main]

use libfuzzer_sys::fuzz_target;

use campaign_insights::analytics::Predicate;

fuzz_target!(|text: &str| {
    let Ok(Some(predicate)) = Predicate::parse(text) else {
        return;
    };
    let mut params = Vec::new();
    let sql = predicate.compile(&mut params);
    assert!(!sql.contains('\''), "quote in compiled predicate: {sql}");
    assert!(!sql.contains(';'), "separator in compiled predicate: {sql}");
    assert!(!sql.contains("--"), "comment in compiled predicate: {sql}");
});
