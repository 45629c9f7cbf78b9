#![no_main]

use libfuzzer_sys::fuzz_target;
use whitelist_proxy::config::parse_whitelist;
use whitelist_proxy::Config;

fuzz_target!(|data: &[u8]| {
    let input = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    // Exercise TOML config parsing; errors are fine
    let _ = Config::parse(input);

    // Splitting never drops or merges segments
    let entries = parse_whitelist(input);
    assert_eq!(entries.len(), input.matches(',').count() + 1);
    assert_eq!(entries.join(","), input);
});
