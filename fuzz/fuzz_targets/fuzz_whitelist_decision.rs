#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use whitelist_proxy::{
    AccessLog, ConnectInterceptor, RequestInterceptor, WhitelistRegistry,
};

struct NullLog;

impl AccessLog for NullLog {
    fn whitelisting(&self, _entry: &str) {}
    fn host_not_allowed(&self, _host: &str) {}
}

fuzz_target!(|data: &[u8]| {
    let input = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    // First line is the whitelist, second line the target
    let (whitelist, target) = input.split_once('\n').unwrap_or((input, ""));
    let log: Arc<dyn AccessLog> = Arc::new(NullLog);
    let registry = Arc::new(WhitelistRegistry::build(
        whitelist.split(','),
        log.as_ref(),
    ));

    let plain = RequestInterceptor::new(Arc::clone(&registry), Arc::clone(&log));
    let connect = ConnectInterceptor::new(Arc::clone(&registry), log);

    let key = RequestInterceptor::whitelist_key(target);
    assert!(key.contains(':'));
    let decision = plain.decide(target);
    assert_eq!(decision.key(), key);
    assert_eq!(decision.is_pass_through(), registry.contains(&key));
    assert_eq!(connect.decide(target).is_allowed(), registry.contains(target));
});
