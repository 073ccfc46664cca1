#![no_main]

use battleline_client::dispatch::{dispatch_payload, Payload};
use battleline_client::SessionStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut store = SessionStore::new();
    let payload = match std::str::from_utf8(data) {
        Ok(text) => Payload::Text(text),
        Err(_) => Payload::Binary(data),
    };
    let _ = dispatch_payload(payload, &mut store);
    // A null snapshot must never be stored.
    assert!(store.game_state().map_or(true, |state| !state.is_null()));
});
