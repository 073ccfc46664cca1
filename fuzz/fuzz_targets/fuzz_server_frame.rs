#![no_main]

use battleline_client::protocol::ServerFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw-byte path, including serde_json's own UTF-8 validation.
    if let Ok(frame) = serde_json::from_slice::<ServerFrame>(data) {
        let _ = frame.message_type();
        let _ = frame.game_state();
        let _ = frame.chat_log();
        let _ = frame.error_message();
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<ServerFrame>(s);
    }
});
