#![no_main]

use click_duel_client::protocol::ServerMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<ServerMessage>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        // Anything that parses must serialize and parse back to itself.
        if let Ok(msg) = ServerMessage::from_json(s) {
            let json = serde_json::to_string(&msg).unwrap_or_default();
            assert_eq!(ServerMessage::from_json(&json).ok(), Some(msg));
        }
    }
});
