#![no_main]

use libfuzzer_sys::fuzz_target;
use yappr_client::protocol::ChatMessage;

fuzz_target!(|data: &[u8]| {
    // Inbound frames are text; non-UTF-8 input never reaches the parser.
    let Ok(frame) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(message) = ChatMessage::from_frame(frame) {
        // Timestamps are parsed lazily and must fail cleanly.
        let _ = message.sent_at();

        let reencoded = serde_json::to_string(&message).unwrap_or_default();
        let again = ChatMessage::from_frame(&reencoded).ok();
        assert_eq!(again.as_ref(), Some(&message));
    }
});
