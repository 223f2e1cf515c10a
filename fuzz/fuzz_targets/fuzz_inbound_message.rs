#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Exercise the raw-byte deserialization path (includes serde_json's
    // own UTF-8 validation and error handling for invalid sequences).
    let _ = serde_json::from_slice::<typerace_client::protocol::InboundMessage>(data);

    // Also exercise the str-based paths for valid UTF-8 input, including
    // the envelope decode the room performs before the full parse.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<typerace_client::protocol::InboundMessage>(s);
        if let Ok(envelope) = serde_json::from_str::<typerace_client::protocol::Envelope>(s) {
            let _ = envelope.dedup_key();
        }
    }
});
