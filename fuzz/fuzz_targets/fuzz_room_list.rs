#![no_main]

use libfuzzer_sys::fuzz_target;
use yappr_client::directory::Room;

fuzz_target!(|data: &[u8]| {
    if let Ok(rooms) = serde_json::from_slice::<Vec<Room>>(data) {
        let now = chrono::Utc::now();
        for room in &rooms {
            // Countdown formatting must hold for any pair of timestamps.
            let _ = room.remaining_at(now).to_string();
            let _ = room.remaining_at(room.created_at).to_string();
        }
    }
});
