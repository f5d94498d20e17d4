#![no_main]

use click_duel_client::state::{GameState, Phase};
use libfuzzer_sys::fuzz_target;

// Each input line is one inbound frame; a line of `!` is a countdown tick and
// a line of `.` closes the connection.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut state = GameState::new();
    state.open();
    for line in text.lines() {
        match line {
            "!" => {
                state.tick();
            }
            "." => {
                state.close();
            }
            frame => {
                state.apply_json(frame);
            }
        }

        let view = state.view();
        assert_eq!(view.click_enabled, state.click_enabled());
        if view.click_enabled {
            assert_eq!(state.phase(), Phase::Playing);
        }
        if let Some(session) = state.session() {
            assert!(session.time_remaining() <= session.duration_secs());
        }
    }
});
