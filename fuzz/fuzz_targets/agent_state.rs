#![no_main]

use drone_swarm_forces::{AgentState, AGENT_STATE_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary datagrams must decode or be rejected, never panic
    if let Ok(state) = AgentState::decode(data) {
        assert_eq!(data.len(), AGENT_STATE_SIZE);
        if let Ok(bytes) = state.encode() {
            assert_eq!(bytes.len(), AGENT_STATE_SIZE);
        }
    }
});
