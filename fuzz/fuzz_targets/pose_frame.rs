#![no_main]

use bonesync_wire::PoseFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must survive a re-encode
    if let Ok(frame) = PoseFrame::decode(data) {
        let encoded = frame.encode().expect("decoded frame re-encodes");
        let again = PoseFrame::decode(&encoded).expect("re-encoded frame decodes");
        assert_eq!(again.sequence, frame.sequence);
        assert_eq!(again.messages.len(), frame.messages.len());
    }
});
