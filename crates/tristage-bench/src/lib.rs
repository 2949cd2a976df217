//! Workload builders shared by the tristage benchmarks and examples.
//!
//! - [`demo_scene`]: a row of bodies for the state stage to publish
//! - [`key_burst`]: encoded key presses as presentation would send them
//! - [`mixed_batch`]: a stats-queue batch with a malformed command mixed in

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tristage_core::{encode, Arg, Command, Key, Modifiers, ObjectId, Payload, Timestamp};
use tristage_engine::Body;

/// `n` bodies spaced 10 units apart along x, all moving right.
pub fn demo_scene(n: u64) -> Vec<(ObjectId, Body)> {
    (0..n)
        .map(|i| {
            (
                ObjectId(i),
                Body {
                    position: [i as f64 * 10.0, 0.0],
                    velocity: [1.0, 0.0],
                },
            )
        })
        .collect()
}

/// `n` encoded `USER_KEY_PRESS` commands cycling through a few keys.
pub fn key_burst(n: usize) -> Vec<Command> {
    const KEYS: [&str; 4] = ["W", "A", "S", "SPACE"];
    let now = Timestamp::now();
    (0..n)
        .map(|i| {
            Payload::UserKeyPress {
                key: Key::new(KEYS[i % KEYS.len()]),
                modifiers: Modifiers::NONE,
                sent_at: now,
            }
            .into_command()
        })
        .collect()
}

/// `n` commands as presentation would drain them from the stats queue:
/// mostly probes and dots, with every tenth command truncated.
pub fn mixed_batch(n: usize) -> Vec<Command> {
    let now = Timestamp::now();
    (0..n)
        .map(|i| match i % 10 {
            9 => encode("DEBUG_TIME", [Arg::Float(now.as_secs_f64())]).unwrap(),
            k if k % 2 == 0 => Payload::DebugTime {
                sent_by_presentation: now,
                sent_by_state: now,
            }
            .into_command(),
            _ => Payload::DebugDotScreen {
                x: i as f64,
                y: 0.0,
                radius: 1.0,
            }
            .into_command(),
        })
        .collect()
}
