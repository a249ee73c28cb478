use std::collections::HashMap;

use super::super::null::{Command, NullBackend};
use super::*;

const MS: u64 = 1_000_000;

fn run_frames(backend: &mut NullBackend, frames: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity(frames);
    for _ in 0..frames {
        indices.push(backend.command_index());
        backend.begin().unwrap();
        backend.end().unwrap();
    }
    indices
}

#[test]
fn test_thousand_cycles_round_robin() {
    let mut backend = backend();
    let indices = run_frames(&mut backend, 1000);
    for (frame, index) in indices.iter().enumerate() {
        assert_eq!(*index, frame % GraphicsLimits::COMMAND_RING_SIZE);
    }
    let submits = backend
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::Submit { .. }))
        .count();
    assert_eq!(submits, 1000);
}

#[test]
fn test_begin_waits_for_the_slots_previous_submission() {
    // submissions finish five CPU frames after they are made, so with three slots
    // the CPU keeps catching up with the oldest one
    let mut backend = backend().with_timing(10 * MS, 2 * MS);
    run_frames(&mut backend, 1000);

    let mut completion: HashMap<usize, u64> = HashMap::new();
    let mut blocked = 0;
    let mut last_submit = 0;
    for command in backend.commands() {
        match command {
            Command::Begin { slot, at_ns } => {
                if let Some(done) = completion.get(slot) {
                    assert!(at_ns >= done, "slot {slot} re-recorded at {at_ns} before {done}");
                    if *at_ns > last_submit {
                        blocked += 1;
                    }
                }
            }
            Command::Submit {
                slot,
                at_ns,
                completes_at_ns,
            } => {
                completion.insert(*slot, *completes_at_ns);
                last_submit = *at_ns;
            }
            _ => {}
        }
    }
    assert!(blocked >= 300, "only {blocked} frames waited on the GPU");
    assert!(backend.now_ns() > 1000 * 3 * MS);
}

#[test]
fn test_fast_gpu_never_blocks() {
    let mut backend = backend().with_timing(MS, 5 * MS);
    run_frames(&mut backend, 30);
    assert_eq!(backend.now_ns(), 30 * 5 * MS);
}

#[test]
fn test_fence_wait_is_bounded() {
    let mut backend = backend().with_timing(5 * GraphicsLimits::FENCE_TIMEOUT_NS, 0);
    run_frames(&mut backend, 3);
    assert!(matches!(backend.begin(), Err(RenderError::Timeout { .. })));
}
