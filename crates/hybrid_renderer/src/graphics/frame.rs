//! Fixed ring of frame slots throttling the CPU against the GPU
//!
//! Each slot pairs a command buffer with the fence its last submission
//! signals. Recording into a slot first waits on that fence, so a command
//! buffer is never rewritten while the GPU may still read it, and at most
//! [`GraphicsLimits::COMMAND_RING_SIZE`] frames are ever in flight.

use super::limits::GraphicsLimits;

/// Fence side of a ring slot
pub trait FrameFence {
    /// Error reported by the underlying wait
    type Error;

    /// Block until the slot's previous submission completes, at most `timeout_ns`
    fn wait(&self, timeout_ns: u64) -> Result<(), Self::Error>;

    /// Return the fence to the unsignalled state before the next submission
    fn reset(&self) -> Result<(), Self::Error>;
}

/// Round-robin ring of [`GraphicsLimits::COMMAND_RING_SIZE`] slots
#[derive(Debug)]
pub struct CommandRing<S> {
    slots: Vec<S>,
    index: usize,
    cycles: u64,
}

impl<S> CommandRing<S> {
    /// Ring over exactly `COMMAND_RING_SIZE` slots
    pub fn new(slots: [S; GraphicsLimits::COMMAND_RING_SIZE]) -> Self {
        Self {
            slots: slots.into(),
            index: 0,
            cycles: 0,
        }
    }

    /// Build every slot with `make`, stopping at the first error
    pub fn try_new<E>(mut make: impl FnMut(usize) -> Result<S, E>) -> Result<Self, E> {
        let mut slots = Vec::with_capacity(GraphicsLimits::COMMAND_RING_SIZE);
        for index in 0..GraphicsLimits::COMMAND_RING_SIZE {
            slots.push(make(index)?);
        }
        Ok(Self {
            slots,
            index: 0,
            cycles: 0,
        })
    }

    /// Slot the next frame records into
    pub fn index(&self) -> usize {
        self.index
    }

    /// Index of the slot submitted most recently
    pub fn previous_index(&self) -> usize {
        (self.index + GraphicsLimits::COMMAND_RING_SIZE - 1) % GraphicsLimits::COMMAND_RING_SIZE
    }

    /// Total number of `advance` calls
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Current slot
    pub fn current(&self) -> &S {
        &self.slots[self.index]
    }

    /// Current slot, mutably
    pub fn current_mut(&mut self) -> &mut S {
        &mut self.slots[self.index]
    }

    /// Slot by index
    pub fn slot(&self, index: usize) -> &S {
        &self.slots[index % GraphicsLimits::COMMAND_RING_SIZE]
    }

    /// Slot by index, mutably
    pub fn slot_mut(&mut self, index: usize) -> &mut S {
        &mut self.slots[index % GraphicsLimits::COMMAND_RING_SIZE]
    }

    /// All slots
    pub fn slots(&self) -> &[S] {
        &self.slots
    }

    /// Move on to the next slot after submitting the current one
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % GraphicsLimits::COMMAND_RING_SIZE;
        self.cycles += 1;
    }
}

impl<S: FrameFence> CommandRing<S> {
    /// Wait for the current slot's previous submission
    ///
    /// The fence stays signalled until [`arm`](Self::arm), so a frame that
    /// fails before submitting leaves the slot reusable.
    pub fn acquire(&mut self) -> Result<&mut S, S::Error> {
        let slot = &mut self.slots[self.index];
        slot.wait(GraphicsLimits::FENCE_TIMEOUT_NS)?;
        Ok(slot)
    }

    /// Reset the current slot's fence, immediately before submitting against it
    pub fn arm(&self) -> Result<(), S::Error> {
        self.slots[self.index].reset()
    }

    /// Wait for every slot, used before tearing resources down
    pub fn wait_all(&self) -> Result<(), S::Error> {
        for slot in &self.slots {
            slot.wait(GraphicsLimits::FENCE_TIMEOUT_NS)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct Log(RefCell<Vec<String>>);

    struct TestFence {
        id: usize,
        log: Rc<Log>,
        signalled: Cell<bool>,
    }

    impl FrameFence for TestFence {
        type Error = String;

        fn wait(&self, timeout_ns: u64) -> Result<(), String> {
            assert_eq!(timeout_ns, 1_000_000_000);
            self.log.0.borrow_mut().push(format!("wait {}", self.id));
            if self.signalled.get() {
                Ok(())
            } else {
                Err(format!("fence {} timed out", self.id))
            }
        }

        fn reset(&self) -> Result<(), String> {
            self.log.0.borrow_mut().push(format!("reset {}", self.id));
            self.signalled.set(false);
            Ok(())
        }
    }

    fn ring(log: &Rc<Log>) -> CommandRing<TestFence> {
        CommandRing::try_new(|id| {
            Ok::<_, String>(TestFence {
                id,
                log: log.clone(),
                signalled: Cell::new(true),
            })
        })
        .unwrap()
    }

    #[test]
    fn test_acquire_waits_and_arm_resets_current_slot() {
        let log = Rc::new(Log::default());
        let mut ring = ring(&log);
        ring.acquire().unwrap();
        assert_eq!(*log.0.borrow(), vec!["wait 0".to_string()]);
        ring.arm().unwrap();
        assert_eq!(*log.0.borrow(), vec!["wait 0".to_string(), "reset 0".to_string()]);
    }

    #[test]
    fn test_frame_abandoned_before_submit_keeps_slot_usable() {
        let log = Rc::new(Log::default());
        let mut ring = ring(&log);
        ring.acquire().unwrap();
        // recording failed, nothing was armed or submitted
        ring.advance();
        ring.advance();
        ring.advance();
        assert_eq!(ring.index(), 0);
        assert!(ring.acquire().is_ok());
    }

    #[test]
    fn test_unsignalled_fence_blocks_reuse() {
        let log = Rc::new(Log::default());
        let mut ring = ring(&log);
        ring.acquire().unwrap();
        ring.arm().unwrap();
        ring.advance();
        ring.advance();
        ring.advance();
        // slot 0 was never signalled after its reset
        assert_eq!(ring.index(), 0);
        assert!(ring.acquire().is_err());
    }

    #[test]
    fn test_index_cycles_through_three_slots() {
        let log = Rc::new(Log::default());
        let mut ring = ring(&log);
        for frame in 0..30 {
            assert_eq!(ring.index(), frame % 3);
            ring.acquire().unwrap();
            ring.arm().unwrap();
            ring.current().signalled.set(true);
            ring.advance();
            assert_eq!(ring.previous_index(), frame % 3);
        }
        assert_eq!(ring.cycles(), 30);
    }
}
