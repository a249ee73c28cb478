//! Ordering of forward-pass draws
//!
//! Opaque draws are recorded as they arrive. Translucent draws are held back
//! until the end of the pass so they land after every opaque draw and after
//! the skybox. They are not depth sorted.

/// Holds translucent draws until the forward pass ends
#[derive(Debug)]
pub struct ForwardQueue<D> {
    deferred: Vec<D>,
}

impl<D> Default for ForwardQueue<D> {
    fn default() -> Self {
        Self {
            deferred: Vec::new(),
        }
    }
}

impl<D> ForwardQueue<D> {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the draw back when it should be recorded now
    pub fn submit(&mut self, draw: D, translucent: bool) -> Option<D> {
        if translucent {
            self.deferred.push(draw);
            None
        } else {
            Some(draw)
        }
    }

    /// Deferred draws in submission order
    pub fn drain(&mut self) -> std::vec::Drain<'_, D> {
        self.deferred.drain(..)
    }

    /// Number of deferred draws
    pub fn len(&self) -> usize {
        self.deferred.len()
    }

    /// Whether nothing is deferred
    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty()
    }

    /// Drop deferred draws without recording them
    pub fn clear(&mut self) {
        self.deferred.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translucent_draws_follow_opaque() {
        let mut queue = ForwardQueue::new();
        let mut recorded = Vec::new();
        for (name, translucent) in [("glass", true), ("rock", false), ("water", true), ("tree", false)] {
            if let Some(draw) = queue.submit(name, translucent) {
                recorded.push(draw);
            }
        }
        recorded.extend(queue.drain());
        assert_eq!(recorded, vec!["rock", "tree", "glass", "water"]);
        assert!(queue.is_empty());
    }
}
