//! Ping-pong bookkeeping of the postprocess chain

/// Image an effect reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSource {
    /// Output of the forward pass
    Forward,
    /// One of the two ping-pong images
    Post(usize),
}

/// Tracks which image holds the latest result of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostprocessChain {
    source: PostSource,
    steps: u32,
}

impl Default for PostprocessChain {
    fn default() -> Self {
        Self::new()
    }
}

impl PostprocessChain {
    /// Chain whose input is the forward image
    pub const fn new() -> Self {
        Self {
            source: PostSource::Forward,
            steps: 0,
        }
    }

    /// Image holding the latest result
    pub const fn source(&self) -> PostSource {
        self.source
    }

    /// Steps taken
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Start a step: returns the image to read and the ping-pong image to write
    pub fn advance(&mut self) -> (PostSource, usize) {
        let read = self.source;
        let write = match read {
            PostSource::Forward | PostSource::Post(1) => 0,
            PostSource::Post(_) => 1,
        };
        self.source = PostSource::Post(write);
        self.steps += 1;
        (read, write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_alternate_targets() {
        let mut chain = PostprocessChain::new();
        assert_eq!(chain.advance(), (PostSource::Forward, 0));
        assert_eq!(chain.advance(), (PostSource::Post(0), 1));
        assert_eq!(chain.advance(), (PostSource::Post(1), 0));
        assert_eq!(chain.source(), PostSource::Post(0));
        assert_eq!(chain.steps(), 3);
    }
}
