use std::collections::VecDeque;

/// Bounded first-in first-out queue.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fifo<T> {
    inner: VecDeque<T>,
    max_size: Option<usize>,
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<T> Fifo<T> {
    #[must_use]
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            inner: VecDeque::new(),
            max_size,
        }
    }

    /// Appends `value` unless the queue is full.
    ///
    /// A full queue hands the value back.
    pub fn try_push_back(&mut self, value: T) -> Result<(), T> {
        if self.full() {
            return Err(value);
        }
        self.inner.push_back(value);
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.inner.pop_front()
    }

    #[must_use]
    pub fn full(&self) -> bool {
        match self.max_size {
            Some(max) => self.inner.len() >= max,
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Fifo;

    #[test]
    fn test_bounded_fifo() {
        let mut fifo = Fifo::new(Some(2));
        assert_eq!(fifo.try_push_back(1), Ok(()));
        assert_eq!(fifo.try_push_back(2), Ok(()));
        assert!(fifo.full());
        assert_eq!(fifo.try_push_back(3), Err(3));
        assert_eq!(fifo.pop_front(), Some(1));
        assert_eq!(fifo.try_push_back(3), Ok(()));
        assert_eq!(fifo.pop_front(), Some(2));
        assert_eq!(fifo.pop_front(), Some(3));
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_unbounded_fifo() {
        let mut fifo = Fifo::default();
        for i in 0..100 {
            assert_eq!(fifo.try_push_back(i), Ok(()));
        }
        assert!(!fifo.full());
        assert_eq!(fifo.len(), 100);
    }
}
