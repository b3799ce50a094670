use super::{address, error::Error, line::LineMask};
use std::collections::HashMap;

/// Outstanding instruction fetches, at most one per cache line.
#[derive(Debug)]
pub struct Tracker<F> {
    line: LineMask,
    entries: HashMap<address, F>,
}

impl<F> Tracker<F> {
    #[must_use]
    pub fn new(line: LineMask) -> Self {
        Self {
            line,
            entries: HashMap::new(),
        }
    }

    /// Checks whether no fetch is outstanding for the line of `addr`.
    #[must_use]
    pub fn is_line_free(&self, addr: address) -> bool {
        !self.entries.contains_key(&self.line.line_of(addr))
    }

    /// Registers an outstanding fetch for the line of `addr`.
    ///
    /// Callers check [`Tracker::is_line_free`] first.
    ///
    /// # Errors
    /// If a fetch for the same line is still outstanding.
    pub fn begin(&mut self, addr: address, fetch: F) -> Result<(), Error> {
        let line = self.line.line_of(addr);
        match self.entries.entry(line) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(Error::FetchLineBusy { addr, line })
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(fetch);
                Ok(())
            }
        }
    }

    /// Removes and returns the outstanding fetch for the line of `addr`.
    ///
    /// # Errors
    /// If no fetch is outstanding for the line.
    pub fn complete(&mut self, addr: address) -> Result<F, Error> {
        let line = self.line.line_of(addr);
        self.entries
            .remove(&line)
            .ok_or(Error::UnmatchedFetchResponse { addr, line })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Tracker;
    use crate::{error::Error, line::LineMask};

    #[test]
    fn test_one_fetch_per_line() {
        let mut tracker = Tracker::new(LineMask::new(6));
        assert!(tracker.is_line_free(0x1005));
        tracker.begin(0x1005, "first").unwrap();

        assert!(!tracker.is_line_free(0x1005));
        assert!(!tracker.is_line_free(0x1000));
        assert!(tracker.is_line_free(0x1040));
        assert_eq!(
            tracker.begin(0x103F, "second"),
            Err(Error::FetchLineBusy {
                addr: 0x103F,
                line: 0x1000
            })
        );
        assert_eq!(tracker.len(), 1);

        assert_eq!(tracker.complete(0x1020), Ok("first"));
        assert!(tracker.is_line_free(0x1005));
        tracker.begin(0x1005, "second").unwrap();
        assert!(!tracker.is_line_free(0x1000));
    }

    #[test]
    fn test_complete_without_fetch() {
        let mut tracker: Tracker<()> = Tracker::new(LineMask::new(7));
        assert_eq!(
            tracker.complete(0x2010),
            Err(Error::UnmatchedFetchResponse {
                addr: 0x2010,
                line: 0x2000
            })
        );
        assert!(tracker.is_empty());
    }
}
