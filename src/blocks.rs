use super::error::Error;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Thread blocks currently resident on a core.
///
/// Used for utilization statistics only.
#[derive(Debug, Default)]
pub struct ActiveBlockSet {
    active: BTreeMap<usize, bool>,
    /// Issue and commit ticks per hardware block id.
    history: BTreeMap<usize, Vec<u64>>,
    num_active: usize,
    begin_active_cycle: u64,
}

impl ActiveBlockSet {
    #[must_use]
    pub fn num_active(&self) -> usize {
        self.num_active
    }

    #[must_use]
    pub fn is_active(&self, block: usize) -> bool {
        self.active.get(&block).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn history(&self, block: usize) -> &[u64] {
        self.history.get(&block).map_or(&[][..], Vec::as_slice)
    }

    /// Marks `block` as issued.
    pub fn issue(&mut self, block: usize, tick: u64, cycle: u64) -> Result<(), Error> {
        let active = self.active.entry(block).or_insert(false);
        if *active {
            return Err(Error::BlockAlreadyActive { block });
        }
        *active = true;
        self.history.entry(block).or_default().push(tick);

        if self.num_active == 0 {
            self.begin_active_cycle = cycle;
        }
        self.num_active += 1;
        Ok(())
    }

    /// Marks `block` as committed.
    ///
    /// Returns the length of the active period if this was the last active block.
    pub fn commit(&mut self, block: usize, tick: u64, cycle: u64) -> Result<Option<u64>, Error> {
        match self.active.get_mut(&block) {
            Some(active) if *active => *active = false,
            _ => return Err(Error::BlockNotActive { block }),
        }
        self.history.entry(block).or_default().push(tick);

        self.num_active -= 1;
        if self.num_active == 0 {
            return Ok(Some(cycle.saturating_sub(self.begin_active_cycle)));
        }
        Ok(None)
    }

    /// Writes `core, block, t0, t1, ..., now` for every block ever issued.
    pub fn write_stats(
        &self,
        out: &mut impl std::io::Write,
        core_id: usize,
        now: u64,
    ) -> std::io::Result<()> {
        for (block, times) in &self.history {
            let times = times.iter().map(|t| format!("{t}, ")).join("");
            writeln!(out, "{core_id}, {block}, {times}{now}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ActiveBlockSet;
    use crate::error::Error;

    #[test]
    fn test_active_period() -> color_eyre::eyre::Result<()> {
        let mut blocks = ActiveBlockSet::default();
        blocks.issue(0, 100, 10)?;
        blocks.issue(3, 150, 15)?;
        assert_eq!(blocks.num_active(), 2);
        assert_eq!(blocks.issue(0, 160, 16), Err(Error::BlockAlreadyActive { block: 0 }));

        assert_eq!(blocks.commit(0, 200, 20)?, None);
        assert_eq!(blocks.commit(3, 400, 40)?, Some(30));
        assert_eq!(blocks.commit(3, 410, 41), Err(Error::BlockNotActive { block: 3 }));
        assert_eq!(blocks.commit(7, 410, 41), Err(Error::BlockNotActive { block: 7 }));

        blocks.issue(0, 500, 50)?;
        assert!(blocks.is_active(0));
        assert_eq!(blocks.history(0), &[100, 200, 500]);
        Ok(())
    }

    #[test]
    fn test_write_stats() -> color_eyre::eyre::Result<()> {
        let mut blocks = ActiveBlockSet::default();
        blocks.issue(1, 10, 10)?;
        blocks.issue(0, 12, 12)?;
        blocks.commit(1, 30, 30)?;

        let mut out = Vec::new();
        blocks.write_stats(&mut out, 4, 99)?;
        assert_eq!(
            String::from_utf8(out)?,
            "4, 0, 12, 99\n4, 1, 10, 30, 99\n"
        );
        Ok(())
    }
}
