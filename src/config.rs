use super::{error::Error, instruction::MAX_WARP_SIZE, line::LineMask};
use serde::{Deserialize, Serialize};

/// Configuration of a single core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Core {
    pub core_id: usize,
    /// Name of the device the core belongs to (used in diagnostics).
    pub device_name: String,
    /// Number of lanes per warp.
    pub warp_size: usize,
    /// Number of load/store lane ports.
    ///
    /// Must equal the warp size.
    pub num_lsq_ports: usize,
    /// log2 of the memory system block size.
    pub block_size_bits: u32,
    /// Capacity of the instruction port queue (unbounded if `None`).
    pub inst_port_queue_size: Option<usize>,
    /// Capacity of each lane port queue (unbounded if `None`).
    pub lsq_port_queue_size: Option<usize>,
    pub ticks_per_cycle: u64,
}

impl Default for Core {
    fn default() -> Self {
        Self {
            core_id: 0,
            device_name: "gpu".to_string(),
            warp_size: 32,
            num_lsq_ports: 32,
            // 64 byte lines
            block_size_bits: 6,
            inst_port_queue_size: Some(4),
            lsq_port_queue_size: Some(8),
            ticks_per_cycle: 1,
        }
    }
}

impl Core {
    pub fn from_yaml(reader: impl std::io::Read) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_reader(reader)
    }

    #[must_use]
    pub fn name(&self) -> String {
        format!("{}.core{}", self.device_name, self.core_id)
    }

    #[must_use]
    pub fn line_mask(&self) -> LineMask {
        LineMask::new(self.block_size_bits)
    }

    #[must_use]
    pub fn cycle(&self, tick: u64) -> u64 {
        tick / self.ticks_per_cycle.max(1)
    }

    /// Checks the configuration for consistency.
    ///
    /// # Errors
    /// If the lane port count differs from the warp size or any value
    /// is out of range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.warp_size == 0 || self.warp_size > MAX_WARP_SIZE {
            return Err(Error::InvalidConfig(format!(
                "warp size {} not within 1..={MAX_WARP_SIZE}",
                self.warp_size
            )));
        }
        if self.num_lsq_ports != self.warp_size {
            return Err(Error::LanePortMismatch {
                core: self.name(),
                num_ports: self.num_lsq_ports,
                warp_size: self.warp_size,
            });
        }
        if !(2..=12).contains(&self.block_size_bits) {
            return Err(Error::InvalidBlockSize {
                block_size_bits: self.block_size_bits,
            });
        }
        if self.ticks_per_cycle == 0 {
            return Err(Error::InvalidConfig("ticks per cycle must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use color_eyre::eyre;
    use pretty_assertions_sorted as diff;

    #[test]
    fn test_default_config_is_valid() {
        let config = super::Core::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.name(), "gpu.core0");
        assert_eq!(config.line_mask().block_size(), 64);
    }

    #[test]
    fn test_parse_yaml() -> eyre::Result<()> {
        let yaml = r"
core_id: 3
device_name: gtx1080
warp_size: 4
num_lsq_ports: 4
block_size_bits: 7
ticks_per_cycle: 500
";
        let config = super::Core::from_yaml(yaml.as_bytes())?;
        diff::assert_eq!(
            config,
            super::Core {
                core_id: 3,
                device_name: "gtx1080".to_string(),
                warp_size: 4,
                num_lsq_ports: 4,
                block_size_bits: 7,
                ticks_per_cycle: 500,
                ..super::Core::default()
            }
        );
        assert_eq!(config.cycle(1499), 2);
        config.validate()?;
        Ok(())
    }

    #[test]
    fn test_lane_port_mismatch() {
        let config = super::Core {
            num_lsq_ports: 16,
            ..super::Core::default()
        };
        assert_eq!(
            config.validate(),
            Err(Error::LanePortMismatch {
                core: "gpu.core0".to_string(),
                num_ports: 16,
                warp_size: 32
            })
        );
    }

    #[test]
    fn test_invalid_values() {
        let config = super::Core {
            block_size_bits: 40,
            ..super::Core::default()
        };
        assert_eq!(
            config.validate(),
            Err(Error::InvalidBlockSize {
                block_size_bits: 40
            })
        );
        let config = super::Core {
            warp_size: 128,
            num_lsq_ports: 128,
            ..super::Core::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        let config = super::Core {
            ticks_per_cycle: 0,
            ..super::Core::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
