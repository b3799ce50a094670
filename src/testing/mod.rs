use crate::{
    config,
    core::Core,
    error::Error,
    packet::Packet,
    port::QueuePort,
    shader::Recorder,
    translation::PendingTranslations,
};
use std::sync::Arc;

static LOGGER: std::sync::Once = std::sync::Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        env_logger::builder().is_test(true).init();
    });
}

pub type TestCore = Core<Recorder<u64>, PendingTranslations, QueuePort>;

/// Configuration with `warp_size` lanes and `2^block_size_bits` byte lines.
#[must_use]
pub fn config(warp_size: usize, block_size_bits: u32) -> config::Core {
    config::Core {
        warp_size,
        num_lsq_ports: warp_size,
        block_size_bits,
        ..config::Core::default()
    }
}

/// Builds a core with `num_lsq_ports` lane ports, regardless of the warp size.
pub fn core_with_ports(config: config::Core, num_lsq_ports: usize) -> Result<TestCore, Error> {
    init_logging();
    let name = config.name();
    let lsq_ports = (0..num_lsq_ports)
        .map(|lane| QueuePort::new(format!("{name}.lsq_port{lane}"), config.lsq_port_queue_size))
        .collect();
    Core::new(
        Arc::new(config.clone()),
        Recorder::default(),
        PendingTranslations::default(),
        QueuePort::new(format!("{name}.inst_port"), config.inst_port_queue_size),
        lsq_ports,
        QueuePort::new(format!("{name}.lsq_ctrl_port"), None),
    )
}

pub fn core(config: config::Core) -> Result<TestCore, Error> {
    let num_lsq_ports = config.warp_size;
    core_with_ports(config, num_lsq_ports)
}

/// Turns a load request into its response carrying `data`.
#[must_use]
pub fn respond(mut packet: Packet, data: &[u8]) -> Packet {
    packet.make_response();
    packet.set_data(data);
    packet
}
