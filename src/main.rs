use cudacore::{
    address, config,
    instruction::{MemorySpace, WarpInstruction},
    port::QueuePort,
    shader::Recorder,
    translation::PendingTranslations,
    Core, RecvStatus,
};

use clap::Parser;
use color_eyre::eyre;
use stats::instructions::InstructionKind;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(author, version, about = "drive a synthetic workload through a single CUDA core", long_about = None)]
struct Options {
    /// Core configuration (YAML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    #[arg(long = "warp-size")]
    warp_size: Option<usize>,
    #[arg(long = "block-size-bits")]
    block_size_bits: Option<u32>,
    /// Number of instruction fetches to issue
    #[arg(short = 'n', long = "fetches", default_value = "8")]
    num_fetches: usize,
    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
}

type SimCore = Core<Recorder<usize>, PendingTranslations, QueuePort>;

/// Backing store answering every request in the cycle it was sent.
#[derive(Debug, Default)]
struct LoopBack {
    bytes: HashMap<address, u8>,
}

impl LoopBack {
    fn read(&self, addr: address, len: usize) -> Vec<u8> {
        (addr..)
            .take(len)
            .map(|a| self.bytes.get(&a).copied().unwrap_or(0))
            .collect()
    }

    fn write(&mut self, addr: address, data: &[u8]) {
        for (a, byte) in (addr..).zip(data) {
            self.bytes.insert(a, *byte);
        }
    }

    /// Completes pending translations and answers every queued request.
    fn cycle(&mut self, core: &mut SimCore) -> eyre::Result<()> {
        for state in core.itb.complete_all() {
            core.finish_translation(state)?;
        }

        while let Some(mut packet) = core.inst_port.pop() {
            packet.make_response();
            core.recv_inst_resp(packet)?;
        }

        for lane in 0..core.lsq_ports.len() {
            while let Some(mut packet) = core.lsq_ports[lane].pop() {
                if packet.cmd.is_write() {
                    self.write(packet.req.vaddr, &packet.data);
                    continue;
                }
                let data = self.read(packet.req.vaddr, packet.size());
                packet.make_response();
                packet.set_data(&data);
                if let RecvStatus::Blocked(packet) = core.recv_lsq_data_resp(packet, lane)? {
                    core.writeback_clear();
                    core.recv_lsq_data_resp(packet, lane)?;
                }
            }
        }

        while let Some(mut packet) = core.lsq_control_port.pop() {
            packet.make_response();
            core.recv_lsq_control_resp(packet)?;
        }
        if core.inst_port.take_retry() {
            core.handle_retry()?;
        }
        Ok(())
    }
}

fn build_core(options: &Options) -> eyre::Result<SimCore> {
    let mut config = match options.config {
        Some(ref path) => config::Core::from_yaml(std::fs::File::open(path)?)?,
        None => config::Core::default(),
    };
    if let Some(warp_size) = options.warp_size {
        config.warp_size = warp_size;
        config.num_lsq_ports = warp_size;
    }
    if let Some(block_size_bits) = options.block_size_bits {
        config.block_size_bits = block_size_bits;
    }

    let name = config.name();
    let lsq_ports = (0..config.num_lsq_ports)
        .map(|lane| QueuePort::new(format!("{name}.lsq_port{lane}"), config.lsq_port_queue_size))
        .collect();
    let core = Core::new(
        Arc::new(config.clone()),
        Recorder::default(),
        PendingTranslations::default(),
        QueuePort::new(format!("{name}.inst_port"), config.inst_port_queue_size),
        lsq_ports,
        QueuePort::new(format!("{name}.lsq_ctrl_port"), None),
    )?;
    Ok(core)
}

fn main() -> eyre::Result<()> {
    let options = Options::parse();

    let mut log_builder = env_logger::Builder::new();
    log_builder.filter_level(match options.debug {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    });
    log_builder.parse_default_env();
    log_builder.init();
    color_eyre::install()?;

    let start = std::time::Instant::now();
    let mut core = build_core(&options)?;
    let mut memory = LoopBack::default();
    let ticks_per_cycle = core.config.ticks_per_cycle;
    let warp_size = core.config.warp_size;
    let mut tick = 0;

    core.record_block_issue(0, tick)?;

    // fetch 32 bytes at a time, so consecutive fetches share lines
    let mut pc: address = 0x1000;
    for fetch in 0..options.num_fetches {
        if !core.inst_cache_resource_available(pc) {
            memory.cycle(&mut core)?;
            tick += ticks_per_cycle;
        }
        core.icache_fetch(pc, 32, pc, fetch)?;
        core.record_inst(InstructionKind::ALU, tick);
        pc += 32;
    }
    memory.cycle(&mut core)?;
    tick += ticks_per_cycle;

    let base: address = 0x8000_0000;
    let mut store = WarpInstruction::store(0, 0, pc, MemorySpace::Global, 4);
    let mut load = WarpInstruction::load(1, 0, pc + 8, MemorySpace::Global, 4);
    for lane in 0..warp_size {
        let addr = base + 4 * lane as address;
        let value = (lane as u32).to_le_bytes();
        store = store.with_lane(lane, addr, &value);
        load = load.with_lane(lane, addr, &[]);
    }

    for instr in [&store, &load] {
        while core.execute_mem_op(instr)? {
            memory.cycle(&mut core)?;
            tick += ticks_per_cycle;
        }
        if instr.is_load() {
            core.record_ld(instr.space)?;
        } else {
            core.record_st(instr.space)?;
        }
        core.record_inst(InstructionKind::MEM, tick);
        memory.cycle(&mut core)?;
        tick += ticks_per_cycle;
    }

    core.record_block_commit(0, tick)?;
    core.finish_kernel()?;
    memory.cycle(&mut core)?;

    log::info!(
        "fetched {} instructions, wrote back {} registers, finished {} kernel(s)",
        core.shader.fetched.len(),
        core.shader.register_writes.len(),
        core.shader.kernels_finished
    );
    log::info!(
        "inst port rejected {} fetches, {} still waiting",
        core.inst_port.num_rejected(),
        core.num_retry_packets()
    );

    println!("{}", serde_json::to_string_pretty(&core.stats())?);
    core.print_block_stats(&mut std::io::stdout(), tick)?;
    eprintln!("simulated {} in {:?}", core.name(), start.elapsed());
    Ok(())
}
