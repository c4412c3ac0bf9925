//! eBPF program loader
//!
//! Handles loading the eBPF object with pinned maps, attaching the socket
//! programs and reading the shared maps back.

use anyhow::{Context, Result};
use aya::{
    maps::{sock::SockMapFd, Array, HashMap, MapData, ProgramArray, SockHash},
    programs::{SkMsg, SkSkb, SockOps},
    Bpf, BpfLoader,
};
use aya_log::BpfLogger;
use log::{debug, info, warn};
use pathprop_common::constants::*;
use std::{fs::File, path::PathBuf};

use crate::{
    layout::PinLayout,
    types::{ConnectionKey, Correlation, PathCacheStats, TracePath},
};

/// eBPF program loader and manager
pub struct PathPropLoader {
    ebpf: Bpf,
    sock_map: SockMapFd,
    /// Kept open so the tail call targets stay installed
    jump_table: Option<ProgramArray<MapData>>,
}

impl PathPropLoader {
    /// Load eBPF programs from file or embedded bytecode
    ///
    /// Maps are pinned under the pod's pin directory, so a second loader
    /// for the same pod reuses them.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to eBPF object file. If None, uses embedded bytecode.
    /// * `layout` - Pin directory layout of the pod
    pub fn load(path: Option<PathBuf>, layout: &PinLayout) -> Result<Self> {
        info!("Loading eBPF programs...");

        layout.ensure_pin_dir()?;
        let mut loader = BpfLoader::new();
        loader.map_pin_path(layout.pin_dir());

        let mut ebpf = if let Some(obj_path) = path {
            info!("Loading eBPF object from: {:?}", obj_path);
            let data = std::fs::read(&obj_path)
                .with_context(|| format!("Failed to read eBPF object file: {:?}", obj_path))?;
            loader.load(&data).context("Failed to load eBPF programs")?
        } else {
            #[cfg(feature = "embedded")]
            {
                info!("Loading embedded eBPF programs...");
                let data = aya::include_bytes_aligned!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../target/bpfel-unknown-none/release/pathprop"
                ));
                loader
                    .load(data)
                    .context("Failed to load embedded eBPF programs")?
            }
            #[cfg(not(feature = "embedded"))]
            {
                anyhow::bail!(
                    "No eBPF object file provided. Use --ebpf-object or compile with 'embedded' feature"
                );
            }
        };

        let sock_hash: SockHash<_, ConnectionKey> = SockHash::try_from(
            ebpf.map_mut(MAP_SOCK_OPS)
                .with_context(|| format!("{} map not found in eBPF object", MAP_SOCK_OPS))?,
        )
        .with_context(|| format!("Failed to open {} as SockHash", MAP_SOCK_OPS))?;
        let sock_map = sock_hash
            .fd()
            .try_clone()
            .context("Failed to duplicate sockhash fd")?;

        info!("eBPF programs loaded, maps pinned in {:?}", layout.pin_dir());
        debug!("  sockhash at {:?}", layout.map_path(MAP_SOCK_OPS));

        Ok(Self {
            ebpf,
            sock_map,
            jump_table: None,
        })
    }

    /// Initialize eBPF logger
    ///
    /// Forwards kernel-side log records to the `log` facade.
    /// Non-fatal if it fails.
    pub fn init_logger(&mut self) {
        if let Err(e) = BpfLogger::init(&mut self.ebpf) {
            warn!("eBPF logger not available, kernel log records will not be captured: {}", e);
        }
    }

    /// Attach the connection registrar to a cgroup
    pub fn attach_registrar(&mut self, layout: &PinLayout) -> Result<()> {
        info!("Attaching connection registrar...");

        let cgroup = File::open(layout.cgroup_path())
            .with_context(|| format!("Failed to open cgroup: {:?}", layout.cgroup_path()))?;

        let program: &mut SockOps = self
            .ebpf
            .program_mut(PROG_REGISTRAR)
            .with_context(|| format!("{} program not found in eBPF object", PROG_REGISTRAR))?
            .try_into()
            .with_context(|| format!("Failed to get {} as SockOps", PROG_REGISTRAR))?;
        program
            .load()
            .with_context(|| format!("Failed to load {}", PROG_REGISTRAR))?;
        program.attach(cgroup).with_context(|| {
            format!(
                "Failed to attach {} to {:?}",
                PROG_REGISTRAR,
                layout.cgroup_path()
            )
        })?;
        info!("  ✓ Attached {} to {:?}", PROG_REGISTRAR, layout.cgroup_path());

        Ok(())
    }

    /// Attach the HTTP/2 header locator and fill the jump table
    pub fn attach_grpc(&mut self) -> Result<()> {
        info!("Attaching gRPC path propagation...");

        let mut jump_table = ProgramArray::try_from(
            self.ebpf
                .take_map(MAP_JUMP_TABLE)
                .with_context(|| format!("{} map not found in eBPF object", MAP_JUMP_TABLE))?,
        )
        .with_context(|| format!("Failed to open {} as ProgramArray", MAP_JUMP_TABLE))?;

        for (index, name) in [
            (JUMP_PROPAGATE, PROG_PROPAGATOR),
            (JUMP_EXTENDED, PROG_GRPC_LOCATOR_EXT),
        ] {
            let program = self.sk_msg(name)?;
            program
                .load()
                .with_context(|| format!("Failed to load {}", name))?;
            let fd = program
                .fd()
                .with_context(|| format!("{} has no fd after loading", name))?
                .try_clone()
                .with_context(|| format!("Failed to duplicate fd of {}", name))?;
            jump_table
                .set(index, &fd, 0)
                .with_context(|| format!("Failed to add {} to {}", name, MAP_JUMP_TABLE))?;
            info!("  ✓ {}[{}] = {}", MAP_JUMP_TABLE, index, name);
        }

        self.jump_table = Some(jump_table);

        self.attach_sk_msg(PROG_GRPC_LOCATOR)
    }

    /// Attach the Thrift request id locator
    pub fn attach_thrift(&mut self) -> Result<()> {
        info!("Attaching Thrift request correlation...");
        self.attach_sk_msg(PROG_THRIFT_LOCATOR)
    }

    /// Attach the stream parser and verdict that cache received paths
    pub fn attach_receiver(&mut self) -> Result<()> {
        info!("Attaching stream receiver...");

        for name in [PROG_STREAM_PARSER, PROG_STREAM_VERDICT] {
            let program: &mut SkSkb = self
                .ebpf
                .program_mut(name)
                .with_context(|| format!("{} program not found in eBPF object", name))?
                .try_into()
                .with_context(|| format!("Failed to get {} as SkSkb", name))?;
            program
                .load()
                .with_context(|| format!("Failed to load {}", name))?;
            program
                .attach(&self.sock_map)
                .with_context(|| format!("Failed to attach {} to {}", name, MAP_SOCK_OPS))?;
            info!("  ✓ Attached {} to {}", name, MAP_SOCK_OPS);
        }

        Ok(())
    }

    /// Write the local service identifier
    pub fn set_service_id(&mut self, service_id: u8) -> Result<()> {
        let mut map: Array<_, u8> = Array::try_from(
            self.ebpf
                .map_mut(MAP_SERVICE_ID)
                .with_context(|| format!("{} map not found in eBPF object", MAP_SERVICE_ID))?,
        )?;
        map.set(0, service_id, 0)
            .with_context(|| format!("Failed to write {}", MAP_SERVICE_ID))?;
        info!("  ✓ Service id set to {}", service_id);
        Ok(())
    }

    /// Read and delete every recorded Thrift correlation
    pub fn drain_correlations(&mut self) -> Result<Vec<Correlation>> {
        let mut map: HashMap<_, u64, u64> = HashMap::try_from(
            self.ebpf
                .map_mut(MAP_CORRELATIONS)
                .with_context(|| format!("{} map not found in eBPF object", MAP_CORRELATIONS))?,
        )?;

        // Collect first: deleting while iterating restarts the key walk.
        let entries = map
            .iter()
            .collect::<Result<Vec<(u64, u64)>, _>>()
            .with_context(|| format!("Failed to read {}", MAP_CORRELATIONS))?;

        let mut drained = Vec::with_capacity(entries.len());
        for (sequence, request_id) in entries {
            if let Err(e) = map.remove(&sequence) {
                debug!("Correlation {} already gone: {}", sequence, e);
            }
            drained.push(Correlation {
                sequence,
                request_id,
            });
        }

        Ok(drained)
    }

    /// Snapshot the receive-side path cache
    pub fn path_cache_stats(&mut self) -> Result<PathCacheStats> {
        let ring: Array<_, u32> = Array::try_from(
            self.ebpf
                .map(MAP_RING_INDEX)
                .with_context(|| format!("{} map not found in eBPF object", MAP_RING_INDEX))?,
        )?;
        let head = ring.get(&RING_HEAD, 0)?;
        let tail = ring.get(&RING_TAIL, 0)?;

        let paths: HashMap<_, u64, TracePath> = HashMap::try_from(
            self.ebpf
                .map(MAP_PATHS)
                .with_context(|| format!("{} map not found in eBPF object", MAP_PATHS))?,
        )?;
        let entries = paths
            .iter()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read {}", MAP_PATHS))?;

        Ok(PathCacheStats::from_snapshot(head, tail, entries))
    }

    fn sk_msg(&mut self, name: &str) -> Result<&mut SkMsg> {
        self.ebpf
            .program_mut(name)
            .with_context(|| format!("{} program not found in eBPF object", name))?
            .try_into()
            .with_context(|| format!("Failed to get {} as SkMsg", name))
    }

    fn attach_sk_msg(&mut self, name: &str) -> Result<()> {
        let sock_map = self
            .sock_map
            .try_clone()
            .context("Failed to duplicate sockhash fd")?;
        let program = self.sk_msg(name)?;
        program
            .load()
            .with_context(|| format!("Failed to load {}", name))?;
        program
            .attach(&sock_map)
            .with_context(|| format!("Failed to attach {} to {}", name, MAP_SOCK_OPS))?;
        info!("  ✓ Attached {} to {}", name, MAP_SOCK_OPS);
        Ok(())
    }
}
