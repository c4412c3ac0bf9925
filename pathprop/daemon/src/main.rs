//! eBPF Path Propagation - Userspace Loader
//!
//! Loads the path propagation programs for one pod, pins their maps,
//! attaches them to the pod's cgroup and sockhash, and reports what the
//! kernel recorded when it stops.
//!
//! ## Usage
//!
//! ```bash
//! # Propagate gRPC call paths for a pod, as service 3
//! sudo ./pathprop --cgroup pod1b2c.slice --service-id 3 --ebpf-object pathprop.o
//!
//! # Correlate Thrift request ids for 60 seconds
//! sudo ./pathprop --cgroup pod1b2c.slice --protocol thrift --duration 60
//!
//! # Remove the pinned maps of a pod
//! sudo ./pathprop --cgroup pod1b2c.slice --unload
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use pathprop_userspace::{
    collector::CorrelationCollector,
    exporter::{JsonExporter, ReportExporter},
    layout::PinLayout,
    loader::PathPropLoader,
    types::{PropagationReport, Protocol},
};
use std::{path::PathBuf, time::Duration};
use tokio::{
    signal,
    time::{interval, sleep_until, Instant},
};

/// Trace path propagation for service mesh sockets using eBPF
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Cgroup of the pod, relative to the cgroup root
    #[clap(short, long)]
    cgroup: String,

    /// cgroup v2 mount point
    #[clap(long, default_value = "/sys/fs/cgroup/unified")]
    cgroup_root: PathBuf,

    /// bpffs directory the per-pod map directories are created in
    #[clap(long, default_value = "/sys/fs/bpf")]
    pin_root: PathBuf,

    /// Protocol of the pod's outbound traffic
    #[clap(short, long, value_enum, default_value_t = Protocol::Grpc)]
    protocol: Protocol,

    /// Identifier of the local service, recorded as a hop (gRPC)
    #[clap(short, long)]
    service_id: Option<u8>,

    /// Path to eBPF object file (if not embedded)
    #[clap(long)]
    ebpf_object: Option<PathBuf>,

    /// Remove the pod's pinned maps and exit
    #[clap(long)]
    unload: bool,

    /// Correlation drain interval in seconds
    #[clap(long, default_value_t = 5)]
    drain_interval: u64,

    /// Duration to run (in seconds, 0 = until interrupted)
    #[clap(short, long, default_value_t = 0)]
    duration: u64,

    /// Output file for the report
    #[clap(short, long, default_value = "pathprop-report.json")]
    output: PathBuf,

    /// Verbose logging
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let layout = PinLayout::new(&args.pin_root, &args.cgroup_root, &args.cgroup)?;

    if args.unload {
        layout
            .remove()
            .with_context(|| format!("Failed to unload pod {}", layout.pod()))?;
        info!("Removed pinned maps of pod {}", layout.pod());
        return Ok(());
    }

    print_banner();

    if args.drain_interval == 0 {
        anyhow::bail!("Drain interval must be >= 1");
    }
    let service_id = match (args.protocol, args.service_id) {
        (Protocol::Grpc, None) => anyhow::bail!("--service-id is required for gRPC"),
        (_, id) => id,
    };

    info!("Starting path propagation...");
    info!("   Pod: {}", layout.pod());
    info!("   Cgroup: {:?}", layout.cgroup_path());
    info!("   Pin directory: {:?}", layout.pin_dir());
    info!("   Protocol: {:?}", args.protocol);
    info!(
        "   Duration: {} seconds",
        if args.duration == 0 {
            "infinite".to_string()
        } else {
            args.duration.to_string()
        }
    );

    // Load eBPF programs
    let mut loader = PathPropLoader::load(args.ebpf_object.clone(), &layout)?;

    // Initialize eBPF logger (optional)
    loader.init_logger();

    loader.attach_registrar(&layout)?;
    match args.protocol {
        Protocol::Grpc => {
            loader.attach_grpc()?;
            loader.attach_receiver()?;
        }
        Protocol::Thrift => loader.attach_thrift()?,
    }
    if let Some(id) = service_id {
        loader.set_service_id(id)?;
    }

    info!("Programs attached, collecting...");

    let mut collector = CorrelationCollector::new();
    let start_time = Instant::now();
    let deadline = (args.duration > 0).then(|| start_time + Duration::from_secs(args.duration));

    let mut ticker = interval(Duration::from_secs(args.drain_interval));
    let stop = wait_until(deadline);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(stop, ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let batch = loader.drain_correlations()?;
                let count = collector.add_batch(&batch);
                if count > 0 {
                    info!("Drained {} correlations ({} total)", count, collector.total());
                } else {
                    debug!("No new correlations");
                }
            }
            _ = &mut stop => {
                info!("Duration reached, shutting down...");
                break;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down...");
                break;
            }
        }
    }

    let batch = loader.drain_correlations()?;
    collector.add_batch(&batch);

    let path_cache = match args.protocol {
        Protocol::Grpc => match loader.path_cache_stats() {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Could not read path cache: {:#}", e);
                None
            }
        },
        Protocol::Thrift => None,
    };

    info!("Generating report...");

    let report = PropagationReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        duration_seconds: start_time.elapsed().as_secs(),
        pod: layout.pod().to_string(),
        protocol: args.protocol,
        service_id,
        correlations: collector.generate_stats(),
        path_cache,
    };

    JsonExporter::new(args.output.clone(), true).export(&report)?;
    info!("Report written to {:?}", args.output);

    print_summary(&report);

    Ok(())
}

/// Resolve at `deadline`, or never
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn print_banner() {
    println!(
        r#"
╔═══════════════════════════════════════════════════╗
║       eBPF Path Propagation - Service Mesh        ║
║              Trace Path Fast Path                 ║
╚═══════════════════════════════════════════════════╝
    "#
    );
}

fn print_summary(report: &PropagationReport) {
    info!("");
    info!("============================================");
    info!("             Summary Report");
    info!("============================================");
    info!("");
    info!("  Pod:                {}", report.pod);
    info!("  Duration:           {} seconds", report.duration_seconds);
    info!("");
    info!("  Correlations:");
    info!("    drained:          {:>8}", report.correlations.total);
    info!("    drain passes:     {:>8}", report.correlations.drains);
    if let Some(cache) = &report.path_cache {
        info!("");
        info!("  Path cache:");
        info!("    cached paths:     {:>8}", cache.cached_paths);
        info!("    ring occupancy:   {:>8}", cache.ring_occupancy);
        info!("    longest path:     {:>8}", cache.max_hops);
    }
    info!("");
    info!("============================================");
}
