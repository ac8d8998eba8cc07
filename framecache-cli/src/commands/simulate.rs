//! Synthetic viewing session.
//!
//! Opens several instances from an in-memory archive through the reference
//! cache, shows them in viewports, scrolls those viewports while the prefetch
//! scheduler works ahead, and lets the eviction daemon hold the memory
//! budget. Prints the statistics of every component at the end.

use bytes::Bytes;
use clap::Args;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use framecache::config::{format_size, parse_size, ConfigFile};
use framecache::eviction::{EvictionDaemon, EvictionRegistry, MemoryEvictionRegistry};
use framecache::instance::StreamingInstance;
use framecache::logging;
use framecache::prefetch::PrefetchScheduler;
use framecache::retrieval::{Header, RetrievalClient, RetrievalStatsSnapshot, Transport, TransportError};
use framecache::source::{ReferenceCache, ReferenceHandle, RegistrySweeper};

use crate::error::CliError;

/// Arguments for `framecache simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of instances in the synthetic archive
    #[arg(long, default_value = "3")]
    pub instances: u32,

    /// Frames per instance
    #[arg(long, default_value = "60")]
    pub frames: u32,

    /// Viewports scrolling through the instances
    #[arg(long, default_value = "2")]
    pub viewports: usize,

    /// Make the first request for every Nth frame fail
    #[arg(long)]
    pub failure_every: Option<u32>,

    /// Navigation steps to perform
    #[arg(long, default_value = "20")]
    pub steps: usize,

    /// Pause between steps in milliseconds
    #[arg(long, default_value = "20")]
    pub step_ms: u64,

    /// Bytes per synthetic frame
    #[arg(long, default_value = "64KB", value_parser = parse_frame_size)]
    pub frame_size: usize,

    /// Override the memory budget from the config file (e.g. 2MB)
    #[arg(long, value_parser = parse_frame_size)]
    pub budget: Option<usize>,
}

fn parse_frame_size(value: &str) -> Result<usize, String> {
    parse_size(value).map_err(|e| e.to_string())
}

/// In-memory archive with scripted first-request failures.
struct SyntheticArchive {
    frames: u32,
    frame_size: usize,
    failure_every: Option<u32>,
    /// Frames whose scripted failure has already been delivered.
    failed_once: Mutex<HashSet<(String, u32)>>,
    requests: AtomicU64,
}

impl SyntheticArchive {
    fn new(frames: u32, frame_size: usize, failure_every: Option<u32>) -> Self {
        Self {
            frames,
            frame_size,
            failure_every,
            failed_once: Mutex::new(HashSet::new()),
            requests: AtomicU64::new(0),
        }
    }

    fn should_fail(&self, instance_key: &str, frame_number: u32) -> bool {
        match self.failure_every {
            Some(every) if every > 0 && (frame_number + 1) % every == 0 => self
                .failed_once
                .lock()
                .insert((instance_key.to_string(), frame_number)),
            _ => false,
        }
    }
}

impl Transport for SyntheticArchive {
    fn load_header(&self, instance_key: &str, force_complete: bool) -> Result<Header, TransportError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        Ok(Header {
            instance_key: instance_key.to_string(),
            frame_count: self.frames,
            complete: force_complete,
            attributes: Bytes::from(instance_key.as_bytes().to_vec()),
        })
    }

    fn load_frame_pixels(&self, instance_key: &str, frame_number: u32) -> Result<Bytes, TransportError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if frame_number >= self.frames {
            return Err(TransportError::Status(404));
        }
        if self.should_fail(instance_key, frame_number) {
            return Err(TransportError::Timeout);
        }
        Ok(Bytes::from(vec![(frame_number % 251) as u8; self.frame_size]))
    }
}

/// Run the simulation.
pub fn run(args: SimulateArgs, config_path: &Path) -> Result<(), CliError> {
    if args.instances == 0 || args.frames == 0 || args.viewports == 0 {
        return Err(CliError::Config(
            "--instances, --frames and --viewports must be at least 1".to_string(),
        ));
    }

    let config = ConfigFile::load_from(config_path)?;
    let log_base = config_path.parent().unwrap_or_else(|| Path::new("."));
    let _logging = logging::init_from_settings(&config.logging, log_base)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let budget = args.budget.unwrap_or(config.cache.memory_budget);
    let registry = MemoryEvictionRegistry::shared(budget);
    let daemon = EvictionDaemon::start(registry.clone(), config.cache.eviction_interval())
        .map_err(CliError::Spawn)?;
    let cache: ReferenceCache<StreamingInstance> = ReferenceCache::new();
    let sweeper = RegistrySweeper::start(cache.clone(), config.cache.sweep_interval())
        .map_err(CliError::Spawn)?;

    let archive = Arc::new(SyntheticArchive::new(args.frames, args.frame_size, args.failure_every));
    let header_policy = config.retrieval.header_policy();
    let frame_policy = config.retrieval.frame_policy();

    let mut handles: Vec<ReferenceHandle<StreamingInstance>> = Vec::new();
    for i in 0..args.instances {
        let key = format!("1.2.826.0.1.3680043.{}", i + 1);
        let handle = cache.try_acquire_with(key.clone(), || {
            let client = RetrievalClient::new(key.clone(), archive.clone())
                .with_policies(header_policy, frame_policy);
            StreamingInstance::open_default(Arc::new(client), registry.clone())
        })?;
        handles.push(handle);
    }

    let scheduler = PrefetchScheduler::new(config.prefetch.scheduler_config())?;
    let mut viewports = Vec::with_capacity(args.viewports);
    for v in 0..args.viewports {
        let id = scheduler.add_viewport();
        let shown = &handles[v % handles.len()];
        scheduler.set_content(id, shown.source()?.frame_targets(), 0)?;
        viewports.push((id, v % handles.len()));
    }
    if config.prefetch.enabled {
        scheduler.start()?;
    }

    info!(
        instances = args.instances,
        frames = args.frames,
        viewports = args.viewports,
        budget = %format_size(budget),
        prefetch = config.prefetch.enabled,
        "Simulation started"
    );

    let started = Instant::now();
    let mut displayed = 0u64;
    let mut display_failures = 0u64;
    for step in 0..args.steps {
        let (id, shown) = viewports[step % viewports.len()];
        let instance = handles[shown].source()?;
        let current = (step as u32 * 3 + shown as u32 * 7) % instance.frame_count();

        scheduler.select_viewport(id)?;
        scheduler.navigate(id, current as usize)?;

        match instance.lock_frame(current) {
            Ok(_lock) => match instance.get_pixel_buffer(current) {
                Ok(_) => displayed += 1,
                Err(_) => display_failures += 1,
            },
            Err(_) => display_failures += 1,
        }

        thread::sleep(Duration::from_millis(args.step_ms));
    }

    scheduler.stop();
    registry.evict_if_over_limit();

    let mut retrieval = RetrievalStatsSnapshot::default();
    for handle in &handles {
        retrieval = retrieval.merge(&handle.source()?.retrieval_stats());
    }

    print_report(&Report {
        elapsed: started.elapsed(),
        displayed,
        display_failures,
        requests: archive.requests.load(Ordering::Relaxed),
        retrieval,
        scheduler: &scheduler,
        registry: &registry,
        cache: &cache,
    });

    drop(handles);
    daemon.shutdown();
    sweeper.shutdown();
    Ok(())
}

struct Report<'a> {
    elapsed: Duration,
    displayed: u64,
    display_failures: u64,
    requests: u64,
    retrieval: RetrievalStatsSnapshot,
    scheduler: &'a PrefetchScheduler,
    registry: &'a MemoryEvictionRegistry,
    cache: &'a ReferenceCache<StreamingInstance>,
}

fn print_report(report: &Report<'_>) {
    let prefetch = report.scheduler.stats();
    let eviction = report.registry.stats();
    let sources = report.cache.stats();

    println!("Simulation finished in {:.2?}", report.elapsed);
    println!();
    println!("Display:");
    println!("  Frames shown:       {}", report.displayed);
    println!("  Failed displays:    {}", report.display_failures);
    println!();
    println!("Retrieval:");
    println!("  Transport requests: {}", report.requests);
    println!("  Attempts:           {}", report.retrieval.attempts);
    println!("  Retries:            {}", report.retrieval.retries);
    println!("  Failures:           {}", report.retrieval.failures);
    println!("  Cache hits:         {}", report.retrieval.cache_hits);
    println!(
        "  Bytes retrieved:    {}",
        format_size(report.retrieval.bytes_retrieved as usize)
    );
    println!();
    println!("Prefetch:");
    println!("  Rounds:             {}", prefetch.rounds);
    println!("  Dispatched:         {}", prefetch.dispatched);
    println!("  Stale skipped:      {}", prefetch.stale_skipped);
    println!("  Retrieved:          {}", prefetch.retrievals_completed);
    println!("  Retrieval failures: {}", prefetch.retrievals_failed);
    println!("  Decoded:            {}", prefetch.post_process_completed);
    println!();
    println!("Eviction:");
    println!("  Budget:             {}", format_size(eviction.max_bytes));
    println!("  Resident:           {}", format_size(eviction.current_bytes));
    println!("  Evictions:          {}", eviction.evictions);
    println!(
        "  Bytes evicted:      {}",
        format_size(eviction.bytes_evicted as usize)
    );
    println!();
    println!("Reference cache:");
    println!("  Acquires:           {}", sources.acquires);
    println!("  Hits:               {}", sources.hits);
    println!("  Live sources:       {}", sources.entries);
}
