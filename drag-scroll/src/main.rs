//! Drag Scroll - hold a key, move the pointer, and the content scrolls.

use drag_scroll::app::cli::{Cli, Commands, ConfigAction};
use drag_scroll::app::config::Config;
use drag_scroll::capture::{self, platform_event_source, TriggerKey};
use drag_scroll::output::platform_emitter;
use drag_scroll::replay::{record, DeltaOrigin, RecordOptions, Trace, TracePlayer};
use drag_scroll::runtime::{ScrollController, ThreadScheduler};
use drag_scroll::time::timebase::Timebase;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    // Initialize tracing (--verbose enables debug-level output)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    Timebase::init();

    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Run {
            key,
            sensitivity,
            deceleration,
        } => {
            run_scroll(key, sensitivity, deceleration, config)?;
        }
        Commands::Record { duration, output } => {
            run_record(duration, output, &config)?;
        }
        Commands::Replay { trace, json } => {
            run_replay(&trace, json, &config)?;
        }
        Commands::List { detailed } => {
            run_list(detailed)?;
        }
        Commands::Permissions { request } => {
            run_permissions(request)?;
        }
        Commands::Init { force } => {
            run_init(force, &config)?;
        }
        Commands::Config { action } => {
            run_config(action, cli.config.as_deref(), config)?;
        }
    }

    Ok(())
}

/// Install a Ctrl+C handler that raises the returned flag and wakes the
/// calling thread.
fn stop_on_ctrlc() -> anyhow::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    let main_thread = std::thread::current();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
        main_thread.unpark();
    })?;
    Ok(stop)
}

fn permission_hint() {
    warn!("Enable Accessibility access in System Settings > Privacy & Security > Accessibility");
}

fn run_scroll(
    key: Option<TriggerKey>,
    sensitivity: Option<f64>,
    deceleration: Option<f64>,
    mut config: Config,
) -> anyhow::Result<()> {
    if let Some(key) = key {
        config.trigger.key = key;
    }
    if let Some(sensitivity) = sensitivity {
        config.tuning.sensitivity = sensitivity;
    }
    if let Some(deceleration) = deceleration {
        config.tuning.deceleration = deceleration;
    }
    config.validate()?;

    let emitter = platform_emitter(config.output.unit, config.output.invert)?;
    let source = platform_event_source(config.trigger.key)?;
    let scheduler = Arc::new(ThreadScheduler::new());

    let mut controller = ScrollController::new(config.tuning.clone(), emitter, scheduler)?
        .with_queue_capacity(config.capture.queue_size);
    controller.set_enabled(config.trigger.enabled);

    if let Err(e) = controller.start(source) {
        if matches!(e, drag_scroll::Error::PermissionDenied(_)) {
            permission_hint();
        }
        return Err(e.into());
    }

    let stop = stop_on_ctrlc()?;
    info!(
        trigger = ?config.trigger.key,
        sensitivity = config.tuning.sensitivity,
        "Hold the trigger key and move the pointer to scroll. Press Ctrl+C to stop"
    );

    while !stop.load(Ordering::SeqCst) {
        std::thread::park_timeout(Duration::from_secs(1));
    }

    let queue = controller.queue_stats();
    controller.shutdown();
    let stats = controller.stats();
    info!(
        samples = stats.pointer_samples,
        drag_deltas = stats.drag_deltas,
        momentum_deltas = stats.momentum_deltas,
        glides = stats.momentum_launches,
        "Stopped"
    );
    if let Some(queue) = queue {
        info!(
            pushed = queue.pushed,
            dropped = queue.dropped,
            peak = queue.peak,
            "Event queue"
        );
    }

    Ok(())
}

fn run_record(duration: u64, output: Option<String>, config: &Config) -> anyhow::Result<()> {
    let name = output.unwrap_or_else(|| {
        chrono::Local::now()
            .format("trace_%Y%m%d_%H%M%S")
            .to_string()
    });

    let mut source = platform_event_source(config.trigger.key)?;
    let stop = stop_on_ctrlc()?;
    let options = RecordOptions {
        name: name.clone(),
        trigger: config.trigger.key,
        duration: (duration > 0).then(|| Duration::from_secs(duration)),
        queue_capacity: config.capture.queue_size,
    };

    if duration > 0 {
        info!("Recording for {} seconds... Press Ctrl+C to stop early", duration);
    } else {
        info!("Recording... Press Ctrl+C to stop");
    }

    let trace = match record(source.as_mut(), &options, &stop) {
        Ok(trace) => trace,
        Err(e) => {
            if matches!(e, drag_scroll::Error::PermissionDenied(_)) {
                permission_hint();
            }
            return Err(e.into());
        }
    };

    info!(
        "Captured {} events over {:.1}s",
        trace.len(),
        trace.metadata.duration_ms as f64 / 1000.0
    );

    let traces_dir = Cli::traces_dir();
    std::fs::create_dir_all(&traces_dir)?;
    let output_path = traces_dir.join(format!("{}.json", name));
    trace.save(&output_path)?;
    println!("Saved trace to {}", output_path.display());

    Ok(())
}

fn run_replay(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("Trace file not found: {:?}", path);
    }

    let trace = Trace::load(path)?.rebased();
    info!(
        "Loaded trace '{}' with {} events",
        trace.metadata.name,
        trace.len()
    );

    let playback = TracePlayer::new(config.tuning.clone())?.play(&trace)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&playback)?);
        return Ok(());
    }

    for delta in &playback.deltas {
        let origin = match delta.origin {
            DeltaOrigin::Drag => "drag",
            DeltaOrigin::Momentum => "glide",
        };
        println!(
            "{:>10.3} ms  {:<5}  dx {:>9.3}  dy {:>9.3}",
            delta.at.as_secs_f64() * 1000.0,
            origin,
            delta.dx,
            delta.dy
        );
    }

    let (x, y) = playback.total();
    println!("\nReplay Summary");
    println!("  Drag deltas: {}", playback.count(DeltaOrigin::Drag));
    println!("  Glide deltas: {}", playback.count(DeltaOrigin::Momentum));
    println!("  Glides: {}", playback.stats.momentum_launches);
    println!("  Total: ({:.2}, {:.2})", x, y);
    println!("  Final phase: {:?}", playback.final_phase);

    Ok(())
}

fn run_list(detailed: bool) -> anyhow::Result<()> {
    let traces_dir = Cli::traces_dir();

    if !traces_dir.exists() {
        println!("No traces found in {}", traces_dir.display());
        println!("Record one with: drag-scroll record");
        return Ok(());
    }

    println!("Traces in {:?}:", traces_dir);

    let mut entries: Vec<_> = std::fs::read_dir(&traces_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();

    entries.sort_by_key(|e| e.path());

    for entry in &entries {
        let path = entry.path();
        let file_name = path.file_name().unwrap_or_default().to_string_lossy();

        if detailed {
            match Trace::load(&path) {
                Ok(trace) => {
                    let m = &trace.metadata;
                    println!(
                        "  {}  ({} events, {:.1}s, trigger: {:?}, recorded {})",
                        file_name,
                        m.event_count,
                        m.duration_ms as f64 / 1000.0,
                        m.trigger,
                        m.started_at.format("%Y-%m-%d %H:%M")
                    );
                }
                Err(_) => {
                    let fs_meta = entry.metadata()?;
                    println!("  {}  ({} bytes, failed to parse)", file_name, fs_meta.len());
                }
            }
        } else {
            println!("  {}", file_name);
        }
    }

    if entries.is_empty() {
        println!("  (none)");
        println!("Record one with: drag-scroll record");
    }

    Ok(())
}

fn run_permissions(request: bool) -> anyhow::Result<()> {
    if !cfg!(target_os = "macos") {
        println!("Accessibility access only applies on macOS");
        return Ok(());
    }

    let trusted = if request {
        capture::request_accessibility()
    } else {
        capture::accessibility_trusted()
    };

    if trusted {
        println!("Accessibility access: granted");
    } else {
        println!("Accessibility access: missing");
        println!("  System Settings > Privacy & Security > Accessibility");
        if !request {
            println!("  Run 'drag-scroll permissions --request' to show the system prompt");
        }
    }
    Ok(())
}

fn run_init(force: bool, config: &Config) -> anyhow::Result<()> {
    let config_path = Config::default_path();

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    config.save_default()?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);

    std::fs::create_dir_all(Cli::traces_dir())?;
    println!("\nTraces: {:?}", Cli::traces_dir());

    Ok(())
}

fn run_config(action: ConfigAction, path: Option<&Path>, config: Config) -> anyhow::Result<()> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Get { key } => {
            println!("{} = {}", key, config.get(&key)?);
        }
        ConfigAction::Set { key, value } => {
            if !config_path.exists() {
                anyhow::bail!("No config file found. Run 'drag-scroll init' first.");
            }
            let mut config = config;
            config.set(&key, &value)?;
            config.save(&config_path)?;
            println!("Set {} = {}", key, config.get(&key)?);
        }
        ConfigAction::Reset { force } => {
            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }

            Config::default().save(&config_path)?;
            println!("Configuration reset to defaults at {:?}", config_path);
        }
    }

    Ok(())
}
