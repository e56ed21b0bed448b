use clap::Parser;
use co2watch::bus::PointBus;
use co2watch::config::Config;
use co2watch::discovery::{self, BootstrapPlan};
use co2watch::error::ConfigError;
use co2watch::group::{GroupController, RecoverySchedule, Role, SensorGroup, ValidityTracker};
use co2watch::input::StdinCollector;
use co2watch::points::PointEvent;
use co2watch::registry::MemoryRegistry;
use co2watch::surface::Surface;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinSet;

/// Command-line arguments for the CO2 watcher
#[derive(Parser)]
#[command(
    name = "co2watch",
    about = "CO2 sensor group watcher - aggregation, health bands, and trust tracking",
    long_about = "A daemon that discovers a group of CO2 sensors, aggregates their readings \
                  into one synthetic value, classifies it into health bands, and tracks which \
                  sensors are currently trustworthy. Point updates are read from stdin as \
                  newline-delimited JSON."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
            // Missing files are handled gracefully by load_config, which
            // warns and falls back to defaults.
        }

        Ok(())
    }
}

/// Everything the event loop can be woken by
#[derive(Debug)]
enum LoopEvent {
    /// An externally-originated point update
    Point(PointEvent),
    /// A member's recovery debounce window elapsed
    Recovery {
        group: usize,
        member: usize,
        generation: u64,
    },
    /// Shut the daemon down
    Shutdown,
}

/// What woke the event loop up
enum Wake {
    Bootstrap(Result<(usize, Result<SensorGroup, co2watch::DiscoveryError>), tokio::task::JoinError>),
    Loop(Option<LoopEvent>),
}

/// Main application struct that owns all watcher components
///
/// The watcher runs a single-threaded event loop: group bootstraps, point
/// updates, debounce expiries, and shutdown all arrive as serialized events,
/// so group state is only ever touched by one handler at a time.
struct Co2Watcher {
    config: Config,
    registry: Arc<Mutex<MemoryRegistry>>,
    bus: PointBus<(usize, Role)>,
    controllers: Vec<Option<GroupController>>,
    event_tx: Sender<LoopEvent>,
    event_rx: Receiver<LoopEvent>,
    point_rx: Option<Receiver<PointEvent>>,
}

impl Co2Watcher {
    /// Create the watcher and the channel ends its collaborators need
    fn new(config: Config) -> (Self, Sender<PointEvent>, Sender<LoopEvent>) {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (point_tx, point_rx) = mpsc::channel(1024);
        let controllers = (0..config.groups.len()).map(|_| None).collect();

        let watcher = Self {
            config,
            registry: Arc::new(Mutex::new(MemoryRegistry::new())),
            bus: PointBus::new(),
            controllers,
            event_tx: event_tx.clone(),
            event_rx,
            point_rx: Some(point_rx),
        };
        (watcher, point_tx, event_tx)
    }

    /// Load configuration from file or use defaults
    fn load_config(config_path: Option<&PathBuf>) -> Result<Config, ConfigError> {
        match config_path {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                match Config::from_file(path) {
                    Ok(config) => Ok(config),
                    Err(ConfigError::ReadError(e)) => {
                        warn!("Configuration file unreadable ({}), using defaults", e);
                        Ok(Config::default())
                    }
                    Err(e) => {
                        error!("Configuration error in '{}': {}", path.display(), e);
                        warn!("Using default configuration due to invalid config file");
                        Ok(Config::default())
                    }
                }
            }
            None => {
                info!("Using default configuration");
                Ok(Config::default())
            }
        }
    }

    /// Run the event loop until shutdown
    async fn run(mut self) {
        // Forward bridged point updates into the loop's single queue.
        let mut point_rx = self.point_rx.take().expect("point receiver taken twice");
        let forward_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = point_rx.recv().await {
                if forward_tx.send(LoopEvent::Point(event)).await.is_err() {
                    break;
                }
            }
        });

        // Bootstraps run as loop-local tasks so point updates keep landing
        // in the registry while discovery polls it.
        let mut bootstraps = JoinSet::new();
        for (id, group_config) in self.config.groups.iter().enumerate() {
            let targets = match group_config.target_addresses() {
                Ok(targets) => targets,
                Err(e) => {
                    error!("{}", e);
                    continue;
                }
            };
            let plan = BootstrapPlan {
                name: group_config.name.clone(),
                targets,
                probe_interval: self.config.probe_interval(),
                probe_attempts: self.config.discovery.probe_attempts,
            };
            let registry = Arc::clone(&self.registry);
            info!(
                "[{}] starting discovery for group '{}'",
                plan.name,
                group_config.display_title()
            );
            bootstraps
                .spawn(async move { (id, discovery::bootstrap(&registry, &plan).await) });
        }

        loop {
            // The select only borrows the receivers; the wake is handled
            // afterwards so the handlers get the whole watcher.
            let wake = tokio::select! {
                Some(joined) = bootstraps.join_next(), if !bootstraps.is_empty() => {
                    Wake::Bootstrap(joined)
                }
                event = self.event_rx.recv() => Wake::Loop(event),
            };

            match wake {
                Wake::Bootstrap(Ok((id, Ok(group)))) => self.install_group(id, group),
                Wake::Bootstrap(Ok((_, Err(e)))) => error!("Group not started: {}", e),
                Wake::Bootstrap(Err(e)) => error!("Bootstrap task failed: {}", e),
                Wake::Loop(Some(LoopEvent::Point(point_event))) => self.handle_point(point_event),
                Wake::Loop(Some(LoopEvent::Recovery {
                    group,
                    member,
                    generation,
                })) => self.handle_recovery(group, member, generation),
                Wake::Loop(Some(LoopEvent::Shutdown)) | Wake::Loop(None) => {
                    info!("Shutting down event loop");
                    break;
                }
            }
        }
    }

    /// Wire a freshly bootstrapped group into the loop
    fn install_group(&mut self, id: usize, group: SensorGroup) {
        let validity =
            ValidityTracker::new(self.config.recovery_debounce(), group.member_count());
        let surface = Surface::create(Arc::clone(&self.registry), &group);
        let controller = GroupController::new(group, validity, surface);

        for (address, role) in controller.subscriptions() {
            self.bus.subscribe(address, (id, role));
        }
        info!(
            "[{}] tracking {} sensor(s)",
            controller.group().display_name(),
            controller.group().member_count()
        );
        self.controllers[id] = Some(controller);
    }

    /// Apply one point update and route it through the bus
    fn handle_point(&mut self, event: PointEvent) {
        debug!(
            "Point update {} = {} at {}",
            event.address, event.value, event.timestamp
        );
        self.registry
            .lock()
            .unwrap()
            .set_value(&event.address, event.value.clone());

        let tokens: Vec<(usize, Role)> = self.bus.subscribers(&event.address).to_vec();
        for (id, role) in tokens {
            if let Some(controller) = self.controllers[id].as_mut() {
                if let Some(schedule) = controller.handle(role, &event.value, event.timestamp) {
                    self.spawn_recovery(id, schedule);
                }
            }
        }
    }

    /// Deliver a debounce expiry to its group
    fn handle_recovery(&mut self, group: usize, member: usize, generation: u64) {
        if let Some(controller) = self.controllers[group].as_mut() {
            controller.on_recovery_elapsed(member, generation);
        }
    }

    /// Sleep out a recovery window, then deliver it back into the loop
    fn spawn_recovery(&self, group: usize, schedule: RecoverySchedule) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(schedule.delay).await;
            let _ = tx
                .send(LoopEvent::Recovery {
                    group,
                    member: schedule.member,
                    generation: schedule.generation,
                })
                .await;
        });
    }
}

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting CO2 watcher");

    // Validate CLI arguments
    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config = match Co2Watcher::load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.groups.is_empty() {
        error!("No sensor groups configured; nothing to watch");
        std::process::exit(1);
    }

    let (watcher, point_tx, event_tx) = Co2Watcher::new(config);

    // Set up signal handling for graceful shutdown (SIGINT)
    let shutdown_tx = event_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        let _ = shutdown_tx.try_send(LoopEvent::Shutdown);
    }) {
        error!("Error setting SIGINT handler: {}", e);
        std::process::exit(1);
    }

    // Start the input bridge feeding point updates from stdin
    let mut collector = StdinCollector::new(point_tx);
    collector.start();

    // All group state lives on this one thread; handlers run to completion.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build runtime: {}", e);
            std::process::exit(1);
        }
    };

    info!("CO2 watcher is running. Press Ctrl+C to stop.");
    runtime.block_on(watcher.run());

    collector.stop();
    info!("CO2 watcher shutdown complete");
}
