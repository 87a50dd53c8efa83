//! Headless OpenMMO client: logs in, optionally enters the world with the
//! first character, and runs the tick loop.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use openmmo_client::{ClientContext, TickLoop, settings};
use openmmo_config::{CliArgs, Config, default_config_dir};
use openmmo_multiplayer::ReplicationEvent;
use openmmo_net::TcpTransport;
use openmmo_ui::{Screen, UiEvent};
use tracing::{error, info};

const IDLE_SLEEP: Duration = Duration::from_millis(5);

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| "openmmo".into());

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    openmmo_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let (Some(username), Some(password)) = (args.username.as_deref(), args.password.as_deref())
    else {
        error!("--username and --password are required");
        return ExitCode::FAILURE;
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("openmmo-net")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start network runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let transport = TcpTransport::new(runtime.handle().clone(), settings::frame_config(&config))
        .with_inbound_capacity(config.network.inbound_queue_capacity);
    let mut client = ClientContext::new(transport, &config);

    let start = Instant::now();
    if let Err(e) = client.submit_login(username, password, start) {
        error!("Login failed: {e}");
        return ExitCode::FAILURE;
    }

    let deadline = args.run_secs.map(|secs| start + Duration::from_secs(secs));
    let mut ticks = TickLoop::new(start);
    let mut select_requested = false;

    loop {
        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            info!("Run time elapsed");
            break;
        }

        ticks.advance(now, |dt| client.tick(dt as f32, now));

        for event in client.drain_ui_events().collect::<Vec<_>>() {
            match event {
                UiEvent::StateChanged { from, to } => {
                    info!("{from:?} -> {to:?}");
                    if to == Screen::Login
                        && let Some(message) = client.ui().error_message()
                    {
                        info!("Login screen message: {message}");
                    }
                }
                UiEvent::TimedOut(kind) => info!("{}", kind.message()),
                UiEvent::CharacterHighlighted(_) => {}
            }
        }

        for event in client.drain_replication_events().collect::<Vec<_>>() {
            match event {
                ReplicationEvent::Spawned(id) => info!(id, "Entity spawned"),
                ReplicationEvent::Despawned(id) => info!(id, "Entity despawned"),
                ReplicationEvent::LocalPlayerChanged { previous, current } => {
                    info!(?previous, ?current, "Local player changed");
                }
                ReplicationEvent::Updated(_) => {}
            }
        }

        match client.ui().screen() {
            Screen::CharacterSelect if args.auto_select && !select_requested => {
                select_requested = true;
                match client.ui().characters().first().map(|c| c.id) {
                    Some(id) => {
                        client.highlight_character(id);
                        if let Err(e) = client.submit_select_character(id, now) {
                            error!("Character selection failed: {e}");
                        }
                    }
                    None => info!("No characters on this account"),
                }
            }
            Screen::Login if ticks.tick_count() > 0 && client.ui().error_message().is_some() => {
                break;
            }
            _ => {}
        }

        std::thread::sleep(IDLE_SLEEP);
    }

    let position = client.predictor().position();
    info!(
        ticks = ticks.tick_count(),
        entities = client.store().len(),
        "Shutting down at ({:.2}, {:.2}, {:.2})",
        position.x,
        position.y,
        position.z
    );
    client.logout();
    ExitCode::SUCCESS
}
