//! mobile-remote - remote-control daemon serving a demo scene
//!
//! ## Threads
//!
//! - **main**: owner of the scene. Services export requests and applies
//!   camera updates (~60 Hz).
//! - **remote-control**: session thread serving one mobile client at a time.

use clap::Parser;
use crossbeam_channel::{after, select};
use log::{error, info};
use mobile_remote::config::RemoteConfig;
use mobile_remote::demo::DemoScene;
use mobile_remote::{RemoteControl, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Owner loop frame interval
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(name = "mobile-remote", version, about = "Mobile remote-control server")]
struct Args {
    /// Path to TOML configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<String>,
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RemoteConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RemoteConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    if let Err(e) = run(&config) {
        error!("mobile-remote failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: &RemoteConfig) -> Result<()> {
    info!("mobile-remote v{} starting", env!("CARGO_PKG_VERSION"));

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| mobile_remote::Error::Thread(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut remote = RemoteControl::from_config(config);
    let addr = remote.create_server(config.server.port)?;
    remote.start()?;
    info!("Serving demo scene on {}. Press Ctrl-C to stop.", addr);

    let mut scene = DemoScene::with_cube();
    let export_requests = remote.export_requests();

    while running.load(Ordering::SeqCst) {
        select! {
            recv(export_requests) -> _ => {
                remote.export_scene(&mut scene);
            }
            recv(after(FRAME_INTERVAL)) -> _ => {}
        }

        if remote.apply_camera_update(&mut scene) {
            info!(
                "Camera moved: position {:?}, focal point {:?}, view-up {:?}",
                scene.camera.position, scene.camera.focal_point, scene.camera.view_up
            );
        }
    }

    info!("Shutting down...");
    remote.should_quit();
    remote.wait()?;

    let stats = remote.stats();
    info!(
        "mobile-remote stopped ({} connections, {} commands, {} redraws)",
        stats.connections, stats.commands, scene.redraw_requests
    );
    Ok(())
}
