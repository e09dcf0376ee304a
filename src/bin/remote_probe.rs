//! remote-probe - exercise a mobile-remote server from the command line
//!
//! Usage:
//!   remote-probe 127.0.0.1:40000
//!   remote-probe 127.0.0.1:40000 --camera 0,0,5,0,0,0,0,1,0 --heartbeats 10

use clap::Parser;
use mobile_remote::{CameraState, Error, RemoteClient, Result};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "remote-probe", about = "Probe a mobile-remote server")]
struct Args {
    /// Server address (host:port)
    address: String,

    /// Camera state to send: nine comma-separated floats
    /// (position, focal point, view-up)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    camera: Option<Vec<f32>>,

    /// Number of heartbeat round trips to time
    #[arg(long, default_value_t = 3)]
    heartbeats: u32,

    /// I/O timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("remote-probe: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let mut client = RemoteClient::connect(&args.address)?;
    client.set_timeout(Some(Duration::from_millis(args.timeout_ms)))?;
    println!("Connected to {}", client.peer_addr());

    client.ready()?;

    for i in 0..args.heartbeats {
        let rtt = client.heartbeat()?;
        println!("Heartbeat {}: {:.3} ms", i + 1, rtt.as_secs_f64() * 1000.0);
    }

    let metadata = client.request_metadata()?;
    println!("Metadata ({} bytes):", metadata.len());
    println!("{}", String::from_utf8_lossy(&metadata));

    let objects = client.request_objects()?;
    println!("Objects: {}", objects.len());
    for (i, object) in objects.iter().enumerate() {
        println!("  [{}] {} bytes", i, object.len());
    }

    if let Some(values) = &args.camera {
        if values.len() != 9 {
            return Err(Error::Config(format!(
                "--camera expects 9 values, got {}",
                values.len()
            )));
        }
        let state = CameraState::new(
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
            [values[6], values[7], values[8]],
        );
        client.send_camera_state(&state)?;
        // Round trip so the state is known to be consumed before we hang up
        client.heartbeat()?;
        println!("Camera state sent: {:?}", state);
    }

    Ok(())
}
