use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use labwire_server::features::example_registry;
use labwire_server::{DiscoveryOptions, Server, ServerOptions};
use labwire_transport::Security;

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{server_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let registry =
        example_registry().map_err(|err| server_error("registry construction failed", err))?;

    let discovery = if args.no_announce {
        None
    } else {
        let mut discovery = DiscoveryOptions::default();
        if let Some(addr) = &args.announce_addr {
            discovery.announce_addr = addr.clone();
        }
        discovery.interval = parse_duration(&args.announce_interval)?;
        Some(discovery)
    };

    let mut options = ServerOptions::new(&args.server_type);
    options.bind_host = args.host.clone();
    options.port = args.port;
    options.security = Security::from_flag(args.encrypted);
    options.config_path = args.config.clone();
    options.discovery = discovery;

    let mut server =
        Server::start(registry, options).map_err(|err| server_error("server start failed", err))?;

    println!(
        "{} listening on {}:{} (uuid {})",
        args.server_type,
        args.host,
        server.port(),
        server.uuid()
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    server.stop();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
