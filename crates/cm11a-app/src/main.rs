//! x10-switch: turn one X10 module on or off through a CM11A
//!
//! Usage:
//!   x10-switch [CONFIG.json]
//!   x10-switch --list-ports
//!
//! Without a config file the defaults apply: /dev/ttyS0, module A2, "on".
//! Set RUST_LOG=debug to trace every byte.

#[cfg(unix)]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use cm11a_app::{AppConfig, SwitchHandler, SwitchSession};
    use cm11a_core::protocol::{Engine, SerialTransport};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let arg = std::env::args().nth(1);
    if arg.as_deref() == Some("--list-ports") {
        for port in cm11a_core::protocol::list_ports() {
            println!("{}", cm11a_app::describe_port(&port));
        }
        return Ok(());
    }

    let config = match arg {
        Some(path) => AppConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path))?,
        None => AppConfig::default(),
    };
    info!(
        "switching {}{} {:?} via {}",
        config.house, config.unit, config.function, config.serial.port_name
    );

    let session = SwitchSession::new(&config).context("building frames")?;
    let transport = SerialTransport::open(&config.serial)
        .with_context(|| format!("opening {}", config.serial.port_name))?;
    let mut engine = Engine::with_handler(transport, session, SwitchHandler);

    let result = cm11a_app::run(&mut engine, &config);
    let (rx, tx) = engine.get_counters();
    engine.close();
    let state = result.context("handshake failed")?;

    info!("finished in {:?} (rx {} bytes, tx {} bytes)", state, rx, tx);
    Ok(())
}

#[cfg(not(unix))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("x10-switch needs a pollable unix serial device")
}
