use buzzbutton::config::{Cli, Config};
use buzzbutton::controller::MonitorHandle;
use buzzbutton::hardware::gpio::RppalBackend;
use buzzbutton::hardware::HardwareBackend;
use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let cli = Cli::parse();

    if cli.init_config {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::default_path()
                .ok_or_else(|| eyre!("No config directory available"))?,
        };
        Config::ensure_default_config(&path).wrap_err("Failed to write default config")?;
        return Ok(());
    }

    let config = Config::resolve(&cli).wrap_err("Failed to load configuration")?;

    info!(
        "Acquiring GPIO: button on BCM {}, buzzer on BCM {}",
        config.input_pin, config.output_pin
    );
    let pins = RppalBackend::new()
        .acquire(config.pins())
        .wrap_err("Failed to acquire GPIO pins")?;

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let handle = MonitorHandle::spawn(pins, Some(config.monitor_settings()), cancel);

    info!("Press the button to activate the buzzer...");

    let summary = handle.join().await.wrap_err("Button monitor failed")?;
    debug!("Run summary: {:?}", summary);
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

// Cancel on Ctrl-C or SIGTERM
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Unable to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = ctrl_c => {
                if let Err(e) = result {
                    warn!("Unable to listen for Ctrl-C: {}", e);
                    return;
                }
                info!("Interrupt received");
            }
            _ = terminate => info!("Terminate signal received"),
        }
        cancel.cancel();
    });
}
