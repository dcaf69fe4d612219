use clap::{Parser, Subcommand};
use serial_session::config::{Config, ConfigLoader};
use serial_session::{init_tracing, list_available_channels, Session, SessionConfig};
use std::path::PathBuf;
use tokio::signal;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Talk to a serial device through a self-healing session.",
    long_about = "Opens a serial port with fixed framing, serializes all I/O, and reconnects on its own after repeated failures or a lost device."
)]
struct Args {
    /// Configuration file (defaults to the standard search path).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serial port to use, overriding the configuration file.
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate, overriding the configuration file.
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports present on this machine.
    List {
        /// Print the list as a JSON array.
        #[arg(long)]
        json: bool,
    },
    /// Send one request and print the reply.
    Send {
        /// Text to send.
        data: String,
        /// Append CR LF to the request.
        #[arg(long)]
        crlf: bool,
        /// Wait between write and read, in milliseconds.
        #[arg(long)]
        read_delay_ms: Option<u64>,
    },
    /// Keep the port connected and report status changes until Ctrl-C.
    Monitor {
        /// Delay between reconnect attempts, in milliseconds.
        #[arg(long)]
        retry_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => match ConfigLoader::load() {
            Ok(loader) => loader.into_config(),
            Err(e) => {
                eprintln!("Warning: Failed to load config, using defaults: {}", e);
                ConfigLoader::with_defaults().into_config()
            }
        },
    };
    init_tracing(&config.logging);

    if let Some(port) = &args.port {
        config.session.port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.session.baud_rate = baud;
    }

    match args.command {
        Command::List { json } => {
            let channels = list_available_channels();
            if json {
                println!("{}", serde_json::to_string_pretty(&channels)?);
            } else if channels.is_empty() {
                println!("No serial ports found.");
            } else {
                for channel in channels {
                    println!("{}", channel);
                }
            }
        }
        Command::Send {
            data,
            crlf,
            read_delay_ms,
        } => {
            if let Some(ms) = read_delay_ms {
                config.session.read_delay_ms = ms;
            }
            config.session.auto_reconnect = false;
            let session = Session::new(session_config(&config)?);
            session.start().await;

            let mut request = data;
            if crlf {
                request.push_str("\r\n");
            }
            let reply = session.send_receive_text(&request).await;
            session.stop().await;

            match reply {
                Some(reply) => println!("{}", reply.trim_end()),
                None => {
                    eprintln!("No reply from {}", config.session.port.unwrap_or_default());
                    std::process::exit(1);
                }
            }
        }
        Command::Monitor { retry_ms } => {
            if let Some(ms) = retry_ms {
                config.session.retry_delay_ms = ms;
            }
            config.session.auto_reconnect = true;
            let session = Session::new(session_config(&config)?);
            let mut status = session.subscribe();
            session.start().await;
            println!("Monitoring {} (Ctrl-C to stop)", session.channel_id());

            let shutdown = shutdown_signal();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let connected = *status.borrow_and_update();
                        println!("{}: {}", session.channel_id(), if connected { "connected" } else { "disconnected" });
                    }
                }
            }

            session.stop().await;
        }
    }

    Ok(())
}

fn session_config(config: &Config) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let session_config = config.session.to_builder()?.build()?;
    tracing::debug!("Using {:?}", session_config);
    Ok(session_config)
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            eprintln!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("\nSignal received, shutting down...");
}
