use kiss_proxy::cache::CacheEngine;
use kiss_proxy::config::Config;
use kiss_proxy::{net, pipeline};
use tokio::signal;

#[tokio::main]
async fn main() {
    let config = Config::parse_args();

    let mut cache = if config.caching_enabled { Some(CacheEngine::new()) } else { None };

    let listener = match net::bind_listener(config.listen_port) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind listening socket: {e}");
            std::process::exit(1);
        }
    };

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((mut stream, _addr)) => {
                        println!("Accepted");
                        let _ = std::io::Write::flush(&mut std::io::stdout());

                        if let Err(e) = pipeline::handle_connection(&mut stream, &mut cache).await {
                            eprintln!("{e}");
                        }
                    }
                    Err(e) => {
                        eprintln!("accept: {e}");
                        continue;
                    }
                }
            }
            _ = shutdown_signal() => {
                break;
            }
        }
    }

    if let Some(engine) = cache.as_mut() {
        engine.drain();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
