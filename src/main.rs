use std::sync::Arc;

use chat_relay::config::Config;
use chat_relay::server::Server;
use chat_relay::{routes, tls};
use log::{error, info, warn};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let server = Arc::new(Server::new(&config));
    let routes = routes::build(server, &config);

    let tls_paths = config.tls.as_ref().filter(|paths| match tls::check_tls_material(paths) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to load TLS material: {e}");
            false
        }
    });

    match tls_paths {
        Some(paths) => {
            info!("Starting secure relay (HTTPS/WSS) on {}", config.addr);
            warp::serve(routes)
                .tls()
                .cert_path(&paths.cert)
                .key_path(&paths.key)
                .run(config.addr)
                .await;
        }
        None => {
            if config.tls.is_some() {
                warn!("Falling back to HTTP/WS");
            }
            info!("Starting relay (HTTP/WS) on {}", config.addr);
            warp::serve(routes).run(config.addr).await;
        }
    }
}
