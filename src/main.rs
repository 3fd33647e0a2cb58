use tracing::{error, info};

use warchest_hud::cli::{parse_args, USAGE};
use warchest_hud::config::Config;
use warchest_hud::logging;
use warchest_hud::service::Service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    logging::init(&config.log_level);

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    info!("starting warchest hud service");

    let service = match Service::init(config, args).await {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    if let Err(e) = service.run().await {
        error!(error = %e, "service exited with an error");
        std::process::exit(1);
    }

    info!("warchest hud service shut down cleanly");
    Ok(())
}
