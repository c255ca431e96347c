use tracing_subscriber::{EnvFilter, prelude::*};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();

    if let Err(err) = game_deals_bot::run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
