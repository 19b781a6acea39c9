use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use logonorm::config::Settings;
use logonorm::server::routes;
use logonorm::util::init_tracing;
use logonorm::Normalizer;
use std::path::PathBuf;
use std::{env, process};

use tracing::info;

const USAGE: &str = "usage: ./logonorm [config file]";

fn get_args() -> Option<PathBuf> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        println!("{USAGE}");
        process::exit(1);
    }

    args.get(1).map(PathBuf::from)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load(get_args().as_deref())?;
    init_tracing(&settings.log);

    let normalizer = web::Data::new(Normalizer::new(settings.normalizer)?);
    let limit = settings.server.max_payload_bytes;
    let addr = settings.bind_addr();

    info!(
        "starting logonorm on {addr} with {:?}",
        normalizer.config()
    );

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(normalizer.clone())
            .app_data(web::JsonConfig::default().limit(limit))
            .app_data(web::PayloadConfig::new(limit))
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {addr}"))?
    .run()
    .await?;

    Ok(())
}
