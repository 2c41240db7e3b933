mod config;
mod db;
mod importer;
mod job_controller;
mod services;

use crate::config::ServerConfig;
use crate::job_controller::state::JobsState;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = ServerConfig::from_env().map_err(io::Error::other)?;
    let url = format!("http://{}:{}", config.host, config.port);

    // Initialize job controller state
    let (jobs_state, rx) = JobsState::new(config.job_ttl);

    // Start job updater and eviction tasks
    let updater_state = jobs_state.clone();
    tokio::spawn(async move {
        job_controller::state::start_job_updater(updater_state, rx).await;
    });
    let evictor_state = jobs_state.clone();
    let eviction_interval = config.eviction_interval;
    tokio::spawn(async move {
        job_controller::state::start_job_evictor(evictor_state, eviction_interval).await;
    });

    info!(
        "Server running at {} (database {})",
        url,
        config.database_path.display()
    );

    let bind = (config.host.clone(), config.port);
    let config = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .app_data(config.clone())
            .app_data(web::Data::new(jobs_state.clone()))
            .service(services::import::configure_routes())
    })
    .bind(bind)?
    .run()
    .await
}
