mod config;
mod database;
mod error;
mod film_service;
mod handlers;
mod model;
mod search;
mod user_service;
mod validation;

use actix_web::{middleware::Logger, App, HttpServer};
use config::{Config, DEFAULT_LOG_FILTER};
use film_service::FilmService;
use log::info;
use std::io;
use user_service::UserService;

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .init();
    let config = Config::from_env();

    // Lives as long as the process; nothing is written to disk.
    let db = sled::Config::new()
        .temporary(true)
        .open()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    let users = UserService::new(db.clone());
    let films = FilmService::new(db);

    info!("Listening on {}", config.addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .data(users.clone())
            .data(films.clone())
            .configure(handlers::configure)
    })
    .bind(config.addr.as_str())?
    .run()
    .await
}
