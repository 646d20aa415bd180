use actix_web::{web, App, HttpServer};
use log::info;
use log4rs;

use curio::app_state::AppState;
use curio::service::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    log4rs::init_file("server_log.yaml", Default::default()).unwrap();

    let app_state = AppState::new();
    let host = app_state.config.server.host.clone();
    let port = app_state.config.server.port;
    let workers = app_state.config.server.workers;
    info!("Starting server on {}:{}", host, port);

    let data = web::Data::new(app_state);
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(data.clone())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .workers(workers)
    .run()
    .await
}
