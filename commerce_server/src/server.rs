use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use commerce_engine::{
    events::EventProducers, sqlite, LedgerApi, LifecycleDispatcher, OrderFlowApi, SqliteDatabase,
};
use log::info;

use crate::{config::ServerConfig, errors::ServerError, routes, sweeper::start_sweep_worker};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    sqlite::run_migrations(db.pool()).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database ready at {}", config.database_url);

    let _sweeper = start_sweep_worker(db.clone(), EventProducers::default(), &config);
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), EventProducers::default())
            .with_intent_ttl(config.intent_ttl)
            .with_zombie_threshold(config.zombie_threshold);
        let dispatcher = LifecycleDispatcher::from_parts(orders_api, LedgerApi::new(db.clone()));
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("commerce::access_log"))
            .app_data(web::Data::new(dispatcher))
            .app_data(web::Data::new(config.clone()))
            .service(routes::health)
            .service(routes::checkout)
            .service(routes::payment_webhook)
            .service(
                web::scope("/api")
                    .service(routes::list_orders)
                    .service(routes::order_details)
                    .service(routes::update_order_status)
                    .service(routes::refund_order)
                    .service(routes::increase_stock)
                    .service(routes::list_periods)
                    .service(routes::create_period)
                    .service(routes::preview_period_close)
                    .service(routes::close_period)
                    .service(routes::reopen_period)
                    .service(routes::trial_balance),
            )
    })
    .bind(bind_addr)?
    .run();
    Ok(srv)
}
