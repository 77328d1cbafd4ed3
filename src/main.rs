#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod cli;
mod config;
mod db;
mod lifecycle;
mod relay;
mod utils;
mod web;

use config::Config;
use relay::{ChatRelay, TopicRegistry};
use web::WebServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let config = Arc::new(Config::load_from_file(&args.config)?);
    utils::logging::init_tracing(&config.logging.level, &config.logging.format);

    if args.check_config {
        info!("configuration OK");
        return Ok(());
    }

    info!("mentor relay starting up");

    let db_manager = Arc::new(db::DatabaseManager::new(&config.database).await?);
    db_manager.migrate().await?;

    let topics = Arc::new(TopicRegistry::new());
    let chat_relay = Arc::new(ChatRelay::new(
        db_manager.clone(),
        topics,
        config.relay.max_content_length,
    ));

    let web_server = WebServer::new(config.clone(), db_manager, chat_relay).await?;
    web_server.start().await?;

    info!("mentor relay shutting down");
    Ok(())
}
