use anyhow::Result;
use bakery_relay::cli::{Cli, Commands};
use bakery_relay::core::line::OutboundMessage;
use bakery_relay::reply::format_reply;
use bakery_relay::{utils, Settings, UserContent};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            bakery_relay::serve(settings).await
        }
        Commands::Chat { text, user } => handle_chat(settings, text, user).await,
    }
}

async fn handle_chat(settings: Settings, text: String, user: String) -> Result<()> {
    let conversations = bakery_relay::build_conversations(&settings)?;

    utils::print_info("Sending request...");
    let result = conversations.turn(&user, UserContent::Text(text)).await;
    conversations.shutdown().await?;

    match result {
        Ok(reply) => {
            utils::print_header(&format!("Reply for {}", user));
            let messages = format_reply(&reply, &settings.conversation.reply_delimiter);
            for (index, OutboundMessage::Text { text }) in messages.iter().enumerate() {
                utils::print_segment(index, text);
            }
            Ok(())
        }
        Err(e) => {
            utils::print_error(&format!("Turn failed: {}", e));
            Err(e.into())
        }
    }
}
