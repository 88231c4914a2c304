use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bakery-relay")]
#[command(author, version, about = "LINE webhook relay for LLM conversations", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server
    Serve {
        /// Bind address (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single conversation turn against the completion API
    Chat {
        text: String,

        /// User identifier the turn is recorded under
        #[arg(short = 'u', long, default_value = "local")]
        user: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["bakery-relay", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_chat_defaults_user() {
        let cli = Cli::try_parse_from(["bakery-relay", "chat", "How long to proof dough?"]).unwrap();
        match cli.command {
            Commands::Chat { text, user } => {
                assert_eq!(text, "How long to proof dough?");
                assert_eq!(user, "local");
            }
            _ => panic!("expected chat"),
        }
    }
}
