use clap::{Parser, Subcommand};

use crate::config::StorageKind;

/// Inbox: notification read-state service
#[derive(Parser)]
#[command(name = "inbox", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the notification server
    Serve {
        /// Port to bind (overrides INBOX_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Storage backend (overrides INBOX_STORAGE)
        #[arg(long, value_enum)]
        storage: Option<StorageKind>,
    },

    /// Apply pending database migrations
    Migrate,

    /// Inspect and manage stored notifications
    Notification {
        #[command(subcommand)]
        command: NotificationCommands,
    },

    /// Mint a user token signed with INBOX_JWT_SECRET (local testing)
    Token {
        #[arg(long)]
        user_id: String,
        /// Lifetime in minutes
        #[arg(long, default_value = "60")]
        ttl_minutes: i64,
    },
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// Insert a notification for a user
    Create {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        chat_id: String,
        #[arg(long)]
        message_id: Option<String>,
        /// direct_message | group_message | mention | reaction | invitation
        #[arg(long = "type", default_value = "direct_message")]
        kind: String,
        #[arg(long)]
        content: String,
    },
    /// List a user's notifications, newest first
    List {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value = "1")]
        page: i64,
        #[arg(long, default_value = "20")]
        page_size: i64,
        /// Include notifications that were already read
        #[arg(long)]
        all: bool,
    },
    /// Print a user's unread count
    Unread {
        #[arg(long)]
        user_id: String,
    },
    /// Run the retention purge once
    Purge {
        /// Override INBOX_READ_RETENTION_DAYS
        #[arg(long)]
        days: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_flags_parse() {
        let cli = Cli::parse_from(["inbox", "serve", "--port", "9000", "--storage", "memory"]);
        match cli.command {
            Some(Commands::Serve { port, storage }) => {
                assert_eq!(port, Some(9000));
                assert_eq!(storage, Some(StorageKind::Memory));
            }
            _ => panic!("expected serve"),
        }
    }
}
