use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "authstate",
    about = "Local authentication state: credentials, sessions and encryption at rest",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to `session status` when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Round-trip a probe value through the encrypted store.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage registered credentials and the active credential.
    #[command(subcommand)]
    Credential(CredentialCommand),
    /// Start, inspect, refresh or end the local session.
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CredentialCommand {
    /// List registered credentials.
    List,
    /// Register (or replace) a credential returned by a signing ceremony.
    Add {
        /// Credential id; a random one is generated when omitted.
        #[arg(long)]
        id: Option<String>,
        /// Encoded public key.
        #[arg(long)]
        public_key: String,
        /// Encoded raw id; defaults to the credential id.
        #[arg(long)]
        raw_id: Option<String>,
        /// Signature algorithm identifier (-7 = ES256, -257 = RS256).
        #[arg(long, default_value_t = -7, allow_negative_numbers = true)]
        algorithm: i64,
        /// Human-friendly label.
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a credential (clears the active pointer if it referenced it).
    Remove { id: String },
    /// Point the active credential at an id.
    Activate { id: String },
    /// Show the active credential.
    Active,
    /// Remove every credential and the active pointer.
    Clear,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start a session for a registered credential.
    Start { credential_id: String },
    /// Show the current session, if any.
    Status,
    /// Record activity, sliding the inactivity window.
    Touch,
    /// End the current session.
    End,
}
