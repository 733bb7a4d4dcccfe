use authstate_core::{
    clock::{Clock, SystemClock},
    credentials::{Credential, CredentialRegistry},
};
use authstate_credentials::CredentialStore;
use color_eyre::Result;
use uuid::Uuid;

use crate::{cli::CredentialCommand, config, storage};

/// Execute a credential subcommand against the encrypted store.
pub async fn handle(cmd: CredentialCommand, config: &config::Config) -> Result<()> {
    let registry = CredentialStore::new(storage::store_from_config(config)?);
    run(cmd, &registry, SystemClock.now_millis()).await
}

async fn run<R: CredentialRegistry>(cmd: CredentialCommand, registry: &R, now: i64) -> Result<()> {
    match cmd {
        CredentialCommand::List => {
            let credentials = registry.get_all_credentials().await?;
            if credentials.is_empty() {
                println!("No credentials yet. Add one with `authstate credential add`.");
                return Ok(());
            }
            let active = registry.get_active_credential_id().await?;
            for credential in credentials {
                let marker = if active.as_deref() == Some(credential.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {} [alg {}] {}",
                    credential.id,
                    credential.algorithm,
                    credential.name.as_deref().unwrap_or("(unnamed)")
                );
                println!("    created: {}", format_millis(credential.created_at));
                if let Some(last_used) = credential.last_used_at {
                    println!("    last used: {}", format_millis(last_used));
                }
            }
        }
        CredentialCommand::Add {
            id,
            public_key,
            raw_id,
            algorithm,
            name,
        } => {
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let raw_id = raw_id.unwrap_or_else(|| id.clone());
            let mut credential = Credential::new(id, raw_id, public_key, algorithm, now);
            credential.name = name;
            let id = credential.id.clone();
            registry.save_credential(credential).await?;
            println!("Saved credential {id}");
        }
        CredentialCommand::Remove { id } => {
            if registry.remove_credential(&id).await? {
                println!("Removed credential {id}");
            } else {
                println!("No credential with id {id}");
            }
        }
        CredentialCommand::Activate { id } => {
            if registry.get_credential(&id).await?.is_none() {
                color_eyre::eyre::bail!("unknown credential {id}");
            }
            registry.set_active_credential(&id).await?;
            println!("Active credential: {id}");
        }
        CredentialCommand::Active => match registry.get_active_credential().await? {
            Some(credential) => println!(
                "{} {}",
                credential.id,
                credential.name.as_deref().unwrap_or("(unnamed)")
            ),
            None => println!("No active credential."),
        },
        CredentialCommand::Clear => {
            registry.clear_all_credentials().await?;
            println!("Removed all credentials.");
        }
    }

    Ok(())
}

/// Render epoch milliseconds as RFC 3339, falling back to the raw number.
pub fn format_millis(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}
