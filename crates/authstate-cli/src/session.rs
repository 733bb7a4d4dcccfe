use std::time::Duration;

use authstate_core::{
    credentials::CredentialRegistry, session::ExpirationReason, storage::KeyValueStore,
};
use authstate_credentials::CredentialStore;
use authstate_session::SessionManager;
use color_eyre::Result;

use crate::{cli::SessionCommand, config, credentials::format_millis, storage};

/// Execute a session subcommand. Timers only live for this process, so every
/// command re-validates the persisted session on its way in.
pub async fn handle(cmd: SessionCommand, cfg: &config::Config) -> Result<()> {
    let store = storage::store_from_config(cfg)?;
    let registry = CredentialStore::new(store.clone());
    let manager = SessionManager::new(store, cfg.session_config());
    manager.subscribe(|reason: ExpirationReason| println!("Session ended ({reason})."));

    let result = run(cmd, &registry, &manager).await;
    manager.destroy();
    result
}

async fn run<S, R>(cmd: SessionCommand, registry: &R, manager: &SessionManager<S>) -> Result<()>
where
    S: KeyValueStore + 'static,
    R: CredentialRegistry,
{
    match cmd {
        SessionCommand::Start { credential_id } => {
            if registry.get_credential(&credential_id).await?.is_none() {
                color_eyre::eyre::bail!(
                    "unknown credential {credential_id}; add it with `authstate credential add`"
                );
            }
            registry.set_active_credential(&credential_id).await?;
            let view = manager.start_session(&credential_id).await?;
            registry
                .record_credential_use(&credential_id, view.last_activity)
                .await?;
            println!(
                "Session started for {credential_id}; expires {}",
                format_millis(view.expires_at)
            );
        }
        SessionCommand::Status => match manager.initialize().await? {
            Some(view) => {
                let remaining = manager.get_time_remaining().await?;
                println!("Authenticated as {}", view.active_credential_id);
                println!("    expires: {}", format_millis(view.expires_at));
                println!("    last activity: {}", format_millis(view.last_activity));
                println!("    remaining: {}", format_remaining(remaining));
            }
            None => println!("No active session."),
        },
        SessionCommand::Touch => {
            manager.record_activity().await?;
            match manager.get_session().await? {
                Some(view) => println!(
                    "Activity recorded at {}",
                    format_millis(view.last_activity)
                ),
                None => println!("No active session."),
            }
        }
        SessionCommand::End => {
            manager.end_session().await?;
            println!("Session ended.");
        }
    }
    Ok(())
}

fn format_remaining(millis: u64) -> String {
    let secs = Duration::from_millis(millis).as_secs();
    format!("{}m {:02}s", secs / 60, secs % 60)
}
