use clap::Subcommand;
use serde_json::{Value, json};
use tracing::info;

use super::reply;
use crate::config::Paths;
use crate::errors::{Error, Result};
use crate::profile::{self, ProfileStore};
use crate::supervisor::Supervisor;

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// List profiles, most recently used first
    List,

    /// Delete a profile and its browser data
    Delete {
        /// Profile name
        name: String,
    },
}

pub async fn handle_profile(paths: Paths, command: ProfileCommands) -> Result<Value> {
    match command {
        ProfileCommands::List => {
            let store = ProfileStore::new(paths.profiles_dir())
                .map_err(|e| Error::infrastructure(format!("{:#}", e)))?;
            let profiles = store
                .list()
                .map_err(|e| Error::infrastructure(format!("{:#}", e)))?;
            reply(json!({ "count": profiles.len(), "profiles": profiles }))
        }
        ProfileCommands::Delete { name } => {
            profile::validate_name(&name).map_err(|e| Error::usage(e.to_string()))?;
            Supervisor::new(paths)?.delete_profile(&name).await?;
            info!("Profile '{}' deleted", name);
            reply(json!({ "deleted": name }))
        }
    }
}
