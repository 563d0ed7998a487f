use std::path::PathBuf;

use anyhow::bail;
use clap::Subcommand;
use serde::Serialize;
use subgenius_core::core::credentials::CredentialStore;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::context::Context;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum KeyAction {
    /// Store an API key (read from stdin when omitted)
    Set {
        /// The API key; prefer stdin to keep it out of shell history
        token: Option<String>,
    },
    /// Remove the stored API key
    Clear,
    /// Show whether a key is stored
    Status,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatus {
    present: bool,
    preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stored_at: Option<String>,
    vault: PathBuf,
}

async fn read_token_from_stdin() -> anyhow::Result<String> {
    eprint!("Gemini API key: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(line)
}

pub async fn run(action: KeyAction, ctx: &Context) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;

    match action {
        KeyAction::Set { token } => {
            let token = match token {
                Some(token) => token,
                None => read_token_from_stdin().await?,
            };

            if !vault.set(&token).await? {
                bail!("API key cannot be empty");
            }
        }
        KeyAction::Clear => {
            vault.clear().await?;
        }
        KeyAction::Status => {}
    }

    let credential = vault.get().await;
    let stored_at = if credential.is_some() {
        vault.stored_at().await.map(|t| t.to_rfc3339())
    } else {
        None
    };
    let status = KeyStatus {
        present: credential.is_some(),
        preview: credential.map(|c| c.redacted()),
        stored_at,
        vault: vault.path().to_path_buf(),
    };

    if ctx.json {
        return print_json(&status);
    }

    match (&status.preview, &status.stored_at) {
        (Some(preview), Some(at)) => println!("API key stored ({}, saved {})", preview, at),
        (Some(preview), None) => println!("API key stored ({})", preview),
        (None, _) => println!("No API key stored"),
    }
    Ok(())
}
