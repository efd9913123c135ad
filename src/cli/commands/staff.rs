use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::services::staff_registry;
use crate::store::DocumentStore;

#[derive(Subcommand)]
pub enum StaffCommands {
    #[command(about = "Register a uid as medical staff")]
    Add {
        #[arg(help = "Identity provider uid")]
        uid: String,

        #[arg(long, help = "Display name (informational)")]
        name: Option<String>,

        #[arg(long, help = "Email (informational)")]
        email: Option<String>,
    },

    #[command(about = "Remove a uid from the staff registry")]
    Remove {
        #[arg(help = "Identity provider uid")]
        uid: String,
    },

    #[command(about = "List registered medical staff")]
    List,
}

pub async fn handle(
    cmd: StaffCommands,
    store: &dyn DocumentStore,
    config: &AppConfig,
    output_format: OutputFormat,
) -> anyhow::Result<String> {
    match cmd {
        StaffCommands::Add { uid, name, email } => {
            if uid.trim().is_empty() {
                anyhow::bail!("uid must not be empty");
            }
            staff_registry::register(store, &uid, name, email).await?;
            render_success(
                output_format,
                &format!("Registered {} as medical staff (takes effect at their next login)", uid),
                Some(json!({ "uid": uid })),
            )
        }
        StaffCommands::Remove { uid } => {
            staff_registry::unregister(store, &uid).await?;
            render_success(
                output_format,
                &format!("Removed {} from the staff registry", uid),
                Some(json!({ "uid": uid })),
            )
        }
        StaffCommands::List => {
            let entries = staff_registry::list(store, config.listing.max_page_size).await?;

            if entries.is_empty() {
                return render_empty_collection(output_format, "staff", "No medical staff registered");
            }

            match output_format {
                OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({ "staff": entries }))?),
                OutputFormat::Text => {
                    let mut out = format!("{:<24} {:<24} {:<30} {}\n", "UID", "NAME", "EMAIL", "REGISTERED");
                    out.push_str(&"-".repeat(100));
                    for entry in &entries {
                        let registered = entry
                            .registered_at
                            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_default();
                        out.push_str(&format!(
                            "\n{:<24} {:<24} {:<30} {}",
                            truncate(&entry.uid, 24),
                            truncate(entry.name.as_deref().unwrap_or("-"), 24),
                            truncate(entry.email.as_deref().unwrap_or("-"), 30),
                            registered,
                        ));
                    }
                    Ok(out)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn add_list_remove() {
        let store = MemoryStore::new();
        let config = AppConfig::development();

        let out = handle(
            StaffCommands::Add {
                uid: "abc".to_string(),
                name: Some("Dr. ABC".to_string()),
                email: None,
            },
            &store,
            &config,
            OutputFormat::Text,
        )
        .await
        .unwrap();
        assert!(out.contains("Registered abc"));
        assert!(staff_registry::is_registered(&store, "abc").await.unwrap());

        let out = handle(StaffCommands::List, &store, &config, OutputFormat::Json)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["staff"][0]["uid"], "abc");
        assert_eq!(value["staff"][0]["name"], "Dr. ABC");

        handle(
            StaffCommands::Remove { uid: "abc".to_string() },
            &store,
            &config,
            OutputFormat::Text,
        )
        .await
        .unwrap();
        assert!(!staff_registry::is_registered(&store, "abc").await.unwrap());

        let out = handle(StaffCommands::List, &store, &config, OutputFormat::Text)
            .await
            .unwrap();
        assert_eq!(out, "No medical staff registered");
    }

    #[tokio::test]
    async fn add_rejects_blank_uid() {
        let store = MemoryStore::new();
        let result = handle(
            StaffCommands::Add {
                uid: " ".to_string(),
                name: None,
                email: None,
            },
            &store,
            &AppConfig::development(),
            OutputFormat::Text,
        )
        .await;
        assert!(result.is_err());
    }
}
