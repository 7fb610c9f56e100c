//! Administrative CLI for coffer.
//!
//! Operates on the configured stores directly, using the same figment
//! configuration as `cofferd`. Passwords are read from stdin.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use coffer_core::config::{AppConfig, DEFAULT_CONFIG_PATH};
use coffer_core::{Argon2Hasher, PasswordHasher, access};
use coffer_service::{NewUser, Services};
use coffer_storage::{BlobStore, STORE_NAMES, StoreSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cofferctl")]
#[command(about = "Administrative CLI for coffer")]
#[command(version)]
struct Cli {
    /// Path to configuration file (optional; COFFER_* variables override it)
    #[arg(long, global = true, env = "COFFER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print JSON instead of tables
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// File management commands
    File {
        #[command(subcommand)]
        command: FileCommands,
    },
    /// Remove expired sessions and CSRF tokens
    Cleanup,
    /// Store inspection and repair
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },
    /// Hash a password read from stdin for `admin.password_hash`
    HashPassword,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user (password from stdin)
    Add {
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Comma-separated capability labels
        #[arg(long, default_value = "")]
        access: String,
        /// Grant administrator rights
        #[arg(long, default_value_t = false)]
        admin: bool,
    },
    /// List users
    List,
    /// Show one user
    Show { name: String },
    /// Delete a user and end their session
    Delete {
        name: String,
        /// Skip confirmation prompt
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Grant administrator rights
    Promote { name: String },
    /// Revoke administrator rights
    Demote { name: String },
    /// Set a user's password (from stdin)
    Passwd { name: String },
    /// Replace a user's capability labels
    Access {
        name: String,
        /// Comma-separated capability labels (empty clears them)
        labels: String,
    },
}

#[derive(Subcommand)]
enum FileCommands {
    /// Upload a local file, replacing any existing content
    Put {
        name: String,
        /// Local path to read
        path: PathBuf,
        /// Comma-separated capability labels
        #[arg(long, default_value = "")]
        access: String,
    },
    /// Write a file's content to stdout or a local path
    Get {
        name: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List files and their labels
    List,
    /// Delete a file and its content
    Rm { name: String },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Show backend health and lock state for every store
    Status,
    /// Remove a leaked writer lock
    Unlock {
        /// Store name, e.g. users.json
        store: String,
        /// Skip confirmation prompt
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        config,
        json,
        command,
    } = Cli::parse();

    match command {
        // Needs no stores
        Commands::HashPassword => handle_hash_password(),
        command => run(command, &config, json).await,
    }
}

async fn run(command: Commands, config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let (services, stores) = Services::from_config(&config)
        .await
        .context("failed to open stores")?;

    match command {
        Commands::User { command } => handle_user_command(command, &services, json).await,
        Commands::File { command } => handle_file_command(command, &services, json).await,
        Commands::Cleanup => handle_cleanup(&services, json).await,
        Commands::Store { command } => handle_store_command(command, &stores, json).await,
        Commands::HashPassword => handle_hash_password(),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path)
        .with_context(|| format!("failed to load configuration ({})", path.display()))
}

/// Read a password from stdin, dropping the trailing newline.
fn read_password() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    let password = buf.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password read from stdin is empty");
    }
    Ok(password)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_hash_password() -> Result<()> {
    let password = read_password()?;
    let hash = Argon2Hasher.hash(&password)?;
    println!("{hash}");
    Ok(())
}

async fn handle_user_command(command: UserCommands, services: &Services, json: bool) -> Result<()> {
    let users = &services.users;
    match command {
        UserCommands::Add {
            name,
            email,
            access,
            admin,
        } => {
            let access = access::parse_list(&access)?;
            let password = read_password()?;
            let user = users
                .create_user(NewUser {
                    name,
                    email,
                    password,
                    is_admin: admin,
                    access,
                })
                .await?;
            if json {
                return print_json(&user);
            }
            println!("User created: {}", user.name);
        }
        UserCommands::List => {
            let list = users.list_users().await?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<24} {:<32} {:<6} Access", "Name", "Email", "Admin");
                println!("{}", "-".repeat(80));
                for user in list {
                    println!(
                        "{:<24} {:<32} {:<6} {}",
                        user.name,
                        if user.email.is_empty() { "-" } else { user.email.as_str() },
                        user.is_admin,
                        user.access.join(",")
                    );
                }
            }
        }
        UserCommands::Show { name } => {
            let user = users.get_user(&name).await?;
            if json {
                return print_json(&user);
            }
            println!("Name: {}", user.name);
            println!("Email: {}", user.email);
            println!("Admin: {}", user.is_admin);
            println!("Access: {}", user.access.join(","));
        }
        UserCommands::Delete { name, force } => {
            // Fail on unknown users before prompting
            users.get_user(&name).await?;
            if !force && !confirm(&format!("Delete user '{name}' and end their session?"))? {
                println!("Deletion cancelled.");
                return Ok(());
            }
            users.delete_user(&name).await?;
            println!("User deleted: {name}");
        }
        UserCommands::Promote { name } => {
            users.promote(&name).await?;
            println!("User promoted: {name}");
        }
        UserCommands::Demote { name } => {
            users.demote(&name).await?;
            println!("User demoted: {name}");
        }
        UserCommands::Passwd { name } => {
            let password = read_password()?;
            users.set_password(&name, &password).await?;
            println!("Password updated: {name}");
        }
        UserCommands::Access { name, labels } => {
            let labels = access::parse_list(&labels)?;
            let labels = users.update_access(&name, &labels).await?;
            println!("Access for {name}: {}", labels.join(","));
        }
    }
    Ok(())
}

async fn handle_file_command(command: FileCommands, services: &Services, json: bool) -> Result<()> {
    let files = &services.files;
    match command {
        FileCommands::Put { name, path, access } => {
            let labels = access::parse_list(&access)?;
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let size = data.len();
            let file = files.upload(&name, Bytes::from(data), &labels).await?;
            if json {
                return print_json(&file);
            }
            println!("Uploaded {} ({size} bytes)", file.name);
        }
        FileCommands::Get { name, output } => {
            let data = files.read(&name).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &data)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
            }
        }
        FileCommands::List => {
            let list = files.list().await?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No files found.");
            } else {
                println!("{:<48} Access", "Name");
                println!("{}", "-".repeat(80));
                for file in list {
                    println!("{:<48} {}", file.name, file.access.join(","));
                }
            }
        }
        FileCommands::Rm { name } => {
            files.delete(&name).await?;
            println!("File deleted: {name}");
        }
    }
    Ok(())
}

async fn handle_cleanup(services: &Services, json: bool) -> Result<()> {
    let report = services.maintenance.sweep().await?;
    if json {
        return print_json(&report);
    }
    println!("Expired sessions removed: {}", report.sessions_removed);
    println!("Expired CSRF tokens removed: {}", report.csrf_removed);
    Ok(())
}

async fn handle_store_command(command: StoreCommands, stores: &StoreSet, json: bool) -> Result<()> {
    match command {
        StoreCommands::Status => {
            let mut rows = Vec::new();
            for store in stores.blobs() {
                let health = store.health_check().await.err().map(|e| e.to_string());
                let locked = store.is_locked().await?;
                rows.push(serde_json::json!({
                    "name": store.name(),
                    "backend": store.backend_name(),
                    "locked": locked,
                    "ok": health.is_none(),
                    "error": health,
                }));
            }
            if json {
                return print_json(&rows);
            }
            println!("{:<16} {:<12} {:<8} Health", "Store", "Backend", "Locked");
            println!("{}", "-".repeat(60));
            for row in &rows {
                println!(
                    "{:<16} {:<12} {:<8} {}",
                    row["name"].as_str().unwrap_or_default(),
                    row["backend"].as_str().unwrap_or_default(),
                    row["locked"],
                    row["error"].as_str().unwrap_or("ok"),
                );
            }
        }
        StoreCommands::Unlock { store, force } => {
            let Some(blob) = stores.by_name(&store) else {
                bail!(
                    "unknown store '{store}' (expected one of: {})",
                    STORE_NAMES.join(", ")
                );
            };
            if !blob.is_locked().await? {
                println!("Store {store} is not locked.");
                return Ok(());
            }
            if !force
                && !confirm(&format!(
                    "Remove the lock on {store}? Only do this when no server is writing to it."
                ))?
            {
                println!("Unlock cancelled.");
                return Ok(());
            }
            blob.unlock().await?;
            tracing::warn!(store = %store, "lock removed manually");
            println!("Lock removed: {store}");
        }
    }
    Ok(())
}
