//! Cofre vault CLI
//!
//! Terminal front end over `vault-core`. Only ever handles plaintext records;
//! keys and ciphertext stay inside the library.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use vault_core::backup::backup_file_name;
use vault_core::{BackupFormat, Category, RecordDraft, Session, Vault, VaultRecord};
use vault_core::{SettingsManager, MIN_KDF_ITERATIONS};

/// Cofre - password vault with client-side encryption
#[derive(Parser, Debug)]
#[command(name = "vault")]
#[command(version)]
#[command(about = "Cofre - password vault with client-side encryption")]
struct Args {
    /// Directory holding the vault files
    #[arg(long, env = "VAULT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Master password (prompted for when absent)
    #[arg(long, env = "VAULT_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set the master password on first run
    Init,
    /// List records, sorted by title
    List {
        /// Only records in this category
        #[arg(long)]
        category: Option<Category>,
        /// Case-insensitive match on title, username or URL
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one record
    Show {
        id: String,
        /// Print the secret instead of masking it
        #[arg(long)]
        reveal: bool,
    },
    /// Add a record; the secret is prompted for
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        username: String,
        #[arg(long, default_value = "")]
        url: String,
        /// Defaults to the configured default category
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Edit a record; omitted fields keep their value
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        notes: Option<String>,
        /// Prompt for a new secret
        #[arg(long)]
        secret: bool,
    },
    /// Delete a record
    Delete { id: String },
    /// Write an encrypted backup
    Export {
        /// Defaults to vault-backup-YYYY-MM-DD.json
        file: Option<PathBuf>,
    },
    /// Merge a backup (encrypted or legacy plaintext) into the vault
    Import { file: PathBuf },
    /// Show or change settings; runs without unlocking
    Config {
        /// PBKDF2 iterations for the next `init`
        #[arg(long)]
        kdf_iterations: Option<u32>,
        /// Category used by `add` when none is given
        #[arg(long)]
        default_category: Option<Category>,
        /// Restore the default settings
        #[arg(long)]
        reset: bool,
    },
    /// Delete the master password and every record
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();

    // Logs go to stderr so stdout stays clean for piping.
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut vault = Vault::open(args.data_dir.take())
        .await
        .context("Failed to open vault")?;
    let password = take_password(&mut args);

    match args.command {
        Command::Init => init(&vault, password).await,
        Command::Config {
            kdf_iterations,
            default_category,
            reset,
        } => {
            let settings = vault
                .settings_mut()
                .context("Vault has no settings file")?;
            configure(settings, kdf_iterations, default_category, reset).await
        }
        Command::Reset { yes } => reset(&vault, yes).await,
        command => {
            let session = unlock(&vault, password).await?;
            let result = run(&vault, &session, command).await;
            session.lock();
            result
        }
    }
}

/// Leaves `None` behind in the parsed args
fn take_password(args: &mut Args) -> Option<Zeroizing<String>> {
    args.password.take().map(Zeroizing::new)
}

async fn init(vault: &Vault, password: Option<Zeroizing<String>>) -> Result<()> {
    if vault.is_initialized().await? {
        bail!("Vault is already initialized - use `vault reset --yes` to start over");
    }

    let password = match password {
        Some(password) => password,
        None => {
            let first = prompt("New master password: ")?;
            let second = prompt("Repeat master password: ")?;
            if *first != *second {
                bail!("Passwords do not match");
            }
            first
        }
    };

    let session = vault
        .setup(&password)
        .await
        .context("Failed to initialize vault")?;
    session.lock();

    println!("Vault initialized");
    Ok(())
}

async fn unlock(vault: &Vault, password: Option<Zeroizing<String>>) -> Result<Session> {
    if !vault.is_initialized().await? {
        bail!("Vault is not initialized - run `vault init` first");
    }

    let password = match password {
        Some(password) => password,
        None => prompt("Master password: ")?,
    };

    vault.unlock(&password).await.context("Failed to unlock vault")
}

async fn reset(vault: &Vault, yes: bool) -> Result<()> {
    if !yes {
        bail!("This deletes every record and the master password; pass --yes to confirm");
    }
    vault.reset().await.context("Failed to reset vault")?;
    println!("Vault reset");
    Ok(())
}

async fn configure(
    settings: &mut SettingsManager,
    kdf_iterations: Option<u32>,
    default_category: Option<Category>,
    reset: bool,
) -> Result<()> {
    if reset {
        settings.reset().await.context("Failed to reset settings")?;
    }
    if let Some(iterations) = kdf_iterations {
        settings
            .set_kdf_iterations(iterations)
            .await
            .with_context(|| format!("KDF iterations must be at least {}", MIN_KDF_ITERATIONS))?;
    }
    if let Some(category) = default_category {
        settings
            .set_default_category(category)
            .await
            .context("Failed to save settings")?;
    }

    let current = settings.get();
    println!("kdf-iterations:    {}", current.kdf_iterations);
    println!("default-category:  {}", current.default_category);
    Ok(())
}

async fn run(vault: &Vault, session: &Session, command: Command) -> Result<()> {
    match command {
        Command::List { category, search } => {
            let outcome = session.load_records().await?;
            if outcome.failed() > 0 {
                eprintln!(
                    "warning: {} record(s) could not be decrypted and are hidden",
                    outcome.failed()
                );
            }

            let mut records: Vec<&VaultRecord> = outcome
                .records
                .iter()
                .filter(|record| category.map_or(true, |c| record.fields.category == c))
                .filter(|record| search.as_deref().map_or(true, |term| matches(record, term)))
                .collect();
            records.sort_by_key(|record| record.title_key());

            for record in records {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.id, record.fields.title, record.fields.username, record.fields.category
                );
            }
        }
        Command::Show { id, reveal } => {
            let record = session.get_record(&id).await?;
            let fields = &record.fields;
            println!("id:        {}", record.id);
            println!("title:     {}", fields.title);
            println!("username:  {}", fields.username);
            if reveal {
                println!("secret:    {}", fields.secret);
            } else {
                println!("secret:    ********");
            }
            println!("url:       {}", fields.url);
            println!("category:  {}", fields.category);
            if let Some(notes) = &fields.notes {
                println!("notes:     {}", notes);
            }
            println!("created:   {}", fields.created_at.to_rfc3339());
            println!("updated:   {}", fields.updated_at.to_rfc3339());
        }
        Command::Add {
            title,
            username,
            url,
            category,
            notes,
        } => {
            let default_category = vault
                .settings()
                .map(|settings| settings.get().default_category)
                .unwrap_or_default();
            let secret = prompt("Secret: ")?;

            let record = session
                .add_record(RecordDraft {
                    title,
                    username,
                    secret: secret.to_string(),
                    url,
                    category: category.unwrap_or(default_category),
                    notes,
                })
                .await
                .context("Failed to add record")?;
            println!("{}", record.id);
        }
        Command::Edit {
            id,
            title,
            username,
            url,
            category,
            notes,
            secret,
        } => {
            let current = session.get_record(&id).await?;
            let mut draft = RecordDraft::from_record(&current);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(username) = username {
                draft.username = username;
            }
            if let Some(url) = url {
                draft.url = url;
            }
            if let Some(category) = category {
                draft.category = category;
            }
            if let Some(notes) = notes {
                draft.notes = Some(notes);
            }
            if secret {
                draft.secret = prompt("New secret: ")?.to_string();
            }

            session
                .update_record(&id, draft)
                .await
                .context("Failed to update record")?;
            println!("Updated {}", id);
        }
        Command::Delete { id } => {
            session
                .delete_record(&id)
                .await
                .context("Failed to delete record")?;
            println!("Deleted {}", id);
        }
        Command::Export { file } => {
            let backup = session.export_backup().await.context("Failed to export")?;
            let path = file.unwrap_or_else(|| PathBuf::from(backup_file_name(Utc::now())));
            tokio::fs::write(&path, backup)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        Command::Import { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let report = session
                .import_backup(&bytes)
                .await
                .context("Import failed - no records were imported")?;

            let format = match report.format {
                BackupFormat::EncryptedV1 => "encrypted",
                BackupFormat::LegacyPlaintext => "legacy plaintext",
            };
            debug!("Skipped titles: {:?}", report.skipped_titles);
            println!(
                "Imported {} record(s) from {} backup, skipped {} duplicate(s)",
                report.imported, format, report.skipped
            );
        }
        Command::Init | Command::Config { .. } | Command::Reset { .. } => {
            bail!("command does not run on an unlocked vault")
        }
    }
    Ok(())
}

fn matches(record: &VaultRecord, term: &str) -> bool {
    let term = term.to_lowercase();
    let fields = &record.fields;
    [&fields.title, &fields.username, &fields.url]
        .iter()
        .any(|value| value.to_lowercase().contains(&term))
}

fn prompt(label: &str) -> Result<Zeroizing<String>> {
    rpassword::prompt_password(label)
        .map(Zeroizing::new)
        .context("Failed to read from terminal")
}
