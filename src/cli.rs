// src/cli.rs

use crate::app;
use crate::config::AppConfig;
use crate::events::EventHub;
use crate::raddb::RadDB;
use crate::sync::Reconciler;
use crate::web::run_web_server;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

// === CLI ===

#[derive(Parser)]
#[command(name = "ldapsync", author, version, about = "Синхронизация LDAP-каталога с HR/IM-платформами", long_about = None)]
pub struct Cli {
    /// Путь к config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Запустить веб-API
    Serve {
        /// Адрес (например, 127.0.0.1:8080); по умолчанию из конфигурации
        #[arg(long)]
        addr: Option<String>,
    },
    /// Синхронизация с источником
    Sync {
        #[command(subcommand)]
        cmd: SyncCommand,
    },
    /// Поиск записей хранилища, которых нет в каталоге
    Drift {
        #[command(subcommand)]
        cmd: ScopeCommand,
    },
    /// Повторно выложить записи в каталог
    Push {
        #[command(subcommand)]
        cmd: PushCommand,
    },
    /// Показать настроенные источники
    Sources {
        #[arg(short, long)]
        json: bool,
    },
    /// Поиск в каталоге по фильтру RFC 4515
    Find { filter: String },
    /// Сгенерировать мастер-ключ
    Keygen,
}

// === Подкоманды ===

#[derive(clap::Subcommand)]
pub enum SyncCommand {
    Departments { source: String },
    Users { source: String },
    /// Подразделения, затем пользователи
    All { source: String },
}

#[derive(clap::Subcommand)]
pub enum ScopeCommand {
    Departments,
    Users,
}

#[derive(clap::Subcommand)]
pub enum PushCommand {
    Users {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    Groups {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
}

/// Точка входа CLI
pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::Keygen = cli.command {
        println!("{}", hex::encode(RadDB::generate_key()));
        eprintln!("⚠️  Сохраните ключ в store.master_key_hex: без него базу не открыть");
        return Ok(());
    }

    let path = cli.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&path)?;
    crate::logging::init(&config.logging)?;
    tracing::debug!(path = %path.display(), "config loaded");

    let reconciler = Arc::new(app::bootstrap(&config)?);
    spawn_audit_log(reconciler.events());

    match cli.command {
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.web_server.address.clone());
            println!("🚀 Запуск веб-API на http://{}", addr);
            run_web_server(reconciler, &addr).await?;
        }
        Command::Sync { cmd } => handle_sync(cmd, &reconciler).await?,
        Command::Drift { cmd } => {
            let report = match cmd {
                ScopeCommand::Departments => reconciler.detect_department_drift().await?,
                ScopeCommand::Users => reconciler.detect_user_drift().await?,
            };
            println!("🔍 {}", report);
            for entry in &report.stale {
                println!("   ⚠️  {}", entry);
            }
        }
        Command::Push { cmd } => {
            let outcome = match cmd {
                PushCommand::Users { ids } => reconciler.push_users(&ids).await?,
                PushCommand::Groups { ids } => reconciler.push_departments(&ids).await?,
            };
            println!("✅ {}", outcome);
        }
        Command::Sources { json } => {
            let sources: Vec<_> = reconciler.sources().collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&sources)?);
            } else {
                for source in sources {
                    let state = if source.enabled { "✅" } else { "⏸️ " };
                    println!(
                        "{} {} ({:?}) — leavers: {:?}, update_on_sync: {}",
                        state,
                        source.flag,
                        source.kind,
                        source.leaver_detection(),
                        source.update_on_sync
                    );
                }
            }
        }
        Command::Find { filter } => match reconciler.directory().find_by_filter(&filter).await {
            Ok(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            Err(crate::directory::DirectoryError::NotFound(_)) => eprintln!("❌ Запись не найдена"),
            Err(e) => return Err(e.into()),
        },
        Command::Keygen => {}
    }

    Ok(())
}

// === Обработчики ===

async fn handle_sync(cmd: SyncCommand, reconciler: &Reconciler) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        SyncCommand::Departments { source } => {
            let outcome = reconciler.sync_departments(&source).await?;
            println!("✅ {}", outcome);
        }
        SyncCommand::Users { source } => {
            let outcome = reconciler.sync_users(&source).await?;
            println!("✅ {}", outcome);
        }
        SyncCommand::All { source } => {
            let outcome = reconciler.sync_source(&source).await?;
            println!("✅ {}", outcome.departments);
            println!("✅ {}", outcome.users);
        }
    }
    Ok(())
}

/// Журнал изменений: каждое событие синхронизации уходит в tracing
fn spawn_audit_log(events: &Arc<EventHub>) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::info!(
                    target: "audit",
                    action = ?event.action,
                    source = event.source.as_deref().unwrap_or("-"),
                    entity = %event.entity,
                    metadata = ?event.metadata,
                    "sync event"
                ),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(target: "audit", skipped, "audit log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
