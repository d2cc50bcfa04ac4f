//! # Reminder — multi-tenant inspection reminder worker
//!
//! Reads each tenant's customer rows (Google Sheets or the local table),
//! picks the ones due, and sends a WhatsApp template reminder once per day.
//!
//! Usage:
//!   reminder run-once                       # One pass over all tenants, then exit
//!   reminder schedule                       # Run on WORKER_CRON (default hourly)
//!   reminder send-test --tenant T --phone P # Send one template message
//!   reminder logs --tenant T --limit 50     # Recent send history
//!   reminder check-env                      # Show resolved settings (masked)

mod row_source;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use reminder_channels::WhatsAppGateway;
use reminder_core::ReminderConfig;
use reminder_core::config::SheetsConfig;
use reminder_core::traits::{AuditSink, MessageGateway, TenantDirectory};
use reminder_core::types::{ColumnMap, CustomerRow, RowSourceConfig, SendOutcome, TemplateMessage};
use reminder_db::{ReminderDb, TableRowStore};
use reminder_rules::day_bounds_millis;
use reminder_scheduler::dispatch::template_params;
use reminder_scheduler::{
    DispatchEngine, DispatchSettings, Orchestrator, SchedulerEngine, TenantRun, Trigger,
};
use reminder_sheets::SheetsRowStore;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::row_source::RoutedRowStore;

#[derive(Parser)]
#[command(
    name = "reminder",
    version,
    about = "🚗 Inspection reminder worker: due-date rules, daily dedupe, WhatsApp templates"
)]
struct Cli {
    /// Config file (default: ~/.reminder/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass over every tenant and exit
    RunOnce,
    /// Run passes on the configured cron or interval until Ctrl-C
    Schedule,
    /// Create or upgrade the database schema and exit
    Migrate,
    /// Send one template message using a tenant's credentials
    SendTest {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        plate: String,
        #[arg(long, default_value = "")]
        date: String,
    },
    /// Delete today's failed send records for a tenant so they are retried
    ClearFailed {
        #[arg(long)]
        tenant: String,
    },
    /// Show recent send history
    Logs {
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Show audit events instead of message logs
        #[arg(long)]
        audit: bool,
    },
    /// Print the resolved configuration with secrets masked
    CheckEnv,
}

/// Everything a pass needs, wired once from config.
struct Worker {
    db: Arc<ReminderDb>,
    gateway: Arc<WhatsAppGateway>,
    orchestrator: Orchestrator,
    settings: DispatchSettings,
}

/// Spreadsheet from the global config, for tenants without their own sheet.
fn global_sheet_source(sheets: &SheetsConfig) -> Option<RowSourceConfig> {
    (!sheets.spreadsheet_id.trim().is_empty()).then(|| RowSourceConfig::Sheet {
        spreadsheet_id: sheets.spreadsheet_id.clone(),
        sheet_title: sheets.sheet_title.clone(),
        columns: ColumnMap::default(),
    })
}

fn open_db(config: &ReminderConfig) -> Result<Arc<ReminderDb>> {
    let path = config.database_path();
    let db = ReminderDb::open(&path)
        .with_context(|| format!("opening database {}", path.display()))?;
    tracing::debug!("🗄️ Database ready: {}", path.display());
    Ok(Arc::new(db))
}

fn build_worker(config: &ReminderConfig) -> Result<Worker> {
    let db = open_db(config)?;
    let sheets = Arc::new(SheetsRowStore::new(&config.sheets)?);
    let table = Arc::new(TableRowStore::new(db.clone()));
    let rows = Arc::new(RoutedRowStore::new(sheets, table));
    let gateway = Arc::new(WhatsAppGateway::new(&config.whatsapp)?);
    let settings = DispatchSettings::from_config(config);

    let engine = DispatchEngine::new(
        rows,
        gateway.clone(),
        db.clone(),
        db.clone(),
        settings.clone(),
    );
    let orchestrator = Orchestrator::new(
        db.clone(),
        engine,
        db.clone(),
        Duration::from_secs(config.dispatch.tenant_timeout_secs),
    )
    .with_fallback_credentials(config.whatsapp.fallback_credentials())
    .with_fallback_row_source(global_sheet_source(&config.sheets));

    Ok(Worker {
        db,
        gateway,
        orchestrator,
        settings,
    })
}

fn print_results(results: &[TenantRun]) {
    if results.is_empty() {
        println!("ℹ️  No tenants configured.");
        return;
    }
    for run in results {
        match run {
            TenantRun::Completed(s) => println!("✅ {s}"),
            TenantRun::TimedOut(s) => println!("⏱️ {s}"),
            TenantRun::Failed { tenant, error } => println!("❌ [{tenant}] {error}"),
        }
    }
}

/// Show only the first few characters of a secret.
fn mask(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "❌ missing".into();
    }
    let head: String = value.chars().take(4).collect();
    format!("{head}… ({} chars)", value.chars().count())
}

fn format_millis(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

async fn run_once(config: &ReminderConfig) -> Result<()> {
    let worker = build_worker(config)?;
    let results = worker.orchestrator.run_once_all_tenants().await?;
    print_results(&results);
    Ok(())
}

async fn schedule(config: &ReminderConfig) -> Result<()> {
    let worker = build_worker(config)?;
    let trigger = Trigger::from_config(&config.schedule)?;
    let engine = SchedulerEngine::new();
    let orchestrator = &worker.orchestrator;

    tokio::select! {
        result = engine.run(&trigger, config.schedule.run_on_start, move || orchestrator.run_once_all_tenants()) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("👋 Shutting down scheduler");
        }
    }
    Ok(())
}

async fn send_test(
    config: &ReminderConfig,
    tenant: &str,
    phone: &str,
    row: CustomerRow,
) -> Result<()> {
    let worker = build_worker(config)?;
    let credentials = worker.orchestrator.resolve_credentials(tenant)?;
    let phone = worker.settings.normalizer.normalize(phone);
    let message = TemplateMessage {
        phone: phone.clone(),
        template_name: worker.settings.template_name.clone(),
        template_language: worker.settings.template_language.clone(),
        body_params: template_params(&row),
    };

    println!(
        "📤 Sending '{}' ({}) to {phone} via {}",
        message.template_name,
        message.template_language,
        worker.gateway.name()
    );
    let outcome = worker.gateway.send_template(&credentials, &message).await;
    worker.db.record(
        Some(tenant),
        "cli.send_test",
        json!({ "phone": phone, "sent": outcome.is_sent() }),
    );

    match outcome {
        SendOutcome::Sent { message_id } => {
            println!("✅ Sent (msg: {})", message_id.as_deref().unwrap_or("-"));
            Ok(())
        }
        SendOutcome::Failed { error } => anyhow::bail!("send failed: {error}"),
    }
}

fn logs(config: &ReminderConfig, tenant: Option<&str>, limit: usize, audit: bool) -> Result<()> {
    let db = open_db(config)?;
    if audit {
        for e in db.recent_events(tenant, limit)? {
            println!(
                "{}  {:<24} {:<10} {}",
                format_millis(e.created_at),
                e.action,
                e.tenant.as_deref().unwrap_or("-"),
                e.details
            );
        }
        return Ok(());
    }

    let entries = db.recent_messages(tenant, limit)?;
    if entries.is_empty() {
        println!("ℹ️  No message logs yet.");
    }
    for e in entries {
        println!(
            "{}  {:<10} {:<15} {:<9} {}",
            format_millis(e.timestamp),
            e.tenant,
            e.phone,
            e.status,
            e.message_id.or(e.error).unwrap_or_default()
        );
    }
    Ok(())
}

fn check_env(config: &ReminderConfig) -> Result<()> {
    println!("🔧 Reminder configuration\n");
    println!("Database:        {}", config.database_path().display());
    println!("Date filter:     {}", config.dispatch.date_filter);
    println!("Order:           {:?}", config.dispatch.order);
    println!("Throttle:        {}ms", config.dispatch.throttle_ms);
    println!("Sent markers:    {}", config.dispatch.sent_markers.join(", "));
    println!("Country code:    +{}", config.dispatch.country_code);
    match config.schedule.interval_secs {
        Some(secs) => println!("Schedule:        every {secs}s"),
        None => println!("Schedule:        cron '{}'", config.schedule.cron),
    }

    println!("\nWhatsApp ({}/{})", config.whatsapp.api_base_url, config.whatsapp.graph_version);
    println!(
        "  Template:      {} ({})",
        config.whatsapp.template_name, config.whatsapp.template_language
    );
    println!("  Access token:  {}", mask(&config.whatsapp.access_token));
    println!("  Phone ID:      {}", mask(&config.whatsapp.phone_number_id));

    println!("\nGoogle Sheets");
    println!("  Client email:  {}", mask(&config.sheets.client_email));
    println!("  Private key:   {}", mask(&config.sheets.private_key));
    println!("  Spreadsheet:   {}", mask(&config.sheets.spreadsheet_id));
    println!("  Sheet title:   {}", config.sheets.sheet_title);

    let db = open_db(config)?;
    let tenants = db.list_tenants()?;
    println!("\nTenants ({})", tenants.len());
    let fallback = config.whatsapp.fallback_credentials().is_some();
    for t in tenants {
        let own = db.credentials(&t.id)?.is_some_and(|c| c.is_complete());
        let creds = match (own, fallback) {
            (true, _) => "own credentials",
            (false, true) => "global credentials",
            (false, false) => "❌ no credentials",
        };
        let source = match &t.row_source {
            Some(RowSourceConfig::Sheet { spreadsheet_id, sheet_title, .. }) => {
                format!("sheet {}/{sheet_title}", mask(spreadsheet_id))
            }
            Some(RowSourceConfig::Table) => "table".into(),
            None if global_sheet_source(&config.sheets).is_some() => "global sheet".into(),
            None => "❌ no row source".into(),
        };
        println!("  {:<16} {source:<32} {creds}", t.id);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env.local wins over .env; neither overrides variables already set
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose { "reminder=debug" } else { "reminder=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => ReminderConfig::load_from(path)?,
        None => ReminderConfig::load()?,
    };
    config.apply_env()?;

    match cli.command {
        Commands::RunOnce => run_once(&config).await,
        Commands::Schedule => schedule(&config).await,
        Commands::Migrate => {
            open_db(&config)?;
            println!("✅ Database migrated: {}", config.database_path().display());
            Ok(())
        }
        Commands::SendTest {
            tenant,
            phone,
            name,
            plate,
            date,
        } => {
            let row = CustomerRow {
                name,
                plate,
                phone: phone.clone(),
                date_raw: date,
                ..Default::default()
            };
            send_test(&config, &tenant, &phone, row).await
        }
        Commands::ClearFailed { tenant } => {
            let db = open_db(&config)?;
            let (start, end) = day_bounds_millis(Local::now());
            let removed = db.clear_failed_between(&tenant, start, end)?;
            db.record(
                Some(&tenant),
                "cli.clear_failed",
                json!({ "removed": removed }),
            );
            println!("🧹 [{tenant}] removed {removed} failed log entries from today");
            Ok(())
        }
        Commands::Logs {
            tenant,
            limit,
            audit,
        } => logs(&config, tenant.as_deref(), limit, audit),
        Commands::CheckEnv => check_env(&config),
    }
}
