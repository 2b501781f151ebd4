//! heka-probe: drive one HealthKit card through a scripted sequence of
//! attach / tap / wait steps against in-process adapters and print every
//! rendered view as a JSON line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use hk_core::ports::RemoteSessionError;
use hk_core::ConnectionState;
use hk_infra::{FixedHealthPermission, InMemoryRemoteSessionService};
use hk_widget::bootstrap::{in_process_ports, load_settings, save_settings};
use hk_widget::{ComponentView, HekaComponent};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PermissionAnswer {
    Grant,
    Deny,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    /// Card attached to a window
    Attach,
    /// Button tapped
    Tap,
    /// Wait until no sync is running
    Wait,
}

#[derive(Debug, Parser)]
#[command(name = "heka-probe", version, about = "Drive the HealthKit card with in-process adapters")]
struct Cli {
    #[arg(long, default_value = "abc-123")]
    account: String,

    #[arg(long, default_value = "k1")]
    api_key: String,

    /// Settings file (TOML); platform default when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override the sync deadline for this run
    #[arg(long)]
    sync_timeout_secs: Option<u64>,

    /// Write the overrides back to the settings file before running
    #[arg(long, requires = "sync_timeout_secs")]
    save_settings: bool,

    #[arg(long, value_enum, default_value_t = PermissionAnswer::Grant)]
    permission: PermissionAnswer,

    /// Pretend a session already exists remotely
    #[arg(long)]
    existing_session: bool,

    /// Make the next sync fail with this message
    #[arg(long)]
    fail_sync: Option<String>,

    #[arg(long, default_value_t = 50)]
    sync_delay_ms: u64,

    /// Emit logs to stdout alongside the JSON lines
    #[arg(long)]
    verbose: bool,

    #[arg(value_enum, default_values_t = [Step::Attach, Step::Tap, Step::Wait])]
    steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
struct Record {
    at: DateTime<Utc>,
    step: Step,
    state: ConnectionState,
    view: ComponentView,
}

fn permission_for(answer: PermissionAnswer) -> FixedHealthPermission {
    match answer {
        PermissionAnswer::Grant => FixedHealthPermission::granted(),
        PermissionAnswer::Deny => FixedHealthPermission::denied(Some("declined in probe".to_string())),
        PermissionAnswer::Unavailable => FixedHealthPermission::unavailable(),
    }
}

fn service_for(cli: &Cli) -> InMemoryRemoteSessionService {
    let service = InMemoryRemoteSessionService::new()
        .with_sync_delay(Duration::from_millis(cli.sync_delay_ms));
    service.register_account(cli.account.as_str(), cli.api_key.clone());
    if cli.existing_session {
        service.insert_session(cli.account.as_str());
    }
    if let Some(reason) = &cli.fail_sync {
        service.fail_next_sync(RemoteSessionError::Service(reason.clone()));
    }
    service
}

/// Give spawned port calls a chance to report back.
async fn settle(component: &HekaComponent) {
    for _ in 0..3 {
        component.controller().flush().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_idle(component: &HekaComponent, limit: Duration) -> anyhow::Result<()> {
    let mut rx = component.controller().subscribe();
    tokio::time::timeout(limit, rx.wait_for(|s| s.state != ConnectionState::Syncing))
        .await
        .context("sync still running")?
        .context("controller stopped")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        hk_widget::bootstrap::tracing::init_tracing_subscriber()?;
    }

    let mut settings = load_settings(cli.settings.clone()).await?;
    if let Some(secs) = cli.sync_timeout_secs {
        settings.connection.sync_timeout_secs = secs;
        if cli.save_settings {
            save_settings(cli.settings.clone(), settings.clone()).await?;
        }
    }
    let wait_limit = Duration::from_secs(settings.connection.sync_timeout_secs.saturating_add(1));
    let service = Arc::new(service_for(&cli));
    let component = HekaComponent::new(
        cli.account.as_str(),
        cli.api_key.as_str(),
        in_process_ports(Arc::new(permission_for(cli.permission)), service),
        &settings,
    )?;

    for step in &cli.steps {
        match step {
            Step::Attach => component.did_move_to_superview(),
            Step::Tap => component.button_tapped(),
            Step::Wait => wait_idle(&component, wait_limit).await?,
        }
        settle(&component).await;

        let record = Record {
            at: Utc::now(),
            step: *step,
            state: component.view_model().current_connection_state(),
            view: component.render(),
        };
        println!("{}", serde_json::to_string(&record)?);
    }

    component.shutdown().await;
    Ok(())
}
