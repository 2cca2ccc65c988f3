//! `rotas route`: create routes and move them through their lifecycle.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rotas_core::types::{PresenceFlag, Route, RouteDraft, RouteId, RouteStatus};
use rotas_graph::{ConfigError, GraphClient, GraphConfig};
use rotas_sync::notify::contacts_from_env;
use rotas_sync::{AdherencePublisher, AdherenceSink, LogDispatcher, PublishOutcome, RouteService};

use super::home;

#[derive(Subcommand, Debug)]
pub enum RouteCommand {
    /// Schedule a new route (starts as pending).
    Create(CreateArgs),

    /// List routes, optionally filtered by status.
    List(ListArgs),

    /// Show one route with its audit metadata.
    Show(ShowArgs),

    /// Confirm a pending route and publish its adherence row.
    Confirm(ConfirmArgs),

    /// Mark a confirmed route as completed.
    Complete(CompleteArgs),

    /// Cancel a pending or confirmed route.
    Cancel(CancelArgs),

    /// Re-publish adherence rows that failed at confirmation time.
    Retry,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Inspection date, YYYY-MM-DD.
    #[arg(long)]
    pub date: String,

    /// Start time, HH:MM.
    #[arg(long)]
    pub time: String,

    #[arg(long)]
    pub sector: String,

    /// Safety technician leading the route.
    #[arg(long)]
    pub technician: String,

    /// Maintenance representative.
    #[arg(long)]
    pub maintenance: String,

    /// Production representative.
    #[arg(long)]
    pub production: String,

    /// Guest sectors, comma-separated ("Envase, Utilidades").
    #[arg(long)]
    pub guests: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// pending | confirmed | completed | cancelled
    #[arg(long, value_name = "STATUS")]
    pub status: Option<StatusArg>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: u64,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfirmArgs {
    pub id: u64,

    /// Who confirmed the inspection took place.
    #[arg(long)]
    pub responsible: String,

    /// Every mandatory participant attended.
    #[arg(long)]
    pub all_present: bool,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompleteArgs {
    pub id: u64,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    pub id: u64,

    /// Reason for cancelling (required).
    #[arg(long)]
    pub notes: String,
}

/// clap wrapper for [`RouteStatus`].
#[derive(Debug, Clone, Copy)]
pub struct StatusArg(pub RouteStatus);

impl FromStr for StatusArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RouteStatus::all()
            .iter()
            .copied()
            .find(|status| status.to_string().eq_ignore_ascii_case(s))
            .map(Self)
            .ok_or_else(|| {
                format!("unknown status '{s}'; expected: pending, confirmed, completed, cancelled")
            })
    }
}

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "date")]
    date: String,
    #[tabled(rename = "time")]
    time: String,
    #[tabled(rename = "sector")]
    sector: String,
    #[tabled(rename = "technician")]
    technician: String,
    #[tabled(rename = "status")]
    status: String,
}

pub fn run(cmd: RouteCommand) -> Result<()> {
    let publishing = matches!(cmd, RouteCommand::Confirm(_) | RouteCommand::Retry);
    let service = build_service(publishing)?;
    match cmd {
        RouteCommand::Create(args) => create(&service, args),
        RouteCommand::List(args) => list(&service, args),
        RouteCommand::Show(args) => show(&service, args),
        RouteCommand::Confirm(args) => confirm(&service, args),
        RouteCommand::Complete(args) => {
            let route = service
                .complete(RouteId(args.id), args.notes.as_deref())
                .with_context(|| format!("could not complete route {}", args.id))?;
            println!("✓ route {} {}", route.id, status_label(route.status));
            Ok(())
        }
        RouteCommand::Cancel(args) => {
            let route = service
                .cancel(RouteId(args.id), &args.notes)
                .with_context(|| format!("could not cancel route {}", args.id))?;
            println!("✓ route {} {}", route.id, status_label(route.status));
            Ok(())
        }
        RouteCommand::Retry => retry(&service),
    }
}

/// Route service over `~/.rotas`. Only `confirm` and `retry` need a sink.
fn build_service(publishing: bool) -> Result<RouteService> {
    let sink = if publishing { adherence_sink()? } else { None };
    Ok(RouteService::new(home()?, sink)
        .with_notifications(Arc::new(LogDispatcher), contacts_from_env()))
}

/// A malformed setting is fatal. With settings missing altogether the
/// confirmation still lands and its row is queued for `rotas route retry`.
fn adherence_sink() -> Result<Option<Arc<dyn AdherenceSink>>> {
    match GraphConfig::from_env() {
        Ok(config) => {
            let client = Arc::new(GraphClient::from_config(&config));
            let sink: Arc<dyn AdherenceSink> = Arc::new(AdherencePublisher::new(client));
            Ok(Some(sink))
        }
        Err(ConfigError::Missing(var)) => {
            tracing::warn!("{var} is not set; adherence rows will be queued, not published");
            Ok(None)
        }
        Err(err) => Err(err).context("invalid Graph configuration"),
    }
}

fn create(service: &RouteService, args: CreateArgs) -> Result<()> {
    let route = service
        .create(RouteDraft {
            date: args.date,
            time: args.time,
            sector: args.sector,
            safety_technician: args.technician,
            maintenance_rep: args.maintenance,
            production_rep: args.production,
            guests: args.guests,
            notes: args.notes,
        })
        .context("could not create route")?;
    println!(
        "✓ route {} scheduled: {} {} in {}",
        route.id, route.date, route.time, route.sector
    );
    Ok(())
}

fn list(service: &RouteService, args: ListArgs) -> Result<()> {
    let routes = service
        .list(args.status.map(|s| s.0))
        .context("failed to load route registry")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&routes).context("failed to render routes JSON")?
        );
        return Ok(());
    }

    if routes.is_empty() {
        println!("No routes found.");
        println!("Run: rotas route create --date ... --time ... --sector ...");
        return Ok(());
    }

    let rows = routes.iter().map(|r| RouteRow {
        id: r.id.0,
        date: r.date.clone(),
        time: r.time.clone(),
        sector: r.sector.clone(),
        technician: r.safety_technician.clone(),
        status: status_label(r.status),
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn show(service: &RouteService, args: ShowArgs) -> Result<()> {
    let route = service
        .show(RouteId(args.id))
        .with_context(|| format!("could not load route {}", args.id))?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&route).context("failed to render route JSON")?
        );
        return Ok(());
    }
    print_route(&route);
    Ok(())
}

fn confirm(service: &RouteService, args: ConfirmArgs) -> Result<()> {
    let outcome = service
        .confirm(
            RouteId(args.id),
            &args.responsible,
            args.notes.as_deref(),
            PresenceFlag::from_bool(args.all_present),
        )
        .with_context(|| format!("could not confirm route {}", args.id))?;

    println!(
        "✓ route {} {} ({})",
        outcome.route.id,
        status_label(outcome.route.status),
        outcome.record.status
    );
    match outcome.publish {
        PublishOutcome::Published { row_id } => {
            println!("  adherence row published (row {row_id})");
        }
        PublishOutcome::Queued { error } => {
            println!("  {} adherence row queued: {error}", "!".yellow().bold());
            println!("  run `rotas route retry` once the workbook is reachable");
        }
    }
    Ok(())
}

fn retry(service: &RouteService) -> Result<()> {
    let report = service
        .retry_failed_publishes()
        .context("failed to replay queued adherence rows")?;

    if report.published.is_empty() && report.still_failing.is_empty() {
        println!("Nothing queued.");
        return Ok(());
    }
    for (id, row_id) in &report.published {
        println!("✓ route {id} published (row {row_id})");
    }
    for entry in &report.still_failing {
        println!(
            "{} route {} still failing after {} attempts: {}",
            "✗".red(),
            entry.route_id,
            entry.attempts,
            entry.error
        );
    }
    Ok(())
}

fn print_route(route: &Route) {
    println!("Route {}  {}", route.id, status_label(route.status));
    println!("  when:        {} {}", route.date, route.time);
    println!("  sector:      {}", route.sector);
    println!("  technician:  {}", route.safety_technician);
    println!("  maintenance: {}", route.maintenance_rep);
    println!("  production:  {}", route.production_rep);
    if let Some(guests) = &route.guests {
        println!("  guests:      {guests}");
    }
    if let Some(notes) = &route.notes {
        println!("  notes:       {notes}");
    }
    if let Some(c) = &route.confirmation {
        println!(
            "  confirmed:   {} by {} (all present: {})",
            c.confirmed_at.format("%Y-%m-%d %H:%M"),
            c.responsible,
            c.all_present
        );
    }
    if let Some(c) = &route.completion {
        println!("  completed:   {}", c.completed_at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(c) = &route.cancellation {
        println!(
            "  cancelled:   {} ({})",
            c.cancelled_at.format("%Y-%m-%d %H:%M"),
            c.reason
        );
    }
}

fn status_label(status: RouteStatus) -> String {
    let label = status.to_string();
    match status {
        RouteStatus::Pending => label.yellow().to_string(),
        RouteStatus::Confirmed => label.cyan().to_string(),
        RouteStatus::Completed => label.green().to_string(),
        RouteStatus::Cancelled => label.red().to_string(),
    }
}
