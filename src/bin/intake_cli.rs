use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use returns_intake::{
    config::{self, IntakeConfig},
    db::{self, DbPool},
    events::{process_events, EventSender},
    intake::{
        DuplicateFilter, IntakeDetails, LineScanSource, MatchOutcome, NormalizedKey,
        ScanInputSource,
    },
    repositories::{InboundStore, SeaOrmInboundStore},
    services::{
        scan_session::{group_progress, lookup_group},
        DuplicateReview, FileSessionStore, LpnOutcome, ScanOutcome, ScanSession, SessionActivity,
        ShipmentReconciler,
    },
    IntakeError,
};
use serde::Serialize;
use tokio::io::BufReader;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "returns-intake",
    about = "Scan and reconcile returned packages against declared shipments",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run a scan session reading one scan per line from stdin
    Scan(ScanArgs),
    /// Show live progress for a tracking number
    Progress(TrackingArgs),
    /// List declared lines that share a declaration key
    Duplicates(DuplicatesArgs),
    /// Mark a flagged line as reviewed
    ConfirmDuplicate(ConfirmDuplicateArgs),
    /// Re-check a group after inbound records were deleted
    Reconcile(ReconcileArgs),
}

#[derive(Args)]
struct ScanArgs {
    #[arg(
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "discard",
        help = "Resume an interrupted session without prompting"
    )]
    resume: bool,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Discard an interrupted session without prompting"
    )]
    discard: bool,
}

#[derive(Args)]
struct TrackingArgs {
    #[arg(help = "Carrier tracking number")]
    tracking_number: String,
}

#[derive(Args)]
struct ReconcileArgs {
    #[arg(help = "Carrier tracking number")]
    tracking_number: String,
    #[arg(long, default_value_t = 1, help = "How many inbound records were deleted")]
    deleted: u64,
}

#[derive(Args)]
struct DuplicatesArgs {
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Only lines nobody has confirmed yet"
    )]
    unconfirmed: bool,
}

#[derive(Args)]
struct ConfirmDuplicateArgs {
    #[arg(value_parser = clap::value_parser!(Uuid), help = "Shipment line identifier (UUID)")]
    line_id: Uuid,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::Scan(args) => run_scan(&context, args, cli.json).await?,
        Commands::Progress(args) => handle_progress(&context, args, cli.json).await?,
        Commands::Duplicates(args) => handle_duplicates(&context, args, cli.json).await?,
        Commands::ConfirmDuplicate(args) => {
            let line_id = context.duplicate_review().confirm(args.line_id).await?;
            if cli.json {
                print_json(&serde_json::json!({ "confirmed": line_id }))?;
            } else {
                println!("Confirmed duplicate line {}", line_id);
            }
        }
        Commands::Reconcile(args) => {
            let outcome = context
                .reconciler()
                .reconcile(&args.tracking_number, args.deleted)
                .await?;
            if cli.json {
                print_json(&outcome)?;
            } else if let Some(note) = &outcome.note {
                println!(
                    "{}: reverted {} line(s) to arrived. {}",
                    outcome.tracking_number, outcome.reverted, note
                );
            } else {
                println!(
                    "{}: inbounded {} of {}, nothing to revert",
                    outcome.tracking_number, outcome.inbounded, outcome.declared
                );
            }
        }
    }

    Ok(())
}

struct CliContext {
    config: IntakeConfig,
    db: Arc<DbPool>,
    store: Arc<dyn InboundStore>,
    event_sender: Arc<EventSender>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load intake config")?;
        config::init_tracing(&config.log_level, config.log_json);

        let db_pool = db::establish_connection_from_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);
        let store: Arc<dyn InboundStore> = Arc::new(SeaOrmInboundStore::new(db.clone()));

        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);
        tokio::spawn(process_events(event_rx));

        Ok(Self {
            config,
            db,
            store,
            event_sender: Arc::new(event_sender),
        })
    }

    fn scan_session(&self) -> ScanSession {
        ScanSession::new(
            self.store.clone(),
            Arc::new(FileSessionStore::new(self.config.session_store_path())),
            self.event_sender.clone(),
            self.config.engine_settings(),
        )
    }

    fn duplicate_review(&self) -> DuplicateReview {
        DuplicateReview::new(self.store.clone(), self.event_sender.clone())
    }

    fn reconciler(&self) -> ShipmentReconciler {
        ShipmentReconciler::new(self.store.clone(), self.event_sender.clone())
    }
}

/// Operator commands interleaved with scans on the input stream.
#[derive(Debug, PartialEq)]
enum ControlLine {
    Complete,
    Force(Option<String>),
    Reset,
    Confirm(String),
    Cancel,
    Progress,
    Resume,
    Discard,
}

impl ControlLine {
    /// `None` for ordinary scans; an error for an unknown or malformed `:` command.
    fn parse(line: &str) -> Option<Result<Self>> {
        let rest = line.strip_prefix(':')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        let parsed = match (name.to_ascii_lowercase().as_str(), arg) {
            ("complete", None) => Ok(Self::Complete),
            ("force", reason) => Ok(Self::Force(reason.map(str::to_string))),
            ("reset", None) => Ok(Self::Reset),
            ("confirm", Some(sku)) => Ok(Self::Confirm(sku.to_string())),
            ("confirm", None) => Err(anyhow!(":confirm needs a SKU")),
            ("cancel", None) => Ok(Self::Cancel),
            ("progress", None) => Ok(Self::Progress),
            ("resume", None) => Ok(Self::Resume),
            ("discard", None) => Ok(Self::Discard),
            _ => Err(anyhow!("Unknown command: {}", line)),
        };
        Some(parsed)
    }
}

async fn run_scan(context: &CliContext, args: ScanArgs, json: bool) -> Result<()> {
    let mut engine = context.scan_session();
    engine.on_session_active(|activity: &SessionActivity| {
        tracing::debug!(
            active = activity.active,
            state = %activity.state,
            tracking = activity.tracking_number.as_deref().unwrap_or("-"),
            "Session activity"
        );
    });

    if let Some(offer) = engine.initialize().await? {
        if args.resume {
            report(json, &engine.resume().await?, |m| {
                format!("Resumed {} ({} of {})", m.tracking_number, m.inbounded, m.declared)
            })?;
        } else if args.discard {
            engine.discard().await?;
            println!("Discarded interrupted session for {}", offer.tracking_number);
        } else {
            report(json, &offer, |o| {
                format!(
                    "Interrupted session for {} ({} of {} inbounded, saved {}). Enter :resume or :discard",
                    o.tracking_number, o.inbounded, o.declared, o.saved_at
                )
            })?;
        }
    }

    let mut input = LineScanSource::new(BufReader::new(tokio::io::stdin()));
    while let Some(line) = input.next_scan().await {
        let result = match ControlLine::parse(&line) {
            Some(Ok(control)) => handle_control(&mut engine, control, json).await,
            Some(Err(e)) => Err(e),
            None => match engine.handle_scan(&line).await {
                Ok(outcome) => render_scan(&outcome, json),
                Err(e) => Err(e.into()),
            },
        };
        if let Err(e) = result {
            render_error(&e, json)?;
        }
    }

    Ok(())
}

async fn handle_control(engine: &mut ScanSession, control: ControlLine, json: bool) -> Result<()> {
    match control {
        ControlLine::Complete => {
            let completion = engine.complete_package().await?;
            report(json, &completion, |r| {
                format!("Completed {}: {} of {}", r.tracking_number, r.inbounded, r.declared)
            })
        }
        ControlLine::Force(reason) => {
            let completion = engine.force_complete(reason.as_deref()).await?;
            report(json, &completion, |r| {
                format!(
                    "Force completed {}: {}",
                    r.tracking_number,
                    r.note.as_deref().unwrap_or("")
                )
            })
        }
        ControlLine::Reset => {
            engine.reset().await?;
            println!("Session reset");
            Ok(())
        }
        ControlLine::Confirm(sku) => {
            let receipt = engine.confirm_sku(&sku, IntakeDetails::default()).await?;
            render_scan(&ScanOutcome::Lpn(LpnOutcome::Committed(receipt)), json)
        }
        ControlLine::Cancel => {
            match engine.cancel_pending() {
                Some(lpn) => println!("Cancelled pending scan {}", lpn),
                None => println!("Nothing pending"),
            }
            Ok(())
        }
        ControlLine::Progress => {
            let progress = engine.progress().await?;
            report(json, &progress, |p| {
                format!(
                    "{}: {} of {} inbounded, {} remaining, {} this session",
                    p.tracking_number, p.inbounded, p.declared, p.remaining, p.session_scanned
                )
            })
        }
        ControlLine::Resume => {
            let matched = engine.resume().await?;
            report(json, &matched, |m| {
                format!("Resumed {} ({} of {})", m.tracking_number, m.inbounded, m.declared)
            })
        }
        ControlLine::Discard => {
            engine.discard().await?;
            println!("Interrupted session discarded");
            Ok(())
        }
    }
}

async fn handle_progress(context: &CliContext, args: TrackingArgs, json: bool) -> Result<()> {
    let tracking = NormalizedKey::parse(&args.tracking_number)
        .ok_or_else(|| anyhow!("tracking number is empty"))?;

    let group = match lookup_group(context.store.as_ref(), &tracking).await? {
        MatchOutcome::Matched { group, .. } | MatchOutcome::AlreadyComplete { group, .. } => group,
        MatchOutcome::NotFound { tracking_number } => {
            return Err(IntakeError::NotFound(tracking_number).into())
        }
    };
    let progress = group_progress(context.store.as_ref(), &group, 0).await?;

    if json {
        return print_json(&progress);
    }
    println!(
        "{}: {} of {} inbounded, {} remaining",
        progress.tracking_number, progress.inbounded, progress.declared, progress.remaining
    );
    for line in &progress.lines {
        println!(
            "- {} • {} • {} of {}",
            line.line_id, line.sku, line.inbounded, line.declared
        );
    }
    Ok(())
}

async fn handle_duplicates(context: &CliContext, args: DuplicatesArgs, json: bool) -> Result<()> {
    let filter = if args.unconfirmed {
        DuplicateFilter::Unconfirmed
    } else {
        DuplicateFilter::All
    };
    let flagged = context.duplicate_review().list(filter).await?;

    if json {
        return print_json(&flagged);
    }
    if flagged.is_empty() {
        println!("No duplicate declarations");
    }
    for entry in &flagged {
        println!(
            "- {} • {} • order {} • {} x{}{}",
            entry.line.id,
            entry.line.tracking_number,
            entry.line.order_id,
            entry.line.sku,
            entry.line.quantity,
            if entry.confirmed { " • confirmed" } else { "" }
        );
    }
    Ok(())
}

fn render_scan(outcome: &ScanOutcome, json: bool) -> Result<()> {
    if json {
        return print_json(outcome);
    }
    match outcome {
        ScanOutcome::Tracking(matched) => println!(
            "Tracking {} matched: {} line(s), {} of {} inbounded",
            matched.tracking_number, matched.lines, matched.inbounded, matched.declared
        ),
        ScanOutcome::Lpn(LpnOutcome::Committed(receipt)) => {
            println!(
                "Inbounded {} as {} ({} of {}, state {})",
                receipt.record.lpn,
                receipt.record.sku,
                receipt.inbounded,
                receipt.declared,
                receipt.state
            );
            if receipt.over_quantity {
                println!("  warning: more units than declared");
            }
        }
        ScanOutcome::Lpn(LpnOutcome::ConfirmationRequired { lpn, finding }) => {
            let candidates: Vec<String> =
                finding.candidates().into_iter().map(|c| c.into_inner()).collect();
            println!(
                "{} needs a SKU pick: {} (use :confirm <sku> or :cancel)",
                lpn,
                candidates.join(", ")
            );
        }
    }
    Ok(())
}

fn render_error(err: &anyhow::Error, json: bool) -> Result<()> {
    let kind = err.downcast_ref::<IntakeError>().map(IntakeError::kind);
    if json {
        print_json(&serde_json::json!({ "error": err.to_string(), "kind": kind }))
    } else {
        match kind {
            Some(kind) => eprintln!("[{}] {}", kind, err),
            None => eprintln!("{}", err),
        }
        Ok(())
    }
}

fn report<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        print_json(value)
    } else {
        println!("{}", text(value));
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
