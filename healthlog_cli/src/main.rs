use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Parser, Subcommand};
use healthlog_core::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "healthlog")]
#[command(about = "Personal health journal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Account to act as (ignored while no accounts are registered)
    #[arg(long, global = true, env = "HEALTHLOG_USER")]
    user: Option<String>,

    /// Password for --user
    #[arg(long, global = true, env = "HEALTHLOG_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one time slot, replacing what was there
    Log {
        /// Date (YYYY-MM-DD or "today")
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,

        /// Time slot (HH:MM, half hours from 08:00 to 23:30)
        #[arg(value_parser = parse_slot_arg)]
        slot: TimeSlot,

        /// Measured value
        #[arg(long, value_parser = parse_value_arg, allow_hyphen_values = true)]
        value: Option<f64>,

        /// Medication taken (repeat for several)
        #[arg(long = "med")]
        meds: Vec<String>,

        /// Free-text comment
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Show one day's entries
    Show {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },

    /// Clear one time slot
    Clear {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,

        #[arg(value_parser = parse_slot_arg)]
        slot: TimeSlot,
    },

    /// Manage the medication list
    #[command(subcommand)]
    Med(MedCommand),

    /// Manage the standard medication pattern
    #[command(subcommand)]
    Pattern(PatternCommand),

    /// Export all data as a JSON file or a transfer token
    Export {
        /// Output file (defaults to health_monitor_data_<today>.json)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print a base64 token to stdout instead of writing a file
        #[arg(long, conflicts_with = "out")]
        token: bool,
    },

    /// Replace all data with an exported file or token
    #[command(group(ArgGroup::new("source").required(true).args(["file", "token"])))]
    Import {
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        token: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Write the health log as CSV
    Report {
        #[arg(long)]
        out: PathBuf,
    },

    /// Manage accounts
    #[command(subcommand)]
    User(UserCommand),

    /// Show recent changes from the audit log
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum MedCommand {
    /// List medications with how often each is referenced
    List,
    Add { name: String },
    /// Rename a medication everywhere it is used
    Rename { old: String, new: String },
    /// Delete a medication and remove it from every record and the pattern
    Delete { name: String },
}

#[derive(Subcommand)]
enum PatternCommand {
    Show,
    /// Set a slot's medications (no --med clears the slot)
    Set {
        #[arg(value_parser = parse_slot_arg)]
        slot: TimeSlot,

        #[arg(long = "med")]
        meds: Vec<String>,
    },
    /// Pre-fill a day from the pattern
    Apply {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        new_password: String,
    },
    Passwd {
        name: String,
        #[arg(long)]
        new_password: String,
    },
    /// Remove an account (its data directory is kept)
    Delete { name: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    healthlog_core::logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());

    let ctx = Context {
        data_dir,
        config,
        user: cli.user,
        password: cli.password,
    };

    match cli.command {
        Commands::Log {
            date,
            slot,
            value,
            meds,
            comment,
        } => cmd_log(&ctx, date, slot, TimeSlotEntry::new(value, meds, comment)),
        Commands::Show { date } => cmd_show(&ctx, date),
        Commands::Clear { date, slot } => cmd_clear(&ctx, date, slot),
        Commands::Med(command) => cmd_med(&ctx, command),
        Commands::Pattern(command) => cmd_pattern(&ctx, command),
        Commands::Export { out, token } => cmd_export(&ctx, out, token),
        Commands::Import { file, token, yes } => cmd_import(&ctx, file, token, yes),
        Commands::Report { out } => cmd_report(&ctx, out),
        Commands::User(command) => cmd_user(&ctx, command),
        Commands::History { limit } => cmd_history(&ctx, limit),
    }
}

struct Context {
    data_dir: PathBuf,
    config: Config,
    user: Option<String>,
    password: Option<String>,
}

impl Context {
    fn store(&self) -> Result<FileStore> {
        Ok(FileStore::new(&self.data_dir).with_seed_catalog(self.config.seed_catalog()?))
    }

    /// Resolve the acting user. With no registered accounts everyone is
    /// the implicit local user.
    fn authenticate(&self, store: &mut FileStore) -> Result<UserId> {
        if store.registry()?.is_empty() {
            if let Some(name) = self.user.as_deref().filter(|n| *n != UserId::LOCAL) {
                tracing::warn!("No accounts registered; ignoring --user {}", name);
            }
            return Ok(UserId::local());
        }

        let (Some(name), Some(password)) = (self.user.as_deref(), self.password.as_deref())
        else {
            return Err(Error::Auth(
                "accounts are registered; pass --user and --password".into(),
            ));
        };

        store
            .login(name, password)?
            .ok_or_else(|| Error::Auth(format!("invalid credentials for '{}'", name)))
    }

    fn open_session(&self) -> Result<JournalSession<FileStore>> {
        let mut store = self.store()?;
        let user = self.authenticate(&mut store)?;
        let audit = JsonlAuditLog::new(store.audit_log_path(&user));
        Ok(JournalSession::open(store, user, self.config.catalog_policy())?
            .with_audit(Box::new(audit)))
    }
}

fn cmd_log(ctx: &Context, date: NaiveDate, slot: TimeSlot, entry: TimeSlotEntry) -> Result<()> {
    let mut session = ctx.open_session()?;
    let cleared = entry.is_empty();
    session.set_slot(date, slot, entry)?;

    if cleared {
        println!("✓ Nothing to record; cleared {} {}", date, slot);
    } else {
        println!("✓ Logged {} {}", date, slot);
    }
    Ok(())
}

fn cmd_show(ctx: &Context, date: NaiveDate) -> Result<()> {
    let session = ctx.open_session()?;

    match session.journal().health_log().day(date) {
        Some(day) if day.has_data() => {
            println!("{}", date);
            for (slot, entry) in day.iter().filter(|(_, e)| !e.is_empty()) {
                println!("  {}  {}", slot, describe_entry(entry));
            }
        }
        _ => println!("No entries for {}", date),
    }
    Ok(())
}

fn cmd_clear(ctx: &Context, date: NaiveDate, slot: TimeSlot) -> Result<()> {
    let mut session = ctx.open_session()?;
    if session.clear_slot(date, slot)? {
        println!("✓ Cleared {} {}", date, slot);
    } else {
        println!("Nothing recorded at {} {}", date, slot);
    }
    Ok(())
}

fn cmd_med(ctx: &Context, command: MedCommand) -> Result<()> {
    let mut session = ctx.open_session()?;

    match command {
        MedCommand::List => {
            let journal = session.journal();
            if journal.catalog().is_empty() {
                println!("No medications");
            }
            for name in journal.catalog().iter() {
                println!("  {} ({} references)", name, journal.reference_count(name));
            }
        }
        MedCommand::Add { name } => {
            if session.add_medication(&name)? {
                println!("✓ Added '{}'", name.trim());
            } else {
                println!("'{}' is already in the list", name.trim());
            }
        }
        MedCommand::Rename { old, new } => {
            let report = session.rename_medication(&old, &new)?;
            if report.is_noop() {
                println!("Nothing to rename");
            } else {
                println!(
                    "✓ Renamed '{}' to '{}': {} references in {} days, {} pattern slots",
                    old,
                    new.trim(),
                    report.references_rewritten,
                    report.touched_dates.len(),
                    report.pattern_slots_rewritten
                );
            }
        }
        MedCommand::Delete { name } => {
            let report = session.delete_medication(&name)?;
            println!(
                "✓ Deleted '{}': removed {} references from {} days and {} pattern slots",
                name,
                report.references_rewritten,
                report.touched_dates.len(),
                report.pattern_slots_rewritten
            );
        }
    }
    Ok(())
}

fn cmd_pattern(ctx: &Context, command: PatternCommand) -> Result<()> {
    let mut session = ctx.open_session()?;

    match command {
        PatternCommand::Show => {
            let pattern = session.journal().pattern();
            if pattern.is_empty() {
                println!("Standard pattern is empty");
            }
            for (slot, meds) in pattern.iter() {
                println!("  {}  {}", slot, meds.join(", "));
            }
        }
        PatternCommand::Set { slot, meds } => {
            let cleared = meds.is_empty();
            let mut pattern = session.journal().pattern().clone();
            pattern.set(slot, meds);
            session.save_pattern(pattern)?;
            if cleared {
                println!("✓ Cleared pattern slot {}", slot);
            } else {
                println!("✓ Updated pattern slot {}", slot);
            }
        }
        PatternCommand::Apply { date } => {
            let written = session.apply_pattern(date)?;
            println!("✓ Applied standard pattern to {} ({} slots)", date, written);
        }
    }
    Ok(())
}

fn cmd_export(ctx: &Context, out: Option<PathBuf>, token: bool) -> Result<()> {
    let session = ctx.open_session()?;
    let bundle = session.export_bundle();

    if token {
        println!("{}", codec::encode_token(&bundle)?);
        return Ok(());
    }

    let path = out.unwrap_or_else(|| {
        PathBuf::from(codec::export_file_name(Local::now().date_naive()))
    });
    codec::write_export_file(&bundle, &path)?;

    println!(
        "✓ Exported {} days to {}",
        bundle.health_log.len(),
        path.display()
    );
    Ok(())
}

fn cmd_import(
    ctx: &Context,
    file: Option<PathBuf>,
    token: Option<String>,
    yes: bool,
) -> Result<()> {
    let mut session = ctx.open_session()?;

    let parsed = match (file, token) {
        (Some(path), _) => codec::read_export_file(&path),
        (None, Some(token)) => codec::decode_token(&token),
        (None, None) => Err(Error::Validation(
            "either --file or --token is required".into(),
        )),
    };
    let bundle = match parsed {
        Ok(bundle) => bundle,
        Err(e) => {
            session.reject_import(&e);
            return Err(e);
        }
    };

    if !yes {
        println!(
            "This replaces ALL data for '{}' with {} days, {} medications and {} pattern slots.",
            session.user(),
            bundle.health_log.len(),
            bundle.catalog.len(),
            bundle.pattern.len()
        );
        if !confirm("Continue?")? {
            println!("Import cancelled");
            return Ok(());
        }
    }

    let days = bundle.health_log.len();
    session.import_bundle(bundle, ctx.config.import.reject_dangling_references)?;
    println!("✓ Imported {} days", days);
    Ok(())
}

fn cmd_report(ctx: &Context, out: PathBuf) -> Result<()> {
    let session = ctx.open_session()?;
    let rows = report::write_csv_report(session.journal().health_log(), &out)?;

    println!("✓ Wrote {} rows to {}", rows, out.display());
    Ok(())
}

fn cmd_user(ctx: &Context, command: UserCommand) -> Result<()> {
    let mut store = ctx.store()?;
    let mut registry = store.registry()?;

    // Once accounts exist, managing them requires signing in
    if !registry.is_empty() {
        ctx.authenticate(&mut store)?;
    }

    match command {
        UserCommand::List => {
            if registry.is_empty() {
                println!("No accounts registered (running as '{}')", UserId::LOCAL);
            }
            for name in registry.list_users() {
                println!("  {}", name);
            }
        }
        UserCommand::Add { name, new_password } => {
            let user = registry.add_user(&name, &new_password)?;
            println!("✓ Added user {}", user);
        }
        UserCommand::Passwd { name, new_password } => {
            registry.set_password(&name, &new_password)?;
            println!("✓ Password changed for {}", name);
        }
        UserCommand::Delete { name } => {
            registry.delete_user(&name)?;
            println!(
                "✓ Deleted user {} (data kept in {})",
                name,
                store.user_dir(&UserId::new(name.as_str())).display()
            );
        }
    }
    Ok(())
}

fn cmd_history(ctx: &Context, limit: usize) -> Result<()> {
    let mut store = ctx.store()?;
    let user = ctx.authenticate(&mut store)?;
    let events = audit::read_events(&store.audit_log_path(&user))?;

    if events.is_empty() {
        println!("No history for {}", user);
        return Ok(());
    }

    let skip = events.len().saturating_sub(limit);
    for event in &events[skip..] {
        println!(
            "{}  {}",
            event.at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            describe_event(&event.kind)
        );
    }
    Ok(())
}

fn describe_entry(entry: &TimeSlotEntry) -> String {
    let mut parts = Vec::new();
    if let Some(value) = entry.value {
        parts.push(format!("value {}", value));
    }
    if !entry.medications.is_empty() {
        parts.push(format!("meds {}", entry.medications.join(", ")));
    }
    if !entry.comment.trim().is_empty() {
        parts.push(format!("\"{}\"", entry.comment));
    }
    parts.join("  ")
}

fn describe_event(kind: &AuditKind) -> String {
    match kind {
        AuditKind::DaySaved { date, slots } => format!("saved {} ({} slots)", date, slots),
        AuditKind::PatternSaved { slots } => format!("saved standard pattern ({} slots)", slots),
        AuditKind::MedicationAdded { name } => format!("added medication '{}'", name),
        AuditKind::MedicationRenamed {
            from,
            to,
            references,
            days,
        } => format!(
            "renamed '{}' to '{}' ({} references, {} days)",
            from, to, references, days
        ),
        AuditKind::MedicationDeleted {
            name,
            references,
            days,
        } => format!(
            "deleted medication '{}' ({} references, {} days)",
            name, references, days
        ),
        AuditKind::Imported {
            days,
            medications,
            pattern_slots,
        } => format!(
            "imported {} days, {} medications, {} pattern slots",
            days, medications, pattern_slots
        ),
        AuditKind::ImportRejected { reason } => format!("rejected import: {}", reason),
        AuditKind::PartialImport {
            written,
            failed,
            reason,
        } => format!(
            "PARTIAL IMPORT: wrote [{}], failed [{}]: {}",
            written.join(", "),
            failed.join(", "),
            reason
        ),
        AuditKind::StoreFailure {
            operation,
            reason,
            recovered_from,
        } => format!(
            "{} failed: {} (recovered from {})",
            operation, reason, recovered_from
        ),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn parse_date_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    if s.eq_ignore_ascii_case("today") {
        return Ok(Local::now().date_naive());
    }
    parse_date(s).map_err(|e| e.to_string())
}

fn parse_slot_arg(s: &str) -> std::result::Result<TimeSlot, String> {
    TimeSlot::parse(s).map_err(|e| e.to_string())
}

fn parse_value_arg(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !value.is_finite() {
        return Err(format!("'{}' is not a finite number", s));
    }
    Ok(value)
}
