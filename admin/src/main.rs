//! GL License Admin
//!
//! Issues and manages license keys against a local license document.
//!
//! Usage:
//!   gl-admin create --tier pro --owner "Ann Example" --email ann@example.com
//!   gl-admin list
//!   gl-admin activate GL-PRO-2025-KQXM-BTRA-A016
//!
//! Every command loads the document, applies one change and saves it back.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gl_admin::{
    default_db_path, open_lifecycle, parse_key, render_license, render_revocation, render_summary,
    LicenseView, FINGERPRINT_SALT,
};
use gl_license::{CreateLicense, DeviceFingerprint, DeviceInfo, LicenseLifecycle, LicenseLookup};
use gl_types::{DeviceId, LicenseTier};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "gl-admin")]
#[command(about = "GL license administration")]
struct Args {
    /// Path to the license document
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue a new license
    Create {
        /// demo, basic, pro or enterprise
        #[arg(short, long)]
        tier: LicenseTier,
        #[arg(short, long)]
        owner: String,
        #[arg(short, long)]
        email: String,
        /// Override the tier's default duration
        #[arg(long)]
        days: Option<u32>,
        /// Override the tier's default device limit
        #[arg(long)]
        max_devices: Option<u32>,
    },
    /// Show one license, active or revoked
    Info {
        key: String,
        #[arg(long)]
        json: bool,
    },
    /// Summarize every license
    List {
        #[arg(long)]
        json: bool,
    },
    /// Add days to a license's expiry
    Extend { key: String, days: u32 },
    /// Revoke a license permanently
    Revoke {
        key: String,
        #[arg(short, long, default_value = "License violation")]
        reason: String,
    },
    /// Bind a device to a license
    Activate {
        key: String,
        /// Device ID; defaults to this machine's fingerprint
        #[arg(short, long)]
        device: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Unbind a device from a license
    Release { key: String, device: String },
    /// Bar a device from new activations
    Blacklist {
        device: String,
        #[arg(short, long, default_value = "Policy violation")]
        reason: String,
        /// Suspend instead of blacklisting permanently
        #[arg(long)]
        temporary: bool,
    },
    /// Lift a temporary suspension
    Unblock { device: String },
    /// Unbind blacklisted devices from every license
    Sweep,
    /// Print this machine's device fingerprint
    Fingerprint,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    if let Command::Fingerprint = args.command {
        return print_fingerprint();
    }

    let db = match args.db {
        Some(path) => path,
        None => default_db_path().context("Could not determine a data directory; pass --db")?,
    };
    debug!(path = %db.display(), "Opening license document");
    let engine = open_lifecycle(&db)
        .with_context(|| format!("Failed to open license document {}", db.display()))?;

    run(&engine, args.command)
}

fn run(engine: &LicenseLifecycle, command: Command) -> Result<()> {
    let now = engine.store().clock().now();

    match command {
        Command::Create { tier, owner, email, days, max_devices } => {
            let mut request = CreateLicense::new(tier, owner, email);
            request.duration_days = days;
            request.max_devices = max_devices;
            let key = engine.create(request).context("Failed to create license")?;
            let record = engine.store().get(&key)?;
            println!("License created:");
            print!("{}", render_license(&record, now));
        }
        Command::Info { key, json } => {
            let key = parse_key(engine, &key)?;
            match engine.query(&key)? {
                LicenseLookup::Active(record) if json => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                }
                LicenseLookup::Active(record) => print!("{}", render_license(&record, now)),
                LicenseLookup::Revoked(revocation) if json => {
                    println!("{}", serde_json::to_string_pretty(&revocation)?);
                }
                LicenseLookup::Revoked(revocation) => print!("{}", render_revocation(&revocation)),
            }
        }
        Command::List { json } => {
            let document = engine.store().document();
            if json {
                let views: Vec<LicenseView> = document
                    .license_keys
                    .values()
                    .map(|record| LicenseView::from_record(record, now))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                print!("{}", render_summary(&document, now));
            }
        }
        Command::Extend { key, days } => {
            let key = parse_key(engine, &key)?;
            let record = engine
                .extend(&key, days)
                .with_context(|| format!("Failed to extend {key}"))?;
            println!("License extended: {key}");
            println!("New expiry: {}", record.expiry_at.format("%Y-%m-%d %H:%M:%S"));
        }
        Command::Revoke { key, reason } => {
            let key = parse_key(engine, &key)?;
            let revocation = engine
                .revoke(&key, &reason)
                .with_context(|| format!("Failed to revoke {key}"))?;
            println!("License revoked:");
            print!("{}", render_revocation(&revocation));
        }
        Command::Activate { key, device, name } => {
            let key = parse_key(engine, &key)?;
            let (device, name) = match device {
                Some(raw) => (DeviceId::parse(&raw)?, name),
                None => {
                    let fingerprint = DeviceFingerprint::generate(FINGERPRINT_SALT);
                    let name = name.or_else(|| Some(DeviceInfo::collect().display_name()));
                    (fingerprint.id().clone(), name)
                }
            };
            let outcome = engine
                .activate(&key, &device, name.as_deref())
                .with_context(|| format!("Failed to activate {device} on {key}"))?;
            let record = &outcome.record;
            if outcome.newly_bound {
                println!("Device {device} activated ({}/{})", record.bound_count(), record.max_devices);
            } else {
                println!("Device {device} already active ({}/{})", record.bound_count(), record.max_devices);
            }
        }
        Command::Release { key, device } => {
            let key = parse_key(engine, &key)?;
            let device = DeviceId::parse(&device)?;
            let record = engine.admission().release(&key, &device)?;
            println!("Device {device} released ({}/{})", record.bound_count(), record.max_devices);
        }
        Command::Blacklist { device, reason, temporary } => {
            let device = DeviceId::parse(&device)?;
            let admission = engine.admission();
            let entry = if temporary {
                admission.suspend_device(&device, &reason)?
            } else {
                admission.blacklist_device(&device, &reason)?
            };
            let kind = if entry.permanent { "blacklisted" } else { "suspended" };
            println!("Device {kind}: {device}");
            println!("Reason: {}", entry.reason);
        }
        Command::Unblock { device } => {
            let device = DeviceId::parse(&device)?;
            match engine.admission().lift_suspension(&device)? {
                Some(_) => println!("Suspension lifted: {device}"),
                None => println!("Device is not listed: {device}"),
            }
        }
        Command::Sweep => {
            let removed = engine.admission().sweep_blacklisted()?;
            for (key, device) in &removed {
                println!("Unbound {device} from {key}");
            }
            info!(removed = removed.len(), "Sweep complete");
        }
        Command::Fingerprint => bail!("fingerprint does not use the license document"),
    }

    Ok(())
}

fn print_fingerprint() -> Result<()> {
    let fingerprint = DeviceFingerprint::generate(FINGERPRINT_SALT);
    let info = DeviceInfo::collect();
    println!("Device ID: {}", fingerprint.id());
    println!("Device:    {}", info.display_name());
    Ok(())
}
