//! `pbsync`: reconcile PocketBook booklists from the command line.

mod cli;
mod error;

use clap::Parser;
use exn::ResultExt;
use pbsync_config::Config;
use pbsync_device::{DeviceProfile, PROFILES, UsbId};
use pbsync_library::{BookRecord, SyncOptions, SyncSession, VolumeSelector};
use pbsync_storage::BackendHandle;
use pbsync_storage::backend::{LocalBackend, ReadOnlyBackend};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Args, Command};
use crate::error::{ErrorKind, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let default_filter = match args.verbose {
        true => "pbsync=debug",
        false => "pbsync=info",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let outcome = match args.command {
        Command::Books { card } => books(args.config.as_deref(), args.dry_run, card).await,
        Command::Identify { vendor, product, bcd, vendor_name } => identify(vendor, product, bcd, vendor_name),
        Command::Profiles => {
            profiles();
            Ok(())
        },
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        },
    }
}

fn backend(name: &str, root: &Path, dry_run: bool) -> Result<BackendHandle> {
    let local: BackendHandle = Arc::new(LocalBackend::new(name, root).or_raise(|| ErrorKind::Volume)?);
    Ok(match dry_run {
        true => Arc::new(ReadOnlyBackend::new(local)),
        false => local,
    })
}

async fn books(config: Option<&Path>, dry_run: bool, card: bool) -> Result<()> {
    let config = Config::load(config).or_raise(|| ErrorKind::Config)?;
    let dry_run = dry_run || config.sync.dry_run;
    let profile: &'static DeviceProfile = match &config.device.profile {
        Some(name) => pbsync_device::by_name(name).or_raise(|| ErrorKind::Profile)?,
        None => pbsync_device::generic(),
    };
    let Some(main_mount) = config.device.main.as_deref() else {
        exn::bail!(ErrorKind::Config);
    };
    let (main_mount, card_mount) = profile.order_drives(main_mount, config.device.card.as_deref());
    tracing::info!(
        profile = profile.name,
        main = %main_mount.display(),
        card = ?card_mount,
        dry_run,
        "Starting sync"
    );

    let main = backend("main", main_mount, dry_run)?;
    let card_backend = card_mount.map(|mount| backend("card", mount, dry_run)).transpose()?;
    let options = SyncOptions {
        main_root: config.volumes.main_root,
        card_root: config.volumes.card_root,
        cache_file: config.sync.cache_file,
    };
    let catalog = main_mount.join(pbsync_device::CATALOG_PATH);
    let mut session = SyncSession::open(profile, main, card_backend, &catalog, options)
        .await
        .or_raise(|| ErrorKind::Sync)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing without saving");
            on_signal.cancel();
        }
    });

    let result = session.books(selector(card), &cancel).await.or_raise(|| ErrorKind::Sync)?;
    for book in &result.booklist {
        println!("{}", describe(book));
    }
    println!(
        "{} books, {} missing, {} rejected rows, {}",
        result.booklist.len(),
        result.missing.len(),
        result.rejected,
        match (result.changed, dry_run) {
            (false, _) => "unchanged",
            (true, true) => "changed (dry run, not saved)",
            (true, false) => "changed",
        }
    );
    Ok(())
}

fn selector(card: bool) -> VolumeSelector {
    match card {
        true => VolumeSelector::Card,
        false => VolumeSelector::Main,
    }
}

fn describe(book: &BookRecord) -> String {
    let collections: Vec<String> = book.collections.iter().map(ToString::to_string).collect();
    format!(
        "{}\t{}\t{}\t[{}]",
        book.device_path,
        book.title,
        book.authors.join(" & "),
        collections.join(", ")
    )
}

fn identify(vendor: u16, product: u16, bcd: Option<u16>, vendor_name: Option<String>) -> Result<()> {
    let mut id = UsbId::new(vendor, product);
    if let Some(bcd) = bcd {
        id = id.with_bcd(bcd);
    }
    if let Some(name) = vendor_name {
        id = id.with_vendor_name(name);
    }
    match pbsync_device::match_usb(&id) {
        Some(profile) => {
            println!("{id}: {} ({})", profile, profile.name);
            Ok(())
        },
        None => exn::bail!(ErrorKind::Argument(format!("no profile matches {id}"))),
    }
}

fn profiles() {
    for profile in PROFILES {
        let catalog = match profile.capabilities.has_catalog {
            true => "catalog",
            false => "legacy",
        };
        println!("{:<16}\t{:<32}\t{catalog}", profile.name, profile.gui_name);
    }
}
