//! CharBldr Engine - command-line entry point.
//!
//! `charbldr-engine <race>[/<subrace>] <class>[/<subclass>] <background>`
//! applies the three slots to a fresh character and prints it as JSON.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use charbldr_domain::BuildSourceKind;
use charbldr_engine::infrastructure::clock::SystemClock;
use charbldr_engine::infrastructure::event_sink::{
    CoalescingEventSink, NoopExternalCache, TracingEventSink,
};
use charbldr_engine::infrastructure::importers::FiveToolsImporter;
use charbldr_engine::infrastructure::settings::EngineSettings;
use charbldr_engine::use_cases::build_source::load_selection;
use charbldr_engine::use_cases::BuildSession;

const USAGE: &str = "usage: charbldr-engine <race>[/<subrace>] <class>[/<subclass>] <background>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "charbldr_engine=info,charbldr_domain=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [race, class, background] = args.as_slice() else {
        bail!(USAGE);
    };

    let settings = EngineSettings::from_env()?;
    let Some(data_path) = settings.fivetools_data_path.clone() else {
        bail!("FIVETOOLS_DATA_PATH must point at a 5etools checkout");
    };
    let importer = FiveToolsImporter::new(&data_path);
    if !importer.validate_path().await {
        bail!("No 5etools data directory under {}", data_path.display());
    }
    tracing::info!(path = %data_path.display(), "Using 5etools data");

    let events = Arc::new(CoalescingEventSink::new(
        Arc::new(TracingEventSink),
        Arc::new(SystemClock::new()),
        settings.refresh_window,
    ));
    let mut session = BuildSession::from_settings(&settings, events, Arc::new(NoopExternalCache));

    let slots = [
        (BuildSourceKind::Race, race),
        (BuildSourceKind::Class, class),
        (BuildSourceKind::Background, background),
    ];
    for (kind, arg) in slots {
        let (name, sub) = split_selection(arg);
        let selection = load_selection(&importer, kind, name, sub)
            .await
            .with_context(|| format!("loading {} {:?}", kind, arg))?;
        session.apply_build_source(kind, Some(&selection));
    }

    println!("{}", serde_json::to_string_pretty(&session.to_persisted())?);
    Ok(())
}

/// `"Elf/High"` -> `("Elf", Some("High"))`
fn split_selection(arg: &str) -> (&str, Option<&str>) {
    match arg.split_once('/') {
        Some((name, sub)) if !sub.trim().is_empty() => (name.trim(), Some(sub.trim())),
        Some((name, _)) => (name.trim(), None),
        None => (arg.trim(), None),
    }
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
