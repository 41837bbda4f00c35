mod app;
mod grid;
mod theme;
mod widgets;

use guide_core::collab::ReminderSet;
use guide_core::feed::FeedClient;
use guide_core::state::GuideOptions;
use guide_core::GuideState;
use guide_proto::model::DayKey;
use guide_proto::store::{SettingsFile, SnapshotDir};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = guide_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("epg.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("epg log: {}", log_path.display());
    tracing::info!("epg starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match guide_proto::config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default config: {:#}", e);
            guide_proto::config::Config::default()
        }
    };

    // ── Settings: config first, persisted favorites/recents on top ──────────
    let settings_file = SettingsFile::new(config.paths.settings_file.clone());
    let mut settings = config.guide.to_settings();
    settings_file.load().apply_to(&mut settings);
    // A guide left on an old day reopens on today.
    settings.current_date = settings.current_date.max(DayKey::today());

    let state = GuideState::new(settings, GuideOptions::from(&config.guide))
        .with_settings_sink(settings_file)
        .with_snapshot_store(SnapshotDir::new(config.paths.cache_dir.clone()))
        .with_notifications(ReminderSet::load(&config.paths.notifications_file));

    let feed = FeedClient::new(&config.feed)?;
    tracing::info!("Feed source: {:?}", feed.source());

    // ── Run TUI ──────────────────────────────────────────────────────────────
    app::App::new(state, feed, &config).run().await?;

    tracing::info!("epg exiting");
    Ok(())
}
