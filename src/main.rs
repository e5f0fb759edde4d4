use dotenvy::dotenv;
use raffle_ledger::{
    app::AppContext,
    auth::{AdminVerifier, SignedCredentialProvider, StaticCredentialProvider},
    config::{database, settings},
    core::expiry,
    errors::Result,
    notify::{
        NotificationDispatcher, NotificationTarget, Notifier, TelegramNotifier,
        run_target_listener,
    },
};
use secrecy::SecretString;
use std::{env, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const SETTINGS_PATH: &str = "raffle.toml";
const INBOUND_CAPACITY: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Settings file plus DATABASE_URL / ADMIN_TELEGRAM_IDS overrides
    let settings = settings::load_settings(SETTINGS_PATH)
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    // 4. Database and schema
    let db = database::create_connection(&settings.database.url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Secrets are read here, directly before use, never stored in settings
    let telegram_token = env::var("TELEGRAM_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty());
    let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_default();

    let static_credential = StaticCredentialProvider::new(
        settings.admin.username.clone(),
        SecretString::from(admin_password),
    );
    if static_credential.is_none() {
        info!("ADMIN_PASSWORD not set, static admin credential disabled");
    }
    let signed = telegram_token.clone().map(|token| {
        SignedCredentialProvider::new(SecretString::from(token), settings.allow_list())
    });
    if signed.is_some() && settings.allow_list().is_empty() {
        warn!("No admin Telegram ids configured, every Telegram principal will be forbidden");
    }
    let verifier = AdminVerifier::from_providers(static_credential, signed);
    if verifier.provider_count() == 0 {
        warn!("No admin credentials configured, all admin operations will be denied");
    }

    // 6. Notifications and the /start listener
    let app = match telegram_token {
        Some(token) => {
            let notifier: Arc<dyn Notifier> =
                Arc::new(TelegramNotifier::new(SecretString::from(token)));
            let target = NotificationTarget::new();
            let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
            tokio::spawn(run_target_listener(
                inbound_rx,
                target.clone(),
                Arc::clone(&notifier),
            ));
            AppContext::new(
                db.clone(),
                verifier,
                NotificationDispatcher::new(notifier, target),
            )
            .with_inbound(inbound_tx)
        }
        None => {
            warn!("TELEGRAM_TOKEN not set, admin notifications disabled");
            AppContext::new(db.clone(), verifier, NotificationDispatcher::disabled())
        }
    };

    // 7. Optional expiry sweep
    if settings.expiry.enabled {
        let period = Duration::from_secs(settings.expiry.interval_secs.max(1));
        info!("Reservation expiry sweep every {:?}", period);
        tokio::spawn(expiry::run_expiry_sweep(db, period));
    }

    let active = app.list_active_raffles().await?;
    info!("Raffle ledger ready with {} active raffle(s)", active.len());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
