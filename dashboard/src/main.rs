//! Account and security analytics dashboard client

use clap::Parser;
use color_eyre::Result;
use gate::{Decision, Route, resolve};
use std::io::read_to_string;
use tracing::{info, warn};

use crate::client::Client;
use crate::config::{Config, LogFormat};
use crate::model::{NewAccount, PasswordChange};
use crate::navigation::Navigator;
use crate::opt::{Command, Opt};
use crate::pipeline::{AnalyticsPipeline, AnalyticsView};
use crate::store::SessionStore;

mod client;
mod config;
mod model;
mod navigation;
mod opt;
mod pipeline;
mod store;

/// Initializes tracing collection
///
/// Logs go to stderr, stdout is reserved for the command output.
fn setup_tracing(config: config::Logging) {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    };

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let filter_layer = config
        .filters
        .into_iter()
        .fold(filter_layer, |layer, filter| layer.add_directive(filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let Opt {
        config: mut config_file,
        command,
    } = Opt::parse();

    let config = read_to_string(&mut config_file)?;
    let config: Config = toml::from_str(&config)?;

    setup_tracing(config.logging);
    color_eyre::install()?;

    info!(
        config = ?config_file.path().path(),
        api = %config.api.base_url,
        "Tracing initialized"
    );

    let store = SessionStore::with_config(config.store).await?;
    let client = Client::new(&config.api, store)?;

    match command {
        Command::Login { username, password } => {
            let session = client.login(&username, &password).await?;
            println!("Logged in as {username} ({})", session.role);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let account = NewAccount {
                username,
                email,
                password,
            };
            client.register(&account).await?;
            println!("Account {} registered, you can log in now", account.username);
        }
        Command::Logout => {
            client.store().clear().await?;
            println!("Logged out");
        }
        Command::Status => status(client.store()),
        Command::Profile => {
            let profile = client.profile().await?;
            println!("{} <{}>", profile.username, profile.email);
            println!("  member since {}", profile.created_at);
            match profile.last_login {
                Some(last_login) => println!("  last login {last_login}"),
                None => println!("  never logged in before"),
            }
        }
        Command::ChangePassword {
            current,
            new,
            confirm,
        } => {
            client
                .change_password(PasswordChange {
                    current,
                    new,
                    confirm,
                })
                .await?;
            println!("Password changed");
        }
        Command::Users => {
            for user in client.users().await? {
                let role = if user.is_admin { "admin" } else { "user" };
                let last_login = user
                    .last_login
                    .map(|at| at.to_string())
                    .unwrap_or_else(|| "-".to_owned());
                println!(
                    "{:>5}  {:<20} {:<30} {:<6} {last_login}",
                    user.id, user.username, user.email, role
                );
            }
        }
        Command::CreateAdmin {
            username,
            email,
            password,
        } => {
            let account = NewAccount {
                username,
                email,
                password,
            };
            client.create_admin(&account).await?;
            println!("Admin {} created", account.username);
        }
        Command::Watch => watch(client, &config.analytics).await?,
    }

    Ok(())
}

/// Prints where every route leads with the stored session
fn status(store: &SessionStore) {
    let session = store.current();
    match &session {
        Some(session) => println!("Logged in ({})", session.role),
        None => println!("Not logged in"),
    }

    for route in Route::all() {
        let decision = match route.access() {
            gate::Access::Public => Decision::Allow,
            gate::Access::Authenticated => store.authorize(false),
            gate::Access::Admin => store.authorize(true),
        };
        let target = resolve(route, session.as_ref());
        println!("  {route:<12} {decision:?} -> {target}");
    }
}

/// Follows the analytics in the admin area until interrupted or logged out
async fn watch(client: Client, config: &config::Analytics) -> Result<()> {
    let store = client.store().clone();
    let pipeline = AnalyticsPipeline::new(client, config.refresh_interval());
    let mut navigator = Navigator::new(store, pipeline.clone());

    let location = navigator.navigate(Route::Admin).await;
    if location != Route::Admin {
        warn!(route = %location, "Analytics are available only in the admin area");
        return Ok(());
    }

    let mut view = pipeline.subscribe();
    let printer = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            print_view(&view.borrow_and_update());
        }
    });

    let result: Result<()> = tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.map_err(Into::into),
        route = navigator.watch_session() => {
            warn!(%route, "Session no longer permits the admin area");
            Ok(())
        }
    };

    navigator.close().await;
    printer.abort();
    info!("Stopped watching");
    result
}

fn print_view(view: &AnalyticsView) {
    if let Some(err) = &view.last_error {
        println!("! refresh failed, showing previous data: {err}");
        return;
    }

    let Some(snapshot) = &view.snapshot else {
        return;
    };

    println!();
    if let Some(at) = view.refreshed_at {
        println!("Refreshed at {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!(
        "Login attempts: {} total, {} successful, {} failed",
        snapshot.total_attempts, snapshot.successful_attempts, snapshot.failed_attempts
    );
    println!(
        "Map: {:.4}, {:.4} at zoom {}",
        view.map.center.lat, view.map.center.lng, view.map.zoom
    );

    for marker in &view.markers {
        let outcome = if marker.success { "ok" } else { "failed" };
        println!(
            "  {}  {:<15} {:<6} {:.4}, {:.4}  {}",
            marker.timestamp,
            marker.ip_address,
            outcome,
            marker.position.lat,
            marker.position.lng,
            marker.device_info.as_deref().unwrap_or("-")
        );
    }

    for point in &view.series {
        println!(
            "  {:>5}  {:>4} ok  {:>4} failed",
            point.hour, point.successful, point.failed
        );
    }
}
