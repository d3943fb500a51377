use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, prepare_database_url},
    HistoryEntry, Navigation, TimeclockClient,
};
use shared::{
    domain::{ClockEvent, ClockStatus},
    protocol::{Credentials, SignUpRequest},
};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "timeclock", about = "Clock in and out of shifts from the terminal")]
struct Args {
    /// Sign in with this email before running the command.
    #[arg(long, global = true, requires = "password")]
    email: Option<String>,
    #[arg(long, global = true, requires = "email")]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new account (needs --email and --password).
    SignUp {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    SignOut,
    /// Ask the server who the current session belongs to.
    Whoami,
    Status,
    ClockIn {
        /// Overrides the configured clock-in code.
        #[arg(long)]
        code: Option<u32>,
    },
    ClockOut,
    StartBreak,
    EndBreak,
    History {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.session_database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(%database_url, %error, "failed to open session cache database");
        error
    })?;
    let client = TimeclockClient::from_settings(&settings, Arc::new(storage))?;
    if let Some(user) = client.restore_session().await {
        info!(user_id = user.id.0, "using cached session");
    }

    let outcome = run(&client, args).await;
    print_notification(&client).await;
    outcome
}

async fn run(client: &TimeclockClient, args: Args) -> Result<()> {
    let credentials = match (args.email, args.password) {
        (Some(email), Some(password)) => Some(Credentials { email, password }),
        _ => None,
    };

    if let Command::SignUp {
        first_name,
        last_name,
        username,
        phone,
    } = args.command
    {
        let Credentials { email, password } =
            credentials.context("sign-up needs --email and --password")?;
        let navigation = client
            .sign_up(SignUpRequest {
                email,
                password,
                first_name,
                last_name,
                username,
                phone,
            })
            .await?;
        print_navigation(navigation);
        return Ok(());
    }

    if let Some(credentials) = credentials {
        let navigation = client.sign_in(credentials).await?;
        if let Some(user) = client.session().await {
            println!("signed in as {}", user.display_name());
        }
        print_navigation(navigation);
    }

    match args.command {
        Command::SignUp { .. } => {}
        Command::SignOut => print_navigation(client.sign_out().await),
        Command::Whoami => match client.get_authenticated_user().await {
            Ok(Some(user)) => println!("{} (id {})", user.display_name(), user.id),
            Ok(None) | Err(_) => println!("not signed in"),
        },
        Command::Status => print_status(client.refresh_clock_status().await?),
        Command::ClockIn { code } => {
            let event = match code {
                Some(code) => client.clock_in_with_code(code).await?,
                None => client.clock_in().await?,
            };
            print_event(&event);
        }
        Command::ClockOut => print_event(&client.clock_out().await?),
        Command::StartBreak => print_status(client.start_break().await?),
        Command::EndBreak => print_status(client.end_break().await?),
        Command::History { pages } => {
            for _ in 0..pages {
                if client.load_clock_history().await?.is_empty() {
                    break;
                }
            }
            print_history(&client.history_view().await);
        }
    }
    Ok(())
}

fn print_navigation(navigation: Navigation) {
    let screen = match navigation {
        Navigation::Home => "home",
        Navigation::Clock => "clock",
    };
    println!("-> {screen}");
}

fn print_status(status: ClockStatus) {
    println!(
        "clocked in: {}, on break: {}",
        yes_no(status.clocked),
        yes_no(status.on_break)
    );
}

fn print_event(event: &ClockEvent) {
    println!(
        "{} {} (event {})",
        event.time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        event.action.label(),
        event.id
    );
}

fn print_history(view: &[HistoryEntry]) {
    if view.is_empty() {
        println!("no clock history");
        return;
    }
    for entry in view {
        match entry {
            HistoryEntry::Day(day) => println!("{day}"),
            HistoryEntry::Event(event) => println!(
                "  {}  {}",
                event.time.with_timezone(&Local).format("%H:%M"),
                event.action.label()
            ),
        }
    }
}

async fn print_notification(client: &TimeclockClient) {
    let notification = client.notification().await;
    if notification.visible {
        println!("[notice] {}", notification.text);
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
