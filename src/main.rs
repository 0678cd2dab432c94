mod api;
mod app;
mod config;
mod stream;
mod theme;
mod ui;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::{App, Popup};
use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "kendali")]
#[command(version = "0.1.0")]
#[command(about = "A terminal control panel for a multi-account Discord reply-bot backend")]
struct Args {
    /// Follow the backend live log on stdout (no TUI)
    #[arg(short, long)]
    follow: bool,

    /// Start a task by id and exit
    #[arg(long, value_name = "TASK_ID")]
    start: Option<String>,

    /// Stop a task by id and exit
    #[arg(long, value_name = "TASK_ID")]
    stop: Option<String>,

    /// Refresh the backend pesan.txt cache and exit
    #[arg(long)]
    refresh: bool,

    /// Backend base URL (overrides the config file)
    #[arg(short, long, value_name = "URL")]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(server) = args.server {
        config.backend_url = server;
    }

    // Handle CLI-only commands
    if let Some(task_id) = args.start {
        return control_task(&config, &task_id, true).await;
    }

    if let Some(task_id) = args.stop {
        return control_task(&config, &task_id, false).await;
    }

    if args.refresh {
        return refresh_messages(&config).await;
    }

    if args.follow {
        return follow_logs(&config).await;
    }

    // Run TUI
    run_tui(config).await
}

async fn control_task(config: &AppConfig, task_id: &str, start: bool) -> Result<()> {
    let client = api::BackendClient::new(&config.backend_url);
    let response = if start {
        client.start_task(task_id).await?
    } else {
        client.stop_task(task_id).await?
    };

    println!("{}", response.message);
    if response.is_success() {
        Ok(())
    } else {
        anyhow::bail!("backend menolak perintah")
    }
}

async fn refresh_messages(config: &AppConfig) -> Result<()> {
    let client = api::BackendClient::new(&config.backend_url);
    let response = client.refresh_messages().await?;

    println!("{}", response.message);
    if let Some(info) = response.info {
        println!("pesan.txt: {} baris", info.count);
    }
    Ok(())
}

/// Headless log tail: the same stream client as the TUI, printing to
/// stdout and reconnecting forever.
async fn follow_logs(config: &AppConfig) -> Result<()> {
    let client = api::BackendClient::new(&config.backend_url);
    let mut logs = stream::LogStream::new(stream::SseTransport::new(client.logs_url()));
    logs.connect();

    tracing::info!("Following {} log stream", config.backend_url);

    let mut printed: u64 = 0;
    loop {
        logs.tick(std::time::Instant::now());

        let buffer = logs.buffer();
        let fresh = (buffer.appended().saturating_sub(printed)) as usize;
        if fresh > 0 {
            for line in buffer.tail(fresh.min(buffer.len())) {
                match line.kind {
                    stream::LineKind::System => println!("[sistem] {}", line.text),
                    stream::LineKind::Server => println!("{}", line.text),
                }
            }
            printed = buffer.appended();
        }

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

async fn run_tui(config: AppConfig) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut app = App::new(config)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Tear the log subscription down without scheduling a retry
    app.logs.disconnect();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if app.popup == Popup::None => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => {
                            // Handle key and catch any errors to prevent crashes
                            if let Err(e) = app.handle_key(key).await {
                                app.status_message = Some(format!("Error: {}", e));
                            }
                        }
                    }
                }
            }
        }

        // Periodic refresh
        let _ = app.tick().await;
    }
}
