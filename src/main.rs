mod app;
mod bulk;
mod config;
mod demo;
mod email;
mod gateway;
mod index;
mod input;
mod list;
mod logging;
mod ui;
mod views;

use std::io;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;

use app::{Session, TerminalEvents, Tui};
use config::Config;
use demo::DemoGateway;
use index::{SenderIndex, snapshot_path};

/// Mailbox opened when no account is configured
const DEMO_MAILBOX: &str = "demo@example.com";

/// Triage a mailbox by sender domain
#[derive(Parser, Debug)]
#[command(name = "domainsweep", version, about)]
struct Cli {
    /// Account name from config.toml
    #[arg(short, long)]
    account: Option<String>,

    /// Mailbox address to open; overrides --account
    #[arg(long)]
    mailbox: Option<String>,

    /// Rebuild the sender index at startup even if a cache exists
    #[arg(long)]
    rebuild: bool,

    /// Index at most this many messages
    #[arg(long)]
    max_count: Option<usize>,

    /// Log at debug level to debug.log in the config directory
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize
    let config_dir = config::ensure_config_dir()?;
    logging::init(&config_dir, cli.debug);
    let config = Config::load()?;

    let mailbox = match cli.mailbox {
        Some(mailbox) => mailbox,
        None => config
            .mailbox(cli.account.as_deref())?
            .map(|account| account.email.clone())
            .unwrap_or_else(|| DEMO_MAILBOX.to_string()),
    };
    info!(%mailbox, "opening mailbox");

    let index = SenderIndex::with_path(snapshot_path(&config::cache_dir()?, &mailbox));
    if let Some(path) = index.path() {
        info!(path = %path.display(), "sender index cache");
    }
    let mut session = Session::new(
        mailbox,
        Box::new(DemoGateway::new()),
        index,
        config.recent_count,
        cli.max_count.or(config.index_limit),
    );
    let rebuild_first = session.load_index() || cli.rebuild;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;

    // Run the app
    let mut tui = Tui::new(terminal, Box::new(TerminalEvents));
    let result = app::run(&mut tui, &mut session, rebuild_first);

    // Restore terminal
    let mut terminal = tui.into_terminal();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
