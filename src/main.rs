use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use tokio::sync::mpsc;

use confab::app::{Action, App};
use confab::config::Config;
use confab::logging::init_logging;
use confab::ui::ui;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel();

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    let mut app = App::new(action_tx.clone(), config);

    // Input handling task
    let input_handle = {
        let tx = action_tx.clone();
        tokio::spawn(async move {
            loop {
                if event::poll(std::time::Duration::from_millis(100)).unwrap_or(false) {
                    match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                            let _ = tx.send(Action::UserInput(key));
                        }
                        Ok(Event::Mouse(mouse)) => match mouse.kind {
                            MouseEventKind::ScrollUp => {
                                let _ = tx.send(Action::Scroll(-3));
                            }
                            MouseEventKind::ScrollDown => {
                                let _ = tx.send(Action::Scroll(3));
                            }
                            _ => {}
                        },
                        Ok(Event::Resize(w, h)) => {
                            let _ = tx.send(Action::Resize(w, h));
                        }
                        _ => {}
                    }
                } else {
                    // Tick for spinner
                    let _ = tx.send(Action::Render);
                }
            }
        })
    };

    // Populate the model picker once at startup.
    let _ = action_tx.send(Action::LoadModels);

    let res = run_app(&mut terminal, &mut app, &mut action_rx, action_tx.clone()).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    input_handle.abort();

    if let Err(err) = res {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<'_>,
    action_rx: &mut mpsc::UnboundedReceiver<Action>,
    action_tx: mpsc::UnboundedSender<Action>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        tokio::select! {
            Some(action) = action_rx.recv() => {
                match action {
                    Action::Render => {
                        if app.loading {
                            app.spinner_state.calc_next();
                        }
                        terminal.draw(|f| ui(f, app))?;
                    }
                    Action::Resize(_, _) => terminal.autoresize()?,
                    Action::Quit => return Ok(()),
                    _ => {
                        if app.update(action).await {
                            terminal.draw(|f| ui(f, app))?;
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = action_tx.send(Action::Quit);
            }
        }
    }
}
