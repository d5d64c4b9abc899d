use std::io::{self, Stdout};
use std::time::Duration;

use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
};

use super::{ChartError, PriceChart, Result};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Show `chart` full-screen until the user quits
///
/// Returns `Ok(false)` without drawing when no interactive terminal is
/// available, e.g. when stdout is piped.
pub fn display(chart: &PriceChart) -> Result<bool> {
    display_with(ChartTerminal::new, chart)
}

fn display_with(open: impl FnOnce() -> Result<ChartTerminal>, chart: &PriceChart) -> Result<bool> {
    let mut terminal = match open() {
        Ok(terminal) => terminal,
        Err(e) => {
            tracing::warn!(error = %e, "No interactive terminal, skipping chart");
            return Ok(false);
        }
    };

    terminal.show(chart)?;
    Ok(true)
}

/// Full-screen terminal that shows one chart until the user quits
pub struct ChartTerminal {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl ChartTerminal {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            restored: false,
        })
    }

    /// Redraw `chart` until `q` or `Esc` is pressed, then restore the terminal
    pub fn show(&mut self, chart: &PriceChart) -> Result<()> {
        if self.restored {
            return Err(ChartError::Restored);
        }

        loop {
            self.terminal.draw(|f| chart.render(f))?;

            if event::poll(EVENT_POLL_INTERVAL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press
                        && matches!(
                            key.code,
                            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc
                        )
                    {
                        break;
                    }
                }
            }
        }

        self.restore()
    }

    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }

        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;

        self.restored = true;
        Ok(())
    }
}

impl Drop for ChartTerminal {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            eprintln!("Failed to restore terminal on drop: {:?}", e);
        }
    }
}
