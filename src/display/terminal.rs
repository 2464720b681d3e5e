use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::io::{self, stdout};
use std::time::Duration;

use crate::audio::{Capture, Spectrum, SpectrumReader};
use crate::config::Config;

const GAIN_STEP: f64 = 1.25;

pub async fn run(config: &Config, reader: SpectrumReader, capture: &Capture) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, config, reader, capture);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    reader: SpectrumReader,
    capture: &Capture,
) -> Result<()> {
    let mut gain = config.display.gain;
    let frame_time = Duration::from_secs_f64(1.0 / config.display.refresh_rate.max(1) as f64);

    loop {
        // Whatever was published last; never waits on the capture thread
        let spectrum = reader.latest();
        let source_ended = capture.is_finished();

        terminal.draw(|frame| {
            let area = frame.area();
            let status_area = Rect::new(area.x, area.y, area.width, area.height.min(1));
            let bars_area = Rect::new(
                area.x,
                area.y + 1,
                area.width,
                area.height.saturating_sub(1),
            );

            render_bars(frame, bars_area, &spectrum, gain);
            render_status(frame, status_area, &spectrum, gain, source_ended);
        })?;

        // Handle input
        if event::poll(frame_time)? {
            if let Event::Key(key) = event::read()? {
                match key {
                    KeyEvent {
                        code: KeyCode::Char('q'),
                        ..
                    }
                    | KeyEvent {
                        code: KeyCode::Esc,
                        ..
                    }
                    | KeyEvent {
                        code: KeyCode::Char('c'),
                        modifiers: KeyModifiers::CONTROL,
                        ..
                    } => {
                        break;
                    }
                    KeyEvent {
                        code: KeyCode::Char('+') | KeyCode::Char('='),
                        ..
                    } => {
                        gain *= GAIN_STEP;
                    }
                    KeyEvent {
                        code: KeyCode::Char('-'),
                        ..
                    } => {
                        gain /= GAIN_STEP;
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

/// Fold the spectrum into `columns` levels in 0.0..=1.0, taking the loudest
/// bin per column. Columns beyond the bin count repeat the nearest bin.
pub fn column_levels(magnitudes: &[f64], columns: usize, gain: f64) -> Vec<f64> {
    if magnitudes.is_empty() || columns == 0 {
        return vec![0.0; columns];
    }

    let bins = magnitudes.len();
    (0..columns)
        .map(|col| {
            let start = col * bins / columns;
            let end = ((col + 1) * bins / columns).max(start + 1).min(bins);
            let loudest = magnitudes[start.min(bins - 1)..end]
                .iter()
                .copied()
                .fold(0.0, f64::max);
            (loudest * gain).clamp(0.0, 1.0)
        })
        .collect()
}

/// Low bins red, high bins blue
fn column_color(position: f64) -> Color {
    let position = position.clamp(0.0, 1.0);
    Color::Rgb(
        (255.0 * (1.0 - position)) as u8,
        (80.0 + 120.0 * (1.0 - (2.0 * position - 1.0).abs())) as u8,
        (255.0 * position) as u8,
    )
}

fn render_bars(frame: &mut Frame, area: Rect, spectrum: &Spectrum, gain: f64) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let levels = column_levels(spectrum.magnitudes(), area.width as usize, gain);

    for (i, level) in levels.into_iter().enumerate() {
        let x = area.x + i as u16;
        let bar_height = ((level * area.height as f64).round() as u16).min(area.height);
        let color = column_color(i as f64 / area.width as f64);

        // Draw bar from bottom up
        for y_offset in 0..bar_height {
            let y = area.y + area.height - 1 - y_offset;
            if let Some(cell) = frame.buffer_mut().cell_mut((x, y)) {
                cell.set_char('█');
                cell.set_fg(color);
            }
        }
    }
}

fn render_status(frame: &mut Frame, area: Rect, spectrum: &Spectrum, gain: f64, source_ended: bool) {
    let peak = match spectrum.peak() {
        Some((bin, _)) => format!("{:.0} Hz", spectrum.frequency_of(bin)),
        None => "waiting".to_string(),
    };

    let status = format!(
        " N={} {:.1} Hz/bin | peak {} | gain {:.3} [+/-] | [q]uit {}",
        spectrum.fft_size(),
        spectrum.bin_resolution(),
        peak,
        gain,
        if source_ended { "| source ended " } else { "" }
    );

    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
