use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
};

use super::app::{CrawlApp, WorkerState};
use super::widgets::status_color;
use crate::ui::formatters::{format_elapsed, truncate};

/// Main render function
pub fn render_ui(frame: &mut Frame, app: &CrawlApp) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),      // Settings header
            Constraint::Percentage(60), // Status table
            Constraint::Min(5),         // Log pane
            Constraint::Length(1),      // Footer
        ])
        .split(area);

    render_header(frame, chunks[0], app);
    render_status_table(frame, chunks[1], app);
    render_log(frame, chunks[2], app);
    render_footer(frame, chunks[3]);

    if app.show_help {
        render_help_overlay(frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &CrawlApp) {
    let (state_text, state_color) = match &app.state {
        WorkerState::Running => ("● Descargando".to_string(), Color::Cyan),
        WorkerState::Stopping => ("◐ Deteniendo".to_string(), Color::Yellow),
        WorkerState::Finished(stats) if stats.was_cancelled => {
            ("■ Cancelado".to_string(), Color::Yellow)
        }
        WorkerState::Finished(_) => ("✔ Completado".to_string(), Color::Green),
        WorkerState::Failed(reason) => (format!("✖ Error: {}", reason), Color::Red),
        WorkerState::Gone => ("✖ El proceso terminó inesperadamente".to_string(), Color::Red),
    };

    let (done, present, active, skipped) = app.counts();
    let label = Style::default().fg(Color::DarkGray);

    let lines = vec![
        Line::from(vec![
            Span::styled("URL: ", label),
            Span::raw(app.header.root_url.clone()),
        ]),
        Line::from(vec![
            Span::styled("Destino: ", label),
            Span::raw(app.header.output_root.display().to_string()),
            Span::styled("   Intentos: ", label),
            Span::raw(app.header.max_attempts.to_string()),
            Span::styled("   Navegador: ", label),
            Span::raw(if app.header.headless { "oculto" } else { "visible" }),
        ]),
        Line::from(vec![
            Span::styled(state_text, Style::default().fg(state_color).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("   {}", format_elapsed(app.started_at.elapsed())),
                label,
            ),
            Span::raw(format!(
                "   {} archivos │ {} listos │ {} ya existían │ {} en curso │ {} omitidos",
                app.rows.len(),
                done,
                present,
                active,
                skipped
            )),
        ]),
    ];

    let block = Block::default()
        .title(" drivecrawl ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_table(frame: &mut Frame, area: Rect, app: &CrawlApp) {
    let title = match app.scroll {
        Some(_) => " Archivos [↑↓ desplazar, f: seguir] ",
        None => " Archivos ",
    };
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Header plus at least one row
    if inner.height < 2 {
        return;
    }

    let visible = (inner.height - 1) as usize;
    let last = app.rows.len();
    let end = match app.scroll {
        Some(first) => (first + visible).min(last),
        None => last,
    };
    let start = end.saturating_sub(visible);

    let name_width = (inner.width as usize).saturating_sub(50).max(20);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let header = Row::new(vec![
        Cell::from("Archivo").style(bold),
        Cell::from("Carpeta").style(bold),
        Cell::from("Estado").style(bold),
    ])
    .height(1);

    let rows: Vec<Row> = app.rows[start..end]
        .iter()
        .map(|row| {
            let folder = row
                .local_dir
                .strip_prefix(&app.header.output_root)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| row.local_dir.display().to_string());
            let folder = if folder.is_empty() { ".".to_string() } else { folder };

            Row::new(vec![
                Cell::from(truncate(&row.display_name, name_width)),
                Cell::from(truncate(&folder, 28)),
                Cell::from(row.status.to_string())
                    .style(Style::default().fg(status_color(row.status))),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(28),
            Constraint::Length(22),
        ],
    )
    .header(header);

    frame.render_widget(table, inner);
}

fn render_log(frame: &mut Frame, area: Rect, app: &CrawlApp) {
    let block = Block::default().title(" Registro ").borders(Borders::ALL);
    let height = block.inner(area).height as usize;

    let lines: Vec<Line> = app
        .logs
        .iter()
        .skip(app.logs.len().saturating_sub(height))
        .map(|l| Line::from(l.as_str()))
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let help = " q: Salir │ s: Detener │ ↑↓/PgUp/PgDn: Desplazar │ f: Seguir │ ?: Ayuda ";
    let para = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(para, area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let help_text = r#"
    drivecrawl - Ayuda

    Atajos de teclado:
    ─────────────────────────────────────
    q / Esc     Detener y salir
    s           Detener tras el archivo actual
    ↑ / ↓       Desplazar la tabla
    PgUp/PgDn   Desplazar una página
    f / End     Seguir los archivos nuevos
    ? / h       Mostrar u ocultar esta ayuda
    "#;

    let block = Block::default()
        .title(" Ayuda ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::DarkGray));

    let paragraph = Paragraph::new(help_text)
        .block(block)
        .alignment(Alignment::Left);

    let popup_area = centered_rect(60, 50, area);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(paragraph, popup_area);
}

/// Helper function to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
