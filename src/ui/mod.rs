mod components;

use std::sync::OnceLock;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, Popup, Section, TaskStatus};
use crate::stream::{ConnectionState, LineKind};
use crate::theme::Theme;

use components::{centered_rect, mask_secret, truncate_with_ellipsis};

static THEME: OnceLock<Theme> = OnceLock::new();

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    let accounts_height = if area.height < 30 {
        Constraint::Length(6)
    } else {
        Constraint::Length(8)
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Info line
            accounts_height,       // Accounts box
            Constraint::Ratio(1, 2), // Tasks box
            Constraint::Ratio(1, 2), // Live log box
            Constraint::Length(1), // Footer
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);
    draw_accounts_box(f, app, chunks[1]);
    draw_tasks_box(f, app, chunks[2]);
    draw_logs_box(f, app, chunks[3]);
    draw_footer(f, app, chunks[4]);

    match app.popup {
        Popup::None => {}
        Popup::AddToken => draw_input_popup(f, " Token Discord Baru ", &app.input_buffer),
        Popup::AddGoogleKey => draw_input_popup(f, " Google API Key Baru ", &app.input_buffer),
        Popup::AddOpenRouterKey => {
            draw_input_popup(f, " OpenRouter API Key Baru ", &app.input_buffer)
        }
        Popup::AddTask => draw_add_task_popup(f, app),
        Popup::Help => draw_help_popup(f),
        Popup::Confirm => draw_confirm_popup(f, app),
    }
}

fn section_border(app: &App, section: Section) -> Style {
    if app.section == section {
        Style::default().fg(theme().accent)
    } else {
        Style::default().fg(theme().inactive)
    }
}

fn section_title(app: &App, section: Section, text: &str) -> Span<'static> {
    let style = if app.section == section {
        Style::default()
            .fg(theme().accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme().inactive)
    };
    Span::styled(text.to_string(), style)
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " kendali ",
            Style::default()
                .fg(theme().header)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("│ {} ", app.config.backend_url),
            Style::default().fg(theme().text_dim),
        ),
    ];

    if let Some(info) = &app.message_cache {
        spans.push(Span::styled(
            format!("│ pesan.txt: {} baris ", info.count),
            Style::default().fg(theme().text_dim),
        ));
    }

    if let Some(msg) = &app.status_message {
        spans.push(Span::styled(
            format!("│ {}", msg),
            Style::default().fg(theme().warning),
        ));
    } else if app.save_pending() {
        spans.push(Span::styled(
            "│ menyimpan…",
            Style::default().fg(theme().text_dim),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_accounts_box(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(section_title(app, Section::Accounts, " Akun & API Keys "))
        .borders(Borders::ALL)
        .border_style(section_border(app, Section::Accounts));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = app.credential_rows();
    if rows.is_empty() {
        let hint = Paragraph::new(Line::from(Span::styled(
            " Belum ada kredensial. t = token, g = Google key, o = OpenRouter key",
            Style::default().fg(theme().text_dim),
        )));
        f.render_widget(hint, inner);
        return;
    }

    let visible = inner.height as usize;
    let selected = app.selected_credential.min(rows.len().saturating_sub(1));
    // Keep the selection in view.
    let start = selected.saturating_sub(visible.saturating_sub(1));

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(i, &(kind, index, value))| {
            let active = app.section == Section::Accounts && i == selected;
            let marker = if active { "▸ " } else { "  " };
            let masked = mask_secret(value, app.show_secrets);
            let text = format!(
                "{}{:<11} #{:<2} {}",
                marker,
                kind.label(),
                index + 1,
                truncate_with_ellipsis(&masked, inner.width.saturating_sub(20) as usize),
            );
            let mut style = Style::default().fg(theme().text);
            if active {
                style = style.bg(theme().bg_selected);
            }
            Line::from(Span::styled(text, style))
        })
        .collect();

    f.render_widget(Paragraph::new(lines), inner);
}

fn status_badge(status: TaskStatus) -> Span<'static> {
    let color = match status {
        TaskStatus::Running => theme().success,
        TaskStatus::Stopped => theme().danger,
        TaskStatus::Unknown => theme().text_dim,
    };
    Span::styled(format!("[{:^7}]", status.label()), Style::default().fg(color))
}

fn draw_tasks_box(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(section_title(app, Section::Tasks, " Tugas per Channel "))
        .borders(Borders::ALL)
        .border_style(section_border(app, Section::Tasks));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.dashboard.tasks.is_empty() {
        let hint = Paragraph::new(Line::from(Span::styled(
            " Belum ada tugas. a = tambah tugas",
            Style::default().fg(theme().text_dim),
        )));
        f.render_widget(hint, inner);
        return;
    }

    let visible = inner.height as usize;
    let selected = app.selected_task.min(app.dashboard.tasks.len() - 1);
    let start = selected.saturating_sub(visible.saturating_sub(1));

    let lines: Vec<Line> = app
        .dashboard
        .tasks
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(i, task)| {
            let active = app.section == Section::Tasks && i == selected;
            let marker = if active { "▸ " } else { "  " };

            let mut flags = Vec::new();
            if task.use_reply {
                flags.push("reply");
            }
            if task.delete_immediately {
                flags.push("hapus-langsung");
            } else if task.delete_bot_reply.is_some() {
                flags.push("hapus-balasan");
            }

            // Read delay only applies to the AI modes.
            let read_delay = if task.mode.is_ai() {
                format!("baca {}s  ", task.read_delay)
            } else {
                String::new()
            };
            let detail = format!(
                " {:<12} #{}  akun {}  {:<10} kirim {}s  {}{}",
                task.id,
                task.channel_id,
                task.assigned_token_index + 1,
                task.mode.label(),
                task.delay_interval,
                read_delay,
                flags.join(","),
            );

            let mut line_style = Style::default().fg(theme().text);
            if active {
                line_style = line_style.bg(theme().bg_selected);
            }

            Line::from(vec![
                Span::styled(marker.to_string(), line_style),
                status_badge(app.status_of(&task.id)),
                Span::styled(
                    truncate_with_ellipsis(&detail, inner.width.saturating_sub(12) as usize),
                    line_style,
                ),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_logs_box(f: &mut Frame, app: &App, area: Rect) {
    let state = app.logs.state();
    let indicator = Span::styled(
        "●",
        Style::default().fg(theme().connection_color(state)),
    );
    let state_text = match state {
        ConnectionState::Connected => "terhubung".to_string(),
        ConnectionState::Connecting if app.logs.retry_pending() => {
            format!("menunggu reconnect… (percobaan {})", app.logs.attempts())
        }
        ConnectionState::Connecting => "menyambung…".to_string(),
        ConnectionState::Disconnected => "terputus".to_string(),
    };

    let title = Line::from(vec![
        section_title(app, Section::Logs, " Live Log "),
        indicator,
        Span::styled(
            format!(" {} ", state_text),
            Style::default().fg(theme().text_dim),
        ),
    ]);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(section_border(app, Section::Logs));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let buffer = app.logs.buffer();
    let visible = inner.height as usize;
    let len = buffer.len();
    let end = len.saturating_sub(app.log_scroll.min(len));
    let start = end.saturating_sub(visible);

    let lines: Vec<Line> = buffer
        .iter()
        .skip(start)
        .take(end - start)
        .map(|entry| match entry.kind {
            LineKind::System => Line::from(vec![
                Span::styled("[sistem] ", Style::default().fg(theme().warning)),
                Span::styled(entry.text.clone(), Style::default().fg(theme().text_dim)),
            ]),
            LineKind::Server => {
                Line::from(Span::styled(entry.text.clone(), Style::default().fg(theme().text)))
            }
        })
        .collect();

    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let hints = match app.section {
        Section::Accounts => {
            " Tab bagian │ j/k pilih │ t/g/o tambah │ v lihat │ d hapus │ R refresh pesan │ ? bantuan │ q keluar"
        }
        Section::Tasks => {
            " Tab │ j/k │ s start │ x stop │ a tambah │ d hapus │ m mode │ i akun │ u reply │ +/- [/] delay │ q keluar"
        }
        Section::Logs => {
            " Tab │ j/k gulir │ G terbaru │ c bersihkan │ r sambung ulang │ ? bantuan │ q keluar"
        }
    };
    let footer = Paragraph::new(Line::from(Span::styled(
        hints,
        Style::default().fg(theme().text_dim),
    )));
    f.render_widget(footer, area);
}

fn draw_input_popup(f: &mut Frame, title: &str, value: &str) {
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default().fg(theme().accent),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme().accent));

    let lines = vec![
        Line::from(Span::styled(
            format!(" {}█", value),
            Style::default().fg(theme().text),
        )),
        Line::default(),
        Line::from(Span::styled(
            " Enter = simpan │ Esc = batal",
            Style::default().fg(theme().text_dim),
        )),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_add_task_popup(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(Span::styled(
            " Tugas Baru ",
            Style::default().fg(theme().accent),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme().accent));

    let field_style = |field: usize| {
        if app.input_field == field {
            Style::default().fg(theme().accent)
        } else {
            Style::default().fg(theme().text_dim)
        }
    };
    let cursor = |field: usize| if app.input_field == field { "█" } else { "" };

    let accounts = app.dashboard.discord_tokens.len();
    let lines = vec![
        Line::from(vec![
            Span::styled(" Channel ID: ", field_style(0)),
            Span::styled(
                format!("{}{}", app.input_buffer, cursor(0)),
                Style::default().fg(theme().text),
            ),
        ]),
        Line::from(vec![
            Span::styled(format!(" Akun bot (1..{}): ", accounts.max(1)), field_style(1)),
            Span::styled(
                format!("{}{}", app.input_secondary, cursor(1)),
                Style::default().fg(theme().text),
            ),
        ]),
        Line::default(),
        Line::from(Span::styled(
            " Tab = pindah kolom │ Enter = simpan │ Esc = batal",
            Style::default().fg(theme().text_dim),
        )),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_help_popup(f: &mut Frame) {
    let area = centered_rect(70, 70, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(Span::styled(
            " Bantuan ",
            Style::default().fg(theme().accent),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme().accent));

    let entries = [
        ("Tab / Shift-Tab", "pindah bagian (Akun / Tugas / Live Log)"),
        ("j / k, ↓ / ↑", "pilih baris / gulir log"),
        ("t, g, o", "tambah token Discord / Google key / OpenRouter key"),
        ("v", "tampilkan atau sembunyikan kredensial"),
        ("a", "tambah tugas baru"),
        ("s / x", "start / stop tugas terpilih"),
        ("m", "ganti mode balasan (gemini / openrouter / pesan.txt)"),
        ("i", "ganti akun bertugas"),
        ("u", "balas sebagai reply ya/tidak"),
        ("+ / -", "interval kirim ±5s"),
        ("[ / ]", "delay baca ±5s"),
        ("d", "hapus baris terpilih"),
        ("c", "bersihkan log"),
        ("r", "sambung ulang log stream"),
        ("R", "refresh cache pesan.txt di backend"),
        ("q", "keluar"),
    ];

    let mut lines = vec![Line::default()];
    for (keys, desc) in entries {
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<16}", keys),
                Style::default().fg(theme().accent),
            ),
            Span::styled(desc, Style::default().fg(theme().text)),
        ]));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_confirm_popup(f: &mut Frame, app: &App) {
    let area = centered_rect(50, 16, f.area());
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(Span::styled(
            " Konfirmasi ",
            Style::default().fg(theme().danger),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme().danger));

    let question = app
        .status_message
        .clone()
        .unwrap_or_else(|| "Yakin? (y/n)".to_string());

    let lines = vec![
        Line::from(Span::styled(
            format!(" {}", question),
            Style::default().fg(theme().text),
        )),
        Line::default(),
        Line::from(Span::styled(
            " y = ya │ n/Esc = batal",
            Style::default().fg(theme().text_dim),
        )),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}
