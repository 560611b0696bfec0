use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::NotifyKind;
use crate::drilldown::{Popup, PopupContent};
use crate::model::{Model, UIData};
use crate::preview::ImagePreview;
use crate::table::{ColumnView, RenderOptions};

pub const INPUT_HEIGHT: usize = 3;
pub const CURL_HEIGHT: usize = 3;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const RAW_RESPONSE_HEIGHT: usize = 8;
pub const TABLE_HEADER_HEIGHT: usize = 3;

const POPUP_CASCADE: u16 = 2;

pub fn draw(model: &Model, frame: &mut Frame) {
    let uidata = model.get_uidata();
    let session = model.session();

    let mut constraints = vec![Constraint::Length(INPUT_HEIGHT as u16), Constraint::Min(3)];
    if uidata.show_raw {
        constraints.push(Constraint::Length(RAW_RESPONSE_HEIGHT as u16));
    }
    constraints.push(Constraint::Length(CURL_HEIGHT as u16));
    constraints.push(Constraint::Length(STATUSLINE_HEIGHT as u16));
    let areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    draw_input(uidata, frame, areas[0]);
    let table_focused = uidata.focused_popup.is_none() && !uidata.active_cmdinput;
    draw_table(
        &uidata.name,
        &uidata.table,
        uidata.selected_row,
        Some((uidata.abs_selected_row, uidata.nrows)),
        table_focused,
        frame,
        areas[1],
    );
    let mut next = 2;
    if uidata.show_raw {
        let raw = Paragraph::new(session.raw_response())
            .wrap(Wrap { trim: false })
            .block(Block::bordered().title(" Raw response "));
        frame.render_widget(raw, areas[next]);
        next += 1;
    }
    let curl = Paragraph::new(session.curl())
        .wrap(Wrap { trim: false })
        .block(Block::bordered().title(" curl "));
    frame.render_widget(curl, areas[next]);
    draw_statusline(model, frame, areas[next + 1]);

    draw_popups(model, frame, areas[1]);

    if uidata.show_help {
        let area = centered_rect(60, 80, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(uidata.help_message.as_str()).block(
            Block::bordered()
                .title(Line::from(" Help ".bold()).centered())
                .border_set(border::THICK),
        );
        frame.render_widget(help, area);
    }
}

fn draw_input(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let (text, style, title) = if uidata.active_cmdinput {
        (
            uidata.cmdinput.input.as_str(),
            Style::default().fg(Color::Yellow),
            " JSON input (Enter: accept, Esc: cancel) ",
        )
    } else {
        (
            uidata.json_input.as_str(),
            Style::default(),
            " JSON input <e> ",
        )
    };
    let input = Paragraph::new(text)
        .style(style)
        .block(Block::bordered().title(title));
    frame.render_widget(input, area);
    if uidata.active_cmdinput {
        let x = area.x + 1 + uidata.cmdinput.curser_pos as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_table(
    title: &str,
    columns: &[ColumnView],
    selected_row: usize,
    position: Option<(usize, usize)>,
    focused: bool,
    frame: &mut Frame,
    area: Rect,
) {
    let header = Row::new(columns.iter().map(|c| Cell::from(c.name.clone())))
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan));
    let nvisible = columns.first().map(|c| c.data.len()).unwrap_or(0);
    let rows = (0..nvisible).map(|ridx| {
        Row::new(
            columns
                .iter()
                .map(|c| Cell::from(c.data.get(ridx).cloned().unwrap_or_default())),
        )
    });
    let widths = columns
        .iter()
        .map(|c| Constraint::Length(c.width as u16))
        .collect::<Vec<_>>();

    let mut block = Block::bordered().title(Line::from(format!(" {title} ").bold()));
    if let Some((row, nrows)) = position {
        let pos = if nrows == 0 {
            " empty ".to_string()
        } else {
            format!(" {}/{} ", row + 1, nrows)
        };
        block = block.title_bottom(Line::from(pos).right_aligned());
    }
    if focused {
        block = block.border_set(border::THICK).border_style(Style::default().fg(Color::Blue));
    }

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(block);
    let mut state = TableState::default().with_selected((nvisible > 0).then_some(selected_row));
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_statusline(model: &Model, frame: &mut Frame, area: Rect) {
    let line = match model.session().last_notification() {
        Some(note) => {
            let color = match note.kind {
                NotifyKind::Success => Color::Green,
                NotifyKind::Error => Color::Red,
                NotifyKind::Info => Color::Gray,
            };
            Line::from(vec![
                Span::styled(note.text.clone(), Style::default().fg(color)),
                "   <?> help  <q> quit".dark_gray(),
            ])
        }
        None => Line::from("<?> help  <q> quit".dark_gray()),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_popups(model: &Model, frame: &mut Frame, area: Rect) {
    let popups = model.session().popups();
    let focused = model.get_uidata().focused_popup;
    let opts = model.session().render_options();
    // Unfocused popups first so the focused one ends up on top.
    let order = (0..popups.len())
        .filter(|i| Some(*i) != focused)
        .chain(focused.filter(|f| *f < popups.len()));
    for idx in order {
        let offset = (idx as u16 % 6) * POPUP_CASCADE;
        let base = centered_rect(80, 70, area);
        let popup_area = Rect {
            x: (base.x + offset).min(area.right().saturating_sub(base.width)),
            y: (base.y + offset / 2).min(area.bottom().saturating_sub(base.height)),
            ..base
        };
        draw_popup(&popups[idx], Some(idx) == focused, opts, frame, popup_area);
    }
}

fn draw_popup(popup: &Popup, focused: bool, opts: &RenderOptions, frame: &mut Frame, area: Rect) {
    frame.render_widget(Clear, area);
    match &popup.content {
        PopupContent::Table { table, selected } => {
            let height = (area.height as usize).saturating_sub(TABLE_HEADER_HEIGHT).max(1);
            let offset = selected.saturating_sub(height - 1);
            let views = table.column_views(offset, offset + height, opts);
            draw_table(
                &popup.title,
                &views,
                selected - offset,
                Some((*selected, table.nrows())),
                focused,
                frame,
                area,
            );
        }
        PopupContent::Image(result) => {
            let mut block =
                Block::bordered().title(Line::from(format!(" {} ", popup.title).bold()));
            if focused {
                block = block
                    .border_set(border::THICK)
                    .border_style(Style::default().fg(Color::Blue));
            }
            let text = match result {
                Ok(preview) => image_text(preview),
                Err(e) => Text::from(Line::from(e.as_str().red())),
            };
            frame.render_widget(Paragraph::new(text).block(block), area);
        }
    }
}

fn rgb(p: [u8; 3]) -> Color {
    Color::Rgb(p[0], p[1], p[2])
}

/// Upper half block with foreground = top pixel and background = bottom pixel.
fn image_text(preview: &ImagePreview) -> Text<'static> {
    let mut lines = Vec::new();
    for y in (0..preview.grid_height).step_by(2) {
        let spans = (0..preview.grid_width)
            .map(|x| {
                let mut style = Style::default();
                if let Some(top) = preview.pixel(x, y) {
                    style = style.fg(rgb(top));
                }
                if let Some(bottom) = preview.pixel(x, y + 1) {
                    style = style.bg(rgb(bottom));
                }
                Span::styled("▀", style)
            })
            .collect::<Vec<_>>();
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(
        format!("{} {}x{}", preview.format, preview.width, preview.height).dark_gray(),
    ));
    Text::from(lines)
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
