//! The help overlay: every keybinding, grouped by panel, scrollable with
//! j/k on terminals too short to show the whole list.

use crate::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// Keybindings grouped by section, in display order.
const SECTIONS: [(&str, &[(&str, &str)]); 4] = [
    (
        "General",
        &[
            ("q", "Quit"),
            ("?", "Toggle this help"),
            ("Tab", "Switch between tags and grid"),
            ("1 / 2", "Movies / TV Shows"),
            ("e", "Enable or disable recommendations"),
            ("s", "Toggle scroll auto-load"),
        ],
    ),
    (
        "Card Grid",
        &[
            ("j/k, arrows", "Move selection"),
            ("Ctrl+d/u, PgDn/PgUp", "Page down / up"),
            ("g / G", "First / last card"),
            ("Enter", "Open detail card"),
            ("o", "Open in browser"),
            ("Space", "Load more"),
            ("b", "Fresh batch for this tag"),
            ("r", "Retry failed load, or refresh"),
        ],
    ),
    (
        "Tags",
        &[
            ("j/k, arrows", "Move selection"),
            ("Enter", "Show this tag's feed"),
            ("a", "Add a tag"),
            ("d", "Delete the selected tag"),
            ("D", "Restore default tags"),
        ],
    ),
    (
        "Detail",
        &[("Esc / b", "Back to the grid"), ("o", "Open in browser")],
    ),
];

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    // A tenth of the screen as margin on every side
    let h_margin = area.width / 10;
    let v_margin = area.height / 10;
    let overlay = Rect::new(
        area.x + h_margin,
        area.y + v_margin,
        area.width.saturating_sub(h_margin * 2),
        area.height.saturating_sub(v_margin * 2),
    );
    if overlay.width < 24 || overlay.height < 6 {
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for (index, (label, bindings)) in SECTIONS.iter().enumerate() {
        if index > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            *label,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        for (key, action) in *bindings {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<20}", key), Style::default().fg(Color::Yellow)),
                Span::raw(*action),
            ]));
        }
    }

    let inner_height = overlay.height.saturating_sub(2) as usize;
    let max_scroll = lines.len().saturating_sub(inner_height);
    // Write the clamp back so a j held past the end does not leave the
    // counter stranded above the last reachable row.
    app.help_scroll = app.help_scroll.min(max_scroll);
    let scroll = app.help_scroll;

    let title = if max_scroll > 0 {
        format!(" Help {}/{} (? closes) ", scroll + 1, max_scroll + 1)
    } else {
        " Help (? closes) ".to_string()
    };

    f.render_widget(Clear, overlay);
    f.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(title),
            )
            .scroll((scroll as u16, 0)),
        overlay,
    );
}
