use crate::app::{App, Focus};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Render the tag list panel for the active category.
///
/// The highlighted row is the navigation cursor; the dot marks the tag whose
/// feed is currently on screen. The two coincide most of the time but drift
/// apart while the user browses the list without activating anything.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Tags;

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let items: Vec<ListItem> = app
        .current_tags()
        .iter()
        .map(|tag| {
            let active = *tag == app.cursor.tag;
            let marker = if active {
                Span::styled("● ", Style::default().fg(Color::Green))
            } else {
                Span::raw("  ")
            };
            let name_style = if active {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![marker, Span::styled(tag.as_str(), name_style)]))
        })
        .collect();

    let title = format!(" {} Tags ", app.cursor.category.label());

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default().with_selected(Some(app.selected_tag));
    f.render_stateful_widget(list, area, &mut state);
}
