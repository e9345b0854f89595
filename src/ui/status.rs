use crate::app::{App, FeedPhase, Focus, View};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

use super::helpers::SPINNER;

/// Bottom status line: a transient message wins, then loading progress,
/// then the key hints for whatever has focus.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = match &app.status_message {
        Some((message, _)) => Cow::Borrowed(message.as_ref()),
        None if matches!(app.phase, FeedPhase::Loading) => Cow::Owned(format!(
            "{} Loading page {}...",
            SPINNER[app.spinner_frame % SPINNER.len()],
            // page_size is clamped to at least 1 at construction
            app.cursor.offset / app.cursor.page_size + 1
        )),
        None => Cow::Borrowed(hint_line(app)),
    };

    f.render_widget(
        Paragraph::new(text).style(Style::default().bg(Color::DarkGray).fg(Color::White)),
        area,
    );
}

fn hint_line(app: &App) -> &'static str {
    match app.view {
        View::Browse => match app.focus {
            Focus::Tags => "[Enter]select tag [a]dd [d]elete [D]efaults [Tab]grid [?]help [q]uit",
            Focus::Grid => {
                "[Enter]detail [o]pen [b]atch [r]efresh [1/2]category [Tab]tags [?]help [q]uit"
            }
        },
        View::Detail => "[o]pen in browser [Esc]back [q]uit",
    }
}
