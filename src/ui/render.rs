//! Frame assembly: the view layouts, the minimum-size guard, and the modal
//! overlays drawn on top of whichever view is active.

use crate::app::{App, ConfirmAction, View};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::{detail, grid, help, status, tagbar};

/// Smallest terminal the layout stays usable in.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    // ratatui panics on zero-sized buffers
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        render_too_small(f, area);
        return;
    }

    match app.view {
        View::Browse => render_browse(f, app),
        View::Detail => render_detail(f, app),
    }

    // Overlays stack over the active view; the add-tag prompt and confirm
    // dialog are mutually exclusive by construction, help draws below both
    if app.show_help {
        help::render(f, app);
    }
    if let Some(ref confirm) = app.pending_confirm {
        render_confirm_overlay(f, confirm);
    }
    if let Some(ref input) = app.tag_input {
        render_tag_input_overlay(f, app, input);
    }
}

fn render_too_small(f: &mut Frame, area: Rect) {
    let msg = if area.height < 3 || area.width < 24 {
        Paragraph::new("Too small")
    } else {
        Paragraph::new(format!(
            "Terminal too small ({}x{})\nNeeds at least {}x{}",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        ))
        .alignment(Alignment::Center)
    };
    f.render_widget(msg, area);
}

/// Browse view: tag panel on the left, card grid on the right, one status
/// line along the bottom.
fn render_browse(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[0]);

    tagbar::render(f, app, main_chunks[0]);
    grid::render(f, app, main_chunks[1]);
    status::render(f, app, chunks[1]);
}

fn render_detail(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    detail::render(f, app, chunks[0]);
    status::render(f, app, chunks[1]);
}

/// A fixed-size rectangle centered in `area`, shrunk to fit small terminals.
pub(super) fn centered(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

fn render_confirm_overlay(f: &mut Frame, confirm: &ConfirmAction) {
    let text = match confirm {
        ConfirmAction::DeleteTag { name, .. } => {
            format!("Delete tag \"{}\"?\n\n(y) Confirm  (n/Esc) Cancel", name)
        }
        ConfirmAction::ResetTags { category } => {
            format!(
                "Restore default {} tags?\n\nCustom tags will be removed.\n\n(y) Confirm  (n/Esc) Cancel",
                category.label()
            )
        }
    };

    let overlay = centered(50, 7, f.area());
    if overlay.width < 10 || overlay.height < 5 {
        return;
    }

    f.render_widget(Clear, overlay);
    f.render_widget(
        Paragraph::new(text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(" Confirm "),
            )
            .alignment(Alignment::Center),
        overlay,
    );
}

fn render_tag_input_overlay(f: &mut Frame, app: &App, input: &str) {
    let text = format!(
        "New {} tag:\n\n> {}_\n\n(Enter) Add  (Esc) Cancel",
        app.cursor.category.label(),
        input
    );

    let overlay = centered(46, 7, f.area());
    if overlay.width < 16 || overlay.height < 5 {
        return;
    }

    f.render_widget(Clear, overlay);
    f.render_widget(
        Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Add Tag "),
        ),
        overlay,
    );
}
