use crate::app::{App, FeedPhase, Focus};
use crate::douban::CoverState;
use crate::util::{display_width, fit_to_width};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::helpers::SPINNER;

/// Render the card grid panel.
///
/// Also records the rendered viewport in `app.grid_window`, which feeds the
/// scroll trigger and the cover lookahead on the next tick.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    let is_focused = app.focus == Focus::Grid;

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let title = format!(
        " {}: {} ({}) ",
        app.cursor.category.label(),
        app.cursor.tag,
        app.items.len()
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    let inner_height = area.height.saturating_sub(2) as usize;

    // Hints and empty states render as a paragraph instead of a list
    if let Some(text) = empty_state_text(app) {
        let paragraph = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(paragraph, area);
        app.grid_window = (0, inner_height);
        return;
    }

    let inner_width = area.width.saturating_sub(2) as usize;
    let mut rows: Vec<ListItem> = app
        .items
        .iter()
        .map(|item| {
            let mut spans = vec![
                cover_glyph(&app.cover_state(&item.id)),
                Span::raw(" "),
                rating_span(&item.rating),
                Span::raw(" "),
            ];

            // Budget the title so badges stay visible on narrow terminals
            let mut reserved = 8;
            if item.is_new {
                reserved += 4;
            }
            if let Some(ep) = &item.episode_info {
                reserved += display_width(ep) + 2;
            }
            let title_width = inner_width.saturating_sub(reserved).max(8);
            spans.push(Span::raw(fit_to_width(&item.title, title_width)));

            if item.is_new {
                spans.push(Span::styled(
                    " NEW",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ));
            }
            if let Some(ep) = &item.episode_info {
                spans.push(Span::styled(
                    format!("  {}", ep),
                    Style::default().fg(Color::DarkGray),
                ));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    if let Some(row) = feed_state_row(app) {
        rows.push(row);
    }

    let list = List::new(rows)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);

    app.grid_window = (state.offset(), inner_height);
}

/// Full-panel text shown when there is nothing to list.
fn empty_state_text(app: &App) -> Option<String> {
    if !app.enabled {
        return Some("\nRecommendations are disabled.\n\nPress e to enable.".to_string());
    }
    if !app.items.is_empty() {
        return None;
    }
    Some(match &app.phase {
        FeedPhase::Loading => format!("\n{} Loading...", SPINNER[app.spinner_frame % SPINNER.len()]),
        FeedPhase::Error { message } => {
            format!("\nLoad failed: {}\n\nPress r to retry.", message)
        }
        FeedPhase::Idle if app.cursor.exhausted => {
            "\nNothing found for this tag.\n\nPress b for a fresh batch.".to_string()
        }
        FeedPhase::Idle => "\nNo items yet.\n\nPress Space to load.".to_string(),
    })
}

/// Trailing list row describing the feed state below the last card.
fn feed_state_row(app: &App) -> Option<ListItem<'static>> {
    let line = match &app.phase {
        FeedPhase::Loading => Line::from(Span::styled(
            format!("  {} Loading more...", SPINNER[app.spinner_frame % SPINNER.len()]),
            Style::default().fg(Color::Yellow),
        )),
        FeedPhase::Error { message } => Line::from(Span::styled(
            format!("  Load failed: {} (r to retry)", message),
            Style::default().fg(Color::Red),
        )),
        FeedPhase::Idle if app.cursor.exhausted => Line::from(Span::styled(
            "  End of feed (b for a fresh batch)",
            Style::default().fg(Color::DarkGray),
        )),
        FeedPhase::Idle if !app.trigger.is_enabled() => Line::from(Span::styled(
            "  Space to load more",
            Style::default().fg(Color::DarkGray),
        )),
        FeedPhase::Idle => return None,
    };
    Some(ListItem::new(line))
}

fn cover_glyph(state: &CoverState) -> Span<'static> {
    match state {
        CoverState::Pending => Span::styled("·", Style::default().fg(Color::DarkGray)),
        CoverState::Resolving => Span::styled("◌", Style::default().fg(Color::Yellow)),
        CoverState::Resolved { .. } => Span::styled("■", Style::default().fg(Color::Green)),
        CoverState::Errored => Span::styled("□", Style::default().fg(Color::DarkGray)),
    }
}

fn rating_span(rating: &str) -> Span<'static> {
    let style = if rating == crate::douban::UNRATED {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    };
    Span::styled(format!("{:>4}", rating), style)
}
