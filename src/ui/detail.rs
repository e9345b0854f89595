use crate::app::App;
use crate::douban::{CoverState, UNRATED};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Render the full-width detail card for the opened item.
///
/// The card renders from the snapshot taken on entry, so a feed reset or
/// rotation underneath does not blank it.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let Some(item) = &app.detail_item else {
        // Entry is gated on a selected item; an empty card here means the
        // view state got out of sync, so show something rather than panic
        let paragraph = Paragraph::new("\nNothing selected.\n\nPress Esc to go back.")
            .block(Block::default().borders(Borders::ALL).title(" Detail "));
        f.render_widget(paragraph, area);
        return;
    };

    let mut title_spans = vec![Span::styled(
        item.title.as_ref(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if item.is_new {
        title_spans.push(Span::styled(
            "  NEW",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let rating_value = if item.rating.as_ref() == UNRATED {
        Span::styled("not rated", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            item.rating.as_ref(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    };

    let mut lines = vec![
        Line::from(title_spans),
        Line::from(""),
        Line::from(vec![Span::raw("Rating:   "), rating_value]),
    ];

    if let Some(ep) = &item.episode_info {
        lines.push(Line::from(vec![
            Span::raw("Episodes: "),
            Span::raw(ep.as_ref()),
        ]));
    }

    lines.push(Line::from(vec![
        Span::raw("Cover:    "),
        cover_line(&app.cover_state(&item.id)),
    ]));

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("Link:     "),
        Span::styled(item.detail_url.as_ref(), Style::default().fg(Color::Blue)),
    ]));

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(o) open in browser   (Esc) back",
        Style::default().fg(Color::DarkGray),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Detail "),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);
}

fn cover_line(state: &CoverState) -> Span<'static> {
    match state {
        CoverState::Pending => Span::styled("not loaded", Style::default().fg(Color::DarkGray)),
        CoverState::Resolving => Span::styled("checking...", Style::default().fg(Color::Yellow)),
        CoverState::Resolved { url } => {
            Span::styled(url.to_string(), Style::default().fg(Color::Green))
        }
        CoverState::Errored => Span::styled("placeholder", Style::default().fg(Color::DarkGray)),
    }
}
