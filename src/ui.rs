pub mod screen;

use codetype::{
    session::{CharState, Session},
    sink::SubmitStatus,
    trainer::LoadState,
    util::{code_lines, format_time},
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};
use std::time::SystemTime;
use unicode_width::UnicodeWidthStr;
use webbrowser::Browser;

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

/// Styled lines of the current snippet: typed positions green or red,
/// cursor underlined, the rest dimmed.
pub fn code_spans(session: &Session) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let correct_style = Style::default().patch(bold_style).fg(Color::Green);
    let incorrect_style = Style::default()
        .patch(bold_style)
        .fg(Color::Red)
        .bg(Color::Rgb(60, 20, 20));
    let pending_style = Style::default().add_modifier(Modifier::DIM);
    let cursor_style = Style::default()
        .patch(pending_style)
        .add_modifier(Modifier::UNDERLINED | Modifier::BOLD);

    let cursor = session.typed_len();
    let mut lines = Vec::new();
    let mut spans = Vec::new();

    for (idx, (&expected, state)) in session
        .target()
        .iter()
        .zip(session.char_states())
        .enumerate()
    {
        let style = match state {
            _ if idx == cursor => cursor_style,
            CharState::Correct => correct_style,
            CharState::Incorrect => incorrect_style,
            CharState::Pending => pending_style,
        };

        if expected == '\n' {
            // a newline only gets a visible glyph when it needs highlighting
            if idx == cursor || state == CharState::Incorrect {
                spans.push(Span::styled("⏎", style));
            }
            lines.push(Line::from(std::mem::take(&mut spans)));
            continue;
        }

        let shown = match (state, expected) {
            (CharState::Incorrect, ' ') => "·".to_owned(),
            (_, c) => c.to_string(),
        };
        spans.push(Span::styled(shown, style));
    }

    if cursor >= session.target().len() {
        spans.push(Span::styled(" ", cursor_style));
    }
    lines.push(Line::from(spans));
    lines
}

pub fn render_typing(app: &App, f: &mut Frame) {
    let area = f.area();
    let session = app.trainer.session();
    let dim_bold_style = Style::default()
        .add_modifier(Modifier::BOLD)
        .add_modifier(Modifier::DIM);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // status
            Constraint::Length(1), // notice
            Constraint::Min(1),    // code
            Constraint::Length(1), // legend
        ])
        .split(area);

    let (wpm, accuracy) = session.live_score(SystemTime::now());
    let status = format!(
        "{} left   {}   {} mistakes   {} wpm   {}% acc   {} · lvl {} ({} xp)",
        format_time(session.remaining_secs()),
        app.language,
        session.mistakes(),
        wpm,
        accuracy,
        app.profile.user.name,
        app.profile.level(),
        app.profile.xp,
    );
    f.render_widget(
        Paragraph::new(Span::styled(status, dim_bold_style)).alignment(Alignment::Center),
        chunks[0],
    );

    if app.trainer.snippet_is_placeholder() {
        let notice = Paragraph::new(Span::styled(
            "offline snippet - the snippet source is unavailable",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center);
        f.render_widget(notice, chunks[1]);
    }

    if app.trainer.load_state() == LoadState::Loading {
        let loading = Paragraph::new(Span::styled(
            format!("Loading {} snippet...", app.language),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        f.render_widget(loading, centered_row(chunks[2]));
    } else {
        let code = session.target_text();
        let code_area = centered_code_area(chunks[2], &code);
        let widget = Paragraph::new(code_spans(session)).wrap(Wrap { trim: false });
        f.render_widget(widget, code_area);
    }

    let legend = Paragraph::new(Span::styled(
        "(ctrl+d) end test / (ctrl+r) new test / (ctrl+l) leaderboard / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ));
    f.render_widget(legend, chunks[3]);
}

pub fn render_results(app: &App, f: &mut Frame) {
    let area = f.area();
    let Some(report) = &app.report else {
        return render_typing(app, f);
    };

    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1), // scores
            Constraint::Length(1), // details
            Constraint::Length(1), // xp
            Constraint::Length(1), // feedback
            Constraint::Length(1), // save status
            Constraint::Min(1),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let scores = Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {} mistakes",
            report.score.wpm, report.score.accuracy, report.result.mistakes
        ),
        bold_style.fg(Color::Magenta),
    ))
    .alignment(Alignment::Center);
    f.render_widget(scores, chunks[1]);

    let details = Paragraph::new(format!(
        "{} · {}s of {}s · {}/{} correct chars · {} snippets completed",
        report.result.language,
        report.result.time_elapsed_secs,
        report.result.duration_secs,
        report.result.correct_chars,
        report.result.total_chars,
        report.result.snippets_completed,
    ))
    .alignment(Alignment::Center);
    f.render_widget(details, chunks[2]);

    let xp = Paragraph::new(format!(
        "+{} xp · level {} ({} xp)",
        report.score.xp,
        app.profile.level(),
        app.profile.xp
    ))
    .alignment(Alignment::Center);
    f.render_widget(xp, chunks[3]);

    let feedback = Paragraph::new(Span::styled(
        report.feedback,
        italic_style.fg(Color::Cyan),
    ))
    .alignment(Alignment::Center);
    f.render_widget(feedback, chunks[4]);

    let (saved_text, saved_color) = match (&report.saved, report.xp_synced) {
        (Ok(SubmitStatus::Recorded), true) => ("result saved".to_string(), Color::Green),
        (Ok(SubmitStatus::Duplicate), true) => ("result already recorded".to_string(), Color::Green),
        (Ok(_), false) => ("result saved, xp sync failed".to_string(), Color::Yellow),
        (Err(e), _) => (format!("result not saved: {e}"), Color::Red),
    };
    f.render_widget(
        Paragraph::new(Span::styled(saved_text, Style::default().fg(saved_color)))
            .alignment(Alignment::Center),
        chunks[5],
    );

    let legend = Paragraph::new(Span::styled(
        String::from(if Browser::is_available() {
            "(r)etry / (d)uration / (l)eaderboard / (t)weet / (esc)ape"
        } else {
            "(r)etry / (d)uration / (l)eaderboard / (esc)ape"
        }),
        italic_style,
    ));
    f.render_widget(legend, chunks[7]);
}

pub fn render_leaderboard(app: &App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let header = Row::new(vec![
        Cell::from("Rank"),
        Cell::from("Name"),
        Cell::from("WPM"),
        Cell::from("Accuracy"),
        Cell::from("Language"),
        Cell::from("Date"),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = app
        .leaderboard
        .iter()
        .map(|entry| {
            let style = if entry.name == app.profile.user.name {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(format!("#{}", entry.rank)),
                Cell::from(entry.name.clone()),
                Cell::from(entry.wpm.to_string()),
                Cell::from(format!("{}%", entry.accuracy)),
                Cell::from(entry.language.to_string()),
                Cell::from(entry.date.format("%Y-%m-%d").to_string()),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Min(12),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("Leaderboard"));

    f.render_widget(table, chunks[0]);

    let legend = Paragraph::new(Span::styled(
        "(b)ack / (r)etry / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ));
    f.render_widget(legend, chunks[1]);
}

/// Center the code block horizontally when it is narrower than the area
fn centered_code_area(area: Rect, code: &str) -> Rect {
    let widest = code_lines(code)
        .iter()
        .map(|line| line.width() as u16 + 1)
        .max()
        .unwrap_or(0);
    if widest >= area.width {
        return area;
    }
    let pad = (area.width - widest) / 2;
    Rect {
        x: area.x + pad,
        width: widest,
        ..area
    }
}

fn centered_row(area: Rect) -> Rect {
    Rect {
        y: area.y + area.height / 2,
        height: 1.min(area.height),
        ..area
    }
}
