use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use wordrill::controller::{NoticeLevel, PracticeView, ViewPhase};
use wordrill::model::{ResultSummary, Step};
use wordrill::step::StepPrompt;
use wordrill::timing::format_elapsed;

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

const PRACTICE_KEYS: &str = "(enter) submit  (ctrl-s) speak  (ctrl-p) pause  (esc) back to plan";

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN.min(area.width / 4))
            .vertical_margin(VERTICAL_MARGIN.min(area.height / 4))
            .constraints([
                Constraint::Length(1), // header
                Constraint::Min(1),    // body
                Constraint::Length(1), // toast
                Constraint::Length(1), // legend
            ])
            .split(area);

        match &self.state {
            AppState::Practice => render_practice(&self.view, chunks[0], chunks[1], chunks[3], buf),
            AppState::Results(summary) => render_results(summary, chunks[1], chunks[3], buf),
        }

        if let Some(notice) = &self.toast {
            let color = match notice.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Warning => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            Paragraph::new(Span::styled(
                notice.message.as_str(),
                Style::default().fg(color).add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
        }
    }
}

fn render_practice(view: &PracticeView, header: Rect, body: Rect, legend: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let progress = match view.position {
        Some(p) => format!(
            "word {}/{}  step {}/3",
            p.word_index + 1,
            view.word_count,
            p.step.ordinal() + 1
        ),
        None => format!("{} words", view.word_count),
    };
    Paragraph::new(Line::from(vec![
        Span::styled(progress, bold_style),
        Span::raw("   "),
        Span::styled(format!("{} total  {} active", view.elapsed, view.active), dim_style),
    ]))
    .alignment(Alignment::Center)
    .render(header, buf);

    let (message, keys) = match &view.phase {
        ViewPhase::Loading => ("Loading session...".to_string(), "(esc) back to plan"),
        ViewPhase::Failed(reason) => (reason.clone(), "(r) retry  (esc) back to plan"),
        ViewPhase::NothingToPractice => (
            "Nothing to practice in this session.".to_string(),
            "(esc) back to plan",
        ),
        ViewPhase::Finishing => (
            "All steps done. Saving results...".to_string(),
            "(ctrl-f) retry saving  (esc) back to plan",
        ),
        ViewPhase::Completed => ("Session complete.".to_string(), "(esc) back to plan"),
        ViewPhase::Paused => ("PAUSED".to_string(), "(ctrl-p) resume  (esc) back to plan"),
        ViewPhase::Practicing => (String::new(), PRACTICE_KEYS),
    };

    Paragraph::new(Span::styled(keys, dim_style))
        .alignment(Alignment::Center)
        .render(legend, buf);

    match (&view.phase, &view.prompt) {
        (ViewPhase::Practicing, Some(prompt)) => render_prompt(view, prompt, body, buf),
        (ViewPhase::Paused, _) => Paragraph::new(Span::styled(
            message,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(centered(body, 1), buf),
        (ViewPhase::Failed(_), _) => Paragraph::new(Span::styled(
            message,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(centered(body, 2), buf),
        _ => Paragraph::new(Span::styled(message, bold_style))
            .alignment(Alignment::Center)
            .render(centered(body, 1), buf),
    }
}

/// Lines describing the word for the current step. Later steps reveal less.
fn prompt_lines(prompt: &StepPrompt) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let mut lines = Vec::new();

    let title = match prompt.step {
        Step::SpellFromFull => "Copy the word",
        Step::SpellFromCues => "Spell it from the cues",
        Step::SpellFromAudio => "Spell what you hear",
    };
    lines.push(Line::from(Span::styled(title, dim_style)));

    if let Some(word) = &prompt.word {
        lines.push(Line::from(Span::styled(
            word.clone(),
            bold_style.fg(Color::Magenta),
        )));
    }
    if let Some(ipa) = &prompt.ipa {
        lines.push(Line::from(Span::raw(ipa.clone())));
    }
    if !prompt.syllables.is_empty() {
        lines.push(Line::from(Span::raw(prompt.syllables.join(" · "))));
    } else if let Some(count) = prompt.syllable_count {
        lines.push(Line::from(Span::styled(format!("{count} syllables"), dim_style)));
    }
    if !prompt.phonics.is_empty() {
        let spans: Vec<Span> = prompt
            .phonics
            .iter()
            .map(|p| Span::raw(format!("{}[{}] ", p.letters, p.sound)))
            .collect();
        lines.push(Line::from(spans));
    }
    if prompt.word.is_none() {
        lines.push(Line::from(Span::styled(
            format!("{} letters", prompt.letter_count),
            dim_style,
        )));
    }
    lines.push(Line::from(Span::styled(
        prompt.meaning.clone(),
        Style::default().add_modifier(Modifier::ITALIC),
    )));
    lines
}

fn render_prompt(view: &PracticeView, prompt: &StepPrompt, body: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = prompt_lines(prompt);
    lines.push(Line::raw(""));

    let input_style = match &view.feedback {
        Some(f) if f.is_correct => bold_style.fg(Color::Green),
        Some(_) => bold_style.fg(Color::Red),
        None => bold_style.add_modifier(Modifier::UNDERLINED),
    };
    let shown_input = if view.user_input.is_empty() && view.feedback.is_none() {
        "_".to_string()
    } else {
        view.user_input.clone()
    };
    lines.push(Line::from(Span::styled(shown_input, input_style)));

    match &view.feedback {
        Some(f) if f.is_correct => lines.push(Line::from(Span::styled(
            "Correct!",
            Style::default().fg(Color::Green),
        ))),
        Some(f) => lines.push(Line::from(vec![
            Span::styled("Not quite, it is ", Style::default().fg(Color::Red)),
            Span::styled(f.expected.clone(), bold_style),
        ])),
        None if view.autoplay_plays > 0 => lines.push(Line::from(Span::styled(
            format!("played {}x", view.autoplay_plays),
            Style::default().add_modifier(Modifier::DIM),
        ))),
        None => {}
    }

    let widest = lines.iter().map(line_width).max().unwrap_or(0);
    let alignment = if widest <= body.width as usize {
        Alignment::Center
    } else {
        Alignment::Left
    };
    let height = lines.len() as u16;
    Paragraph::new(lines)
        .alignment(alignment)
        .wrap(Wrap { trim: true })
        .render(centered(body, height), buf);
}

fn render_results(summary: &ResultSummary, body: Rect, legend: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let headline = format!(
        "{}% accuracy   {}/{} steps   {} words",
        summary.accuracy, summary.steps_correct, summary.steps_submitted, summary.words_practiced
    );
    let times = format!(
        "{} total   {} active",
        format_elapsed(summary.total_time_ms),
        format_elapsed(summary.active_time_ms)
    );
    let finished = format!("finished {}", summary.completed_at.format("%Y-%m-%d %H:%M"));
    let lines = vec![
        Line::from(Span::styled("Session complete", bold_style.fg(Color::Green))),
        Line::raw(""),
        Line::from(Span::styled(headline, bold_style)),
        Line::from(Span::raw(times)),
        Line::from(Span::styled(finished, Style::default().add_modifier(Modifier::DIM))),
    ];
    let height = lines.len() as u16;
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered(body, height), buf);

    Paragraph::new(Span::styled(
        "(esc) back to plan",
        Style::default().add_modifier(Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(legend, buf);
}

/// A full-width strip of `height` rows in the vertical middle of `area`.
fn centered(area: Rect, height: u16) -> Rect {
    let height = height.min(area.height);
    Rect {
        y: area.y + (area.height - height) / 2,
        height,
        ..area
    }
}

/// Width in terminal cells; CJK meanings take two cells per character.
fn line_width(line: &Line) -> usize {
    line.spans.iter().map(|s| s.content.as_ref().width()).sum()
}
