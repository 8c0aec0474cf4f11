use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use digita::{
    challenge::Hud,
    config::Theme,
    metrics::Outcome,
    session::{Mode, Phase},
    util::clock,
};

use crate::{App, Screen};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
const MAX_HEARTS: u32 = 5;

/// Colors for one theme.
#[derive(Debug, Clone, Copy)]
struct Palette {
    text: Color,
    accent: Color,
    correct: Color,
    incorrect: Color,
    warning: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                text: Color::White,
                accent: Color::Cyan,
                correct: Color::Green,
                incorrect: Color::Red,
                warning: Color::Yellow,
            },
            Theme::Light => Self {
                text: Color::Black,
                accent: Color::Blue,
                correct: Color::Rgb(0, 128, 0),
                incorrect: Color::Rgb(192, 0, 0),
                warning: Color::Rgb(160, 100, 0),
            },
        }
    }

    fn bold(&self) -> Style {
        Style::default().fg(self.text).add_modifier(Modifier::BOLD)
    }

    fn dim(&self) -> Style {
        self.bold().add_modifier(Modifier::DIM)
    }

    fn italic(&self) -> Style {
        Style::default().fg(self.text).add_modifier(Modifier::ITALIC)
    }
}

pub fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let palette = Palette::for_theme(self.config.theme);

        match self.screen {
            Screen::Login => render_login(self, palette, area, buf),
            Screen::Practice => render_practice(self, palette, area, buf),
            Screen::Results => {
                render_practice(self, palette, area, buf);
                render_results(self, palette, area, buf);
            }
            Screen::Profile => render_profile(self, palette, area, buf),
        }
    }
}

fn render_login(app: &App, palette: Palette, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        "digita",
        palette.bold().fg(palette.accent),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Line::from(vec![
        Span::styled("username: ", palette.dim()),
        Span::styled(format!("{}_", app.login_input), palette.bold()),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(notice.as_str(), palette.bold().fg(palette.warning)))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[3], buf);
    }

    Paragraph::new(Span::styled("(enter) sign in / (esc) quit", palette.italic()))
        .render(chunks[5], buf);
}

fn render_practice(app: &App, palette: Palette, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let target = session.target().unwrap_or_default();
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_lines = match target.width() {
        w if w <= max_chars_per_line as usize => 1,
        w => (w as f64 / max_chars_per_line as f64).ceil() as u16 + 1,
    };
    let hud_lines = if session.mode() == Mode::Challenge { 1 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),          // header
            Constraint::Length(1),          // metrics
            Constraint::Length(hud_lines),  // challenge hud
            Constraint::Min(1),             // spacer
            Constraint::Length(prompt_lines),
            Constraint::Min(1),             // spacer
            Constraint::Length(1),          // status
            Constraint::Length(1),          // bests
            Constraint::Length(1),          // legend
        ])
        .split(area);

    let header = format!(
        "{} | {} mode | sound {}",
        session.user().unwrap_or("-"),
        session.mode(),
        if app.config.sound { "on" } else { "off" },
    );
    Paragraph::new(Span::styled(header, palette.bold().fg(palette.accent)))
        .render(chunks[0], buf);

    let metrics = session.metrics();
    Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {} errors",
            metrics.wpm, metrics.accuracy, metrics.errors
        ),
        palette.bold(),
    ))
    .render(chunks[1], buf);

    if let Some(hud) = session.hud() {
        render_hud(hud, palette, chunks[2], buf);
    }

    let spans = prompt_spans(app, palette);
    Paragraph::new(Line::from(spans))
        .alignment(if prompt_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: false })
        .render(chunks[4], buf);

    let status = match (&app.notice, session.phase()) {
        (Some(notice), _) => Span::styled(notice.clone(), palette.bold().fg(palette.warning)),
        (None, Phase::Idle) => Span::styled(
            "IDLE - start typing or press enter",
            palette.bold().fg(palette.warning).add_modifier(Modifier::ITALIC),
        ),
        (None, Phase::Active) => Span::styled("typing...", palette.italic()),
        (None, Phase::Ended) => Span::styled("finished", palette.italic()),
    };
    Paragraph::new(status)
        .alignment(Alignment::Center)
        .render(chunks[6], buf);

    if let Some(progress) = &app.progress {
        Paragraph::new(Span::styled(
            format!(
                "best {} wpm / {}% acc / {} pts   sessions {}",
                progress.best_wpm,
                progress.best_accuracy,
                progress.best_challenge_score,
                progress.sessions
            ),
            palette.dim(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[7], buf);
    }

    Paragraph::new(Span::styled(
        "(tab) mode / ^n new / ^r reset / ^p profile / ^t theme / ^s sound / ^l sign out / (esc) quit",
        palette.italic(),
    ))
    .render(chunks[8], buf);
}

fn render_hud(hud: Hud, palette: Palette, area: Rect, buf: &mut Buffer) {
    let time_style = if hud.remaining_secs <= 10 {
        palette.bold().fg(palette.incorrect)
    } else {
        palette.bold()
    };

    Paragraph::new(Line::from(vec![
        Span::styled(clock(hud.remaining_secs), time_style),
        Span::styled("   lives ", palette.dim()),
        Span::styled(lives_label(hud.lives), palette.bold().fg(palette.incorrect)),
        Span::styled("   score ", palette.dim()),
        Span::styled(hud.score.to_string(), palette.bold()),
        Span::styled("   combo ", palette.dim()),
        Span::styled(hud.combo.to_string(), palette.bold()),
        Span::styled(
            format!(" {}", hud.multiplier),
            palette.bold().fg(palette.accent),
        ),
    ]))
    .render(area, buf);
}

/// One heart per life while they fit at a glance, a count beyond that.
fn lives_label(lives: u32) -> String {
    match lives {
        0..=MAX_HEARTS => "♥".repeat(lives as usize),
        n => format!("♥ x{n}"),
    }
}

/// Target text colored by what has been typed so far, with the next
/// character underlined and anything typed past the end shown as errors.
fn prompt_spans(app: &App, palette: Palette) -> Vec<Span<'static>> {
    let correct = palette.bold().fg(palette.correct);
    let incorrect = palette.bold().fg(palette.incorrect);
    let pending = palette.dim();
    let next = pending.add_modifier(Modifier::UNDERLINED);

    let mut typed = app.session.typed().chars();
    let mut underlined = false;
    let mut spans: Vec<Span> = app
        .session
        .highlight()
        .into_iter()
        .map(|(expected, outcome)| {
            let actual = typed.next();
            match outcome {
                Some(Outcome::Correct) => Span::styled(expected.to_string(), correct),
                Some(Outcome::Incorrect) => Span::styled(
                    match actual {
                        Some(' ') | None => "·".to_owned(),
                        Some(c) => c.to_string(),
                    },
                    incorrect,
                ),
                None if !underlined => {
                    underlined = true;
                    Span::styled(expected.to_string(), next)
                }
                None => Span::styled(expected.to_string(), pending),
            }
        })
        .collect();

    let overflow: String = typed.map(|c| if c == ' ' { '·' } else { c }).collect();
    if !overflow.is_empty() {
        spans.push(Span::styled(overflow, incorrect));
    }
    spans
}

fn render_results(app: &App, palette: Palette, area: Rect, buf: &mut Buffer) {
    let Some((reason, result)) = app.session.last_result() else {
        return;
    };

    let popup = centered_rect(50, 9, area);
    Clear.render(popup, buf);

    let mut lines = vec![
        Line::from(Span::styled(
            reason.to_string(),
            palette.bold().fg(palette.accent),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "{} wpm   {}% acc   {} errors",
                result.wpm, result.accuracy, result.errors
            ),
            palette.bold(),
        )),
    ];
    if let Some(score) = result.challenge_score {
        lines.push(Line::from(Span::styled(
            format!("score {score}"),
            palette.bold().fg(palette.correct),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "(r)etry / (n)ew / (p)rofile / (q)uit",
        palette.italic(),
    )));

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" results "))
        .render(popup, buf);
}

fn render_profile(app: &App, palette: Palette, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let user = app.session.user().unwrap_or("-");
    Paragraph::new(Span::styled(
        format!("profile: {user}"),
        palette.bold().fg(palette.accent),
    ))
    .render(chunks[0], buf);

    let body = match &app.progress {
        Some(p) => {
            let last = p
                .last_session_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            vec![
                Line::from(format!("sessions            {}", p.sessions)),
                Line::from(format!("average wpm         {:.1}", p.avg_wpm)),
                Line::from(format!("average accuracy    {:.1}%", p.avg_accuracy)),
                Line::from(format!("best wpm            {}", p.best_wpm)),
                Line::from(format!("best accuracy       {}%", p.best_accuracy)),
                Line::from(format!("best challenge      {}", p.best_challenge_score)),
                Line::from(format!("last session        {last}")),
            ]
        }
        None => vec![Line::from("no progress recorded yet")],
    };
    Paragraph::new(body)
        .style(palette.bold())
        .render(chunks[1], buf);

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(notice.as_str(), palette.bold().fg(palette.warning)))
            .render(chunks[2], buf);
    }

    Paragraph::new(Span::styled("(x) reset progress / (b)ack", palette.italic()))
        .render(chunks[3], buf);
}

/// Rect of `percent_x` width and `height` rows centered in `area`.
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let height = height.min(area.height);
    let width = (area.width as u32 * percent_x.min(100) as u32 / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_app;
    use digita::config::ChallengeSettings;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{buffer::Buffer, layout::Rect};

    fn rendered(app: &App, area: Rect) -> (String, Buffer) {
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        let text = buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>();
        (text, buffer)
    }

    fn press(app: &mut App, s: &str) {
        for c in s.chars() {
            app.on_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    fn signed_in(mode: Mode, texts: &[&str]) -> (App, tempfile::TempDir) {
        let (mut app, dir) = test_app(mode, texts);
        app.sign_in("tester");
        (app, dir)
    }

    #[test]
    fn test_login_screen() {
        let (mut app, _dir) = test_app(Mode::Beginner, &["abc"]);
        app.login_input = "ana".to_string();

        let (text, _) = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(text.contains("digita"));
        assert!(text.contains("username: ana_"));
        assert!(text.contains("(enter) sign in"));
    }

    #[test]
    fn test_idle_practice_screen() {
        let (app, _dir) = signed_in(Mode::Beginner, &["hello world"]);

        let (text, _) = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(text.contains("tester | beginner mode"));
        assert!(text.contains("hello world"));
        assert!(text.contains("IDLE"));
        assert!(text.contains("0 wpm"));
        assert!(text.contains("100% acc"));
    }

    #[test]
    fn test_prompt_colors_follow_input() {
        let (mut app, _dir) = signed_in(Mode::Beginner, &["abcd"]);
        press(&mut app, "ax");

        let spans = prompt_spans(&app, Palette::for_theme(Theme::Dark));

        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0].content, "a");
        assert_eq!(spans[0].style.fg, Some(Color::Green));
        assert_eq!(spans[1].content, "x");
        assert_eq!(spans[1].style.fg, Some(Color::Red));
        assert!(spans[2].style.add_modifier.contains(Modifier::UNDERLINED));
        assert!(!spans[3].style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn test_prompt_shows_incorrect_space_as_dot() {
        let (mut app, _dir) = signed_in(Mode::Beginner, &["ab"]);
        press(&mut app, " ");

        let spans = prompt_spans(&app, Palette::for_theme(Theme::Dark));
        assert_eq!(spans[0].content, "·");
    }

    #[test]
    fn test_prompt_overflow_is_red() {
        let (mut app, _dir) = signed_in(Mode::Beginner, &["ab"]);
        app.session.start().unwrap();
        app.session.on_input("abzz").unwrap();

        let spans = prompt_spans(&app, Palette::for_theme(Theme::Dark));
        let last = spans.last().unwrap();
        assert_eq!(last.content, "zz");
        assert_eq!(last.style.fg, Some(Color::Red));
    }

    #[test]
    fn test_challenge_hud_rendered() {
        let (app, _dir) = signed_in(Mode::Challenge, &["hello"]);

        let (text, _) = rendered(&app, Rect::new(0, 0, 100, 24));

        assert!(text.contains("1:00"));
        assert!(text.contains("♥♥♥"));
        assert!(text.contains("x1.0"));
        assert!(text.contains("score 0"));
    }

    #[test]
    fn test_lives_label() {
        assert_eq!(lives_label(0), "");
        assert_eq!(lives_label(3), "♥♥♥");
        assert_eq!(lives_label(5), "♥♥♥♥♥");
        assert_eq!(lives_label(6), "♥ x6");
        assert_eq!(lives_label(u32::MAX), format!("♥ x{}", u32::MAX));
    }

    #[test]
    fn test_hud_with_many_lives_renders_count() {
        let (mut app, _dir) = test_app(Mode::Challenge, &["hello"]);
        app.session.set_challenge_settings(ChallengeSettings {
            duration_secs: 60,
            lives: u32::MAX,
        });
        app.sign_in("tester");

        let (text, _) = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(text.contains(&format!("lives ♥ x{}", u32::MAX)));
    }

    #[test]
    fn test_results_popup() {
        let (mut app, _dir) = signed_in(Mode::Beginner, &["hi"]);
        press(&mut app, "hi");
        assert_eq!(app.screen, Screen::Results);

        let (text, _) = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(text.contains("text completed"));
        assert!(text.contains("100% acc"));
        assert!(text.contains("(r)etry"));
        assert!(!text.contains("score"));
    }

    #[test]
    fn test_challenge_results_show_score() {
        let (mut app, _dir) = signed_in(Mode::Challenge, &["abc"]);
        press(&mut app, "xxx");

        let (text, _) = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(text.contains("out of lives"));
        assert!(text.contains("score 0"));
    }

    #[test]
    fn test_profile_screen() {
        let (mut app, _dir) = signed_in(Mode::Beginner, &["hi"]);
        press(&mut app, "hi");
        press(&mut app, "p");
        assert_eq!(app.screen, Screen::Profile);

        let (text, _) = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(text.contains("profile: tester"));
        assert!(text.contains("sessions            1"));
        assert!(text.contains("(x) reset progress"));
    }

    #[test]
    fn test_light_theme_palette() {
        let (mut app, _dir) = signed_in(Mode::Beginner, &["abc"]);
        app.config.theme = Theme::Light;

        let (_, buffer) = rendered(&app, Rect::new(0, 0, 80, 24));

        assert!(buffer
            .content()
            .iter()
            .any(|cell| cell.fg == Color::Black));
    }

    #[test]
    fn test_small_and_large_areas_render() {
        let (app, _dir) = signed_in(Mode::Challenge, &["a fairly long sentence to wrap"]);

        for area in [
            Rect::new(0, 0, 12, 5),
            Rect::new(0, 0, 200, 60),
            Rect::new(0, 0, 40, 40),
        ] {
            let _ = rendered(&app, area);
        }
    }

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 20);
        let popup = centered_rect(50, 10, area);

        assert_eq!(popup, Rect::new(25, 5, 50, 10));
        assert_eq!(centered_rect(50, 50, area).height, 20);
    }
}
