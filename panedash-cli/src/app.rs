// panedash-cli/src/app.rs
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use panedash_core::{Event, EventResult, Generation, Supervisor};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// The key was acted on or ignored; repaint either way
    Continue,
}

/// Dispatch one key press against whatever generation is live right now.
///
/// The pointer is read per key, so input that was queued across a reload
/// lands on the new generation.
pub fn dispatch_key(supervisor: &Supervisor, key: KeyEvent) -> Action {
    route_key(&supervisor.live(), key)
}

/// Dispatch one key press against `generation`.
///
/// Global keys win; anything else goes to the focused widget. With nothing
/// focused, `q` quits and a widget's focus char jumps to it. A generation
/// that is no longer live only honours Ctrl-C.
pub fn route_key(generation: &Generation, key: KeyEvent) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::Continue;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }
    if !generation.is_live() {
        tracing::debug!(generation = generation.id(), ?key, "key for retired generation dropped");
        return Action::Continue;
    }

    let focus = generation.focus();
    match key.code {
        KeyCode::Char('r') if ctrl => {
            tracing::debug!(generation = generation.id(), "manual refresh");
            generation.refresh_all();
            return Action::Continue;
        }
        KeyCode::Tab => {
            focus.next();
            return Action::Continue;
        }
        KeyCode::BackTab => {
            focus.prev();
            return Action::Continue;
        }
        KeyCode::Esc => {
            focus.none();
            return Action::Continue;
        }
        _ => {}
    }

    if let Some(widget) = focus.focused_widget() {
        if widget.on_event(Event::Key(key)) == EventResult::Ignored {
            tracing::trace!(widget = %widget.name(), ?key, "key ignored");
        }
        return Action::Continue;
    }

    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char(c) => {
            if !focus.focus_on(c) {
                tracing::trace!(key = %c, "no widget for shortcut");
            }
            Action::Continue
        }
        _ => Action::Continue,
    }
}

/// Paint the whole dashboard: the widget grid and a one-line status bar
pub fn draw(frame: &mut Frame, generation: &Generation, reload_error: Option<&str>) {
    let [body, status] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(frame.area());

    let widgets = generation.widgets();
    let areas = generation.grid().areas(body, widgets.len());
    let buf = frame.buffer_mut();
    for (widget, area) in widgets.iter().zip(areas) {
        widget.render(area, buf);
    }

    frame.render_widget(status_line(generation, reload_error), status);
}

fn status_line(generation: &Generation, reload_error: Option<&str>) -> Paragraph<'static> {
    let focused = generation
        .focus()
        .focused_widget()
        .map(|w| w.name().to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut spans = vec![
        Span::styled(
            format!(" {} ", generation.title()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("| gen {} | focus: {} ", generation.id(), focused)),
    ];

    match reload_error {
        Some(error) => spans.push(Span::styled(
            format!("| reload failed: {error}"),
            Style::default().fg(Color::Red),
        )),
        None => spans.push(Span::styled(
            "| tab: focus  esc: unfocus  ^r: refresh  q: quit",
            Style::default().fg(Color::DarkGray),
        )),
    }

    Paragraph::new(Line::from(spans))
}

#[cfg(test)]
mod tests {
    use super::*;
    use panedash_core::{ConfigFile, GenerationBuilder, WidgetRegistry};
    use ratatui::{Terminal, backend::TestBackend};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[dashboard]
title = "demo"

[[widget]]
name = "left"
type = "system"
focus_char = "a"

[[widget]]
name = "right"
type = "system"
focus_char = "b"
"#;

    fn builder() -> GenerationBuilder {
        let mut registry = WidgetRegistry::new();
        panedash_widgets::register_builtin(&mut registry);
        GenerationBuilder::new(Arc::new(registry))
    }

    fn generation() -> Generation {
        let config = ConfigFile::parse(CONFIG).unwrap();
        let generation = builder().build(1, &config).unwrap();
        generation.activate().unwrap();
        generation
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn focused(generation: &Generation) -> Option<String> {
        generation
            .focus()
            .focused_widget()
            .map(|w| w.name().to_string())
    }

    #[test]
    fn test_tab_backtab_and_esc() {
        let generation = generation();

        route_key(&generation, press(KeyCode::Tab));
        assert_eq!(focused(&generation).as_deref(), Some("left"));

        route_key(&generation, press(KeyCode::BackTab));
        assert_eq!(focused(&generation).as_deref(), Some("right"));

        route_key(&generation, press(KeyCode::Esc));
        assert_eq!(focused(&generation), None);
    }

    #[test]
    fn test_q_quits_only_when_unfocused() {
        let generation = generation();
        assert_eq!(route_key(&generation, press(KeyCode::Char('q'))), Action::Quit);

        route_key(&generation, press(KeyCode::Tab));
        assert_eq!(
            route_key(&generation, press(KeyCode::Char('q'))),
            Action::Continue
        );
        assert_eq!(route_key(&generation, ctrl('c')), Action::Quit);
    }

    #[test]
    fn test_focus_char_jumps_when_unfocused() {
        let generation = generation();

        route_key(&generation, press(KeyCode::Char('b')));
        assert_eq!(focused(&generation).as_deref(), Some("right"));

        // Focused widgets receive plain keys instead
        route_key(&generation, press(KeyCode::Char('a')));
        assert_eq!(focused(&generation).as_deref(), Some("right"));

        route_key(&generation, press(KeyCode::Char('z')));
        assert_eq!(focused(&generation).as_deref(), Some("right"));
    }

    #[test]
    fn test_key_release_ignored() {
        let generation = generation();
        let mut key = press(KeyCode::Char('q'));
        key.kind = KeyEventKind::Release;
        assert_eq!(route_key(&generation, key), Action::Continue);
    }

    #[test]
    fn test_status_line_shows_generation_and_error() {
        let generation = generation();
        route_key(&generation, press(KeyCode::Char('a')));

        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal
            .draw(|frame| draw(frame, &generation, Some("bad toml")))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let last_row: String = (0..80)
            .map(|x| buffer[(x, 11)].symbol().to_string())
            .collect();
        assert!(last_row.starts_with(" demo | gen 1 | focus: left | reload failed: bad toml"));

        let first_row: String = (0..40)
            .map(|x| buffer[(x, 0)].symbol().to_string())
            .collect();
        assert!(first_row.contains(" System [a] "));
    }

    #[test]
    fn test_keys_follow_the_swap_to_the_new_generation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panedash.toml");
        fs::write(&path, CONFIG).unwrap();
        let supervisor = Supervisor::start(&path, builder()).unwrap();

        // A snapshot taken before the reload, as the render loop holds one
        let stale = supervisor.live();
        supervisor.rebuild().unwrap();

        assert_eq!(dispatch_key(&supervisor, press(KeyCode::Tab)), Action::Continue);
        assert_eq!(focused(&supervisor.live()).as_deref(), Some("left"));
        assert_eq!(focused(&stale), None);

        route_key(&stale, press(KeyCode::Tab));
        assert_eq!(focused(&stale), None);
        assert_eq!(route_key(&stale, ctrl('c')), Action::Quit);

        supervisor.shutdown().unwrap();
    }
}
