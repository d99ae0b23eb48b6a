use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Lines moved per mouse wheel notch
const WHEEL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => {
            if app.input_mode == InputMode::Editing {
                app.insert_str(&text);
            }
        }
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::PageUp => return app.scroll_half_page_up(),
        KeyCode::PageDown => return app.scroll_half_page_down(),
        _ => {}
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,

        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Enter | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley::{Config, CsvExporter, Exchange, HttpChatClient};
    use std::sync::Arc;

    fn unconfigured_app() -> App {
        let client = HttpChatClient::new(std::time::Duration::from_secs(1)).unwrap();
        App::new(Exchange::new(Config::default(), Arc::new(client), CsvExporter::disabled()))
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    #[test]
    fn test_typing_and_enter_without_config_shows_error() {
        let mut app = unconfigured_app();
        for c in "Hello".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.exchange.transcript().len(), 1);
        assert!(app.exchange.error().is_some());
        assert!(!app.is_busy());
        assert!(app.reply_task.is_none());
    }

    #[test]
    fn test_whitespace_enter_is_noop() {
        let mut app = unconfigured_app();
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Enter);

        assert!(app.exchange.transcript().is_empty());
        assert_eq!(app.exchange.error(), None);
    }

    #[test]
    fn test_mode_switching_and_quit() {
        let mut app = unconfigured_app();
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);
        press(&mut app, KeyCode::Char('i'));
        assert_eq!(app.input_mode, InputMode::Editing);
        // 'q' is text while editing
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_ctrl_c_quits_from_editing() {
        let mut app = unconfigured_app();
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(app.should_quit);
    }
}
