use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => app.quit(),
        KeyCode::Esc => app.quit(),

        // Shift+Enter isn't reported by every terminal, so Alt+Enter works too.
        KeyCode::Enter
            if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.input.insert_newline();
        }
        KeyCode::Enter => app.submit(),

        // Chat scrolling
        KeyCode::PageUp => app.scroll_up(app.page_size()),
        KeyCode::PageDown => app.scroll_down(app.page_size()),
        KeyCode::Char('u') if ctrl => app.scroll_up(app.page_size()),
        KeyCode::Char('d') if ctrl => app.scroll_down(app.page_size()),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('g') if ctrl => app.scroll_to_bottom(),

        // Editing
        KeyCode::Backspace => app.input.backspace(),
        KeyCode::Delete => app.input.delete(),
        KeyCode::Left => app.input.move_left(),
        KeyCode::Right => app.input.move_right(),
        KeyCode::Home => app.input.move_home(),
        KeyCode::End => app.input.move_end(),
        KeyCode::Char(_) if ctrl => {}
        KeyCode::Char(c) => app.input.insert_char(c),

        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{gated_app, type_text};
    use consulta_core::ChatError;
    use crossterm::event::KeyEventState;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[tokio::test]
    async fn test_enter_submits() {
        let (mut app, _backend) = gated_app(false);
        type_text(&mut app, "hola");

        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));

        assert!(app.pending());
        assert_eq!(app.session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_shift_enter_inserts_newline() {
        let (mut app, _backend) = gated_app(false);
        type_text(&mut app, "hola");

        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::SHIFT));
        handle_event(&mut app, key(KeyCode::Char('x'), KeyModifiers::NONE));

        assert_eq!(app.input.text(), "hola\nx");
        assert!(!app.pending());
    }

    #[tokio::test]
    async fn test_typing_and_editing_keys() {
        let (mut app, _backend) = gated_app(false);
        for c in "abc".chars() {
            handle_event(&mut app, key(KeyCode::Char(c), KeyModifiers::NONE));
        }
        handle_event(&mut app, key(KeyCode::Left, KeyModifiers::NONE));
        handle_event(&mut app, key(KeyCode::Backspace, KeyModifiers::NONE));

        assert_eq!(app.input.text(), "ac");
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_and_cancels() {
        let (mut app, _backend) = gated_app(false);
        type_text(&mut app, "hola");
        handle_event(&mut app, key(KeyCode::Enter, KeyModifiers::NONE));
        assert!(app.pending());

        handle_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);

        let task = app.send_task.take().unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ChatError::Cancelled)));
    }

    #[tokio::test]
    async fn test_esc_quits_without_pending_turn() {
        let (mut app, _backend) = gated_app(false);
        handle_event(&mut app, key(KeyCode::Esc, KeyModifiers::NONE));
        assert!(app.should_quit);
        assert!(app.send_task.is_none());
    }

    #[tokio::test]
    async fn test_mouse_scroll_only_inside_chat() {
        let (mut app, _backend) = gated_app(false);
        app.chat_area = Some(Rect::new(0, 0, 40, 10));
        app.max_scroll = 20;
        app.chat_scroll = 20;

        let scroll = |column, row| {
            AppEvent::Mouse(MouseEvent {
                kind: MouseEventKind::ScrollUp,
                column,
                row,
                modifiers: KeyModifiers::NONE,
            })
        };

        handle_event(&mut app, scroll(50, 15));
        assert_eq!(app.chat_scroll, 20);

        handle_event(&mut app, scroll(5, 5));
        assert_eq!(app.chat_scroll, 17);
    }
}
