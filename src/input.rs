//! Terminal key events to editor key notation.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Encode a key press as editor input (`a`, `<CR>`, `<C-w>`, `<M-Left>`).
///
/// Returns `None` for keys the editor has no name for.
pub fn encode_key(key: &KeyEvent) -> Option<String> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    let name = match key.code {
        KeyCode::Char(c) => {
            if !ctrl && !alt {
                return Some(escape_char(c));
            }
            // Shift is already folded into the character.
            return Some(bracket(ctrl, alt, false, &char_name(c)));
        }
        KeyCode::Enter => "CR".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Backspace => "BS".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => return Some(bracket(ctrl, alt, true, "Tab")),
        KeyCode::Delete => "Del".to_string(),
        KeyCode::Insert => "Insert".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::F(n @ 1..=12) => format!("F{}", n),
        _ => return None,
    };
    Some(bracket(ctrl, alt, shift, &name))
}

/// Encode pasted text so it is inserted literally.
pub fn encode_paste(text: &str) -> String {
    text.chars().map(escape_char).collect()
}

fn escape_char(c: char) -> String {
    match c {
        '<' => "<lt>".to_string(),
        c => c.to_string(),
    }
}

fn char_name(c: char) -> String {
    match c {
        '<' => "lt".to_string(),
        ' ' => "Space".to_string(),
        c => c.to_string(),
    }
}

fn bracket(ctrl: bool, alt: bool, shift: bool, name: &str) -> String {
    let mut out = String::from("<");
    if ctrl {
        out.push_str("C-");
    }
    if alt {
        out.push_str("M-");
    }
    if shift {
        out.push_str("S-");
    }
    out.push_str(name);
    out.push('>');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Option<String> {
        encode_key(&KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_plain_characters() {
        assert_eq!(key(KeyCode::Char('a'), KeyModifiers::NONE).as_deref(), Some("a"));
        assert_eq!(key(KeyCode::Char('A'), KeyModifiers::SHIFT).as_deref(), Some("A"));
        assert_eq!(key(KeyCode::Char('<'), KeyModifiers::NONE).as_deref(), Some("<lt>"));
        assert_eq!(key(KeyCode::Char('é'), KeyModifiers::NONE).as_deref(), Some("é"));
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(key(KeyCode::Enter, KeyModifiers::NONE).as_deref(), Some("<CR>"));
        assert_eq!(key(KeyCode::Esc, KeyModifiers::NONE).as_deref(), Some("<Esc>"));
        assert_eq!(key(KeyCode::Backspace, KeyModifiers::NONE).as_deref(), Some("<BS>"));
        assert_eq!(key(KeyCode::Tab, KeyModifiers::NONE).as_deref(), Some("<Tab>"));
        assert_eq!(key(KeyCode::BackTab, KeyModifiers::SHIFT).as_deref(), Some("<S-Tab>"));
        assert_eq!(key(KeyCode::Up, KeyModifiers::NONE).as_deref(), Some("<Up>"));
        assert_eq!(key(KeyCode::F(12), KeyModifiers::NONE).as_deref(), Some("<F12>"));
        assert_eq!(key(KeyCode::F(13), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(key(KeyCode::Char('w'), KeyModifiers::CONTROL).as_deref(), Some("<C-w>"));
        assert_eq!(key(KeyCode::Char('x'), KeyModifiers::ALT).as_deref(), Some("<M-x>"));
        assert_eq!(
            key(KeyCode::Char(' '), KeyModifiers::CONTROL).as_deref(),
            Some("<C-Space>")
        );
        assert_eq!(
            key(KeyCode::Left, KeyModifiers::CONTROL | KeyModifiers::SHIFT).as_deref(),
            Some("<C-S-Left>")
        );
    }

    #[test]
    fn test_paste_escapes_lt() {
        assert_eq!(encode_paste("a<b>"), "a<lt>b>");
    }
}
