//! Cleans server-supplied text before it lands in a toast or a log line.

pub const MAX_MESSAGE_CHARS: usize = 300;

#[derive(Clone, Copy)]
enum Escape {
    Start,
    Csi,
    Osc,
}

/// Drops terminal escape sequences, control and bidi-override characters,
/// collapses whitespace runs to one space, and caps the length.
pub fn clean_message(input: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_chars));
    let mut esc: Option<Escape> = None;
    let mut pending_space = false;
    let mut kept = 0usize;

    for c in input.chars() {
        match esc {
            Some(Escape::Start) => {
                esc = match c {
                    '[' => Some(Escape::Csi),
                    ']' => Some(Escape::Osc),
                    _ => None,
                };
                continue;
            }
            Some(Escape::Csi) => {
                if ('@'..='~').contains(&c) {
                    esc = None;
                }
                continue;
            }
            Some(Escape::Osc) => {
                if c == '\x07' || c == '\\' {
                    esc = None;
                }
                continue;
            }
            None => {}
        }

        if c == '\x1b' {
            esc = Some(Escape::Start);
            continue;
        }
        if c.is_whitespace() {
            pending_space = kept > 0;
            continue;
        }
        if c.is_control() || is_bidi_control(c) {
            continue;
        }
        if kept >= max_chars {
            out.push('…');
            return out;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
        kept += 1;
    }
    out
}

pub fn clean(input: &str) -> String {
    clean_message(input, MAX_MESSAGE_CHARS)
}

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{061C}' | '\u{200E}' | '\u{200F}')
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}
