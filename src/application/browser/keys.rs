//! Terminal key decoding for raw-mode input streams.

use std::iter::Peekable;
use std::str::Chars;

const ESC: char = '\u{1b}';
const CTRL_C: char = '\u{3}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
    CtrlC,
    Char(char),
    Unknown,
}

impl Key {
    pub fn is_quit(self) -> bool {
        matches!(self, Key::Esc | Key::CtrlC | Key::Char('q'))
    }

    pub fn is_up(self) -> bool {
        matches!(self, Key::Up | Key::Char('k'))
    }

    pub fn is_down(self) -> bool {
        matches!(self, Key::Down | Key::Char('j'))
    }

    pub fn is_left(self) -> bool {
        matches!(self, Key::Left | Key::Char('h'))
    }

    pub fn is_right(self) -> bool {
        matches!(self, Key::Right | Key::Char('l'))
    }
}

/// Decode one complete chunk of terminal input into keys.
///
/// A lone trailing ESC is reported as [`Key::Esc`]. Streams that may split
/// sequences across reads go through [`KeyDecoder`].
pub fn decode_keys(bytes: &[u8]) -> Vec<Key> {
    let text = String::from_utf8_lossy(bytes);
    let mut chars = text.chars().peekable();
    let mut keys = Vec::new();

    while let Some(ch) = chars.next() {
        let key = match ch {
            ESC => decode_escape(&mut chars),
            CTRL_C => Key::CtrlC,
            '\r' | '\n' => Key::Enter,
            ch if ch.is_control() => Key::Unknown,
            ch => Key::Char(ch),
        };
        keys.push(key);
    }

    keys
}

fn decode_escape(chars: &mut Peekable<Chars<'_>>) -> Key {
    match chars.peek() {
        Some('[') | Some('O') => {
            chars.next();
        }
        _ => return Key::Esc,
    }

    match chars.next() {
        Some('A') => Key::Up,
        Some('B') => Key::Down,
        Some('C') => Key::Right,
        Some('D') => Key::Left,
        Some(ch) if is_csi_final(ch) => Key::Unknown,
        Some(_) => {
            // Parameterised sequence such as `ESC [ 1 ; 5 A`: skip to its final byte.
            for ch in chars.by_ref() {
                if is_csi_final(ch) {
                    break;
                }
            }
            Key::Unknown
        }
        None => Key::Esc,
    }
}

fn is_csi_final(ch: char) -> bool {
    ('\u{40}'..='\u{7e}').contains(&ch)
}

/// Incremental decoder that holds back an unfinished escape sequence or
/// UTF-8 character until the next chunk arrives.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Vec<u8>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Key> {
        self.pending.extend_from_slice(bytes);
        let split = incomplete_tail_start(&self.pending);
        let tail = self.pending.split_off(split);
        let keys = decode_keys(&self.pending);
        self.pending = tail;
        keys
    }

    /// Decode whatever is held back, e.g. once no more bytes follow an ESC.
    pub fn flush(&mut self) -> Vec<Key> {
        let keys = decode_keys(&self.pending);
        self.pending.clear();
        keys
    }
}

fn incomplete_tail_start(bytes: &[u8]) -> usize {
    escape_tail_start(bytes)
        .unwrap_or(bytes.len())
        .min(utf8_tail_start(bytes))
}

fn escape_tail_start(bytes: &[u8]) -> Option<usize> {
    let start = bytes.iter().rposition(|&byte| byte == 0x1b)?;
    let rest = &bytes[start + 1..];
    let complete = match rest.first() {
        None => false,
        Some(b'O') => rest.len() >= 2,
        Some(b'[') => rest[1..].iter().any(|&byte| (0x40..=0x7e).contains(&byte)),
        Some(_) => true,
    };
    (!complete).then_some(start)
}

fn utf8_tail_start(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0xc0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xf0..=0xff => 4,
            0xe0..=0xef => 3,
            0xc0..=0xdf => 2,
            _ => 1,
        };
        return if width > back { len - back } else { len };
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_characters_decode_as_chars() {
        assert_eq!(
            decode_keys(b"jkxy"),
            vec![
                Key::Char('j'),
                Key::Char('k'),
                Key::Char('x'),
                Key::Char('y')
            ]
        );
    }

    #[test]
    fn arrow_sequences_decode() {
        assert_eq!(
            decode_keys(b"\x1b[A\x1b[B\x1b[C\x1b[D\x1bOA"),
            vec![Key::Up, Key::Down, Key::Right, Key::Left, Key::Up]
        );
    }

    #[test]
    fn lone_escape_and_ctrl_c() {
        assert_eq!(decode_keys(b"\x1b"), vec![Key::Esc]);
        assert_eq!(decode_keys(b"\x03"), vec![Key::CtrlC]);
        assert_eq!(decode_keys(b"\x1bq"), vec![Key::Esc, Key::Char('q')]);
    }

    #[test]
    fn unknown_sequences_are_skipped_whole() {
        assert_eq!(
            decode_keys(b"\x1b[1;5Aj\x1b[3~"),
            vec![Key::Unknown, Key::Char('j'), Key::Unknown]
        );
    }

    #[test]
    fn split_arrow_sequence_is_not_an_escape() {
        let mut decoder = KeyDecoder::new();
        assert!(decoder.feed(b"j\x1b").contains(&Key::Char('j')));
        assert!(decoder.has_pending());
        assert_eq!(decoder.feed(b"["), Vec::<Key>::new());
        assert_eq!(decoder.feed(b"A"), vec![Key::Up]);
        assert!(!decoder.has_pending());

        assert_eq!(decoder.feed(b"\x1b[1;"), Vec::<Key>::new());
        assert_eq!(decoder.feed(b"5Ak"), vec![Key::Unknown, Key::Char('k')]);
    }

    #[test]
    fn held_escape_flushes_as_esc() {
        let mut decoder = KeyDecoder::new();
        assert!(decoder.feed(b"\x1b").is_empty());
        assert_eq!(decoder.flush(), vec![Key::Esc]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn split_utf8_characters_are_reassembled() {
        let mut decoder = KeyDecoder::new();
        let bytes = "é".as_bytes();
        assert!(decoder.feed(&bytes[..1]).is_empty());
        assert_eq!(decoder.feed(&bytes[1..]), vec![Key::Char('é')]);
    }

    #[test]
    fn quit_keys() {
        assert!(Key::Char('q').is_quit());
        assert!(Key::Esc.is_quit());
        assert!(Key::CtrlC.is_quit());
        assert!(!Key::Char('x').is_quit());
    }
}
