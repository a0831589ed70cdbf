use serde::Serialize;

/// CJK-dominant text needs more than 3 in 10 characters to be CJK.
const CJK_DOMINANT_NUM: usize = 3;
const CJK_DOMINANT_DEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Cjk,
    Latin,
}

impl ScriptKind {
    pub fn detect(text: &str) -> Self {
        if is_script_cjk(text) {
            ScriptKind::Cjk
        } else {
            ScriptKind::Latin
        }
    }

    pub fn normalize(self, text: &str) -> String {
        match self {
            ScriptKind::Cjk => normalize_cjk(text),
            ScriptKind::Latin => normalize_latin(text),
        }
    }
}

pub fn is_cjk_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3040..=0x309F
            | 0x30A0..=0x30FF
            | 0x31F0..=0x31FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xF900..=0xFAFF
            | 0x20000..=0x2EBEF
            | 0x2F800..=0x2FA1F
            | 0x30000..=0x3134F
    )
}

pub(crate) fn is_punct(ch: char) -> bool {
    ch.is_ascii_punctuation()
        || matches!(
            ch as u32,
            0x3000..=0x303F
                | 0x30FB
                | 0xFF01..=0xFF0F
                | 0xFF1A..=0xFF20
                | 0xFF3B..=0xFF40
                | 0xFF5B..=0xFF65
        )
}

pub fn is_script_cjk(text: &str) -> bool {
    let mut total = 0usize;
    let mut cjk = 0usize;
    for ch in text.chars() {
        total += 1;
        if is_cjk_char(ch) {
            cjk += 1;
        }
    }
    cjk > 0 && cjk * CJK_DOMINANT_DEN > total * CJK_DOMINANT_NUM
}

/// Drops line breaks outright and removes any whitespace run that touches a
/// CJK character or punctuation. Runs between two Latin tokens shrink to one
/// space.
pub fn normalize_cjk(text: &str) -> String {
    let chars: Vec<char> = text.chars().filter(|ch| !matches!(ch, '\n' | '\r')).collect();
    let mut out = String::with_capacity(text.len());
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if !ch.is_whitespace() {
            out.push(ch);
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < chars.len() && chars[idx].is_whitespace() {
            idx += 1;
        }
        let prev = start.checked_sub(1).map(|i| chars[i]);
        let next = chars.get(idx).copied();
        let (Some(prev), Some(next)) = (prev, next) else {
            continue;
        };
        let glued = |c: char| is_cjk_char(c) || is_punct(c);
        if !glued(prev) && !glued(next) {
            out.push(' ');
        }
    }
    out
}

pub fn normalize_latin(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
