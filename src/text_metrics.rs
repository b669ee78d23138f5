use unicode_normalization::UnicodeNormalization as _;

/// The two weights of the standard Helvetica font the catalogue is set in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
}

impl FontWeight {
    /// The PostScript name of the standard 14 font.
    pub fn base_font(self) -> &'static str {
        match self {
            FontWeight::Regular => "Helvetica",
            FontWeight::Bold => "Helvetica-Bold",
        }
    }

    /// The name of the font resource in the page dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            FontWeight::Regular => "F1",
            FontWeight::Bold => "F2",
        }
    }
}

// Advance widths in 1/1000 em of the printable ASCII range, from the Adobe font metrics.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const DEFAULT_WIDTH: u16 = 556;
const COPYRIGHT_WIDTH: u16 = 737;
const POINTS_PER_MILLIMETER: f32 = 2.834_646;

fn glyph_width(character: char, weight: FontWeight) -> u16 {
    let table = match weight {
        FontWeight::Regular => &HELVETICA_WIDTHS,
        FontWeight::Bold => &HELVETICA_BOLD_WIDTHS,
    };
    match character {
        ' '..='~' => table[character as usize - ' ' as usize],
        '©' | '®' => COPYRIGHT_WIDTH,
        _ => DEFAULT_WIDTH,
    }
}

/// The width in millimeters of a single line of text set at `font_size` points.
pub fn text_width(text: &str, weight: FontWeight, font_size: f32) -> f32 {
    let units: u32 = text
        .nfc()
        .map(|character| glyph_width(character, weight) as u32)
        .sum();

    units as f32 / 1000.0 * font_size / POINTS_PER_MILLIMETER
}

/// Breaks `text` into lines no wider than `max_width` millimeters, at whitespace when possible
/// and inside a word only when that word alone does not fit.
pub fn split_text_to_size(
    text: &str,
    weight: FontWeight,
    font_size: f32,
    max_width: f32,
) -> Vec<String> {
    let fits = |line: &str| text_width(line, weight, font_size) <= max_width;
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        let candidate = if current_line.is_empty() {
            word.to_string()
        } else {
            format!("{current_line} {word}")
        };
        if fits(&candidate) {
            current_line = candidate;
            continue;
        }
        if !current_line.is_empty() {
            lines.push(std::mem::take(&mut current_line));
        }
        // A word wider than a whole line is broken by characters
        for character in word.chars() {
            current_line.push(character);
            if !fits(&current_line) && current_line.chars().count() > 1 {
                current_line.pop();
                lines.push(std::mem::take(&mut current_line));
                current_line.push(character);
            }
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}

/// Cuts `text` after `max_characters` characters and appends `...` when it was longer.
pub fn truncate_with_ellipsis(text: &str, max_characters: usize) -> String {
    if text.chars().count() <= max_characters {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_characters).collect();
    truncated.push_str("...");
    truncated
}

/// Encodes text for the WinAnsiEncoding of the standard fonts. Characters the encoding cannot
/// represent are replaced by `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.nfc()
        .map(|character| match character {
            ' '..='~' | '\u{a0}'..='\u{ff}' => character as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8a,
            '‹' => 0x8b,
            'Œ' => 0x8c,
            'Ž' => 0x8e,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9a,
            '›' => 0x9b,
            'œ' => 0x9c,
            'ž' => 0x9e,
            'Ÿ' => 0x9f,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_the_font_metrics() {
        // "Rs" in Helvetica-Bold: 722 + 556 units at 1000 points
        let width = text_width("Rs", FontWeight::Bold, 1000.0);
        assert!((width - 1278.0 / POINTS_PER_MILLIMETER).abs() < 1e-2);

        assert!(
            text_width("WWW", FontWeight::Regular, 12.0) > text_width("iii", FontWeight::Regular, 12.0)
        );
        assert!(
            text_width("Mug", FontWeight::Bold, 12.0) > text_width("Mug", FontWeight::Regular, 12.0)
        );
        assert_eq!(text_width("", FontWeight::Regular, 12.0), 0.0);
    }

    #[test]
    fn wrapping_keeps_lines_within_the_width() {
        let text = "PREMIUM PORCELAIN DINNER SET WITH GOLD RIM AND MATCHING SERVING BOWLS";
        let lines = split_text_to_size(text, FontWeight::Bold, 11.0, 90.0);

        assert!(lines.len() >= 2);
        for line in &lines {
            assert!(text_width(line, FontWeight::Bold, 11.0) <= 90.0, "{line}");
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn long_words_are_broken() {
        let word = "X".repeat(80);
        let lines = split_text_to_size(&word, FontWeight::Regular, 10.0, 20.0);

        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
        assert_eq!(split_text_to_size("", FontWeight::Regular, 10.0, 20.0), vec![""]);
    }

    #[test]
    fn ellipsis_after_twenty_characters() {
        assert_eq!(truncate_with_ellipsis("24 PCS", 20), "24 PCS");
        assert_eq!(
            truncate_with_ellipsis("144 PIECES IN 12 INNER BOXES", 20),
            "144 PIECES IN 12 INN..."
        );
    }

    #[test]
    fn win_ansi_encoding() {
        assert_eq!(encode_win_ansi("Rs 620.00"), b"Rs 620.00".to_vec());
        assert_eq!(encode_win_ansi("© 2026"), vec![0xa9, b' ', b'2', b'0', b'2', b'6']);
        assert_eq!(encode_win_ansi("café"), vec![b'c', b'a', b'f', 0xe9]);
        // A decomposed accent is composed first
        assert_eq!(encode_win_ansi("cafe\u{301}"), vec![b'c', b'a', b'f', 0xe9]);
        assert_eq!(encode_win_ansi("₹"), b"?".to_vec());
    }
}
