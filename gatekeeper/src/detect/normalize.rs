//! Transcript normalization: strip characters that are noise for keyword
//! matching — non-BMP codepoints, musical symbols, and emoji
//! (SPEC_FULL.md §4.3 step 6c).

pub fn normalize_transcript(text: &str) -> String {
    text.chars().filter(|c| !is_noise_char(*c)).collect::<String>().trim().to_string()
}

fn is_noise_char(c: char) -> bool {
    let cp = c as u32;
    cp > 0xFFFF // non-BMP: covers most emoji and supplementary musical symbols
        || (0x2669..=0x266F).contains(&cp) // BMP musical symbols (e.g. ♩♪♫♬)
        || (0x2600..=0x27BF).contains(&cp) // BMP misc symbols, dingbats, and emoji-adjacent glyphs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_plain_chinese_text_untouched() {
        assert_eq!(normalize_transcript("欢迎加入我们的频道"), "欢迎加入我们的频道");
    }

    #[test]
    fn strips_supplementary_emoji() {
        assert_eq!(normalize_transcript("加群🎉了"), "加群了");
    }

    #[test]
    fn strips_bmp_musical_symbols() {
        assert_eq!(normalize_transcript("♪背景音乐♪"), "背景音乐");
    }

    #[test]
    fn strips_bmp_dingbats() {
        assert_eq!(normalize_transcript("注意☎联系我们"), "注意联系我们");
    }

    #[test]
    fn trims_surrounding_whitespace_left_after_stripping() {
        assert_eq!(normalize_transcript("  你好  "), "你好");
    }
}
