use phf::phf_map;
use unicode_normalization::UnicodeNormalization;

static ND_CHARMAP: phf::Map<char, &'static str> = phf_map! {
    'Æ' => "AE",
    'æ' => "ae",
    'Ð' => "D",
    'ð' => "d",
    'Ø' => "O",
    'ø' => "o",
    'Þ' => "Th",
    'þ' => "th",
    'ß' => "ss",
    'Đ' => "D",
    'đ' => "d",
    'Ħ' => "H",
    'ħ' => "h",
    'ı' => "i",
    'ĸ' => "k",
    'Ł' => "L",
    'ł' => "l",
    'Ŋ' => "N",
    'ŋ' => "n",
    'Œ' => "Oe",
    'œ' => "oe",
    'Ŧ' => "T",
    'ŧ' => "t",
};

/// Decomposes text and keeps only its ASCII part, characters without
/// a decomposition are mapped through `ND_CHARMAP` or dropped.
pub fn remove_diacritics(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.nfkd() {
        if let Some(mapped) = ND_CHARMAP.get(&c) {
            result.push_str(mapped);
        } else if c.is_ascii() {
            result.push(c);
        } else if c.is_alphabetic() {
            result.push(' ');
        }
    }

    result
}

/// URL safe identifier derived from a human readable name.
///
/// Result contains only `[a-z0-9-]`, runs of other characters collapse into
/// a single `-` and there is no leading or trailing `-`.
pub fn slugify(text: &str) -> String {
    let ascii = remove_diacritics(text).to_ascii_lowercase();
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_remove_diacritics() {
        assert_eq!(remove_diacritics("Æ"), "AE");
        assert_eq!(remove_diacritics("æ"), "ae");
        assert_eq!(remove_diacritics("Œ"), "Oe");
        assert_eq!(remove_diacritics("Žluťoučký kůň"), "Zlutoucky kun");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Sci-Fi"), "sci-fi");
        assert_eq!(slugify("Fantasy"), "fantasy");
        assert_eq!(slugify("Detektivky a thrillery"), "detektivky-a-thrillery");
        assert_eq!(slugify("  Pán prstenů: Společenstvo!  "), "pan-prstenu-spolecenstvo");
        assert_eq!(slugify("Ærø & Œuvre"), "aero-oeuvre");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify(""), "");
    }

    #[quickcheck]
    fn slug_has_only_safe_chars(text: String) -> bool {
        let slug = slugify(&text);
        slug.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !slug.starts_with('-')
            && !slug.ends_with('-')
            && !slug.contains("--")
    }

    #[quickcheck]
    fn slugify_is_idempotent(text: String) -> bool {
        let slug = slugify(&text);
        slugify(&slug) == slug
    }
}
