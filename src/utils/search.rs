//! Normalization used by clan search.
//!
//! Clan names are matched case- and accent-insensitively. Normalized forms
//! are produced at write time and stored next to the display name so the
//! database can do a plain prefix LIKE over them.

/// Lowercases the value and folds latin diacritics to their base letter.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_char)
        .collect()
}

/// Produces the LIKE pattern matching names starting with the term
pub fn prefix_pattern(term: &str) -> String {
    let mut pattern = normalize(term);
    pattern.push('%');
    pattern
}

fn fold_char(value: char) -> char {
    match value {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'į' => 'i',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ŕ' | 'ř' => 'r',
        'ś' | 'š' => 's',
        'ť' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::{normalize, prefix_pattern};

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Üñîçõdé"), "unicode");
        assert_eq!(normalize("The WARBAND"), "the warband");
        assert_eq!(normalize("šŤřmen"), "strmen");
    }

    #[test]
    fn test_prefix_pattern() {
        assert_eq!(prefix_pattern("Ünì"), "uni%");
    }
}
