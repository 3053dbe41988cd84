//! TIMIT-to-CMU phoneme name mapping, used only for reporting.

/// `(timit_symbol, cmu_symbol)`. Not exhaustive of the full TIMIT 61-phone
/// set; covers the common core used in confusion-matrix labeling.
pub static TIMIT_TO_CMU: &[(&str, &str)] = &[
    ("aa", "AA"),
    ("ae", "AE"),
    ("ah", "AH"),
    ("ao", "AO"),
    ("aw", "AW"),
    ("ax", "AH"),
    ("ay", "AY"),
    ("b", "B"),
    ("ch", "CH"),
    ("d", "D"),
    ("dh", "DH"),
    ("dx", "D"),
    ("eh", "EH"),
    ("er", "ER"),
    ("ey", "EY"),
    ("f", "F"),
    ("g", "G"),
    ("hh", "HH"),
    ("ih", "IH"),
    ("iy", "IY"),
    ("jh", "JH"),
    ("k", "K"),
    ("l", "L"),
    ("m", "M"),
    ("n", "N"),
    ("ng", "NG"),
    ("ow", "OW"),
    ("oy", "OY"),
    ("p", "P"),
    ("r", "R"),
    ("s", "S"),
    ("sh", "SH"),
    ("sil", "SIL"),
    ("t", "T"),
    ("th", "TH"),
    ("uh", "UH"),
    ("uw", "UW"),
    ("v", "V"),
    ("w", "W"),
    ("y", "Y"),
    ("z", "Z"),
    ("zh", "ZH"),
];

/// Look up the CMU symbol for a TIMIT phoneme name, case-insensitively.
pub fn to_cmu(timit: &str) -> Option<&'static str> {
    TIMIT_TO_CMU
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(timit))
        .map(|(_, c)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_phoneme_maps() {
        assert_eq!(to_cmu("sh"), Some("SH"));
        assert_eq!(to_cmu("SH"), Some("SH"));
    }

    #[test]
    fn unknown_phoneme_is_none() {
        assert_eq!(to_cmu("nonexistent"), None);
    }
}
