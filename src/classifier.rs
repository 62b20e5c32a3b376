// Cell classification.
//
// Status cells in the source spreadsheets are free text typed by hand:
// "1", "Instalada", "instalado 03/24", "NO APLICA", blanks, and the odd
// "nan" left over from earlier exports. Anything containing "instalad"
// counts as installed.
use crate::types::{AmbiguityPolicy, CellMatch, NormStatus};

const INSTALLED_MARKER: &str = "instalad";
const NOT_APPLICABLE_MARKER: &str = "no aplica";

/// Run both substring tests on a raw cell value.
///
/// Blank-like values ("", "nan", "none") match neither test.
pub fn match_cell(raw: Option<&str>) -> CellMatch {
    let Some(raw) = raw else {
        return CellMatch::default();
    };
    let v = raw.trim().to_lowercase();
    if v.is_empty() || v == "nan" || v == "none" {
        return CellMatch::default();
    }
    CellMatch {
        installed: v == "1" || v.contains(INSTALLED_MARKER),
        not_applicable: v.contains(NOT_APPLICABLE_MARKER),
    }
}

/// Classify a cell with the default installed-first resolution.
pub fn classify(raw: Option<&str>) -> NormStatus {
    status_of(match_cell(raw))
}

/// Collapse both tests into one status. A cell matching both is installed.
pub fn status_of(m: CellMatch) -> NormStatus {
    if m.installed {
        NormStatus::Installed
    } else if m.not_applicable {
        NormStatus::NotApplicable
    } else {
        NormStatus::Pending
    }
}

/// Whether the cell counts toward progress (installed or not applicable).
pub fn is_completed(m: CellMatch) -> bool {
    m.installed || m.not_applicable
}

/// Contribution of one cell to the (installed, not applicable) buckets.
pub fn bucket_counts(m: CellMatch, policy: AmbiguityPolicy) -> (usize, usize) {
    match policy {
        AmbiguityPolicy::InstalledPriority => match status_of(m) {
            NormStatus::Installed => (1, 0),
            NormStatus::NotApplicable => (0, 1),
            _ => (0, 0),
        },
        AmbiguityPolicy::IndependentAccumulation => {
            (m.installed as usize, m.not_applicable as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_like_values_are_pending() {
        assert_eq!(classify(None), NormStatus::Pending);
        assert_eq!(classify(Some("")), NormStatus::Pending);
        assert_eq!(classify(Some("   ")), NormStatus::Pending);
        assert_eq!(classify(Some("nan")), NormStatus::Pending);
        assert_eq!(classify(Some("None")), NormStatus::Pending);
        assert_eq!(classify(Some("NaN ")), NormStatus::Pending);
    }

    #[test]
    fn installed_variants() {
        assert_eq!(classify(Some("1")), NormStatus::Installed);
        assert_eq!(classify(Some(" 1 ")), NormStatus::Installed);
        assert_eq!(classify(Some("Instalada")), NormStatus::Installed);
        assert_eq!(classify(Some("INSTALADO")), NormStatus::Installed);
        assert_eq!(classify(Some("instalado el 12/03")), NormStatus::Installed);
        // "10" is not "1".
        assert_eq!(classify(Some("10")), NormStatus::Pending);
    }

    #[test]
    fn not_applicable_variants() {
        assert_eq!(classify(Some("no aplica")), NormStatus::NotApplicable);
        assert_eq!(classify(Some("NO APLICA")), NormStatus::NotApplicable);
        assert_eq!(
            classify(Some("No aplica (modelo antiguo)")),
            NormStatus::NotApplicable
        );
    }

    #[test]
    fn unrecognised_text_is_pending() {
        assert_eq!(classify(Some("pendiente")), NormStatus::Pending);
        assert_eq!(classify(Some("0")), NormStatus::Pending);
        assert_eq!(classify(Some("x")), NormStatus::Pending);
    }

    #[test]
    fn ambiguous_cell_resolution() {
        let m = match_cell(Some("instalada / no aplica"));
        assert!(m.installed && m.not_applicable);
        assert_eq!(status_of(m), NormStatus::Installed);
        assert_eq!(bucket_counts(m, AmbiguityPolicy::InstalledPriority), (1, 0));
        assert_eq!(
            bucket_counts(m, AmbiguityPolicy::IndependentAccumulation),
            (1, 1)
        );
        assert!(is_completed(m));
    }

    proptest! {
        #[test]
        fn classification_never_yields_unavailable(s in ".*") {
            let st = classify(Some(s.as_str()));
            prop_assert!(st != NormStatus::Unavailable);
        }

        #[test]
        fn priority_buckets_are_exclusive(s in "(1|instalad[ao]|no aplica|nan|x| ){0,3}") {
            let m = match_cell(Some(s.as_str()));
            let (i, n) = bucket_counts(m, AmbiguityPolicy::InstalledPriority);
            prop_assert!(i + n <= 1);
            prop_assert_eq!(i + n == 1, is_completed(m));
        }
    }
}
