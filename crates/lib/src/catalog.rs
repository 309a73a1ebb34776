//! Standard queries: canned clinical-review questions grouped by category.
//!
//! Read-only. Picking one hands it to the chat page through
//! [`crate::routing::Navigator::navigate_with_query`].

/// Category name → queries, in display order.
pub type CatalogEntries = &'static [(&'static str, &'static [&'static str])];

static STANDARD: CatalogEntries = &[
    (
        "Patient Disposition",
        &[
            "Summarize frequency count for treatment discontinuation",
            "Cross verify reasons of discontinuation to respective pages",
        ],
    ),
    (
        "AE/CM",
        &["Any AE with action taken as medication given should have CM reported"],
    ),
    (
        "AE/Dosing",
        &["Any AE with action taken as medication given should have dose modification reported"],
    ),
    ("Baseline Characterstics", &[]),
    (
        "I/E Criteria",
        &["Review MH relavant to MH (Protocol dependent)"],
    ),
    ("RECIST Assessment", &[]),
    (
        "AE/MH",
        &[
            "All the AE's related to MH should be reported as worsening of MH condition",
            "Review all AE terms to determine if they represent the baseline medical history",
            "All AE's reported before first dose should be reported as MH unless related to study specific procedures",
            "Create a table where start date of an AE is before first dose, also print medical history table for the respective patient",
            "Review the AE table and respective medical history table to check of any AE listed in table are reported in MH or not and report accordingly",
        ],
    ),
    (
        "ECG",
        &[
            "Any ECG labled as abnormal and clinically significant after date of first dosing should be reported on AE page",
            "Any ECG labled as abnormal and clinically significant before date of dosing should be reported on MH page",
        ],
    ),
    (
        "Lab/AE Page",
        &["All Lab abnormalities with clinical significance should be reported as AE"],
    ),
    (
        "Prior Therapies",
        &["Ensure lines of prior therapy are logical - Regimen Number, Agent, Number of Cycles, Treatment Duration "],
    ),
    (
        "AE",
        &["For AE with Grade = 5  or Outcome = fatal: (1) Ensure there is only one such AE (2) Outcome is fatal but none of the CTCAE Grade = 5(3) Death Form recorded"],
    ),
];

/// One category after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatches {
    pub category: &'static str,
    pub queries: Vec<&'static str>,
}

impl CategoryMatches {
    /// "1 query" / "N queries".
    pub fn count_label(&self) -> String {
        match self.queries.len() {
            1 => "1 query".to_string(),
            n => format!("{} queries", n),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    entries: CatalogEntries,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    pub const fn new(entries: CatalogEntries) -> Self {
        Self { entries }
    }

    /// The shipped clinical-review catalog.
    pub const fn standard() -> Self {
        Self::new(STANDARD)
    }

    pub fn categories(&self) -> impl Iterator<Item = &'static str> {
        let entries: CatalogEntries = self.entries;
        entries.iter().map(|(c, _)| *c)
    }

    pub fn get(&self, category: &str) -> Option<&'static [&'static str]> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, q)| *q)
    }

    /// Categories whose queries contain `term` (case-insensitive), keeping only the
    /// matching queries. Categories left empty are dropped; a blank term keeps every
    /// non-empty category.
    pub fn filter(&self, term: &str) -> Vec<CategoryMatches> {
        let needle = term.trim().to_lowercase();
        self.entries
            .iter()
            .map(|&(category, queries)| CategoryMatches {
                category,
                queries: queries
                    .iter()
                    .copied()
                    .filter(|q| needle.is_empty() || q.to_lowercase().contains(&needle))
                    .collect(),
            })
            .filter(|m| !m.queries.is_empty())
            .collect()
    }

    /// Flattened `filter(term)` in display order, for numbered pickers.
    pub fn flat(&self, term: &str) -> Vec<(&'static str, &'static str)> {
        self.filter(term)
            .into_iter()
            .flat_map(|m| m.queries.into_iter().map(move |q| (m.category, q)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TWO: CatalogEntries = &[
        ("Demographics", &["List sites", "Count patients by sex"]),
        ("Safety", &["Show serious adverse events", "List deaths"]),
    ];

    #[test]
    fn single_match_across_two_categories() {
        let got = Catalog::new(TWO).filter("SERIOUS");
        assert_eq!(
            got,
            vec![CategoryMatches {
                category: "Safety",
                queries: vec!["Show serious adverse events"],
            }]
        );
    }

    #[test]
    fn no_match_is_empty() {
        assert!(Catalog::new(TWO).filter("xyzzy").is_empty());
    }

    #[test]
    fn blank_term_keeps_non_empty_categories() {
        let all = Catalog::standard().filter("  ");
        assert_eq!(all.len(), 9);
        assert!(all.iter().all(|m| m.category != "RECIST Assessment"));
        assert_eq!(Catalog::standard().categories().count(), 11);
    }

    #[test]
    fn matches_keep_order() {
        let got = Catalog::new(TWO).filter("list");
        let cats: Vec<_> = got.iter().map(|m| m.category).collect();
        assert_eq!(cats, ["Demographics", "Safety"]);
        assert_eq!(got[0].count_label(), "1 query");
        assert_eq!(
            Catalog::new(TWO).flat("list"),
            vec![("Demographics", "List sites"), ("Safety", "List deaths")]
        );
    }

    #[test]
    fn standard_lookup() {
        let ecg = Catalog::standard().get("ECG").unwrap();
        assert_eq!(ecg.len(), 2);
        assert!(Catalog::standard().get("Vitals").is_none());
        let ae_mh = Catalog::standard().filter("medical history");
        assert_eq!(ae_mh.len(), 1);
        assert_eq!(ae_mh[0].category, "AE/MH");
        assert_eq!(ae_mh[0].count_label(), "3 queries");
    }
}
