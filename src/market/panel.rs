//! Valid panel ("pana") combinations per panel kind.
//!
//! The listing collaborator is the source of truth; [`PanelCatalog::standard`]
//! builds the conventional chart for deployments that do not publish one.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    Single,
    Double,
    Triple,
}

impl PanelKind {
    pub const ALL: [PanelKind; 3] = [PanelKind::Single, PanelKind::Double, PanelKind::Triple];
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelCatalog {
    entries: HashMap<PanelKind, HashSet<String>>,
}

impl PanelCatalog {
    /// Catalog from an externally supplied table.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PanelKind, Vec<S>)>,
        S: Into<String>,
    {
        let mut catalog = Self::default();
        for (kind, values) in entries {
            catalog
                .entries
                .entry(kind)
                .or_default()
                .extend(values.into_iter().map(Into::into));
        }
        catalog
    }

    /// The conventional chart: digits ranked 1..9 then 0, each panel written
    /// in ascending rank. Single = all distinct (120), double = exactly one
    /// pair (90), triple = all equal (10).
    pub fn standard() -> Self {
        const ORDER: [u8; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 0];

        let mut single = HashSet::new();
        let mut double = HashSet::new();
        let mut triple = HashSet::new();

        for a in 0..ORDER.len() {
            for b in a..ORDER.len() {
                for c in b..ORDER.len() {
                    let panel = format!("{}{}{}", ORDER[a], ORDER[b], ORDER[c]);
                    match (a == b, b == c) {
                        (true, true) => triple.insert(panel),
                        (false, false) => single.insert(panel),
                        _ => double.insert(panel),
                    };
                }
            }
        }

        let mut entries = HashMap::new();
        entries.insert(PanelKind::Single, single);
        entries.insert(PanelKind::Double, double);
        entries.insert(PanelKind::Triple, triple);
        Self { entries }
    }

    pub fn contains(&self, kind: PanelKind, payload: &str) -> bool {
        self.entries
            .get(&kind)
            .map(|set| set.contains(payload))
            .unwrap_or(false)
    }

    /// Member of any panel kind (sangam legs accept all three).
    pub fn is_any_panel(&self, payload: &str) -> bool {
        PanelKind::ALL.iter().any(|k| self.contains(*k, payload))
    }

    pub fn len(&self, kind: PanelKind) -> usize {
        self.entries.get(&kind).map(HashSet::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashSet::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_chart_sizes() {
        let catalog = PanelCatalog::standard();
        assert_eq!(catalog.len(PanelKind::Single), 120);
        assert_eq!(catalog.len(PanelKind::Double), 90);
        assert_eq!(catalog.len(PanelKind::Triple), 10);
    }

    #[test]
    fn test_zero_ranks_last() {
        let catalog = PanelCatalog::standard();
        assert!(catalog.contains(PanelKind::Single, "190"));
        assert!(!catalog.contains(PanelKind::Single, "019"));
        assert!(catalog.contains(PanelKind::Double, "100"));
        assert!(catalog.contains(PanelKind::Triple, "000"));
    }

    #[test]
    fn test_kinds_are_disjoint() {
        let catalog = PanelCatalog::standard();
        assert!(catalog.contains(PanelKind::Double, "112"));
        assert!(!catalog.contains(PanelKind::Single, "112"));
        assert!(!catalog.contains(PanelKind::Triple, "112"));
        assert!(catalog.is_any_panel("112"));
        assert!(!catalog.is_any_panel("321"));
    }

    #[test]
    fn test_external_table_replaces_chart() {
        let catalog = PanelCatalog::from_entries(vec![(PanelKind::Single, vec!["321"])]);
        assert!(catalog.contains(PanelKind::Single, "321"));
        assert!(!catalog.contains(PanelKind::Single, "123"));
        assert_eq!(catalog.len(PanelKind::Triple), 0);
    }
}
