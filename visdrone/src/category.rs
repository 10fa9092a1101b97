//! The category mapping from VisDrone ids to contiguous class indexes.

use crate::common::*;

/// The VisDrone object categories kept for training, in class index order.
pub const VISDRONE_CLASS_NAMES: [&str; 10] = [
    "pedestrian",
    "people",
    "bicycle",
    "car",
    "van",
    "truck",
    "tricycle",
    "awning-tricycle",
    "bus",
    "motor",
];

/// The VisDrone category id of ignored regions.
pub const VISDRONE_IGNORED_REGION_ID: u32 = 0;

/// One row of the mapping table.
///
/// A `null` target marks the source category as an ignored region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub source: u32,
    pub target: Option<usize>,
}

/// The result of looking up a source category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryLookup {
    Class(usize),
    Ignored,
    Unmapped,
}

/// The validated, ordered mapping table together with the target class names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CategoryMappingUnchecked", into = "CategoryMappingUnchecked")]
pub struct CategoryMapping {
    names: IndexSet<String>,
    table: IndexMap<u32, Option<usize>>,
}

/// The serialized form of [CategoryMapping] before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMappingUnchecked {
    pub names: Vec<String>,
    pub mapping: Vec<CategoryEntry>,
}

impl CategoryMapping {
    pub fn new<N, S>(names: N, entries: &[CategoryEntry]) -> Result<Self>
    where
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        ensure!(!names.is_empty(), "the class name list is empty");

        let num_names = names.len();
        let names: IndexSet<_> = names.into_iter().collect();
        ensure!(names.len() == num_names, "duplicated class names found");
        if let Some(name) = names.iter().find(|name| name.trim().is_empty()) {
            bail!("invalid class name '{}'", name);
        }

        let mut table = IndexMap::with_capacity(entries.len());
        for &CategoryEntry { source, target } in entries {
            if let Some(index) = target {
                ensure!(
                    index < names.len(),
                    "source category {} maps to class index {}, but only {} classes are declared",
                    source,
                    index,
                    names.len()
                );
            }
            let prev = table.insert(source, target);
            ensure!(
                prev.is_none(),
                "source category {} is mapped more than once",
                source
            );
        }

        let covered: HashSet<usize> = table.values().flatten().copied().collect();
        if let Some(index) = (0..names.len()).find(|index| !covered.contains(index)) {
            bail!(
                "class '{}' (index {}) has no source category",
                names[index],
                index
            );
        }

        Ok(Self { names, table })
    }

    /// The stock VisDrone-DET mapping.
    ///
    /// Category 0 (ignored regions) is dropped, categories 1 to 10 become class
    /// indexes 0 to 9, and category 11 ("others") is left unmapped.
    pub fn visdrone() -> Self {
        let ignored = CategoryEntry {
            source: VISDRONE_IGNORED_REGION_ID,
            target: None,
        };
        let classes = (0..VISDRONE_CLASS_NAMES.len()).map(|index| CategoryEntry {
            source: index as u32 + 1,
            target: Some(index),
        });
        let table = std::iter::once(ignored)
            .chain(classes)
            .map(|entry| (entry.source, entry.target))
            .collect();

        Self {
            names: VISDRONE_CLASS_NAMES
                .iter()
                .map(|&name| name.to_owned())
                .collect(),
            table,
        }
    }

    pub fn lookup(&self, source: u32) -> CategoryLookup {
        match self.table.get(&source) {
            Some(Some(index)) => CategoryLookup::Class(*index),
            Some(None) => CategoryLookup::Ignored,
            None => CategoryLookup::Unmapped,
        }
    }

    pub fn class_names(&self) -> &IndexSet<String> {
        &self.names
    }

    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    /// Iterates the table rows in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = CategoryEntry> + '_ {
        self.table
            .iter()
            .map(|(&source, &target)| CategoryEntry { source, target })
    }
}

impl Default for CategoryMapping {
    fn default() -> Self {
        Self::visdrone()
    }
}

impl TryFrom<CategoryMappingUnchecked> for CategoryMapping {
    type Error = Error;

    fn try_from(from: CategoryMappingUnchecked) -> Result<Self, Self::Error> {
        let CategoryMappingUnchecked { names, mapping } = from;
        Self::new(names, &mapping)
    }
}

impl From<CategoryMapping> for CategoryMappingUnchecked {
    fn from(from: CategoryMapping) -> Self {
        let mapping = from.entries().collect();
        Self {
            names: from.names.into_iter().collect(),
            mapping,
        }
    }
}

/// Extra filtering applied to boxes before they are mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Treat boxes with score 0 as ignored regions.
    #[serde(default = "default_true")]
    pub ignore_zero_score: bool,
    /// Drop boxes with an occlusion level above this value.
    #[serde(default)]
    pub max_occlusion: Option<u32>,
    /// Drop boxes with a truncation level above this value.
    #[serde(default)]
    pub max_truncation: Option<u32>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            ignore_zero_score: true,
            max_occlusion: None,
            max_truncation: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visdrone_mapping() {
        let mapping = CategoryMapping::visdrone();
        assert_eq!(mapping.num_classes(), 10);
        assert_eq!(mapping.lookup(0), CategoryLookup::Ignored);
        assert_eq!(mapping.lookup(1), CategoryLookup::Class(0));
        assert_eq!(mapping.lookup(2), CategoryLookup::Class(1));
        assert_eq!(mapping.lookup(10), CategoryLookup::Class(9));
        assert_eq!(mapping.lookup(11), CategoryLookup::Unmapped);
        assert_eq!(mapping.class_names()[7], "awning-tricycle");

        // the stock table passes validation
        let entries: Vec<_> = mapping.entries().collect();
        let rebuilt = CategoryMapping::new(VISDRONE_CLASS_NAMES, &entries).unwrap();
        assert_eq!(rebuilt, mapping);
    }

    #[test]
    fn mapping_validation() {
        let entry = |source, target| CategoryEntry { source, target };

        // index out of range
        assert!(CategoryMapping::new(["a", "b"], &[entry(1, Some(0)), entry(2, Some(2))]).is_err());
        // duplicated source
        assert!(CategoryMapping::new(["a"], &[entry(1, Some(0)), entry(1, None)]).is_err());
        // uncovered class
        assert!(CategoryMapping::new(["a", "b"], &[entry(1, Some(0))]).is_err());
        // duplicated names
        assert!(CategoryMapping::new(["a", "a"], &[entry(1, Some(0))]).is_err());
        // empty names
        assert!(CategoryMapping::new(Vec::<String>::new(), &[]).is_err());

        // many-to-one is allowed
        let mapping =
            CategoryMapping::new(["vehicle"], &[entry(4, Some(0)), entry(5, Some(0)), entry(0, None)])
                .unwrap();
        assert_eq!(mapping.lookup(5), CategoryLookup::Class(0));
        assert_eq!(mapping.lookup(0), CategoryLookup::Ignored);
        assert_eq!(mapping.lookup(1), CategoryLookup::Unmapped);
    }

    #[test]
    fn mapping_serde() {
        let text = r#"{
            names: ["person", "car"],
            mapping: [
                { source: 0, target: null },
                { source: 1, target: 0 },
                { source: 4, target: 1 },
            ],
        }"#;
        let mapping: CategoryMapping = json5::from_str(text).unwrap();
        assert_eq!(mapping.lookup(4), CategoryLookup::Class(1));

        let invalid = r#"{ names: ["person"], mapping: [{ source: 1, target: 3 }] }"#;
        assert!(json5::from_str::<CategoryMapping>(invalid).is_err());
    }
}
