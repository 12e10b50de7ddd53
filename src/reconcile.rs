//! Links cover files an operator dropped into the covers directory by hand.

use std::path::Path;

use log::{info, warn};

use crate::catalog::{cover_filename, cover_reference, Catalog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedCover {
    pub title: String,
    pub author: String,
    pub filename: String,
}

/// A `coverImage` reference whose file is not in the covers directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCover {
    pub title: String,
    pub author: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub linked: Vec<LinkedCover>,
    pub missing: Vec<MissingCover>,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.linked.is_empty()
    }
}

/// Points `coverImage` at any expected cover file that exists, and lists
/// references to files that do not.
pub fn reconcile_manual_covers(
    catalog: &mut Catalog,
    covers_dir: &Path,
    cover_url_prefix: &str,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let prefix = format!("{}/", cover_url_prefix.trim_end_matches('/'));

    for (_, entry) in catalog.entries_mut() {
        let filename = cover_filename(entry);
        if covers_dir.join(&filename).exists() {
            let expected = cover_reference(cover_url_prefix, &filename);
            if entry.cover_image.as_deref() != Some(expected.as_str()) {
                info!("Linked manual cover for '{}': {}", entry.title, filename);
                entry.cover_image = Some(expected);
                report.linked.push(LinkedCover {
                    title: entry.title.clone(),
                    author: entry.author.clone(),
                    filename,
                });
            }
            continue;
        }

        let Some(reference) = entry.cover_image.as_deref().filter(|cover| !cover.is_empty())
        else {
            continue;
        };
        let referenced_name = reference.strip_prefix(&prefix).unwrap_or(reference);
        if !covers_dir.join(referenced_name).exists() {
            warn!(
                "'{}' references a missing cover: {}",
                entry.title, reference
            );
            report.missing.push(MissingCover {
                title: entry.title.clone(),
                author: entry.author.clone(),
                reference: reference.to_string(),
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::catalog::{CatalogEntry, CatalogPartition};
    use crate::resolver::test_support::unique_temp_dir;

    fn catalog(entries: Vec<CatalogEntry>) -> Catalog {
        Catalog::from_partitions(vec![(
            "2024".to_string(),
            CatalogPartition::Section {
                books: entries,
                extra: serde_json::Map::new(),
            },
        )])
    }

    #[test]
    fn test_links_existing_manual_cover() {
        let dir = unique_temp_dir("reconcile_link");
        fs::create_dir_all(&dir).expect("dir should be created");
        fs::write(dir.join("Unknown Pamphlet_J Doe.jpg"), b"jpeg").expect("cover fixture");
        let mut catalog = catalog(vec![CatalogEntry {
            cover_image: Some(String::new()),
            ..CatalogEntry::new("Unknown Pamphlet", "J. Doe", None)
        }]);

        let report = reconcile_manual_covers(&mut catalog, &dir, "/covers");
        assert!(report.changed());
        assert_eq!(report.linked[0].filename, "Unknown Pamphlet_J Doe.jpg");
        let (_, entry) = catalog.entries().next().expect("entry");
        assert_eq!(
            entry.cover_image.as_deref(),
            Some("/covers/Unknown Pamphlet_J Doe.jpg")
        );

        let again = reconcile_manual_covers(&mut catalog, &dir, "/covers");
        assert!(!again.changed());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_reports_references_to_missing_files() {
        let dir = unique_temp_dir("reconcile_missing");
        fs::create_dir_all(&dir).expect("dir should be created");
        fs::write(dir.join("elsewhere.jpg"), b"jpeg").expect("cover fixture");
        let mut catalog = catalog(vec![
            CatalogEntry {
                cover_image: Some("/covers/9780441013593.jpg".to_string()),
                ..CatalogEntry::new("Dune", "Frank Herbert", Some("9780441013593"))
            },
            CatalogEntry {
                cover_image: Some("/covers/elsewhere.jpg".to_string()),
                ..CatalogEntry::new("Other", "Someone", None)
            },
            CatalogEntry::new("Bare", "Nobody", None),
        ]);

        let report = reconcile_manual_covers(&mut catalog, &dir, "/covers");
        assert!(!report.changed());
        assert_eq!(
            report.missing,
            vec![MissingCover {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                reference: "/covers/9780441013593.jpg".to_string(),
            }]
        );

        let _ = fs::remove_dir_all(dir);
    }
}
