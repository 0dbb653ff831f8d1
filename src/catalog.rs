use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::models::{CatalogOptions, FileDescriptor, SchoolYear};

/// Derives a descriptor from a `<year>_<District_Name>_<subject>.csv` filename.
pub fn parse_filename(name: &str) -> Option<FileDescriptor> {
    let stem = name.strip_suffix(".csv")?;
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return None;
    }

    let year = parts[0];
    let subject = parts[parts.len() - 1];
    let district = parts[1..parts.len() - 1]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    if year.is_empty() || subject.is_empty() || district.is_empty() {
        return None;
    }

    Some(FileDescriptor {
        filename: name.to_string(),
        year: year.to_string(),
        district,
        subject: subject.to_string(),
    })
}

pub fn scan_dir(dir: &Path) -> anyhow::Result<Vec<FileDescriptor>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read data directory {}", dir.display()))?;
    let mut descriptors = Vec::new();

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(file = ?raw, "skipping file with non-utf8 name");
                continue;
            }
        };
        if !name.ends_with(".csv") {
            continue;
        }

        match parse_filename(&name) {
            Some(descriptor) => descriptors.push(descriptor),
            None => warn!(file = %name, "skipping csv with unrecognized name"),
        }
    }

    descriptors.sort_by(|a, b| a.filename.cmp(&b.filename));
    debug!(count = descriptors.len(), dir = %dir.display(), "scanned data directory");
    Ok(descriptors)
}

/// Loads a catalog from a data directory or a `files.json` manifest.
///
/// Returns the descriptors and the directory their filenames resolve against.
pub fn load_catalog(path: &Path) -> anyhow::Result<(Vec<FileDescriptor>, PathBuf)> {
    if path.is_dir() {
        return Ok((scan_dir(path)?, path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let descriptors: Vec<FileDescriptor> = serde_json::from_str(&raw)
        .with_context(|| format!("catalog {} is not a valid file manifest", path.display()))?;
    let data_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((descriptors, data_dir))
}

pub fn write_catalog(path: &Path, descriptors: &[FileDescriptor]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(descriptors)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write catalog {}", path.display()))?;
    Ok(())
}

pub fn file_path_for(data_dir: &Path, descriptor: &FileDescriptor) -> PathBuf {
    data_dir.join(&descriptor.filename)
}

pub fn options(catalog: &[FileDescriptor]) -> CatalogOptions {
    let mut years: Vec<String> = catalog
        .iter()
        .map(|entry| entry.year.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    years.sort_by(|a, b| match (a.parse::<SchoolYear>(), b.parse::<SchoolYear>()) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        _ => a.cmp(b),
    });

    let districts = catalog
        .iter()
        .map(|entry| entry.district.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let subjects = catalog
        .iter()
        .map(|entry| entry.subject.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    CatalogOptions {
        years,
        districts,
        subjects,
    }
}

/// Picks the catalog entries for one year, one subject and a set of districts,
/// in catalog order.
pub fn resolve(
    catalog: &[FileDescriptor],
    year: &str,
    subject: &str,
    districts: &[String],
) -> Vec<FileDescriptor> {
    catalog
        .iter()
        .filter(|entry| {
            entry.year == year
                && entry.subject == subject
                && districts.iter().any(|district| *district == entry.district)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(year: &str, district: &str, subject: &str) -> FileDescriptor {
        FileDescriptor {
            filename: format!("{}_{}_{}.csv", year, district.replace(' ', "_"), subject),
            year: year.to_string(),
            district: district.to_string(),
            subject: subject.to_string(),
        }
    }

    fn sample_catalog() -> Vec<FileDescriptor> {
        vec![
            descriptor("2018-2019", "Waterford School District", "ELA"),
            descriptor("2018-2019", "Waterford School District", "Mathematics"),
            descriptor("2018-2019", "West Bloomfield School District", "ELA"),
            descriptor("2019-2020", "Academy of Southfield", "ELA"),
            descriptor("2019-2020", "Waterford School District", "ELA"),
            descriptor("2018-2019", "Academy of Waterford", "ELA"),
        ]
    }

    #[test]
    fn parses_multi_word_district_filenames() {
        let parsed = parse_filename("2019-2020_AGBU_Alex_Marie_Manoogian_School_Mathematics.csv")
            .unwrap();
        assert_eq!(parsed.year, "2019-2020");
        assert_eq!(parsed.district, "AGBU Alex Marie Manoogian School");
        assert_eq!(parsed.subject, "Mathematics");
        assert_eq!(
            parsed.filename,
            "2019-2020_AGBU_Alex_Marie_Manoogian_School_Mathematics.csv"
        );
    }

    #[test]
    fn rejects_filenames_without_district() {
        assert!(parse_filename("2019-2020_ELA.csv").is_none());
        assert!(parse_filename("2019-2020__ELA.csv").is_none());
        assert!(parse_filename("2019-2020_Waterford_ELA.txt").is_none());
    }

    #[test]
    fn resolve_matches_year_subject_and_district_set() {
        let catalog = sample_catalog();
        let districts = vec![
            "Waterford School District".to_string(),
            "Academy of Waterford".to_string(),
        ];

        let resolved = resolve(&catalog, "2018-2019", "ELA", &districts);
        assert_eq!(
            resolved,
            vec![catalog[0].clone(), catalog[5].clone()],
            "catalog order is preserved"
        );

        for entry in &catalog {
            let matches = entry.year == "2018-2019"
                && entry.subject == "ELA"
                && districts.contains(&entry.district);
            let count = resolved.iter().filter(|r| *r == entry).count();
            assert_eq!(count, usize::from(matches));
        }
    }

    #[test]
    fn resolve_with_no_districts_is_empty() {
        assert!(resolve(&sample_catalog(), "2018-2019", "ELA", &[]).is_empty());
    }

    #[test]
    fn resolve_without_matches_is_empty() {
        let districts = vec!["Waterford School District".to_string()];
        assert!(resolve(&sample_catalog(), "2030-2031", "ELA", &districts).is_empty());
        assert!(resolve(&sample_catalog(), "2018-2019", "Science", &districts).is_empty());
    }

    #[test]
    fn options_are_sorted_and_distinct() {
        let opts = options(&sample_catalog());
        assert_eq!(opts.years, vec!["2018-2019", "2019-2020"]);
        assert_eq!(
            opts.districts,
            vec![
                "Academy of Southfield",
                "Academy of Waterford",
                "Waterford School District",
                "West Bloomfield School District",
            ]
        );
        assert_eq!(opts.subjects, vec!["ELA", "Mathematics"]);
    }

    #[test]
    fn scan_dir_indexes_csv_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2019-2020_Academy_of_Southfield_ELA.csv",
            "2018-2019_Waterford_School_District_Mathematics.csv",
            "notes.txt",
            "broken.csv",
        ] {
            std::fs::write(dir.path().join(name), "SchoolYear,PercentProficient\n").unwrap();
        }

        let descriptors = scan_dir(dir.path()).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].district, "Waterford School District");
        assert_eq!(descriptors[1].district, "Academy of Southfield");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn scan_dir_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let latin1 = OsStr::from_bytes(b"2018-2019_Caf\xe9_Academy_ELA.csv");
        std::fs::write(dir.path().join(latin1), "").unwrap();
        std::fs::write(dir.path().join("2018-2019_Waterford_ELA.csv"), "").unwrap();

        let descriptors = scan_dir(dir.path()).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].district, "Waterford");
    }

    #[test]
    fn manifest_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.json");
        let catalog = sample_catalog();

        write_catalog(&path, &catalog).unwrap();
        let (loaded, data_dir) = load_catalog(&path).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(data_dir, dir.path());
    }

    #[test]
    fn load_catalog_accepts_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2018-2019_Waterford_ELA.csv"), "").unwrap();

        let (loaded, data_dir) = load_catalog(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(data_dir, dir.path());
        assert_eq!(
            file_path_for(&data_dir, &loaded[0]),
            dir.path().join("2018-2019_Waterford_ELA.csv")
        );
    }

    #[test]
    fn load_catalog_reports_bad_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_catalog(&path).is_err());
    }
}
