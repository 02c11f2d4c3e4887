use crate::common::*;
use glob::glob;
use rayon::prelude::*;

/// One mocap recording of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MocapFile {
    pub path: PathBuf,
    /// Subject directory relative to the dataset root; empty when the
    /// recording sits directly under the dataset dir.
    pub subject: String,
    pub stem: String,
}

/// An indexed evaluation mocap dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MocapDataset {
    pub name: String,
    pub root: PathBuf,
    pub mocaps: Vec<MocapFile>,
}

impl MocapDataset {
    /// Scan `{mocap_base_dir}/{name}` for `*{mocap_ext}` recordings at any
    /// depth. The result is sorted by path so runs are reproducible.
    pub fn index(mocap_base_dir: &Path, name: &str, mocap_ext: &str) -> Result<Self> {
        let root = mocap_base_dir.join(name);
        ensure!(
            root.is_dir(),
            "mocap dataset {:?} not found under {}",
            name,
            mocap_base_dir.display()
        );

        let pattern = root.join("**").join(format!("*{}", mocap_ext));
        let pattern = pattern
            .to_str()
            .ok_or_else(|| format_err!("non-unicode mocap path {:?}", pattern))?;

        let mut mocaps = glob(pattern)?
            .map(|entry| {
                let path = entry?;
                let subject = path
                    .parent()
                    .and_then(|parent| parent.strip_prefix(&root).ok())
                    .map(|rel| rel.display().to_string())
                    .unwrap_or_default();
                let stem = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .ok_or_else(|| format_err!("non-unicode mocap name {:?}", path))?
                    .to_owned();
                Ok(MocapFile { path, subject, stem })
            })
            .collect::<Result<Vec<_>>>()?;
        mocaps.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(Self {
            name: name.to_owned(),
            root,
            mocaps,
        })
    }
}

/// Index every target dataset. Datasets are scanned in parallel but returned
/// in input order.
pub fn index_all(mocap_base_dir: &Path, names: &[String], mocap_ext: &str) -> Result<Vec<MocapDataset>> {
    let datasets = names
        .par_iter()
        .map(|name| {
            let dataset = MocapDataset::index(mocap_base_dir, name, mocap_ext)?;
            info!(
                "Found {} {} mocaps in dataset {}",
                dataset.mocaps.len(),
                mocap_ext,
                dataset.name
            );
            Ok(dataset)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(datasets)
}
