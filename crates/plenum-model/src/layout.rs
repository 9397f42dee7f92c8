use crate::ids::TermId;
use std::path::{Path, PathBuf};

/// Naming convention for the dataset files of one refresh. Logical paths
/// only: the source resolver decides between plain and compressed variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    data_dir: PathBuf,
}

impl DatasetLayout {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn roster(&self) -> PathBuf {
        self.data_dir.join("members.json")
    }

    #[must_use]
    pub fn activities(&self, term: TermId) -> PathBuf {
        self.data_dir.join(format!("activities_term{term}.json"))
    }

    #[must_use]
    pub fn amendments(&self, term: TermId) -> PathBuf {
        self.data_dir.join(format!("amendments_term{term}.json"))
    }
}
