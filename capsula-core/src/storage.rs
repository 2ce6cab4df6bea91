//! Export of capsule records as delimited text.
//!
//! Every logged tick is written to its own file `<dir>/<tick:020>.csv` with the header
//! `id,p1x,p1y,p1z,p2x,p2y,p2z` followed by one row per capsule.
//! Files of previous ticks are never touched again.
use std::io::Write;
use std::path::{Path, PathBuf};

use capsula_building_blocks::Capsule;
use capsula_concepts::StorageError;
use serde::{Deserialize, Serialize};

/// Header line of every exported file
pub const CSV_HEADER: &str = "id,p1x,p1y,p1z,p2x,p2y,p2z";

/// Formats one capsule as `id,p1x,p1y,p1z,p2x,p2y,p2z`.
///
/// ```
/// # use capsula_building_blocks::*;
/// # use capsula_core::storage::format_record;
/// use nalgebra::Vector3;
/// let capsule = Capsule::new(
///     CapsuleId(3),
///     [Vector3::new(1.0, 2.0, 0.5), Vector3::new(3.25, 2.0, 0.5)],
///     CapsuleParameters::default(),
/// )?;
/// assert_eq!(format_record(&capsule), "3,1,2,0.5,3.25,2,0.5");
/// # Ok::<(), capsula_concepts::SetupError>(())
/// ```
pub fn format_record(capsule: &Capsule) -> String {
    let [p1, p2] = capsule.endpoints();
    format!(
        "{},{},{},{},{},{},{}",
        capsule.id(),
        p1.x,
        p1.y,
        p1.z,
        p2.x,
        p2.y,
        p2.z
    )
}

/// Writes one csv file per logged tick into a directory.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CsvExporter {
    /// Storage path.
    pub path: PathBuf,
}

impl CsvExporter {
    /// Creates the directory if it does not exist yet.
    pub fn open_or_create(location: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = location.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        Ok(CsvExporter { path })
    }

    /// Path of the file which stores the given tick.
    pub fn tick_path(&self, tick: u64) -> PathBuf {
        self.path.join(format!("{:020.0}", tick)).with_extension("csv")
    }

    /// Writes all capsules of one tick and returns the path of the created file.
    pub fn write_tick(&self, tick: u64, capsules: &[Capsule]) -> Result<PathBuf, StorageError> {
        let save_path = self.tick_path(tick);
        let file = std::fs::File::create(&save_path)?;
        let mut writer = std::io::BufWriter::new(file);
        writeln!(writer, "{}", CSV_HEADER)?;
        for capsule in capsules.iter() {
            writeln!(writer, "{}", format_record(capsule))?;
        }
        writer.flush()?;
        Ok(save_path)
    }
}
