use std::{
    fmt::Write as _,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use rstest::fixture;
use tempfile::TempDir;

use crate::{
    cache::Decoder,
    error::Result,
    io::dataset::{assemble, AssemblerParams, DataTable},
};

/// Two trajectories written as CSV tables plus tiny frames under a temporary root.
///
/// * `seq_a`: 4 frame pairs moving 1 unit along x.
/// * `seq_b`: 6 frame pairs turning 0.1 rad around z while moving 0.5 along x.
pub struct SampleDataset {
    dir: TempDir,
    pub input_columns: Vec<String>,
}

impl SampleDataset {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn assemble(&self, trajectory_ids: &[&str]) -> DataTable {
        let ids = trajectory_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<String>>();
        assemble(self.root(), &ids, "df.csv", &self.input_columns).unwrap()
    }

    /// Params training on `seq_a` and `seq_b` with a small batch size.
    pub fn params(&self) -> AssemblerParams {
        AssemblerParams::new(self.root())
            .with_train_trajectories(["seq_a", "seq_b"])
            .with_batch_size(3)
    }
}

fn write_trajectory(root: &Path, trajectory_id: &str, num_pairs: usize, label: [f64; 6]) {
    let dir = root.join(trajectory_id);
    std::fs::create_dir_all(dir.join("rgb")).unwrap();

    let mut csv = String::from("timestamp,path_to_rgb,path_to_rgb_next,euler_x,euler_y,euler_z,t_x,t_y,t_z\n");
    for i in 0..num_pairs {
        writeln!(
            csv,
            "{},rgb/{}.png,rgb/{}.png,{},{},{},{},{},{}",
            i as f64 * 0.1,
            i,
            i + 1,
            label[0],
            label[1],
            label[2],
            label[3],
            label[4],
            label[5]
        )
        .unwrap();
    }
    std::fs::write(dir.join("df.csv"), csv).unwrap();

    for i in 0..=num_pairs {
        let frame = image::RgbImage::from_fn(4, 3, |x, y| {
            image::Rgb([(i * 10) as u8, (x * 60) as u8, (y * 100) as u8])
        });
        frame.save(dir.join(format!("rgb/{i}.png"))).unwrap();
    }
}

#[fixture]
pub fn sample_dataset() -> SampleDataset {
    let dir = tempfile::tempdir().unwrap();
    write_trajectory(dir.path(), "seq_a", 4, [0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    write_trajectory(dir.path(), "seq_b", 6, [0.0, 0.0, 0.1, 0.5, 0.0, 0.0]);
    SampleDataset {
        dir,
        input_columns: vec!["path_to_rgb".to_string(), "path_to_rgb_next".to_string()],
    }
}

/// Decoder returning the file name and counting how often it ran.
#[derive(Debug, Default)]
pub struct CountingDecoder {
    calls: AtomicUsize,
}

impl CountingDecoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for CountingDecoder {
    type Artifact = String;

    fn decode(&self, path: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default())
    }
}
