use std::{fmt::Write as _, path::Path};

/// Writes `{root}/{trajectory_id}/df.csv` with `labels.len()` frame pairs and the frames they reference.
pub fn write_trajectory(root: &Path, trajectory_id: &str, labels: &[[f64; 6]]) {
    let dir = root.join(trajectory_id);
    std::fs::create_dir_all(dir.join("rgb")).unwrap();

    let mut csv = String::from("path_to_rgb,path_to_rgb_next,euler_x,euler_y,euler_z,t_x,t_y,t_z\n");
    for (i, label) in labels.iter().enumerate() {
        let values = label.iter().map(f64::to_string).collect::<Vec<_>>().join(",");
        writeln!(csv, "rgb/{}.png,rgb/{}.png,{values}", i, i + 1).unwrap();
    }
    std::fs::write(dir.join("df.csv"), csv).unwrap();

    for i in 0..=labels.len() {
        image::RgbImage::from_pixel(2, 2, image::Rgb([i as u8, 0, 255]))
            .save(dir.join(format!("rgb/{i}.png")))
            .unwrap();
    }
}

/// Gentle left turn at constant speed.
pub fn turning_labels(n: usize) -> Vec<[f64; 6]> {
    (0..n).map(|_| [0.0, 0.0, 0.05, 1.0, 0.0, 0.0]).collect()
}
