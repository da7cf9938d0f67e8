use std::{fmt, str::FromStr};

use crate::{
    error::{EvalError, Result},
    metrics::RpeIndices,
};

/// Trajectory lists and settings of a known experiment.
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentConfig {
    pub train_trajectories: Vec<String>,
    pub val_trajectories: Vec<String>,
    pub test_trajectories: Option<Vec<String>>,
    pub exp_name: String,
    /// Network input size as `(height, width)`.
    pub target_size: (usize, usize),
    pub rpe_indices: RpeIndices,
}

/// Known dataset configurations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatasetConfig {
    Zju,
    Euroc,
    EurocBovw,
    EurocMixed123,
    Kitti8x3,
    Kitti4x6,
    Kitti4x6Bovw,
    Kitti4x6Mixed,
    TumFr1,
    TumFr2,
    TumFr3,
    Tum,
    TumBovw,
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Prefixes every trajectory with `"{stride}/"`.
fn add_stride_to_path(trajectories: Vec<String>, stride: Option<usize>) -> Vec<String> {
    match stride {
        Some(stride) => trajectories
            .into_iter()
            .map(|trajectory| format!("{stride}/{trajectory}"))
            .collect(),
        None => trajectories,
    }
}

impl DatasetConfig {
    pub const ALL: [DatasetConfig; 13] = [
        DatasetConfig::Zju,
        DatasetConfig::Euroc,
        DatasetConfig::EurocBovw,
        DatasetConfig::EurocMixed123,
        DatasetConfig::Kitti8x3,
        DatasetConfig::Kitti4x6,
        DatasetConfig::Kitti4x6Bovw,
        DatasetConfig::Kitti4x6Mixed,
        DatasetConfig::TumFr1,
        DatasetConfig::TumFr2,
        DatasetConfig::TumFr3,
        DatasetConfig::Tum,
        DatasetConfig::TumBovw,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DatasetConfig::Zju => "zju",
            DatasetConfig::Euroc => "euroc",
            DatasetConfig::EurocBovw => "euroc_bovw",
            DatasetConfig::EurocMixed123 => "euroc_mixed_1_2_3",
            DatasetConfig::Kitti8x3 => "kitti_8/3",
            DatasetConfig::Kitti4x6 => "kitti_4/6",
            DatasetConfig::Kitti4x6Bovw => "kitti_4/6_bovw",
            DatasetConfig::Kitti4x6Mixed => "kitti_4/6_mixed",
            DatasetConfig::TumFr1 => "tum_fr1",
            DatasetConfig::TumFr2 => "tum_fr2",
            DatasetConfig::TumFr3 => "tum_fr3",
            DatasetConfig::Tum => "tum",
            DatasetConfig::TumBovw => "tum_bovw",
        }
    }

    /// Experiment settings, with trajectories taken from the `stride`
    /// subdirectory when a stride is given.
    ///
    /// Only `euroc` and `kitti_4/6` honor the stride; mixed variants already
    /// list trajectories under several stride directories.
    pub fn config(&self, stride: Option<usize>) -> Result<ExperimentConfig> {
        if stride == Some(0) {
            return Err(EvalError::invalid_parameter("Stride must be positive"));
        }

        let config = match self {
            DatasetConfig::Zju => simple(
                &["A0", "A3", "A4", "A5", "B0", "B2"],
                &["A1", "A6", "B1"],
                Some(&["A2", "A7", "B3"]),
                "zju",
                (120, 160),
                RpeIndices::Full,
            ),
            DatasetConfig::Euroc => euroc(stride),
            DatasetConfig::EurocBovw => ExperimentConfig {
                exp_name: "euroc_bovw".to_string(),
                ..euroc(None)
            },
            DatasetConfig::EurocMixed123 => euroc_mixed_1_2_3(),
            DatasetConfig::Kitti8x3 => simple(
                &["00", "01", "02", "03", "04", "05", "06", "07"],
                &["08", "09", "10"],
                None,
                "kitti_8/3",
                (96, 320),
                RpeIndices::Kitti,
            ),
            DatasetConfig::Kitti4x6 => kitti_4_6(stride),
            DatasetConfig::Kitti4x6Bovw => ExperimentConfig {
                exp_name: "kitti_4/6_bovw".to_string(),
                ..kitti_4_6(None)
            },
            DatasetConfig::Kitti4x6Mixed => kitti_4_6_mixed(),
            DatasetConfig::TumFr1 => tum_fr1(),
            DatasetConfig::TumFr2 => tum_fr2(),
            DatasetConfig::TumFr3 => tum_fr3(),
            DatasetConfig::Tum => tum("tum"),
            DatasetConfig::TumBovw => tum("tum_bovw"),
        };
        Ok(config)
    }
}

impl FromStr for DatasetConfig {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        DatasetConfig::ALL
            .into_iter()
            .find(|config| config.name() == s)
            .ok_or_else(|| EvalError::UnknownDataset(s.to_string()))
    }
}

impl fmt::Display for DatasetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn simple(
    train: &[&str],
    val: &[&str],
    test: Option<&[&str]>,
    exp_name: &str,
    target_size: (usize, usize),
    rpe_indices: RpeIndices,
) -> ExperimentConfig {
    with_stride(
        names(train),
        names(val),
        test.map(names),
        exp_name.to_string(),
        target_size,
        rpe_indices,
        None,
    )
}

fn with_stride(
    train: Vec<String>,
    val: Vec<String>,
    test: Option<Vec<String>>,
    exp_name: String,
    target_size: (usize, usize),
    rpe_indices: RpeIndices,
    stride: Option<usize>,
) -> ExperimentConfig {
    let exp_name = match stride {
        Some(stride) if stride > 1 => format!("{exp_name}_stride{stride}"),
        _ => exp_name,
    };

    ExperimentConfig {
        train_trajectories: add_stride_to_path(train, stride),
        val_trajectories: add_stride_to_path(val, stride),
        test_trajectories: test.map(|test| add_stride_to_path(test, stride)),
        exp_name,
        target_size,
        rpe_indices,
    }
}

fn mixed(
    train: Vec<String>,
    val: Vec<String>,
    test: Option<Vec<String>>,
    exp_name: &str,
    target_size: (usize, usize),
    rpe_indices: RpeIndices,
) -> ExperimentConfig {
    ExperimentConfig {
        train_trajectories: train,
        val_trajectories: val,
        test_trajectories: test,
        exp_name: exp_name.to_string(),
        target_size,
        rpe_indices,
    }
}

const EUROC_TRAIN: [&str; 7] = [
    "MH_01_easy",
    "MH_03_medium",
    "MH_04_difficult",
    "V1_01_easy",
    "V1_03_difficult",
    "V2_01_easy",
    "V2_03_difficult",
];
const EUROC_VAL: [&str; 2] = ["MH_02_easy", "V1_02_medium"];
const EUROC_TEST: [&str; 2] = ["MH_05_difficult", "V2_02_medium"];

fn euroc(stride: Option<usize>) -> ExperimentConfig {
    with_stride(
        names(&EUROC_TRAIN),
        names(&EUROC_VAL),
        Some(names(&EUROC_TEST)),
        "euroc".to_string(),
        (120, 188),
        RpeIndices::Full,
        stride,
    )
}

/// `names` repeated under the `1/`, `2/` ... `{count}/` stride directories.
fn strided_copies(names: &[&str], strides: &[usize]) -> Vec<String> {
    strides
        .iter()
        .flat_map(|stride| names.iter().map(move |name| format!("{stride}/{name}")))
        .collect()
}

fn euroc_mixed_1_2_3() -> ExperimentConfig {
    mixed(
        strided_copies(&EUROC_TRAIN, &[1, 2, 3]),
        strided_copies(&EUROC_VAL, &[1, 2, 3]),
        Some(strided_copies(&EUROC_TEST, &[1, 2, 3])),
        "euroc_mixed_1_2_3",
        (120, 188),
        RpeIndices::Full,
    )
}

const KITTI_4_6_TRAIN: [&str; 4] = ["00", "02", "08", "09"];
const KITTI_4_6_VAL: [&str; 6] = ["03", "04", "05", "06", "07", "10"];

fn kitti_4_6(stride: Option<usize>) -> ExperimentConfig {
    with_stride(
        names(&KITTI_4_6_TRAIN),
        names(&KITTI_4_6_VAL),
        None,
        "kitti_4/6".to_string(),
        (96, 320),
        RpeIndices::Kitti,
        stride,
    )
}

fn kitti_4_6_mixed() -> ExperimentConfig {
    mixed(
        strided_copies(&KITTI_4_6_TRAIN, &[1, 2]),
        strided_copies(&KITTI_4_6_VAL, &[1]),
        None,
        "kitti_4/6_mixed",
        (96, 320),
        RpeIndices::Kitti,
    )
}

fn tum_fr1() -> ExperimentConfig {
    simple(
        &[
            "rgbd_dataset_freiburg1_desk",
            "rgbd_dataset_freiburg1_xyz",
            "rgbd_dataset_freiburg1_360",
            "rgbd_dataset_freiburg1_rpy",
            "rgbd_dataset_freiburg1_teddy",
            "rgbd_dataset_freiburg1_plant",
        ],
        &["rgbd_dataset_freiburg1_room"],
        Some(&["rgbd_dataset_freiburg1_desk2"]),
        "tum_fr1",
        (120, 160),
        RpeIndices::Full,
    )
}

fn tum_fr2() -> ExperimentConfig {
    simple(
        &[
            "rgbd_dataset_freiburg2_xyz",
            "rgbd_dataset_freiburg2_rpy",
            "rgbd_dataset_freiburg2_flowerbouquet_brownbackground",
            "rgbd_dataset_freiburg2_coke",
            "rgbd_dataset_freiburg2_metallic_sphere",
            "rgbd_dataset_freiburg2_metallic_sphere2",
            "rgbd_dataset_freiburg2_dishes",
        ],
        &["rgbd_dataset_freiburg2_flowerbouquet"],
        Some(&[
            "rgbd_dataset_freiburg2_pioneer_slam3",
            "rgbd_dataset_freiburg2_360_hemisphere",
        ]),
        "tum_fr2",
        (120, 160),
        RpeIndices::Full,
    )
}

fn tum_fr3() -> ExperimentConfig {
    simple(
        &[
            "rgbd_dataset_freiburg3_checkerboard_large",
            "rgbd_dataset_freiburg3_sitting_xyz",
            "rgbd_dataset_freiburg3_long_office_household",
            "rgbd_dataset_freiburg3_walking_xyz",
            "rgbd_dataset_freiburg3_walking_static",
            "rgbd_dataset_freiburg3_nostructure_notexture_far",
            "rgbd_dataset_freiburg3_nostructure_notexture_near_withloop",
            "rgbd_dataset_freiburg3_structure_notexture_far",
            "rgbd_dataset_freiburg3_walking_halfsphere",
            "rgbd_dataset_freiburg3_large_cabinet",
            "rgbd_dataset_freiburg3_structure_texture_near",
            "rgbd_dataset_freiburg3_sitting_halfsphere",
            "rgbd_dataset_freiburg3_nostructure_texture_near_withloop",
            "rgbd_dataset_freiburg3_nostructure_texture_far",
            "rgbd_dataset_freiburg3_sitting_static",
            "rgbd_dataset_freiburg3_structure_texture_far",
            "rgbd_dataset_freiburg3_walking_rpy",
            "rgbd_dataset_freiburg3_cabinet",
            "rgbd_dataset_freiburg3_structure_notexture_near",
            "rgbd_dataset_freiburg3_teddy",
        ],
        &[
            "rgbd_dataset_freiburg3_sitting_xyz_validation",
            "rgbd_dataset_freiburg3_walking_xyz_validation",
            "rgbd_dataset_freiburg3_walking_static_validation",
            "rgbd_dataset_freiburg3_nostructure_notexture_far_validation",
            "rgbd_dataset_freiburg3_nostructure_notexture_near_withloop_validation",
            "rgbd_dataset_freiburg3_structure_notexture_far_validation",
            "rgbd_dataset_freiburg3_large_cabinet_validation",
            "rgbd_dataset_freiburg3_structure_texture_near_validation",
            "rgbd_dataset_freiburg3_nostructure_texture_near_withloop_validation",
            "rgbd_dataset_freiburg3_sitting_static_validation",
            "rgbd_dataset_freiburg3_walking_rpy_validation",
            "rgbd_dataset_freiburg3_cabinet_validation",
            "rgbd_dataset_freiburg3_structure_notexture_near_validation",
        ],
        Some(&[
            "rgbd_dataset_freiburg3_structure_texture_far_validation",
            "rgbd_dataset_freiburg3_long_office_household_validation",
            "rgbd_dataset_freiburg3_sitting_halfsphere_validation",
            "rgbd_dataset_freiburg3_nostructure_texture_far_validation",
            "rgbd_dataset_freiburg3_walking_halfsphere_validation",
        ]),
        "tum_fr3",
        (120, 160),
        RpeIndices::Full,
    )
}

/// All three Freiburg groups together.
fn tum(exp_name: &str) -> ExperimentConfig {
    let mut config = tum_fr1();
    for other in [tum_fr2(), tum_fr3()] {
        config.train_trajectories.extend(other.train_trajectories);
        config.val_trajectories.extend(other.val_trajectories);
        if let (Some(test), Some(other_test)) = (&mut config.test_trajectories, other.test_trajectories) {
            test.extend(other_test);
        }
    }
    config.exp_name = exp_name.to_string();
    config
}
