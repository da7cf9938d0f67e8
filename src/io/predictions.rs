use std::path::Path;

use crate::{
    error::{EvalError, Result},
    evaluation::Prediction,
    transform::{RelativePose, LABEL_COLUMNS},
};

pub const CONFIDENCE_SUFFIX: &str = "_confidence";

/// Writes one prediction table, indexed like the ground-truth rows it answers.
///
/// Confidence columns are written when every prediction carries them; a mix of
/// predictions with and without confidence is rejected.
pub fn write_predictions<P: AsRef<Path>>(
    path: P,
    indices: &[usize],
    predictions: &[Prediction],
) -> Result<()> {
    if indices.len() != predictions.len() {
        return Err(EvalError::MalformedPrediction(format!(
            "{} predictions for {} rows",
            predictions.len(),
            indices.len()
        )));
    }

    let with_confidence = predictions.iter().filter(|p| p.confidence.is_some()).count();
    if with_confidence != 0 && with_confidence != predictions.len() {
        return Err(EvalError::MalformedPrediction(format!(
            "only {with_confidence} of {} predictions carry a confidence",
            predictions.len()
        )));
    }
    let with_confidence = with_confidence != 0;

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["index".to_string()];
    header.extend(LABEL_COLUMNS.iter().map(|name| name.to_string()));
    if with_confidence {
        header.extend(LABEL_COLUMNS.iter().map(|name| format!("{name}{CONFIDENCE_SUFFIX}")));
    }
    writer.write_record(&header)?;

    for (index, prediction) in indices.iter().zip(predictions) {
        let mut record = vec![index.to_string()];
        record.extend(prediction.pose.to_array().iter().map(f64::to_string));
        if let Some(confidence) = &prediction.confidence {
            record.extend(confidence.iter().map(f64::to_string));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a table written by [`write_predictions`].
pub fn read_predictions<P: AsRef<Path>>(path: P) -> Result<(Vec<usize>, Vec<Prediction>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let with_confidence = reader.headers()?.len() == 1 + 2 * LABEL_COLUMNS.len();

    let mut indices = Vec::new();
    let mut predictions = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let values = record
            .iter()
            .map(|field| {
                field.trim().parse::<f64>().map_err(|_| {
                    EvalError::Parser(format!("invalid value '{field}' in prediction row {row}"))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() < 1 + LABEL_COLUMNS.len() {
            return Err(EvalError::Parser(format!("prediction row {row} is too short")));
        }

        let mut pose = [0.0; 6];
        pose.copy_from_slice(&values[1..7]);
        let confidence = if with_confidence {
            let mut confidence = [0.0; 6];
            confidence.copy_from_slice(&values[7..13]);
            Some(confidence)
        } else {
            None
        };

        indices.push(values[0] as usize);
        predictions.push(Prediction {
            pose: RelativePose::from_array(pose),
            confidence,
        });
    }
    Ok((indices, predictions))
}
