use std::collections::HashMap;

/// Form parsing for the POST routes. Each parser returns either a fully
/// validated parameter struct or the first validation failure; services
/// are never invoked on a failed parse.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {0} is not a number: {1}")]
    NotANumber(&'static str, String),
    #[error("no file uploaded")]
    MissingFile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationParams {
    pub image_id: String,
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramParams {
    pub image_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformationParams {
    pub image_id: String,
    pub color: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub sharpness: f32,
}

pub fn parse_classification(
    form: &HashMap<String, String>,
) -> Result<ClassificationParams, ValidationError> {
    Ok(ClassificationParams {
        image_id: require(form, "image_id")?.to_string(),
        model_id: require(form, "model_id")?.to_string(),
    })
}

pub fn parse_histogram(form: &HashMap<String, String>) -> Result<HistogramParams, ValidationError> {
    Ok(HistogramParams {
        image_id: require(form, "image_id")?.to_string(),
    })
}

pub fn parse_transformation(
    form: &HashMap<String, String>,
) -> Result<TransformationParams, ValidationError> {
    Ok(TransformationParams {
        image_id: require(form, "image_id")?.to_string(),
        color: require_f32(form, "color")?,
        brightness: require_f32(form, "brightness")?,
        contrast: require_f32(form, "contrast")?,
        sharpness: require_f32(form, "sharpness")?,
    })
}

fn require<'a>(
    form: &'a HashMap<String, String>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match form.get(field).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn require_f32(
    form: &HashMap<String, String>,
    field: &'static str,
) -> Result<f32, ValidationError> {
    let raw = require(form, field)?;
    raw.parse::<f32>()
        .map_err(|_| ValidationError::NotANumber(field, raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn classification_requires_both_fields() {
        let parsed = parse_classification(&form(&[
            ("image_id", "cat.png"),
            ("model_id", "resnet18"),
        ]))
        .unwrap();
        assert_eq!(parsed.image_id, "cat.png");
        assert_eq!(parsed.model_id, "resnet18");

        assert_eq!(
            parse_classification(&form(&[("image_id", "cat.png")])),
            Err(ValidationError::MissingField("model_id"))
        );
    }

    #[test]
    fn blank_fields_count_as_missing() {
        assert_eq!(
            parse_histogram(&form(&[("image_id", "   ")])),
            Err(ValidationError::MissingField("image_id"))
        );
    }

    #[test]
    fn transformation_parses_all_four_factors() {
        let parsed = parse_transformation(&form(&[
            ("image_id", "cat.png"),
            ("color", "0.5"),
            ("brightness", "1.2"),
            ("contrast", "1"),
            ("sharpness", "2.0"),
        ]))
        .unwrap();
        assert_eq!(parsed.color, 0.5);
        assert_eq!(parsed.brightness, 1.2);
        assert_eq!(parsed.contrast, 1.0);
        assert_eq!(parsed.sharpness, 2.0);
    }

    #[test]
    fn malformed_factor_is_rejected_with_its_value() {
        assert_eq!(
            parse_transformation(&form(&[
                ("image_id", "cat.png"),
                ("color", "loud"),
                ("brightness", "1"),
                ("contrast", "1"),
                ("sharpness", "1"),
            ])),
            Err(ValidationError::NotANumber("color", "loud".to_string()))
        );
    }

    #[test]
    fn out_of_range_factors_pass_through() {
        let parsed = parse_transformation(&form(&[
            ("image_id", "cat.png"),
            ("color", "-3.5"),
            ("brightness", "42"),
            ("contrast", "0"),
            ("sharpness", "1"),
        ]))
        .unwrap();
        assert_eq!(parsed.color, -3.5);
        assert_eq!(parsed.brightness, 42.0);
    }
}
