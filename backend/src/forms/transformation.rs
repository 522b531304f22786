use super::{FieldError, Form, FormInput, ValidationResult, check_image_id, finish};
use crate::processing::TransformParams;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformationRequest {
    pub image_id: String,
    pub params: TransformParams,
}

pub struct TransformationForm {
    pub image_id: Result<String, FieldError>,
    pub color: Result<f32, FieldError>,
    pub brightness: Result<f32, FieldError>,
    pub contrast: Result<f32, FieldError>,
    pub sharpness: Result<f32, FieldError>,
    errors: Vec<String>,
}

// Zero is rejected alongside missing values for every factor; the upper and
// lower bounds are checked on top of that.
fn factor_ok(value: &Result<f32, FieldError>, max: Option<f32>) -> bool {
    match value {
        Ok(v) => *v != 0.0 && *v >= 0.0 && max.is_none_or(|m| *v <= m),
        Err(_) => false,
    }
}

impl Form for TransformationForm {
    type Params = TransformationRequest;

    fn load_data(input: &FormInput) -> Self {
        Self {
            image_id: input.text("image_id"),
            color: input.float("color"),
            brightness: input.float("brightness"),
            contrast: input.float("contrast"),
            sharpness: input.float("sharpness"),
            errors: Vec::new(),
        }
    }

    fn check(&self) -> ValidationResult<Self::Params> {
        let mut errors = Vec::new();
        check_image_id(&self.image_id, &mut errors);
        if !factor_ok(&self.color, Some(1.0)) {
            errors.push("A valid color value is required".to_string());
        }
        if !factor_ok(&self.brightness, None) {
            errors.push("A valid brightness value is required".to_string());
        }
        if !factor_ok(&self.contrast, None) {
            errors.push("A valid contrast value is required".to_string());
        }
        if !factor_ok(&self.sharpness, None) {
            errors.push("A valid sharpness value is required".to_string());
        }

        finish(errors, || {
            Some(TransformationRequest {
                image_id: self.image_id.clone().ok()?,
                params: TransformParams {
                    color: self.color.clone().ok()?,
                    brightness: self.brightness.clone().ok()?,
                    contrast: self.contrast.clone().ok()?,
                    sharpness: self.sharpness.clone().ok()?,
                },
            })
        })
    }

    fn errors_mut(&mut self) -> &mut Vec<String> {
        &mut self.errors
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(color: &str, brightness: &str, contrast: &str, sharpness: &str) -> FormInput {
        let mut input = FormInput::default();
        input.insert("image_id", "n01443537_goldfish.JPEG");
        input.insert("color", color);
        input.insert("brightness", brightness);
        input.insert("contrast", contrast);
        input.insert("sharpness", sharpness);
        input
    }

    #[test]
    fn accepts_in_range_values() {
        let mut form = TransformationForm::load_data(&input("0.5", "1.0", "1.0", "1.0"));
        assert!(form.is_valid());
        assert!(form.errors().is_empty());

        let request = TransformationForm::validate(&input("0.5", "1.0", "1.0", "1.0")).unwrap();
        assert_eq!(request.params.color, 0.5);
        assert_eq!(request.image_id, "n01443537_goldfish.JPEG");
    }

    #[test]
    fn rejects_color_above_one() {
        let mut form = TransformationForm::load_data(&input("1.5", "1.0", "1.0", "1.0"));
        assert!(!form.is_valid());
        assert_eq!(form.errors(), ["A valid color value is required"]);
    }

    // Zero counts as missing, even though the documented range admits it.
    #[test]
    fn zero_brightness_is_rejected() {
        let mut form = TransformationForm::load_data(&input("0.5", "0.0", "1.0", "1.0"));
        assert!(!form.is_valid());
        assert_eq!(form.errors(), ["A valid brightness value is required"]);
    }

    #[test]
    fn zero_color_is_rejected() {
        let mut form = TransformationForm::load_data(&input("0", "1.0", "1.0", "1.0"));
        assert!(!form.is_valid());
        assert_eq!(form.errors(), ["A valid color value is required"]);
    }

    #[test]
    fn collects_every_violation_in_field_order() {
        let mut raw = input("-1", "abc", "-0.5", "");
        raw.insert("image_id", "");
        let mut form = TransformationForm::load_data(&raw);
        assert!(!form.is_valid());
        assert_eq!(
            form.errors(),
            [
                "A valid image id is required",
                "A valid color value is required",
                "A valid brightness value is required",
                "A valid contrast value is required",
                "A valid sharpness value is required",
            ]
        );
    }

    #[test]
    fn large_factors_are_allowed_except_color() {
        assert!(TransformationForm::validate(&input("1.0", "3.5", "10", "0.1")).is_ok());
    }

    #[test]
    fn missing_fields_fail() {
        let errors = TransformationForm::validate(&FormInput::default()).unwrap_err();
        assert_eq!(errors.messages().len(), 5);
    }
}
