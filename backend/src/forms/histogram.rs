use super::{FieldError, Form, FormInput, ValidationResult, check_image_id, finish};

pub struct HistogramForm {
    pub image_id: Result<String, FieldError>,
    errors: Vec<String>,
}

impl Form for HistogramForm {
    /// The image to plot.
    type Params = String;

    fn load_data(input: &FormInput) -> Self {
        Self {
            image_id: input.text("image_id"),
            errors: Vec::new(),
        }
    }

    fn check(&self) -> ValidationResult<Self::Params> {
        let mut errors = Vec::new();
        check_image_id(&self.image_id, &mut errors);
        finish(errors, || self.image_id.clone().ok())
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

    #[test]
    fn empty_image_id_is_rejected() {
        let mut input = FormInput::default();
        input.insert("image_id", "");
        let errors = HistogramForm::validate(&input).unwrap_err();
        assert_eq!(errors.messages(), ["A valid image id is required"]);
    }

    #[test]
    fn image_id_passes_through() {
        let mut input = FormInput::default();
        input.insert("image_id", "n01530575_brambling.JPEG");
        assert_eq!(
            HistogramForm::validate(&input).unwrap(),
            "n01530575_brambling.JPEG"
        );
    }
}
