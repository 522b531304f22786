use super::{FieldError, Form, FormInput, ValidationResult, check_image_id, check_model_id, finish};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub image_id: String,
    pub model_id: String,
}

pub struct ClassificationForm {
    pub image_id: Result<String, FieldError>,
    pub model_id: Result<String, FieldError>,
    errors: Vec<String>,
}

impl Form for ClassificationForm {
    type Params = ClassificationRequest;

    fn load_data(input: &FormInput) -> Self {
        Self {
            image_id: input.text("image_id"),
            model_id: input.text("model_id"),
            errors: Vec::new(),
        }
    }

    fn check(&self) -> ValidationResult<Self::Params> {
        let mut errors = Vec::new();
        check_image_id(&self.image_id, &mut errors);
        check_model_id(&self.model_id, &mut errors);
        finish(errors, || {
            Some(ClassificationRequest {
                image_id: self.image_id.clone().ok()?,
                model_id: self.model_id.clone().ok()?,
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
