use super::{FieldError, Form, FormInput, UploadedFile, ValidationResult, check_model_id, finish};

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub model_id: String,
    pub image: UploadedFile,
}

pub struct UploadForm {
    pub model_id: Result<String, FieldError>,
    pub image: Option<UploadedFile>,
    errors: Vec<String>,
}

impl Form for UploadForm {
    type Params = UploadRequest;

    fn load_data(input: &FormInput) -> Self {
        Self {
            model_id: input.text("model_id"),
            image: input.file().cloned(),
            errors: Vec::new(),
        }
    }

    fn check(&self) -> ValidationResult<Self::Params> {
        let mut errors = Vec::new();
        check_model_id(&self.model_id, &mut errors);
        match &self.image {
            Some(file) if !file.filename.is_empty() => {}
            _ => errors.push("An image file is required".to_string()),
        }
        finish(errors, || {
            Some(UploadRequest {
                model_id: self.model_id.clone().ok()?,
                image: self.image.clone()?,
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

    #[test]
    fn requires_model_and_named_file() {
        let mut input = FormInput::default().with_file(UploadedFile {
            filename: String::new(),
            data: vec![1, 2, 3],
        });
        input.insert("model_id", "");
        let mut form = UploadForm::load_data(&input);
        assert!(!form.is_valid());
        assert_eq!(
            form.errors(),
            ["A valid model id is required", "An image file is required"]
        );
    }

    #[test]
    fn extension_is_not_checked_here() {
        let mut input = FormInput::default().with_file(UploadedFile {
            filename: "cat.png".into(),
            data: vec![0xff],
        });
        input.insert("model_id", "palette-basic");
        let request = UploadForm::validate(&input).unwrap();
        assert_eq!(request.image.filename, "cat.png");
        assert_eq!(request.model_id, "palette-basic");
    }
}
