//! Per-operation forms.
//!
//! `load_data` captures the raw request fields into a typed structure,
//! recording a [`FieldError`] for anything that does not parse. Validation is
//! a separate step that checks every field and collects one message per
//! violation.

pub mod classification;
pub mod histogram;
pub mod transformation;
pub mod upload;

use std::collections::HashMap;
use std::fmt;

pub use classification::ClassificationForm;
pub use histogram::HistogramForm;
pub use transformation::TransformationForm;
pub use upload::UploadForm;

/// A file part of a multipart submission, buffered whole.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Raw named fields of one submitted request.
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

impl FormInput {
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        Self { fields, file: None }
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    /// Field as text; absent fields are `Missing`.
    pub fn text(&self, name: &str) -> Result<String, FieldError> {
        self.get(name).map(str::to_string).ok_or(FieldError::Missing)
    }

    /// Field parsed as a float; absent, non-numeric and non-finite input fail.
    pub fn float(&self, name: &str) -> Result<f32, FieldError> {
        let raw = self.get(name).ok_or(FieldError::Missing)?;
        match raw.trim().parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(FieldError::NotANumber(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    Missing,
    NotANumber(String),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Missing => write!(f, "missing"),
            FieldError::NotANumber(raw) => write!(f, "not a number: {raw:?}"),
        }
    }
}

/// Non-empty list of messages from a failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_messages(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

pub type ValidationResult<T> = Result<T, ValidationErrors>;

/// Turns an accumulated message list into a result.
pub(crate) fn finish<T>(errors: Vec<String>, params: impl FnOnce() -> Option<T>) -> ValidationResult<T> {
    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }
    params().ok_or_else(|| ValidationErrors(vec!["Invalid form submission".to_string()]))
}

pub trait Form: Sized {
    type Params;

    /// Captures the raw input. Never fails; parse problems are kept per field.
    fn load_data(input: &FormInput) -> Self;

    /// Checks every field, returning the typed parameters or every message.
    fn check(&self) -> ValidationResult<Self::Params>;

    fn errors_mut(&mut self) -> &mut Vec<String>;

    fn errors(&self) -> &[String];

    /// Appends any violations to the form's error list.
    fn is_valid(&mut self) -> bool {
        match self.check() {
            Ok(_) => true,
            Err(errors) => {
                self.errors_mut().extend(errors.into_messages());
                false
            }
        }
    }

    /// Load, then validate. The typed parameters are only produced once
    /// `is_valid` has passed.
    fn validate(input: &FormInput) -> ValidationResult<Self::Params> {
        let mut form = Self::load_data(input);
        if !form.is_valid() {
            return Err(ValidationErrors(form.errors().to_vec()));
        }
        form.check()
    }
}

pub(crate) fn check_image_id(image_id: &Result<String, FieldError>, errors: &mut Vec<String>) {
    match image_id {
        Ok(id) if !id.is_empty() => {}
        _ => errors.push("A valid image id is required".to_string()),
    }
}

pub(crate) fn check_model_id(model_id: &Result<String, FieldError>, errors: &mut Vec<String>) {
    match model_id {
        Ok(id) if !id.is_empty() => {}
        _ => errors.push("A valid model id is required".to_string()),
    }
}
