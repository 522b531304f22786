use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use minijinja::context;
use serde::Deserialize;
use shared::InfoResponse;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::AppError;
use crate::forms::upload::UploadRequest;
use crate::forms::{
    ClassificationForm, Form, FormInput, HistogramForm, TransformationForm, UploadForm,
    UploadedFile,
};
use crate::packager::{self, Download};
use crate::processing::Processor;
use crate::storage::{ImageStore, StorageError};
use crate::views::Views;

const CLASSIFICATION_SELECT: &str = "classification_select.html";
const UPLOAD_SELECT: &str = "upload_image_select.html";
const TRANSFORMATION_SELECT: &str = "transformation_select.html";
const HISTOGRAM_SELECT: &str = "histogram_select.html";

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: PathBuf, image_dir: PathBuf) {
    cfg.service(web::resource("/info").route(web::get().to(info)))
        .service(web::resource("/").route(web::get().to(home)))
        .service(
            web::resource("/classifications")
                .route(web::get().to(create_classify))
                .route(web::post().to(request_classification)),
        )
        .service(
            web::resource("/upload-image")
                .route(web::get().to(create_upload_image))
                .route(web::post().to(request_upload_image)),
        )
        .service(
            web::resource("/image-transformation")
                .route(web::get().to(create_transformation))
                .route(web::post().to(request_transformation)),
        )
        .service(
            web::resource("/histogram")
                .route(web::get().to(create_histogram))
                .route(web::post().to(request_histogram)),
        )
        .service(web::resource("/download-result").route(web::get().to(download_result)))
        .service(web::resource("/download-plot").route(web::get().to(download_plot)))
        .service(Files::new("/images", image_dir))
        .service(Files::new("/static", static_dir));
}

async fn info(
    processor: web::Data<Processor>,
    store: web::Data<ImageStore>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(InfoResponse {
        models: processor.model_ids(),
        images: store.list_images()?,
    }))
}

async fn home(views: web::Data<Views>) -> Result<HttpResponse, AppError> {
    Ok(views.render("home.html", context! {})?)
}

fn selection_view(
    views: &Views,
    template: &str,
    store: &ImageStore,
    processor: &Processor,
    errors: &[String],
) -> Result<HttpResponse, AppError> {
    let images = store.list_images()?;
    Ok(views.render(
        template,
        context! { images, models => processor.model_ids(), errors },
    )?)
}

async fn create_classify(
    views: web::Data<Views>,
    store: web::Data<ImageStore>,
    processor: web::Data<Processor>,
) -> Result<HttpResponse, AppError> {
    selection_view(&views, CLASSIFICATION_SELECT, &store, &processor, &[])
}

async fn create_upload_image(
    views: web::Data<Views>,
    store: web::Data<ImageStore>,
    processor: web::Data<Processor>,
) -> Result<HttpResponse, AppError> {
    selection_view(&views, UPLOAD_SELECT, &store, &processor, &[])
}

async fn create_transformation(
    views: web::Data<Views>,
    store: web::Data<ImageStore>,
    processor: web::Data<Processor>,
) -> Result<HttpResponse, AppError> {
    selection_view(&views, TRANSFORMATION_SELECT, &store, &processor, &[])
}

async fn create_histogram(
    views: web::Data<Views>,
    store: web::Data<ImageStore>,
    processor: web::Data<Processor>,
) -> Result<HttpResponse, AppError> {
    selection_view(&views, HISTOGRAM_SELECT, &store, &processor, &[])
}

async fn classification_view(
    views: &Views,
    processor: web::Data<Processor>,
    model_id: String,
    image_id: String,
) -> Result<HttpResponse, AppError> {
    let artifact = {
        let (model_id, image_id) = (model_id.clone(), image_id.clone());
        web::block(move || processor.classify(&model_id, &image_id)).await??
    };
    let result = packager::package(&artifact)?;
    Ok(views.render(
        "classification_output.html",
        context! { image_id, model_id, result },
    )?)
}

async fn request_classification(
    form: web::Form<HashMap<String, String>>,
    views: web::Data<Views>,
    store: web::Data<ImageStore>,
    processor: web::Data<Processor>,
) -> Result<HttpResponse, AppError> {
    let input = FormInput::from_fields(form.into_inner());
    let request = match ClassificationForm::validate(&input) {
        Ok(request) => request,
        Err(errors) => {
            warn!("Classification form rejected: {}", errors);
            return selection_view(
                &views,
                CLASSIFICATION_SELECT,
                &store,
                &processor,
                errors.messages(),
            );
        }
    };
    classification_view(&views, processor, request.model_id, request.image_id).await
}

// Budget shared by all non-file parts of one upload.
const TEXT_FIELDS_LIMIT: usize = 64 * 1024;

/// Drains the multipart body. File parts larger than `max_file_bytes` stop
/// the read with `FileTooLarge` before the rest of the body is buffered.
async fn read_multipart(mut payload: Multipart, max_file_bytes: usize) -> Result<FormInput, AppError> {
    let mut input = FormInput::default();
    let mut text_bytes = 0;
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Upload(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let limit = match filename {
            Some(_) => max_file_bytes,
            None => TEXT_FIELDS_LIMIT - text_bytes,
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::Upload(e.to_string()))?;
            if data.len() + chunk.len() > limit {
                return Err(match filename {
                    Some(_) => StorageError::FileTooLarge.into(),
                    None => AppError::Upload("form fields too large".to_string()),
                });
            }
            data.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) if name == "image" => {
                input = input.with_file(UploadedFile { filename, data });
            }
            Some(filename) => warn!("Ignoring unexpected file field {} ({})", name, filename),
            None => {
                text_bytes += data.len();
                input.insert(name, String::from_utf8_lossy(&data).into_owned());
            }
        }
    }
    Ok(input)
}

fn upload_failed(
    views: &Views,
    store: &ImageStore,
    processor: &Processor,
) -> Result<HttpResponse, AppError> {
    let errors = ["The image could not be saved".to_string()];
    selection_view(views, UPLOAD_SELECT, store, processor, &errors)
}

async fn request_upload_image(
    payload: Multipart,
    views: web::Data<Views>,
    store: web::Data<ImageStore>,
    processor: web::Data<Processor>,
) -> Result<HttpResponse, AppError> {
    let input = match read_multipart(payload, store.max_size()).await {
        Ok(input) => input,
        Err(AppError::Storage(e)) => {
            warn!("Upload rejected: {}", e);
            return upload_failed(&views, &store, &processor);
        }
        Err(e) => return Err(e),
    };
    let UploadRequest { model_id, image } = match UploadForm::validate(&input) {
        Ok(request) => request,
        Err(errors) => {
            warn!("Upload form rejected: {}", errors);
            return selection_view(&views, UPLOAD_SELECT, &store, &processor, errors.messages());
        }
    };

    let image_id = image.filename;
    let saved = {
        let store = store.clone();
        let image_id = image_id.clone();
        web::block(move || store.save(&image_id, &image.data)).await?
    };
    if let Err(e) = saved {
        warn!("Error in adding image {}: {}", image_id, e);
        return upload_failed(&views, &store, &processor);
    }

    info!("Uploaded {}", image_id);
    classification_view(&views, processor, model_id, image_id).await
}

async fn request_transformation(
    form: web::Form<HashMap<String, String>>,
    views: web::Data<Views>,
    store: web::Data<ImageStore>,
    processor: web::Data<Processor>,
) -> Result<HttpResponse, AppError> {
    let input = FormInput::from_fields(form.into_inner());
    let request = match TransformationForm::validate(&input) {
        Ok(request) => request,
        Err(errors) => {
            warn!("Transformation form rejected: {}", errors);
            return selection_view(
                &views,
                TRANSFORMATION_SELECT,
                &store,
                &processor,
                errors.messages(),
            );
        }
    };

    let artifact = {
        let processor = processor.clone();
        let image_id = request.image_id.clone();
        let params = request.params;
        web::block(move || processor.transform(&image_id, &params)).await??
    };
    let result = packager::package(&artifact)?;
    Ok(views.render(
        "transformation_output.html",
        context! { image_id => request.image_id, result },
    )?)
}

async fn request_histogram(
    form: web::Form<HashMap<String, String>>,
    views: web::Data<Views>,
    store: web::Data<ImageStore>,
    processor: web::Data<Processor>,
) -> Result<HttpResponse, AppError> {
    let input = FormInput::from_fields(form.into_inner());
    let image_id = match HistogramForm::validate(&input) {
        Ok(image_id) => image_id,
        Err(errors) => {
            warn!("Histogram form rejected: {}", errors);
            return selection_view(&views, HISTOGRAM_SELECT, &store, &processor, errors.messages());
        }
    };

    let artifact = {
        let processor = processor.clone();
        let image_id = image_id.clone();
        web::block(move || processor.histogram(&image_id)).await??
    };
    let result = packager::package(&artifact)?;
    Ok(views.render("histogram_output.html", context! { image_id, result })?)
}

#[derive(Deserialize)]
struct ScoresQuery {
    scores: String,
}

async fn download_result(
    req: HttpRequest,
    query: web::Query<ScoresQuery>,
) -> Result<HttpResponse, AppError> {
    let scores = packager::scores_from_json(&query.scores)?;
    let download = Download::scores(&scores)?;
    info!("Serving {} with {} scores", download.file_name, scores.len());
    Ok(download.into_response(&req)?)
}

async fn download_plot(
    req: HttpRequest,
    query: web::Query<ScoresQuery>,
) -> Result<HttpResponse, AppError> {
    let scores = packager::scores_from_json(&query.scores)?;
    let download = web::block(move || Download::plot(&scores)).await??;
    info!("Serving {}", download.file_name);
    Ok(download.into_response(&req)?)
}
