use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::header::ContentType;
use actix_web::{Error, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tera::{Context, Tera};

use shared::{InfoResponse, MessageResponse};

use crate::charts;
use crate::config::Configuration;
use crate::forms::{self, ValidationError};
use crate::imaging::enhance::{EnhanceError, Enhancer};
use crate::imaging::histogram::channel_histograms;
use crate::imaging::store::{ImageStore, StoreError};
use crate::ml::classifier::{Classifier, ClassifyError};
use crate::ml::registry::ModelRegistry;
use crate::tasks::cleanup::CleanupScheduler;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: String) {
    cfg.service(web::resource("/info").route(web::get().to(info)))
        .service(web::resource("/").route(web::get().to(home)))
        .service(
            web::resource("/classifications")
                .route(web::get().to(classification_select))
                .route(web::post().to(request_classification)),
        )
        .service(
            web::resource("/histogram")
                .route(web::get().to(histogram_select))
                .route(web::post().to(request_histogram)),
        )
        .service(
            web::resource("/transformation")
                .route(web::get().to(transformation_select))
                .route(web::post().to(request_transformation)),
        )
        .service(web::resource("/download_json").route(web::get().to(download_json)))
        .service(web::resource("/download_graph").route(web::get().to(download_graph)))
        .service(
            web::resource("/upload")
                .route(web::get().to(upload_select))
                .route(web::post().to(classify_upload)),
        )
        .service(web::resource("/delete_image").route(web::get().to(delete_image)))
        .service(Files::new("/static", static_dir));
}

async fn info(registry: web::Data<ModelRegistry>, store: web::Data<ImageStore>) -> HttpResponse {
    let images = match store.list() {
        Ok(images) => images,
        Err(e) => {
            error!("failed to list images: {e}");
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            });
        }
    };
    HttpResponse::Ok().json(InfoResponse {
        models: registry.model_names().to_vec(),
        images,
    })
}

async fn home(tera: web::Data<Tera>) -> HttpResponse {
    let mut ctx = Context::new();
    ctx.insert("active_page", "home");
    render_page(&tera, "home.html", &ctx)
}

async fn classification_select(
    store: web::Data<ImageStore>,
    registry: web::Data<ModelRegistry>,
    tera: web::Data<Tera>,
) -> HttpResponse {
    select_page(
        &tera,
        "classification_select.html",
        "classifications",
        &store,
        &registry,
    )
}

async fn request_classification(
    form: web::Form<HashMap<String, String>>,
    store: web::Data<ImageStore>,
    classifier: web::Data<Classifier>,
    tera: web::Data<Tera>,
) -> HttpResponse {
    let params = match forms::parse_classification(&form) {
        Ok(params) => params,
        Err(e) => return validation_error_page(&tera, "classifications", &e),
    };

    match classifier.classify_path(&params.model_id, &store.path_of(&params.image_id)) {
        Ok(scores) => {
            let mut ctx = Context::new();
            ctx.insert("active_page", "classifications");
            ctx.insert("image_id", &params.image_id);
            ctx.insert("scores", &scores);
            ctx.insert(
                "classification_scores",
                &serde_json::to_string(&scores).unwrap_or_default(),
            );
            render_page(&tera, "classification_output.html", &ctx)
        }
        Err(ClassifyError::NotFound(_)) => HttpResponse::NotFound().json(ErrorResponse {
            error: format!("image not found: {}", params.image_id),
        }),
        Err(e) => {
            error!("classification failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

async fn histogram_select(
    store: web::Data<ImageStore>,
    registry: web::Data<ModelRegistry>,
    tera: web::Data<Tera>,
) -> HttpResponse {
    select_page(&tera, "histogram_select.html", "histogram", &store, &registry)
}

async fn request_histogram(
    form: web::Form<HashMap<String, String>>,
    store: web::Data<ImageStore>,
    tera: web::Data<Tera>,
) -> HttpResponse {
    let params = match forms::parse_histogram(&form) {
        Ok(params) => params,
        Err(e) => return validation_error_page(&tera, "histogram", &e),
    };

    match channel_histograms(&store, &params.image_id) {
        Ok((blue, green, red)) => {
            let mut ctx = Context::new();
            ctx.insert("active_page", "histogram");
            ctx.insert("image_id", &params.image_id);
            ctx.insert(
                "histogram_blue",
                &serde_json::to_string(&blue).unwrap_or_default(),
            );
            ctx.insert(
                "histogram_green",
                &serde_json::to_string(&green).unwrap_or_default(),
            );
            ctx.insert(
                "histogram_red",
                &serde_json::to_string(&red).unwrap_or_default(),
            );
            render_page(&tera, "histogram_output.html", &ctx)
        }
        Err(e) => {
            error!("histogram failed for {}: {e}", params.image_id);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

async fn transformation_select(
    store: web::Data<ImageStore>,
    registry: web::Data<ModelRegistry>,
    tera: web::Data<Tera>,
) -> HttpResponse {
    select_page(
        &tera,
        "transformation_select.html",
        "transformation",
        &store,
        &registry,
    )
}

async fn request_transformation(
    form: web::Form<HashMap<String, String>>,
    enhancer: web::Data<Enhancer>,
    cleanup: web::Data<CleanupScheduler>,
    tera: web::Data<Tera>,
) -> HttpResponse {
    let params = match forms::parse_transformation(&form) {
        Ok(params) => params,
        Err(e) => return validation_error_page(&tera, "transformation", &e),
    };

    match enhancer.transform(
        &params.image_id,
        params.color,
        params.brightness,
        params.contrast,
        params.sharpness,
    ) {
        Ok(enhanced_id) => {
            cleanup.schedule_delete(enhancer.enhanced_path(&params.image_id));
            let mut ctx = Context::new();
            ctx.insert("active_page", "transformation");
            ctx.insert("image_id", &params.image_id);
            ctx.insert("enhanced_id", &enhanced_id);
            render_page(&tera, "transformation_output.html", &ctx)
        }
        Err(EnhanceError::Store(StoreError::NotFound(_))) => {
            HttpResponse::NotFound().json(ErrorResponse {
                error: format!("image not found: {}", params.image_id),
            })
        }
        Err(e) => {
            error!("transformation failed for {}: {e}", params.image_id);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

#[derive(Deserialize)]
struct ScoresQuery {
    classification_scores: String,
}

async fn download_json(query: web::Query<ScoresQuery>) -> HttpResponse {
    match serde_json::from_str::<serde_json::Value>(&query.classification_scores) {
        Ok(scores) => HttpResponse::Ok()
            .insert_header((
                "Content-Disposition",
                "attachment; filename=classification_scores.json",
            ))
            .json(scores),
        Err(e) => HttpResponse::BadRequest().json(ErrorResponse {
            error: format!("Invalid JSON data: {e}"),
        }),
    }
}

async fn download_graph(query: web::Query<ScoresQuery>) -> HttpResponse {
    let scores: Vec<(String, f32)> = match serde_json::from_str(&query.classification_scores) {
        Ok(scores) => scores,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("Invalid JSON data: {e}"),
            });
        }
    };

    match charts::score_chart_png(&scores) {
        Ok(png) => HttpResponse::Ok()
            .content_type("image/png")
            .insert_header((
                "Content-Disposition",
                "attachment; filename=classification_graph.png",
            ))
            .body(png),
        Err(e) => {
            error!("failed to render score chart: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

async fn upload_select(
    store: web::Data<ImageStore>,
    registry: web::Data<ModelRegistry>,
    tera: web::Data<Tera>,
) -> HttpResponse {
    select_page(&tera, "upload_select.html", "upload", &store, &registry)
}

async fn classify_upload(
    mut payload: Multipart,
    config: web::Data<Configuration>,
    classifier: web::Data<Classifier>,
    cleanup: web::Data<CleanupScheduler>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, Error> {
    let mut file_name: Option<String> = None;
    let mut file_data: Vec<u8> = Vec::new();
    let mut model_id: Option<String> = None;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().map(str::to_owned),
                cd.get_filename().map(str::to_owned),
            ),
            None => (None, None),
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let bytes = chunk?;
            data.write_all(&bytes)?;
        }

        match name.as_deref() {
            Some("file_image") => {
                file_name = filename;
                file_data = data;
            }
            Some("model_id") => {
                model_id = String::from_utf8(data).ok().map(|s| s.trim().to_string());
            }
            _ => {}
        }
    }

    let file_name = match file_name {
        Some(name) if !file_data.is_empty() => name,
        _ => {
            return Ok(validation_error_page(
                &tera,
                "upload",
                &ValidationError::MissingFile,
            ));
        }
    };
    let model_id = match model_id {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Ok(validation_error_page(
                &tera,
                "upload",
                &ValidationError::MissingField("model_id"),
            ));
        }
    };

    // Keep only the final path component of the client-supplied name.
    let file_name = Path::new(&file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();

    if let Err(e) = std::fs::create_dir_all(&config.upload_dir) {
        error!("failed to create upload directory: {e}");
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        }));
    }
    let upload_path = config.upload_dir.join(&file_name);
    if let Err(e) = std::fs::write(&upload_path, &file_data) {
        error!("failed to persist upload {}: {e}", upload_path.display());
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        }));
    }

    let response = match classifier.classify_bytes(&model_id, &file_data) {
        Ok(scores) => {
            let mut ctx = Context::new();
            ctx.insert("active_page", "upload");
            ctx.insert("image_id", &file_name);
            ctx.insert("scores", &scores);
            ctx.insert(
                "classification_scores",
                &serde_json::to_string(&scores).unwrap_or_default(),
            );
            render_page(&tera, "upload_output.html", &ctx)
        }
        Err(e) => {
            error!("upload classification failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    };

    cleanup.schedule_delete(upload_path);
    Ok(response)
}

#[derive(Deserialize)]
struct DeleteQuery {
    image_id: String,
}

async fn delete_image(
    query: web::Query<DeleteQuery>,
    enhancer: web::Data<Enhancer>,
) -> HttpResponse {
    let path = enhancer.enhanced_path(&query.image_id);
    if !path.exists() {
        return HttpResponse::NotFound().json(ErrorResponse {
            error: "Image not found".to_string(),
        });
    }
    match std::fs::remove_file(&path) {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            message: "Image deleted".to_string(),
        }),
        Err(e) => {
            error!("failed to delete {}: {e}", path.display());
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

fn select_page(
    tera: &Tera,
    template: &str,
    active: &str,
    store: &ImageStore,
    registry: &ModelRegistry,
) -> HttpResponse {
    let images = match store.list() {
        Ok(images) => images,
        Err(e) => {
            error!("failed to list images: {e}");
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            });
        }
    };
    let mut ctx = Context::new();
    ctx.insert("active_page", active);
    ctx.insert("images", &images);
    ctx.insert("models", registry.model_names());
    render_page(tera, template, &ctx)
}

fn render_page(tera: &Tera, template: &str, ctx: &Context) -> HttpResponse {
    match tera.render(template, ctx) {
        Ok(body) => HttpResponse::Ok()
            .content_type(ContentType::html())
            .body(body),
        Err(e) => {
            error!("failed to render {template}: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "template rendering failed".to_string(),
            })
        }
    }
}

fn validation_error_page(tera: &Tera, active: &str, err: &ValidationError) -> HttpResponse {
    let mut ctx = Context::new();
    ctx.insert("active_page", active);
    ctx.insert("error", &err.to_string());
    match tera.render("error.html", &ctx) {
        Ok(body) => HttpResponse::BadRequest()
            .content_type(ContentType::html())
            .body(body),
        Err(e) => {
            error!("failed to render error page: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: err.to_string(),
            })
        }
    }
}
