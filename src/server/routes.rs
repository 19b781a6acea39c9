//! The JSON web front end for the normalizer. Uploads arrive either as base64
//! inside a JSON body or as the raw file bytes, and come back as a normalized
//! base64 JPEG ready to be stored on a company record.

use super::protocol::NormalizeRequest;
use super::WebError;
use crate::normalizer::{ImageAsset, NormalizedImage, Normalizer};
use crate::util::split_data_uri;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{get, post, web, HttpRequest, Responder};
use base64::{engine::general_purpose, Engine as _};
use tracing::*;

type Result<T> = std::result::Result<T, WebError>;

/// Register every route on an app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(normalize)
        .service(normalize_raw)
        .service(normalizer_config);
}

async fn run(normalizer: &Normalizer, asset: ImageAsset) -> Result<NormalizedImage> {
    let output = normalizer.normalize_asset_async(asset).await?;
    info!("normalized upload to {}x{}", output.width, output.height);
    Ok(output)
}

#[post("/normalize")]
pub async fn normalize(
    req: web::Json<NormalizeRequest>,
    state: web::Data<Normalizer>,
) -> Result<impl Responder> {
    let req = req.into_inner();
    debug!("got request {req:?}");

    let (uri_mime, body) = split_data_uri(&req.image);
    let mime_type = req.mime_type.clone().or(uri_mime.map(str::to_string));
    let bytes = general_purpose::STANDARD.decode(body)?;

    let output = run(&state, ImageAsset::new(bytes, mime_type)).await?;
    Ok(web::Json(output))
}

#[post("/normalize/raw")]
pub async fn normalize_raw(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<Normalizer>,
) -> Result<impl Responder> {
    let mime_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    debug!("got raw upload of {} bytes ({mime_type:?})", body.len());

    let output = run(&state, ImageAsset::new(body.to_vec(), mime_type)).await?;
    Ok(web::Json(output))
}

/// HTTP request to get the active normalizer settings
#[get("/config")]
pub async fn normalizer_config(state: web::Data<Normalizer>) -> impl Responder {
    web::Json(*state.config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;
    use crate::normalizer::tests::png;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    macro_rules! app {
        ($normalizer:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($normalizer))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_normalize_json() {
        let app = app!(Normalizer::new(NormalizerConfig {
            max_dimension: 50,
            jpeg_quality: 0.7,
        })
        .unwrap());

        let image = general_purpose::STANDARD.encode(png(100, 60));
        let req = test::TestRequest::post()
            .uri("/normalize")
            .set_json(json!({ "image": image }))
            .to_request();
        let res: NormalizedImage = test::call_and_read_body_json(&app, req).await;

        assert_eq!((res.width, res.height), (50, 30));
        assert_eq!(&res.jpeg_bytes().unwrap()[..2], &[0xFF, 0xD8]);
    }

    #[actix_web::test]
    async fn test_normalize_accepts_data_uri() {
        let app = app!(Normalizer::default());

        let image = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png(30, 20))
        );
        let req = test::TestRequest::post()
            .uri("/normalize")
            .set_json(json!({ "image": image }))
            .to_request();
        let res: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(res["width"], 30);
        assert_eq!(res["height"], 20);
        assert!(!res["image"].as_str().unwrap().starts_with("data:"));
    }

    #[actix_web::test]
    async fn test_normalize_raw_upload() {
        let app = app!(Normalizer::default());

        let req = test::TestRequest::post()
            .uri("/normalize/raw")
            .insert_header((CONTENT_TYPE, "image/png"))
            .set_payload(png(40, 60))
            .to_request();
        let res: NormalizedImage = test::call_and_read_body_json(&app, req).await;

        assert_eq!((res.width, res.height), (40, 60));
    }

    #[actix_web::test]
    async fn test_bad_base64_is_a_bad_request() {
        let app = app!(Normalizer::default());

        let req = test::TestRequest::post()
            .uri("/normalize")
            .set_json(json!({ "image": "not base64!!" }))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_undecodable_image_is_unprocessable() {
        let app = app!(Normalizer::default());

        let req = test::TestRequest::post()
            .uri("/normalize/raw")
            .insert_header((CONTENT_TYPE, "text/plain"))
            .set_payload("just some text")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: Value = test::read_body_json(res).await;
        assert!(body["errors"][0]
            .as_str()
            .unwrap()
            .starts_with("could not decode image"));
    }

    #[actix_web::test]
    async fn test_config_route() {
        let app = app!(Normalizer::default());

        let req = test::TestRequest::get().uri("/config").to_request();
        let res: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(res["max_dimension"], 800);
        assert!((res["jpeg_quality"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }
}
