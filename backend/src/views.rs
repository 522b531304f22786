use actix_web::HttpResponse;
use actix_web::http::header::ContentType;
use minijinja::Environment;
use serde::Serialize;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("_image_select.html", include_str!("../templates/_image_select.html")),
    ("_model_select.html", include_str!("../templates/_model_select.html")),
    ("home.html", include_str!("../templates/home.html")),
    (
        "classification_select.html",
        include_str!("../templates/classification_select.html"),
    ),
    (
        "classification_output.html",
        include_str!("../templates/classification_output.html"),
    ),
    (
        "upload_image_select.html",
        include_str!("../templates/upload_image_select.html"),
    ),
    (
        "transformation_select.html",
        include_str!("../templates/transformation_select.html"),
    ),
    (
        "transformation_output.html",
        include_str!("../templates/transformation_output.html"),
    ),
    ("histogram_select.html", include_str!("../templates/histogram_select.html")),
    ("histogram_output.html", include_str!("../templates/histogram_output.html")),
];

/// HTML views, compiled once at start-up.
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<HttpResponse, minijinja::Error> {
        let html = self.env.get_template(name)?.render(ctx)?;
        Ok(HttpResponse::Ok().content_type(ContentType::html()).body(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use minijinja::context;

    async fn body_of(response: HttpResponse) -> String {
        let bytes = to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[actix_web::test]
    async fn selection_view_lists_choices_and_errors() {
        let views = Views::new().unwrap();
        let response = views
            .render(
                "transformation_select.html",
                context! {
                    images => vec!["a.JPEG", "b.JPEG"],
                    models => Vec::<String>::new(),
                    errors => vec!["A valid color value is required"],
                },
            )
            .unwrap();
        let body = body_of(response).await;
        assert!(body.contains(r#"<option value="a.JPEG">"#));
        assert!(body.contains(r#"<option value="b.JPEG">"#));
        assert!(body.contains("A valid color value is required"));
    }

    #[actix_web::test]
    async fn user_text_is_escaped() {
        let views = Views::new().unwrap();
        let response = views
            .render(
                "histogram_select.html",
                context! {
                    images => vec!["<script>.JPEG"],
                    errors => Vec::<String>::new(),
                },
            )
            .unwrap();
        let body = body_of(response).await;
        assert!(!body.contains("<script>"));
        assert!(!body.contains("class=\"errors\""));
    }

    #[actix_web::test]
    async fn image_links_are_url_encoded() {
        let views = Views::new().unwrap();
        let response = views
            .render(
                "histogram_output.html",
                context! {
                    image_id => "my cat#1?.jpeg",
                    result => context! { data_uri => "data:image/png;base64,AA==" },
                },
            )
            .unwrap();
        let body = body_of(response).await;
        assert!(body.contains(r#"src="/images/my%20cat%231%3F.jpeg""#));
    }
}
