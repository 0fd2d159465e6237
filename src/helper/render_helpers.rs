use crate::error::AppResult;
use crate::middleware::CurrentUser;
use actix_web::{
    dev::ServiceResponse,
    http::header,
    middleware::ErrorHandlerResponse,
    web, HttpResponse,
};
use tera::{Context, Tera};

/// A template name and the context to render it with.
#[derive(Debug)]
pub struct TemplateView {
    pub template: &'static str,
    pub context: Context,
}

impl TemplateView {
    pub fn new(template: &'static str, context: Context) -> Self {
        TemplateView { template, context }
    }
}

/// Result of handling a form: draw a page, or send the browser elsewhere.
#[derive(Debug)]
pub enum FormOutcome {
    Render(TemplateView),
    Redirect(String),
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, location))
        .finish()
}

/// Renders `view` with the signed-in user (if any) available to the layout.
pub fn render(tera: &Tera, mut view: TemplateView, user: Option<&CurrentUser>) -> AppResult<HttpResponse> {
    view.context.insert("request_user", &user);
    let rendered = tera.render(view.template, &view.context)?;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(rendered))
}

pub fn respond(tera: &Tera, outcome: FormOutcome, user: Option<&CurrentUser>) -> AppResult<HttpResponse> {
    match outcome {
        FormOutcome::Render(view) => render(tera, view, user),
        FormOutcome::Redirect(location) => Ok(redirect(&location)),
    }
}

/// Replaces the body of every 404 with the `core/404.html` page.
pub fn render_not_found<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let page = res.request().app_data::<web::Data<Tera>>().and_then(|tera| {
        let mut ctx = Context::new();
        ctx.insert("title", "Page not found");
        ctx.insert("path", res.request().path());
        ctx.insert("request_user", &None::<CurrentUser>);
        tera.render("core/404.html", &ctx)
            .map_err(|e| log::error!("Template rendering error for 404 page: {}", e))
            .ok()
    });

    let page = match page {
        Some(page) => page,
        None => return Ok(ErrorHandlerResponse::Response(res.map_into_left_body())),
    };

    let (req, _) = res.into_parts();
    let resp = HttpResponse::NotFound()
        .content_type("text/html; charset=utf-8")
        .body(page);
    Ok(ErrorHandlerResponse::Response(ServiceResponse::new(req, resp).map_into_right_body()))
}
