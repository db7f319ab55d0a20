use rocket::http::uri::Origin;
use rocket::http::{Method, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use rocket::{
    Data, Request,
    fairing::{Fairing, Info, Kind},
};
use tracing::debug;

const CLEAN_URL_PATH: &str = "/_clean-url";

/// Drops `utm_*` pairs from a raw query and returns the path to redirect to,
/// or `None` when the query carries no tracking parameters.
pub fn strip_tracking_params(path: &str, query: &str) -> Option<String> {
    let mut stripped = false;
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            if key.starts_with("utm_") {
                stripped = true;
                false
            } else {
                !pair.is_empty()
            }
        })
        .collect();

    if !stripped {
        return None;
    }

    if kept.is_empty() {
        Some(path.to_string())
    } else {
        Some(format!("{}?{}", path, kept.join("&")))
    }
}

struct CleanTarget(Option<String>);

/// Sends shared links carrying campaign parameters to their clean form.
///
/// Matching GET requests are routed to [`clean_url_redirect`], which answers
/// with a 302 before any page handler runs.
pub struct StripTrackingParams;

#[rocket::async_trait]
impl Fairing for StripTrackingParams {
    fn info(&self) -> Info {
        Info {
            name: "Strip tracking parameters",
            kind: Kind::Request,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        if !matches!(request.method(), Method::Get | Method::Head) {
            return;
        }

        let uri = request.uri();
        let target = uri
            .query()
            .and_then(|query| strip_tracking_params(uri.path().as_str(), query.as_str()));

        let Some(target) = target else {
            return;
        };

        if let Ok(origin) = Origin::parse(CLEAN_URL_PATH) {
            debug!(target = %target, "Stripping tracking parameters");
            request.local_cache(|| CleanTarget(Some(target)));
            request.set_uri(origin);
        }
    }
}

pub struct TrackingRedirect(String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TrackingRedirect {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.local_cache(|| CleanTarget(None)) {
            CleanTarget(Some(target)) => Outcome::Success(TrackingRedirect(target.clone())),
            CleanTarget(None) => Outcome::Forward(Status::NotFound),
        }
    }
}

#[get("/_clean-url")]
pub fn clean_url_redirect(target: TrackingRedirect) -> Redirect {
    Redirect::found(target.0)
}
