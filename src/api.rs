use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::draft::NewItem;
use crate::error::ApiError;
use crate::models::{Category, FavoriteFilter, Item, ListParams, ListResponse, ListingFilter, ListingPage, Location, User};
use crate::session::Session;

// --- Transport seam ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text { name: String, value: String },
    File { name: String, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<Part>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Already url-encoded, without the leading `?`.
    pub query: String,
    pub body: Body,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: String::new(),
            body: Body::Empty,
        }
    }

    pub fn post(path: impl Into<String>, body: Body) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: String::new(),
            body,
        }
    }

    pub fn with_query(mut self, query: String) -> Self {
        self.query = query;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can carry an `ApiRequest` to the server and bring back the
/// raw response. Non-success statuses are returned as responses, not errors.
pub trait Transport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        (**self).execute(request)
    }
}

// --- reqwest transport ---

#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    session: Session,
}

impl HttpTransport {
    pub fn new(config: &Config, session: Session) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("finder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session,
        })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        if !request.query.is_empty() {
            url.push('?');
            url.push_str(&request.query);
        }
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .header(ACCEPT, "application/json");

        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart(parts) => {
                let mut form = reqwest::blocking::multipart::Form::new();
                for part in parts {
                    form = match part {
                        Part::Text { name, value } => form.text(name.clone(), value.clone()),
                        Part::File { name, path } => form.file(name.clone(), path)?,
                    };
                }
                builder.multipart(form)
            }
        };

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        tracing::debug!("{:?} {} -> {}", request.method, url, status);
        Ok(ApiResponse { status, body })
    }
}

// --- Auth interceptor ---

/// Middleware every request passes through: an authorization failure logs
/// the session out and is reported as `SessionExpired` instead of a response.
#[derive(Debug)]
pub struct AuthInterceptor<T> {
    inner: T,
    session: Session,
}

impl<T: Transport> AuthInterceptor<T> {
    pub fn new(inner: T, session: Session) -> Self {
        Self { inner, session }
    }
}

impl<T: Transport> Transport for AuthInterceptor<T> {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.inner.execute(request)?;
        if response.status == 401 || response.status == 403 {
            tracing::warn!("{} answered {}, logging out", request.path, response.status);
            self.session.logout();
            return Err(ApiError::SessionExpired {
                status: response.status,
            });
        }
        Ok(response)
    }
}

// --- Typed client ---

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CreatedId {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ToggleResult {
    result: bool,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    access_token: String,
    user: User,
}

pub type HttpApi = ApiClient<AuthInterceptor<HttpTransport>>;

#[derive(Debug)]
pub struct ApiClient<T> {
    transport: T,
}

impl HttpApi {
    pub fn connect(config: &Config, session: Session) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config, session.clone())?;
        Ok(ApiClient::new(AuthInterceptor::new(transport, session)))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    fn send<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, ApiError> {
        let response = self.transport.execute(&request)?;
        if !response.is_success() {
            let err = ApiError::from_body(response.status, &response.body);
            tracing::error!("{} failed: {}", request.path, err);
            return Err(err);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    pub fn list_items(&self, params: &ListParams) -> Result<ListingPage, ApiError> {
        let request = ApiRequest::get("posts").with_query(serde_urlencoded::to_string(params)?);
        let response: ListResponse = self.send(request)?;
        Ok(response.into())
    }

    /// Saves the filter (full category/location objects, as the server keeps
    /// them for later re-entry) and returns the new favorite's id.
    pub fn create_favorite_filter(&self, filter: &ListingFilter) -> Result<i64, ApiError> {
        let body = Body::Json(serde_json::to_value(filter)?);
        let created: Envelope<CreatedId> = self.send(ApiRequest::post("favorites/filters", body))?;
        Ok(created.data.id)
    }

    pub fn toggle_favorite_filter(&self, id: i64) -> Result<bool, ApiError> {
        let path = format!("favorites/filters/{}/toggle", id);
        let toggled: ToggleResult = self.send(ApiRequest::post(path, Body::Empty))?;
        Ok(toggled.result)
    }

    pub fn favorite_filters(&self) -> Result<Vec<FavoriteFilter>, ApiError> {
        let list: Envelope<Vec<FavoriteFilter>> = self.send(ApiRequest::get("favorites/filters"))?;
        Ok(list.data)
    }

    pub fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let list: Envelope<Vec<Category>> = self.send(ApiRequest::get("categories"))?;
        Ok(list.data)
    }

    pub fn locations(&self) -> Result<Vec<Location>, ApiError> {
        let list: Envelope<Vec<Location>> = self.send(ApiRequest::get("locations"))?;
        Ok(list.data)
    }

    pub fn create_item(&self, item: &NewItem) -> Result<Item, ApiError> {
        let created: Envelope<Item> = self.send(ApiRequest::post("posts", Body::Multipart(item.to_parts())))?;
        Ok(created.data)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<(String, User), ApiError> {
        let body = Body::Json(serde_json::to_value(LoginRequest { email, password })?);
        let login: Envelope<LoginData> = self.send(ApiRequest::post("auth/login", body))?;
        Ok((login.data.access_token, login.data.user))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ListingKind, RecencyWindow};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned responses in order and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: RefCell<VecDeque<ApiResponse>>,
        pub(crate) seen: RefCell<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn respond(self, status: u16, body: &str) -> Self {
            self.responses.borrow_mut().push_back(ApiResponse {
                status,
                body: body.to_string(),
            });
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
            self.seen.borrow_mut().push(request.clone());
            Ok(self
                .responses
                .borrow_mut()
                .pop_front()
                .expect("no scripted response left"))
        }
    }

    fn signed_in() -> Session {
        let session = Session::ephemeral();
        session
            .sign_in(
                "tok".to_string(),
                User {
                    name: "Taras".to_string(),
                    email: "taras@example.com".to_string(),
                    phone: None,
                    photo: None,
                    location: None,
                },
            )
            .unwrap();
        session
    }

    #[test]
    fn test_list_items_sends_flattened_query() {
        let transport = ScriptedTransport::default().respond(
            200,
            r#"{"data":[{"id":1,"name":"Wallet","type":"i_find"}],"meta":{"current_page":1,"last_page":3}}"#,
        );
        let client = ApiClient::new(&transport);

        let filter = ListingFilter {
            category: Some(Category {
                id: 5,
                name: "Documents".to_string(),
            }),
            recency: Some(RecencyWindow::Month),
            with_photo: true,
            q: "brown".to_string(),
            ..ListingFilter::for_kind(ListingKind::Found)
        };
        let page = client.list_items(&ListParams::from_filter(&filter, 2)).unwrap();
        assert_eq!(page.page, 1);
        assert!(page.has_more_pages);
        assert_eq!(page.items[0].name, "Wallet");

        let seen = transport.seen.borrow();
        assert_eq!(seen[0].method, Method::Get);
        assert_eq!(seen[0].path, "posts");
        let mut query: Vec<(String, String)> = serde_urlencoded::from_str(&seen[0].query).unwrap();
        query.sort();
        assert_eq!(
            query,
            vec![
                ("category".to_string(), "5".to_string()),
                ("last".to_string(), "month".to_string()),
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "brown".to_string()),
                ("type".to_string(), "i_find".to_string()),
                ("withPhoto".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_unauthorized_logs_out_through_interceptor() {
        let session = signed_in();
        let transport = ScriptedTransport::default().respond(401, r#"{"message":"Unauthenticated."}"#);
        let client = ApiClient::new(AuthInterceptor::new(&transport, session.clone()));

        let err = client.toggle_favorite_filter(4).unwrap_err();
        assert!(err.is_auth());
        assert!(!session.is_signed_in());
    }

    #[test]
    fn test_forbidden_also_logs_out() {
        let session = signed_in();
        let transport = ScriptedTransport::default().respond(403, "");
        let client = ApiClient::new(AuthInterceptor::new(&transport, session.clone()));

        let err = client.categories().unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired { status: 403 }));
        assert!(!session.is_signed_in());
    }

    #[test]
    fn test_validation_error_keeps_session() {
        let session = signed_in();
        let transport = ScriptedTransport::default().respond(422, r#"{"message":"Name is required"}"#);
        let client = ApiClient::new(AuthInterceptor::new(&transport, session.clone()));

        let err = client.create_favorite_filter(&ListingFilter::default()).unwrap_err();
        assert_eq!(err.to_string(), "Name is required");
        assert!(session.is_signed_in());
    }

    #[test]
    fn test_create_and_toggle_favorite_filter() {
        let transport = ScriptedTransport::default()
            .respond(201, r#"{"data":{"id":42}}"#)
            .respond(200, r#"{"result":true}"#);
        let client = ApiClient::new(&transport);

        let filter = ListingFilter {
            q: "cat".to_string(),
            ..ListingFilter::default()
        };
        assert_eq!(client.create_favorite_filter(&filter).unwrap(), 42);
        assert!(client.toggle_favorite_filter(42).unwrap());

        let seen = transport.seen.borrow();
        match &seen[0].body {
            Body::Json(value) => assert_eq!(value["q"], "cat"),
            other => panic!("unexpected body {:?}", other),
        }
        assert_eq!(seen[1].path, "favorites/filters/42/toggle");
    }

    #[test]
    fn test_login_keeps_token_and_profile() {
        let transport = ScriptedTransport::default().respond(
            200,
            r#"{"data":{"access_token":"abc","user":{"name":"Iryna","email":"i@example.com","phone":"0670000000","photo":null,"location":{"id":1,"name":"Kyiv"},"role":"user"}}}"#,
        );
        let client = ApiClient::new(&transport);

        let (token, user) = client.login("i@example.com", "secret").unwrap();
        assert_eq!(token, "abc");
        assert_eq!(user.location.unwrap().name, "Kyiv");
    }

    #[test]
    fn test_query_string_is_url_encoded() {
        let transport = ScriptedTransport::default()
            .respond(200, r#"{"data":[],"meta":{"current_page":1,"last_page":1}}"#);
        let client = ApiClient::new(&transport);

        let filter = ListingFilter {
            q: "keys & wallet".to_string(),
            date_from: chrono::NaiveDate::from_ymd_opt(2024, 5, 1),
            ..ListingFilter::default()
        };
        client.list_items(&ListParams::from_filter(&filter, 1)).unwrap();

        assert_eq!(
            transport.seen.borrow()[0].query,
            "type=i_looking_for&action_at_from=2024-05-01&q=keys+%26+wallet"
        );
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let transport = ScriptedTransport::default().respond(200, "not json");
        let client = ApiClient::new(&transport);
        assert!(matches!(client.locations(), Err(ApiError::Decode(_))));
    }
}
