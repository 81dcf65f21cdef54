//! Integration test support for the Giftshop storefront client.
//!
//! [`FakeBackend`] is an in-memory stand-in for the storefront API. It
//! implements [`Transport`], so a real [`Storefront`] runs against it
//! unchanged: cookies, bearer credentials, refresh, and the cart and
//! favorites endpoints all behave like the server's.
//!
//! Every request is recorded, and each one yields to the runtime before it
//! is answered so concurrent calls interleave the way they do over a
//! network.
//!
//! # Example
//!
//! ```rust,ignore
//! let ctx = TestContext::signed_in().await;
//! ctx.backend.expire_access();
//! ctx.storefront.cart().fetch_light().await;
//! assert_eq!(ctx.backend.count(&Method::POST, REFRESH_PATH), 1);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{Value, json};

use giftshop_core::{LocalizedName, Price, ProductId, ProductSnapshot};
use giftshop_storefront::Storefront;
use giftshop_storefront::config::StorefrontConfig;
use giftshop_storefront::models::Credentials;
use giftshop_storefront::transport::{ApiRequest, ApiResponse, Transport, TransportError};

/// Email of the seeded account.
pub const EMAIL: &str = "mona@example.com";
/// Password of the seeded account.
pub const PASSWORD: &str = "giftwrap42";
/// One-time code accepted by `/api/auth/verify`.
pub const VERIFY_CODE: &str = "123456";
/// Id of the seeded account.
pub const USER_ID: &str = "u-1";

/// Timestamp the backend stamps on every added item.
#[must_use]
pub fn date_added() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

/// Products the backend knows: id, English name, Arabic name, unit price.
const CATALOG: &[(&str, &str, &str, i64)] = &[
    ("sku-1", "Rose box", "صندوق ورد", 150),
    ("sku-2", "Oud set", "طقم عود", 200),
    ("sku-3", "Greeting card", "بطاقة تهنئة", 100),
];

fn catalog_entry(product_id: &str) -> Option<(&'static str, &'static str, i64)> {
    CATALOG
        .iter()
        .find(|(id, ..)| *id == product_id)
        .map(|&(_, en, ar, price)| (en, ar, price))
}

/// What the presentation layer would know about a catalog product.
///
/// Unknown ids get an empty name and a zero price.
#[must_use]
pub fn product(product_id: &str) -> ProductSnapshot {
    let (en, ar, price) = catalog_entry(product_id).unwrap_or(("", "", 0));
    ProductSnapshot {
        product_id: ProductId::new(product_id),
        name: LocalizedName::new(en, ar),
        price: Price::from_units(price),
        image: Some(format!("https://cdn.giftshop.test/{product_id}.jpg")),
    }
}

/// A request as the backend received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Status(StatusCode),
    Unreachable,
}

#[derive(Debug, Clone)]
struct Line {
    product_id: String,
    quantity: u32,
}

/// A registered account that is not the one signed in.
#[derive(Debug)]
struct Account {
    user_id: String,
    email: String,
    password: String,
    display_name: String,
    cart: Vec<Line>,
    favorites: Vec<Line>,
}

#[derive(Debug)]
struct BackendState {
    user_id: String,
    email: String,
    password: String,
    display_name: String,
    access: Option<String>,
    refresh: Option<String>,
    issued: u64,
    refresh_revoked: bool,
    reject_all_access: bool,
    cart: Vec<Line>,
    favorites: Vec<Line>,
    faults: Vec<(Method, String, Fault)>,
    others: Vec<Account>,
}

/// In-memory storefront API.
#[derive(Debug)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
    log: Mutex<Vec<RecordedRequest>>,
    yields: usize,
}

impl FakeBackend {
    /// A backend with one registered account and empty collections.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState {
                user_id: USER_ID.to_string(),
                email: EMAIL.to_string(),
                password: PASSWORD.to_string(),
                display_name: "Mona".to_string(),
                access: None,
                refresh: None,
                issued: 0,
                refresh_revoked: false,
                reject_all_access: false,
                cart: Vec::new(),
                favorites: Vec::new(),
                faults: Vec::new(),
                others: Vec::new(),
            }),
            log: Mutex::new(Vec::new()),
            yields: 3,
        })
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self) -> MutexGuard<'_, Vec<RecordedRequest>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log().clone()
    }

    /// How many requests hit `method path`.
    #[must_use]
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.log()
            .iter()
            .filter(|r| &r.method == method && r.path == path)
            .count()
    }

    /// Forget recorded requests.
    pub fn clear_log(&self) {
        self.log().clear();
    }

    /// Product ids in the server-side cart.
    #[must_use]
    pub fn cart_ids(&self) -> Vec<String> {
        self.state().cart.iter().map(|l| l.product_id.clone()).collect()
    }

    /// Email currently on file.
    #[must_use]
    pub fn email(&self) -> String {
        self.state().email.clone()
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Invalidate the current access credential without telling the client.
    pub fn expire_access(&self) {
        let mut state = self.state();
        state.issued += 1;
        state.access = Some(format!("expired-{}", state.issued));
    }

    /// Make every future refresh exchange fail.
    pub fn revoke_refresh(&self) {
        self.state().refresh_revoked = true;
    }

    /// Reject every access credential, including freshly refreshed ones.
    pub fn reject_all_access(&self) {
        self.state().reject_all_access = true;
    }

    /// Answer the next `method path` with `status`.
    pub fn fail_next(&self, method: Method, path: &str, status: StatusCode) {
        self.state()
            .faults
            .push((method, path.to_string(), Fault::Status(status)));
    }

    /// Make the next `method path` fail below HTTP.
    pub fn drop_next(&self, method: Method, path: &str) {
        self.state()
            .faults
            .push((method, path.to_string(), Fault::Unreachable));
    }

    /// Register another account with its own cart and favorites.
    ///
    /// Logging in with its credentials makes it the active account.
    pub fn add_account(&self, user_id: &str, email: &str, password: &str, cart: &[(&str, u32)]) {
        self.state().others.push(Account {
            user_id: user_id.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            display_name: user_id.to_string(),
            cart: cart
                .iter()
                .map(|&(product_id, quantity)| Line {
                    product_id: product_id.to_string(),
                    quantity,
                })
                .collect(),
            favorites: Vec::new(),
        });
    }

    /// Put products in the server-side cart.
    pub fn seed_cart(&self, lines: &[(&str, u32)]) {
        let mut state = self.state();
        for &(product_id, quantity) in lines {
            state.cart.push(Line {
                product_id: product_id.to_string(),
                quantity,
            });
        }
    }

    /// Put products in the server-side favorites.
    pub fn seed_favorites(&self, product_ids: &[&str]) {
        let mut state = self.state();
        for &product_id in product_ids {
            state.favorites.push(Line {
                product_id: product_id.to_string(),
                quantity: 1,
            });
        }
    }

    // =========================================================================
    // Routing
    // =========================================================================

    fn handle(&self, request: &RecordedRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.state();

        let fault = state
            .faults
            .iter()
            .position(|(method, path, _)| *method == request.method && *path == request.path)
            .map(|index| state.faults.remove(index).2);
        match fault {
            Some(Fault::Status(status)) => {
                return Ok(respond(status, &json!({ "message": "Injected failure" })));
            }
            Some(Fault::Unreachable) => {
                return Err(TransportError::Connect("connection reset".to_string()));
            }
            None => {}
        }

        let segments: Vec<&str> = request
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let body = request.body.clone().unwrap_or(Value::Null);

        let response = match (&request.method, segments.as_slice()) {
            (&Method::POST, ["api", "auth", "login"]) => state.login(&body),
            (&Method::POST, ["api", "auth", "verify"]) => state.verify(&body),
            (&Method::POST, ["api", "auth", "register"]) => respond(
                StatusCode::CREATED,
                &json!({ "message": "Verification code sent" }),
            ),
            (&Method::POST, ["api", "auth", "refresh-token"]) => {
                state.refresh(request.cookie.as_deref())
            }
            (&Method::POST, ["api", "auth", "logout"]) => state.logout(),
            _ if !state.authorized(request.bearer.as_deref()) => respond(
                StatusCode::UNAUTHORIZED,
                &json!({ "message": "Access token expired" }),
            ),
            (method, ["api", "user", rest @ ..]) => state.user(method, rest, &body),
            (method, ["api", "cart", rest @ ..]) => state.cart(method, rest, &body),
            (method, ["api", "favorites", rest @ ..]) => state.favorites(method, rest, &body),
            _ => respond(StatusCode::NOT_FOUND, &json!({ "message": "Not found" })),
        };
        Ok(response)
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let recorded = RecordedRequest {
            method: request.method,
            path: request.path,
            body: request.body,
            bearer: request.bearer.map(|b| b.expose_secret().to_owned()),
            cookie: request.cookie.map(|c| c.expose_secret().to_owned()),
        };
        self.log().push(recorded.clone());

        for _ in 0..self.yields {
            tokio::task::yield_now().await;
        }

        self.handle(&recorded)
    }
}

fn respond(status: StatusCode, body: &Value) -> ApiResponse {
    ApiResponse::json_body(status, body)
}

fn cookie_value<'a>(header: Option<&'a str>, name: &str) -> Option<&'a str> {
    header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn decode_id(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |id| id.into_owned())
}

fn set_cookie(name: &str, value: &str, max_age: u64) -> String {
    format!("{name}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Lax")
}

impl BackendState {
    fn authorized(&self, bearer: Option<&str>) -> bool {
        !self.reject_all_access && bearer.is_some() && bearer == self.access.as_deref()
    }

    fn issue(&mut self) -> (String, String) {
        self.issued += 1;
        let access = format!("access-{}", self.issued);
        let refresh = format!("refresh-{}", self.issued);
        self.access = Some(access.clone());
        self.refresh = Some(refresh.clone());
        (access, refresh)
    }

    fn user_json(&self) -> Value {
        json!({
            "user": {
                "id": self.user_id,
                "displayName": self.display_name,
                "email": self.email,
                "emailVerified": true,
            }
        })
    }

    /// Make the stashed account at `index` the active one.
    fn activate(&mut self, index: usize) {
        if index >= self.others.len() {
            return;
        }
        let mut next = self.others.swap_remove(index);
        std::mem::swap(&mut self.user_id, &mut next.user_id);
        std::mem::swap(&mut self.email, &mut next.email);
        std::mem::swap(&mut self.password, &mut next.password);
        std::mem::swap(&mut self.display_name, &mut next.display_name);
        std::mem::swap(&mut self.cart, &mut next.cart);
        std::mem::swap(&mut self.favorites, &mut next.favorites);
        self.others.push(next);
    }

    fn login(&mut self, body: &Value) -> ApiResponse {
        let email = body.get("email").and_then(Value::as_str);
        let password = body.get("password").and_then(Value::as_str);
        if let Some(index) = self
            .others
            .iter()
            .position(|a| Some(a.email.as_str()) == email && Some(a.password.as_str()) == password)
        {
            self.activate(index);
        }
        if email != Some(self.email.as_str()) || password != Some(self.password.as_str()) {
            return respond(
                StatusCode::UNAUTHORIZED,
                &json!({ "message": "Invalid email or password" }),
            );
        }
        let (access, refresh) = self.issue();
        respond(StatusCode::OK, &self.user_json())
            .with_set_cookie(set_cookie("access_token", &access, 864_000))
            .with_set_cookie(set_cookie("refresh_token", &refresh, 2_592_000))
    }

    /// Tokens come back in the body here, not as cookies.
    fn verify(&mut self, body: &Value) -> ApiResponse {
        if body.get("code").and_then(Value::as_str) != Some(VERIFY_CODE) {
            return respond(
                StatusCode::BAD_REQUEST,
                &json!({ "message": "Invalid verification code" }),
            );
        }
        let (access, refresh) = self.issue();
        respond(
            StatusCode::OK,
            &json!({ "accessToken": access, "refreshToken": refresh }),
        )
    }

    fn refresh(&mut self, cookie: Option<&str>) -> ApiResponse {
        let presented = cookie_value(cookie, "refresh_token");
        if self.refresh_revoked || presented.is_none() || presented != self.refresh.as_deref() {
            return respond(
                StatusCode::UNAUTHORIZED,
                &json!({ "message": "Refresh token expired" }),
            );
        }
        self.issued += 1;
        let access = format!("access-{}", self.issued);
        self.access = Some(access.clone());
        respond(StatusCode::OK, &json!({ "success": true }))
            .with_set_cookie(set_cookie("access_token", &access, 864_000))
    }

    fn logout(&mut self) -> ApiResponse {
        self.access = None;
        self.refresh = None;
        respond(StatusCode::OK, &json!({ "success": true }))
            .with_set_cookie(set_cookie("access_token", "", 0))
            .with_set_cookie(set_cookie("refresh_token", "", 0))
    }

    fn user(&mut self, method: &Method, rest: &[&str], body: &Value) -> ApiResponse {
        match (method, rest) {
            (&Method::GET, ["me"]) => respond(StatusCode::OK, &self.user_json()),
            (&Method::DELETE, ["me"]) => {
                self.access = None;
                self.refresh = None;
                self.cart.clear();
                self.favorites.clear();
                ApiResponse::new(StatusCode::NO_CONTENT, "")
            }
            (&Method::PATCH, ["email"]) => match body.get("email").and_then(Value::as_str) {
                Some(email) => {
                    self.email = email.to_string();
                    respond(StatusCode::OK, &json!({ "success": true }))
                }
                None => respond(StatusCode::BAD_REQUEST, &json!({ "message": "Email required" })),
            },
            (&Method::POST, ["change-password"]) => {
                if body.get("currentPassword").and_then(Value::as_str) != Some(self.password.as_str()) {
                    return respond(
                        StatusCode::BAD_REQUEST,
                        &json!({ "message": "Current password is incorrect" }),
                    );
                }
                if let Some(new) = body.get("newPassword").and_then(Value::as_str) {
                    self.password = new.to_string();
                }
                respond(StatusCode::OK, &json!({ "success": true }))
            }
            _ => respond(StatusCode::NOT_FOUND, &json!({ "message": "Not found" })),
        }
    }

    fn cart(&mut self, method: &Method, rest: &[&str], body: &Value) -> ApiResponse {
        match (method, rest) {
            (&Method::GET, []) => respond(
                StatusCode::OK,
                &json!({
                    "items": self.cart.iter().map(|l| line_json(l, true)).collect::<Vec<_>>(),
                    "count": self.cart.len(),
                    "totalAmount": total(&self.cart, true),
                }),
            ),
            (&Method::GET, ["count"]) => respond(
                StatusCode::OK,
                &json!({ "count": self.cart.len(), "total": total(&self.cart, true) }),
            ),
            (&Method::POST, ["items"]) => {
                let Some(product_id) = body.get("productId").and_then(Value::as_str) else {
                    return respond(StatusCode::BAD_REQUEST, &json!({ "message": "productId required" }));
                };
                if catalog_entry(product_id).is_none() {
                    return respond(StatusCode::NOT_FOUND, &json!({ "message": "Product not found" }));
                }
                let quantity = body
                    .get("quantity")
                    .and_then(Value::as_u64)
                    .and_then(|q| u32::try_from(q).ok())
                    .unwrap_or(1);
                if !self.cart.iter().any(|l| l.product_id == product_id) {
                    self.cart.push(Line {
                        product_id: product_id.to_string(),
                        quantity,
                    });
                }
                self.item_receipt(product_id, true)
            }
            (&Method::PATCH, ["items", id]) => {
                let id = decode_id(id);
                let quantity = body
                    .get("quantity")
                    .and_then(Value::as_u64)
                    .and_then(|q| u32::try_from(q).ok())
                    .unwrap_or(0);
                if quantity == 0 {
                    return respond(StatusCode::BAD_REQUEST, &json!({ "message": "Invalid quantity" }));
                }
                match self.cart.iter_mut().find(|l| l.product_id == id) {
                    Some(line) => line.quantity = quantity,
                    None => {
                        return respond(StatusCode::NOT_FOUND, &json!({ "message": "Item not in cart" }));
                    }
                }
                self.item_receipt(&id, true)
            }
            (&Method::DELETE, ["items", id]) => {
                let id = decode_id(id);
                self.cart.retain(|l| l.product_id != id);
                respond(
                    StatusCode::OK,
                    &json!({ "count": self.cart.len(), "totalAmount": total(&self.cart, true) }),
                )
            }
            (&Method::DELETE, []) => {
                self.cart.clear();
                respond(StatusCode::OK, &json!({ "count": 0, "totalAmount": 0 }))
            }
            _ => respond(StatusCode::NOT_FOUND, &json!({ "message": "Not found" })),
        }
    }

    fn favorites(&mut self, method: &Method, rest: &[&str], body: &Value) -> ApiResponse {
        match (method, rest) {
            (&Method::GET, []) => respond(
                StatusCode::OK,
                &json!({
                    "items": self.favorites.iter().map(|l| line_json(l, false)).collect::<Vec<_>>(),
                    "count": self.favorites.len(),
                }),
            ),
            (&Method::GET, ["ids"]) => respond(
                StatusCode::OK,
                &json!({
                    "ids": self.favorites.iter().map(|l| l.product_id.clone()).collect::<Vec<_>>(),
                }),
            ),
            (&Method::GET, ["count"]) => {
                respond(StatusCode::OK, &json!({ "count": self.favorites.len() }))
            }
            (&Method::POST, []) => {
                let Some(product_id) = body.get("productId").and_then(Value::as_str) else {
                    return respond(StatusCode::BAD_REQUEST, &json!({ "message": "productId required" }));
                };
                if catalog_entry(product_id).is_none() {
                    return respond(StatusCode::NOT_FOUND, &json!({ "message": "Product not found" }));
                }
                if !self.favorites.iter().any(|l| l.product_id == product_id) {
                    self.favorites.push(Line {
                        product_id: product_id.to_string(),
                        quantity: 1,
                    });
                }
                self.item_receipt(product_id, false)
            }
            (&Method::DELETE, [id]) => {
                let id = decode_id(id);
                self.favorites.retain(|l| l.product_id != id);
                respond(StatusCode::OK, &json!({ "count": self.favorites.len() }))
            }
            (&Method::DELETE, []) => {
                self.favorites.clear();
                respond(StatusCode::OK, &json!({ "count": 0 }))
            }
            _ => respond(StatusCode::NOT_FOUND, &json!({ "message": "Not found" })),
        }
    }

    fn item_receipt(&self, product_id: &str, cart: bool) -> ApiResponse {
        let lines = if cart { &self.cart } else { &self.favorites };
        let item = lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| line_json(l, cart));
        respond(
            StatusCode::OK,
            &json!({ "item": item, "count": lines.len(), "totalAmount": total(lines, cart) }),
        )
    }
}

fn line_json(line: &Line, with_quantity: bool) -> Value {
    let (en, ar, price) = catalog_entry(&line.product_id).unwrap_or(("", "", 0));
    let mut value = json!({
        "productId": line.product_id,
        "nameEn": en,
        "nameAr": ar,
        "price": price,
        "image": format!("https://cdn.giftshop.test/{}.jpg", line.product_id),
        "dateAdded": date_added(),
    });
    if with_quantity {
        if let Some(object) = value.as_object_mut() {
            object.insert("quantity".to_string(), json!(line.quantity));
        }
    }
    value
}

fn total(lines: &[Line], with_quantity: bool) -> i64 {
    lines
        .iter()
        .map(|l| {
            let price = catalog_entry(&l.product_id).map_or(0, |(_, _, price)| price);
            if with_quantity {
                price * i64::from(l.quantity)
            } else {
                price
            }
        })
        .sum()
}

/// A [`Storefront`] wired to a [`FakeBackend`].
pub struct TestContext {
    pub backend: Arc<FakeBackend>,
    pub storefront: Storefront,
}

impl TestContext {
    /// Signed out, nothing loaded.
    ///
    /// # Panics
    ///
    /// Never; the base URL is a constant.
    #[must_use]
    pub fn new() -> Self {
        let backend = FakeBackend::new();
        let config = StorefrontConfig::for_base_url("http://giftshop.test")
            .expect("constant base URL parses");
        let storefront = Storefront::with_transport(config, backend.clone());
        Self {
            backend,
            storefront,
        }
    }

    /// Signed in with the seeded account; the request log is empty.
    ///
    /// # Panics
    ///
    /// If the seeded credentials are refused.
    pub async fn signed_in() -> Self {
        let ctx = Self::new();
        ctx.storefront
            .session()
            .login(&Credentials::password(EMAIL, PASSWORD))
            .await
            .expect("seeded account logs in");
        ctx.backend.clear_log();
        ctx
    }

    /// Requests other than the refresh exchange.
    #[must_use]
    pub fn api_requests(&self) -> usize {
        self.backend
            .requests()
            .iter()
            .filter(|r| r.path != giftshop_storefront::auth::REFRESH_PATH)
            .count()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
