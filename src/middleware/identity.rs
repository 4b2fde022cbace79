// 调用者身份：上游认证层放入请求扩展，接口通过 `CurrentAdmin` 读取
// Caller identity: the upstream auth layer stores it in request extensions,
// handlers read it through `CurrentAdmin`

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderMap,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::debug;
use v::Admin;

pub const ADMIN_ID_HEADER: &str = "x-admin-id";
pub const ADMIN_NAME_HEADER: &str = "x-admin-username";

/// 从受信网关头解析身份 / parse identity from trusted gateway headers
pub fn admin_from_headers(headers: &HeaderMap) -> Option<Admin> {
    let user_id = headers
        .get(ADMIN_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;
    let username = headers
        .get(ADMIN_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Some(Admin { user_id, username })
}

/// 将网关转发的身份头写入请求扩展（仅在网关之后部署时启用）
/// Copies gateway identity headers into request extensions; enable only behind a gateway
pub struct TrustedIdentity;

impl<S, B> Transform<S, ServiceRequest> for TrustedIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = TrustedIdentityService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TrustedIdentityService { service }))
    }
}

pub struct TrustedIdentityService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TrustedIdentityService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(admin) = admin_from_headers(req.headers()) {
            debug!(user_id = admin.user_id, "caller identity from gateway headers");
            req.extensions_mut().insert(admin);
        }
        Box::pin(self.service.call(req))
    }
}

/// 当前调用者（未认证为 None）/ current caller, None when unauthenticated
#[derive(Debug, Clone)]
pub struct CurrentAdmin(pub Option<Admin>);

impl FromRequest for CurrentAdmin {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(CurrentAdmin(req.extensions().get::<Admin>().cloned())))
    }
}
