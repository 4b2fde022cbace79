// 系统用户管理接口 / System user admin endpoints
use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use serde_json::Value;
use v::service::ResourceService;
use v::{BaseRes, RequestCtx};

use crate::error::AppResult;
use crate::middleware::identity::CurrentAdmin;
use crate::modules::base::service::BaseSysUserService;

/// 注册 `/admin/base/sys/user/*` / register `/admin/base/sys/user/*`
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::scope(path)
            .route("/add", web::post().to(add))
            .route("/delete", web::post().to(delete))
            .route("/update", web::post().to(update))
            .route("/info", web::get().to(info))
            .route("/person", web::get().to(person))
            .route("/list", web::post().to(list))
            .route("/page", web::post().to(page))
            .route("/move", web::post().to(move_users)),
    );
}

fn body_ctx(admin: CurrentAdmin, body: Option<web::Json<Value>>) -> RequestCtx {
    RequestCtx::from_json(admin.0, body.map(|b| b.into_inner()).unwrap_or(Value::Null))
}

fn query_ctx(admin: CurrentAdmin, query: web::Query<HashMap<String, String>>) -> RequestCtx {
    let params = query
        .into_inner()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    RequestCtx::new(admin.0, params)
}

async fn add(
    svc: web::Data<BaseSysUserService>,
    admin: CurrentAdmin,
    body: Option<web::Json<Value>>,
) -> AppResult<HttpResponse> {
    let ctx = body_ctx(admin, body);
    let data = svc.service_add(&ctx).await?;
    Ok(HttpResponse::Ok().json(BaseRes::ok(data)))
}

async fn delete(
    svc: web::Data<BaseSysUserService>,
    admin: CurrentAdmin,
    body: Option<web::Json<Value>>,
) -> AppResult<HttpResponse> {
    let ctx = body_ctx(admin, body);
    svc.service_delete(&ctx).await?;
    Ok(HttpResponse::Ok().json(BaseRes::<Value>::done()))
}

async fn update(
    svc: web::Data<BaseSysUserService>,
    admin: CurrentAdmin,
    body: Option<web::Json<Value>>,
) -> AppResult<HttpResponse> {
    let ctx = body_ctx(admin, body);
    let row = svc.service_update(&ctx).await?;
    Ok(HttpResponse::Ok().json(BaseRes::ok(row)))
}

async fn info(
    svc: web::Data<BaseSysUserService>,
    admin: CurrentAdmin,
    query: web::Query<HashMap<String, String>>,
) -> AppResult<HttpResponse> {
    let ctx = query_ctx(admin, query);
    let row = svc.service_info(&ctx).await?;
    Ok(HttpResponse::Ok().json(BaseRes::ok(row)))
}

async fn person(
    svc: web::Data<BaseSysUserService>,
    admin: CurrentAdmin,
) -> AppResult<HttpResponse> {
    let ctx = RequestCtx::new(admin.0, Default::default());
    let row = svc.person(&ctx).await?;
    Ok(HttpResponse::Ok().json(BaseRes::ok(row)))
}

async fn list(
    svc: web::Data<BaseSysUserService>,
    admin: CurrentAdmin,
    body: Option<web::Json<Value>>,
) -> AppResult<HttpResponse> {
    let ctx = body_ctx(admin, body);
    let rows = svc.service_list(&ctx).await?;
    Ok(HttpResponse::Ok().json(BaseRes::ok(rows)))
}

async fn page(
    svc: web::Data<BaseSysUserService>,
    admin: CurrentAdmin,
    body: Option<web::Json<Value>>,
) -> AppResult<HttpResponse> {
    let ctx = body_ctx(admin, body);
    let page = svc.service_page(&ctx).await?;
    Ok(HttpResponse::Ok().json(BaseRes::ok(page)))
}

async fn move_users(
    svc: web::Data<BaseSysUserService>,
    admin: CurrentAdmin,
    body: Option<web::Json<Value>>,
) -> AppResult<HttpResponse> {
    let ctx = body_ctx(admin, body);
    svc.move_users(&ctx).await?;
    Ok(HttpResponse::Ok().json(BaseRes::<Value>::done()))
}
