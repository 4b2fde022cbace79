use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Value};
use v::service::ResourceService;
use v::{Admin, Cache, MemoryCache, MemoryStore, PasswordHasher, RequestCtx, ServiceError, Sha1Hasher, WriteKind};
use vgo_admin::modules::base::model::{base_sys_user, base_sys_user_role};
use vgo_admin::modules::base::seed::{seed_memory_store, INITIAL_ADMIN_PASSWORD};
use vgo_admin::modules::base::service::base_sys_user::password_version_key;
use vgo_admin::modules::base::service::BaseSysUserService;

struct Fixture {
    store: MemoryStore,
    cache: Arc<MemoryCache>,
    svc: BaseSysUserService,
}

fn fixture() -> Fixture {
    let store = MemoryStore::new();
    seed_memory_store(&store, &Sha1Hasher).unwrap();
    let cache = Arc::new(MemoryCache::new());
    let svc = BaseSysUserService::new(Arc::new(store.clone()), cache.clone(), Arc::new(Sha1Hasher));
    store.clear_log();
    Fixture { store, cache, svc }
}

fn admin() -> Option<Admin> {
    Some(Admin {
        user_id: 1,
        username: "admin".into(),
    })
}

fn ctx(params: Value) -> RequestCtx {
    RequestCtx::from_json(admin(), params)
}

fn user_row(f: &Fixture, id: i64) -> serde_json::Map<String, Value> {
    f.store
        .rows(base_sys_user::TABLE_NAME)
        .into_iter()
        .find(|r| r["id"] == json!(id))
        .unwrap()
}

fn roles_of(f: &Fixture, user_id: i64) -> BTreeSet<i64> {
    f.store
        .rows(base_sys_user_role::TABLE_NAME)
        .iter()
        .filter(|r| r["userId"] == json!(user_id))
        .filter_map(|r| r["roleId"].as_i64())
        .collect()
}

async fn add_user(f: &Fixture, username: &str, password: &str, dept: i64) -> i64 {
    let out = f
        .svc
        .service_add(&ctx(json!({
            "username": username,
            "password": password,
            "name": username,
            "departmentId": dept,
        })))
        .await
        .unwrap();
    out["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_delete_superadmin_alone_is_forbidden() {
    let f = fixture();
    let err = f.svc.service_delete(&ctx(json!({"ids": [1]}))).await;
    assert!(matches!(err, Err(ServiceError::Forbidden(m)) if m == "superadmin cannot be deleted"));
    assert_eq!(f.store.rows(base_sys_user::TABLE_NAME).len(), 1);
    assert!(f.store.write_log().is_empty());
}

#[tokio::test]
async fn test_delete_batch_keeps_superadmin() {
    let f = fixture();
    let bob = add_user(&f, "bob", "x", 11).await;
    let carol = add_user(&f, "carol", "x", 12).await;
    f.svc
        .service_update(&ctx(json!({"id": bob, "roleIdList": [10, 11]})))
        .await
        .unwrap();

    f.svc
        .service_delete(&ctx(json!({"ids": [1, bob, carol]})))
        .await
        .unwrap();

    let ids: Vec<i64> = f
        .store
        .rows(base_sys_user::TABLE_NAME)
        .iter()
        .filter_map(|r| r["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![1]);
    assert!(roles_of(&f, bob).is_empty());
    assert_eq!(roles_of(&f, 1), BTreeSet::from([1]));
}

#[tokio::test]
async fn test_role_sync_writes_only_on_change() {
    let f = fixture();
    let bob = add_user(&f, "bob", "x", 11).await;

    f.svc
        .service_update(&ctx(json!({"id": bob, "roleIdList": [10, 11]})))
        .await
        .unwrap();
    f.store.clear_log();

    // 相同集合（顺序与重复不计）/ same set, order and duplicates ignored
    let row = f
        .svc
        .service_update(&ctx(json!({"id": bob, "roleIdList": [11, 10, 10]})))
        .await
        .unwrap();
    assert_eq!(row["roleIdList"], json!([10, 11]));
    assert_eq!(f.store.writes_to(base_sys_user_role::TABLE_NAME), 0);

    f.svc
        .service_update(&ctx(json!({"id": bob, "roleIdList": [11, 1]})))
        .await
        .unwrap();
    assert_eq!(roles_of(&f, bob), BTreeSet::from([1, 11]));
    let kinds: Vec<WriteKind> = f
        .store
        .write_log()
        .iter()
        .filter(|w| w.table == base_sys_user_role::TABLE_NAME)
        .map(|w| w.kind)
        .collect();
    assert_eq!(kinds, vec![WriteKind::Delete, WriteKind::Insert]);
}

#[tokio::test]
async fn test_password_version_scenario() {
    let f = fixture();
    let bob = add_user(&f, "bob", "x", 11).await;
    let stored = user_row(&f, bob);
    assert_eq!(stored["password"], json!(Sha1Hasher.hash("x")));
    assert_eq!(stored["passwordV"], json!(1));

    // 相同口令：不递增、不写缓存 / same password: no bump, no cache write
    let row = f
        .svc
        .service_update(&ctx(json!({"id": bob, "password": "x"})))
        .await
        .unwrap();
    assert!(row.get("password").is_none());
    assert_eq!(user_row(&f, bob)["passwordV"], json!(1));
    assert_eq!(f.cache.write_count(), 0);

    f.svc
        .service_update(&ctx(json!({"id": bob, "password": "y", "passwordV": 99})))
        .await
        .unwrap();
    let stored = user_row(&f, bob);
    assert_eq!(stored["password"], json!(Sha1Hasher.hash("y")));
    assert_eq!(stored["passwordV"], json!(2));
    let cached = f.cache.get(&password_version_key(bob)).await.unwrap();
    assert_eq!(cached, Some(json!(2)));
    assert_eq!(f.cache.write_count(), 1);
}

#[tokio::test]
async fn test_failed_role_write_rolls_back_update() {
    let f = fixture();
    let bob = add_user(&f, "bob", "x", 11).await;
    f.store.fail_writes_to(base_sys_user_role::TABLE_NAME);

    let res = f
        .svc
        .service_update(&ctx(json!({
            "id": bob,
            "password": "y",
            "nickName": "bobby",
            "roleIdList": [10],
        })))
        .await;
    assert!(matches!(res, Err(ServiceError::Db(_))));

    let stored = user_row(&f, bob);
    assert_eq!(stored["password"], json!(Sha1Hasher.hash("x")));
    assert_eq!(stored["passwordV"], json!(1));
    assert!(stored["nickName"].is_null());
    assert_eq!(f.cache.write_count(), 0);
    assert!(f.cache.get(&password_version_key(bob)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_disable_guard() {
    let f = fixture();
    let err = f
        .svc
        .service_update(&ctx(json!({"id": 1, "status": 0})))
        .await;
    assert!(matches!(err, Err(ServiceError::Forbidden(m)) if m == "superadmin cannot be disabled"));
    assert_eq!(user_row(&f, 1)["status"], json!(1));

    let bob = add_user(&f, "bob", "x", 11).await;
    let row = f
        .svc
        .service_update(&ctx(json!({"id": bob, "status": 0})))
        .await
        .unwrap();
    assert_eq!(row["status"], json!(0));
}

#[tokio::test]
async fn test_update_defaults_to_caller_and_reports_missing() {
    let f = fixture();
    let row = f
        .svc
        .service_update(&ctx(json!({"nickName": "root"})))
        .await
        .unwrap();
    assert_eq!(row["id"], json!(1));
    assert_eq!(row["nickName"], json!("root"));
    assert_eq!(row["roleIdList"], json!([1]));

    let missing = f.svc.service_update(&ctx(json!({"id": 404}))).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));

    let anonymous = RequestCtx::from_json(None, json!({"nickName": "x"}));
    let err = f.svc.service_update(&anonymous).await;
    assert!(matches!(err, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_duplicate_username() {
    let f = fixture();
    add_user(&f, "bob", "x", 11).await;
    let err = f
        .svc
        .service_add(&ctx(json!({"username": "bob", "password": "z"})))
        .await;
    assert!(matches!(err, Err(ServiceError::Validation(m)) if m == "duplicate username"));
}

#[tokio::test]
async fn test_keyword_list_joins_department_and_roles() {
    let f = fixture();
    let alice = add_user(&f, "alice", "x", 11).await;
    let malik = add_user(&f, "malik", "x", 12).await;
    add_user(&f, "bob", "x", 12).await;
    f.svc
        .service_update(&ctx(json!({"id": alice, "roleIdList": [10, 11]})))
        .await
        .unwrap();

    let rows = f
        .svc
        .service_list(&ctx(json!({"keyWord": "LI"})))
        .await
        .unwrap();
    let names: BTreeSet<&str> = rows.iter().filter_map(|r| r["username"].as_str()).collect();
    assert_eq!(names, BTreeSet::from(["alice", "malik"]));

    for row in &rows {
        assert!(row.get("password").is_none());
        assert!(row.contains_key("departmentName"));
        assert!(row.contains_key("roleName"));
    }
    let alice_row = rows.iter().find(|r| r["id"] == json!(alice)).unwrap();
    assert_eq!(alice_row["departmentName"], json!("开发"));
    let roles: BTreeSet<&str> = alice_row["roleName"].as_str().unwrap().split(',').collect();
    assert_eq!(roles, BTreeSet::from(["系统管理员", "游客"]));
    let malik_row = rows.iter().find(|r| r["id"] == json!(malik)).unwrap();
    assert!(malik_row["roleName"].is_null());

    let page = f
        .svc
        .service_page(&ctx(json!({"departmentIds": [12], "page": 1, "size": 1})))
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.list.len(), 1);
}

#[tokio::test]
async fn test_move_and_person() {
    let f = fixture();
    let bob = add_user(&f, "bob", "x", 11).await;
    let carol = add_user(&f, "carol", "x", 11).await;

    let moved = f
        .svc
        .move_users(&ctx(json!({"departmentId": 12, "userIds": [bob, carol]})))
        .await
        .unwrap();
    assert_eq!(moved, 2);
    assert_eq!(user_row(&f, carol)["departmentId"], json!(12));

    f.store.clear_log();
    let none = f
        .svc
        .move_users(&ctx(json!({"departmentId": 12, "userIds": []})))
        .await
        .unwrap();
    assert_eq!(none, 0);
    assert!(f.store.write_log().is_empty());

    let me = f.svc.person(&ctx(json!({}))).await.unwrap().unwrap();
    assert_eq!(me["username"], json!("admin"));
    assert!(me.get("password").is_none());
    assert_eq!(
        user_row(&f, 1)["password"],
        json!(Sha1Hasher.hash(INITIAL_ADMIN_PASSWORD))
    );
}

#[tokio::test]
async fn test_numeric_password_is_hashed() {
    let f = fixture();
    let out = f
        .svc
        .service_add(&ctx(json!({"username": "dana", "password": 123456})))
        .await
        .unwrap();
    let dana = out["id"].as_i64().unwrap();
    assert_eq!(user_row(&f, dana)["password"], json!(Sha1Hasher.hash("123456")));

    f.svc
        .service_update(&ctx(json!({"id": dana, "password": 654321})))
        .await
        .unwrap();
    let stored = user_row(&f, dana);
    assert_eq!(stored["password"], json!(Sha1Hasher.hash("654321")));
    assert_eq!(stored["passwordV"], json!(2));
    let cached = f.cache.get(&password_version_key(dana)).await.unwrap();
    assert_eq!(cached, Some(json!(2)));

    let err = f
        .svc
        .service_add(&ctx(json!({"username": "erin", "password": {"plain": "x"}})))
        .await;
    assert!(matches!(err, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_add_without_password_leaves_it_empty() {
    let f = fixture();
    let out = f
        .svc
        .service_add(&ctx(json!({"username": "frank"})))
        .await
        .unwrap();
    let stored = user_row(&f, out["id"].as_i64().unwrap());
    assert!(stored.get("password").map_or(true, Value::is_null));
    assert_eq!(stored["passwordV"], json!(1));
}

#[tokio::test]
async fn test_unreadable_id_does_not_target_caller() {
    let f = fixture();
    let bob = add_user(&f, "bob", "x", 11).await;
    let as_bob = RequestCtx::from_json(
        Some(Admin {
            user_id: bob,
            username: "bob".into(),
        }),
        json!({"id": "nope", "nickName": "hijacked"}),
    );
    let err = f.svc.service_update(&as_bob).await;
    assert!(matches!(err, Err(ServiceError::Validation(m)) if m == "invalid id"));
    assert!(user_row(&f, bob)["nickName"].is_null());
}

#[tokio::test]
async fn test_mistyped_column_is_a_validation_error() {
    let f = fixture();
    let bob = add_user(&f, "bob", "x", 11).await;
    f.store.clear_log();

    let err = f
        .svc
        .service_update(&ctx(json!({"id": bob, "status": "abc"})))
        .await;
    assert!(matches!(err, Err(ServiceError::Validation(m)) if m == "invalid value for status"));
    assert_eq!(user_row(&f, bob)["status"], json!(1));
    assert!(f.store.write_log().is_empty());

    let err = f
        .svc
        .service_add(&ctx(json!({"username": "gus", "departmentId": "dev"})))
        .await;
    assert!(matches!(err, Err(ServiceError::Validation(_))));
}
