//! LeanCloud REST client
//!
//! Mirrors the Supabase adapter on top of the LeanCloud storage API
//! (`/1.1`). Objects are normalized into the same row shape the domain
//! types expect: `objectId` becomes `id`, `createdAt` becomes `created_at`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use super::http::{self, PAGE_SIZE};
use crate::config::LeanCloudSettings;
use crate::domain::result::{Error, Result};
use crate::domain::{
    AuthUser, BackendKind, Category, Company, Credentials, NewCategory, NewCompany, NewStore,
    Profile, Session, Store, Transaction, TransactionRecord,
};
use crate::ports::{AuthProvider, LedgerRepository, TransactionFilter};

const NAME: &str = "LeanCloud";

const TRANSACTION: &str = "Transaction";
const CATEGORY: &str = "Category";
const STORE: &str = "Store";
const PROFILE: &str = "Profile";
const COMPANY: &str = "Company";

// LeanCloud error codes
const OBJECT_NOT_FOUND: i64 = 101;
/// A unique index rejected the write
const DUPLICATE_VALUE: i64 = 137;
const USERNAME_TAKEN: i64 = 202;
const EMAIL_TAKEN: i64 = 203;
const PASSWORD_MISMATCH: i64 = 210;
const USER_NOT_FOUND: i64 = 211;

#[derive(Clone, Copy)]
enum Auth<'a> {
    User(&'a Session),
    Master,
}

/// LeanCloud API client
pub struct LeanCloudClient {
    client: Client,
    server_url: String,
    app_id: String,
    app_key: String,
    master_key: Option<String>,
}

impl LeanCloudClient {
    pub fn new(settings: &LeanCloudSettings) -> Result<Self> {
        if settings.app_id.is_empty() || settings.app_key.is_empty() {
            return Err(Error::Config("LeanCloud app id and app key cannot be empty".to_string()));
        }
        Ok(Self {
            client: http::build_client()?,
            server_url: settings.server_url.trim_end_matches('/').to_string(),
            app_id: settings.app_id.clone(),
            app_key: settings.app_key.clone(),
            master_key: settings.master_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/1.1/{}", self.server_url, path)
    }

    fn class_url(&self, class: &str) -> String {
        self.url(&format!("classes/{}", class))
    }

    fn object_url(&self, class: &str, id: &str) -> String {
        self.url(&format!("classes/{}/{}", class, id))
    }

    fn anonymous(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("X-LC-Id", &self.app_id)
            .header("X-LC-Key", &self.app_key)
    }

    fn request(&self, method: Method, url: &str, auth: Auth<'_>) -> Result<RequestBuilder> {
        match auth {
            Auth::User(session) => Ok(self
                .anonymous(method, url)
                .header("X-LC-Session", &session.access_token)),
            Auth::Master => {
                let key = self.master_key.as_ref().ok_or_else(|| {
                    Error::Config("LEANCLOUD_MASTER_KEY is required for this operation".to_string())
                })?;
                Ok(self
                    .client
                    .request(method, url)
                    .header("X-LC-Id", &self.app_id)
                    .header("X-LC-Key", format!("{},master", key)))
            }
        }
    }

    fn privileged<'a>(&self, session: &'a Session) -> Auth<'a> {
        if self.master_key.is_some() {
            Auth::Master
        } else {
            Auth::User(session)
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<JsonValue> {
        let response = builder
            .send()
            .await
            .map_err(|e| http::map_request_error(NAME, e))?;
        http::read_json_with(NAME, response, leancloud_error).await
    }

    /// Paged query on a class
    async fn query<T: DeserializeOwned>(
        &self,
        class: &str,
        conditions: JsonValue,
        order: Option<&str>,
        auth: Auth<'_>,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut skip = 0usize;
        loop {
            let mut params = vec![
                ("where", conditions.to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("skip", skip.to_string()),
            ];
            if let Some(order) = order {
                params.push(("order", order.to_string()));
            }
            let builder = self.request(Method::GET, &self.class_url(class), auth)?.query(&params);
            let body = self.send(builder).await?;
            let results = match body.get("results") {
                Some(JsonValue::Array(results)) => results.clone(),
                _ => return Err(Error::backend("LeanCloud query returned no results array")),
            };
            let fetched = results.len();
            for object in results {
                rows.push(decode(class, object)?);
            }
            if fetched < PAGE_SIZE {
                return Ok(rows);
            }
            skip += fetched;
        }
    }

    async fn query_one<T: DeserializeOwned>(
        &self,
        class: &str,
        conditions: JsonValue,
        auth: Auth<'_>,
    ) -> Result<Option<T>> {
        let params = [("where", conditions.to_string()), ("limit", "1".to_string())];
        let builder = self.request(Method::GET, &self.class_url(class), auth)?.query(&params);
        let body = self.send(builder).await?;
        match body.get("results").and_then(JsonValue::as_array).and_then(|r| r.first()) {
            Some(object) => Ok(Some(decode(class, object.clone())?)),
            None => Ok(None),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, class: &str, id: &str, auth: Auth<'_>) -> Result<Option<T>> {
        let builder = self.request(Method::GET, &self.object_url(class, id), auth)?;
        match self.send(builder).await {
            Ok(JsonValue::Object(map)) if map.is_empty() => Ok(None),
            Ok(object) => Ok(Some(decode(class, object)?)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create an object and return it with server-assigned fields merged in
    async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        class: &str,
        body: &B,
        auth: Auth<'_>,
    ) -> Result<T> {
        let mut object = serde_json::to_value(body)?;
        strip_reserved(&mut object);
        let builder = self
            .request(Method::POST, &self.class_url(class), auth)?
            .query(&[("fetchWhenSave", "true")])
            .json(&object);
        let created = self.send(builder).await?;
        if let (JsonValue::Object(target), JsonValue::Object(fields)) = (&mut object, created) {
            target.extend(fields);
        }
        decode(class, object)
    }

    /// Update fields of an object, then read it back whole
    async fn update<T: DeserializeOwned>(
        &self,
        class: &str,
        id: &str,
        fields: JsonValue,
        auth: Auth<'_>,
    ) -> Result<T> {
        let builder = self
            .request(Method::PUT, &self.object_url(class, id), auth)?
            .json(&fields);
        self.send(builder).await?;
        self.fetch(class, id, auth)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} {}", class, id)))
    }

    async fn destroy(&self, class: &str, id: &str, auth: Auth<'_>) -> Result<()> {
        let builder = self.request(Method::DELETE, &self.object_url(class, id), auth)?;
        self.send(builder).await.map(|_| ())
    }

    async fn current_user(&self, token: &str) -> Result<JsonValue> {
        let builder = self
            .anonymous(Method::GET, &self.url("users/me"))
            .header("X-LC-Session", token);
        self.send(builder).await.map_err(|e| match e {
            Error::Backend(_) | Error::Unauthorized(_) | Error::NotFound(_) | Error::Validation(_) => {
                Error::unauthorized("Session expired, please sign in again")
            }
            other => other,
        })
    }
}

/// Drop fields LeanCloud manages itself
/// LeanCloud reports most failures as HTTP 400 with a numeric `code`
fn leancloud_error(status: StatusCode, body: &JsonValue, message: Option<String>) -> Error {
    let or = |fallback: &str| message.clone().unwrap_or_else(|| fallback.to_string());
    match body.get("code").and_then(JsonValue::as_i64) {
        Some(PASSWORD_MISMATCH) | Some(USER_NOT_FOUND) => {
            Error::unauthorized(or("Invalid email or password"))
        }
        Some(USERNAME_TAKEN) | Some(EMAIL_TAKEN) => Error::conflict(or("Account already exists")),
        Some(DUPLICATE_VALUE) => Error::conflict(or("A record with this value already exists")),
        Some(OBJECT_NOT_FOUND) => Error::not_found(or("Object not found")),
        _ => http::status_error(NAME, status, message),
    }
}

fn strip_reserved(object: &mut JsonValue) {
    if let JsonValue::Object(map) = object {
        for key in ["id", "objectId", "created_at", "updated_at", "createdAt", "updatedAt", "ACL"] {
            map.remove(key);
        }
    }
}

/// Rename LeanCloud bookkeeping fields into the shape the domain types use
pub(crate) fn normalize(class: &str, object: JsonValue) -> JsonValue {
    let JsonValue::Object(mut map) = object else {
        return object;
    };
    map.remove("ACL");
    if let Some(id) = map.remove("objectId") {
        map.insert("id".to_string(), id);
    }
    if let Some(created) = map.remove("createdAt") {
        map.insert("created_at".to_string(), created);
    }
    if let Some(updated) = map.remove("updatedAt") {
        map.insert("updated_at".to_string(), updated);
    }
    // Profiles are addressed by the user they belong to
    if class == PROFILE {
        if let Some(user_id) = map.get("user_id").cloned() {
            map.insert("id".to_string(), user_id);
        }
    }
    JsonValue::Object(map)
}

fn decode<T: DeserializeOwned>(class: &str, object: JsonValue) -> Result<T> {
    Ok(serde_json::from_value(normalize(class, object))?)
}

fn session_from_user(user: &JsonValue, fallback_token: Option<&str>) -> Result<Session> {
    let token = user
        .get("sessionToken")
        .and_then(JsonValue::as_str)
        .or(fallback_token)
        .ok_or_else(|| Error::backend("LeanCloud response carried no session token"))?;
    let user_id = user
        .get("objectId")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::backend("LeanCloud response carried no user id"))?;
    let mut session = Session::new(BackendKind::LeanCloud, token, user_id);
    session.username = user.get("username").and_then(JsonValue::as_str).map(str::to_string);
    Ok(session)
}

/// `where` clause for a transaction query
pub(crate) fn transaction_conditions(filter: &TransactionFilter) -> JsonValue {
    let mut conditions = Map::new();
    conditions.insert("company_id".to_string(), JsonValue::from(filter.company_id.clone()));
    if let Some(ids) = &filter.store_ids {
        conditions.insert("store_id".to_string(), serde_json::json!({ "$in": ids }));
    }
    let mut range = Map::new();
    if let Some(start) = filter.start_date {
        range.insert("$gte".to_string(), JsonValue::from(start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = filter.end_date {
        range.insert("$lte".to_string(), JsonValue::from(end.format("%Y-%m-%d").to_string()));
    }
    if !range.is_empty() {
        conditions.insert("date".to_string(), JsonValue::Object(range));
    }
    if let Some(kind) = filter.kind {
        conditions.insert("type".to_string(), JsonValue::from(kind.as_str()));
    }
    if let Some(category) = &filter.category {
        conditions.insert("category".to_string(), JsonValue::from(category.clone()));
    }
    JsonValue::Object(conditions)
}

#[async_trait]
impl AuthProvider for LeanCloudClient {
    fn kind(&self) -> BackendKind {
        BackendKind::LeanCloud
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let builder = self
            .anonymous(Method::POST, &self.url("login"))
            .json(&serde_json::json!({
                "username": credentials.email,
                "password": credentials.password,
            }));
        let user = self.send(builder).await?;
        session_from_user(&user, None)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session> {
        let builder = self
            .anonymous(Method::POST, &self.url("users"))
            .json(&serde_json::json!({
                "username": credentials.email,
                "email": credentials.email,
                "password": credentials.password,
                "full_name": credentials.full_name,
            }));
        let mut user = self.send(builder).await?;
        if let JsonValue::Object(map) = &mut user {
            map.entry("username")
                .or_insert_with(|| JsonValue::from(credentials.email.clone()));
        }
        session_from_user(&user, None)
    }

    async fn sign_out(&self, _session: &Session) -> Result<()> {
        // No server-side logout; dropping the cookies ends the session
        Ok(())
    }

    async fn get_user(&self, session: &Session) -> Result<AuthUser> {
        let user = self.current_user(&session.access_token).await?;
        let id = user
            .get("objectId")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::unauthorized("Session expired, please sign in again"))?;
        Ok(AuthUser {
            id: id.to_string(),
            email: user.get("email").and_then(JsonValue::as_str).map(str::to_string),
            username: user.get("username").and_then(JsonValue::as_str).map(str::to_string),
        })
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let user = self.current_user(&session.access_token).await?;
        let mut refreshed = session_from_user(&user, Some(&session.access_token))?;
        refreshed.company_code = session.company_code.clone();
        Ok(refreshed)
    }
}

#[async_trait]
impl LedgerRepository for LeanCloudClient {
    async fn get_profile(&self, session: &Session, user_id: &str) -> Result<Option<Profile>> {
        self.query_one(PROFILE, serde_json::json!({"user_id": user_id}), self.privileged(session))
            .await
    }

    async fn list_profiles(&self, session: &Session, company_id: &str) -> Result<Vec<Profile>> {
        self.query(
            PROFILE,
            serde_json::json!({"company_id": company_id}),
            Some("full_name"),
            self.privileged(session),
        )
        .await
    }

    async fn save_profile(&self, session: &Session, profile: &Profile) -> Result<Profile> {
        let auth = self.privileged(session);
        let mut fields = serde_json::to_value(profile)?;
        if let JsonValue::Object(map) = &mut fields {
            map.remove("id");
            map.insert("user_id".to_string(), JsonValue::from(profile.id.clone()));
        }

        // Look up the raw object to learn its objectId
        let params = [
            ("where", serde_json::json!({"user_id": profile.id}).to_string()),
            ("limit", "1".to_string()),
        ];
        let builder = self.request(Method::GET, &self.class_url(PROFILE), auth)?.query(&params);
        let existing = self.send(builder).await?;
        let object_id = existing
            .get("results")
            .and_then(JsonValue::as_array)
            .and_then(|r| r.first())
            .and_then(|o| o.get("objectId"))
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        match object_id {
            Some(object_id) => self.update(PROFILE, &object_id, fields, auth).await,
            None => self.create(PROFILE, &fields, auth).await,
        }
    }

    async fn get_company(&self, session: &Session, company_id: &str) -> Result<Option<Company>> {
        self.fetch(COMPANY, company_id, self.privileged(session)).await
    }

    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        self.query_one(COMPANY, serde_json::json!({"company_code": code}), Auth::Master)
            .await
    }

    async fn create_company(&self, session: &Session, company: &NewCompany) -> Result<Company> {
        self.create(COMPANY, company, self.privileged(session)).await
    }

    async fn list_stores(&self, session: &Session, company_id: &str) -> Result<Vec<Store>> {
        self.query(
            STORE,
            serde_json::json!({"company_id": company_id}),
            Some("createdAt"),
            Auth::User(session),
        )
        .await
    }

    async fn create_store(&self, session: &Session, store: &NewStore) -> Result<Store> {
        self.create(STORE, store, Auth::User(session)).await
    }

    async fn update_store(&self, session: &Session, id: &str, name: &str) -> Result<Store> {
        self.update(STORE, id, serde_json::json!({"name": name}), Auth::User(session))
            .await
    }

    async fn delete_store(&self, session: &Session, id: &str) -> Result<()> {
        self.destroy(STORE, id, Auth::User(session)).await
    }

    async fn list_categories(&self, session: &Session, company_id: &str) -> Result<Vec<Category>> {
        self.query(
            CATEGORY,
            serde_json::json!({"company_id": company_id}),
            Some("type,name"),
            Auth::User(session),
        )
        .await
    }

    async fn create_category(&self, session: &Session, category: &NewCategory) -> Result<Category> {
        self.create(CATEGORY, category, Auth::User(session)).await
    }

    async fn delete_category(&self, session: &Session, id: &str) -> Result<()> {
        self.destroy(CATEGORY, id, Auth::User(session)).await
    }

    async fn list_transactions(
        &self,
        session: &Session,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        if filter.store_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }
        self.query(
            TRANSACTION,
            transaction_conditions(filter),
            Some("-date,-createdAt"),
            Auth::User(session),
        )
        .await
    }

    async fn get_transaction(&self, session: &Session, id: &str) -> Result<Option<Transaction>> {
        self.fetch(TRANSACTION, id, Auth::User(session)).await
    }

    async fn create_transaction(
        &self,
        session: &Session,
        record: &TransactionRecord,
    ) -> Result<Transaction> {
        self.create(TRANSACTION, record, Auth::User(session)).await
    }

    async fn update_transaction(&self, session: &Session, tx: &Transaction) -> Result<Transaction> {
        self.update(TRANSACTION, &tx.id, super::transaction_patch(tx)?, Auth::User(session))
            .await
    }

    async fn delete_transaction(&self, session: &Session, id: &str) -> Result<()> {
        self.destroy(TRANSACTION, id, Auth::User(session)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock_server::{MockResponse, MockServer};
    use chrono::NaiveDate;

    fn client_for(server: &MockServer, master_key: Option<&str>) -> LeanCloudClient {
        LeanCloudClient::new(&LeanCloudSettings {
            app_id: "appid".to_string(),
            app_key: "appkey".to_string(),
            master_key: master_key.map(str::to_string),
            server_url: server.base_url(),
        })
        .unwrap()
    }

    fn user_session() -> Session {
        Session::new(BackendKind::LeanCloud, "lc-token", "u1")
    }

    #[test]
    fn test_normalize_renames_bookkeeping_fields() {
        let object = serde_json::json!({
            "objectId": "abc", "createdAt": "2025-01-01T00:00:00.000Z",
            "updatedAt": "2025-01-02T00:00:00.000Z", "ACL": {"*": {"read": true}},
            "name": "Main Street"
        });
        let normalized = normalize(STORE, object);
        assert_eq!(normalized["id"], "abc");
        assert_eq!(normalized["created_at"], "2025-01-01T00:00:00.000Z");
        assert!(normalized.get("objectId").is_none());
        assert!(normalized.get("ACL").is_none());
    }

    #[test]
    fn test_profile_is_keyed_by_user() {
        let object = serde_json::json!({"objectId": "p9", "user_id": "u1", "role": "owner", "company_id": "c1"});
        let profile: Profile = decode(PROFILE, object).unwrap();
        assert_eq!(profile.id, "u1");
    }

    #[test]
    fn test_transaction_conditions() {
        let filter = TransactionFilter::for_company("c1")
            .between(NaiveDate::from_ymd_opt(2025, 1, 1), NaiveDate::from_ymd_opt(2025, 1, 31))
            .in_stores(vec!["s1".to_string()]);
        let conditions = transaction_conditions(&filter);
        assert_eq!(conditions["company_id"], "c1");
        assert_eq!(conditions["store_id"]["$in"][0], "s1");
        assert_eq!(conditions["date"]["$gte"], "2025-01-01");
        assert_eq!(conditions["date"]["$lte"], "2025-01-31");
    }

    #[tokio::test]
    async fn test_sign_in_uses_email_as_username() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                200,
                serde_json::json!({"objectId": "u1", "username": "owner@example.com", "sessionToken": "tok"}),
            )
        })
        .unwrap();
        let client = client_for(&server, None);

        let session = client
            .sign_in(&Credentials::new("owner@example.com", "secret"))
            .await
            .unwrap();
        assert_eq!(session.access_token, "tok");
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.username.as_deref(), Some("owner@example.com"));

        let request = &server.requests()[0];
        assert_eq!(request.path, "/1.1/login");
        assert_eq!(request.header("x-lc-id"), Some("appid"));
        assert_eq!(request.json()["username"], "owner@example.com");
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let server = MockServer::start(|_| {
            let body = serde_json::json!({
                "code": 210,
                "error": "The username and password mismatch."
            });
            MockResponse::json(400, body)
        })
        .unwrap();
        let client = client_for(&server, None);

        let err = client
            .sign_in(&Credentials::new("owner@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_query_pages_and_normalizes() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                200,
                serde_json::json!({"results": [{
                    "objectId": "t1", "type": "expense", "category": "Rent", "amount": 900,
                    "date": "2025-01-05", "company_id": "c1", "store_id": "s1",
                    "createdAt": "2025-01-05T08:00:00.000Z", "updatedAt": "2025-01-05T08:00:00.000Z"
                }]}),
            )
        })
        .unwrap();
        let client = client_for(&server, None);

        let txs = client
            .list_transactions(&user_session(), &TransactionFilter::for_company("c1"))
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].id, "t1");
        assert!(txs[0].created_at.is_some());

        let request = &server.requests()[0];
        assert_eq!(request.path, "/1.1/classes/Transaction");
        assert_eq!(request.header("x-lc-session"), Some("lc-token"));
        assert_eq!(request.query_param("order").as_deref(), Some("-date,-createdAt"));
        assert_eq!(request.query_param("skip").as_deref(), Some("0"));
        let conditions: JsonValue =
            serde_json::from_str(&request.query_param("where").unwrap()).unwrap();
        assert_eq!(conditions["company_id"], "c1");
    }

    #[tokio::test]
    async fn test_company_lookup_uses_master_key() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                200,
                serde_json::json!({"results": [
                    {"objectId": "c1", "owner_id": "u1", "company_code": "ABC234"}
                ]}),
            )
        })
        .unwrap();
        let client = client_for(&server, Some("master"));

        let company = client.find_company_by_code("ABC234").await.unwrap().unwrap();
        assert_eq!(company.id, "c1");
        assert_eq!(server.requests()[0].header("x-lc-key"), Some("master,master"));
    }

    #[tokio::test]
    async fn test_create_merges_server_fields() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                201,
                serde_json::json!({"objectId": "s9", "createdAt": "2025-03-01T00:00:00.000Z"}),
            )
        })
        .unwrap();
        let client = client_for(&server, None);

        let store = client
            .create_store(&user_session(), &NewStore::new("Harbour", "c1"))
            .await
            .unwrap();
        assert_eq!(store.id, "s9");
        assert_eq!(store.name, "Harbour");
        assert_eq!(server.requests()[0].query_param("fetchWhenSave").as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_duplicate_value_is_conflict() {
        let server = MockServer::start(|_| {
            let body = serde_json::json!({
                "code": 137,
                "error": "A unique field was given a value that is already taken."
            });
            MockResponse::json(400, body)
        })
        .unwrap();
        let client = client_for(&server, None);

        let err = client
            .create_store(&user_session(), &NewStore::new("Harbour", "c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m.contains("already taken")));
    }

    #[tokio::test]
    async fn test_html_error_page_keeps_status() {
        let server = MockServer::start(|_| MockResponse {
            status: 403,
            body: "<html>Forbidden</html>".to_string(),
        })
        .unwrap();
        let client = client_for(&server, None);

        let err = client
            .list_transactions(&user_session(), &TransactionFilter::for_company("c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(ref m) if m.contains("Forbidden")));
    }

    #[tokio::test]
    async fn test_refresh_keeps_token_and_company_code() {
        let server = MockServer::start(|_| {
            let user = serde_json::json!({"objectId": "u1", "username": "owner@example.com"});
            MockResponse::json(200, user)
        })
        .unwrap();
        let client = client_for(&server, None);

        let mut session = user_session();
        session.company_code = Some("ABC234".to_string());
        let refreshed = client.refresh(&session).await.unwrap();
        assert_eq!(refreshed.access_token, "lc-token");
        assert_eq!(refreshed.company_code.as_deref(), Some("ABC234"));
    }
}
