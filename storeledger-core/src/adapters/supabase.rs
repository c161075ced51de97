//! Supabase REST client
//!
//! Talks to GoTrue (`/auth/v1`) for sessions and PostgREST (`/rest/v1`) for
//! data. User calls carry the user's access token so row level security
//! applies; privileged lookups use the service-role key.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::http::{self, PAGE_SIZE};
use crate::config::SupabaseSettings;
use crate::domain::result::{Error, Result};
use crate::domain::{
    AuthUser, BackendKind, Category, Company, Credentials, NewCategory, NewCompany, NewStore,
    Profile, Session, Store, Transaction, TransactionRecord,
};
use crate::ports::{AuthProvider, LedgerRepository, TransactionFilter};

const NAME: &str = "Supabase";

const TRANSACTIONS: &str = "transactions";
const CATEGORIES: &str = "categories";
const STORES: &str = "stores";
const PROFILES: &str = "profiles";
const COMPANIES: &str = "companies";

/// GoTrue token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: GoTrueUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(user: GoTrueUser) -> Self {
        AuthUser {
            id: user.id,
            email: user.email,
            username: None,
        }
    }
}

/// Which key a request is made with
#[derive(Clone, Copy)]
enum Auth<'a> {
    User(&'a Session),
    Service,
}

/// Supabase API client
pub struct SupabaseClient {
    client: Client,
    url: String,
    anon_key: String,
    service_role_key: Option<String>,
}

impl SupabaseClient {
    pub fn new(settings: &SupabaseSettings) -> Result<Self> {
        if settings.url.is_empty() || settings.anon_key.is_empty() {
            return Err(Error::Config("Supabase URL and anon key cannot be empty".to_string()));
        }
        Ok(Self {
            client: http::build_client()?,
            url: settings.url.trim_end_matches('/').to_string(),
            anon_key: settings.anon_key.clone(),
            service_role_key: settings.service_role_key.clone(),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    fn request(&self, method: Method, url: &str, auth: Auth<'_>) -> Result<RequestBuilder> {
        let builder = self.client.request(method, url);
        match auth {
            Auth::User(session) => Ok(builder
                .header("apikey", &self.anon_key)
                .bearer_auth(&session.access_token)),
            Auth::Service => {
                let key = self.service_role_key.as_ref().ok_or_else(|| {
                    Error::Config("SUPABASE_SERVICE_ROLE_KEY is required for this operation".to_string())
                })?;
                Ok(builder.header("apikey", key).bearer_auth(key))
            }
        }
    }

    /// Prefer the service key when configured, otherwise act as the user
    fn privileged<'a>(&self, session: &'a Session) -> Auth<'a> {
        if self.service_role_key.is_some() {
            Auth::Service
        } else {
            Auth::User(session)
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<JsonValue> {
        let response = builder
            .send()
            .await
            .map_err(|e| http::map_request_error(NAME, e))?;
        http::read_json(NAME, response).await
    }

    async fn token(&self, grant_type: &str, body: JsonValue) -> Result<Session> {
        let builder = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body);
        let response: TokenResponse = serde_json::from_value(self.send(builder).await?)?;
        Ok(session_from_token(response))
    }

    /// Paged select from a table
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(String, String)],
        order: Option<&str>,
        auth: Auth<'_>,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut offset = 0usize;
        loop {
            let mut query: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
            query.extend_from_slice(filters);
            if let Some(order) = order {
                query.push(("order".to_string(), order.to_string()));
            }
            query.push(("limit".to_string(), PAGE_SIZE.to_string()));
            query.push(("offset".to_string(), offset.to_string()));

            let builder = self.request(Method::GET, &self.rest_url(table), auth)?.query(&query);
            let page: Vec<T> = serde_json::from_value(self.send(builder).await?)?;
            let fetched = page.len();
            rows.extend(page);
            if fetched < PAGE_SIZE {
                return Ok(rows);
            }
            offset += fetched;
        }
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(String, String)],
        auth: Auth<'_>,
    ) -> Result<Option<T>> {
        let mut query: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
        query.extend_from_slice(filters);
        query.push(("limit".to_string(), "1".to_string()));
        let builder = self.request(Method::GET, &self.rest_url(table), auth)?.query(&query);
        let mut rows: Vec<T> = serde_json::from_value(self.send(builder).await?)?;
        Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    /// Insert (or upsert) one row and return its stored representation
    async fn insert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
        upsert: bool,
        auth: Auth<'_>,
    ) -> Result<T> {
        let prefer = if upsert {
            "resolution=merge-duplicates,return=representation"
        } else {
            "return=representation"
        };
        let builder = self
            .request(Method::POST, &self.rest_url(table), auth)?
            .header("Prefer", prefer)
            .json(body);
        first_row(table, self.send(builder).await?)
    }

    async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        id: &str,
        body: &B,
        auth: Auth<'_>,
    ) -> Result<T> {
        let builder = self
            .request(Method::PATCH, &self.rest_url(table), auth)?
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(body);
        first_row(table, self.send(builder).await?)
    }

    async fn remove(&self, table: &str, id: &str, auth: Auth<'_>) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &self.rest_url(table), auth)?
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let body = self.send(builder).await?;
        match body.as_array() {
            Some(rows) if rows.is_empty() => Err(Error::not_found(format!("{} row {}", table, id))),
            _ => Ok(()),
        }
    }
}

fn session_from_token(token: TokenResponse) -> Session {
    let expires_at = token
        .expires_at
        .or_else(|| token.expires_in.map(|secs| Utc::now().timestamp() + secs));
    Session {
        backend: BackendKind::Supabase,
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        user_id: token.user.id,
        username: token.user.email,
        company_code: None,
        expires_at,
    }
}

fn first_row<T: DeserializeOwned>(table: &str, body: JsonValue) -> Result<T> {
    let row = match body {
        JsonValue::Array(mut rows) if !rows.is_empty() => rows.remove(0),
        JsonValue::Array(_) => return Err(Error::not_found(format!("No {} row returned", table))),
        other => other,
    };
    Ok(serde_json::from_value(row)?)
}

fn eq(column: &str, value: &str) -> (String, String) {
    (column.to_string(), format!("eq.{}", value))
}

/// Double-quoted list item for an `in.(...)` filter, so commas and
/// parentheses inside ids stay literal
fn quote_list_item(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// PostgREST filters for a transaction query
pub(crate) fn transaction_filters(filter: &TransactionFilter) -> Vec<(String, String)> {
    let mut filters = vec![eq("company_id", &filter.company_id)];
    if let Some(ids) = &filter.store_ids {
        let quoted: Vec<String> = ids.iter().map(|id| quote_list_item(id)).collect();
        filters.push(("store_id".to_string(), format!("in.({})", quoted.join(","))));
    }
    if let Some(start) = filter.start_date {
        filters.push(("date".to_string(), format!("gte.{}", start.format("%Y-%m-%d"))));
    }
    if let Some(end) = filter.end_date {
        filters.push(("date".to_string(), format!("lte.{}", end.format("%Y-%m-%d"))));
    }
    if let Some(kind) = filter.kind {
        filters.push(eq("type", kind.as_str()));
    }
    if let Some(category) = &filter.category {
        filters.push(eq("category", category));
    }
    filters
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Supabase
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        self.token(
            "password",
            serde_json::json!({"email": credentials.email, "password": credentials.password}),
        )
        .await
        .map_err(|e| match e {
            // GoTrue answers bad credentials with 400 invalid_grant
            Error::Validation(msg) => Error::Unauthorized(msg),
            other => other,
        })
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session> {
        let builder = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
                "data": { "full_name": credentials.full_name },
            }));
        let body = self.send(builder).await?;

        // Without auto-confirm GoTrue returns the bare user and no session
        if body.get("access_token").is_none() {
            return Err(Error::validation(
                "Account created. Confirm your email address, then sign in.",
            ));
        }
        let token: TokenResponse = serde_json::from_value(body)?;
        Ok(session_from_token(token))
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let builder = self.request(Method::POST, &self.auth_url("logout"), Auth::User(session))?;
        match self.send(builder).await {
            Ok(_) | Err(Error::Unauthorized(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self, session: &Session) -> Result<AuthUser> {
        let builder = self.request(Method::GET, &self.auth_url("user"), Auth::User(session))?;
        let user: GoTrueUser = serde_json::from_value(self.send(builder).await.map_err(|e| match e {
            Error::Forbidden(msg) => Error::Unauthorized(msg),
            other => other,
        })?)?;
        Ok(user.into())
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let refresh_token = session
            .refresh_token
            .as_ref()
            .ok_or_else(|| Error::unauthorized("Session expired, please sign in again"))?;
        self.token("refresh_token", serde_json::json!({"refresh_token": refresh_token}))
            .await
            .map_err(|e| match e {
                Error::Validation(msg) => Error::Unauthorized(msg),
                other => other,
            })
    }
}

#[async_trait]
impl LedgerRepository for SupabaseClient {
    async fn get_profile(&self, session: &Session, user_id: &str) -> Result<Option<Profile>> {
        self.select_one(PROFILES, &[eq("id", user_id)], self.privileged(session))
            .await
    }

    async fn list_profiles(&self, session: &Session, company_id: &str) -> Result<Vec<Profile>> {
        self.select(
            PROFILES,
            &[eq("company_id", company_id)],
            Some("full_name.asc"),
            Auth::User(session),
        )
        .await
    }

    async fn save_profile(&self, session: &Session, profile: &Profile) -> Result<Profile> {
        self.insert(PROFILES, profile, true, self.privileged(session)).await
    }

    async fn get_company(&self, session: &Session, company_id: &str) -> Result<Option<Company>> {
        self.select_one(COMPANIES, &[eq("id", company_id)], self.privileged(session))
            .await
    }

    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        self.select_one(COMPANIES, &[eq("company_code", code)], Auth::Service)
            .await
    }

    async fn create_company(&self, session: &Session, company: &NewCompany) -> Result<Company> {
        self.insert(COMPANIES, company, false, self.privileged(session)).await
    }

    async fn list_stores(&self, session: &Session, company_id: &str) -> Result<Vec<Store>> {
        self.select(
            STORES,
            &[eq("company_id", company_id)],
            Some("created_at.asc"),
            Auth::User(session),
        )
        .await
    }

    async fn create_store(&self, session: &Session, store: &NewStore) -> Result<Store> {
        self.insert(STORES, store, false, Auth::User(session)).await
    }

    async fn update_store(&self, session: &Session, id: &str, name: &str) -> Result<Store> {
        self.patch(STORES, id, &serde_json::json!({"name": name}), Auth::User(session))
            .await
    }

    async fn delete_store(&self, session: &Session, id: &str) -> Result<()> {
        self.remove(STORES, id, Auth::User(session)).await
    }

    async fn list_categories(&self, session: &Session, company_id: &str) -> Result<Vec<Category>> {
        self.select(
            CATEGORIES,
            &[eq("company_id", company_id)],
            Some("type.asc,name.asc"),
            Auth::User(session),
        )
        .await
    }

    async fn create_category(&self, session: &Session, category: &NewCategory) -> Result<Category> {
        self.insert(CATEGORIES, category, false, Auth::User(session)).await
    }

    async fn delete_category(&self, session: &Session, id: &str) -> Result<()> {
        self.remove(CATEGORIES, id, Auth::User(session)).await
    }

    async fn list_transactions(
        &self,
        session: &Session,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        if filter.store_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }
        self.select(
            TRANSACTIONS,
            &transaction_filters(filter),
            Some("date.desc,created_at.desc"),
            Auth::User(session),
        )
        .await
    }

    async fn get_transaction(&self, session: &Session, id: &str) -> Result<Option<Transaction>> {
        self.select_one(TRANSACTIONS, &[eq("id", id)], Auth::User(session))
            .await
    }

    async fn create_transaction(
        &self,
        session: &Session,
        record: &TransactionRecord,
    ) -> Result<Transaction> {
        self.insert(TRANSACTIONS, record, false, Auth::User(session)).await
    }

    async fn update_transaction(&self, session: &Session, tx: &Transaction) -> Result<Transaction> {
        self.patch(TRANSACTIONS, &tx.id, &super::transaction_patch(tx)?, Auth::User(session))
            .await
    }

    async fn delete_transaction(&self, session: &Session, id: &str) -> Result<()> {
        self.remove(TRANSACTIONS, id, Auth::User(session)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock_server::{MockResponse, MockServer};
    use chrono::NaiveDate;

    fn client_for(server: &MockServer, service_key: Option<&str>) -> SupabaseClient {
        SupabaseClient::new(&SupabaseSettings {
            url: server.base_url(),
            anon_key: "anon".to_string(),
            service_role_key: service_key.map(str::to_string),
        })
        .unwrap()
    }

    fn user_session() -> Session {
        Session::new(BackendKind::Supabase, "user-token", "u1")
    }

    #[test]
    fn test_reject_empty_settings() {
        let result = SupabaseClient::new(&SupabaseSettings {
            url: String::new(),
            anon_key: "anon".to_string(),
            service_role_key: None,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_sign_in_builds_session() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                200,
                serde_json::json!({
                    "access_token": "at",
                    "refresh_token": "rt",
                    "expires_in": 3600,
                    "token_type": "bearer",
                    "user": {"id": "u1", "email": "owner@example.com"}
                }),
            )
        })
        .unwrap();
        let client = client_for(&server, None);

        let session = client
            .sign_in(&Credentials::new("owner@example.com", "secret"))
            .await
            .unwrap();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.refresh_token.as_deref(), Some("rt"));
        assert_eq!(session.user_id, "u1");
        assert!(session.expires_at.unwrap() > Utc::now().timestamp());

        let requests = server.requests();
        assert_eq!(requests[0].path, "/auth/v1/token");
        assert_eq!(requests[0].query_param("grant_type").as_deref(), Some("password"));
        assert_eq!(requests[0].header("apikey"), Some("anon"));
        assert_eq!(requests[0].json()["email"], "owner@example.com");
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unauthorized() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                400,
                serde_json::json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}),
            )
        })
        .unwrap();
        let client = client_for(&server, None);

        let err = client
            .sign_in(&Credentials::new("owner@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(ref m) if m == "Invalid login credentials"));
    }

    #[tokio::test]
    async fn test_sign_up_without_autoconfirm() {
        let server = MockServer::start(|_| {
            MockResponse::json(200, serde_json::json!({"id": "u2", "email": "new@example.com"}))
        })
        .unwrap();
        let client = client_for(&server, None);

        let err = client
            .sign_up(&Credentials::new("new@example.com", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_transactions_sends_filters_and_user_token() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                200,
                serde_json::json!([{
                    "id": "t1", "type": "income", "category": "Sales Revenue", "amount": "120.50",
                    "date": "2025-02-03", "store_id": "s1", "company_id": "c1",
                    "cash_flow_activity": null, "transaction_nature": "operating",
                    "include_in_profit_loss": true,
                    "created_at": "2025-02-03T10:00:00.123456+00:00"
                }]),
            )
        })
        .unwrap();
        let client = client_for(&server, Some("service"));

        let filter = TransactionFilter::for_company("c1")
            .between(NaiveDate::from_ymd_opt(2025, 2, 1), NaiveDate::from_ymd_opt(2025, 2, 28))
            .in_stores(vec!["s1".to_string(), "s2".to_string()]);
        let txs = client.list_transactions(&user_session(), &filter).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, rust_decimal::Decimal::new(12050, 2));

        let request = &server.requests()[0];
        assert_eq!(request.path, "/rest/v1/transactions");
        assert_eq!(request.header("authorization"), Some("Bearer user-token"));
        let pairs = request.query_pairs();
        assert!(pairs.contains(&("company_id".to_string(), "eq.c1".to_string())));
        assert!(pairs.contains(&("store_id".to_string(), r#"in.("s1","s2")"#.to_string())));
        assert!(pairs.contains(&("date".to_string(), "gte.2025-02-01".to_string())));
        assert!(pairs.contains(&("date".to_string(), "lte.2025-02-28".to_string())));
        assert_eq!(request.query_param("order").as_deref(), Some("date.desc,created_at.desc"));
    }

    #[test]
    fn test_store_ids_are_quoted() {
        let filter = TransactionFilter::for_company("c1")
            .in_stores(vec!["a,b".to_string(), "x)\"y".to_string()]);
        let filters = transaction_filters(&filter);
        let (_, value) = filters.iter().find(|(k, _)| k == "store_id").unwrap();
        assert_eq!(value, r#"in.("a,b","x)\"y")"#);
    }

    #[tokio::test]
    async fn test_empty_store_scope_skips_request() {
        let server = MockServer::start(|_| MockResponse::json(200, serde_json::json!([]))).unwrap();
        let client = client_for(&server, None);

        let filter = TransactionFilter::for_company("c1").in_stores(vec![]);
        let txs = client.list_transactions(&user_session(), &filter).await.unwrap();
        assert!(txs.is_empty());
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_company_lookup_uses_service_key() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                200,
                serde_json::json!([{"id": "c1", "owner_id": "u1", "company_code": "ABC234", "name": "Bakery"}]),
            )
        })
        .unwrap();
        let client = client_for(&server, Some("service"));

        let company = client.find_company_by_code("ABC234").await.unwrap().unwrap();
        assert_eq!(company.id, "c1");

        let request = &server.requests()[0];
        assert_eq!(request.header("apikey"), Some("service"));
        assert_eq!(request.header("authorization"), Some("Bearer service"));
        assert_eq!(request.query_param("company_code").as_deref(), Some("eq.ABC234"));
    }

    #[tokio::test]
    async fn test_company_lookup_without_service_key_is_config_error() {
        let server = MockServer::start(|_| MockResponse::json(200, serde_json::json!([]))).unwrap();
        let client = client_for(&server, None);
        let err = client.find_company_by_code("ABC234").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_row_is_not_found() {
        let server = MockServer::start(|_| MockResponse::json(200, serde_json::json!([]))).unwrap();
        let client = client_for(&server, None);
        let err = client.delete_store(&user_session(), "missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let request = &server.requests()[0];
        assert_eq!(request.method, "DELETE");
        assert_eq!(request.query_param("id").as_deref(), Some("eq.missing"));
    }
}
