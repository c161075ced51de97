//! In-memory demo backend
//!
//! Implements both ports without any network access. The seeded instance
//! holds one bakery with two stores and about three months of activity:
//! - daily sales per store
//! - weekly stock purchases, monthly rent, salaries and utilities
//! - a company-level loan, an equipment purchase and monthly interest
//!
//! Every account uses the password [`DEMO_PASSWORD`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    default_categories, AuthUser, BackendKind, Category, Company, Credentials, NewCategory,
    NewCompany, NewStore, Profile, Role, Session, Store, Transaction, TransactionRecord,
};
use crate::ports::{AuthProvider, LedgerRepository, TransactionFilter};

pub const DEMO_PASSWORD: &str = "demo";
pub const DEMO_COMPANY_CODE: &str = "DEMO42";
pub const DEMO_OWNER_EMAIL: &str = "owner@demo.local";
pub const DEMO_ACCOUNTANT_EMAIL: &str = "accountant@demo.local";
pub const DEMO_MANAGER_EMAIL: &str = "manager@demo.local";

const COMPANY_ID: &str = "demo-company";
const MAIN_STORE_ID: &str = "demo-store-main";
const HARBOUR_STORE_ID: &str = "demo-store-harbour";
const OWNER_ID: &str = "demo-owner";
const ACCOUNTANT_ID: &str = "demo-accountant";
const MANAGER_ID: &str = "demo-manager";

const HISTORY_DAYS: i64 = 90;

struct DemoUser {
    id: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct DemoState {
    users: Vec<DemoUser>,
    /// access token -> user id
    sessions: HashMap<String, String>,
    profiles: Vec<Profile>,
    companies: Vec<Company>,
    stores: Vec<Store>,
    categories: Vec<Category>,
    transactions: Vec<Transaction>,
}

impl DemoState {
    fn user_for(&self, session: &Session) -> Result<&DemoUser> {
        let user_id = self
            .sessions
            .get(&session.access_token)
            .ok_or_else(|| Error::unauthorized("Session expired, please sign in again"))?;
        self.users
            .iter()
            .find(|u| &u.id == user_id)
            .ok_or_else(|| Error::unauthorized("Unknown user"))
    }

    fn open_session(&mut self, user_id: &str, email: &str) -> Session {
        let token = format!("demo-{}", Uuid::new_v4());
        self.sessions.insert(token.clone(), user_id.to_string());
        let mut session = Session::new(BackendKind::Supabase, token, user_id);
        session.refresh_token = Some(format!("demo-refresh-{}", user_id));
        session.username = Some(email.to_string());
        session
    }
}

/// In-memory backend for demo mode and tests
pub struct DemoBackend {
    state: Mutex<DemoState>,
}

impl DemoBackend {
    /// Backend with no users or data
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(DemoState::default()),
        }
    }

    /// Backend seeded with the demo bakery
    pub fn seeded() -> Self {
        Self::seeded_as_of(Utc::now().date_naive())
    }

    /// Seeded backend whose history ends on `today`
    pub fn seeded_as_of(today: NaiveDate) -> Self {
        let mut state = DemoState::default();

        for (id, email) in [
            (OWNER_ID, DEMO_OWNER_EMAIL),
            (ACCOUNTANT_ID, DEMO_ACCOUNTANT_EMAIL),
            (MANAGER_ID, DEMO_MANAGER_EMAIL),
        ] {
            state.users.push(DemoUser {
                id: id.to_string(),
                email: email.to_string(),
                password: DEMO_PASSWORD.to_string(),
            });
        }

        state.companies.push(Company {
            id: COMPANY_ID.to_string(),
            owner_id: OWNER_ID.to_string(),
            company_code: DEMO_COMPANY_CODE.to_string(),
            name: Some("Demo Bakery".to_string()),
        });

        let mut owner = Profile::new(OWNER_ID, Role::Owner, COMPANY_ID);
        owner.full_name = Some("Olivia Baker".to_string());
        let mut accountant = Profile::new(ACCOUNTANT_ID, Role::Accountant, COMPANY_ID);
        accountant.full_name = Some("Arjun Ledger".to_string());
        let mut manager = Profile::new(MANAGER_ID, Role::Manager, COMPANY_ID);
        manager.full_name = Some("Mia Counter".to_string());
        manager.managed_store_ids = vec![MAIN_STORE_ID.to_string()];
        state.profiles = vec![owner, accountant, manager];

        let opened = Utc::now() - Duration::days(HISTORY_DAYS + 30);
        state.stores = vec![
            Store {
                id: MAIN_STORE_ID.to_string(),
                name: "Main Street Bakery".to_string(),
                company_id: COMPANY_ID.to_string(),
                created_at: Some(opened),
            },
            Store {
                id: HARBOUR_STORE_ID.to_string(),
                name: "Harbour Kiosk".to_string(),
                company_id: COMPANY_ID.to_string(),
                created_at: Some(opened + Duration::minutes(5)),
            },
        ];

        state.categories = default_categories(COMPANY_ID)
            .into_iter()
            .enumerate()
            .map(|(i, c)| category_from(format!("demo-cat-{:02}", i + 1), c))
            .collect();

        state.transactions = generate_transactions(&state.categories, today);

        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DemoState>> {
        self.state
            .lock()
            .map_err(|_| Error::Other("Demo backend state is poisoned".to_string()))
    }
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::seeded()
    }
}

fn category_from(id: String, c: NewCategory) -> Category {
    Category {
        id,
        name: c.name,
        kind: c.kind,
        cash_flow_activity: c.cash_flow_activity,
        transaction_nature: c.transaction_nature,
        include_in_profit_loss: c.include_in_profit_loss,
        is_system: c.is_system,
        company_id: c.company_id,
    }
}

fn transaction_from(id: String, record: TransactionRecord) -> Transaction {
    let now = Utc::now();
    Transaction {
        id,
        kind: record.kind,
        category: record.category,
        amount: record.amount,
        description: record.description,
        date: record.date,
        store_id: record.store_id,
        cash_flow_activity: record.cash_flow_activity,
        transaction_nature: record.transaction_nature,
        include_in_profit_loss: record.include_in_profit_loss,
        company_id: record.company_id,
        created_by: record.created_by,
        created_at: Some(now),
        updated_at: Some(now),
    }
}

/// Simple deterministic random number generator (LCG)
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 32) as f64 / u32::MAX as f64
    }

    /// Whole cents between `low` and `high`
    fn cents(&mut self, low: i64, high: i64) -> Decimal {
        let span = (high - low) as f64;
        Decimal::new(low + (self.next() * span) as i64, 2)
    }
}

struct Generator<'a> {
    categories: &'a [Category],
    transactions: Vec<Transaction>,
}

impl Generator<'_> {
    fn push(&mut self, date: NaiveDate, category: &str, amount: Decimal, store: Option<&str>, description: &str) {
        let Some(cat) = self.categories.iter().find(|c| c.name == category) else {
            return;
        };
        let id = format!("demo-tx-{:05}", self.transactions.len() + 1);
        let created = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()).and_utc();
        self.transactions.push(Transaction {
            id,
            kind: cat.kind,
            category: cat.name.clone(),
            amount,
            description: Some(description.to_string()),
            date,
            store_id: store.map(str::to_string),
            cash_flow_activity: cat.cash_flow_activity,
            transaction_nature: cat.transaction_nature,
            include_in_profit_loss: cat.include_in_profit_loss,
            company_id: COMPANY_ID.to_string(),
            created_by: Some(OWNER_ID.to_string()),
            created_at: Some(created),
            updated_at: Some(created),
        });
    }
}

fn generate_transactions(categories: &[Category], today: NaiveDate) -> Vec<Transaction> {
    let mut rng = SimpleRng::new(42);
    let mut gen = Generator {
        categories,
        transactions: Vec::new(),
    };
    let stores = [(MAIN_STORE_ID, 1.0), (HARBOUR_STORE_ID, 0.55)];
    let start = today - Duration::days(HISTORY_DAYS - 1);

    // Start-up financing before the window opens
    gen.push(start - Duration::days(10), "Loan Proceeds", Decimal::new(2_000_000, 2), None, "Bank loan");
    gen.push(start - Duration::days(7), "Equipment Purchase", Decimal::new(850_000, 2), Some(MAIN_STORE_ID), "Deck oven");

    for offset in 0..HISTORY_DAYS {
        let date = start + Duration::days(offset);
        let weekend = date.weekday().number_from_monday() >= 6;

        for (store, scale) in stores {
            let base = if weekend { 1.35 } else { 1.0 };
            let low = (45_000.0 * scale * base) as i64;
            let high = (72_000.0 * scale * base) as i64;
            gen.push(date, "Sales Revenue", rng.cents(low, high), Some(store), "Daily takings");

            if date.weekday().number_from_monday() == 1 {
                let low = (90_000.0 * scale) as i64;
                let high = (140_000.0 * scale) as i64;
                gen.push(date, "Cost of Goods", rng.cents(low, high), Some(store), "Flour, dairy and packaging");
            }
            if date.day() == 1 {
                let rent = if store == MAIN_STORE_ID { 280_000 } else { 120_000 };
                gen.push(date, "Rent", Decimal::new(rent, 2), Some(store), "Monthly rent");
            }
            if date.day() == 28 {
                let payroll = (520_000.0 * scale) as i64;
                gen.push(date, "Salaries", Decimal::new(payroll, 2), Some(store), "Payroll");
            }
            if date.day() == 10 {
                let low = (18_000.0 * scale) as i64;
                let high = (26_000.0 * scale) as i64;
                gen.push(date, "Utilities", rng.cents(low, high), Some(store), "Electricity and water");
            }
        }

        if date.day() == 15 {
            gen.push(date, "Marketing", rng.cents(15_000, 40_000), None, "Local flyers");
            gen.push(date, "Loan Repayment", Decimal::new(50_000, 2), None, "Loan instalment");
            gen.push(date, "Interest Expense", Decimal::new(9_500, 2), None, "Loan interest");
        }
        if date.day() == 20 && offset % 2 == 0 {
            gen.push(date, "Service Income", rng.cents(20_000, 60_000), Some(MAIN_STORE_ID), "Catering order");
        }
        if date.day() == 25 {
            gen.push(date, "Interest Income", rng.cents(800, 1_500), None, "Savings interest");
        }
    }

    gen.transactions.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
    gen.transactions
}

#[async_trait]
impl AuthProvider for DemoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Supabase
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let mut state = self.lock()?;
        let email = credentials.email.trim().to_lowercase();
        let user_id = state
            .users
            .iter()
            .find(|u| u.email == email && u.password == credentials.password)
            .map(|u| u.id.clone())
            .ok_or_else(|| Error::unauthorized("Invalid login credentials"))?;
        Ok(state.open_session(&user_id, &email))
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session> {
        let mut state = self.lock()?;
        let email = credentials.email.trim().to_lowercase();
        if state.users.iter().any(|u| u.email == email) {
            return Err(Error::conflict("User already registered"));
        }
        let id = Uuid::new_v4().to_string();
        state.users.push(DemoUser {
            id: id.clone(),
            email: email.clone(),
            password: credentials.password.clone(),
        });
        Ok(state.open_session(&id, &email))
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.lock()?.sessions.remove(&session.access_token);
        Ok(())
    }

    async fn get_user(&self, session: &Session) -> Result<AuthUser> {
        let state = self.lock()?;
        let user = state.user_for(session)?;
        Ok(AuthUser {
            id: user.id.clone(),
            email: Some(user.email.clone()),
            username: Some(user.email.clone()),
        })
    }

    async fn refresh(&self, session: &Session) -> Result<Session> {
        let mut state = self.lock()?;
        let user_id = state.user_for(session)?.id.clone();
        let email = session.username.clone().unwrap_or_default();
        state.sessions.remove(&session.access_token);
        Ok(state.open_session(&user_id, &email))
    }
}

#[async_trait]
impl LedgerRepository for DemoBackend {
    async fn get_profile(&self, session: &Session, user_id: &str) -> Result<Option<Profile>> {
        let state = self.lock()?;
        state.user_for(session)?;
        Ok(state.profiles.iter().find(|p| p.id == user_id).cloned())
    }

    async fn list_profiles(&self, session: &Session, company_id: &str) -> Result<Vec<Profile>> {
        let state = self.lock()?;
        state.user_for(session)?;
        Ok(state
            .profiles
            .iter()
            .filter(|p| p.company_id.as_deref() == Some(company_id))
            .cloned()
            .collect())
    }

    async fn save_profile(&self, session: &Session, profile: &Profile) -> Result<Profile> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        match state.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => state.profiles.push(profile.clone()),
        }
        Ok(profile.clone())
    }

    async fn get_company(&self, session: &Session, company_id: &str) -> Result<Option<Company>> {
        let state = self.lock()?;
        state.user_for(session)?;
        Ok(state.companies.iter().find(|c| c.id == company_id).cloned())
    }

    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        let state = self.lock()?;
        Ok(state.companies.iter().find(|c| c.company_code == code).cloned())
    }

    async fn create_company(&self, session: &Session, company: &NewCompany) -> Result<Company> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        if state.companies.iter().any(|c| c.company_code == company.company_code) {
            return Err(Error::conflict("Company code already in use"));
        }
        let created = Company {
            id: Uuid::new_v4().to_string(),
            owner_id: company.owner_id.clone(),
            company_code: company.company_code.clone(),
            name: company.name.clone(),
        };
        state.companies.push(created.clone());
        Ok(created)
    }

    async fn list_stores(&self, session: &Session, company_id: &str) -> Result<Vec<Store>> {
        let state = self.lock()?;
        state.user_for(session)?;
        Ok(state
            .stores
            .iter()
            .filter(|s| s.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn create_store(&self, session: &Session, store: &NewStore) -> Result<Store> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        let created = Store {
            id: Uuid::new_v4().to_string(),
            name: store.name.clone(),
            company_id: store.company_id.clone(),
            created_at: Some(Utc::now()),
        };
        state.stores.push(created.clone());
        Ok(created)
    }

    async fn update_store(&self, session: &Session, id: &str, name: &str) -> Result<Store> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        let store = state
            .stores
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::not_found(format!("Store {}", id)))?;
        store.name = name.to_string();
        Ok(store.clone())
    }

    async fn delete_store(&self, session: &Session, id: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        let before = state.stores.len();
        state.stores.retain(|s| s.id != id);
        if state.stores.len() == before {
            return Err(Error::not_found(format!("Store {}", id)));
        }
        Ok(())
    }

    async fn list_categories(&self, session: &Session, company_id: &str) -> Result<Vec<Category>> {
        let state = self.lock()?;
        state.user_for(session)?;
        let mut categories: Vec<Category> = state
            .categories
            .iter()
            .filter(|c| c.company_id == company_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.kind.as_str().cmp(b.kind.as_str()).then_with(|| a.name.cmp(&b.name)));
        Ok(categories)
    }

    async fn create_category(&self, session: &Session, category: &NewCategory) -> Result<Category> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        let created = category_from(Uuid::new_v4().to_string(), category.clone());
        state.categories.push(created.clone());
        Ok(created)
    }

    async fn delete_category(&self, session: &Session, id: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        if state.categories.len() == before {
            return Err(Error::not_found(format!("Category {}", id)));
        }
        Ok(())
    }

    async fn list_transactions(
        &self,
        session: &Session,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let state = self.lock()?;
        state.user_for(session)?;
        let mut txs: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.created_at.cmp(&a.created_at)));
        Ok(txs)
    }

    async fn get_transaction(&self, session: &Session, id: &str) -> Result<Option<Transaction>> {
        let state = self.lock()?;
        state.user_for(session)?;
        Ok(state.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn create_transaction(
        &self,
        session: &Session,
        record: &TransactionRecord,
    ) -> Result<Transaction> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        let created = transaction_from(Uuid::new_v4().to_string(), record.clone());
        state.transactions.push(created.clone());
        Ok(created)
    }

    async fn update_transaction(&self, session: &Session, tx: &Transaction) -> Result<Transaction> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        let existing = state
            .transactions
            .iter_mut()
            .find(|t| t.id == tx.id)
            .ok_or_else(|| Error::not_found(format!("Transaction {}", tx.id)))?;
        let created_at = existing.created_at;
        *existing = tx.clone();
        existing.created_at = created_at;
        existing.updated_at = Some(Utc::now());
        Ok(existing.clone())
    }

    async fn delete_transaction(&self, session: &Session, id: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.user_for(session)?;
        let before = state.transactions.len();
        state.transactions.retain(|t| t.id != id);
        if state.transactions.len() == before {
            return Err(Error::not_found(format!("Transaction {}", id)));
        }
        Ok(())
    }
}
