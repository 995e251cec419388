//! In-memory collaborators for tests.
//!
//! MUST NEVER be used in production.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{DirectoryError, StoreError};
use crate::ldap::{BindResult, DirectoryConnector, DirectorySession, SUCCESS};
use crate::user::{UserRecord, UserStore};

const INVALID_CREDENTIALS: u32 = 49;

/// `127.0.0.1:port` with nothing listening on it.
pub fn closed_address() -> String {
    // Grab a free port, then close it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// User store backed by a vector.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<UserRecord>>>,
    lookups: Arc<AtomicUsize>,
    unavailable: bool,
    stall: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(self, username: &str, password: &str, blocked: bool) -> Self {
        {
            let mut records = self.records.lock().unwrap();
            let id = records.len() as i64 + 1;
            records.push(UserRecord {
                id,
                username: username.to_owned(),
                password: password.to_owned(),
                blocked,
                ..Default::default()
            });
        }
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn stall(mut self, duration: Duration) -> Self {
        self.stall = Some(duration);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_active(
        &self,
        username: &str,
    ) -> Result<Vec<UserRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(duration) = self.stall {
            tokio::time::sleep(duration).await;
        }
        if self.unavailable {
            return Err(StoreError::Sql(sqlx::Error::PoolTimedOut));
        }

        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.username == username && r.deleted_at.is_none())
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct DirectoryState {
    service: Option<(String, String)>,
    /// login -> (dn, password).
    people: HashMap<String, (String, String)>,
    fail_open_at: Option<(usize, ErrorKind)>,
    fail_search: bool,
    stall_search: Option<Duration>,
    fail_user_bind: bool,
    stall_user_bind: Option<Duration>,
    opened: usize,
    refusals: usize,
    closed: usize,
    searches: Vec<String>,
    user_binds: Vec<String>,
}

/// Scripted directory that counts every connection it hands out.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service_account(self, dn: &str, password: &str) -> Self {
        self.state.lock().unwrap().service = Some((dn.to_owned(), password.to_owned()));
        self
    }

    pub fn person(self, login: &str, dn: &str, password: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .people
            .insert(login.to_owned(), (dn.to_owned(), password.to_owned()));
        self
    }

    /// Make the `index`-th call to `open` (zero-based) fail.
    pub fn fail_open_at(self, index: usize, kind: ErrorKind) -> Self {
        self.state.lock().unwrap().fail_open_at = Some((index, kind));
        self
    }

    pub fn fail_search(self) -> Self {
        self.state.lock().unwrap().fail_search = true;
        self
    }

    pub fn stall_search(self, duration: Duration) -> Self {
        self.state.lock().unwrap().stall_search = Some(duration);
        self
    }

    /// Break the transport while an end user binds.
    pub fn fail_user_bind(self) -> Self {
        self.state.lock().unwrap().fail_user_bind = true;
        self
    }

    pub fn stall_user_bind(self, duration: Duration) -> Self {
        self.state.lock().unwrap().stall_user_bind = Some(duration);
        self
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub fn searches(&self) -> Vec<String> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn user_binds(&self) -> Vec<String> {
        self.state.lock().unwrap().user_binds.clone()
    }
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    async fn open(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        let index = state.opened + state.refusals;

        if let Some((at, kind)) = state.fail_open_at {
            if at == index {
                state.fail_open_at = None;
                state.refusals += 1;
                return Err(std::io::Error::from(kind).into());
            }
        }

        state.opened += 1;
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<DirectoryState>>,
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn simple_bind(
        &mut self,
        dn: &str,
        password: &str,
    ) -> Result<BindResult, DirectoryError> {
        let stall = {
            let mut state = self.state.lock().unwrap();
            let is_service = matches!(&state.service, Some((service_dn, _)) if service_dn == dn);
            if !is_service {
                state.user_binds.push(dn.to_owned());
                if state.fail_user_bind {
                    return Err(std::io::Error::from(ErrorKind::ConnectionReset).into());
                }
            }
            if is_service { None } else { state.stall_user_bind }
        };

        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }

        let state = self.state.lock().unwrap();
        let accepted = match &state.service {
            Some((service_dn, service_password)) if service_dn == dn => {
                service_password == password
            },
            _ => state
                .people
                .values()
                .any(|(entry_dn, secret)| entry_dn == dn && secret == password),
        };

        Ok(BindResult {
            code: if accepted { SUCCESS } else { INVALID_CREDENTIALS },
            text: String::default(),
        })
    }

    async fn search(
        &mut self,
        _base: &str,
        filter: &str,
    ) -> Result<Vec<String>, DirectoryError> {
        let stall = {
            let mut state = self.state.lock().unwrap();
            state.searches.push(filter.to_owned());
            if state.fail_search {
                return Err(std::io::Error::from(ErrorKind::BrokenPipe).into());
            }
            state.stall_search
        };

        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }

        let state = self.state.lock().unwrap();
        Ok(state
            .people
            .iter()
            .filter(|(login, _)| filter == format!("(&(objectClass=person)(uid={login}))"))
            .map(|(_, (dn, _))| dn.clone())
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), DirectoryError> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}
