//! Open picking sessions, keyed by order.

use std::collections::HashMap;
use std::sync::Arc;

use stockroom_core::{FulfillmentError, Order, Principal, Result};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::scan::ScanOutcome;
use crate::session::PickSession;

/// Holds the open session of every order being picked.
///
/// Workstations that start picking the same order share its session, so a
/// reload or a second terminal resumes the progress already made.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, PickSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the open session for `order`, or open one.
    ///
    /// The flag is true when an existing session was resumed.
    pub async fn open_or_resume(
        &self,
        order: &Order,
        principal: &Principal,
    ) -> (PickSession, bool) {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&order.id).filter(|s| s.is_open()) {
            return (existing.clone(), true);
        }

        let session = PickSession::open(order, principal);
        info!(
            session = %session.id,
            order_code = %order.code,
            staff = %principal,
            lines = session.lines().len(),
            "picking session opened"
        );
        sessions.insert(order.id, session.clone());
        (session, false)
    }

    pub async fn get(&self, order_id: Uuid) -> Option<PickSession> {
        self.sessions.read().await.get(&order_id).cloned()
    }

    pub async fn scan(&self, order_id: Uuid, token: &str) -> Result<(ScanOutcome, PickSession)> {
        self.with_session(order_id, |session| session.scan(token))
            .await
    }

    pub async fn verify_manually(
        &self,
        order_id: Uuid,
        line_id: &str,
    ) -> Result<(ScanOutcome, PickSession)> {
        self.with_session(order_id, |session| session.verify_manually(line_id))
            .await
    }

    /// Complete and remove the session. Left in place if incomplete.
    pub async fn complete(&self, order_id: Uuid) -> Result<PickSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&order_id)
            .ok_or(FulfillmentError::NoActiveSession { order_id })?;
        session.complete()?;
        sessions
            .remove(&order_id)
            .ok_or(FulfillmentError::NoActiveSession { order_id })
    }

    /// Put back a session whose completion could not be recorded.
    pub async fn reinstate(&self, mut session: PickSession) {
        session.reopen();
        let mut sessions = self.sessions.write().await;
        sessions.entry(session.order_id).or_insert(session);
    }

    /// Abandon and remove the session.
    pub async fn abandon(&self, order_id: Uuid) -> Result<PickSession> {
        let mut sessions = self.sessions.write().await;
        let mut session = sessions
            .remove(&order_id)
            .ok_or(FulfillmentError::NoActiveSession { order_id })?;
        session.abandon()?;
        Ok(session)
    }

    /// Drop any session for the order, without lifecycle checks.
    pub async fn discard(&self, order_id: Uuid) -> Option<PickSession> {
        self.sessions.write().await.remove(&order_id)
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn with_session<T>(
        &self,
        order_id: Uuid,
        f: impl FnOnce(&mut PickSession) -> Result<T>,
    ) -> Result<(T, PickSession)> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&order_id)
            .ok_or(FulfillmentError::NoActiveSession { order_id })?;
        let value = f(session)?;
        Ok((value, session.clone()))
    }
}
