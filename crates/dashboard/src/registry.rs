use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vitrine_primitives::{EntityKey, SessionId};

use crate::dashboard::{Dashboard, DashboardEnv};
use crate::session::{DashboardSession, RenderRequest};
use crate::Result;

type SessionKey = (String, EntityKey);

/// Open sessions keyed by dashboard kind and entity.
///
/// At most one live session exists per key; opening an already open
/// dashboard refreshes and returns the existing session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
	sessions: Mutex<HashMap<SessionKey, DashboardSession>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the live session for `dashboard` and `key` after queueing a
	/// refresh, or opens a new one.
	///
	/// The registry is locked while a new session opens, so dashboard hooks
	/// must not call back into it.
	pub fn open_or_refresh(&self, env: &DashboardEnv, dashboard: Arc<dyn Dashboard>, key: EntityKey) -> Result<DashboardSession> {
		let mut sessions = self.sessions.lock();
		let id = (dashboard.kind().to_string(), key);
		if let Some(session) = sessions.get(&id)
			&& session.is_live()
		{
			tracing::debug!(session = %session.id(), "registry.refresh");
			session.request_render(RenderRequest::refresh())?;
			return Ok(session.clone());
		}

		let session = DashboardSession::open(env, dashboard, id.1.clone())?;
		sessions.insert(id, session.clone());
		Ok(session)
	}

	pub fn get(&self, kind: &str, key: &EntityKey) -> Option<DashboardSession> {
		self.sessions.lock().get(&(kind.to_string(), key.clone())).filter(|session| session.is_live()).cloned()
	}

	/// Closes and forgets the session for `kind` and `key`. Returns false if none was open.
	pub fn close(&self, kind: &str, key: &EntityKey) -> bool {
		let removed = self.sessions.lock().remove(&(kind.to_string(), key.clone()));
		match removed {
			Some(session) => {
				let was_live = session.is_live();
				session.close();
				was_live
			}
			None => false,
		}
	}

	/// Closes the session with `id`, for views that only know their session id.
	/// Returns false if no open session has that id.
	pub fn close_session(&self, id: SessionId) -> bool {
		let removed = {
			let mut sessions = self.sessions.lock();
			let key = sessions.iter().find(|(_, session)| session.id() == id).map(|(key, _)| key.clone());
			key.and_then(|key| sessions.remove(&key))
		};
		match removed {
			Some(session) => {
				let was_live = session.is_live();
				session.close();
				was_live
			}
			None => false,
		}
	}

	pub fn close_all(&self) {
		let sessions: Vec<_> = self.sessions.lock().drain().map(|(_, session)| session).collect();
		for session in sessions {
			session.close();
		}
	}

	/// Returns the number of live sessions, forgetting closed ones.
	pub fn len(&self) -> usize {
		let mut sessions = self.sessions.lock();
		sessions.retain(|_, session| session.is_live());
		sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Live sessions, in no particular order.
	pub fn sessions(&self) -> Vec<DashboardSession> {
		self.sessions.lock().values().filter(|session| session.is_live()).cloned().collect()
	}
}
