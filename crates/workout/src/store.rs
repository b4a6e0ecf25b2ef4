//! Persistence seam for finished workouts.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::ActivitySnapshot;

pub trait ActivityStore: Send + Sync {
    fn save_activity(&self, activity: &ActivitySnapshot) -> Result<(), StoreError>;
    fn get_activity(&self, id: Uuid) -> Result<ActivitySnapshot, StoreError>;
    /// Most recent first.
    fn list_activities(&self) -> Result<Vec<ActivitySnapshot>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryActivityStore {
    activities: Mutex<HashMap<Uuid, ActivitySnapshot>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, ActivitySnapshot>>, StoreError> {
        self.activities
            .lock()
            .map_err(|_| StoreError::Unavailable("activity map lock poisoned".to_string()))
    }
}

impl ActivityStore for InMemoryActivityStore {
    fn save_activity(&self, activity: &ActivitySnapshot) -> Result<(), StoreError> {
        self.lock()?.insert(activity.id, activity.clone());
        debug!(activity = %activity.id, "saved activity");
        Ok(())
    }

    fn get_activity(&self, id: Uuid) -> Result<ActivitySnapshot, StoreError> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn list_activities(&self) -> Result<Vec<ActivitySnapshot>, StoreError> {
        let mut activities: Vec<ActivitySnapshot> = self.lock()?.values().cloned().collect();
        activities.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(activities)
    }
}
