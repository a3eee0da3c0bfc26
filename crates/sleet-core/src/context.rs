use std::sync::Arc;

use chrono::{DateTime, Utc};
use sleet_fs::SleetFileSystem;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::settings::FeedSettings;

/// Request scoped state shared by every service of one command.
#[derive(Clone, Debug)]
pub struct SleetContext {
    pub fs: Arc<SleetFileSystem>,
    pub settings: FeedSettings,
    pub commit_id: Uuid,
    pub now: DateTime<Utc>,
}

impl SleetContext {
    pub fn new(fs: Arc<SleetFileSystem>, settings: FeedSettings) -> Self {
        Self {
            fs,
            settings,
            commit_id: Uuid::new_v4(),
            now: Utc::now(),
        }
    }

    /// A copy with fresh commit id and timestamp, for a follow-up batch in the same command.
    pub fn next_commit(&self) -> Self {
        Self {
            commit_id: Uuid::new_v4(),
            now: Utc::now(),
            ..self.clone()
        }
    }

    pub fn with_settings(&self, settings: FeedSettings) -> Self {
        Self {
            settings,
            ..self.clone()
        }
    }

    pub fn token(&self) -> &CancellationToken {
        self.fs.token()
    }

    pub fn commit_id_string(&self) -> String {
        self.commit_id.to_string()
    }
}
