use crate::storage::StorageError;

pub const QUOTA_WARNING: &str =
    "Browser storage is full. Your change is on the page but will not survive a reload.";
pub const SAVE_FAILED: &str = "Failed to save content. Please try again later.";
pub const LOAD_FAILED: &str = "Failed to load content. Please try again later.";
pub const METRICS_LOAD_FAILED: &str = "Failed to load metrics. Showing default figures.";
pub const PHOTO_LOAD_FAILED: &str = "Failed to load the profile photo. Showing the default image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A toast shown to the admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Notices {
    queue: Vec<Notice>,
}

impl Notices {
    pub fn push(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.queue.push(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }

    /// Quota problems get their own warning; everything else is a save failure.
    pub fn storage_failure(&mut self, err: &StorageError) {
        if err.is_quota_exceeded() {
            log::warn!("{err}");
            self.warning(QUOTA_WARNING);
        } else {
            log::error!("{err}");
            self.error(SAVE_FAILED);
        }
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.queue.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.queue.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.queue)
    }
}
