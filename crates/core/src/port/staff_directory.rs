// Staff Directory Port (who may act as a helper)

use crate::domain::UserId;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Privilege lookup consumed by the transport layer, never by the engine
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    /// True if `uid` may assign, resolve, requeue and open/close queues
    async fn is_staff(&self, uid: UserId) -> Result<bool>;
}

/// Fixed staff list (from configuration)
#[derive(Debug, Clone, Default)]
pub struct StaticStaffDirectory {
    staff: HashSet<UserId>,
}

impl StaticStaffDirectory {
    pub fn new(staff: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            // uid 0 is anonymous and can never be staff
            staff: staff.into_iter().filter(|uid| *uid != 0).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.staff.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staff.is_empty()
    }
}

#[async_trait]
impl StaffDirectory for StaticStaffDirectory {
    async fn is_staff(&self, uid: UserId) -> Result<bool> {
        Ok(self.staff.contains(&uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticStaffDirectory::new([3, 5, 0]);
        assert_eq!(directory.len(), 2);
        assert!(directory.is_staff(3).await.unwrap());
        assert!(!directory.is_staff(4).await.unwrap());
        assert!(!directory.is_staff(0).await.unwrap());
    }
}
