// src/sync/push.rs

use crate::directory::{dn, dn_filter};
use crate::models::User;
use crate::sync::error::{Context, SyncResult};
use crate::sync::{EntityRef, PushOutcome, Reconciler, Scope};
use tracing::{debug, info};

impl Reconciler {
    /// Повторно выкладывает выбранных пользователей вместе с членством в группах.
    /// Используется для ручного восстановления после сбоя или drift.
    pub async fn push_users(&self, ids: &[u64]) -> SyncResult<PushOutcome> {
        let users = self.users.get_by_ids(ids).await.on(format!("users {ids:?}"))?;
        let mut outcome = PushOutcome {
            scope: Scope::Users,
            pushed: 0,
            created: 0,
        };
        for user in users.iter().filter(|u| self.pushable(u)) {
            let groups = self.departments.get_by_ids(&user.department_ids).await.on(&user.user_dn)?;
            if self.publish_user(user, &groups).await? {
                outcome.created += 1;
            }
            self.tracker.mark_synced(EntityRef::User(user.id)).await?;
            outcome.pushed += 1;
            debug!(dn = %user.user_dn, groups = groups.len(), "user pushed");
        }
        info!(pushed = outcome.pushed, created = outcome.created, "user push finished");
        Ok(outcome)
    }

    /// Повторно выкладывает группы подразделений и их активных участников.
    /// Родители идут раньше детей.
    pub async fn push_departments(&self, ids: &[u64]) -> SyncResult<PushOutcome> {
        let mut departments = self.departments.get_by_ids(ids).await.on(format!("departments {ids:?}"))?;
        departments.sort_by_key(|d| dn::depth(&d.group_dn));

        let mut outcome = PushOutcome {
            scope: Scope::Departments,
            pushed: 0,
            created: 0,
        };
        for dept in &departments {
            if self.publish_group(dept).await? {
                outcome.created += 1;
            }
            let members = self.users.get_by_ids(&dept.members).await.on(&dept.group_dn)?;
            for member in members.iter().filter(|u| self.pushable(u)) {
                // участник без записи в каталоге ждёт push_users
                let present = self
                    .directory
                    .exists(&dn_filter(&member.user_dn))
                    .await
                    .on(&member.user_dn)?;
                if !present {
                    continue;
                }
                self.directory
                    .add_user_to_group(&dept.group_dn, &member.user_dn)
                    .await
                    .on(&dept.group_dn)?;
            }
            self.tracker.mark_synced(EntityRef::Department(dept.id)).await?;
            outcome.pushed += 1;
            debug!(dn = %dept.group_dn, members = members.len(), "department pushed");
        }
        info!(pushed = outcome.pushed, created = outcome.created, "department push finished");
        Ok(outcome)
    }

    fn pushable(&self, user: &User) -> bool {
        user.is_active() && !dn::eq(&user.user_dn, &self.settings.admin_dn)
    }
}
