// src/sync/drift.rs

use crate::directory::dn;
use crate::events::SyncAction;
use crate::models::{Department, User};
use crate::sync::diff::diff_by;
use crate::sync::error::{Context, SyncResult};
use crate::sync::{DriftReport, EntityRef, Reconciler, Scope};
use crate::sync_event;
use tracing::{info, warn};

impl Reconciler {
    /// Строки подразделений, чьих групп нет в каталоге, становятся stale
    pub async fn detect_department_drift(&self) -> SyncResult<DriftReport> {
        let rows = self.departments.list_all().await.on("departments")?;
        let rows: Vec<Department> = rows.into_iter().filter(|d| self.tracked(&d.group_dn)).collect();
        let present = self.directory.list_group_dns().await.on(&self.settings.base_dn)?;

        let missing = diff_by(&rows, &present, |d| dn::normalize(&d.group_dn), |entry| dn::normalize(entry));
        let mut report = DriftReport {
            scope: Scope::Departments,
            checked: rows.len(),
            stale: Vec::with_capacity(missing.len()),
        };
        for dept in missing {
            self.tracker.mark_stale(EntityRef::Department(dept.id)).await?;
            warn!(dn = %dept.group_dn, "group missing from directory");
            sync_event!(self.events, SyncAction::MarkedStale, Some(dept.source.as_str()), &dept.group_dn);
            report.stale.push(dept.group_dn.clone());
        }

        info!(checked = report.checked, stale = report.stale.len(), "department drift check finished");
        Ok(report)
    }

    /// То же для пользователей; ушедших не проверяем, их записи удалены намеренно
    pub async fn detect_user_drift(&self) -> SyncResult<DriftReport> {
        let rows = self.users.list_all().await.on("users")?;
        let rows: Vec<User> = rows
            .into_iter()
            .filter(|u| u.is_active() && self.tracked(&u.user_dn))
            .collect();
        let present = self.directory.list_user_dns().await.on(&self.settings.user_base_dn)?;

        let missing = diff_by(&rows, &present, |u| dn::normalize(&u.user_dn), |entry| dn::normalize(entry));
        let mut report = DriftReport {
            scope: Scope::Users,
            checked: rows.len(),
            stale: Vec::with_capacity(missing.len()),
        };
        for user in missing {
            self.tracker.mark_stale(EntityRef::User(user.id)).await?;
            warn!(dn = %user.user_dn, "user entry missing from directory");
            sync_event!(self.events, SyncAction::MarkedStale, Some(user.source.as_str()), &user.user_dn);
            report.stale.push(user.user_dn.clone());
        }

        info!(checked = report.checked, stale = report.stale.len(), "user drift check finished");
        Ok(report)
    }

    /// base DN и учётка администратора синхронизацией не управляются
    fn tracked(&self, entry_dn: &str) -> bool {
        !dn::eq(entry_dn, &self.settings.base_dn) && !dn::eq(entry_dn, &self.settings.admin_dn)
    }
}
