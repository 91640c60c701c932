// src/sync/users.rs

use crate::config::LeaverDetection;
use crate::directory::{dn, dn_filter, DirectoryError};
use crate::events::SyncAction;
use crate::models::user::DepartmentAssignment;
use crate::models::{Department, PasswordHash, SourceUser, SyncState, User, UserStatus};
use crate::store::Criteria;
use crate::sync::error::{Context, SyncError, SyncResult};
use crate::sync::merge::merge_user;
use crate::sync::normalize::{normalize_users, source_key};
use crate::sync::outcome::UserChange;
use crate::sync::{EntityRef, Reconciler, SourceBinding, UserSyncOutcome};
use crate::sync_event;
use std::collections::HashSet;
use tracing::{debug, info, warn};

impl Reconciler {
    /// Создаёт и обновляет пользователей источника, затем снимает уволенных
    pub async fn sync_users(&self, flag: &str) -> SyncResult<UserSyncOutcome> {
        let binding = self.binding(flag)?;
        info!(source = %flag, "user sync started");

        let raw = binding
            .client
            .fetch_all_users()
            .await
            .map_err(|e| SyncError::remote(flag, "users", e))?;
        let staff = normalize_users(flag, &raw)?;

        let mut outcome = UserSyncOutcome::new(flag);
        let total = staff.len();
        for (i, person) in staff.iter().enumerate() {
            let change = self.apply_user(binding, person).await?;
            outcome.record(change);
            debug!(source = %flag, username = %person.username, done = i + 1, total, "user processed");
        }

        let leavers = match binding.config.leaver_detection() {
            LeaverDetection::ExplicitListing => self.listed_leavers(binding, &staff).await?,
            LeaverDetection::RosterAbsence => self.absent_leavers(flag, &staff).await?,
        };
        for leaver in &leavers {
            self.deprovision(leaver).await?;
            outcome.deprovisioned += 1;
        }

        info!(
            source = %flag,
            synced = outcome.synced,
            created = outcome.created,
            updated = outcome.updated,
            reactivated = outcome.reactivated,
            deprovisioned = outcome.deprovisioned,
            "user sync finished"
        );
        Ok(outcome)
    }

    async fn apply_user(&self, binding: &SourceBinding, person: &SourceUser) -> SyncResult<UserChange> {
        let (assignment, groups) = self.resolve_assignment(person).await?;
        let user_dn = dn::child_dn("uid", &person.username, &self.settings.user_base_dn);

        let Some(stored) = self.users.find(&Criteria::new().dn(&user_dn)).await.on(&user_dn)? else {
            self.create_user(person, user_dn, assignment, &groups).await?;
            return Ok(UserChange::Created);
        };

        if !stored.is_active() {
            self.reactivate_user(&stored, person, &assignment).await?;
            return Ok(UserChange::Reactivated);
        }

        if stored.sync_state != SyncState::Synced {
            let current = self.departments.get_by_ids(&stored.department_ids).await.on(&stored.user_dn)?;
            self.publish_user(&stored, &current).await?;
            self.record_membership(stored.id, &current, true).await?;
            self.tracker.mark_synced(EntityRef::User(stored.id)).await?;
            info!(dn = %stored.user_dn, "user entry repaired");
            sync_event!(self.events, SyncAction::EntryRepaired, Some(stored.source.as_str()), &stored.user_dn);
        }

        if !binding.config.update_on_sync {
            return Ok(UserChange::Unchanged);
        }
        self.update_user(&stored, person, &assignment, &groups).await
    }

    /// Строки подразделений пользователя. Ещё не синхронизированные
    /// подразделения пропускаются.
    async fn resolve_assignment(&self, person: &SourceUser) -> SyncResult<(DepartmentAssignment, Vec<Department>)> {
        let mut groups: Vec<Department> = Vec::new();
        for source_id in &person.source_department_ids {
            match self.departments.find(&Criteria::new().source_id(source_id)).await.on(source_id)? {
                Some(dept) if !groups.iter().any(|g| g.id == dept.id) => groups.push(dept),
                Some(_) => {}
                None => warn!(
                    username = %person.username,
                    department = %source_id,
                    "department not synced, membership skipped"
                ),
            }
        }
        let assignment = DepartmentAssignment {
            names: groups.iter().map(|g| g.name.as_str()).collect::<Vec<_>>().join(","),
            ids: groups.iter().map(|g| g.id).collect(),
        };
        Ok((assignment, groups))
    }

    async fn create_user(
        &self,
        person: &SourceUser,
        user_dn: String,
        assignment: DepartmentAssignment,
        groups: &[Department],
    ) -> SyncResult<()> {
        let password = PasswordHash::new_bcrypt(&self.settings.user_init_password, self.settings.bcrypt_cost)
            .map_err(|e| SyncError::assertion(&user_dn, format!("cannot hash initial password: {e}")))?;
        let user = User::from_source(person, user_dn.clone(), assignment, self.settings.default_role.clone(), password);
        let user = self.users.create(user).await.on(&user_dn)?;

        self.publish_user(&user, groups).await?;
        self.record_membership(user.id, groups, true).await?;
        self.tracker.mark_synced(EntityRef::User(user.id)).await?;

        info!(source = %user.source, dn = %user.user_dn, id = user.id, "user created");
        sync_event!(
            self.events,
            SyncAction::UserCreated,
            Some(user.source.as_str()),
            &user.user_dn,
            "departments" => user.departments,
        );
        Ok(())
    }

    async fn update_user(
        &self,
        stored: &User,
        person: &SourceUser,
        assignment: &DepartmentAssignment,
        groups: &[Department],
    ) -> SyncResult<UserChange> {
        let merged = merge_user(stored, person, assignment);
        if merged.same_profile(stored) {
            return Ok(UserChange::Unchanged);
        }

        self.directory.update_user(&merged).await.on(&merged.user_dn)?;

        let joined: Vec<Department> = groups
            .iter()
            .filter(|g| merged.department_ids.contains(&g.id) && !stored.department_ids.contains(&g.id))
            .cloned()
            .collect();
        let left_ids: Vec<u64> = stored
            .department_ids
            .iter()
            .copied()
            .filter(|id| !merged.department_ids.contains(id))
            .collect();
        let left = self.departments.get_by_ids(&left_ids).await.on(&merged.user_dn)?;

        for group in &joined {
            self.directory
                .add_user_to_group(&group.group_dn, &merged.user_dn)
                .await
                .on(&group.group_dn)?;
        }
        for group in &left {
            self.directory
                .remove_user_from_group(&group.group_dn, &merged.user_dn)
                .await
                .on(&group.group_dn)?;
        }
        self.record_membership(merged.id, &joined, true).await?;
        self.record_membership(merged.id, &left, false).await?;

        self.users.update(&merged).await.on(&merged.user_dn)?;
        self.tracker.mark_synced(EntityRef::User(merged.id)).await?;

        info!(dn = %merged.user_dn, joined = joined.len(), left = left.len(), "user updated");
        sync_event!(self.events, SyncAction::UserUpdated, Some(merged.source.as_str()), &merged.user_dn);
        Ok(UserChange::Updated)
    }

    /// Ушедший сотрудник снова в активном списке
    async fn reactivate_user(&self, stored: &User, person: &SourceUser, assignment: &DepartmentAssignment) -> SyncResult<()> {
        let merged = merge_user(stored, person, assignment);
        let groups = self.departments.get_by_ids(&merged.department_ids).await.on(&merged.user_dn)?;

        self.users.update(&merged).await.on(&merged.user_dn)?;
        self.publish_user(&merged, &groups).await?;
        self.record_membership(merged.id, &groups, true).await?;
        self.tracker.mark_synced(EntityRef::User(merged.id)).await?;
        self.tracker.mark_rejoined(&merged).await?;

        info!(dn = %merged.user_dn, "user reactivated");
        sync_event!(self.events, SyncAction::UserReactivated, Some(merged.source.as_str()), &merged.user_dn);
        Ok(())
    }

    /// Запись пользователя и членство в группах каталога. true — запись создана.
    pub(crate) async fn publish_user(&self, user: &User, groups: &[Department]) -> SyncResult<bool> {
        let present = self
            .directory
            .exists(&dn_filter(&user.user_dn))
            .await
            .on(&user.user_dn)?;
        if !present {
            self.directory.create_user(user).await.on(&user.user_dn)?;
        }
        for group in groups {
            self.directory
                .add_user_to_group(&group.group_dn, &user.user_dn)
                .await
                .on(&group.group_dn)?;
        }
        Ok(!present)
    }

    /// Список участников в строках подразделений
    async fn record_membership(&self, user_id: u64, groups: &[Department], joined: bool) -> SyncResult<()> {
        for group in groups {
            let mut rows = self.departments.get_by_ids(&[group.id]).await.on(&group.group_dn)?;
            let Some(mut row) = rows.pop() else {
                continue;
            };
            let changed = if joined { row.add_member(user_id) } else { row.remove_member(user_id) };
            if changed {
                self.departments.update(&row).await.on(&group.group_dn)?;
            }
        }
        Ok(())
    }

    /// Платформа сама отдаёт уволенных; берём только ещё активных.
    /// Вернувшийся в активный список сотрудник в листинге может остаться,
    /// такой id не снимаем.
    async fn listed_leavers(&self, binding: &SourceBinding, staff: &[SourceUser]) -> SyncResult<Vec<User>> {
        let flag = binding.config.flag.as_str();
        let ids = binding
            .client
            .fetch_leaver_ids(binding.config.leave_window())
            .await
            .map_err(|e| SyncError::remote(flag, "leavers", e))?;

        let on_roster: HashSet<&str> = staff.iter().map(|s| s.source_user_id.as_str()).collect();
        let mut seen = HashSet::new();
        let mut leavers = Vec::new();
        for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            let source_user_id = source_key(flag, id);
            if on_roster.contains(source_user_id.as_str()) {
                debug!(source = %flag, id = %source_user_id, "listed leaver is back on the roster, skipped");
                continue;
            }
            if !seen.insert(source_user_id.clone()) {
                continue;
            }
            let criteria = Criteria::new().source_id(&source_user_id).status(UserStatus::Active);
            if let Some(user) = self.users.find(&criteria).await.on(&source_user_id)? {
                leavers.push(user);
            }
        }
        debug!(source = %flag, listed = ids.len(), active = leavers.len(), "leavers resolved");
        Ok(leavers)
    }

    /// Списка уволенных нет: активный пользователь источника, чьего логина
    /// нет в свежем списке, считается уволенным. Переименованный или
    /// переиспользованный логин здесь неотличим от увольнения.
    async fn absent_leavers(&self, flag: &str, staff: &[SourceUser]) -> SyncResult<Vec<User>> {
        let present: HashSet<&str> = staff.iter().map(|s| s.username.as_str()).collect();
        let active = self
            .users
            .list(&Criteria::new().source(flag).status(UserStatus::Active))
            .await
            .on(format!("source '{flag}'"))?;

        let leavers: Vec<User> = active
            .into_iter()
            .filter(|u| !present.contains(u.username.as_str()))
            .collect();
        for user in &leavers {
            warn!(source = %flag, username = %user.username, "absent from active roster, treating as leaver");
        }
        Ok(leavers)
    }

    /// Сначала каталог, потом статус: при ошибке удаления пользователь
    /// остаётся active и будет снят на следующем проходе
    async fn deprovision(&self, user: &User) -> SyncResult<()> {
        match self.directory.delete_user(&user.user_dn).await {
            Ok(()) => {}
            Err(DirectoryError::NotFound(_)) => {
                warn!(dn = %user.user_dn, "directory entry already absent");
            }
            Err(error) => {
                return Err(SyncError::Directory {
                    entity: user.user_dn.clone(),
                    error,
                });
            }
        }
        self.tracker.mark_left(user).await?;

        let groups = self.departments.get_by_ids(&user.department_ids).await.on(&user.user_dn)?;
        self.record_membership(user.id, &groups, false).await?;

        info!(source = %user.source, dn = %user.user_dn, "user deprovisioned");
        sync_event!(
            self.events,
            SyncAction::UserDeprovisioned,
            Some(user.source.as_str()),
            &user.user_dn,
            "username" => user.username,
        );
        Ok(())
    }
}
