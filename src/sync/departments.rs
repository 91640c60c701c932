// src/sync/departments.rs

use crate::directory::{dn, dn_filter};
use crate::events::SyncAction;
use crate::models::{Department, SourceDepartment, SyncState, GROUP_TYPE_CN};
use crate::store::Criteria;
use crate::sync::error::{Context, SyncError, SyncResult};
use crate::sync::normalize::{normalize_departments, root_key};
use crate::sync::tree::{DepartmentTree, ParentRef};
use crate::sync::{DepartmentSyncOutcome, EntityRef, Reconciler};
use crate::sync_event;
use tracing::{debug, info};

/// Куда вешается подразделение: строка родителя или base DN (id 0)
#[derive(Debug, Clone)]
struct Anchor {
    id: u64,
    dn: String,
}

enum Ensured {
    Created,
    Repaired,
    Present,
}

impl Reconciler {
    /// Выкладывает дерево подразделений источника в каталог.
    /// Повторный запуск по тем же данным ничего не пишет.
    pub async fn sync_departments(&self, flag: &str) -> SyncResult<DepartmentSyncOutcome> {
        let binding = self.binding(flag)?;
        info!(source = %flag, "department sync started");

        let raw = binding
            .client
            .fetch_all_departments()
            .await
            .map_err(|e| SyncError::remote(flag, "departments", e))?;
        let departments = normalize_departments(flag, &raw)?;
        let tree = DepartmentTree::build(&root_key(flag), departments);

        let anchor = self.anchor(&tree).await?;
        let mut outcome = DepartmentSyncOutcome::new(flag, tree.len());

        for visit in tree.walk() {
            let parent = match visit.parent {
                ParentRef::Anchor => anchor.clone(),
                ParentRef::Node(parent) => self.parent_anchor(visit.department, parent).await?,
            };
            match self.ensure_department(visit.department, &parent).await? {
                Ensured::Created => outcome.created += 1,
                Ensured::Repaired => outcome.repaired += 1,
                Ensured::Present => {}
            }
        }

        info!(
            source = %flag,
            seen = outcome.seen,
            created = outcome.created,
            repaired = outcome.repaired,
            "department sync finished"
        );
        Ok(outcome)
    }

    /// Без реального корня дерево вешается на ранее сохранённый корень
    /// источника, а если его нет, то на base DN.
    async fn anchor(&self, tree: &DepartmentTree) -> SyncResult<Anchor> {
        let base = Anchor {
            id: 0,
            dn: self.settings.base_dn.clone(),
        };
        if tree.has_real_root() {
            return Ok(base);
        }
        let stored_root = self
            .departments
            .find(&Criteria::new().source_id(tree.root_key()))
            .await
            .on(tree.root_key())?;
        Ok(stored_root
            .map(|root| Anchor { id: root.id, dn: root.group_dn })
            .unwrap_or(base))
    }

    /// Родитель уже обработан прямым обходом, поэтому его строка обязана быть
    async fn parent_anchor(&self, child: &SourceDepartment, parent: &SourceDepartment) -> SyncResult<Anchor> {
        let row = self
            .departments
            .find(&Criteria::new().source_id(&parent.source_dept_id))
            .await
            .on(&parent.source_dept_id)?
            .ok_or_else(|| {
                SyncError::assertion(
                    &child.source_dept_id,
                    format!("parent row {} is missing during pre-order walk", parent.source_dept_id),
                )
            })?;
        Ok(Anchor {
            id: row.id,
            dn: row.group_dn,
        })
    }

    async fn ensure_department(&self, dept: &SourceDepartment, parent: &Anchor) -> SyncResult<Ensured> {
        let group_dn = dn::child_dn(GROUP_TYPE_CN, &dept.name, &parent.dn);

        if let Some(existing) = self.departments.find(&Criteria::new().dn(&group_dn)).await.on(&group_dn)? {
            if existing.sync_state == SyncState::Synced {
                debug!(dn = %group_dn, "department already synced");
                return Ok(Ensured::Present);
            }
            self.publish_group(&existing).await?;
            self.tracker.mark_synced(EntityRef::Department(existing.id)).await?;
            self.link_child(parent, existing.id).await?;
            info!(source = %dept.source, dn = %group_dn, "department entry repaired");
            sync_event!(self.events, SyncAction::EntryRepaired, Some(dept.source.as_str()), &group_dn);
            return Ok(Ensured::Repaired);
        }

        let row = self
            .departments
            .create(Department::from_source(dept, parent.id, &parent.dn))
            .await
            .on(&group_dn)?;
        self.publish_group(&row).await?;
        self.tracker.mark_synced(EntityRef::Department(row.id)).await?;
        self.link_child(parent, row.id).await?;

        info!(source = %dept.source, dn = %row.group_dn, id = row.id, "department created");
        sync_event!(
            self.events,
            SyncAction::DepartmentCreated,
            Some(dept.source.as_str()),
            &row.group_dn,
            "source_dept_id" => dept.source_dept_id,
        );
        Ok(Ensured::Created)
    }

    /// Создаёт группу в каталоге, если её там нет. true — создана.
    pub(crate) async fn publish_group(&self, dept: &Department) -> SyncResult<bool> {
        let present = self
            .directory
            .exists(&dn_filter(&dept.group_dn))
            .await
            .on(&dept.group_dn)?;
        if present {
            return Ok(false);
        }
        self.directory.create_group(dept).await.on(&dept.group_dn)?;
        Ok(true)
    }

    async fn link_child(&self, parent: &Anchor, child_id: u64) -> SyncResult<()> {
        if parent.id == 0 {
            return Ok(());
        }
        let entity = EntityRef::Department(parent.id);
        let mut rows = self.departments.get_by_ids(&[parent.id]).await.on(entity)?;
        let Some(mut parent_row) = rows.pop() else {
            return Err(SyncError::assertion(entity.to_string(), "parent row vanished"));
        };
        if parent_row.add_child(child_id) {
            self.departments.update(&parent_row).await.on(entity)?;
        }
        Ok(())
    }
}
