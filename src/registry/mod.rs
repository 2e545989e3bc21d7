// Patient record store: persons, links, identity vectors and operators

#[cfg(test)]
mod tests;

pub mod activity;
pub mod validation;

pub use activity::ActivityLogger;

use pgvector::Vector;
use serde::Serialize;
use sqlx::Connection;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Session, password};
use crate::config::Config;
use crate::database::{
    ActivityEntry, ActivityQueries, NewOperator, NewPerson, Operator, OperatorQueries, Person,
    PersonKind, PersonQueries, PersonUpdate, Relation, RelationQueries, RelationRow, SearchFilter,
    VectorQueries,
};
use crate::{RegistryError, Result};

pub const DEFAULT_ACTIVITY_LIMIT: i64 = 100;
const MAX_ACTIVITY_LIMIT: i64 = 1000;

/// Child, parent and their link created together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyRecord {
    pub child: Person,
    pub parent: Person,
    pub relation: Relation,
}

/// Identity vectors stored for one person
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VectorCapture {
    pub kind: PersonKind,
    pub hn: String,
    pub vector_ids: Vec<Uuid>,
    /// Previously active vectors retired by this capture
    pub retired: u64,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    activity: ActivityLogger,
    dimension: usize,
}

impl RecordStore {
    #[inline]
    pub fn new(activity: ActivityLogger, dimension: usize) -> Self {
        Self {
            activity,
            dimension,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ActivityLogger::new(config.audit.mode),
            config.matcher.embedding_dimension as usize,
        )
    }

    #[inline]
    pub fn activity(&self) -> &ActivityLogger {
        &self.activity
    }

    #[inline]
    pub async fn insert(&self, session: &Session, kind: PersonKind, person: NewPerson) -> Result<Person> {
        let person = validation::new_person(person)?;
        let operator = session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        let created = PersonQueries::insert(&mut tx, kind, &person)
            .await
            .map_err(|e| duplicate_as(e, kind.as_str(), &person.hn))?;

        let description = format!("Inserted {} {}", kind, created.hn);
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!("{} inserted {} {}", operator.op_number, kind, created.hn);
        Ok(created)
    }

    /// Insert a child and a parent and link them in one transaction
    #[inline]
    pub async fn register_family(
        &self,
        session: &Session,
        child: NewPerson,
        parent: NewPerson,
    ) -> Result<FamilyRecord> {
        let child = validation::new_person(child)?;
        let parent = validation::new_person(parent)?;
        let operator = session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        let child = PersonQueries::insert(&mut tx, PersonKind::Child, &child)
            .await
            .map_err(|e| duplicate_as(e, PersonKind::Child.as_str(), &child.hn))?;
        let parent = PersonQueries::insert(&mut tx, PersonKind::Parent, &parent)
            .await
            .map_err(|e| duplicate_as(e, PersonKind::Parent.as_str(), &parent.hn))?;
        let relation = RelationQueries::insert(&mut tx, parent.person_id, child.person_id).await?;

        let description = format!(
            "Registered child {} with parent {}",
            child.hn, parent.hn
        );
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!("{} registered child {} with parent {}", operator.op_number, child.hn, parent.hn);
        Ok(FamilyRecord {
            child,
            parent,
            relation,
        })
    }

    /// Update an active record; inactive or missing records are `NotFound`
    #[inline]
    pub async fn update(
        &self,
        session: &Session,
        kind: PersonKind,
        hn: &str,
        update: PersonUpdate,
    ) -> Result<Person> {
        let hn = validation::hn(hn)?;
        let update = validation::person_update(update)?;
        let operator = session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        let updated = PersonQueries::update(&mut tx, kind, &hn, &update)
            .await?
            .ok_or_else(|| not_found(kind, &hn))?;

        let description = format!("Updated {} {}", kind, hn);
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!("{} updated {} {}", operator.op_number, kind, hn);
        Ok(updated)
    }

    /// Link two active records; a second link of the same pair is `AlreadyLinked`
    #[inline]
    pub async fn link(&self, session: &Session, parent_hn: &str, child_hn: &str) -> Result<Relation> {
        let parent_hn = validation::hn(parent_hn)?;
        let child_hn = validation::hn(child_hn)?;
        let operator = session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        let parent = PersonQueries::get_by_hn(&mut tx, PersonKind::Parent, &parent_hn, false)
            .await?
            .ok_or_else(|| not_found(PersonKind::Parent, &parent_hn))?;
        let child = PersonQueries::get_by_hn(&mut tx, PersonKind::Child, &child_hn, false)
            .await?
            .ok_or_else(|| not_found(PersonKind::Child, &child_hn))?;

        let relation = RelationQueries::insert(&mut tx, parent.person_id, child.person_id)
            .await
            .map_err(|e| match RegistryError::from(e) {
                RegistryError::Duplicate { .. } => RegistryError::AlreadyLinked {
                    parent_hn: parent_hn.clone(),
                    child_hn: child_hn.clone(),
                },
                other => other,
            })?;

        let description = format!("Linked parent {} to child {}", parent_hn, child_hn);
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!("{} linked parent {} to child {}", operator.op_number, parent_hn, child_hn);
        Ok(relation)
    }

    #[inline]
    pub async fn unlink(&self, session: &Session, parent_hn: &str, child_hn: &str) -> Result<()> {
        let parent_hn = validation::hn(parent_hn)?;
        let child_hn = validation::hn(child_hn)?;
        let operator = session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        if !RelationQueries::delete_by_hn(&mut tx, &parent_hn, &child_hn).await? {
            return Err(RegistryError::NotFound {
                entity: "relation",
                key: format!("{}/{}", parent_hn, child_hn),
            });
        }

        let description = format!("Unlinked parent {} from child {}", parent_hn, child_hn);
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!("{} unlinked parent {} from child {}", operator.op_number, parent_hn, child_hn);
        Ok(())
    }

    /// Soft delete: the record and its vectors become inactive together
    #[inline]
    pub async fn deactivate(&self, session: &Session, kind: PersonKind, hn: &str) -> Result<()> {
        let hn = validation::hn(hn)?;
        let operator = session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        let person_id = PersonQueries::deactivate(&mut tx, kind, &hn)
            .await?
            .ok_or_else(|| not_found(kind, &hn))?;
        let retired = VectorQueries::deactivate_for_person(&mut tx, kind, person_id).await?;

        let description = format!("Deactivated {} {}", kind, hn);
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!(
            "{} deactivated {} {} ({} vectors retired)",
            operator.op_number, kind, hn, retired
        );
        Ok(())
    }

    /// Irreversible removal; the database refuses it unless connected as admin
    #[inline]
    pub async fn hard_delete(&self, session: &Session, kind: PersonKind, hn: &str) -> Result<()> {
        let hn = validation::hn(hn)?;
        let operator = session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        if !PersonQueries::hard_delete(&mut tx, kind, &hn).await? {
            return Err(not_found(kind, &hn));
        }

        let description = format!("Hard deleted {} {}", kind, hn);
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!("{} hard deleted {} {}", operator.op_number, kind, hn);
        Ok(())
    }

    /// Replace a person's active identity vectors with a new capture set
    #[inline]
    pub async fn insert_vectors(
        &self,
        session: &Session,
        kind: PersonKind,
        hn: &str,
        vectors: Vec<Vec<f32>>,
        folder: Option<String>,
    ) -> Result<VectorCapture> {
        let hn = validation::hn(hn)?;
        validation::vector_set(&vectors, self.dimension)?;
        let folder = folder
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        let operator = session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        let person = PersonQueries::get_by_hn(&mut tx, kind, &hn, false)
            .await?
            .ok_or_else(|| not_found(kind, &hn))?;
        let retired = VectorQueries::deactivate_for_person(&mut tx, kind, person.person_id).await?;

        let mut vector_ids = Vec::with_capacity(vectors.len());
        for (slot, embedding) in (1_i16..).zip(vectors) {
            let id = VectorQueries::insert(
                &mut tx,
                kind,
                person.person_id,
                slot,
                Vector::from(embedding),
                folder.as_deref(),
            )
            .await?;
            vector_ids.push(id);
        }

        let description = format!(
            "Stored {} identity vectors for {} {}",
            vector_ids.len(),
            kind,
            hn
        );
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!(
            "{} stored {} vectors for {} {} ({} retired)",
            operator.op_number,
            vector_ids.len(),
            kind,
            hn,
            retired
        );
        Ok(VectorCapture {
            kind,
            hn,
            vector_ids,
            retired,
        })
    }

    #[inline]
    pub async fn search_by_hn(&self, session: &Session, hn: &str) -> Result<Vec<RelationRow>> {
        let hn = validation::hn(hn)?;
        self.search(session, SearchFilter::by_hn(&hn)).await
    }

    #[inline]
    pub async fn search_by_name(&self, session: &Session, name: &str) -> Result<Vec<RelationRow>> {
        let filter = SearchFilter::by_name(name).normalized();
        if filter.is_empty() {
            return Err(RegistryError::Validation("name is required".into()));
        }
        self.search(session, filter).await
    }

    /// Every supplied field narrows the result; all fields empty is rejected
    #[inline]
    pub async fn search_multi_criteria(
        &self,
        session: &Session,
        filter: SearchFilter,
    ) -> Result<Vec<RelationRow>> {
        let filter = filter.normalized();
        if filter.is_empty() {
            return Err(RegistryError::Validation(
                "At least one search criterion is required".into(),
            ));
        }
        self.search(session, filter).await
    }

    async fn search(&self, session: &Session, filter: SearchFilter) -> Result<Vec<RelationRow>> {
        session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        let rows = RelationQueries::search(active.conn(), &filter).await?;

        info!("Search {:?} returned {} rows", filter, rows.len());
        Ok(rows)
    }

    #[inline]
    pub async fn get_person(
        &self,
        session: &Session,
        kind: PersonKind,
        hn: &str,
        include_inactive: bool,
    ) -> Result<Person> {
        let hn = validation::hn(hn)?;
        session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        PersonQueries::get_by_hn(active.conn(), kind, &hn, include_inactive)
            .await?
            .ok_or_else(|| not_found(kind, &hn))
    }

    #[inline]
    pub async fn list_active(&self, session: &Session, kind: PersonKind) -> Result<Vec<Person>> {
        session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        Ok(PersonQueries::list_active(active.conn(), kind).await?)
    }

    #[inline]
    pub async fn list_relations(&self, session: &Session) -> Result<Vec<RelationRow>> {
        session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        Ok(RelationQueries::list_all(active.conn()).await?)
    }

    /// Create an operator account; the database only allows this under admin credentials
    #[inline]
    pub async fn insert_operator(&self, session: &Session, new_operator: NewOperator) -> Result<Operator> {
        let new_operator = validation::new_operator(new_operator)?;
        let operator = session.require_operator().await?;
        let password_hash = password::hash_password_blocking(new_operator.password).await?;

        let mut active = session.connections().acquire().await?;
        let mut tx = active.conn().begin().await?;

        let created = OperatorQueries::insert(
            &mut tx,
            &new_operator.op_number,
            &new_operator.username,
            &password_hash,
            new_operator.role,
        )
        .await
        .map_err(|e| match RegistryError::from(e) {
            RegistryError::Duplicate { key, .. } if key.contains("username") => {
                RegistryError::Duplicate {
                    entity: "operator",
                    key: new_operator.username.clone(),
                }
            }
            RegistryError::Duplicate { .. } => RegistryError::Duplicate {
                entity: "operator",
                key: new_operator.op_number.clone(),
            },
            other => other,
        })?;

        let description = format!("Created operator {} ({})", created.op_number, created.role);
        self.activity
            .within(&mut tx, &operator.op_number, &description)
            .await?;
        tx.commit().await?;
        self.activity
            .after_commit(active.conn(), &operator.op_number, &description)
            .await;

        info!("{} created operator {}", operator.op_number, created.op_number);
        Ok(created)
    }

    /// Most recent audit entries, newest first
    #[inline]
    pub async fn activity_log(&self, session: &Session, limit: Option<i64>) -> Result<Vec<ActivityEntry>> {
        let limit = limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
        if !(1..=MAX_ACTIVITY_LIMIT).contains(&limit) {
            return Err(RegistryError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_ACTIVITY_LIMIT
            )));
        }
        session.require_operator().await?;

        let mut active = session.connections().acquire().await?;
        Ok(ActivityQueries::recent(active.conn(), limit).await?)
    }
}

fn not_found(kind: PersonKind, hn: &str) -> RegistryError {
    RegistryError::NotFound {
        entity: kind.as_str(),
        key: hn.to_string(),
    }
}

/// Report a unique violation against the natural key the caller supplied
fn duplicate_as(error: sqlx::Error, entity: &'static str, key: &str) -> RegistryError {
    match RegistryError::from(error) {
        RegistryError::Duplicate { .. } => RegistryError::Duplicate {
            entity,
            key: key.to_string(),
        },
        other => other,
    }
}
