#[cfg(test)]
mod tests;

use super::models::*;
use pgvector::Vector;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

const PERSON_COLUMNS: &str =
    "person_id, hn, firstname, lastname, age, sex, dob, active_status, created_at";

const OPERATOR_COLUMNS: &str = "op_id, op_number, username, role, created_at";

pub struct PersonQueries;

impl PersonQueries {
    #[inline]
    pub async fn insert(
        conn: &mut PgConnection,
        kind: PersonKind,
        person: &NewPerson,
    ) -> sqlx::Result<Person> {
        let sql = format!(
            "INSERT INTO {} (person_id, hn, firstname, lastname, age, sex, dob, active_status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, now())
             RETURNING {}",
            kind.table(),
            PERSON_COLUMNS
        );

        sqlx::query_as::<_, Person>(&sql)
            .bind(Uuid::new_v4())
            .bind(&person.hn)
            .bind(&person.firstname)
            .bind(&person.lastname)
            .bind(person.age)
            .bind(&person.sex)
            .bind(person.dob)
            .fetch_one(&mut *conn)
            .await
    }

    #[inline]
    pub async fn get_by_hn(
        conn: &mut PgConnection,
        kind: PersonKind,
        hn: &str,
        include_inactive: bool,
    ) -> sqlx::Result<Option<Person>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE hn = $1 AND (active_status OR $2)",
            PERSON_COLUMNS,
            kind.table()
        );

        sqlx::query_as::<_, Person>(&sql)
            .bind(hn)
            .bind(include_inactive)
            .fetch_optional(&mut *conn)
            .await
    }

    #[inline]
    pub async fn list_active(conn: &mut PgConnection, kind: PersonKind) -> sqlx::Result<Vec<Person>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE active_status ORDER BY created_at DESC, hn ASC",
            PERSON_COLUMNS,
            kind.table()
        );

        sqlx::query_as::<_, Person>(&sql)
            .fetch_all(&mut *conn)
            .await
    }

    /// Update an active record; `None` when no active row carries `hn`
    #[inline]
    pub async fn update(
        conn: &mut PgConnection,
        kind: PersonKind,
        hn: &str,
        update: &PersonUpdate,
    ) -> sqlx::Result<Option<Person>> {
        if update.is_empty() {
            return Self::get_by_hn(conn, kind, hn, false).await;
        }

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET ", kind.table()));
        {
            let mut assignments = builder.separated(", ");
            if let Some(firstname) = &update.firstname {
                assignments.push("firstname = ");
                assignments.push_bind_unseparated(firstname.clone());
            }
            if let Some(lastname) = &update.lastname {
                assignments.push("lastname = ");
                assignments.push_bind_unseparated(lastname.clone());
            }
            if let Some(age) = update.age {
                assignments.push("age = ");
                assignments.push_bind_unseparated(age);
            }
            if let Some(sex) = &update.sex {
                assignments.push("sex = ");
                assignments.push_bind_unseparated(sex.clone());
            }
            if let Some(dob) = update.dob {
                assignments.push("dob = ");
                assignments.push_bind_unseparated(dob);
            }
        }
        builder.push(" WHERE hn = ");
        builder.push_bind(hn.to_string());
        builder.push(" AND active_status RETURNING ");
        builder.push(PERSON_COLUMNS);

        builder
            .build_query_as::<Person>()
            .fetch_optional(&mut *conn)
            .await
    }

    /// Mark an active record inactive; `None` when nothing was active under `hn`
    #[inline]
    pub async fn deactivate(
        conn: &mut PgConnection,
        kind: PersonKind,
        hn: &str,
    ) -> sqlx::Result<Option<Uuid>> {
        let sql = format!(
            "UPDATE {} SET active_status = FALSE WHERE hn = $1 AND active_status RETURNING person_id",
            kind.table()
        );

        sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(hn)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Physically remove a record; vectors and links go with it by cascade
    #[inline]
    pub async fn hard_delete(conn: &mut PgConnection, kind: PersonKind, hn: &str) -> sqlx::Result<bool> {
        let sql = format!("DELETE FROM {} WHERE hn = $1", kind.table());

        let result = sqlx::query(&sql).bind(hn).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct VectorQueries;

impl VectorQueries {
    #[inline]
    pub async fn insert(
        conn: &mut PgConnection,
        kind: PersonKind,
        person_id: Uuid,
        slot: i16,
        embedding: Vector,
        folder: Option<&str>,
    ) -> sqlx::Result<Uuid> {
        let sql = format!(
            "INSERT INTO {} (vector_id, person_id, slot, embedding, folder, active_status, created_at)
             VALUES ($1, $2, $3, $4, $5, TRUE, clock_timestamp())
             RETURNING vector_id",
            kind.vector_table()
        );

        sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(Uuid::new_v4())
            .bind(person_id)
            .bind(slot)
            .bind(embedding)
            .bind(folder)
            .fetch_one(&mut *conn)
            .await
    }

    /// Retire every active vector of a person, returning how many were retired
    #[inline]
    pub async fn deactivate_for_person(
        conn: &mut PgConnection,
        kind: PersonKind,
        person_id: Uuid,
    ) -> sqlx::Result<u64> {
        let sql = format!(
            "UPDATE {} SET active_status = FALSE WHERE person_id = $1 AND active_status",
            kind.vector_table()
        );

        let result = sqlx::query(&sql).bind(person_id).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    #[inline]
    pub async fn list_for_person(
        conn: &mut PgConnection,
        kind: PersonKind,
        person_id: Uuid,
    ) -> sqlx::Result<Vec<IdentityVector>> {
        let sql = format!(
            "SELECT vector_id, person_id, slot, folder, active_status, created_at
             FROM {} WHERE person_id = $1 ORDER BY created_at ASC, slot ASC",
            kind.vector_table()
        );

        sqlx::query_as::<_, IdentityVector>(&sql)
            .bind(person_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// Nearest active owner by cosine distance, using each owner's best capture.
    ///
    /// Ties are broken by the owner's earliest active capture, then by HN.
    #[inline]
    pub async fn find_closest(
        conn: &mut PgConnection,
        kind: PersonKind,
        probe: Vector,
    ) -> sqlx::Result<Option<MatchCandidate>> {
        let sql = format!(
            "SELECT p.hn, MIN(v.embedding <=> $1) AS distance
             FROM {vectors} v
             JOIN {people} p ON p.person_id = v.person_id
             WHERE v.active_status AND p.active_status
             GROUP BY p.person_id, p.hn
             ORDER BY distance ASC, MIN(v.created_at) ASC, p.hn ASC
             LIMIT 1",
            vectors = kind.vector_table(),
            people = kind.table()
        );

        sqlx::query_as::<_, MatchCandidate>(&sql)
            .bind(probe)
            .fetch_optional(&mut *conn)
            .await
    }
}

pub struct RelationQueries;

impl RelationQueries {
    #[inline]
    pub async fn insert(
        conn: &mut PgConnection,
        parent_id: Uuid,
        child_id: Uuid,
    ) -> sqlx::Result<Relation> {
        sqlx::query_as::<_, Relation>(
            "INSERT INTO parent_child (relation_id, parent_id, child_id, created_at)
             VALUES ($1, $2, $3, now())
             RETURNING relation_id, parent_id, child_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(parent_id)
        .bind(child_id)
        .fetch_one(&mut *conn)
        .await
    }

    /// Remove the link between two HNs; `false` when they were not linked
    #[inline]
    pub async fn delete_by_hn(
        conn: &mut PgConnection,
        parent_hn: &str,
        child_hn: &str,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "DELETE FROM parent_child pc
             USING parent p, child c
             WHERE pc.parent_id = p.person_id
               AND pc.child_id = c.person_id
               AND p.hn = $1
               AND c.hn = $2",
        )
        .bind(parent_hn)
        .bind(child_hn)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Active persons matching `filter`, each joined with its active counterpart.
    ///
    /// Child and parent populations are searched separately and combined;
    /// an unlinked person yields one row with the counterpart columns null.
    #[inline]
    pub async fn search(
        conn: &mut PgConnection,
        filter: &SearchFilter,
    ) -> sqlx::Result<Vec<RelationRow>> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("");
        push_search_branch(&mut builder, PersonKind::Child, filter);
        builder.push(" UNION ");
        push_search_branch(&mut builder, PersonKind::Parent, filter);
        builder.push(" ORDER BY child_hn NULLS LAST, parent_hn NULLS LAST");

        debug!("Relation search: {}", builder.sql());

        builder
            .build_query_as::<RelationRow>()
            .fetch_all(&mut *conn)
            .await
    }

    /// Every link whose two sides are both active
    #[inline]
    pub async fn list_all(conn: &mut PgConnection) -> sqlx::Result<Vec<RelationRow>> {
        sqlx::query_as::<_, RelationRow>(
            "SELECT pr.relation_id,
                    c.hn AS child_hn, c.firstname AS child_firstname, c.lastname AS child_lastname,
                    c.age AS child_age, c.sex AS child_sex, c.dob AS child_dob,
                    p.hn AS parent_hn, p.firstname AS parent_firstname, p.lastname AS parent_lastname,
                    p.age AS parent_age, p.sex AS parent_sex, p.dob AS parent_dob
             FROM parent_child pr
             JOIN child c ON c.person_id = pr.child_id AND c.active_status
             JOIN parent p ON p.person_id = pr.parent_id AND p.active_status
             ORDER BY c.hn, p.hn",
        )
        .fetch_all(&mut *conn)
        .await
    }
}

fn push_search_branch(
    builder: &mut QueryBuilder<'_, Postgres>,
    primary: PersonKind,
    filter: &SearchFilter,
) {
    let (child, parent) = ("c", "p");
    let alias = match primary {
        PersonKind::Child => child,
        PersonKind::Parent => parent,
    };
    let other = primary.counterpart();
    let other_alias = match other {
        PersonKind::Child => child,
        PersonKind::Parent => parent,
    };

    builder.push(format!(
        "SELECT pr.relation_id,
                c.hn AS child_hn, c.firstname AS child_firstname, c.lastname AS child_lastname,
                c.age AS child_age, c.sex AS child_sex, c.dob AS child_dob,
                p.hn AS parent_hn, p.firstname AS parent_firstname, p.lastname AS parent_lastname,
                p.age AS parent_age, p.sex AS parent_sex, p.dob AS parent_dob
         FROM {primary_table} {alias}
         LEFT JOIN (parent_child pr
                    JOIN {other_table} {other_alias}
                      ON {other_alias}.person_id = pr.{other_column} AND {other_alias}.active_status)
           ON pr.{primary_column} = {alias}.person_id
         WHERE {alias}.active_status",
        primary_table = primary.table(),
        other_table = other.table(),
        other_column = other.relation_column(),
        primary_column = primary.relation_column(),
    ));

    if let Some(hn) = &filter.hn {
        builder.push(format!(" AND {alias}.hn = "));
        builder.push_bind(hn.clone());
    }

    if let Some(name) = &filter.name {
        let pattern = like_pattern(name);
        builder.push(format!(" AND ({alias}.firstname ILIKE "));
        builder.push_bind(pattern.clone());
        builder.push(format!(" OR {alias}.lastname ILIKE "));
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(firstname) = &filter.firstname {
        builder.push(format!(" AND {alias}.firstname ILIKE "));
        builder.push_bind(like_pattern(firstname));
    }

    if let Some(lastname) = &filter.lastname {
        builder.push(format!(" AND {alias}.lastname ILIKE "));
        builder.push_bind(like_pattern(lastname));
    }
}

/// Substring pattern with LIKE wildcards in the input escaped
pub(crate) fn like_pattern(input: &str) -> String {
    let mut pattern = String::with_capacity(input.len() + 2);
    pattern.push('%');
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

pub struct OperatorQueries;

impl OperatorQueries {
    #[inline]
    pub async fn insert(
        conn: &mut PgConnection,
        op_number: &str,
        username: &str,
        password_hash: &str,
        role: OperatorRole,
    ) -> sqlx::Result<Operator> {
        let sql = format!(
            "INSERT INTO operator (op_id, op_number, username, password_hash, role, created_at)
             VALUES ($1, $2, $3, $4, $5, now())
             RETURNING {}",
            OPERATOR_COLUMNS
        );

        sqlx::query_as::<_, Operator>(&sql)
            .bind(Uuid::new_v4())
            .bind(op_number)
            .bind(username)
            .bind(password_hash)
            .bind(role.as_str())
            .fetch_one(&mut *conn)
            .await
    }

    /// Login lookup; requires a role allowed to read password hashes
    #[inline]
    pub async fn get_credentials_by_username(
        conn: &mut PgConnection,
        username: &str,
    ) -> sqlx::Result<Option<OperatorCredentials>> {
        let sql = format!(
            "SELECT {}, password_hash FROM operator WHERE username = $1",
            OPERATOR_COLUMNS
        );

        sqlx::query_as::<_, OperatorCredentials>(&sql)
            .bind(username)
            .fetch_optional(&mut *conn)
            .await
    }

    #[inline]
    pub async fn get_by_op_number(
        conn: &mut PgConnection,
        op_number: &str,
    ) -> sqlx::Result<Option<Operator>> {
        let sql = format!("SELECT {} FROM operator WHERE op_number = $1", OPERATOR_COLUMNS);

        sqlx::query_as::<_, Operator>(&sql)
            .bind(op_number)
            .fetch_optional(&mut *conn)
            .await
    }
}

pub struct ActivityQueries;

impl ActivityQueries {
    /// Append an entry for the operator with `op_number`; `None` when no such operator exists
    #[inline]
    pub async fn append(
        conn: &mut PgConnection,
        op_number: &str,
        activity: &str,
    ) -> sqlx::Result<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO activity_time_stamp (activity_id, op_id, activity, created_at)
             SELECT $1, op_id, $3, clock_timestamp() FROM operator WHERE op_number = $2
             RETURNING activity_id",
        )
        .bind(Uuid::new_v4())
        .bind(op_number)
        .bind(activity)
        .fetch_optional(&mut *conn)
        .await
    }

    #[inline]
    pub async fn recent(conn: &mut PgConnection, limit: i64) -> sqlx::Result<Vec<ActivityEntry>> {
        sqlx::query_as::<_, ActivityEntry>(
            "SELECT a.activity_id, o.op_number, a.activity, a.created_at
             FROM activity_time_stamp a
             JOIN operator o ON o.op_id = a.op_id
             ORDER BY a.created_at DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
    }
}
