use chrono::Utc;

use crate::database::{NewOperator, NewPerson, PersonUpdate};
use crate::matcher::validate_embedding;
use crate::{RegistryError, Result};

pub const MAX_VECTORS_PER_CAPTURE: usize = 3;
const MAX_AGE: i32 = 150;
const MAX_TEXT_LEN: usize = 255;

/// Trimmed, non-empty identifier
#[inline]
pub fn hn(value: &str) -> Result<String> {
    required("hn", value)
}

#[inline]
pub fn new_person(person: NewPerson) -> Result<NewPerson> {
    Ok(NewPerson {
        hn: required("hn", &person.hn)?,
        firstname: required("firstname", &person.firstname)?,
        lastname: required("lastname", &person.lastname)?,
        age: age(person.age)?,
        sex: optional("sex", person.sex)?,
        dob: dob(person.dob)?,
    })
}

#[inline]
pub fn person_update(update: PersonUpdate) -> Result<PersonUpdate> {
    let update = PersonUpdate {
        firstname: update
            .firstname
            .map(|v| required("firstname", &v))
            .transpose()?,
        lastname: update
            .lastname
            .map(|v| required("lastname", &v))
            .transpose()?,
        age: age(update.age)?,
        sex: optional("sex", update.sex)?,
        dob: dob(update.dob)?,
    };

    if update.is_empty() {
        return Err(RegistryError::Validation("No fields to update".into()));
    }
    Ok(update)
}

#[inline]
pub fn new_operator(operator: NewOperator) -> Result<NewOperator> {
    if operator.password.is_empty() {
        return Err(RegistryError::Validation("password is required".into()));
    }

    Ok(NewOperator {
        op_number: required("op_number", &operator.op_number)?,
        username: required("username", &operator.username)?,
        password: operator.password,
        role: operator.role,
    })
}

/// One capture set holds between one and three embeddings of the same dimension
#[inline]
pub fn vector_set(vectors: &[Vec<f32>], dimension: usize) -> Result<()> {
    if vectors.is_empty() || vectors.len() > MAX_VECTORS_PER_CAPTURE {
        return Err(RegistryError::Validation(format!(
            "Expected 1 to {} vectors, got {}",
            MAX_VECTORS_PER_CAPTURE,
            vectors.len()
        )));
    }

    for (index, vector) in vectors.iter().enumerate() {
        validate_embedding(vector, dimension).map_err(|e| match e {
            RegistryError::Validation(message) => {
                RegistryError::Validation(format!("Vector {}: {}", index + 1, message))
            }
            other => other,
        })?;
    }
    Ok(())
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RegistryError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(RegistryError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(value.to_string())
}

fn optional(field: &str, value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => required(field, &v).map(Some),
        None => Ok(None),
    }
}

fn age(value: Option<i32>) -> Result<Option<i32>> {
    match value {
        Some(age) if !(0..=MAX_AGE).contains(&age) => Err(RegistryError::Validation(format!(
            "age must be between 0 and {}",
            MAX_AGE
        ))),
        other => Ok(other),
    }
}

fn dob(value: Option<chrono::NaiveDate>) -> Result<Option<chrono::NaiveDate>> {
    match value {
        Some(date) if date > Utc::now().date_naive() => Err(RegistryError::Validation(
            "dob must not be in the future".into(),
        )),
        other => Ok(other),
    }
}
