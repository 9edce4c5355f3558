use crate::errors::ServiceError;

/// Dual-operator gate for special (controlled) drugs.
///
/// When the drug is special a second actor must countersign, and the second
/// actor must be a different person from the primary. Applied before inbound
/// acceptance, stock adjustment, and outbound approval.
pub fn require_second_actor(
    is_special_drug: bool,
    primary_actor_id: i64,
    second_actor_id: Option<i64>,
) -> Result<(), ServiceError> {
    if !is_special_drug {
        return Ok(());
    }

    match second_actor_id {
        None => Err(ServiceError::ValidationError(
            "special drug operations require a second operator".to_string(),
        )),
        Some(second) if second == primary_actor_id => Err(ServiceError::ValidationError(
            "the second operator must be a different person".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

/// Rejects two roles held by the same person, e.g. applicant and approver.
pub fn require_distinct_actors(
    first_actor_id: i64,
    second_actor_id: i64,
    roles: &str,
) -> Result<(), ServiceError> {
    if first_actor_id == second_actor_id {
        return Err(ServiceError::ValidationError(format!(
            "{} must be different people",
            roles
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn ordinary_drugs_need_no_countersign() {
        assert!(require_second_actor(false, 1, None).is_ok());
        assert!(require_second_actor(false, 1, Some(1)).is_ok());
    }

    #[test]
    fn special_drugs_require_a_second_operator() {
        assert_matches!(
            require_second_actor(true, 1, None),
            Err(ServiceError::ValidationError(_))
        );
        assert!(require_second_actor(true, 1, Some(2)).is_ok());
    }

    #[test]
    fn the_same_person_cannot_countersign() {
        assert_matches!(
            require_second_actor(true, 7, Some(7)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn distinct_roles_are_enforced() {
        assert!(require_distinct_actors(1, 2, "applicant and approver").is_ok());
        assert_matches!(
            require_distinct_actors(3, 3, "applicant and approver"),
            Err(ServiceError::ValidationError(msg)) if msg.contains("applicant and approver")
        );
    }
}
