//! Exhaustive check of the role table: every operation crossed with every
//! role plus the anonymous caller. The expected sets are written out here
//! by hand so a typo in the policy table cannot hide behind itself.

use common_auth::roles::ALL_ROLES;
use common_auth::{allowed_roles, check, Operation, PolicyError, Role};

fn expected(op: Operation) -> &'static [Role] {
    use Operation::*;
    use Role::*;
    match op {
        CreateAppointment => &[Admin, Patient],
        ReadAppointment => &[Admin, Doctor, Patient],
        ListAppointments => &[Admin],
        ListAppointmentsByPatient => &[Admin, Doctor, Patient],
        ListAppointmentsByDoctor => &[Admin, Doctor, Patient],
        UpdateAppointment => &[Admin, Doctor, Patient],
        DeleteAppointment => &[Admin],
        CreateDoctor => &[Admin],
        ReadDoctor => &[Admin, Doctor, Patient],
        ListDoctors => &[Admin, Doctor, Patient],
        SearchDoctors => &[Admin, Doctor, Patient],
        UpdateDoctor => &[Admin],
        DeleteDoctor => &[Admin],
        CreatePatient => &[Admin],
        ReadPatient => &[Admin, Doctor, Patient],
        ListPatients => &[Admin, Doctor],
        SearchPatients => &[Admin, Doctor],
        UpdatePatient => &[Admin],
        DeletePatient => &[Admin],
    }
}

#[test]
fn every_operation_matches_the_agreed_table() {
    for op in Operation::ALL {
        assert_eq!(allowed_roles(op), expected(op), "table mismatch for {op:?}");
    }
}

#[test]
fn check_agrees_with_the_table_for_every_role() {
    for op in Operation::ALL {
        for role in ALL_ROLES {
            let verdict = check(Some(role), op);
            if expected(op).contains(&role) {
                assert!(verdict.is_ok(), "{role:?} wrongly denied {op:?}");
            } else {
                assert!(
                    matches!(verdict, Err(PolicyError::Forbidden { .. })),
                    "{role:?} wrongly allowed {op:?}"
                );
            }
        }
    }
}

#[test]
fn anonymous_caller_is_never_authorized() {
    for op in Operation::ALL {
        assert!(
            matches!(check(None, op), Err(PolicyError::Unauthenticated)),
            "anonymous slipped through {op:?}"
        );
    }
}

#[test]
fn forbidden_verdict_names_the_roles_that_would_succeed() {
    let err = check(Some(Role::Patient), Operation::DeleteAppointment).unwrap_err();
    match err {
        PolicyError::Forbidden { required } => assert_eq!(required, &[Role::Admin]),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}
