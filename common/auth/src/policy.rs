use thiserror::Error;

use crate::roles::Role;

/// Protected operations, one variant per route. The role requirements live
/// in [`allowed_roles`] as plain data so they can be unit-tested
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAppointment,
    ReadAppointment,
    ListAppointments,
    ListAppointmentsByPatient,
    ListAppointmentsByDoctor,
    UpdateAppointment,
    DeleteAppointment,
    CreateDoctor,
    ReadDoctor,
    ListDoctors,
    SearchDoctors,
    UpdateDoctor,
    DeleteDoctor,
    CreatePatient,
    ReadPatient,
    ListPatients,
    SearchPatients,
    UpdatePatient,
    DeletePatient,
}

impl Operation {
    pub const ALL: [Operation; 19] = [
        Operation::CreateAppointment,
        Operation::ReadAppointment,
        Operation::ListAppointments,
        Operation::ListAppointmentsByPatient,
        Operation::ListAppointmentsByDoctor,
        Operation::UpdateAppointment,
        Operation::DeleteAppointment,
        Operation::CreateDoctor,
        Operation::ReadDoctor,
        Operation::ListDoctors,
        Operation::SearchDoctors,
        Operation::UpdateDoctor,
        Operation::DeleteDoctor,
        Operation::CreatePatient,
        Operation::ReadPatient,
        Operation::ListPatients,
        Operation::SearchPatients,
        Operation::UpdatePatient,
        Operation::DeletePatient,
    ];
}

/// Which roles may invoke each operation.
pub fn allowed_roles(op: Operation) -> &'static [Role] {
    use Operation::*;
    use Role::*;
    match op {
        CreateAppointment => &[Admin, Patient],
        ReadAppointment => &[Admin, Doctor, Patient],
        ListAppointments => &[Admin],
        ListAppointmentsByPatient => &[Admin, Doctor, Patient],
        ListAppointmentsByDoctor => &[Admin, Doctor, Patient],
        // Update stays broad for all three roles; ownership-scoped updates
        // are a product decision that has not landed.
        UpdateAppointment => &[Admin, Doctor, Patient],
        DeleteAppointment => &[Admin],
        CreateDoctor | UpdateDoctor | DeleteDoctor => &[Admin],
        ReadDoctor | ListDoctors | SearchDoctors => &[Admin, Doctor, Patient],
        CreatePatient | UpdatePatient | DeletePatient => &[Admin],
        ReadPatient => &[Admin, Doctor, Patient],
        ListPatients | SearchPatients => &[Admin, Doctor],
    }
}

#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("insufficient role")]
    Forbidden { required: &'static [Role] },
}

/// Evaluates the policy for a caller's resolved role. `None` means the
/// request never established an identity.
pub fn check(role: Option<Role>, op: Operation) -> Result<(), PolicyError> {
    let role = role.ok_or(PolicyError::Unauthenticated)?;
    let allowed = allowed_roles(op);
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(PolicyError::Forbidden { required: allowed })
    }
}
