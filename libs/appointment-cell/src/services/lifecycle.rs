use crate::models::{AppointmentError, AppointmentStatus};

/// States an appointment may move to from `from`. PENDING is confirmed or
/// cancelled; CONFIRMED is completed or cancelled. PENDING never jumps
/// straight to COMPLETED.
pub fn valid_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
    match from {
        AppointmentStatus::Pending => {
            &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
        }
        AppointmentStatus::Confirmed => {
            &[AppointmentStatus::Completed, AppointmentStatus::Cancelled]
        }
        AppointmentStatus::Cancelled | AppointmentStatus::Completed => &[],
    }
}

pub fn validate_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if valid_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(AppointmentError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pending_can_be_confirmed_or_cancelled() {
        assert!(validate_transition(AppointmentStatus::Pending, AppointmentStatus::Confirmed).is_ok());
        assert!(validate_transition(AppointmentStatus::Pending, AppointmentStatus::Cancelled).is_ok());
    }

    #[test]
    fn confirmed_can_be_completed_or_cancelled() {
        assert!(
            validate_transition(AppointmentStatus::Confirmed, AppointmentStatus::Completed).is_ok()
        );
        assert!(
            validate_transition(AppointmentStatus::Confirmed, AppointmentStatus::Cancelled).is_ok()
        );
    }

    #[test]
    fn pending_cannot_skip_to_completed() {
        assert_matches!(
            validate_transition(AppointmentStatus::Pending, AppointmentStatus::Completed),
            Err(AppointmentError::InvalidTransition { .. })
        );
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for terminal in [AppointmentStatus::Cancelled, AppointmentStatus::Completed] {
            for target in [
                AppointmentStatus::Pending,
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
            ] {
                assert_matches!(
                    validate_transition(terminal, target),
                    Err(AppointmentError::InvalidTransition { .. })
                );
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        assert_matches!(
            validate_transition(AppointmentStatus::Pending, AppointmentStatus::Pending),
            Err(AppointmentError::InvalidTransition { .. })
        );
    }
}
