//! Errors which can occur while setting up or running a simulation.
use capsula_concepts::*;
use core::fmt::Display;

macro_rules! impl_error_variant {
    ($name: ident, $($err_var: ident),+) => {
        impl $name {
            /// Message of the contained leaf error if this is not an integrator failure
            fn leaf_message(&self) -> Option<String> {
                match self {
                    $(
                        $name::$err_var(message) => Some(format!("{}", message)),
                    )+
                    _ => None,
                }
            }
        }
    }
}

macro_rules! impl_from_error {
    ($name: ident, $(($err_var: ident, $err_type: ty)),+) => {
        $(
            // Implement conversion from error to errorvariant
            impl From<$err_type> for $name {
                fn from(err: $err_type) -> Self {
                    $name::$err_var(err)
                }
            }
        )+
    }
}

/// Covers all errors that can occur in this Simulation
///
/// The errors are listed from very likely to be a user error to almost certainly a numerical
/// breakdown of the relaxation.
#[derive(Debug)]
pub enum SimulationError {
    // Very likely to be user errors
    /// Invalid configuration, see [SetupError]
    SetupError(SetupError),
    /// See [TimeError]
    TimeError(TimeError),

    // Less likely but possible to be user errors
    /// Exporting results failed, see [StorageError]
    StorageError(StorageError),
    /// See [IoError](std::io::Error)
    IoError(std::io::Error),

    // Numerical failures
    /// See [DivisionError]
    DivisionError(DivisionError),
    /// The integrator used for relaxation failed. This is fatal for the whole run.
    Integrator {
        /// Tick during which the failure occurred
        tick: u64,
        /// Number of capsules in the population at this tick
        n_capsules: usize,
        /// Reason which was reported by the integrator
        error: IntegratorError,
    },
}

impl_from_error! {SimulationError,
    (SetupError, SetupError),
    (TimeError, TimeError),
    (StorageError, StorageError),
    (IoError, std::io::Error),
    (DivisionError, DivisionError)
}

impl_error_variant! {SimulationError,
    SetupError,
    TimeError,
    StorageError,
    IoError,
    DivisionError
}

impl Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::Integrator {
                tick,
                n_capsules,
                error,
            } => write!(
                f,
                "Integrator failed at tick {tick} with {n_capsules} capsules: {error}"
            ),
            other => write!(f, "{}", other.leaf_message().unwrap_or_default()),
        }
    }
}

// Implement the general error property
impl std::error::Error for SimulationError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integrator_failure_names_context() {
        let err = SimulationError::Integrator {
            tick: 17,
            n_capsules: 230,
            error: IntegratorError("state became non-finite".to_owned()),
        };
        let message = format!("{err}");
        assert!(message.contains("17"));
        assert!(message.contains("230"));
        assert!(message.contains("state became non-finite"));
    }

    #[test]
    fn leaf_errors_convert() {
        let err: SimulationError = SetupError("domain too small".to_owned()).into();
        assert!(matches!(err, SimulationError::SetupError(_)));
        assert_eq!(format!("{err}"), "domain too small");
        let err: SimulationError = StorageError("disk full".to_owned()).into();
        assert!(matches!(err, SimulationError::StorageError(_)));
        let err: SimulationError = TimeError("t_max before t0".to_owned()).into();
        assert!(matches!(err, SimulationError::TimeError(_)));
        let io = std::io::Error::other("closed");
        let err: SimulationError = io.into();
        assert!(matches!(err, SimulationError::IoError(_)));
        assert_eq!(format!("{err}"), "closed");
    }
}
