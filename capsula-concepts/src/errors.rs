use core::fmt::Display;
use std::error::Error;

macro_rules! define_errors {
    ($(($err_name: ident, $err_descr: expr)),+) => {
        $(
            #[doc = $err_descr]
            #[derive(Debug,Clone)]
            pub struct $err_name(
                #[doc = "Error message associated with "]
                #[doc = stringify!($err_name)]
                #[doc = " error type."]
                pub String,
            );

            impl Display for $err_name {
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl Error for $err_name {}
        )+
    }
}

define_errors!(
    (
        SetupError,
        "Occurs during setup of a new simulation when the configuration is invalid"
    ),
    (CalcError, "General Calculation Error"),
    (DivisionError, "Errors related to a capsule dividing process"),
    (BoundaryError, "Can occur during boundary calculation"),
    (
        IntegratorError,
        "Unrecoverable numerical failure of an integrator while advancing the state"
    ),
    (
        StorageError,
        "Occurs when exporting capsule records or reading configuration files"
    ),
    (
        TimeError,
        "Error related to advancing the simulation time or displaying its progress"
    )
);

impl From<String> for TimeError {
    fn from(value: String) -> Self {
        TimeError(value)
    }
}

impl From<BoundaryError> for SetupError {
    fn from(value: BoundaryError) -> Self {
        SetupError(format!("{}", value))
    }
}

impl From<CalcError> for IntegratorError {
    fn from(value: CalcError) -> Self {
        IntegratorError(format!("{}", value))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError(format!("{}", value))
    }
}

impl From<StorageError> for SetupError {
    fn from(value: StorageError) -> Self {
        SetupError(format!("{}", value))
    }
}

/// For internal use: formats an error message to include the location where it was raised.
#[macro_export]
macro_rules! format_error_message(
    (@function) => {
        {
            fn f() {}
            let name = std::any::type_name_of_val(&f);
            name.strip_suffix("::f").unwrap_or(name)
        }
    };
    ($bug_title:expr, $error_msg:expr) => {
        {
            format!("Internal Error in function {} ({}:{}:{}): {} +++ {}",
                $crate::format_error_message!(@function),
                file!(),
                line!(),
                column!(),
                $bug_title,
                $error_msg,
            )
        }
    };
);
