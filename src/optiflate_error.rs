/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::{fmt::Display, io::ErrorKind};

#[derive(Debug, Clone)]
pub struct OptiflateError {
    /// standard error code
    exit_code: ExitCode,

    /// diagnostic message including location. Content should not be relied on.
    message: String,
}

pub type Result<T> = std::result::Result<T, OptiflateError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    InvalidConfig = 1,
    InvalidRange = 2,
    InvalidHuffmanLengths = 3,
    InvalidBlock = 4,
    ShortRead = 16,
    OsError = 17,
    GeneralFailure = 18,
}

/// constructs an error result with the given exit code and message
#[cold]
#[track_caller]
pub fn err_exit_code<T>(exit_code: ExitCode, message: impl AsRef<str>) -> Result<T> {
    Err(OptiflateError::new(exit_code, message.as_ref()))
}

impl From<std::io::Error> for OptiflateError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        match e.downcast::<OptiflateError>() {
            Ok(le) => le,
            Err(e) => {
                let caller = std::panic::Location::caller();
                OptiflateError {
                    exit_code: get_io_error_exit_code(&e),
                    message: format!("error {} at {}", e, caller),
                }
            }
        }
    }
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Display for OptiflateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}: {1}", self.exit_code, self.message)
    }
}

impl From<anyhow::Error> for OptiflateError {
    fn from(mut error: anyhow::Error) -> Self {
        // first see if there is an OptiflateError already inside
        match error.downcast::<OptiflateError>() {
            Ok(le) => {
                return le;
            }
            Err(old_error) => {
                error = old_error;
            }
        }

        // capture the original error string before we lose it due
        // to downcasting to look for stashed OptiflateErrors
        let original_string = error.to_string();

        // see if there is an OptiflateError hiding inside an io error
        // which happens if we cross an API boundary that returns an std::io:Error
        // like Read or Write
        if let Ok(ioe) = error.downcast::<std::io::Error>() {
            match ioe.downcast::<OptiflateError>() {
                Ok(le) => {
                    return le;
                }
                Err(e) => {
                    return OptiflateError {
                        exit_code: get_io_error_exit_code(&e),
                        message: format!("{} {}", e, original_string),
                    };
                }
            }
        }

        // don't know what we got, so treat it as a general failure
        OptiflateError {
            exit_code: ExitCode::GeneralFailure,
            message: original_string,
        }
    }
}

fn get_io_error_exit_code(e: &std::io::Error) -> ExitCode {
    if e.kind() == ErrorKind::UnexpectedEof {
        ExitCode::ShortRead
    } else {
        ExitCode::OsError
    }
}

impl OptiflateError {
    pub fn new(exit_code: ExitCode, message: &str) -> OptiflateError {
        OptiflateError {
            exit_code,
            message: message.to_owned(),
        }
    }

    pub fn wrap(exit_code: ExitCode, e: &impl Display) -> OptiflateError {
        OptiflateError {
            exit_code,
            message: e.to_string(),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// translates OptiflateError into std::io::Error, which involves putting into a Box and using Other
impl From<OptiflateError> for std::io::Error {
    fn from(e: OptiflateError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, e)
    }
}

impl std::error::Error for OptiflateError {}

#[test]
fn test_error_translation() {
    // test wrapping inside an io error
    fn my_std_error() -> std::result::Result<(), std::io::Error> {
        Err(OptiflateError::new(ExitCode::InvalidRange, "test error").into())
    }

    let e: OptiflateError = my_std_error().unwrap_err().into();
    assert_eq!(e.exit_code, ExitCode::InvalidRange);
    assert_eq!(e.message, "test error");

    // wrapping inside anyhow
    fn my_anyhow() -> std::result::Result<(), anyhow::Error> {
        Err(OptiflateError::new(ExitCode::InvalidRange, "test error").into())
    }

    let e: OptiflateError = my_anyhow().unwrap_err().into();
    assert_eq!(e.exit_code, ExitCode::InvalidRange);
    assert_eq!(e.message, "test error");

    // an IO error should be translated into an OsError
    let e: OptiflateError =
        std::io::Error::new(std::io::ErrorKind::NotFound, "file not found").into();
    assert_eq!(e.exit_code, ExitCode::OsError);
}
