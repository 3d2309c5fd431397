use crate::utils::try_respond;
use diesel::result::Error as DieselError;
use diesel::PgConnection;
use log::error;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::request::Request;
use serde_json::json;
use std::collections::HashMap;
use std::io::Error as IoError;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &PgConnection) -> Result<Self, Self::Error>;
}

#[derive(Debug)]
pub enum ApiError {
    Diesel(DieselError),
    Validation(ValidationError),
    Internal,
    Unauthorized,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        ApiError::Diesel(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

impl From<IoError> for ApiError {
    fn from(err: IoError) -> ApiError {
        error!("io error: {}", err);
        ApiError::Internal
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Field name to messages. Form errors that concern the form as a whole
/// are stored under [`ValidationError::FORM`].
#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub const FORM: &'static str = "__all__";

    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn messages(&self, key: &str) -> &[String] {
        self.0.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn into_result<T>(self, ok: T) -> Result<T, ValidationError> {
        if self.empty() {
            Ok(ok)
        } else {
            Err(self)
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            ApiError::Diesel(error) => match error {
                DieselError::NotFound => Err(Status::NotFound),
                other => {
                    error!("database error: {}", other);
                    Err(Status::InternalServerError)
                }
            },

            ApiError::Validation(error) => {
                let body = json!({ "errors": error });
                try_respond(req, body, Status::UnprocessableEntity)
            }

            ApiError::Unauthorized => {
                let body = json!({ "errors": {
                    "status": "401 Unauthorized"
                }});
                try_respond(req, body, Status::Unauthorized)
            }
            ApiError::Internal => Err(Status::InternalServerError),
        }
    }
}
