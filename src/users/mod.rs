use crate::account::NewUserAccount;
use crate::category::Category;
use crate::config::Settings;
use crate::db::DbConnection;
use crate::types::{ApiError, Validate, ValidationError};
use diesel::dsl::exists;
use diesel::insert_into;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::select;
use log::{info, warn};
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest};
use rocket::response::Redirect;
use rocket::{get, post, FromForm, Request, Responder, State};
use rocket_dyn_templates::Template;

pub mod models;
mod utils;

use self::models::{NewUser, User};
use self::utils::*;

pub type CurrentUser = Result<User, ApiError>;

pub static SESSION_COOKIE: &str = "session";

/// Outcome of a submitted HTML form: either done and redirected, or shown
/// again with its errors.
#[derive(Responder)]
pub enum FormResponse {
    Done(Redirect),
    Invalid(Template),
}

/// Missing fields arrive empty so that they are reported by validation
/// next to the form instead of failing the request.
#[derive(Debug, FromForm)]
pub struct Registration {
    #[field(default = String::new())]
    pub username: String,
    #[field(default = String::new())]
    pub password: String,
    #[field(default = String::new())]
    pub password_check: String,
    #[field(default = String::new())]
    pub first_name: String,
    #[field(default = String::new())]
    pub last_name: String,
    #[field(default = String::new())]
    pub email: String,
}

impl Registration {
    /// Checks that need no database.
    pub fn check_fields(&self) -> ValidationError {
        let mut errors = ValidationError::default();
        for check in vec![
            validate_username(&self.username),
            validate_password(&self.password, &self.password_check),
            validate_email(&self.email),
        ] {
            if let Err(e) = check {
                errors.merge(e);
            }
        }
        errors
    }

    /// Creates the identity and its account in one transaction.
    pub fn save(self, connection: &PgConnection) -> Result<User, ApiError> {
        let registration = self.validate(connection)?;
        let new_user = NewUser::new(&registration.username, &registration.password)?;

        let created = connection.transaction::<_, DieselError, _>(|| {
            use crate::db::schema::users::dsl::*;
            let user = insert_into(users)
                .values(&new_user)
                .get_result::<User>(connection)?;
            NewUserAccount {
                user_id: user.id,
                first_name: registration.first_name,
                last_name: registration.last_name,
                email: registration.email,
            }
            .insert(connection)?;
            Ok(user)
        });

        match created {
            Ok(user) => Ok(user),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(ValidationError::from("username", "user already exists").into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Validate for Registration {
    type Error = ApiError;
    fn validate(self, connection: &PgConnection) -> Result<Self, Self::Error> {
        use crate::db::schema::users::dsl::*;
        let mut errors = self.check_fields();

        if errors.messages("username").is_empty() {
            let username_exists = select(exists(users.filter(username.eq(&self.username))))
                .get_result::<bool>(connection)?;
            if username_exists {
                errors.add_error("username", "user already exists");
            }
        }

        errors.into_result(self).map_err(|e| e.into())
    }
}

/// Submitted registration values shown again next to the errors.
#[derive(Debug, Default, Serialize)]
struct RegistrationValues {
    username: String,
    first_name: String,
    last_name: String,
    email: String,
}

impl<'a> From<&'a Registration> for RegistrationValues {
    fn from(registration: &'a Registration) -> Self {
        RegistrationValues {
            username: registration.username.clone(),
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
            email: registration.email.clone(),
        }
    }
}

#[derive(Serialize)]
struct RegistrationContext<'a> {
    form: &'a RegistrationValues,
    errors: Option<&'a ValidationError>,
    categories: Vec<Category>,
}

fn registration_page(
    form: &RegistrationValues,
    errors: Option<&ValidationError>,
    connection: &PgConnection,
) -> Result<Template, ApiError> {
    let context = RegistrationContext {
        form,
        errors,
        categories: Category::all(connection)?,
    };
    Ok(Template::render("registration", &context))
}

#[get("/registration")]
pub fn registration_form(connection: DbConnection) -> Result<Template, ApiError> {
    registration_page(&RegistrationValues::default(), None, &connection)
}

#[post("/registration", data = "<registration>")]
pub fn register(
    connection: DbConnection,
    registration: Form<Registration>,
) -> Result<FormResponse, ApiError> {
    let registration = registration.into_inner();
    let values = RegistrationValues::from(&registration);
    match registration.save(&connection) {
        Ok(user) => {
            info!("registered user {}", user.username);
            Ok(FormResponse::Done(Redirect::to("/")))
        }
        Err(ApiError::Validation(errors)) => {
            let page = registration_page(&values, Some(&errors), &connection)?;
            Ok(FormResponse::Invalid(page))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, FromForm)]
pub struct Login {
    #[field(default = String::new())]
    pub username: String,
    #[field(default = String::new())]
    pub password: String,
}

impl Login {
    pub fn check_fields(&self) -> ValidationError {
        let mut errors = ValidationError::default();
        if self.username.is_empty() {
            errors.add_error("username", "This field is required");
        }
        if self.password.is_empty() {
            errors.add_error("password", "This field is required");
        }
        errors
    }

    /// The user named in the form, provided the password matches.
    pub fn authenticate(&self, connection: &PgConnection) -> Result<User, ApiError> {
        let errors = self.check_fields();
        if !errors.empty() {
            return Err(errors.into());
        }

        let user = match User::load_by_name(&self.username, connection) {
            Ok(user) => user,
            Err(ApiError::Diesel(DieselError::NotFound)) => {
                return Err(ValidationError::from(ValidationError::FORM, "user not found").into());
            }
            Err(e) => return Err(e),
        };

        if user.verify_password(&self.password)? {
            Ok(user)
        } else {
            Err(ValidationError::from(ValidationError::FORM, "wrong password").into())
        }
    }
}

#[derive(Serialize)]
struct LoginContext<'a> {
    username: &'a str,
    errors: Option<&'a ValidationError>,
    categories: Vec<Category>,
}

fn login_page(
    username: &str,
    errors: Option<&ValidationError>,
    connection: &PgConnection,
) -> Result<Template, ApiError> {
    let context = LoginContext {
        username,
        errors,
        categories: Category::all(connection)?,
    };
    Ok(Template::render("login", &context))
}

#[get("/login")]
pub fn login_form(connection: DbConnection) -> Result<Template, ApiError> {
    login_page("", None, &connection)
}

#[post("/login", data = "<form>")]
pub fn login(
    connection: DbConnection,
    settings: &State<Settings>,
    cookies: &CookieJar<'_>,
    form: Form<Login>,
) -> Result<FormResponse, ApiError> {
    match form.authenticate(&connection) {
        Ok(user) => {
            let token = user.session_token(&settings.session_secret, settings.session_ttl_hours)?;
            let cookie = Cookie::build((SESSION_COOKIE, token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            cookies.add(cookie);
            info!("user {} logged in", user.username);
            Ok(FormResponse::Done(Redirect::to("/")))
        }
        Err(ApiError::Validation(errors)) => {
            let page = login_page(&form.username, Some(&errors), &connection)?;
            Ok(FormResponse::Invalid(page))
        }
        Err(e) => Err(e),
    }
}

#[get("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Redirect {
    if cookies.get(SESSION_COOKIE).is_some() {
        info!("session closed");
    }
    cookies.remove(Cookie::from(SESSION_COOKIE));
    Redirect::to("/")
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match request.cookies().get(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        };

        let settings = match request.guard::<&State<Settings>>().await {
            Outcome::Success(settings) => settings,
            _ => return Outcome::Error((Status::InternalServerError, ApiError::Internal)),
        };
        let connection = match request.guard::<DbConnection>().await {
            Outcome::Success(connection) => connection,
            _ => return Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        };

        match User::load_from_session(&token, &settings.session_secret, &connection) {
            Ok(user) => Outcome::Success(user),
            Err(ApiError::Validation(_)) | Err(ApiError::Diesel(DieselError::NotFound)) => {
                warn!("rejected session cookie");
                Outcome::Error((Status::Unauthorized, ApiError::Unauthorized))
            }
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::UserAccount;
    use crate::db::schema::{user_accounts, users};
    use crate::test_support;

    fn registration(username: &str, password: &str, password_check: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password: password.to_string(),
            password_check: password_check.to_string(),
            first_name: "Alice".to_string(),
            last_name: "A".to_string(),
            email: "a@x.com".to_string(),
        }
    }

    fn count(connection: &PgConnection) -> (i64, i64) {
        let identities = users::table.count().get_result::<i64>(connection).unwrap();
        let accounts = user_accounts::table.count().get_result::<i64>(connection).unwrap();
        (identities, accounts)
    }

    #[test]
    fn mismatched_passwords_fail_without_database() {
        let errors = registration("alice", "pw1", "pw2").check_fields();
        assert_eq!(errors.messages("password_check").len(), 1);
        assert!(registration("alice", "pw1", "pw1").check_fields().empty());
    }

    #[test]
    fn registration_form_tolerates_missing_fields() {
        let form = Form::<Registration>::parse("username=u&password=pw&password_check=pw").unwrap();
        assert_eq!(form.first_name, "");
        assert_eq!(form.email, "");
        assert!(form.check_fields().empty());

        let form = Form::<Registration>::parse("username=u&password=pw").unwrap();
        assert_eq!(
            form.check_fields().messages("password_check"),
            &["This field is required".to_string()][..]
        );
    }

    #[test]
    fn login_form_reports_missing_fields() {
        let form = Form::<Login>::parse("username=alice").unwrap();
        let errors = form.check_fields();
        assert_eq!(errors.messages("password"), &["This field is required".to_string()][..]);
        assert!(errors.messages("username").is_empty());

        let form = Form::<Login>::parse("").unwrap();
        assert_eq!(form.check_fields().len(), 2);
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn registration_creates_identity_and_account() {
        let connection = test_support::connection();
        let user = registration("alice", "pw1", "pw1").save(&connection).unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.verify_password("pw1").unwrap());

        let account = UserAccount::load_for_user(&user, &connection).unwrap();
        assert_eq!(account.first_name, "Alice");
        assert_eq!(account.last_name, "A");
        assert_eq!(account.email, "a@x.com");
        assert_eq!(count(&connection), (1, 1));
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn duplicate_username_is_rejected() {
        let connection = test_support::connection();
        registration("alice", "pw1", "pw1").save(&connection).unwrap();

        match registration("alice", "pw2", "pw2").save(&connection) {
            Err(ApiError::Validation(e)) => {
                assert_eq!(e.messages("username"), &["user already exists".to_string()][..])
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(count(&connection), (1, 1));
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn mismatched_passwords_persist_nothing() {
        let connection = test_support::connection();
        match registration("bob", "pw1", "pw2").save(&connection) {
            Err(ApiError::Validation(e)) => assert_eq!(e.messages("password_check").len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(count(&connection), (0, 0));
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn login_checks_username_then_password() {
        let connection = test_support::connection();
        registration("alice", "pw1", "pw1").save(&connection).unwrap();

        let login = |username: &str, password: &str| {
            Login {
                username: username.to_string(),
                password: password.to_string(),
            }
            .authenticate(&connection)
        };

        assert_eq!(login("alice", "pw1").unwrap().username, "alice");
        match login("alice", "nope") {
            Err(ApiError::Validation(e)) => {
                assert_eq!(e.messages(ValidationError::FORM), &["wrong password".to_string()][..])
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        match login("mallory", "pw1") {
            Err(ApiError::Validation(e)) => {
                assert_eq!(e.messages(ValidationError::FORM), &["user not found".to_string()][..])
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn session_loads_registered_user() {
        let connection = test_support::connection();
        let user = registration("alice", "pw1", "pw1").save(&connection).unwrap();
        let token = user.session_token("secret", 1).unwrap();
        assert_eq!(User::load_from_session(&token, "secret", &connection).unwrap(), user);
    }
}
