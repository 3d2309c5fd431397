use crate::article::{Article, ArticleView};
use crate::category::Category;
use crate::db::schema::{articles, categories, favorites, user_accounts};
use crate::db::DbConnection;
use crate::storage::MediaStorage;
use crate::types::{ApiError, ApiResult};
use crate::users::models::User;
use crate::users::CurrentUser;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete, insert_into, select};
use rocket::serde::json::Json;
use rocket::{get, State};
use rocket_dyn_templates::Template;

/// Profile data kept next to the login identity, one per user.
#[derive(Debug, Clone, Identifiable, Queryable, Associations, Serialize, PartialEq)]
#[belongs_to(User)]
#[table_name = "user_accounts"]
pub struct UserAccount {
    #[serde(skip_serializing)]
    pub id: i32,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Insertable, Debug)]
#[table_name = "user_accounts"]
pub struct NewUserAccount {
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewUserAccount {
    pub fn insert(&self, connection: &PgConnection) -> QueryResult<UserAccount> {
        insert_into(user_accounts::table)
            .values(self)
            .get_result::<UserAccount>(connection)
    }
}

impl UserAccount {
    pub fn load_for_user(user: &User, connection: &PgConnection) -> Result<UserAccount, ApiError> {
        UserAccount::belonging_to(user)
            .get_result::<UserAccount>(connection)
            .map_err(|e| e.into())
    }

    pub fn find_for_user(user: &User, connection: &PgConnection) -> Result<Option<UserAccount>, ApiError> {
        UserAccount::belonging_to(user)
            .get_result::<UserAccount>(connection)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn add_favorite(&self, article: &Article, connection: &PgConnection) -> Result<(), ApiError> {
        use crate::db::schema::favorites::dsl::*;
        insert_into(favorites)
            .values((user_account_id.eq(self.id), article_id.eq(article.id)))
            .on_conflict((user_account_id, article_id))
            .do_nothing()
            .execute(connection)?;
        Ok(())
    }

    pub fn remove_favorite(&self, article: &Article, connection: &PgConnection) -> Result<(), ApiError> {
        use crate::db::schema::favorites::dsl::*;
        delete(
            favorites
                .filter(user_account_id.eq(self.id))
                .filter(article_id.eq(article.id)),
        ).execute(connection)?;
        Ok(())
    }

    pub fn has_favorite(&self, article: &Article, connection: &PgConnection) -> Result<bool, ApiError> {
        use crate::db::schema::favorites::dsl::*;
        select(exists(
            favorites
                .filter(user_account_id.eq(self.id))
                .filter(article_id.eq(article.id)),
        )).get_result::<bool>(connection)
            .map_err(|e| e.into())
    }

    pub fn favorite_articles(&self, connection: &PgConnection) -> Result<Vec<(Article, Category)>, ApiError> {
        articles::table
            .inner_join(favorites::table)
            .inner_join(categories::table)
            .filter(favorites::user_account_id.eq(self.id))
            .order(articles::id.asc())
            .select((articles::all_columns, categories::all_columns))
            .load::<(Article, Category)>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Debug, Serialize)]
pub struct Ack {
    ok: &'static str,
}

impl Ack {
    fn ok() -> Json<Ack> {
        Json(Ack { ok: "ok" })
    }
}

fn caller_account(user: CurrentUser, connection: &PgConnection) -> Result<UserAccount, ApiError> {
    UserAccount::load_for_user(&user?, connection)
}

#[get("/add_to_favorites?<article_slug>")]
pub fn add_to_favorites(
    article_slug: &str,
    user: CurrentUser,
    connection: DbConnection,
) -> ApiResult<Ack> {
    let account = caller_account(user, &connection)?;
    let article = Article::load_by_slug(article_slug, &connection)?;
    account.add_favorite(&article, &connection)?;
    Ok(Ack::ok())
}

#[get("/remove_from_favorites?<article_slug>")]
pub fn remove_from_favorites(
    article_slug: &str,
    user: CurrentUser,
    connection: DbConnection,
) -> ApiResult<Ack> {
    let account = caller_account(user, &connection)?;
    let article = Article::load_by_slug(article_slug, &connection)?;
    account.remove_favorite(&article, &connection)?;
    Ok(Ack::ok())
}

#[derive(Serialize)]
struct AccountContext<'a> {
    username: &'a str,
    current_user: &'a UserAccount,
    favorite_articles: Vec<ArticleView<'a>>,
    categories: Vec<Category>,
}

/// The account of `username`, provided `user` is its owner.
fn owned_account(username: &str, user: &User, connection: &PgConnection) -> Result<UserAccount, ApiError> {
    if user.username != username {
        // Existing accounts of other users are hidden behind 401, unknown names are 404.
        User::load_by_name(username, connection)?;
        return Err(ApiError::Unauthorized);
    }
    UserAccount::load_for_user(user, connection)
}

#[get("/user_account/<username>")]
pub fn account_page(
    username: &str,
    user: CurrentUser,
    connection: DbConnection,
    storage: &State<MediaStorage>,
) -> Result<Template, ApiError> {
    let user = user?;
    let account = owned_account(username, &user, &connection)?;
    let favorites = account.favorite_articles(&connection)?;
    let context = AccountContext {
        username: &user.username,
        current_user: &account,
        favorite_articles: ArticleView::list(&favorites, storage),
        categories: Category::all(&connection)?,
    };
    Ok(Template::render("user_account", &context))
}
