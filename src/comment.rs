use crate::article::Article;
use crate::db::schema::{comments, users};
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::serialize_day;
use chrono::{DateTime, Utc};
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::insert_into;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use rocket::form::Form;
use rocket::serde::json::Json;
use rocket::{post, FromForm};
use std::io::Write;

/// Kinds of entities a comment may be attached to, stored by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow)]
#[sql_type = "Text"]
pub enum ContentType {
    Article,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Article => "article",
        }
    }

    pub fn parse(name: &str) -> Option<ContentType> {
        match name {
            "article" => Some(ContentType::Article),
            _ => None,
        }
    }
}

impl ToSql<Text, Pg> for ContentType {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for ContentType {
    fn from_sql(bytes: Option<&<Pg as Backend>::RawValue>) -> deserialize::Result<Self> {
        let name = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        ContentType::parse(&name).ok_or_else(|| format!("unknown content type: {}", name).into())
    }
}

/// Entities that accept comments.
pub trait Commentable {
    const CONTENT_TYPE: ContentType;

    fn object_id(&self) -> i32;

    fn comment_target(&self) -> CommentTarget {
        CommentTarget::new(Self::CONTENT_TYPE, self.object_id())
    }
}

/// What a comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTarget {
    Article(i32),
}

impl CommentTarget {
    pub fn new(content_type: ContentType, object_id: i32) -> Self {
        match content_type {
            ContentType::Article => CommentTarget::Article(object_id),
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            CommentTarget::Article(_) => ContentType::Article,
        }
    }

    pub fn object_id(&self) -> i32 {
        match *self {
            CommentTarget::Article(id) => id,
        }
    }
}

#[derive(Debug, PartialEq, Identifiable, Queryable)]
#[table_name = "comments"]
pub struct Comment {
    pub id: i32,
    pub author_id: i32,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub content_type: ContentType,
    pub object_id: i32,
}

impl Comment {
    #[cfg(test)]
    pub fn target(&self) -> CommentTarget {
        CommentTarget::new(self.content_type, self.object_id)
    }

    /// Comments attached to `object` with their authors, oldest first.
    pub fn for_object<T: Commentable>(
        object: &T,
        connection: &PgConnection,
    ) -> Result<Vec<(Comment, User)>, ApiError> {
        let target = object.comment_target();
        comments::table
            .inner_join(users::table)
            .filter(comments::content_type.eq(target.content_type()))
            .filter(comments::object_id.eq(target.object_id()))
            .order((comments::created_at.asc(), comments::id.asc()))
            .load::<(Comment, User)>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Insertable)]
#[table_name = "comments"]
pub struct NewComment {
    author_id: i32,
    body: String,
    created_at: DateTime<Utc>,
    content_type: ContentType,
    object_id: i32,
}

impl NewComment {
    pub fn new(author: &User, target: CommentTarget, body: String) -> Self {
        NewComment {
            author_id: author.id,
            body,
            created_at: Utc::now(),
            content_type: target.content_type(),
            object_id: target.object_id(),
        }
    }

    pub fn save(&self, connection: &PgConnection) -> Result<Comment, ApiError> {
        insert_into(comments::table)
            .values(self)
            .get_result::<Comment>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Serialize, Debug)]
pub struct CommentView {
    author: String,
    comment: String,
    #[serde(serialize_with = "serialize_day")]
    timestamp: DateTime<Utc>,
}

impl From<(Comment, User)> for CommentView {
    fn from(comment_and_author: (Comment, User)) -> Self {
        let (comment, author) = comment_and_author;
        CommentView {
            author: author.username,
            comment: comment.body,
            timestamp: comment.created_at,
        }
    }
}

#[derive(Debug, FromForm)]
pub struct CommentForm {
    article_id: i32,
    comment: String,
}

impl Validate for CommentForm {
    type Error = ValidationError;
    fn validate(self, _connection: &PgConnection) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.comment.trim().is_empty() {
            error.add_error("comment", "comment must not be empty");
        }
        error.into_result(self)
    }
}

impl CommentForm {
    /// Attaches the comment to its article on behalf of `author`.
    pub fn save(self, author: User, connection: &PgConnection) -> Result<CommentView, ApiError> {
        let form = self.validate(connection)?;
        let article = Article::load(form.article_id, connection)?;
        let comment = NewComment::new(&author, article.comment_target(), form.comment).save(connection)?;
        Ok((comment, author).into())
    }
}

#[post("/add_comment", data = "<form>")]
pub fn add(
    user: CurrentUser,
    connection: DbConnection,
    form: Form<CommentForm>,
) -> ApiResult<Vec<CommentView>> {
    let user = user?;
    let view = form.into_inner().save(user, &connection)?;
    Ok(Json(vec![view]))
}
