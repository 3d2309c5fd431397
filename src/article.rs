use crate::account::UserAccount;
use crate::category::Category;
use crate::comment::{Comment, CommentView, Commentable, ContentType};
use crate::db::schema::{articles, categories};
use crate::db::DbConnection;
use crate::storage::MediaStorage;
use crate::types::{ApiError, ApiResult};
use crate::users::models::User;
use crate::utils::contains_pattern;
use chrono::NaiveDate;
use diesel::prelude::*;
use rocket::serde::json::Json;
use rocket::{get, State};
use rocket_dyn_templates::Template;

no_arg_sql_function!(RANDOM, (), "Represents the sql RANDOM() function");

#[derive(Identifiable, Queryable, Associations, PartialEq, Debug, Serialize)]
#[belongs_to(Category)]
#[table_name = "articles"]
pub struct Article {
    pub id: i32,
    pub category_id: i32,
    pub title: String,
    pub slug: String,
    pub image: String,
    pub content: String,
    pub likes: i32,
    pub dislikes: i32,
    pub date: NaiveDate,
}

impl Commentable for Article {
    const CONTENT_TYPE: ContentType = ContentType::Article;

    fn object_id(&self) -> i32 {
        self.id
    }
}

impl Article {
    pub fn load(article_id: i32, connection: &PgConnection) -> Result<Article, ApiError> {
        articles::table
            .find(article_id)
            .get_result::<Article>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_slug(slug_: &str, connection: &PgConnection) -> Result<Article, ApiError> {
        use crate::db::schema::articles::dsl::*;
        articles
            .filter(slug.eq(slug_))
            .get_result::<Article>(connection)
            .map_err(|e| e.into())
    }

    /// Loads the article only when it is filed under the category with `category_slug`.
    pub fn load_in_category(
        category_slug: &str,
        article_slug: &str,
        connection: &PgConnection,
    ) -> Result<(Article, Category), ApiError> {
        articles::table
            .inner_join(categories::table)
            .filter(categories::slug.eq(category_slug))
            .filter(articles::slug.eq(article_slug))
            .get_result::<(Article, Category)>(connection)
            .map_err(|e| e.into())
    }

    pub fn in_category(category: &Category, connection: &PgConnection) -> Result<Vec<Article>, ApiError> {
        Article::belonging_to(category)
            .order(articles::id.asc())
            .load::<Article>(connection)
            .map_err(|e| e.into())
    }

    pub fn recent(limit: i64, connection: &PgConnection) -> Result<Vec<(Article, Category)>, ApiError> {
        articles::table
            .inner_join(categories::table)
            .order(articles::id.desc())
            .limit(limit)
            .load::<(Article, Category)>(connection)
            .map_err(|e| e.into())
    }

    pub fn random_sample(
        limit: i64,
        connection: &PgConnection,
    ) -> Result<Vec<(Article, Category)>, ApiError> {
        articles::table
            .inner_join(categories::table)
            .order(RANDOM)
            .limit(limit)
            .load::<(Article, Category)>(connection)
            .map_err(|e| e.into())
    }

    pub fn latest_by_date(connection: &PgConnection) -> Result<Option<(Article, Category)>, ApiError> {
        articles::table
            .inner_join(categories::table)
            .order((articles::date.desc(), articles::id.desc()))
            .first::<(Article, Category)>(connection)
            .optional()
            .map_err(|e| e.into())
    }

    /// Articles whose title or content contains `query`, ignoring case.
    pub fn search(query: &str, connection: &PgConnection) -> Result<Vec<(Article, Category)>, ApiError> {
        let pattern = contains_pattern(query);
        articles::table
            .inner_join(categories::table)
            .filter(
                articles::title
                    .ilike(&pattern)
                    .or(articles::content.ilike(&pattern)),
            )
            .order(articles::id.asc())
            .load::<(Article, Category)>(connection)
            .map_err(|e| e.into())
    }

    pub fn absolute_url(&self, category: &Category) -> String {
        format!("/{}/{}", category.slug, self.slug)
    }
}

#[cfg(test)]
#[derive(Insertable, Debug)]
#[table_name = "articles"]
pub struct NewArticle {
    pub category_id: i32,
    pub title: String,
    pub slug: String,
    pub image: String,
    pub content: String,
}

#[cfg(test)]
impl NewArticle {
    pub fn new(category: &Category, title: &str, content: &str) -> Self {
        let slug = slug::slugify(title);
        NewArticle {
            category_id: category.id,
            title: title.to_string(),
            image: MediaStorage::upload_name(&slug),
            slug,
            content: content.to_string(),
        }
    }

    pub fn save(&self, connection: &PgConnection) -> Result<Article, ApiError> {
        diesel::insert_into(articles::table)
            .values(self)
            .get_result::<Article>(connection)
            .map_err(|e| e.into())
    }
}

/// An article as handed to templates, with its links resolved.
#[derive(Debug, Serialize)]
pub struct ArticleView<'a> {
    #[serde(flatten)]
    article: &'a Article,
    category: &'a str,
    url: String,
    image_url: String,
}

impl<'a> ArticleView<'a> {
    pub fn new(article: &'a Article, category: &'a Category, storage: &MediaStorage) -> Self {
        ArticleView {
            article,
            category: &category.name,
            url: article.absolute_url(category),
            image_url: storage.url(&article.image),
        }
    }

    pub fn list(rows: &'a [(Article, Category)], storage: &MediaStorage) -> Vec<ArticleView<'a>> {
        rows.iter()
            .map(|(article, category)| ArticleView::new(article, category, storage))
            .collect()
    }
}

#[derive(Serialize)]
struct ArticleDetailContext<'a> {
    article: ArticleView<'a>,
    article_comments: Vec<CommentView>,
    categories: Vec<Category>,
    current_user: Option<UserAccount>,
    is_favorite: bool,
}

#[get("/<category_slug>/<article_slug>")]
pub fn detail(
    category_slug: &str,
    article_slug: &str,
    connection: DbConnection,
    current_user: Option<User>,
    storage: &State<MediaStorage>,
) -> Result<Template, ApiError> {
    let (article, category) = Article::load_in_category(category_slug, article_slug, &connection)?;
    let comments = Comment::for_object(&article, &connection)?;

    let account = match current_user {
        Some(user) => UserAccount::find_for_user(&user, &connection)?,
        None => None,
    };
    let is_favorite = match &account {
        Some(account) => account.has_favorite(&article, &connection)?,
        None => false,
    };

    let context = ArticleDetailContext {
        article: ArticleView::new(&article, &category, storage),
        article_comments: comments.into_iter().map(CommentView::from).collect(),
        categories: Category::all(&connection)?,
        current_user: account,
        is_favorite,
    };
    Ok(Template::render("article_detail", &context))
}

#[derive(Debug, Serialize)]
pub struct ArticleImage {
    article_image: String,
}

#[get("/show_article_image?<article_id>")]
pub fn image(
    article_id: i32,
    connection: DbConnection,
    storage: &State<MediaStorage>,
) -> ApiResult<ArticleImage> {
    let article = Article::load(article_id, &connection)?;
    Ok(Json(ArticleImage {
        article_image: storage.url(&article.image),
    }))
}

#[derive(Serialize)]
struct SearchContext<'a> {
    query: &'a str,
    founded_articles: Vec<ArticleView<'a>>,
    categories: Vec<Category>,
}

#[get("/search?<q>")]
pub fn search(
    q: Option<&str>,
    connection: DbConnection,
    storage: &State<MediaStorage>,
) -> Result<Template, ApiError> {
    let query = q.unwrap_or("");
    let found = Article::search(query, &connection)?;

    let context = SearchContext {
        query,
        founded_articles: ArticleView::list(&found, storage),
        categories: Category::all(&connection)?,
    };
    Ok(Template::render("search", &context))
}
