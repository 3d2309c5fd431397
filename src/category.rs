use crate::article::{Article, ArticleView};
use crate::db::schema::categories;
use crate::db::DbConnection;
use crate::storage::MediaStorage;
use crate::types::{ApiError, ApiResult};
use diesel::prelude::*;
use rocket::serde::json::Json;
use rocket::{get, State};
use rocket_dyn_templates::Template;
use serde::ser::{Serialize, SerializeStruct, Serializer};

const SLIDER_SIZE: i64 = 3;
const RECENT_SIZE: i64 = 5;

#[derive(Identifiable, Queryable, PartialEq, Debug, Clone)]
#[table_name = "categories"]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl Category {
    pub fn all(connection: &PgConnection) -> Result<Vec<Category>, ApiError> {
        use crate::db::schema::categories::dsl::*;
        categories
            .order(id.asc())
            .load::<Category>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_slug(slug_: &str, connection: &PgConnection) -> Result<Category, ApiError> {
        use crate::db::schema::categories::dsl::*;
        categories
            .filter(slug.eq(slug_))
            .get_result::<Category>(connection)
            .map_err(|e| e.into())
    }

    pub fn absolute_url(&self) -> String {
        format!("/category/{}", self.slug)
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Category", 4)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("slug", &self.slug)?;
        s.serialize_field("url", &self.absolute_url())?;
        s.end()
    }
}

/// Categories are created by administrators, outside the web surface.
#[cfg(test)]
#[derive(Insertable, Debug)]
#[table_name = "categories"]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
}

#[cfg(test)]
impl NewCategory {
    pub fn new(name: &str) -> Self {
        NewCategory {
            name: name.to_string(),
            slug: slug::slugify(name),
        }
    }

    pub fn save(&self, connection: &PgConnection) -> Result<Category, ApiError> {
        diesel::insert_into(categories::table)
            .values(self)
            .get_result::<Category>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Serialize)]
struct IndexContext<'a> {
    categories: Vec<Category>,
    slider_articles: Vec<ArticleView<'a>>,
    articles: Vec<ArticleView<'a>>,
    article: Option<ArticleView<'a>>,
}

#[get("/")]
pub fn index(connection: DbConnection, storage: &State<MediaStorage>) -> Result<Template, ApiError> {
    let slider = Article::random_sample(SLIDER_SIZE, &connection)?;
    let recent = Article::recent(RECENT_SIZE, &connection)?;
    let latest = Article::latest_by_date(&connection)?;

    let context = IndexContext {
        categories: Category::all(&connection)?,
        slider_articles: ArticleView::list(&slider, storage),
        articles: ArticleView::list(&recent, storage),
        article: latest
            .as_ref()
            .map(|(article, category)| ArticleView::new(article, category, storage)),
    };
    Ok(Template::render("index", &context))
}

#[derive(Serialize)]
struct CategoryDetailContext<'a> {
    category: &'a Category,
    articles_from_category: Vec<ArticleView<'a>>,
    categories: Vec<Category>,
}

#[get("/category/<category_slug>")]
pub fn detail(
    category_slug: &str,
    connection: DbConnection,
    storage: &State<MediaStorage>,
) -> Result<Template, ApiError> {
    let category = Category::load_by_slug(category_slug, &connection)?;
    let articles = Article::in_category(&category, &connection)?;

    let context = CategoryDetailContext {
        category: &category,
        articles_from_category: articles
            .iter()
            .map(|article| ArticleView::new(article, &category, storage))
            .collect(),
        categories: Category::all(&connection)?,
    };
    Ok(Template::render("category_detail", &context))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ArticleSummary {
    title: String,
    image: String,
    slug: String,
}

#[derive(Debug, Serialize)]
pub struct ArticlesByCategory {
    articles: Vec<ArticleSummary>,
}

impl ArticlesByCategory {
    pub fn load(category_slug: &str, connection: &PgConnection) -> Result<Self, ApiError> {
        let category = Category::load_by_slug(category_slug, connection)?;
        let articles = Article::in_category(&category, connection)?
            .into_iter()
            .map(|article| ArticleSummary {
                title: article.title,
                image: article.image,
                slug: article.slug,
            })
            .collect();
        Ok(ArticlesByCategory { articles })
    }
}

#[get("/display_articles_by_category?<category_slug>")]
pub fn articles_by_category(
    category_slug: &str,
    connection: DbConnection,
) -> ApiResult<ArticlesByCategory> {
    Ok(Json(ArticlesByCategory::load(category_slug, &connection)?))
}
