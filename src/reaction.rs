use crate::article::Article;
use crate::db::schema::{article_reactions, articles};
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult};
use crate::users::models::User;
use crate::users::CurrentUser;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::insert_into;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::update as diesel_update;
use rocket::get;
use rocket::serde::json::Json;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow)]
#[sql_type = "Text"]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Like => "like",
            Polarity::Dislike => "dislike",
        }
    }

    /// Polarities requested by the `like`/`dislike` query flags, like first.
    /// A flag counts when it carries a non-empty value.
    pub fn requested(like: Option<&str>, dislike: Option<&str>) -> Vec<Polarity> {
        let is_set = |flag: Option<&str>| flag.map_or(false, |value| !value.is_empty());
        let mut polarities = Vec::with_capacity(2);
        if is_set(like) {
            polarities.push(Polarity::Like);
        }
        if is_set(dislike) {
            polarities.push(Polarity::Dislike);
        }
        polarities
    }
}

impl ToSql<Text, Pg> for Polarity {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for Polarity {
    fn from_sql(bytes: Option<&<Pg as Backend>::RawValue>) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "like" => Ok(Polarity::Like),
            "dislike" => Ok(Polarity::Dislike),
            other => Err(format!("unknown polarity: {}", other).into()),
        }
    }
}

#[derive(Debug, Queryable, PartialEq)]
pub struct Reaction {
    pub article_id: i32,
    pub user_id: i32,
    pub polarity: Polarity,
}

#[derive(Insertable)]
#[table_name = "article_reactions"]
struct NewReaction {
    article_id: i32,
    user_id: i32,
    polarity: Polarity,
}

impl Reaction {
    /// Records the first reaction of `user` to the article and bumps the
    /// matching counter. Later reactions of the same user are ignored; the
    /// primary key on (article, user) makes this hold under concurrent
    /// requests too.
    pub fn record(
        article_id: i32,
        user: &User,
        requested: &[Polarity],
        connection: &PgConnection,
    ) -> Result<Article, ApiError> {
        connection.transaction::<_, ApiError, _>(|| {
            let article = Article::load(article_id, connection)?;
            for polarity in requested {
                let inserted = insert_into(article_reactions::table)
                    .values(&NewReaction {
                        article_id: article.id,
                        user_id: user.id,
                        polarity: *polarity,
                    })
                    .on_conflict((article_reactions::article_id, article_reactions::user_id))
                    .do_nothing()
                    .execute(connection)?;
                if inserted == 0 {
                    continue;
                }
                let target = articles::table.find(article.id);
                match polarity {
                    Polarity::Like => diesel_update(target)
                        .set(articles::likes.eq(articles::likes + 1))
                        .execute(connection)?,
                    Polarity::Dislike => diesel_update(target)
                        .set(articles::dislikes.eq(articles::dislikes + 1))
                        .execute(connection)?,
                };
            }
            Article::load(article.id, connection)
        })
    }

    #[cfg(test)]
    pub fn load_for(article: &Article, connection: &PgConnection) -> Result<Vec<Reaction>, ApiError> {
        article_reactions::table
            .filter(article_reactions::article_id.eq(article.id))
            .order(article_reactions::user_id.asc())
            .load::<Reaction>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ReactionCounts {
    likes: i32,
    dislikes: i32,
}

impl<'a> From<&'a Article> for ReactionCounts {
    fn from(article: &'a Article) -> Self {
        ReactionCounts {
            likes: article.likes,
            dislikes: article.dislikes,
        }
    }
}

#[get("/user_reaction?<article_id>&<like>&<dislike>")]
pub fn react(
    article_id: i32,
    like: Option<&str>,
    dislike: Option<&str>,
    user: CurrentUser,
    connection: DbConnection,
) -> ApiResult<ReactionCounts> {
    let user = user?;
    let requested = Polarity::requested(like, dislike);
    let article = Reaction::record(article_id, &user, &requested, &connection)?;
    Ok(Json((&article).into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::NewArticle;
    use crate::category::NewCategory;
    use crate::test_support;

    #[test]
    fn flags_need_a_value() {
        assert_eq!(Polarity::requested(Some("1"), None), vec![Polarity::Like]);
        assert_eq!(Polarity::requested(None, Some("true")), vec![Polarity::Dislike]);
        assert_eq!(Polarity::requested(Some(""), None), vec![]);
        assert_eq!(Polarity::requested(None, None), vec![]);
        assert_eq!(
            Polarity::requested(Some("1"), Some("1")),
            vec![Polarity::Like, Polarity::Dislike]
        );
    }

    fn setup(connection: &PgConnection) -> Article {
        let news = NewCategory::new("News").save(connection).unwrap();
        NewArticle::new(&news, "Election", "votes").save(connection).unwrap()
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn repeated_like_counts_once() {
        let connection = test_support::connection();
        let article = setup(&connection);
        assert_eq!((article.likes, article.dislikes), (0, 0));
        let user = test_support::user(&connection, "u");

        let after = Reaction::record(article.id, &user, &[Polarity::Like], &connection).unwrap();
        assert_eq!(ReactionCounts::from(&after), ReactionCounts { likes: 1, dislikes: 0 });

        let after = Reaction::record(article.id, &user, &[Polarity::Like], &connection).unwrap();
        assert_eq!(ReactionCounts::from(&after), ReactionCounts { likes: 1, dislikes: 0 });

        let reactions = Reaction::load_for(&after, &connection).unwrap();
        assert_eq!(
            reactions,
            vec![Reaction {
                article_id: article.id,
                user_id: user.id,
                polarity: Polarity::Like,
            }]
        );
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn first_reaction_is_final() {
        let connection = test_support::connection();
        let article = setup(&connection);
        let user = test_support::user(&connection, "u");

        Reaction::record(article.id, &user, &[Polarity::Dislike], &connection).unwrap();
        let after = Reaction::record(article.id, &user, &[Polarity::Like], &connection).unwrap();
        assert_eq!((after.likes, after.dislikes), (0, 1));

        let other = test_support::user(&connection, "v");
        let requested = [Polarity::Like, Polarity::Dislike];
        let both = Reaction::record(article.id, &other, &requested, &connection).unwrap();
        assert_eq!((both.likes, both.dislikes), (1, 1));
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn counters_match_membership() {
        let connection = test_support::connection();
        let article = setup(&connection);
        for (name, polarity) in &[("a", Polarity::Like), ("b", Polarity::Like), ("c", Polarity::Dislike)] {
            let user = test_support::user(&connection, name);
            Reaction::record(article.id, &user, &[*polarity], &connection).unwrap();
            Reaction::record(article.id, &user, &[*polarity], &connection).unwrap();
        }

        let article = Article::load(article.id, &connection).unwrap();
        let reactions = Reaction::load_for(&article, &connection).unwrap();
        let count = |p: Polarity| reactions.iter().filter(|r| r.polarity == p).count() as i32;
        assert_eq!(article.likes, count(Polarity::Like));
        assert_eq!(article.dislikes, count(Polarity::Dislike));
        assert_eq!((article.likes, article.dislikes), (2, 1));
    }

    #[test]
    #[ignore = "requires TEST_DATABASE_URL"]
    fn reaction_to_missing_article_is_not_found() {
        let connection = test_support::connection();
        let user = test_support::user(&connection, "u");
        match Reaction::record(4242, &user, &[Polarity::Like], &connection) {
            Err(ApiError::Diesel(diesel::result::Error::NotFound)) => {}
            other => panic!("expected not found, got {:?}", other),
        }
    }
}
