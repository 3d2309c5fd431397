table! {
    article_reactions (article_id, user_id) {
        article_id -> Int4,
        user_id -> Int4,
        polarity -> Text,
    }
}

table! {
    articles (id) {
        id -> Int4,
        category_id -> Int4,
        title -> Varchar,
        slug -> Varchar,
        image -> Text,
        content -> Text,
        likes -> Int4,
        dislikes -> Int4,
        date -> Date,
    }
}

table! {
    categories (id) {
        id -> Int4,
        name -> Varchar,
        slug -> Varchar,
    }
}

table! {
    comments (id) {
        id -> Int4,
        author_id -> Int4,
        body -> Text,
        created_at -> Timestamptz,
        content_type -> Text,
        object_id -> Int4,
    }
}

table! {
    favorites (user_account_id, article_id) {
        user_account_id -> Int4,
        article_id -> Int4,
    }
}

table! {
    user_accounts (id) {
        id -> Int4,
        user_id -> Int4,
        first_name -> Varchar,
        last_name -> Varchar,
        email -> Text,
    }
}

table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
        password -> Text,
        date_joined -> Timestamptz,
    }
}

joinable!(article_reactions -> articles (article_id));
joinable!(article_reactions -> users (user_id));
joinable!(articles -> categories (category_id));
joinable!(comments -> users (author_id));
joinable!(favorites -> articles (article_id));
joinable!(favorites -> user_accounts (user_account_id));
joinable!(user_accounts -> users (user_id));

allow_tables_to_appear_in_same_query!(
    article_reactions,
    articles,
    categories,
    comments,
    favorites,
    user_accounts,
    users,
);
