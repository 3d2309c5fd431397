#[macro_use]
extern crate diesel;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;

mod account;
mod article;
mod category;
mod comment;
mod config;
mod db;
mod reaction;
mod storage;
mod types;
mod users;
mod utils;

#[cfg(test)]
mod test_support;

use config::Settings;
use rocket::response::content;
use rocket::{catch, catchers, launch, routes, Build, Request, Rocket};
use rocket_dyn_templates::Template;
use serde_json::json;
use storage::MediaStorage;

#[catch(422)]
fn handle_422(_req: &Request) -> content::RawJson<String> {
    let json = json!({
        "errors": [
            "unprocessable entity"
        ]
    });
    content::RawJson(json.to_string())
}

#[catch(404)]
fn not_found(_req: &Request) -> content::RawJson<String> {
    let json = json!({
        "errors": [
            "entity not found"
        ]
    });
    content::RawJson(json.to_string())
}

fn build(settings: Settings, pool: db::Pool) -> Rocket<Build> {
    let storage = MediaStorage::new(&settings.media_url);
    rocket::build()
        .manage(pool)
        .manage(storage)
        .manage(settings)
        .attach(Template::fairing())
        .mount(
            "/",
            routes![
                category::index,
                category::detail,
                category::articles_by_category,
                article::detail,
                article::image,
                article::search,
                comment::add,
                reaction::react,
                users::registration_form,
                users::register,
                users::login_form,
                users::login,
                users::logout,
                account::add_to_favorites,
                account::remove_from_favorites,
                account::account_page,
            ],
        )
        .register("/", catchers![not_found, handle_422])
}

#[launch]
fn rocket() -> Rocket<Build> {
    let settings = Settings::from_env().expect("Failed to read settings");
    let pool = db::init_pool(&settings.database_url).expect("Failed to create database pool");
    build(settings, pool)
}
